//! Resolves stored image references to displayable URLs, with caching

use log::debug;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::auth::Privilege;
use crate::gateway::PersistenceGateway;

/// A parsed `image_url` value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Already a displayable URL; passed through untouched
    Direct(String),
    /// An `sb://bucket/path` pointer into project storage
    Pointer { bucket: String, path: String },
}

impl ImageRef {
    /// Parse a stored reference. Anything that is neither an http(s) URL
    /// nor a well-formed `sb://` pointer is unresolvable.
    pub fn parse(reference: &str) -> Option<ImageRef> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return Some(ImageRef::Direct(reference.to_string()));
        }
        let rest = reference.strip_prefix("sb://")?;
        let (bucket, path) = rest.split_once('/')?;
        if bucket.is_empty() || path.is_empty() {
            return None;
        }
        Some(ImageRef::Pointer {
            bucket: bucket.to_string(),
            path: path.to_string(),
        })
    }
}

/// Memoizes reference resolution for the current browsing scope.
///
/// Signed URLs expire, so the cache is fully dropped whenever the scope
/// changes instead of tracking per-entry lifetimes.
pub struct ResolverCache {
    gateway: Arc<dyn PersistenceGateway>,
    signed_ttl_secs: u64,
    cache: RwLock<HashMap<String, String>>,
}

impl ResolverCache {
    pub fn new(gateway: Arc<dyn PersistenceGateway>, signed_ttl_secs: u64) -> Self {
        Self {
            gateway,
            signed_ttl_secs,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a reference to a displayable URL, or empty when it cannot
    /// be resolved. Admin sessions prefer signed URLs so private buckets
    /// keep working; everyone else gets the public URL. Unresolvable
    /// references are never cached.
    pub async fn resolve(&self, reference: &str, privilege: Privilege) -> String {
        if let Some(hit) = self.cache.read().await.get(reference) {
            return hit.clone();
        }

        let resolved = match ImageRef::parse(reference) {
            None => return String::new(),
            Some(ImageRef::Direct(url)) => url,
            Some(ImageRef::Pointer { bucket, path }) => {
                let public = self.gateway.public_url(&bucket, &path);
                if privilege.is_admin() {
                    match self
                        .gateway
                        .signed_url(&bucket, &path, self.signed_ttl_secs)
                        .await
                    {
                        Ok(signed) => signed,
                        Err(e) => {
                            debug!("signed url for {} failed, using public: {}", reference, e);
                            public
                        }
                    }
                } else {
                    public
                }
            }
        };

        self.cache
            .write()
            .await
            .insert(reference.to_string(), resolved.clone());
        resolved
    }

    /// Look up a reference without resolving it
    pub async fn cached(&self, reference: &str) -> Option<String> {
        self.cache.read().await.get(reference).cloned()
    }

    /// Drop every cached resolution; called on browsing-scope changes
    pub async fn invalidate(&self) {
        self.cache.write().await.clear();
    }
}
