//! Configuration for the zoodb client

use url::Url;

use crate::error::{Error, Result};
use crate::image::ImageSpec;

/// Configuration for the zoodb client.
///
/// `url` and `anon_key` identify the Supabase project; the remaining
/// fields tune client behavior and carry sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base project URL, e.g. `https://abc.supabase.co`
    pub url: Url,

    /// Anonymous API key sent as `apikey` on every request
    pub anon_key: String,

    /// Emails granted the admin UI, compared lowercased and trimmed.
    /// A convenience gate only; row-level policies do the real enforcement.
    pub admin_emails: Vec<String>,

    /// Storage bucket holding breed images
    pub image_bucket: String,

    /// Lifetime of signed image URLs, in seconds
    pub signed_url_ttl_secs: u64,

    /// Autosave debounce delay, in milliseconds
    pub autosave_delay_ms: u64,

    /// How long a "saved" status lingers before resetting, in milliseconds
    pub saved_reset_ms: u64,

    /// Maximum number of care-log rows fetched per breed
    pub log_fetch_limit: u32,

    /// Target shape for uploaded breed images
    pub image_spec: ImageSpec,
}

impl Config {
    /// Create a new configuration, validating the URL and key.
    pub fn new(url_str: &str, anon_key: impl Into<String>) -> Result<Self> {
        let url = Url::parse(url_str)?;
        let anon_key = anon_key.into();
        if anon_key.is_empty() {
            return Err(Error::validation("anon_key cannot be empty"));
        }
        Ok(Self {
            url,
            anon_key,
            admin_emails: Vec::new(),
            image_bucket: "breed-images".to_string(),
            signed_url_ttl_secs: 3600,
            autosave_delay_ms: 700,
            saved_reset_ms: 1200,
            log_fetch_limit: 50,
            image_spec: ImageSpec::default(),
        })
    }

    /// Create a configuration from `ZOODB_URL`, `ZOODB_ANON_KEY` and the
    /// optional comma-separated `ZOODB_ADMIN_EMAILS`.
    pub fn from_env() -> Result<Self> {
        let url_str = std::env::var("ZOODB_URL")
            .map_err(|_| Error::validation("ZOODB_URL environment variable not found"))?;
        let anon_key = std::env::var("ZOODB_ANON_KEY")
            .map_err(|_| Error::validation("ZOODB_ANON_KEY environment variable not found"))?;
        let mut config = Self::new(&url_str, anon_key)?;
        if let Ok(emails) = std::env::var("ZOODB_ADMIN_EMAILS") {
            config = config.with_admin_emails(emails.split(','));
        }
        Ok(config)
    }

    /// Set the admin email allow-list; entries are lowercased and trimmed.
    pub fn with_admin_emails<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.admin_emails = emails
            .into_iter()
            .map(|e| e.as_ref().trim().to_lowercase())
            .filter(|e| !e.is_empty())
            .collect();
        self
    }

    /// Set the storage bucket for breed images
    pub fn with_image_bucket(mut self, bucket: &str) -> Self {
        self.image_bucket = bucket.to_string();
        self
    }

    /// Set the signed URL lifetime, in seconds
    pub fn with_signed_url_ttl(mut self, secs: u64) -> Self {
        self.signed_url_ttl_secs = secs;
        self
    }

    /// Set the autosave debounce delay, in milliseconds
    pub fn with_autosave_delay(mut self, ms: u64) -> Self {
        self.autosave_delay_ms = ms;
        self
    }

    /// Set how long a "saved" status lingers, in milliseconds
    pub fn with_saved_reset(mut self, ms: u64) -> Self {
        self.saved_reset_ms = ms;
        self
    }

    /// Set the maximum number of care-log rows fetched per breed
    pub fn with_log_fetch_limit(mut self, limit: u32) -> Self {
        self.log_fetch_limit = limit;
        self
    }

    /// Set the target shape for uploaded breed images
    pub fn with_image_spec(mut self, spec: ImageSpec) -> Self {
        self.image_spec = spec;
        self
    }

    /// True when `email` is on the admin allow-list
    pub fn is_admin_email(&self, email: &str) -> bool {
        let needle = email.trim().to_lowercase();
        self.admin_emails.iter().any(|e| *e == needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_key() {
        let err = Config::new("https://example.supabase.co", "").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn rejects_bad_url() {
        assert!(Config::new("not a url", "key").is_err());
    }

    #[test]
    fn admin_emails_are_normalized() {
        let config = Config::new("https://example.supabase.co", "key")
            .unwrap()
            .with_admin_emails(["  Zoo@Example.COM ", "", "vet@example.com"]);
        assert_eq!(config.admin_emails, vec!["zoo@example.com", "vet@example.com"]);
        assert!(config.is_admin_email("ZOO@example.com "));
        assert!(!config.is_admin_email("stranger@example.com"));
    }

    #[test]
    fn carries_tuned_defaults() {
        let config = Config::new("https://example.supabase.co", "key").unwrap();
        assert_eq!(config.autosave_delay_ms, 700);
        assert_eq!(config.saved_reset_ms, 1200);
        assert_eq!(config.signed_url_ttl_secs, 3600);
        assert_eq!(config.image_bucket, "breed-images");
    }
}
