//! Data and synchronization core for the Zoo Database pet-care app.
//!
//! Wraps a Supabase project with typed models, draft/save reconciliation
//! for care-guide editing, image reference resolution, tag editing, and
//! device-local preferences. Rendering is left entirely to the caller.

pub mod auth;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gateway;
pub mod image;
pub mod listing;
pub mod model;
pub mod prefs;
pub mod reconciler;
pub mod resolver;
pub mod selection;
pub mod tags;

use async_trait::async_trait;
use reqwest::Client;
use std::sync::Arc;
use tokio::time::Duration;

use crate::auth::Auth;
use crate::catalog::Catalog;
use crate::gateway::SupabaseGateway;
use crate::model::{LogEntry, Reminder};
use crate::prefs::Preferences;
use crate::reconciler::{FieldKey, Reconciler, SaveTarget};
use crate::resolver::ResolverCache;

/// Persists care-guide drafts: the entity is a breed, the field is a
/// care category
struct GuideSaveTarget {
    catalog: Arc<Catalog>,
}

#[async_trait]
impl SaveTarget for GuideSaveTarget {
    async fn persist(&self, key: &FieldKey, value: &str) -> Result<()> {
        self.catalog
            .upsert_guide(&key.entity_id, &key.field_id, value)
            .await
    }
}

/// The main entry point: one Supabase project plus the client-side
/// state machinery built on top of it.
///
/// # Example
///
/// ```
/// use zoodb::{Config, ZooDb};
///
/// let config = Config::new("https://your-project.supabase.co", "anon-key").unwrap();
/// let db = ZooDb::new(config);
/// ```
pub struct ZooDb {
    config: Config,
    http_client: Client,
    auth: Auth,
    gateway: Arc<SupabaseGateway>,
    catalog: Arc<Catalog>,
    resolver: ResolverCache,
    guide_editor: Reconciler,
    prefs: Preferences,
}

impl ZooDb {
    /// Create a client with in-memory preferences. Hosting apps that
    /// want preferences to survive restarts use [`ZooDb::with_prefs`].
    pub fn new(config: Config) -> Self {
        Self::with_prefs(config, Preferences::ephemeral())
    }

    /// Create a client with the given preferences store
    pub fn with_prefs(config: Config, prefs: Preferences) -> Self {
        let http_client = Client::new();
        let auth = Auth::new(
            config.url.as_str(),
            &config.anon_key,
            http_client.clone(),
            config.admin_emails.clone(),
        );
        let gateway = Arc::new(SupabaseGateway::new(
            config.url.as_str(),
            &config.anon_key,
            http_client.clone(),
        ));
        let catalog = Arc::new(Catalog::new(gateway.clone(), &config));
        let resolver = ResolverCache::new(gateway.clone(), config.signed_url_ttl_secs);
        let guide_editor = Reconciler::new(
            Arc::new(GuideSaveTarget {
                catalog: catalog.clone(),
            }),
            Duration::from_millis(config.autosave_delay_ms),
            Duration::from_millis(config.saved_reset_ms),
        );

        Self {
            config,
            http_client,
            auth,
            gateway,
            catalog,
            resolver,
            guide_editor,
            prefs,
        }
    }

    /// Create a client from `ZOODB_URL` and `ZOODB_ANON_KEY`
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(Config::from_env()?))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The identity gateway: sign-in, sign-out, session, privilege
    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Typed data operations
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Image reference resolution with caching
    pub fn resolver(&self) -> &ResolverCache {
        &self.resolver
    }

    /// The care-guide draft/save reconciler
    pub fn guide_editor(&self) -> &Reconciler {
        &self.guide_editor
    }

    /// Device-local preferences
    pub fn prefs(&self) -> &Preferences {
        &self.prefs
    }

    /// Push the current session into the persistence and editing layers:
    /// requests start carrying the user's token, editability follows the
    /// new privilege, and cached image URLs are dropped because signed
    /// access may have changed.
    pub async fn apply_session(&self) {
        self.gateway.set_auth(self.auth.access_token()).await;
        self.refresh_editability();
        self.resolver.invalidate().await;
    }

    /// Recompute whether guide editing is allowed (an admin session with
    /// edit mode switched on) and push the autosave preference into the
    /// editor. Call after any preference or session change.
    pub fn refresh_editability(&self) {
        let editable = self.auth.privilege().is_admin() && self.prefs.edit_mode();
        self.guide_editor.set_editable(editable);
        self.guide_editor.set_autosave_enabled(self.prefs.autosave());
    }

    /// Enter one pet type: image caches from the previous listing are
    /// stale, so they are dropped before the new breeds load
    pub async fn open_pet_type(&self, pet_type_id: &str) -> Result<Vec<model::Breed>> {
        self.resolver.invalidate().await;
        self.catalog.breeds_for_type(pet_type_id).await
    }

    /// Load one breed's guides into the editor, replacing whatever
    /// breed was open before
    pub async fn open_breed_guides(&self, breed_id: &str) -> Result<()> {
        self.guide_editor.clear().await;
        let guides = self.catalog.guides_for_breed(breed_id).await?;
        for (category_id, content) in guides {
            self.guide_editor
                .load(&FieldKey::new(breed_id, category_id), &content)
                .await;
        }
        Ok(())
    }

    /// The signed-in user's reminders for a breed; empty when nobody is
    /// signed in
    pub async fn reminders_for(&self, breed_id: &str) -> Result<Vec<Reminder>> {
        self.catalog
            .reminders(self.auth.user_id().as_deref(), breed_id)
            .await
    }

    /// The signed-in user's recent care log for a breed; empty when
    /// nobody is signed in
    pub async fn recent_logs_for(&self, breed_id: &str) -> Result<Vec<LogEntry>> {
        self.catalog
            .recent_log_entries(self.auth.user_id().as_deref(), breed_id)
            .await
    }

    /// The breed cards to render, honoring the search box, the active
    /// tag chips and this device's favorites
    pub fn visible_breeds<'a>(
        &self,
        breeds: &'a [model::Breed],
        query: &str,
        active_tags: &[String],
    ) -> Vec<&'a model::Breed> {
        listing::visible_breeds(breeds, query, active_tags, &self.prefs.favorites())
    }

    /// The shared HTTP client, for callers that need raw access
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }
}

/// A convenience module for common imports
pub mod prelude {
    pub use crate::auth::{Privilege, Session};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::gateway::{ListQuery, PersistenceGateway};
    pub use crate::image::ImageSpec;
    pub use crate::model::{
        Breed, BreedDraft, CareCategory, CareGuide, CategoryDraft, LogEntry, LogKind, NewLogEntry,
        PetType, Reminder, ReminderDraft,
    };
    pub use crate::prefs::{PrefChange, Preferences, Theme, ViewMode};
    pub use crate::reconciler::{
        FieldKey, FieldState, Reconciler, SaveStatus, SaveTarget, StatusEvent,
    };
    pub use crate::resolver::{ImageRef, ResolverCache};
    pub use crate::selection::Selection;
    pub use crate::tags::TagSetEditor;
    pub use crate::ZooDb;
}

pub use crate::config::Config;
pub use crate::error::{Error, Result};
