//! Identity gateway backed by Supabase GoTrue

mod session;

use log::warn;
use reqwest::Client;
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::fetch::Fetch;

pub use session::{decode_claims, AuthUser, Session, TokenClaims};

const CLIENT_INFO: &str = "zoodb/0.2.0";

/// What the current identity may do in the client.
///
/// Admin is a convenience gate for showing the editing surfaces; the
/// server's row policies are what actually protect the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Privilege {
    #[default]
    Anonymous,
    Admin,
}

impl Privilege {
    pub fn is_admin(self) -> bool {
        matches!(self, Privilege::Admin)
    }
}

/// Client for Supabase Authentication
pub struct Auth {
    /// The base URL for the Supabase project
    url: String,

    /// The anonymous API key for the Supabase project
    key: String,

    /// HTTP client used for requests
    client: Client,

    /// Lowercased emails granted the admin surfaces
    admin_emails: Vec<String>,

    /// The current session
    session: Arc<Mutex<Option<Session>>>,

    /// Broadcasts every session change to observers
    session_change: broadcast::Sender<Option<Session>>,
}

impl Auth {
    /// Create a new Auth client
    pub(crate) fn new(url: &str, key: &str, client: Client, admin_emails: Vec<String>) -> Self {
        let (session_change, _) = broadcast::channel(16);
        Self {
            url: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            client,
            admin_emails,
            session: Arc::new(Mutex::new(None)),
            session_change,
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1{}", self.url, path)
    }

    fn store_session(&self, session: Option<Session>) {
        let mut current = self.session.lock().unwrap();
        *current = session.clone();
        drop(current);
        let _ = self.session_change.send(session);
    }

    /// Sign up a new user with email and password.
    ///
    /// Returns `None` when the project requires email confirmation and no
    /// session exists yet.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let url = self.auth_url("/signup");
        let body = json!({"email": email.trim(), "password": password});

        let value = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .json(&body)?
            .execute::<serde_json::Value>()
            .await?;

        if value.get("access_token").is_some() {
            let session: Session = serde_json::from_value(value)?;
            self.store_session(Some(session.clone()));
            Ok(Some(session))
        } else {
            Ok(None)
        }
    }

    /// Sign in a user with email and password
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session> {
        let url = self.auth_url("/token");
        let body = json!({"email": email.trim(), "password": password});

        let session = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .query("grant_type", "password")
            .json(&body)?
            .execute::<Session>()
            .await?;

        self.store_session(Some(session.clone()));
        Ok(session)
    }

    /// Email a magic sign-in link. `redirect_to` should point back at the
    /// app so the link lands where the user started.
    pub async fn sign_in_with_magic_link(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<()> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(Error::validation("email is required"));
        }
        let url = self.auth_url("/otp");
        let body = json!({"email": email, "create_user": true});

        let mut req = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO);
        if let Some(redirect) = redirect_to {
            req = req.query("redirect_to", redirect);
        }
        req.json(&body)?.execute_ok().await
    }

    /// Email a password recovery link
    pub async fn reset_password_for_email(
        &self,
        email: &str,
        redirect_to: Option<&str>,
    ) -> Result<()> {
        let email = email.trim().to_lowercase();
        if email.is_empty() {
            return Err(Error::validation("email is required"));
        }
        let url = self.auth_url("/recover");
        let body = json!({"email": email});

        let mut req = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO);
        if let Some(redirect) = redirect_to {
            req = req.query("redirect_to", redirect);
        }
        req.json(&body)?.execute_ok().await
    }

    /// Exchange the stored refresh token for a fresh session
    pub async fn refresh_session(&self) -> Result<Session> {
        let refresh_token = self
            .session()
            .and_then(|s| s.refresh_token)
            .ok_or_else(|| Error::auth("no session to refresh"))?;

        let url = self.auth_url("/token");
        let body = json!({"refresh_token": refresh_token});

        let session = Fetch::post(&self.client, &url)
            .header("apikey", &self.key)
            .header("X-Client-Info", CLIENT_INFO)
            .query("grant_type", "refresh_token")
            .json(&body)?
            .execute::<Session>()
            .await?;

        self.store_session(Some(session.clone()));
        Ok(session)
    }

    /// Sign out. The local session is always cleared; a failed server-side
    /// revoke is logged and swallowed.
    pub async fn sign_out(&self) -> Result<()> {
        let token = self.session().map(|s| s.access_token);
        self.store_session(None);

        if let Some(token) = token {
            let url = self.auth_url("/logout");
            let result = Fetch::post(&self.client, &url)
                .header("apikey", &self.key)
                .header("X-Client-Info", CLIENT_INFO)
                .bearer_auth(&token)
                .execute_ok()
                .await;
            if let Err(e) = result {
                warn!("sign-out revoke failed: {}", e);
            }
        }
        Ok(())
    }

    /// Get the current session
    pub fn session(&self) -> Option<Session> {
        self.session.lock().unwrap().clone()
    }

    /// Adopt a session obtained elsewhere (e.g. a magic-link exchange
    /// completed by the hosting app)
    pub fn set_session(&self, session: Session) {
        self.store_session(Some(session));
    }

    /// Drop the current session without a server round trip
    pub fn clear_session(&self) {
        self.store_session(None);
    }

    /// Observe session changes
    pub fn on_session_change(&self) -> broadcast::Receiver<Option<Session>> {
        self.session_change.subscribe()
    }

    /// The access token to send with persistence requests, if any
    pub fn access_token(&self) -> Option<String> {
        self.session().map(|s| s.access_token)
    }

    /// The owning user id for user-scoped rows, if signed in
    pub fn user_id(&self) -> Option<String> {
        self.session().and_then(|s| s.user_id())
    }

    /// Current privilege, from the session email and the allow-list
    pub fn privilege(&self) -> Privilege {
        let email = match self.session().and_then(|s| s.email()) {
            Some(email) => email.trim().to_lowercase(),
            None => return Privilege::Anonymous,
        };
        if self.admin_emails.iter().any(|a| *a == email) {
            Privilege::Admin
        } else {
            Privilege::Anonymous
        }
    }
}
