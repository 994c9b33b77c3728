//! Guest identity.
//!
//! [`IdentityProvider`] is the seam to whatever confirms who the visitor
//! is. [`LocalIdentityProvider`] is the in-process implementation: it issues
//! random anonymous ids and trusts pre-issued custom tokens.

use async_trait::async_trait;
use rand::Rng;
use serde::Serialize;
use tokio::sync::watch;

use crate::error::ChatError;

/// Generate a random 32-character hex token.
pub fn generate_token() -> String {
    let mut rng = rand::rng();
    let bytes: [u8; 16] = rng.random();
    hex::encode(bytes)
}

/// A signed-in visitor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct User {
    pub uid: String,
    pub anonymous: bool,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_anonymously(&self) -> Result<User, ChatError>;

    async fn sign_in_with_custom_token(&self, token: &str) -> Result<User, ChatError>;

    /// Current user, updated on every sign-in or sign-out.
    fn watch(&self) -> watch::Receiver<Option<User>>;
}

/// In-process identity provider.
///
/// Custom tokens are trusted as-is: the uid claim is the part before the
/// first `.` (the whole token when there is none).
#[derive(Debug)]
pub struct LocalIdentityProvider {
    current: watch::Sender<Option<User>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self { current }
    }

    pub fn current_user(&self) -> Option<User> {
        self.current.borrow().clone()
    }

    pub fn sign_out(&self) {
        self.current.send_replace(None);
        tracing::debug!("Signed out");
    }

    fn set_user(&self, user: User) -> User {
        self.current.send_replace(Some(user.clone()));
        user
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in_anonymously(&self) -> Result<User, ChatError> {
        if let Some(user) = self.current_user().filter(|u| u.anonymous) {
            return Ok(user);
        }
        let user = User {
            uid: format!("anon-{}", generate_token()),
            anonymous: true,
        };
        tracing::info!(uid = %user.uid, "Anonymous sign-in");
        Ok(self.set_user(user))
    }

    async fn sign_in_with_custom_token(&self, token: &str) -> Result<User, ChatError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(ChatError::InvalidToken("token is blank".to_string()));
        }
        let uid = token.split('.').next().unwrap_or_default();
        if uid.is_empty() {
            return Err(ChatError::InvalidToken("token carries no uid".to_string()));
        }
        if !uid
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ChatError::InvalidToken("uid has invalid characters".to_string()));
        }

        let user = User {
            uid: uid.to_string(),
            anonymous: false,
        };
        tracing::info!(uid = %user.uid, "Custom-token sign-in");
        Ok(self.set_user(user))
    }

    fn watch(&self) -> watch::Receiver<Option<User>> {
        self.current.subscribe()
    }
}
