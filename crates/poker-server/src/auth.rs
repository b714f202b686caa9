//! The Auth service boundary (§6.3): an external collaborator, named here by
//! interface only. `verify` treats bearer tokens as opaque; token minting and
//! password hashing are its concern, not this engine's.

use async_trait::async_trait;
use poker_core::ids::UserId;
use tokio::sync::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// What a verified bearer token resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthIdentity {
    pub user_id: UserId,
    pub username: String,
    pub is_admin: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid token")]
    InvalidToken,
}

#[async_trait]
pub trait AuthService: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthIdentity, AuthError>;
    /// Mint a fresh bearer token for an identity (used by `/auth/register`
    /// and `/auth/login` in `lobby.rs`).
    async fn issue(&self, identity: AuthIdentity) -> String;
}

/// A minimal stand-in for the real Auth service: tokens are random opaque
/// strings mapped to identities in memory. Signing, expiry, and password
/// hashing live entirely outside this engine's scope (§1).
pub struct InMemoryAuthService {
    tokens: RwLock<HashMap<String, AuthIdentity>>,
}

impl InMemoryAuthService {
    pub fn new() -> Self {
        Self {
            tokens: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryAuthService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthService for InMemoryAuthService {
    async fn verify(&self, token: &str) -> Result<AuthIdentity, AuthError> {
        self.tokens
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }

    async fn issue(&self, identity: AuthIdentity) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens.write().await.insert(token.clone(), identity);
        token
    }
}
