use std::sync::Arc;

use tracing::error;

use crate::users::store::UserStore;

/// Stored credential pair for one authentication attempt.
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing Authorization header")]
    MissingCredentials,
    #[error("malformed Authorization header")]
    MalformedHeader,
    #[error("user not found")]
    NotFound,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Read-only lookup of the credential stored for a username.
#[derive(Clone)]
pub struct CredentialLoader {
    users: Arc<dyn UserStore>,
}

impl CredentialLoader {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    pub async fn load_by_username(&self, username: &str) -> Result<Credential, AuthError> {
        if username.is_empty() {
            return Err(AuthError::NotFound);
        }
        match self.users.find_by_username(username).await {
            Ok(Some(user)) => Ok(Credential {
                username: user.username,
                password_hash: user.password_hash,
            }),
            Ok(None) => Err(AuthError::NotFound),
            Err(e) => {
                error!(error = %e, "find_by_username failed");
                Err(AuthError::Internal(e.into()))
            }
        }
    }
}
