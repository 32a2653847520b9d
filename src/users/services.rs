use std::sync::Arc;

use axum::http::StatusCode;
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{error, info, warn};

use super::dto::RegisterRequest;
use super::repo_types::{NewUser, User};
use super::store::{StoreError, UserStore};
use crate::auth::password::{hash_off_thread, PasswordHasher};

pub const MAX_USERNAME_LEN: usize = 64;
pub const MAX_PASSWORD_LEN: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("{0}")]
    Validation(&'static str),
    #[error("Username already registered")]
    DuplicateUsername,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl RegistrationError {
    pub fn rejection(&self) -> (StatusCode, String) {
        match self {
            Self::Validation(msg) => (StatusCode::BAD_REQUEST, (*msg).to_string()),
            Self::DuplicateUsername => (StatusCode::CONFLICT, self.to_string()),
            Self::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".into(),
            ),
        }
    }
}

pub(crate) fn is_valid_username(username: &str) -> bool {
    lazy_static! {
        static ref USERNAME_RE: Regex = Regex::new(r"^[A-Za-z0-9._-]+$").unwrap();
    }
    !username.is_empty() && username.len() <= MAX_USERNAME_LEN && USERNAME_RE.is_match(username)
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Blank optional strings are treated as absent.
fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Validates registrations and stores users with hashed passwords.
#[derive(Clone)]
pub struct RegistrationService {
    users: Arc<dyn UserStore>,
    hasher: Arc<dyn PasswordHasher>,
}

impl RegistrationService {
    pub fn new(users: Arc<dyn UserStore>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { users, hasher }
    }

    pub async fn register(&self, req: RegisterRequest) -> Result<User, RegistrationError> {
        let username = req.username.trim().to_string();
        if username.is_empty() {
            return Err(RegistrationError::Validation("Username is required"));
        }
        if !is_valid_username(&username) {
            warn!(%username, "invalid username");
            return Err(RegistrationError::Validation("Invalid username"));
        }
        if req.password.is_empty() {
            return Err(RegistrationError::Validation("Password is required"));
        }
        if req.password.len() > MAX_PASSWORD_LEN {
            return Err(RegistrationError::Validation("Password too long"));
        }
        let email = non_blank(req.email).map(|e| e.to_lowercase());
        if let Some(email) = &email {
            if !is_valid_email(email) {
                warn!(%username, "invalid email");
                return Err(RegistrationError::Validation("Invalid email"));
            }
        }

        let password_hash = hash_off_thread(self.hasher.clone(), req.password)
            .await
            .map_err(|e| {
                error!(error = %e, "hash_password failed");
                RegistrationError::Internal(e)
            })?;

        let new_user = NewUser {
            username,
            password_hash,
            email,
            display_name: non_blank(req.display_name),
        };

        match self.users.insert(new_user).await {
            Ok(user) => {
                info!(username = %user.username, "user registered");
                Ok(user)
            }
            Err(StoreError::Duplicate(username)) => {
                warn!(%username, "username already registered");
                Err(RegistrationError::DuplicateUsername)
            }
            Err(StoreError::EmptyUsername) => {
                Err(RegistrationError::Validation("Username is required"))
            }
            Err(e) => {
                error!(error = %e, "create user failed");
                Err(RegistrationError::Internal(e.into()))
            }
        }
    }
}
