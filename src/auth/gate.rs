//! Per-request authentication gate.
//!
//! Pipeline: `is_public` route match → `parse_basic` credential extraction →
//! `CredentialLoader` → `PasswordHasher::verify` → allow or reject. A rejected
//! request never reaches the router. Nothing is remembered between requests.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine};
use tracing::{debug, error, warn};

use super::credentials::{AuthError, CredentialLoader};
use super::extractors::AuthUser;
use super::password::{verify_off_thread, PasswordHasher};

/// Routes reachable without credentials.
pub fn is_public(method: &Method, path: &str) -> bool {
    (*method == Method::GET && path == "/welcome") || (*method == Method::POST && path == "/register")
}

/// Splits `Basic <base64(user:pass)>` into username and password.
pub fn parse_basic(value: &str) -> Result<(String, String), AuthError> {
    let (scheme, token) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedHeader)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::MalformedHeader);
    }
    let decoded = STANDARD
        .decode(token.trim())
        .map_err(|_| AuthError::MalformedHeader)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::MalformedHeader)?;
    // the password may itself contain ':'
    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthError::MalformedHeader)?;
    Ok((username.to_string(), password.to_string()))
}

#[derive(Clone)]
pub struct AuthGate {
    loader: CredentialLoader,
    hasher: Arc<dyn PasswordHasher>,
    challenge: HeaderValue,
}

impl AuthGate {
    pub fn new(loader: CredentialLoader, hasher: Arc<dyn PasswordHasher>, realm: &str) -> anyhow::Result<Self> {
        let challenge = HeaderValue::from_str(&format!("Basic realm=\"{realm}\", charset=\"UTF-8\""))
            .map_err(|e| anyhow::anyhow!("invalid auth realm {realm:?}: {e}"))?;
        Ok(Self {
            loader,
            hasher,
            challenge,
        })
    }

    /// Verifies the Basic credentials carried by `headers`.
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let value = headers
            .get(header::AUTHORIZATION)
            .ok_or(AuthError::MissingCredentials)?
            .to_str()
            .map_err(|_| AuthError::MalformedHeader)?;
        let (username, password) = parse_basic(value)?;

        let (stored_hash, known) = match self.loader.load_by_username(&username).await {
            Ok(cred) => (cred.password_hash, Some(cred.username)),
            Err(AuthError::NotFound) => (self.hasher.decoy_hash().to_string(), None),
            Err(e) => return Err(e),
        };

        let ok = verify_off_thread(self.hasher.clone(), password, stored_hash).await?;
        match (known, ok) {
            (Some(username), true) => Ok(AuthUser(username)),
            (None, _) => Err(AuthError::NotFound),
            (Some(_), false) => Err(AuthError::InvalidCredentials),
        }
    }

    /// Unknown users and wrong passwords produce byte-identical responses.
    pub fn reject(&self, err: &AuthError) -> Response {
        let body = match err {
            AuthError::Internal(_) => {
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response();
            }
            AuthError::MissingCredentials => "Authentication required",
            AuthError::MalformedHeader | AuthError::NotFound | AuthError::InvalidCredentials => {
                "Invalid credentials"
            }
        };
        (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, self.challenge.clone())],
            body,
        )
            .into_response()
    }
}

pub async fn require_basic_auth(State(gate): State<AuthGate>, mut req: Request, next: Next) -> Response {
    if is_public(req.method(), req.uri().path()) {
        return next.run(req).await;
    }

    match gate.authenticate(req.headers()).await {
        Ok(user) => {
            debug!(username = %user.0, "authenticated");
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Err(e) => {
            match &e {
                AuthError::Internal(inner) => error!(error = %inner, "authentication failed"),
                AuthError::MissingCredentials => debug!(path = %req.uri().path(), "no credentials"),
                other => warn!(reason = %other, path = %req.uri().path(), "authentication rejected"),
            }
            gate.reject(&e)
        }
    }
}
