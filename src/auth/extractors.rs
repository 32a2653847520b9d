use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
};

/// Username of the caller, attached by the auth gate after the Basic
/// credentials were verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, String);

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        // Missing only when a handler is mounted outside the gate.
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or((StatusCode::UNAUTHORIZED, "Authentication required".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    #[tokio::test]
    async fn reads_user_from_extensions() {
        let mut req = Request::builder().uri("/me").body(()).unwrap();
        req.extensions_mut().insert(AuthUser("alice".into()));
        let (mut parts, _) = req.into_parts();
        let user = AuthUser::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(user, AuthUser("alice".into()));
    }

    #[tokio::test]
    async fn rejects_when_gate_did_not_run() {
        let req = Request::builder().uri("/me").body(()).unwrap();
        let (mut parts, _) = req.into_parts();
        let err = AuthUser::from_request_parts(&mut parts, &()).await.unwrap_err();
        assert_eq!(err.0, StatusCode::UNAUTHORIZED);
    }
}
