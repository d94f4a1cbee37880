//! Request identity.
//!
//! Upstream authentication is out of scope; the gateway in front of this
//! service injects the caller's id as an `x-user-id` header. The extractor
//! rejects requests where the header is missing or not a UUID.

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::errors::ServiceError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// The authenticated caller, extracted from the `x-user-id` header.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                ServiceError::AuthenticationError(format!("missing {} header", USER_ID_HEADER))
            })?;
        let user_id = Uuid::parse_str(raw).map_err(|_| {
            ServiceError::AuthenticationError(format!("invalid {} header", USER_ID_HEADER))
        })?;
        Ok(AuthUser(user_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<AuthUser, ServiceError> {
        let (mut parts, _) = request.into_parts();
        AuthUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn valid_header_yields_user() {
        let id = Uuid::new_v4();
        let request = Request::builder()
            .header(USER_ID_HEADER, id.to_string())
            .body(())
            .unwrap();
        let user = extract(request).await.unwrap();
        assert_eq!(user.0, id);
    }

    #[tokio::test]
    async fn missing_header_is_rejected() {
        let request = Request::builder().body(()).unwrap();
        assert!(matches!(
            extract(request).await,
            Err(ServiceError::AuthenticationError(_))
        ));
    }

    #[tokio::test]
    async fn non_uuid_header_is_rejected() {
        let request = Request::builder()
            .header(USER_ID_HEADER, "not-a-uuid")
            .body(())
            .unwrap();
        assert!(matches!(
            extract(request).await,
            Err(ServiceError::AuthenticationError(_))
        ));
    }
}
