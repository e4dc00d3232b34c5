use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::errors::AppError;

/// Header set by the gateway after authentication.
pub const USER_ID_HEADER: &str = "user-id";

/// The caller as identified by the gateway.
#[derive(Debug, Clone)]
pub struct CallerId {
    pub user_id: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CallerId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::unauthorized("User-ID header missing"))?;

        Ok(CallerId {
            user_id: user_id.to_string(),
        })
    }
}
