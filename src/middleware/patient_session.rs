use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};

use crate::auth::hash_session_token;
use crate::error::ApiError;
use crate::models::AppState;

/// Patient identified by the bearer token issued at check-in.
#[derive(Debug, Clone)]
pub struct PatientSession {
    /// SHA-256 hex of the token; the raw token is never kept.
    pub key: String,
}

impl FromRequestParts<AppState> for PatientSession {
    type Rejection = ApiError;

    fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> impl std::future::Future<Output = Result<Self, Self::Rejection>> + Send {
        async move {
            // Extract Authorization: Bearer <token>
            let TypedHeader(authz): TypedHeader<Authorization<Bearer>> =
                TypedHeader::from_request_parts(parts, state)
                    .await
                    .map_err(|_| ApiError::missing_session())?;

            let token = authz.token().trim();
            if token.is_empty() {
                return Err(ApiError::missing_session());
            }

            Ok(PatientSession {
                key: hash_session_token(token),
            })
        }
    }
}
