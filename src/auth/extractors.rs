use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::dto::PublicUser;
use crate::auth::jwt::TokenKeys;
use crate::error::ApiError;
use crate::state::AppState;

/// Authorization gate: resolves the bearer token to a stored user.
///
/// Every failure branch short-circuits with 401 before any handler runs;
/// handlers behind this extractor can trust the attached identity.
pub struct CurrentUser(pub PublicUser);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                ApiError::Auth(
                    "No token provided. Authorization header must be: Bearer <token>".into(),
                )
            })?;

        let token = auth.strip_prefix("Bearer ").ok_or_else(|| {
            ApiError::Auth("No token provided. Authorization header must be: Bearer <token>".into())
        })?;

        let keys = TokenKeys::from_ref(state);
        let identity = keys.verify(token).ok_or_else(|| {
            warn!("invalid or expired token");
            ApiError::Auth("Invalid or expired token".into())
        })?;

        // The token may outlive the record it was issued for.
        let user = state
            .users
            .find_by_id(identity.user_id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %identity.user_id, "token subject not found");
                ApiError::Auth("User not found".into())
            })?;

        Ok(CurrentUser(user))
    }
}
