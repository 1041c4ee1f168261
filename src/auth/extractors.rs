use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{request::Parts, StatusCode},
    Json,
};
use tracing::error;

use crate::auth::authenticator::session_cookie;
use crate::auth::dto::ErrorMessage;
use crate::auth::repo_types::User;
use crate::auth::service::AuthService;
use crate::state::AppState;

/// Resolves the session cookie to its user. Used by the endpoints that are
/// session-scoped regardless of the configured guard mode (profile, logout).
/// When the route guard already resolved the user it is taken from the
/// request extensions instead of hitting the store again.
#[derive(Debug)]
pub struct AuthUser(pub User);

fn forbidden() -> (StatusCode, Json<ErrorMessage>) {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorMessage {
            error: "Forbidden".to_string(),
        }),
    )
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = (StatusCode, Json<ErrorMessage>);

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<User>() {
            return Ok(AuthUser(user.clone()));
        }

        let token = session_cookie(&parts.headers, &state.config.auth.session_cookie)
            .ok_or_else(forbidden)?;

        let svc = AuthService::from_state(state);
        let user = svc
            .user_from_session(&token)
            .await
            .map_err(|e| {
                error!(error = %e, "session lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorMessage {
                        error: "Internal error".to_string(),
                    }),
                )
            })?
            .ok_or_else(forbidden)?;

        Ok(AuthUser(user))
    }
}
