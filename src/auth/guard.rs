use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, warn};

use crate::auth::authenticator::{requires_auth, Authenticator};
use crate::auth::dto::ErrorMessage;
use crate::state::AppState;

fn error_response(status: StatusCode, error: &str) -> Response {
    (
        status,
        Json(ErrorMessage {
            error: error.to_string(),
        }),
    )
        .into_response()
}

/// Route guard applied to the whole router. Requests to excluded paths
/// pass through; otherwise missing credential material is 401 and material
/// that resolves to no user is 403.
pub async fn require_auth(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let Some(authenticator) = Authenticator::from_mode(state.config.auth.mode) else {
        return next.run(req).await;
    };

    let path = req.uri().path();
    if !requires_auth(path, &state.config.auth.excluded_paths) {
        return next.run(req).await;
    }

    if !authenticator.credentials_present(req.headers(), &state.config.auth) {
        warn!(path = %path, "request without credentials");
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized");
    }

    match authenticator.authenticate(req.headers(), &state).await {
        Ok(Some(user)) => {
            // Hand the resolved user to downstream extractors.
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(None) => {
            warn!(path = %path, "credentials resolved to no user");
            error_response(StatusCode::FORBIDDEN, "Forbidden")
        }
        Err(e) => {
            error!(error = %e, "authentication lookup failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error")
        }
    }
}
