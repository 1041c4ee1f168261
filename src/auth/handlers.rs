use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, HeaderValue, StatusCode},
    response::Redirect,
    routing::{get, post},
    Form, Json, Router,
};
use tracing::{error, info, instrument, warn};

use crate::{
    auth::{
        dto::{
            ErrorMessage, LoginForm, Message, ProfileResponse, RegisterForm, ResetRequestForm,
            ResetTokenResponse, SessionCreated, StatusResponse, UpdatePasswordForm, UserCreated,
        },
        extractors::AuthUser,
        repo_types::{User, UserBy},
        service::{AuthError, AuthService},
    },
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(status))
        .route("/users", post(register))
        .route("/sessions", post(login).delete(logout))
        .route("/profile", get(profile))
        .route("/reset_password", post(reset_password).put(update_password))
}

fn message(status: StatusCode, text: &str) -> (StatusCode, Json<Message>) {
    (
        status,
        Json(Message {
            message: text.to_string(),
        }),
    )
}

fn error_body(status: StatusCode, text: &str) -> (StatusCode, Json<ErrorMessage>) {
    (
        status,
        Json(ErrorMessage {
            error: text.to_string(),
        }),
    )
}

pub async fn status() -> Json<StatusResponse> {
    Json(StatusResponse { status: "OK" })
}

#[instrument(skip(state, form))]
pub async fn register(
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Json<UserCreated>, (StatusCode, Json<Message>)> {
    let svc = AuthService::from_state(&state);
    match svc.register(&form.email, &form.password).await {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, "user created");
            Ok(Json(UserCreated {
                email: user.email,
                message: "user created".to_string(),
            }))
        }
        Err(AuthError::Conflict) => {
            warn!(email = %form.email, "email already registered");
            Err(message(StatusCode::BAD_REQUEST, "email already registered"))
        }
        Err(AuthError::Invalid(reason)) => {
            warn!(email = %form.email, "invalid registration");
            Err(message(StatusCode::BAD_REQUEST, &reason))
        }
        Err(e) => {
            error!(error = %e, "register failed");
            Err(message(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
            ))
        }
    }
}

#[instrument(skip(state, form))]
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<(HeaderMap, Json<SessionCreated>), (StatusCode, Json<ErrorMessage>)> {
    if form.email.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "email missing"));
    }
    if form.password.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "password missing"));
    }

    let svc = AuthService::from_state(&state);
    let ok = match svc.valid_login(&form.email, &form.password).await {
        Ok(v) => v,
        Err(e) => {
            error!(error = %e, "valid_login failed");
            return Err(error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
            ));
        }
    };
    if !ok {
        warn!(email = %form.email, "login with bad credentials");
        return Err(error_body(StatusCode::UNAUTHORIZED, "Invalid credentials"));
    }

    let user = match User::find_by(&state.db, &UserBy::Email(form.email.clone())).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            warn!(email = %form.email, "login unknown email");
            return Err(error_body(StatusCode::UNAUTHORIZED, "Invalid credentials"));
        }
        Err(e) => {
            error!(error = %e, "find user failed");
            return Err(error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
            ));
        }
    };

    let token = match svc.create_session(user.id).await {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, "create_session failed");
            return Err(error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
            ));
        }
    };

    let cookie = format!(
        "{}={}; Path=/; HttpOnly",
        state.config.auth.session_cookie, token
    );
    let mut headers = HeaderMap::new();
    match HeaderValue::from_str(&cookie) {
        Ok(value) => headers.insert(SET_COOKIE, value),
        Err(e) => {
            error!(error = %e, "session cookie not a valid header value");
            return Err(error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
            ));
        }
    };

    info!(user_id = %user.id, email = %user.email, "user logged in");
    Ok((headers, Json(SessionCreated { email: user.email })))
}

#[instrument(skip(state, user))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<(HeaderMap, Redirect), (StatusCode, Json<ErrorMessage>)> {
    let svc = AuthService::from_state(&state);
    if let Err(e) = svc.destroy_session(user.id).await {
        error!(error = %e, user_id = %user.id, "destroy_session failed");
        return Err(error_body(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Internal error",
        ));
    }

    // Clear the cookie even though the server-side mapping is already gone.
    let cookie = format!(
        "{}=; Path=/; HttpOnly; Max-Age=0",
        state.config.auth.session_cookie
    );
    let mut headers = HeaderMap::new();
    if let Ok(value) = HeaderValue::from_str(&cookie) {
        headers.insert(SET_COOKIE, value);
    }

    info!(user_id = %user.id, "user logged out");
    Ok((headers, Redirect::to("/api/v1/status")))
}

#[instrument(skip(user))]
pub async fn profile(AuthUser(user): AuthUser) -> Json<ProfileResponse> {
    Json(ProfileResponse { email: user.email })
}

#[instrument(skip(state, form))]
pub async fn reset_password(
    State(state): State<AppState>,
    Form(form): Form<ResetRequestForm>,
) -> Result<Json<ResetTokenResponse>, (StatusCode, Json<ErrorMessage>)> {
    if form.email.is_empty() {
        return Err(error_body(StatusCode::BAD_REQUEST, "email missing"));
    }

    let svc = AuthService::from_state(&state);
    match svc.reset_password_token(&form.email).await {
        Ok(token) => Ok(Json(ResetTokenResponse {
            email: form.email,
            reset_token: token,
        })),
        Err(AuthError::NotFound) => {
            warn!(email = %form.email, "reset token for unknown email");
            Err(error_body(StatusCode::FORBIDDEN, "Forbidden"))
        }
        Err(e) => {
            error!(error = %e, "reset_password_token failed");
            Err(error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
            ))
        }
    }
}

#[instrument(skip(state, form))]
pub async fn update_password(
    State(state): State<AppState>,
    Form(form): Form<UpdatePasswordForm>,
) -> Result<Json<UserCreated>, (StatusCode, Json<ErrorMessage>)> {
    let svc = AuthService::from_state(&state);
    match svc.update_password(&form.reset_token, &form.new_password).await {
        Ok(()) => {
            info!(email = %form.email, "password updated");
            Ok(Json(UserCreated {
                email: form.email,
                message: "Password updated".to_string(),
            }))
        }
        Err(AuthError::NotFound) => {
            warn!(email = %form.email, "password update with bad reset token");
            Err(error_body(StatusCode::FORBIDDEN, "Forbidden"))
        }
        Err(AuthError::Invalid(reason)) => {
            Err(error_body(StatusCode::BAD_REQUEST, &reason))
        }
        Err(e) => {
            error!(error = %e, "update_password failed");
            Err(error_body(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
            ))
        }
    }
}
