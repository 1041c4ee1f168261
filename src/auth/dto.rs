use serde::{Deserialize, Serialize};

/// Form body for user registration. Missing fields deserialize to empty
/// strings and are rejected by the handler.
#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Form body for session login.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Form body for requesting a password-reset token.
#[derive(Debug, Deserialize)]
pub struct ResetRequestForm {
    #[serde(default)]
    pub email: String,
}

/// Form body for setting a new password with a reset token.
#[derive(Debug, Deserialize)]
pub struct UpdatePasswordForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub reset_token: String,
    #[serde(default)]
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
}

/// Body for message-style responses, success and failure alike.
#[derive(Debug, Serialize)]
pub struct Message {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorMessage {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct UserCreated {
    pub email: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SessionCreated {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct ResetTokenResponse {
    pub email: String,
    pub reset_token: String,
}
