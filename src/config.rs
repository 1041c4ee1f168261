use serde::Deserialize;

/// Which authenticator guards the API. Unset means the API runs open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    Open,
    Basic,
    Session,
}

impl AuthMode {
    fn from_env_var(value: Option<String>) -> Self {
        match value.as_deref() {
            Some("basic") => AuthMode::Basic,
            Some("session") => AuthMode::Session,
            _ => AuthMode::Open,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub session_cookie: String,
    pub excluded_paths: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub auth: AuthConfig,
}

pub(crate) fn parse_path_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let auth = AuthConfig {
            mode: AuthMode::from_env_var(std::env::var("AUTH_MODE").ok()),
            session_cookie: std::env::var("SESSION_NAME")
                .unwrap_or_else(|_| "_my_session_id".into()),
            // Registration, login/logout and password reset stay reachable
            // without credentials; logout still resolves its own cookie.
            excluded_paths: std::env::var("AUTH_EXCLUDED_PATHS")
                .map(|v| parse_path_list(&v))
                .unwrap_or_else(|_| {
                    vec![
                        "/api/v1/status/".into(),
                        "/api/v1/users/".into(),
                        "/api/v1/sessions/".into(),
                        "/api/v1/reset_password/".into(),
                    ]
                }),
        };
        Ok(Self { database_url, auth })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_paths() {
        let paths = parse_path_list("/api/v1/status/, /api/v1/stats/*  ,");
        assert_eq!(paths, vec!["/api/v1/status/", "/api/v1/stats/*"]);
    }

    #[test]
    fn mode_defaults_to_open_on_unknown_value() {
        assert_eq!(AuthMode::from_env_var(None), AuthMode::Open);
        assert_eq!(AuthMode::from_env_var(Some("Auth".into())), AuthMode::Open);
        assert_eq!(AuthMode::from_env_var(Some("basic".into())), AuthMode::Basic);
        assert_eq!(
            AuthMode::from_env_var(Some("session".into())),
            AuthMode::Session
        );
    }
}
