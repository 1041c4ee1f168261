use axum::http::{header, HeaderMap};
use base64ct::{Base64, Encoding};
use tracing::warn;

use crate::auth::password::verify_password;
use crate::auth::repo_types::{User, UserBy};
use crate::config::{AuthConfig, AuthMode};
use crate::state::AppState;

/// Whether `path` is subject to authentication. The path is normalized to
/// a single trailing slash; an exclusion entry matches exactly, or by
/// prefix when it ends in `*`. An empty exclusion list protects everything.
pub fn requires_auth(path: &str, excluded_paths: &[String]) -> bool {
    if excluded_paths.is_empty() {
        return true;
    }
    let normalized = format!("{}/", path.trim_end_matches('/'));
    for excluded in excluded_paths {
        if let Some(prefix) = excluded.strip_suffix('*') {
            if normalized.starts_with(prefix) {
                return false;
            }
        } else if normalized == *excluded {
            return false;
        }
    }
    true
}

/// Decode `Basic <base64(email:password)>` into its credential pair.
/// Returns `None` on a missing prefix, bad base64, non-UTF-8 payload, or a
/// payload without a colon. The password may itself contain colons; the
/// split is on the first one.
pub fn extract_basic_credentials(authorization: &str) -> Option<(String, String)> {
    let encoded = authorization.strip_prefix("Basic ")?;
    let decoded = Base64::decode_vec(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (email, password) = decoded.split_once(':')?;
    Some((email.to_string(), password.to_string()))
}

/// Value of the named cookie, if present in the `Cookie` header.
pub fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let header = headers.get(header::COOKIE)?.to_str().ok()?;
    for pair in header.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        let key = parts.next()?.trim();
        let value = parts.next()?.trim();
        if key == name {
            return Some(value.to_string());
        }
    }
    None
}

/// The configured credential extractor. Both variants resolve a request to
/// a user or to nothing; they never reject by themselves.
#[derive(Debug, Clone, Copy)]
pub enum Authenticator {
    Basic,
    Session,
}

impl Authenticator {
    pub fn from_mode(mode: AuthMode) -> Option<Self> {
        match mode {
            AuthMode::Open => None,
            AuthMode::Basic => Some(Authenticator::Basic),
            AuthMode::Session => Some(Authenticator::Session),
        }
    }

    /// Whether the request carries any credential material at all. Missing
    /// material maps to 401 at the boundary; present-but-unresolvable maps
    /// to 403.
    pub fn credentials_present(&self, headers: &HeaderMap, config: &AuthConfig) -> bool {
        match self {
            Authenticator::Basic => headers
                .get(header::AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .map_or(false, |v| !v.is_empty()),
            Authenticator::Session => session_cookie(headers, &config.session_cookie).is_some(),
        }
    }

    /// Resolve the request to a user. `Ok(None)` covers malformed
    /// credentials, unknown users and failed password checks alike.
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        state: &AppState,
    ) -> anyhow::Result<Option<User>> {
        match self {
            Authenticator::Basic => {
                let Some(authorization) =
                    headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok())
                else {
                    return Ok(None);
                };
                let Some((email, password)) = extract_basic_credentials(authorization) else {
                    warn!("malformed Basic authorization header");
                    return Ok(None);
                };
                if email.is_empty() || password.is_empty() {
                    return Ok(None);
                }
                let Some(user) = User::find_by(&state.db, &UserBy::Email(email)).await? else {
                    return Ok(None);
                };
                if verify_password(&password, &user.password_hash)? {
                    Ok(Some(user))
                } else {
                    Ok(None)
                }
            }
            Authenticator::Session => {
                let Some(token) = session_cookie(headers, &state.config.auth.session_cookie)
                else {
                    return Ok(None);
                };
                let Some(user_id) = state.sessions.get(&token).await? else {
                    return Ok(None);
                };
                User::find_by(&state.db, &UserBy::Id(user_id)).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn excluded(paths: &[&str]) -> Vec<String> {
        paths.iter().map(|p| p.to_string()).collect()
    }

    #[test]
    fn excluded_path_matches_exactly() {
        let paths = excluded(&["/api/v1/status/"]);
        assert!(!requires_auth("/api/v1/status/", &paths));
        assert!(requires_auth("/api/v1/other", &paths));
    }

    #[test]
    fn trailing_slash_is_normalized() {
        let paths = excluded(&["/api/v1/status/"]);
        assert!(!requires_auth("/api/v1/status", &paths));
        assert!(!requires_auth("/api/v1/status//", &paths));
    }

    #[test]
    fn prefix_without_wildcard_does_not_match() {
        let paths = excluded(&["/api/v1/status/"]);
        assert!(requires_auth("/api/v1/status/extra", &paths));
    }

    #[test]
    fn wildcard_entry_matches_by_prefix() {
        let paths = excluded(&["/api/v1/stat*"]);
        assert!(!requires_auth("/api/v1/status", &paths));
        assert!(!requires_auth("/api/v1/stats/", &paths));
        assert!(requires_auth("/api/v1/users", &paths));
    }

    #[test]
    fn empty_exclusions_protect_everything() {
        assert!(requires_auth("/api/v1/status/", &[]));
    }

    #[test]
    fn extracts_valid_basic_credentials() {
        let encoded = Base64::encode_string(b"user@example.com:secret");
        let creds = extract_basic_credentials(&format!("Basic {encoded}"));
        assert_eq!(
            creds,
            Some(("user@example.com".to_string(), "secret".to_string()))
        );
    }

    #[test]
    fn password_splits_on_first_colon_only() {
        let encoded = Base64::encode_string(b"user@example.com:pass:word");
        let creds = extract_basic_credentials(&format!("Basic {encoded}"));
        assert_eq!(
            creds,
            Some(("user@example.com".to_string(), "pass:word".to_string()))
        );
    }

    #[test]
    fn rejects_missing_prefix() {
        let encoded = Base64::encode_string(b"user:pw");
        assert_eq!(extract_basic_credentials(&encoded), None);
        assert_eq!(extract_basic_credentials(&format!("Bearer {encoded}")), None);
    }

    #[test]
    fn rejects_bad_base64() {
        assert_eq!(extract_basic_credentials("Basic !!not-base64!!"), None);
    }

    #[test]
    fn rejects_payload_without_colon() {
        let encoded = Base64::encode_string(b"no-separator-here");
        assert_eq!(extract_basic_credentials(&format!("Basic {encoded}")), None);
    }

    #[test]
    fn finds_named_cookie_among_several() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; _my_session_id=abc123; lang=en"),
        );
        assert_eq!(
            session_cookie(&headers, "_my_session_id"),
            Some("abc123".to_string())
        );
        assert_eq!(session_cookie(&headers, "missing"), None);
    }

    #[test]
    fn no_cookie_header_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(session_cookie(&headers, "_my_session_id"), None);
    }
}
