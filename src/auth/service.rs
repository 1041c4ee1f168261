use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::repo_types::{User, UserBy, UserPatch};
use crate::auth::session::{generate_token, SessionStore};
use crate::state::AppState;

/// Service-level failures, converted to status codes at the handlers.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("email already registered")]
    Conflict,

    #[error("not found")]
    NotFound,

    #[error("{0}")]
    Invalid(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Registration, login and password-reset flows over the user table and
/// the injected session store.
pub struct AuthService {
    db: PgPool,
    sessions: Arc<dyn SessionStore>,
}

impl AuthService {
    pub fn new(db: PgPool, sessions: Arc<dyn SessionStore>) -> Self {
        Self { db, sessions }
    }

    pub fn from_state(state: &AppState) -> Self {
        Self::new(state.db.clone(), state.sessions.clone())
    }

    /// Hash and insert a new user. Email existence is checked best-effort
    /// before the insert; uniqueness is not transactional.
    pub async fn register(&self, email: &str, password: &str) -> Result<User, AuthError> {
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Invalid("email and password required".into()));
        }
        if User::find_by(&self.db, &UserBy::Email(email.to_string()))
            .await?
            .is_some()
        {
            return Err(AuthError::Conflict);
        }
        let hash = hash_password(password)?;
        let user = User::create(&self.db, email, &hash).await?;
        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    /// True iff the user exists and the password verifies. An unknown
    /// email is a plain `false`, indistinguishable from a bad password.
    pub async fn valid_login(&self, email: &str, password: &str) -> Result<bool, AuthError> {
        let Some(user) = User::find_by(&self.db, &UserBy::Email(email.to_string())).await? else {
            return Ok(false);
        };
        Ok(verify_password(password, &user.password_hash)?)
    }

    /// Issue a fresh opaque token and record the mapping.
    pub async fn create_session(&self, user_id: Uuid) -> Result<String, AuthError> {
        let token = generate_token();
        self.sessions.put(&token, user_id).await?;
        info!(user_id = %user_id, "session created");
        Ok(token)
    }

    pub async fn user_from_session(&self, token: &str) -> Result<Option<User>, AuthError> {
        let Some(user_id) = self.sessions.get(token).await? else {
            return Ok(None);
        };
        Ok(User::find_by(&self.db, &UserBy::Id(user_id)).await?)
    }

    /// Remove the user's session mapping; their token stops resolving.
    pub async fn destroy_session(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.sessions.delete_for_user(user_id).await?;
        info!(user_id = %user_id, "session destroyed");
        Ok(())
    }

    /// Generate and persist a fresh reset token for the user.
    pub async fn reset_password_token(&self, email: &str) -> Result<String, AuthError> {
        let user = User::find_by(&self.db, &UserBy::Email(email.to_string()))
            .await?
            .ok_or(AuthError::NotFound)?;
        let token = generate_token();
        User::update(
            &self.db,
            user.id,
            UserPatch {
                reset_token: Some(Some(token.clone())),
                ..Default::default()
            },
        )
        .await?;
        info!(user_id = %user.id, "reset token issued");
        Ok(token)
    }

    /// Set a new password for the user holding `reset_token`, consuming
    /// the token.
    pub async fn update_password(
        &self,
        reset_token: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::Invalid("new password required".into()));
        }
        let user = User::find_by(&self.db, &UserBy::ResetToken(reset_token.to_string()))
            .await?
            .ok_or(AuthError::NotFound)?;
        let hash = hash_password(new_password)?;
        User::update(
            &self.db,
            user.id,
            UserPatch {
                password_hash: Some(hash),
                reset_token: Some(None),
                ..Default::default()
            },
        )
        .await?;
        info!(user_id = %user.id, "password updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Session operations only touch the injected store, so they run
    // against AppState::fake() without a database.
    fn make_service() -> AuthService {
        let state = AppState::fake();
        AuthService::from_state(&state)
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let svc = make_service();
        let user_id = Uuid::new_v4();

        let token = svc.create_session(user_id).await.expect("create session");
        assert_eq!(
            svc.sessions.get(&token).await.expect("lookup"),
            Some(user_id)
        );

        svc.destroy_session(user_id).await.expect("destroy session");
        assert_eq!(svc.sessions.get(&token).await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn sessions_get_distinct_tokens() {
        let svc = make_service();
        let first = svc.create_session(Uuid::new_v4()).await.expect("create");
        let second = svc.create_session(Uuid::new_v4()).await.expect("create");
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn register_rejects_empty_credentials() {
        let svc = make_service();
        let err = svc.register("", "pw").await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
        let err = svc.register("a@b.c", "").await.unwrap_err();
        assert!(matches!(err, AuthError::Invalid(_)));
    }
}
