use anyhow::bail;
use axum::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Generate a fresh opaque session or reset token.
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}

/// Mapping from opaque session token to user id. Injected into the app
/// state so the backing store can change without touching callers.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, token: &str) -> anyhow::Result<Option<Uuid>>;
    async fn put(&self, token: &str, user_id: Uuid) -> anyhow::Result<()>;
    async fn delete(&self, token: &str) -> anyhow::Result<()>;
    async fn delete_for_user(&self, user_id: Uuid) -> anyhow::Result<()>;
}

/// In-memory store for tests and DB-less runs. Safe under the
/// multi-threaded runtime; entries live until deleted or process exit.
#[derive(Default)]
pub struct MemorySessionStore {
    map: RwLock<HashMap<String, Uuid>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, token: &str) -> anyhow::Result<Option<Uuid>> {
        Ok(self.map.read().await.get(token).copied())
    }

    async fn put(&self, token: &str, user_id: Uuid) -> anyhow::Result<()> {
        self.map.write().await.insert(token.to_string(), user_id);
        Ok(())
    }

    async fn delete(&self, token: &str) -> anyhow::Result<()> {
        self.map.write().await.remove(token);
        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> anyhow::Result<()> {
        self.map.write().await.retain(|_, id| *id != user_id);
        Ok(())
    }
}

/// Store backed by the `users.session_token` column, so the cookie
/// authenticator and the registration/login write paths share one source
/// of truth. At most one live token per user.
#[derive(Clone)]
pub struct PgSessionStore {
    db: PgPool,
}

impl PgSessionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn get(&self, token: &str) -> anyhow::Result<Option<Uuid>> {
        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id FROM users WHERE session_token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;
        Ok(id)
    }

    async fn put(&self, token: &str, user_id: Uuid) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET session_token = $1 WHERE id = $2
            "#,
        )
        .bind(token)
        .bind(user_id)
        .execute(&self.db)
        .await?;
        // A token mapped to no row would never resolve; fail loudly instead.
        if result.rows_affected() == 0 {
            bail!("user {user_id} not found");
        }
        Ok(())
    }

    async fn delete(&self, token: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users SET session_token = NULL WHERE session_token = $1
            "#,
        )
        .bind(token)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn delete_for_user(&self, user_id: Uuid) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users SET session_token = NULL WHERE id = $1
            "#,
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_roundtrip() {
        let store = MemorySessionStore::new();
        let user_id = Uuid::new_v4();
        let token = generate_token();

        store.put(&token, user_id).await.expect("put");
        assert_eq!(store.get(&token).await.expect("get"), Some(user_id));
    }

    #[tokio::test]
    async fn get_unknown_token_is_none() {
        let store = MemorySessionStore::new();
        assert_eq!(store.get("no-such-token").await.expect("get"), None);
    }

    #[tokio::test]
    async fn delete_removes_mapping() {
        let store = MemorySessionStore::new();
        let user_id = Uuid::new_v4();
        store.put("tok", user_id).await.expect("put");

        store.delete("tok").await.expect("delete");
        assert_eq!(store.get("tok").await.expect("get"), None);
    }

    #[tokio::test]
    async fn delete_for_user_removes_all_their_tokens() {
        let store = MemorySessionStore::new();
        let user_id = Uuid::new_v4();
        let other = Uuid::new_v4();
        store.put("a", user_id).await.expect("put");
        store.put("b", user_id).await.expect("put");
        store.put("c", other).await.expect("put");

        store.delete_for_user(user_id).await.expect("delete_for_user");
        assert_eq!(store.get("a").await.expect("get"), None);
        assert_eq!(store.get("b").await.expect("get"), None);
        assert_eq!(store.get("c").await.expect("get"), Some(other));
    }

    #[test]
    fn tokens_are_unique() {
        assert_ne!(generate_token(), generate_token());
    }
}
