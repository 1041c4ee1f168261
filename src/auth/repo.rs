use crate::auth::repo_types::{User, UserBy, UserPatch};
use anyhow::bail;
use sqlx::PgPool;
use uuid::Uuid;

impl User {
    /// Create a new user with hashed password.
    pub async fn create(db: &PgPool, email: &str, password_hash: &str) -> anyhow::Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id, email, password_hash, session_token, reset_token, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .fetch_one(db)
        .await?;
        Ok(user)
    }

    /// Point lookup by a single criterion. Absent is `Ok(None)`.
    pub async fn find_by(db: &PgPool, by: &UserBy) -> anyhow::Result<Option<User>> {
        let query = match by {
            UserBy::Id(id) => sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, session_token, reset_token, created_at
                FROM users
                WHERE id = $1
                "#,
            )
            .bind(*id),
            UserBy::Email(email) => sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, session_token, reset_token, created_at
                FROM users
                WHERE email = $1
                "#,
            )
            .bind(email.clone()),
            UserBy::SessionToken(token) => sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, session_token, reset_token, created_at
                FROM users
                WHERE session_token = $1
                "#,
            )
            .bind(token.clone()),
            UserBy::ResetToken(token) => sqlx::query_as::<_, User>(
                r#"
                SELECT id, email, password_hash, session_token, reset_token, created_at
                FROM users
                WHERE reset_token = $1
                "#,
            )
            .bind(token.clone()),
        };
        let user = query.fetch_optional(db).await?;
        Ok(user)
    }

    /// Apply a patch to an existing user. Errors if no row matches `id`.
    pub async fn update(db: &PgPool, id: Uuid, patch: UserPatch) -> anyhow::Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                password_hash = COALESCE($2, password_hash),
                session_token = CASE WHEN $3 THEN $4 ELSE session_token END,
                reset_token = CASE WHEN $5 THEN $6 ELSE reset_token END
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(patch.password_hash)
        .bind(patch.session_token.is_some())
        .bind(patch.session_token.flatten())
        .bind(patch.reset_token.is_some())
        .bind(patch.reset_token.flatten())
        .execute(db)
        .await?;

        if result.rows_affected() == 0 {
            bail!("user {id} not found");
        }
        Ok(())
    }
}
