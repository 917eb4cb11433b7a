//! Refresh token persistence: one live record per user.
//!
//! The stored value is the latest refresh token issued to the user. Request
//! handling does not read it back; presented refresh tokens are verified by
//! their signature alone.

use sqlx::sqlite::SqlitePool;

/// The refresh token record for one user.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshTokenRecord {
    pub user_id: String,
    pub refresh_token: String,
    pub created_at: String,
    pub updated_at: String,
    pub deleted_at: Option<String>,
}

/// Store for the per-user refresh token.
pub struct RefreshTokenStore {
    pool: SqlitePool,
}

impl RefreshTokenStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert or replace the refresh token for a user.
    ///
    /// A single conflict-resolving statement, so concurrent logins for the
    /// same user cannot lose an update or create a second row. Last write wins.
    pub async fn upsert(&self, user_id: &str, refresh_token: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO user_refresh_tokens (user_id, refresh_token) VALUES (?, ?)
             ON CONFLICT(user_id) DO UPDATE SET
                refresh_token = excluded.refresh_token,
                updated_at = datetime('now'),
                deleted_at = NULL",
        )
        .bind(user_id)
        .bind(refresh_token)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get the live refresh token record for a user.
    pub async fn get(&self, user_id: &str) -> Result<Option<RefreshTokenRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT user_id, refresh_token, created_at, updated_at, deleted_at
             FROM user_refresh_tokens WHERE user_id = ? AND deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::db::Database;

    async fn count_rows(db: &Database, user_id: &str) -> i64 {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM user_refresh_tokens WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(db.pool())
                .await
                .unwrap();
        row.0
    }

    #[tokio::test]
    async fn test_upsert_creates_record() {
        let db = Database::open(":memory:").await.unwrap();

        db.refresh_tokens().upsert("u1", "tokenA").await.unwrap();

        let record = db.refresh_tokens().get("u1").await.unwrap().unwrap();
        assert_eq!(record.user_id, "u1");
        assert_eq!(record.refresh_token, "tokenA");
        assert!(record.deleted_at.is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_token() {
        let db = Database::open(":memory:").await.unwrap();

        db.refresh_tokens().upsert("u1", "tokenA").await.unwrap();
        db.refresh_tokens().upsert("u1", "tokenB").await.unwrap();

        assert_eq!(count_rows(&db, "u1").await, 1);
        let record = db.refresh_tokens().get("u1").await.unwrap().unwrap();
        assert_eq!(record.refresh_token, "tokenB");
    }

    #[tokio::test]
    async fn test_upsert_keeps_users_separate() {
        let db = Database::open(":memory:").await.unwrap();

        db.refresh_tokens().upsert("u1", "tokenA").await.unwrap();
        db.refresh_tokens().upsert("u2", "tokenB").await.unwrap();

        assert_eq!(
            db.refresh_tokens().get("u1").await.unwrap().unwrap().refresh_token,
            "tokenA"
        );
        assert_eq!(
            db.refresh_tokens().get("u2").await.unwrap().unwrap().refresh_token,
            "tokenB"
        );
    }

    #[tokio::test]
    async fn test_upsert_revives_soft_deleted_record() {
        let db = Database::open(":memory:").await.unwrap();

        db.refresh_tokens().upsert("u1", "tokenA").await.unwrap();
        sqlx::query("UPDATE user_refresh_tokens SET deleted_at = datetime('now') WHERE user_id = ?")
            .bind("u1")
            .execute(db.pool())
            .await
            .unwrap();
        assert!(db.refresh_tokens().get("u1").await.unwrap().is_none());

        db.refresh_tokens().upsert("u1", "tokenB").await.unwrap();

        assert_eq!(count_rows(&db, "u1").await, 1);
        let record = db.refresh_tokens().get("u1").await.unwrap().unwrap();
        assert_eq!(record.refresh_token, "tokenB");
    }

    #[tokio::test]
    async fn test_get_unknown_user() {
        let db = Database::open(":memory:").await.unwrap();

        assert!(db.refresh_tokens().get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_fails_on_closed_pool() {
        let db = Database::open(":memory:").await.unwrap();
        db.pool().close().await;

        assert!(db.refresh_tokens().upsert("u1", "tokenA").await.is_err());
    }
}
