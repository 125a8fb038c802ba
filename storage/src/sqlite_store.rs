//! SQLite-backed store: keywords, destinations, users, subscriptions and thresholds.
//!
//! The log, queue and notification tables are implemented in `log_repo`, `queue_repo`
//! and `notification_repo` on the same [`SqliteStore`].

use async_trait::async_trait;
use chrono::Utc;
use relay_core::{
    Destination, DestinationStore, Keyword, KeywordStore, MonitoredChannel, SettingsStore,
    StoreResult, SubscriptionStore, UserProfile, UserStore,
};
use tracing::{debug, info};

use crate::error::db_err;
use crate::models::{DestinationRow, KeywordRow, UserRow};
use crate::schema;
use crate::sqlite_pool::SqlitePoolManager;

/// All relay tables behind one pool. Cheap to clone.
#[derive(Clone)]
pub struct SqliteStore {
    pool_manager: SqlitePoolManager,
}

impl SqliteStore {
    /// Opens (or creates) the database and ensures the schema exists.
    pub async fn new(database_url: &str) -> Result<Self, sqlx::Error> {
        let pool_manager = SqlitePoolManager::new(database_url).await?;
        schema::init(pool_manager.pool()).await?;
        Ok(Self { pool_manager })
    }

    pub(crate) fn pool(&self) -> &sqlx::SqlitePool {
        self.pool_manager.pool()
    }

    /// Inserts or replaces a user profile.
    pub async fn save_user(&self, user: &UserProfile) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, telegram_chat_id, email, email_notifications, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                telegram_chat_id = excluded.telegram_chat_id,
                email = excluded.email,
                email_notifications = excluded.email_notifications
            "#,
        )
        .bind(&user.id)
        .bind(user.telegram_chat_id)
        .bind(&user.email)
        .bind(user.email_notifications)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(db_err)?;
        info!(user_id = %user.id, "Saved user");
        Ok(())
    }

    /// Inserts or replaces a keyword.
    pub async fn save_keyword(&self, keyword: &Keyword) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO keywords
                (id, user_id, text, case_sensitive, match_mode, priority, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&keyword.id)
        .bind(&keyword.user_id)
        .bind(&keyword.text)
        .bind(keyword.case_sensitive)
        .bind(keyword.match_mode.as_str())
        .bind(keyword.priority)
        .bind(keyword.is_active)
        .bind(keyword.created_at)
        .execute(self.pool())
        .await
        .map_err(db_err)?;
        info!(user_id = %keyword.user_id, keyword_id = %keyword.id, "Saved keyword");
        Ok(())
    }

    /// Inserts or replaces a destination.
    pub async fn save_destination(&self, destination: &Destination) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO destinations
                (id, user_id, platform, chat_id, name, is_active, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&destination.id)
        .bind(&destination.user_id)
        .bind(&destination.platform)
        .bind(&destination.chat_id)
        .bind(&destination.name)
        .bind(destination.is_active)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(db_err)?;
        info!(
            user_id = %destination.user_id,
            destination_id = %destination.id,
            "Saved destination"
        );
        Ok(())
    }

    /// Starts (or re-activates) monitoring of a chat for a user.
    pub async fn add_subscription(&self, subscription: &MonitoredChannel) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO monitored_channels (user_id, chat_id, is_active, created_at)
            VALUES (?, ?, 1, ?)
            ON CONFLICT(user_id, chat_id) DO UPDATE SET is_active = 1
            "#,
        )
        .bind(&subscription.user_id)
        .bind(&subscription.chat_id)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Stops monitoring; the row is kept inactive.
    pub async fn remove_subscription(&self, user_id: &str, chat_id: &str) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE monitored_channels SET is_active = 0 WHERE user_id = ? AND chat_id = ? AND is_active = 1",
        )
        .bind(user_id)
        .bind(chat_id)
        .execute(self.pool())
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl KeywordStore for SqliteStore {
    async fn active_keywords(&self, user_id: &str) -> StoreResult<Vec<Keyword>> {
        let rows: Vec<KeywordRow> = sqlx::query_as(
            "SELECT * FROM keywords WHERE user_id = ? AND is_active = 1 ORDER BY priority DESC, created_at DESC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;
        debug!(user_id = %user_id, count = rows.len(), "Loaded active keywords");
        rows.into_iter().map(Keyword::try_from).collect()
    }
}

#[async_trait]
impl DestinationStore for SqliteStore {
    async fn active_destinations(&self, user_id: &str) -> StoreResult<Vec<Destination>> {
        let rows: Vec<DestinationRow> = sqlx::query_as(
            "SELECT id, user_id, platform, chat_id, name, is_active FROM destinations WHERE user_id = ? AND is_active = 1 ORDER BY created_at ASC",
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;
        Ok(rows.into_iter().map(Destination::from).collect())
    }
}

#[async_trait]
impl UserStore for SqliteStore {
    async fn get_user(&self, user_id: &str) -> StoreResult<Option<UserProfile>> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, telegram_chat_id, email, email_notifications FROM users WHERE id = ?",
        )
        .bind(user_id)
        .fetch_optional(self.pool())
        .await
        .map_err(db_err)?;
        Ok(row.map(UserProfile::from))
    }
}

#[async_trait]
impl SettingsStore for SqliteStore {
    async fn dedup_threshold(&self, user_id: &str) -> StoreResult<Option<f64>> {
        let row: Option<(f64,)> =
            sqlx::query_as("SELECT similarity_threshold FROM dedup_settings WHERE user_id = ?")
                .bind(user_id)
                .fetch_optional(self.pool())
                .await
                .map_err(db_err)?;
        Ok(row.map(|r| r.0))
    }

    async fn set_dedup_threshold(&self, user_id: &str, threshold: f64) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO dedup_settings (user_id, similarity_threshold, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                similarity_threshold = excluded.similarity_threshold,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(threshold)
        .bind(Utc::now())
        .execute(self.pool())
        .await
        .map_err(db_err)?;
        info!(user_id = %user_id, threshold = threshold, "Updated duplicate threshold");
        Ok(())
    }
}

#[async_trait]
impl SubscriptionStore for SqliteStore {
    async fn active_subscriptions(&self) -> StoreResult<Vec<MonitoredChannel>> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT user_id, chat_id FROM monitored_channels WHERE is_active = 1 ORDER BY created_at ASC",
        )
        .fetch_all(self.pool())
        .await
        .map_err(db_err)?;
        Ok(rows
            .into_iter()
            .map(|(user_id, chat_id)| MonitoredChannel { user_id, chat_id })
            .collect())
    }
}
