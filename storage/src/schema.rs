//! Table definitions, created idempotently at startup.

use sqlx::SqlitePool;
use tracing::info;

const STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY,
        telegram_chat_id INTEGER,
        email TEXT,
        email_notifications INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS keywords (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        text TEXT NOT NULL,
        case_sensitive INTEGER NOT NULL DEFAULT 0,
        match_mode TEXT NOT NULL DEFAULT 'contains',
        priority INTEGER NOT NULL DEFAULT 0,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS monitored_channels (
        user_id TEXT NOT NULL,
        chat_id TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        PRIMARY KEY (user_id, chat_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS destinations (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        platform TEXT NOT NULL,
        chat_id TEXT NOT NULL,
        name TEXT NOT NULL,
        is_active INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS message_logs (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        keyword_id TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        original_message_id TEXT NOT NULL,
        original_message_text TEXT NOT NULL,
        matched_text TEXT NOT NULL,
        status TEXT NOT NULL,
        processing_time_ms INTEGER,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS forward_queue (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        original_chat_id TEXT NOT NULL,
        message_text TEXT NOT NULL,
        message_type TEXT NOT NULL,
        matched_keywords TEXT NOT NULL,
        raw_message_data TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        delivered_at TEXT,
        failure_reason TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS feed_notifications (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        queue_id TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        body TEXT NOT NULL,
        is_read INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS email_outbox (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        queue_id TEXT NOT NULL,
        to_address TEXT NOT NULL,
        subject TEXT NOT NULL,
        body TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'queued',
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS dedup_settings (
        user_id TEXT PRIMARY KEY,
        similarity_threshold REAL NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_keywords_user_id ON keywords(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_destinations_user_id ON destinations(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_message_logs_window ON message_logs(user_id, keyword_id, created_at)",
    "CREATE INDEX IF NOT EXISTS idx_forward_queue_status ON forward_queue(status)",
    "CREATE INDEX IF NOT EXISTS idx_feed_user_id ON feed_notifications(user_id)",
    "CREATE INDEX IF NOT EXISTS idx_email_outbox_status ON email_outbox(status)",
];

pub(crate) async fn init(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Creating database tables if not exist");
    for statement in STATEMENTS {
        sqlx::query(statement).execute(pool).await?;
    }
    info!("Database tables created successfully");
    Ok(())
}
