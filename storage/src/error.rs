//! Mapping from sqlx / serde_json failures to [`StoreError`].

use relay_core::StoreError;

pub(crate) fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

pub(crate) fn json_err(e: serde_json::Error) -> StoreError {
    StoreError::Database(format!("invalid JSON column: {}", e))
}
