//! Settings database operations
//!
//! Key-value accessors for operator-tunable policy.

use sqlx::{Pool, Sqlite};
use waxline_common::{Error, Result};

use crate::models::IdempotencePolicy;

/// Default idempotence policy applied when an import request does not
/// specify one
pub async fn get_default_idempotence_policy(db: &Pool<Sqlite>) -> Result<IdempotencePolicy> {
    match get_setting::<String>(db, "idempotence_policy").await? {
        Some(value) => match value.as_str() {
            "completed_only" => Ok(IdempotencePolicy::CompletedOnly),
            "any_terminal" => Ok(IdempotencePolicy::AnyTerminal),
            other => Err(Error::Config(format!(
                "Unknown idempotence_policy setting: {}",
                other
            ))),
        },
        None => Ok(IdempotencePolicy::default()),
    }
}

pub async fn set_default_idempotence_policy(
    db: &Pool<Sqlite>,
    policy: IdempotencePolicy,
) -> Result<()> {
    let value = match policy {
        IdempotencePolicy::CompletedOnly => "completed_only",
        IdempotencePolicy::AnyTerminal => "any_terminal",
    };
    set_setting(db, "idempotence_policy", value).await
}

/// Generic setting getter (internal)
async fn get_setting<T>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await
        .map_err(Error::Database)?;

    match row {
        Some((value,)) => {
            let parsed = value
                .parse::<T>()
                .map_err(|e| Error::Config(format!("Parse setting failed: {}", e)))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

/// Generic setting setter (internal)
async fn set_setting<T>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value) VALUES (?, ?)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await
    .map_err(Error::Database)?;
    Ok(())
}
