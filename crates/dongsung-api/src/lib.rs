pub mod auth;
pub mod calendar;
pub mod error;
pub mod gallery;
pub mod middleware;
pub mod photos;
pub mod posts;
pub mod routes;
pub mod shares;
pub mod uploads;
pub mod words;

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::error;

use dongsung_crypto::Hasher;
use dongsung_db::Database;
use dongsung_db::photos::ReplacePolicy;

use crate::error::ApiError;
use crate::middleware::SessionKeys;
use crate::uploads::UploadStore;

pub use crate::routes::router;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub hasher: Hasher,
    pub sessions: SessionKeys,
    pub uploads: UploadStore,
    pub policy: Policy,
}

/// Deployment-level behaviour switches.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub photo_replace: ReplacePolicy,
    /// Allow resetting a password knowing only the username.
    pub allow_username_reset: bool,
    pub max_upload_bytes: usize,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            photo_replace: ReplacePolicy::AnyMember,
            allow_username_reset: true,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

/// Run blocking DB / hashing work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })?
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| ApiError::invalid(format!("Invalid date '{}', expected YYYY-MM-DD", raw)))
}

pub(crate) fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse()
        .map_err(|_| ApiError::invalid(format!("Invalid id '{}'", raw)))
}

/// Reject empty or whitespace-only required fields.
pub(crate) fn required<'a>(value: &'a str, message: &str) -> Result<&'a str, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::invalid(message));
    }
    Ok(value)
}

/// SQLite stores timestamps as "YYYY-MM-DD HH:MM:SS" without timezone; they
/// are UTC. A value that parses as neither form is a storage fault.
pub(crate) fn timestamp(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    raw.parse::<DateTime<Utc>>()
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|t| t.and_utc()))
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Corrupt timestamp '{}': {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dates_must_be_calendar_days() {
        assert_eq!(parse_date("2025-06-01").unwrap(), NaiveDate::from_ymd_opt(2025, 6, 1).unwrap());
        assert!(parse_date("2025-02-30").is_err());
        assert!(parse_date("06/01/2025").is_err());
        assert!(parse_date("").is_err());
    }

    #[test]
    fn sqlite_timestamps_parse_as_utc() {
        let t = timestamp("2025-06-01 09:30:00").unwrap();
        assert_eq!(t.to_rfc3339(), "2025-06-01T09:30:00+00:00");
        assert_eq!(timestamp("2025-06-01T09:30:00Z").unwrap(), t);
    }

    #[test]
    fn corrupt_timestamps_are_server_errors() {
        let err = timestamp("garbage").unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn blank_fields_are_rejected() {
        assert!(required("  ", "needed").is_err());
        assert_eq!(required("Bob", "needed").unwrap(), "Bob");
    }
}
