use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use dongsung_db::photos::ReplacePolicy;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub photo_replace: ReplacePolicy,
    pub allow_username_reset: bool,
    /// Argon2 memory cost in KiB and iteration count; `None` keeps the
    /// library defaults.
    pub hash_memory_kib: Option<u32>,
    pub hash_iterations: Option<u32>,
    pub max_upload_mb: usize,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let jwt_secret = lookup("DONGSUNG_JWT_SECRET").unwrap_or_else(|| {
            warn!("DONGSUNG_JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.to_string()
        });

        let token_ttl_hours: i64 = try_load(&lookup, "DONGSUNG_TOKEN_TTL_HOURS", "1")?;
        if token_ttl_hours <= 0 {
            bail!("DONGSUNG_TOKEN_TTL_HOURS must be positive, got {}", token_ttl_hours);
        }
        let max_upload_mb: usize = try_load(&lookup, "DONGSUNG_MAX_UPLOAD_MB", "50")?;
        if max_upload_mb == 0 {
            bail!("DONGSUNG_MAX_UPLOAD_MB must be positive");
        }

        Ok(Self {
            host: try_load(&lookup, "DONGSUNG_HOST", "0.0.0.0")?,
            port: try_load(&lookup, "DONGSUNG_PORT", "3001")?,
            db_path: try_load(&lookup, "DONGSUNG_DB_PATH", "dongsung.db")?,
            uploads_dir: try_load(&lookup, "DONGSUNG_UPLOADS_DIR", "./uploads")?,
            jwt_secret,
            token_ttl_hours,
            photo_replace: try_load(&lookup, "DONGSUNG_PHOTO_REPLACE", "any")?,
            allow_username_reset: try_load(&lookup, "DONGSUNG_ALLOW_USERNAME_RESET", "true")?,
            hash_memory_kib: try_optional(&lookup, "DONGSUNG_HASH_MEMORY_KIB")?,
            hash_iterations: try_optional(&lookup, "DONGSUNG_HASH_ITERATIONS")?,
            max_upload_mb,
        })
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb * 1024 * 1024
    }
}

fn try_load<T: FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("Invalid {key} value '{raw}'"))
}

fn try_optional<T: FromStr>(lookup: impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{e}"))
            .with_context(|| format!("Invalid {key} value '{raw}'")),
        None => Ok(None),
    }
}
