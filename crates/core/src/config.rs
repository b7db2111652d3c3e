//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Nothing below the binary reads environment variables.

use crate::constants::{CATALOG_FILE_NAME, DEFAULT_BATCH_SIZE, DEFAULT_MAX_CONNECTIONS};
use crate::{CoreError, CoreResult};
use stash_files::SYSTEM_DIR_NAME;
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    database_url: String,
    max_connections: u32,
    batch_size: usize,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] if the database URL is empty or a
    /// count is zero.
    pub fn new(
        data_dir: PathBuf,
        database_url: String,
        max_connections: u32,
        batch_size: usize,
    ) -> CoreResult<Self> {
        if database_url.trim().is_empty() {
            return Err(CoreError::InvalidInput(
                "database_url cannot be empty".into(),
            ));
        }
        if max_connections == 0 {
            return Err(CoreError::InvalidInput(
                "max_connections must be at least 1".into(),
            ));
        }
        if batch_size == 0 {
            return Err(CoreError::InvalidInput(
                "batch_size must be at least 1".into(),
            ));
        }

        Ok(Self {
            data_dir,
            database_url,
            max_connections,
            batch_size,
        })
    }

    /// Configuration with defaults for everything except the data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> CoreResult<Self> {
        let database_url = resolve_database_url(None, &data_dir);
        Self::new(
            data_dir,
            database_url,
            DEFAULT_MAX_CONNECTIONS,
            DEFAULT_BATCH_SIZE,
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn max_connections(&self) -> u32 {
        self.max_connections
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }
}

/// Resolve the catalog URL without reading environment variables.
///
/// An explicit, non-blank override wins. Otherwise the catalog lives in the
/// data directory's system area.
pub fn resolve_database_url(override_url: Option<String>, data_dir: &Path) -> String {
    override_url
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| {
            format!(
                "sqlite://{}",
                data_dir
                    .join(SYSTEM_DIR_NAME)
                    .join(CATALOG_FILE_NAME)
                    .display()
            )
        })
}

/// Parse an optional positive integer setting, falling back to `default`.
pub fn parse_count_setting<T>(value: Option<String>, name: &str, default: T) -> CoreResult<T>
where
    T: std::str::FromStr + PartialEq + Default,
{
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    match value {
        None => Ok(default),
        Some(v) => match v.parse::<T>() {
            Ok(parsed) if parsed != T::default() => Ok(parsed),
            _ => Err(CoreError::InvalidInput(format!(
                "{} must be a positive integer, got '{}'",
                name, v
            ))),
        },
    }
}
