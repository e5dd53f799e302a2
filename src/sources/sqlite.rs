//! SQLite source - a single-connection pool over a database file

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::info;

use crate::sources::{Source, SourceConfig};
use crate::{Result, ServerError};

/// Registry kind tag
pub const KIND: &str = "sqlite";

/// Configuration fragment for a SQLite source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SqliteConfig {
    #[serde(skip)]
    name: String,
    /// Path to the database file, or `:memory:` for an in-process database
    database: String,
}

/// Decode a `sqlite` fragment
pub fn decode_config(name: &str, fragment: &serde_yaml::Value) -> Result<Box<dyn SourceConfig>> {
    let mut config: SqliteConfig = serde_yaml::from_value(fragment.clone())
        .map_err(|e| ServerError::Config(format!("source {name}: {e}")))?;
    config.name = name.to_string();
    Ok(Box::new(config))
}

#[async_trait]
impl SourceConfig for SqliteConfig {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn initialize(&self) -> Result<Arc<dyn Source>> {
        let url = if self.database == ":memory:" {
            "sqlite::memory:".to_string()
        } else {
            // rwc: create the file on first start
            format!("sqlite:{}?mode=rwc", self.database)
        };

        // SQLite allows a single writer; one pooled connection avoids
        // SQLITE_BUSY under concurrent tool invocations
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(&url)
            .await
            .map_err(|e| {
                ServerError::Config(format!(
                    "source {}: unable to open sqlite database: {e}",
                    self.name
                ))
            })?;

        info!(source = %self.name, database = %self.database, "SQLite pool ready");
        Ok(Arc::new(SqliteSource {
            name: self.name.clone(),
            pool,
        }))
    }
}

/// Live SQLite source
#[derive(Debug)]
pub struct SqliteSource {
    name: String,
    pool: SqlitePool,
}

impl SqliteSource {
    /// The shared connection pool
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl Source for SqliteSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initializes_in_memory_database() {
        let fragment: serde_yaml::Value = serde_yaml::from_str("database: ':memory:'").unwrap();
        let config = decode_config("mem", &fragment).unwrap();
        let source = config.initialize().await.unwrap();
        assert_eq!(source.kind(), "sqlite");
        assert_eq!(source.name(), "mem");
        source.close().await;
    }

    #[tokio::test]
    async fn creates_missing_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fresh.db");
        let fragment: serde_yaml::Value =
            serde_yaml::from_str(&format!("database: '{}'", path.display())).unwrap();
        let config = decode_config("fresh", &fragment).unwrap();
        let source = config.initialize().await.unwrap();
        assert!(path.exists());
        source.close().await;
    }

    #[test]
    fn decode_requires_database() {
        let fragment: serde_yaml::Value = serde_yaml::from_str("{}").unwrap();
        assert!(decode_config("mem", &fragment).is_err());
    }
}
