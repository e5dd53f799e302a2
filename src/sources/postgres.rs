//! Postgres source - a shared connection pool

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use tracing::info;

use crate::sources::{Source, SourceConfig};
use crate::{Result, ServerError};

/// Registry kind tag
pub const KIND: &str = "postgres";

/// Configuration fragment for a Postgres source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostgresConfig {
    #[serde(skip)]
    name: String,
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    user: String,
    #[serde(default)]
    password: String,
    database: String,
    /// Upper bound on pooled connections shared by all tools on this source
    #[serde(default = "default_max_connections")]
    max_connections: u32,
}

fn default_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    10
}

/// Decode a `postgres` fragment
pub fn decode_config(name: &str, fragment: &serde_yaml::Value) -> Result<Box<dyn SourceConfig>> {
    let mut config: PostgresConfig = serde_yaml::from_value(fragment.clone())
        .map_err(|e| ServerError::Config(format!("source {name}: {e}")))?;
    config.name = name.to_string();
    Ok(Box::new(config))
}

#[async_trait]
impl SourceConfig for PostgresConfig {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn initialize(&self) -> Result<Arc<dyn Source>> {
        let options = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.user)
            .password(&self.password)
            .database(&self.database);

        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| {
                ServerError::Config(format!(
                    "source {}: unable to connect to postgres: {e}",
                    self.name
                ))
            })?;

        info!(source = %self.name, host = %self.host, database = %self.database, "Postgres pool ready");
        Ok(Arc::new(PostgresSource {
            name: self.name.clone(),
            pool,
        }))
    }
}

/// Live Postgres source
#[derive(Debug)]
pub struct PostgresSource {
    name: String,
    pool: PgPool,
}

impl PostgresSource {
    /// The shared connection pool
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Source for PostgresSource {
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
