//! Spanner admin source - client for instance administration RPCs

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use crate::sources::{Source, SourceConfig};
use crate::{Result, ServerError};

/// Registry kind tag
pub const KIND: &str = "spanner-admin";

/// Configuration fragment for a Spanner admin source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpannerAdminConfig {
    #[serde(skip)]
    name: String,
    /// Cloud project the admin RPCs operate on
    project: String,
    /// Admin API endpoint; overridable for emulators and tests
    #[serde(default = "default_endpoint")]
    endpoint: String,
}

fn default_endpoint() -> String {
    "https://spanner.googleapis.com".to_string()
}

/// Decode a `spanner-admin` fragment
pub fn decode_config(name: &str, fragment: &serde_yaml::Value) -> Result<Box<dyn SourceConfig>> {
    let mut config: SpannerAdminConfig = serde_yaml::from_value(fragment.clone())
        .map_err(|e| ServerError::Config(format!("source {name}: {e}")))?;
    config.name = name.to_string();
    Ok(Box::new(config))
}

#[async_trait]
impl SourceConfig for SpannerAdminConfig {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn initialize(&self) -> Result<Arc<dyn Source>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                ServerError::Config(format!(
                    "source {}: unable to build HTTP client: {e}",
                    self.name
                ))
            })?;

        info!(source = %self.name, project = %self.project, "Spanner admin client ready");
        Ok(Arc::new(SpannerAdminSource {
            name: self.name.clone(),
            project: self.project.clone(),
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
            client,
        }))
    }
}

/// Live Spanner admin source
#[derive(Debug)]
pub struct SpannerAdminSource {
    name: String,
    project: String,
    endpoint: String,
    client: reqwest::Client,
}

impl SpannerAdminSource {
    /// Cloud project
    #[must_use]
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Admin API endpoint without a trailing slash
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The shared client
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Source for SpannerAdminSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn default_endpoint_is_applied() {
        let fragment: serde_yaml::Value = serde_yaml::from_str("project: demo").unwrap();
        let config = decode_config("admin", &fragment).unwrap();
        let source = config.initialize().await.unwrap();
        let admin = source.as_any().downcast_ref::<SpannerAdminSource>().unwrap();
        assert_eq!(admin.endpoint(), "https://spanner.googleapis.com");
        assert_eq!(admin.project(), "demo");
    }
}
