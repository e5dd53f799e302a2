//! HTTP source - a shared client for a REST endpoint

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use tracing::info;

use crate::sources::{Source, SourceConfig};
use crate::{Result, ServerError};

/// Registry kind tag
pub const KIND: &str = "http";

/// Configuration fragment for an HTTP source
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HttpConfig {
    #[serde(skip)]
    name: String,
    /// Base URL every bound tool's path is appended to
    base_url: String,
    /// Headers sent on every request from this source
    #[serde(default)]
    headers: BTreeMap<String, String>,
    /// Per-request timeout
    #[serde(default = "default_timeout", with = "humantime_serde")]
    timeout: Duration,
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

/// Decode an `http` fragment
pub fn decode_config(name: &str, fragment: &serde_yaml::Value) -> Result<Box<dyn SourceConfig>> {
    let mut config: HttpConfig = serde_yaml::from_value(fragment.clone())
        .map_err(|e| ServerError::Config(format!("source {name}: {e}")))?;
    config.name = name.to_string();
    Ok(Box::new(config))
}

#[async_trait]
impl SourceConfig for HttpConfig {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn initialize(&self) -> Result<Arc<dyn Source>> {
        let mut default_headers = HeaderMap::new();
        for (key, value) in &self.headers {
            let header_name = key.parse::<HeaderName>().map_err(|e| {
                ServerError::Config(format!("source {}: invalid header name {key}: {e}", self.name))
            })?;
            let header_value = value.parse::<HeaderValue>().map_err(|e| {
                ServerError::Config(format!(
                    "source {}: invalid value for header {key}: {e}",
                    self.name
                ))
            })?;
            default_headers.insert(header_name, header_value);
        }

        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| {
                ServerError::Config(format!(
                    "source {}: unable to build HTTP client: {e}",
                    self.name
                ))
            })?;

        info!(source = %self.name, base_url = %self.base_url, "HTTP client ready");
        Ok(Arc::new(HttpSource {
            name: self.name.clone(),
            base_url: self.base_url.trim_end_matches('/').to_string(),
            client,
        }))
    }
}

/// Live HTTP source
#[derive(Debug)]
pub struct HttpSource {
    name: String,
    base_url: String,
    client: reqwest::Client,
}

impl HttpSource {
    /// The shared client
    #[must_use]
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Base URL without a trailing slash
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl Source for HttpSource {
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
