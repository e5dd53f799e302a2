//! HTTP tool - a templated REST request against an `http` source

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use reqwest::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::params::{ParamValues, ParameterDecl, validate_decls};
use crate::sources::downcast_source;
use crate::sources::http::HttpSource;
use crate::tools::{ResolveContext, Tool, ToolConfig};
use crate::{Result, ServerError};

/// Registry kind tag
pub const KIND: &str = "http";

/// Configuration fragment for an HTTP tool
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HttpToolConfig {
    #[serde(skip)]
    name: String,
    source: String,
    description: String,
    #[serde(default = "default_method")]
    method: String,
    /// Path appended to the source base URL; `{param}` markers substitute
    /// parsed parameter values
    path: String,
    /// Per-tool headers; values support `{param}` substitution
    #[serde(default)]
    headers: BTreeMap<String, String>,
    /// Query parameters; values support `{param}` substitution
    #[serde(default)]
    query: BTreeMap<String, String>,
    /// JSON body template; string leaves support `{param}` substitution
    #[serde(default)]
    body: Option<Value>,
    #[serde(default)]
    parameters: Vec<ParameterDecl>,
    #[serde(default)]
    auth_required: Vec<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Decode an `http` fragment
pub fn decode_config(name: &str, fragment: &serde_yaml::Value) -> Result<Box<dyn ToolConfig>> {
    let mut config: HttpToolConfig = serde_yaml::from_value(fragment.clone())
        .map_err(|e| ServerError::Config(format!("tool {name}: {e}")))?;
    config.name = name.to_string();
    Ok(Box::new(config))
}

#[async_trait]
impl ToolConfig for HttpToolConfig {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn initialize(&self, ctx: &ResolveContext<'_>) -> Result<Arc<dyn Tool>> {
        let source = ctx.source(&self.name, &self.source)?;
        let http = downcast_source::<HttpSource>(source, KIND, &["http"])?;

        let method = self.method.parse::<Method>().map_err(|e| {
            ServerError::Config(format!(
                "tool {}: invalid HTTP method {}: {e}",
                self.name, self.method
            ))
        })?;

        validate_decls(&self.parameters)
            .map_err(|e| ServerError::Config(format!("tool {}: {e}", self.name)))?;
        ctx.check_auth_refs(&self.name, &self.parameters, &self.auth_required)?;

        Ok(Arc::new(HttpTool {
            name: self.name.clone(),
            description: self.description.clone(),
            method,
            path: self.path.clone(),
            headers: self.headers.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
            parameters: self.parameters.clone(),
            auth_required: self.auth_required.clone(),
            client: http.client().clone(),
            base_url: http.base_url().to_string(),
        }))
    }
}

/// Live HTTP tool
pub struct HttpTool {
    name: String,
    description: String,
    method: Method,
    path: String,
    headers: BTreeMap<String, String>,
    query: BTreeMap<String, String>,
    body: Option<Value>,
    parameters: Vec<ParameterDecl>,
    auth_required: Vec<String>,
    client: reqwest::Client,
    base_url: String,
}

#[async_trait]
impl Tool for HttpTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &'static str {
        KIND
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &[ParameterDecl] {
        &self.parameters
    }

    fn auth_required(&self) -> &[String] {
        &self.auth_required
    }

    async fn invoke(&self, params: ParamValues, _access_token: Option<&str>) -> Result<Value> {
        let named = params.named();

        let path = substitute_string(&self.path, &named);
        if let Some(leftover) = PLACEHOLDER.captures(&path) {
            return Err(ServerError::BadRequest(format!(
                "path references undeclared parameter {}",
                &leftover[1]
            )));
        }
        let url = format!("{}{path}", self.base_url);

        let mut headers = HeaderMap::new();
        for (key, template) in &self.headers {
            let value = substitute_string(template, &named);
            let header_name = key.parse::<HeaderName>().map_err(|e| {
                ServerError::BadRequest(format!("invalid header name {key}: {e}"))
            })?;
            let header_value = value.parse::<HeaderValue>().map_err(|e| {
                ServerError::BadRequest(format!("invalid value for header {key}: {e}"))
            })?;
            headers.insert(header_name, header_value);
        }

        let mut request = self
            .client
            .request(self.method.clone(), &url)
            .headers(headers);

        if !self.query.is_empty() {
            let query: Vec<(String, String)> = self
                .query
                .iter()
                .map(|(k, template)| (k.clone(), substitute_string(template, &named)))
                .collect();
            request = request.query(&query);
        }

        if let Some(template) = &self.body {
            request = request.json(&substitute_value(template, &named));
        }

        let response = request
            .send()
            .await
            .map_err(|e| ServerError::Backend(format!("unable to execute request: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServerError::Backend(format!(
                "unable to execute request: {status}: {body}"
            )));
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json"));

        if is_json {
            response
                .json::<Value>()
                .await
                .map_err(|e| ServerError::Backend(format!("unable to parse response: {e}")))
        } else {
            let text = response
                .text()
                .await
                .map_err(|e| ServerError::Backend(format!("unable to read response: {e}")))?;
            Ok(Value::String(text))
        }
    }
}

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("placeholder regex"));

/// Replace every `{param}` marker with the parameter's rendered value
fn substitute_string(template: &str, named: &Map<String, Value>) -> String {
    let mut out = template.to_string();
    for (name, value) in named {
        let marker = format!("{{{name}}}");
        if out.contains(&marker) {
            out = out.replace(&marker, &render(value));
        }
    }
    out
}

/// Recursively substitute `{param}` markers in the string leaves of a body
/// template; a leaf that is exactly one marker takes the parameter's JSON
/// value, preserving its type
fn substitute_value(template: &Value, named: &Map<String, Value>) -> Value {
    match template {
        Value::String(s) => {
            if let Some(captures) = PLACEHOLDER.captures(s) {
                if captures.get(0).is_some_and(|m| m.len() == s.len()) {
                    if let Some(value) = named.get(&captures[1]) {
                        return value.clone();
                    }
                }
            }
            Value::String(substitute_string(s, named))
        }
        Value::Array(items) => {
            Value::Array(items.iter().map(|v| substitute_value(v, named)).collect())
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, named)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
