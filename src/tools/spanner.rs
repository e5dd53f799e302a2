//! Spanner create-instance tool - a typed admin RPC

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::params::{ParamType, ParamValues, ParameterDecl};
use crate::sources::downcast_source;
use crate::sources::spanner::SpannerAdminSource;
use crate::tools::{ResolveContext, Tool, ToolConfig};
use crate::{Result, ServerError};

/// Registry kind tag
pub const KIND: &str = "spanner-create-instance";

/// Exact compute-capacity validation message; one of the two capacity
/// fields must carry the instance size
pub const CAPACITY_ERROR: &str =
    "one of nodeCount or processingUnits must be positive, and the other must be 0";

/// Configuration fragment for a create-instance tool
///
/// The parameter set is fixed by the RPC shape, so the fragment only binds
/// the source and policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SpannerCreateInstanceConfig {
    #[serde(skip)]
    name: String,
    source: String,
    #[serde(default = "default_description")]
    description: String,
    #[serde(default)]
    auth_required: Vec<String>,
}

fn default_description() -> String {
    "Create a Cloud Spanner instance in the configured project.".to_string()
}

/// Decode a `spanner-create-instance` fragment
pub fn decode_config(name: &str, fragment: &serde_yaml::Value) -> Result<Box<dyn ToolConfig>> {
    let mut config: SpannerCreateInstanceConfig = serde_yaml::from_value(fragment.clone())
        .map_err(|e| ServerError::Config(format!("tool {name}: {e}")))?;
    config.name = name.to_string();
    Ok(Box::new(config))
}

fn parameter_decls() -> Vec<ParameterDecl> {
    vec![
        ParameterDecl::new(
            "instanceId",
            ParamType::String,
            "Identifier for the new instance, unique within the project.",
        ),
        ParameterDecl::new(
            "displayName",
            ParamType::String,
            "Human-readable instance name shown in consoles.",
        ),
        ParameterDecl::new(
            "instanceConfig",
            ParamType::String,
            "Instance configuration, e.g. regional-us-central1.",
        ),
        ParameterDecl::new(
            "nodeCount",
            ParamType::Integer,
            "Compute capacity in nodes; 0 when processingUnits is set.",
        )
        .optional(json!(0)),
        ParameterDecl::new(
            "processingUnits",
            ParamType::Integer,
            "Compute capacity in processing units; 0 when nodeCount is set.",
        )
        .optional(json!(0)),
    ]
}

#[async_trait]
impl ToolConfig for SpannerCreateInstanceConfig {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn initialize(&self, ctx: &ResolveContext<'_>) -> Result<Arc<dyn Tool>> {
        let source = ctx.source(&self.name, &self.source)?;
        let admin = downcast_source::<SpannerAdminSource>(source, KIND, &["spanner-admin"])?;

        let parameters = parameter_decls();
        ctx.check_auth_refs(&self.name, &parameters, &self.auth_required)?;

        Ok(Arc::new(SpannerCreateInstanceTool {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters,
            auth_required: self.auth_required.clone(),
            client: admin.client().clone(),
            project: admin.project().to_string(),
            endpoint: admin.endpoint().to_string(),
        }))
    }
}

/// Live create-instance tool
pub struct SpannerCreateInstanceTool {
    name: String,
    description: String,
    parameters: Vec<ParameterDecl>,
    auth_required: Vec<String>,
    client: reqwest::Client,
    project: String,
    endpoint: String,
}

impl SpannerCreateInstanceTool {
    fn integer_param(params: &ParamValues, name: &str) -> i64 {
        params.get(name).and_then(Value::as_i64).unwrap_or(0)
    }
}

#[async_trait]
impl Tool for SpannerCreateInstanceTool {
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

    async fn invoke(&self, params: ParamValues, access_token: Option<&str>) -> Result<Value> {
        let node_count = Self::integer_param(&params, "nodeCount");
        let processing_units = Self::integer_param(&params, "processingUnits");

        let exactly_one = (node_count > 0 && processing_units == 0)
            || (processing_units > 0 && node_count == 0);
        if !exactly_one {
            return Err(ServerError::BadRequest(CAPACITY_ERROR.to_string()));
        }

        let token = access_token.ok_or_else(|| {
            ServerError::BadRequest(
                "missing access token for Spanner admin request (Authorization: Bearer)"
                    .to_string(),
            )
        })?;

        let instance_id = params
            .get("instanceId")
            .and_then(Value::as_str)
            .ok_or_else(|| ServerError::Internal("instanceId missing after parse".to_string()))?;
        let display_name = params.get("displayName").and_then(Value::as_str);
        let instance_config = params
            .get("instanceConfig")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                ServerError::Internal("instanceConfig missing after parse".to_string())
            })?;

        let mut instance = json!({
            "displayName": display_name,
            "config": format!("projects/{}/instanceConfigs/{}", self.project, instance_config),
        });
        if node_count > 0 {
            instance["nodeCount"] = json!(node_count);
        } else {
            instance["processingUnits"] = json!(processing_units);
        }

        let url = format!("{}/v1/projects/{}/instances", self.endpoint, self.project);
        let response = self
            .client
            .post(&url)
            .bearer_auth(token)
            .json(&json!({
                "instanceId": instance_id,
                "instance": instance,
            }))
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

        response
            .json::<Value>()
            .await
            .map_err(|e| ServerError::Backend(format!("unable to parse response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{ClaimsMap, parse_params};

    fn tool() -> SpannerCreateInstanceTool {
        SpannerCreateInstanceTool {
            name: "my-create-instance".to_string(),
            description: default_description(),
            parameters: parameter_decls(),
            auth_required: Vec::new(),
            client: reqwest::Client::new(),
            project: "demo".to_string(),
            endpoint: "http://127.0.0.1:1".to_string(),
        }
    }

    fn parse(tool: &SpannerCreateInstanceTool, body: Value) -> ParamValues {
        let Value::Object(body) = body else {
            panic!("body must be an object");
        };
        parse_params(tool.parameters(), &body, &ClaimsMap::new()).unwrap()
    }

    #[tokio::test]
    async fn both_capacity_fields_positive_is_rejected() {
        let tool = tool();
        let params = parse(
            &tool,
            json!({
                "instanceId": "inst-1",
                "displayName": "Instance One",
                "instanceConfig": "regional-us-central1",
                "nodeCount": 1,
                "processingUnits": 100,
            }),
        );
        let err = tool.invoke(params, Some("token")).await.unwrap_err();
        assert_eq!(err.to_string(), CAPACITY_ERROR);
    }

    #[tokio::test]
    async fn both_capacity_fields_zero_is_rejected() {
        let tool = tool();
        let params = parse(
            &tool,
            json!({
                "instanceId": "inst-1",
                "displayName": "Instance One",
                "instanceConfig": "regional-us-central1",
            }),
        );
        let err = tool.invoke(params, Some("token")).await.unwrap_err();
        assert_eq!(err.to_string(), CAPACITY_ERROR);
    }

    #[tokio::test]
    async fn missing_access_token_is_rejected_before_dispatch() {
        let tool = tool();
        let params = parse(
            &tool,
            json!({
                "instanceId": "inst-1",
                "displayName": "Instance One",
                "instanceConfig": "regional-us-central1",
                "nodeCount": 1,
            }),
        );
        let err = tool.invoke(params, None).await.unwrap_err();
        assert!(err.to_string().contains("missing access token"));
    }

    #[test]
    fn manifest_exposes_the_fixed_parameter_set() {
        let tool = tool();
        let manifest = tool.manifest();
        let names: Vec<&str> = manifest
            .parameters
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec![
                "instanceId",
                "displayName",
                "instanceConfig",
                "nodeCount",
                "processingUnits"
            ]
        );
    }
}
