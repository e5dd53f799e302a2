//! Tool abstraction - parameterized operations bound to a source
//!
//! A tool binds a source, an operation template, a parameter schema, and an
//! authorization policy. Initialization performs all cross-reference
//! validation (source resolution and capability check, auth-service
//! references); invocation receives already-parsed parameter values.

pub mod http;
pub mod postgres;
pub mod spanner;
pub mod sqlite;

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};

use crate::auth::AuthService;
use crate::params::{
    self, ClaimsMap, Manifest, ParamValues, ParameterDecl, input_schema, manifest_parameters,
};
use crate::protocol;
use crate::sources::Source;
use crate::{Result, ServerError};

/// Maps handed to tool initialization for cross-reference validation
pub struct ResolveContext<'a> {
    /// Initialized sources by name
    pub sources: &'a HashMap<String, Arc<dyn Source>>,
    /// Initialized auth services by name
    pub auth_services: &'a HashMap<String, Arc<dyn AuthService>>,
}

impl ResolveContext<'_> {
    /// Resolve a tool's `source` reference
    pub fn source(&self, tool_name: &str, source_name: &str) -> Result<&Arc<dyn Source>> {
        self.sources.get(source_name).ok_or_else(|| {
            ServerError::Config(format!(
                "tool {tool_name} references undefined source {source_name}"
            ))
        })
    }

    /// Check every auth-service reference a tool carries: the members of
    /// `authRequired` and the services named by authenticated parameters
    pub fn check_auth_refs(
        &self,
        tool_name: &str,
        decls: &[ParameterDecl],
        auth_required: &[String],
    ) -> Result<()> {
        for service in auth_required {
            if !self.auth_services.contains_key(service) {
                return Err(ServerError::Config(format!(
                    "tool {tool_name} requires undefined auth service {service}"
                )));
            }
        }
        for decl in decls {
            for binding in &decl.auth_services {
                if !self.auth_services.contains_key(&binding.name) {
                    return Err(ServerError::Config(format!(
                        "tool {tool_name}: parameter {} references undefined auth service {}",
                        decl.name, binding.name
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Decoded configuration for one tool, ready to be initialized
#[async_trait]
pub trait ToolConfig: Send + Sync {
    /// Kind tag this configuration was registered under
    fn kind(&self) -> &'static str;

    /// Validate cross-references and bind to the source
    async fn initialize(&self, ctx: &ResolveContext<'_>) -> Result<Arc<dyn Tool>>;
}

/// An invocable tool bound to its source
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name from the document
    fn name(&self) -> &str;

    /// Kind tag
    fn kind(&self) -> &'static str;

    /// Human-readable description
    fn description(&self) -> &str;

    /// Full parameter declarations in order, template parameters last
    fn parameters(&self) -> &[ParameterDecl];

    /// Auth services that gate invocation; empty means anonymous
    fn auth_required(&self) -> &[String];

    /// REST manifest; a pure function of the decoded configuration
    fn manifest(&self) -> Manifest {
        Manifest {
            description: self.description().to_string(),
            parameters: manifest_parameters(self.parameters()),
            auth_required: self.auth_required().to_vec(),
        }
    }

    /// MCP manifest; a pure function of the decoded configuration
    fn mcp_manifest(&self) -> protocol::Tool {
        protocol::Tool {
            name: self.name().to_string(),
            description: Some(self.description().to_string()),
            input_schema: input_schema(self.parameters()),
        }
    }

    /// Membership-only authorization: holds when `authRequired` is empty or
    /// at least one listed service verified on this request
    fn authorized(&self, claims: &ClaimsMap) -> bool {
        self.auth_required().is_empty()
            || self
                .auth_required()
                .iter()
                .any(|service| claims.contains_key(service))
    }

    /// Parse a request body into ordered values
    fn parse_params(&self, body: &Map<String, Value>, claims: &ClaimsMap) -> Result<ParamValues> {
        params::parse_params(self.parameters(), body, claims)
    }

    /// Dispatch against the backing source
    async fn invoke(&self, params: ParamValues, access_token: Option<&str>) -> Result<Value>;
}

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

static TEMPLATE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([A-Za-z0-9_]+)\s*\}\}").expect("template marker regex"));

/// Substitute `{{name}}` markers in a statement from template parameters
///
/// Values substitute textually (table names, column lists), so each piece
/// must satisfy identifier syntax. A marker with no matching template
/// parameter is rejected rather than passed through to the backend.
pub(crate) fn substitute_template(statement: &str, templates: &ParamValues) -> Result<String> {
    let mut out = statement.to_string();
    for param in templates {
        let substitution = template_value(&param.name, &param.value)?;
        let marker_re = Regex::new(&format!(r"\{{\{{\s*{}\s*\}}\}}", regex::escape(&param.name)))
            .map_err(|e| ServerError::Internal(format!("template marker: {e}")))?;
        out = marker_re.replace_all(&out, substitution.as_str()).into_owned();
    }

    if let Some(leftover) = TEMPLATE_MARKER.captures(&out) {
        return Err(ServerError::BadRequest(format!(
            "statement references undeclared template parameter {}",
            &leftover[1]
        )));
    }
    Ok(out)
}

/// Render one template parameter, validating identifier syntax
fn template_value(name: &str, value: &Value) -> Result<String> {
    let pieces: Vec<&str> = match value {
        Value::String(s) => vec![s.as_str()],
        Value::Array(items) => items
            .iter()
            .map(|v| {
                v.as_str().ok_or_else(|| {
                    ServerError::BadRequest(format!(
                        "template parameter {name} must contain only strings"
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?,
        _ => {
            return Err(ServerError::BadRequest(format!(
                "template parameter {name} must be a string or an array of strings"
            )));
        }
    };

    for piece in &pieces {
        if !IDENTIFIER.is_match(piece) {
            return Err(ServerError::BadRequest(format!(
                "invalid identifier for template parameter {name}: {piece}"
            )));
        }
    }
    Ok(pieces.join(", "))
}

/// Config-time check that template parameter declarations can substitute
pub(crate) fn validate_template_decls(tool_name: &str, decls: &[ParameterDecl]) -> Result<()> {
    use crate::params::ParamType;
    for decl in decls {
        let ok = match decl.param_type {
            ParamType::String => true,
            ParamType::Array => decl
                .items
                .as_ref()
                .is_some_and(|items| items.param_type == ParamType::String),
            _ => false,
        };
        if !ok {
            return Err(ServerError::Config(format!(
                "tool {tool_name}: template parameter {} must be a string or an array of strings",
                decl.name
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::parse_params;
    use serde_json::json;

    fn templates(decls_yaml: &str, body: Value) -> ParamValues {
        let decls: Vec<ParameterDecl> = serde_yaml::from_str(decls_yaml).unwrap();
        let Value::Object(body) = body else {
            panic!("body must be an object");
        };
        parse_params(&decls, &body, &ClaimsMap::new()).unwrap()
    }

    #[test]
    fn substitutes_table_and_column_markers() {
        let values = templates(
            "[{name: tableName, type: string}, {name: columns, type: array, items: {name: columns, type: string}}]",
            json!({"tableName": "users", "columns": ["id", "name"]}),
        );
        let statement =
            substitute_template("SELECT {{columns}} FROM {{tableName}} WHERE id = $1", &values)
                .unwrap();
        assert_eq!(statement, "SELECT id, name FROM users WHERE id = $1");
    }

    #[test]
    fn rejects_non_identifier_substitution() {
        let values = templates(
            "[{name: tableName, type: string}]",
            json!({"tableName": "users; DROP TABLE users"}),
        );
        let err = substitute_template("SELECT * FROM {{tableName}}", &values).unwrap_err();
        assert!(
            err.to_string()
                .contains("invalid identifier for template parameter tableName")
        );
    }

    #[test]
    fn rejects_undeclared_marker() {
        let values = templates("[{name: tableName, type: string}]", json!({"tableName": "t"}));
        let err = substitute_template("SELECT * FROM {{other}}", &values).unwrap_err();
        assert_eq!(
            err.to_string(),
            "statement references undeclared template parameter other"
        );
    }

    #[test]
    fn template_decl_validation() {
        let good: Vec<ParameterDecl> = serde_yaml::from_str(
            "[{name: t, type: string}, {name: c, type: array, items: {name: c, type: string}}]",
        )
        .unwrap();
        assert!(validate_template_decls("my-tool", &good).is_ok());

        let bad: Vec<ParameterDecl> = serde_yaml::from_str("[{name: n, type: integer}]").unwrap();
        let err = validate_template_decls("my-tool", &bad).unwrap_err();
        assert!(err.to_string().contains("template parameter n"));
    }

    struct ManifestOnlyTool {
        decls: Vec<ParameterDecl>,
        auth: Vec<String>,
    }

    #[async_trait]
    impl Tool for ManifestOnlyTool {
        fn name(&self) -> &str {
            "manifest-only"
        }
        fn kind(&self) -> &'static str {
            "test"
        }
        fn description(&self) -> &str {
            "A tool used only for manifest tests."
        }
        fn parameters(&self) -> &[ParameterDecl] {
            &self.decls
        }
        fn auth_required(&self) -> &[String] {
            &self.auth
        }
        async fn invoke(&self, _params: ParamValues, _token: Option<&str>) -> Result<Value> {
            Ok(Value::Null)
        }
    }

    #[test]
    fn manifests_are_pure_functions_of_the_config() {
        let tool = ManifestOnlyTool {
            decls: serde_yaml::from_str("[{name: id, type: integer, description: row id}]")
                .unwrap(),
            auth: vec!["my-google-auth".to_string()],
        };
        assert_eq!(tool.manifest(), tool.manifest());
        assert_eq!(tool.mcp_manifest(), tool.mcp_manifest());
        assert_eq!(
            tool.mcp_manifest().input_schema["properties"]["id"]["type"],
            "integer"
        );
    }

    #[test]
    fn authorization_is_membership_only() {
        let anonymous = ManifestOnlyTool {
            decls: Vec::new(),
            auth: Vec::new(),
        };
        assert!(anonymous.authorized(&ClaimsMap::new()));

        let gated = ManifestOnlyTool {
            decls: Vec::new(),
            auth: vec!["my-google-auth".to_string()],
        };
        assert!(!gated.authorized(&ClaimsMap::new()));

        let mut claims = ClaimsMap::new();
        claims.insert("my-google-auth".to_string(), Map::new());
        assert!(gated.authorized(&claims));

        let mut other = ClaimsMap::new();
        other.insert("unrelated".to_string(), Map::new());
        assert!(!gated.authorized(&other));
    }
}
