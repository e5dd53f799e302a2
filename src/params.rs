//! Typed tool parameters
//!
//! Declarations come from the tools document; request bodies arrive as
//! generic JSON. Parsing performs one-way coercion into the declared types,
//! injects authenticated parameters from verified claims, and preserves
//! declaration order so values can be projected positionally into prepared
//! statements.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Result, ServerError};

/// Claims mapping produced by one verified auth service
pub type Claims = Map<String, Value>;

/// Per-request map of verified service name to its claims
pub type ClaimsMap = HashMap<String, Claims>;

/// Semantic parameter type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    /// UTF-8 string
    String,
    /// Whole number
    Integer,
    /// Any numeric
    Float,
    /// Strict boolean
    Boolean,
    /// Homogeneous list; element shape comes from `items`
    Array,
    /// Nested mapping; field shapes come from `fields`
    Object,
}

impl ParamType {
    /// Name used in diagnostics and manifests
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }

    /// JSON-Schema type keyword
    fn schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        }
    }
}

impl std::fmt::Display for ParamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Binding of a parameter to one claim of one auth service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClaimBinding {
    /// Auth service name (must resolve in the document)
    pub name: String,
    /// Claim field to read from that service's verified claims
    pub field: String,
}

/// Declaration of a single tool parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParameterDecl {
    /// Parameter name, unique within the tool
    pub name: String,
    /// Declared semantic type
    #[serde(rename = "type")]
    pub param_type: ParamType,
    /// Human-readable description, surfaced in manifests
    #[serde(default)]
    pub description: String,
    /// Whether the request must supply a value (default true)
    #[serde(default = "default_required")]
    pub required: bool,
    /// Value used when an optional parameter is absent
    #[serde(default)]
    pub default: Option<Value>,
    /// Element declaration for `array` parameters
    #[serde(default)]
    pub items: Option<Box<ParameterDecl>>,
    /// Field declarations for `object` parameters
    #[serde(default)]
    pub fields: Vec<ParameterDecl>,
    /// When non-empty the parameter is authenticated: its value comes from
    /// the first listed service that verified on this request, never from
    /// the body
    #[serde(default)]
    pub auth_services: Vec<ClaimBinding>,
}

fn default_required() -> bool {
    true
}

impl ParameterDecl {
    /// Shorthand used by tools with built-in parameter sets
    #[must_use]
    pub fn new(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.to_string(),
            param_type,
            description: description.to_string(),
            required: true,
            default: None,
            items: None,
            fields: Vec::new(),
            auth_services: Vec::new(),
        }
    }

    /// Mark the parameter optional with a default value
    #[must_use]
    pub fn optional(mut self, default: Value) -> Self {
        self.required = false;
        self.default = Some(default);
        self
    }

    /// Whether the value is injected from verified claims
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        !self.auth_services.is_empty()
    }
}

/// One parsed parameter value
#[derive(Debug, Clone, PartialEq)]
pub struct ParamValue {
    /// Declared parameter name
    pub name: String,
    /// Coerced value
    pub value: Value,
}

/// Ordered sequence of parsed values, order matching declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamValues(Vec<ParamValue>);

impl ParamValues {
    /// Number of values
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the sequence is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate values in declaration order
    pub fn iter(&self) -> std::slice::Iter<'_, ParamValue> {
        self.0.iter()
    }

    /// Positional projection for parameterized backend calls
    #[must_use]
    pub fn positional(&self) -> Vec<&Value> {
        self.0.iter().map(|p| &p.value).collect()
    }

    /// Named projection for template substitution
    #[must_use]
    pub fn named(&self) -> Map<String, Value> {
        self.0
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect()
    }

    /// Look up a value by name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|p| p.name == name).map(|p| &p.value)
    }

    /// Split off the trailing values, keeping declaration order in both halves
    #[must_use]
    pub fn split_at(mut self, mid: usize) -> (Self, Self) {
        let tail = self.0.split_off(mid);
        (self, Self(tail))
    }
}

impl<'a> IntoIterator for &'a ParamValues {
    type Item = &'a ParamValue;
    type IntoIter = std::slice::Iter<'a, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// Validate a declaration list at tool-initialization time
///
/// Checks name uniqueness, that arrays declare `items`, and that nested
/// declarations are themselves valid. Auth-service reference resolution
/// happens separately, where the service map is in scope.
pub fn validate_decls(decls: &[ParameterDecl]) -> Result<()> {
    let mut seen = HashSet::new();
    for decl in decls {
        if !seen.insert(decl.name.as_str()) {
            return Err(ServerError::Config(format!(
                "duplicate parameter {}",
                decl.name
            )));
        }
        validate_decl(decl)?;
    }
    Ok(())
}

fn validate_decl(decl: &ParameterDecl) -> Result<()> {
    match decl.param_type {
        ParamType::Array => {
            let items = decl.items.as_ref().ok_or_else(|| {
                ServerError::Config(format!(
                    "array parameter {} must declare items",
                    decl.name
                ))
            })?;
            validate_decl(items)
        }
        ParamType::Object => {
            let mut seen = HashSet::new();
            for field in &decl.fields {
                if !seen.insert(field.name.as_str()) {
                    return Err(ServerError::Config(format!(
                        "duplicate field {} in object parameter {}",
                        field.name, decl.name
                    )));
                }
                validate_decl(field)?;
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

/// Parse a request body against a declaration list
///
/// Returns values in declaration order. Authenticated parameters are
/// resolved from `claims` (first matching service wins, in declaration
/// order) and must not appear in the body. Optional parameters missing from
/// the body take their default, or JSON null, so the positional projection
/// keeps declared arity.
pub fn parse_params(
    decls: &[ParameterDecl],
    body: &Map<String, Value>,
    claims: &ClaimsMap,
) -> Result<ParamValues> {
    for key in body.keys() {
        match decls.iter().find(|d| d.name == *key) {
            None => {
                return Err(ServerError::BadRequest(format!("unknown parameter {key}")));
            }
            Some(decl) if decl.is_authenticated() => {
                return Err(ServerError::BadRequest(format!(
                    "parameter {key} is resolved from a verified claim and must not be set in the request"
                )));
            }
            Some(_) => {}
        }
    }

    let mut values = Vec::with_capacity(decls.len());
    for decl in decls {
        let value = if decl.is_authenticated() {
            resolve_claim(decl, claims)?
        } else {
            match body.get(&decl.name) {
                Some(v) => coerce(decl, v)?,
                None if decl.required => {
                    return Err(ServerError::BadRequest(format!(
                        "missing required parameter {}",
                        decl.name
                    )));
                }
                None => decl.default.clone().unwrap_or(Value::Null),
            }
        };
        values.push(ParamValue {
            name: decl.name.clone(),
            value,
        });
    }
    Ok(ParamValues(values))
}

/// Resolve an authenticated parameter from the verified-claims map
fn resolve_claim(decl: &ParameterDecl, claims: &ClaimsMap) -> Result<Value> {
    for binding in &decl.auth_services {
        if let Some(service_claims) = claims.get(&binding.name) {
            if let Some(value) = service_claims.get(&binding.field) {
                return coerce(decl, value);
            }
        }
    }
    let services: Vec<&str> = decl
        .auth_services
        .iter()
        .map(|b| b.name.as_str())
        .collect();
    Err(ServerError::BadRequest(format!(
        "parameter {} requires a verified claim from one of [{}]",
        decl.name,
        services.join(", ")
    )))
}

/// One-way coercion of a JSON value into the declared type
fn coerce(decl: &ParameterDecl, value: &Value) -> Result<Value> {
    let mismatch = || {
        ServerError::BadRequest(format!(
            "parameter {} expected {}, got {}",
            decl.name,
            decl.param_type,
            json_type_name(value)
        ))
    };

    match decl.param_type {
        ParamType::String => match value {
            Value::String(_) => Ok(value.clone()),
            // null passes only for an optional parameter whose default is null
            Value::Null if !decl.required && decl.default == Some(Value::Null) => Ok(Value::Null),
            _ => Err(mismatch()),
        },
        ParamType::Integer => match value {
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Ok(Value::from(i))
                } else if let Some(f) = n.as_f64() {
                    // accept a numerically-equal floating value, reject fractional
                    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
                        #[allow(clippy::cast_possible_truncation)]
                        let whole = f as i64;
                        Ok(Value::from(whole))
                    } else {
                        Err(mismatch())
                    }
                } else {
                    Err(mismatch())
                }
            }
            _ => Err(mismatch()),
        },
        ParamType::Float => match value {
            Value::Number(n) => n.as_f64().map(Value::from).ok_or_else(mismatch),
            _ => Err(mismatch()),
        },
        ParamType::Boolean => match value {
            Value::Bool(_) => Ok(value.clone()),
            _ => Err(mismatch()),
        },
        ParamType::Array => match value {
            Value::Array(elements) => {
                let items = decl.items.as_ref().ok_or_else(|| {
                    ServerError::Internal(format!(
                        "array parameter {} has no items declaration",
                        decl.name
                    ))
                })?;
                let coerced = elements
                    .iter()
                    .map(|e| coerce(items, e))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::Array(coerced))
            }
            _ => Err(mismatch()),
        },
        ParamType::Object => match value {
            Value::Object(map) => {
                for key in map.keys() {
                    if !decl.fields.iter().any(|f| f.name == *key) {
                        return Err(ServerError::BadRequest(format!(
                            "unknown parameter {}.{key}",
                            decl.name
                        )));
                    }
                }
                let mut out = Map::new();
                for field in &decl.fields {
                    match map.get(&field.name) {
                        Some(v) => {
                            out.insert(field.name.clone(), coerce(field, v)?);
                        }
                        None if field.required => {
                            return Err(ServerError::BadRequest(format!(
                                "missing required parameter {}.{}",
                                decl.name, field.name
                            )));
                        }
                        None => {
                            out.insert(
                                field.name.clone(),
                                field.default.clone().unwrap_or(Value::Null),
                            );
                        }
                    }
                }
                Ok(Value::Object(out))
            }
            _ => Err(mismatch()),
        },
    }
}

/// JSON type name used in mismatch diagnostics
fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) => {
            if n.as_i64().is_some() || n.as_u64().is_some() {
                "integer"
            } else {
                "float"
            }
        }
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

// ============================================================================
// Manifest projection
// ============================================================================

/// Serializable description of one parameter, as surfaced over REST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterManifest {
    /// Parameter name
    pub name: String,
    /// Type name
    #[serde(rename = "type")]
    pub param_type: String,
    /// Description
    pub description: String,
    /// Whether the caller must supply the parameter
    pub required: bool,
    /// Names of the auth services an authenticated parameter accepts
    #[serde(rename = "authServices", default, skip_serializing_if = "Vec::is_empty")]
    pub auth_services: Vec<String>,
}

/// Serializable description of a tool, as surfaced over REST
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Tool description
    pub description: String,
    /// Parameters in declaration order
    pub parameters: Vec<ParameterManifest>,
    /// Auth services that gate invocation
    #[serde(rename = "authRequired", default, skip_serializing_if = "Vec::is_empty")]
    pub auth_required: Vec<String>,
}

/// Project declarations into their REST manifest form
#[must_use]
pub fn manifest_parameters(decls: &[ParameterDecl]) -> Vec<ParameterManifest> {
    decls
        .iter()
        .map(|d| ParameterManifest {
            name: d.name.clone(),
            param_type: d.param_type.name().to_string(),
            description: d.description.clone(),
            required: d.required,
            auth_services: d.auth_services.iter().map(|b| b.name.clone()).collect(),
        })
        .collect()
}

/// Derive the MCP `inputSchema` for a declaration list
///
/// Authenticated parameters are omitted entirely: their values come from
/// verified claims, so the model must not attempt to supply them.
#[must_use]
pub fn input_schema(decls: &[ParameterDecl]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for decl in decls.iter().filter(|d| !d.is_authenticated()) {
        properties.insert(decl.name.clone(), decl_schema(decl));
        if decl.required {
            required.push(Value::from(decl.name.clone()));
        }
    }
    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::from("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    schema.insert("required".to_string(), Value::Array(required));
    Value::Object(schema)
}

fn decl_schema(decl: &ParameterDecl) -> Value {
    let mut schema = Map::new();
    schema.insert(
        "type".to_string(),
        Value::from(decl.param_type.schema_type()),
    );
    if !decl.description.is_empty() {
        schema.insert("description".to_string(), Value::from(decl.description.clone()));
    }
    match decl.param_type {
        ParamType::Array => {
            if let Some(items) = &decl.items {
                schema.insert("items".to_string(), decl_schema(items));
            }
        }
        ParamType::Object => {
            let mut properties = Map::new();
            let mut required = Vec::new();
            for field in &decl.fields {
                properties.insert(field.name.clone(), decl_schema(field));
                if field.required {
                    required.push(Value::from(field.name.clone()));
                }
            }
            schema.insert("properties".to_string(), Value::Object(properties));
            schema.insert("required".to_string(), Value::Array(required));
        }
        _ => {}
    }
    Value::Object(schema)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn body(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            other => panic!("expected object body, got {other}"),
        }
    }

    fn decls_from_yaml(yaml: &str) -> Vec<ParameterDecl> {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn parse_preserves_declaration_order() {
        let decls = decls_from_yaml(
            r"
- name: alpha
  type: string
- name: beta
  type: integer
- name: gamma
  type: boolean
",
        );
        // body keys deliberately in a different order
        let parsed = parse_params(
            &decls,
            &body(json!({"gamma": true, "alpha": "x", "beta": 2})),
            &ClaimsMap::new(),
        )
        .unwrap();

        let names: Vec<&str> = parsed.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["alpha", "beta", "gamma"]);
        assert_eq!(parsed.positional(), vec![&json!("x"), &json!(2), &json!(true)]);
    }

    #[test]
    fn integer_accepts_whole_float_rejects_fractional() {
        let decls = decls_from_yaml("- {name: id, type: integer}");
        let ok = parse_params(&decls, &body(json!({"id": 3.0})), &ClaimsMap::new()).unwrap();
        assert_eq!(ok.get("id"), Some(&json!(3)));

        let err = parse_params(&decls, &body(json!({"id": 3.5})), &ClaimsMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "parameter id expected integer, got float");
    }

    #[test]
    fn string_rejects_number() {
        let decls = decls_from_yaml("- {name: name, type: string}");
        let err = parse_params(&decls, &body(json!({"name": 7})), &ClaimsMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "parameter name expected string, got integer");
    }

    #[test]
    fn boolean_is_strict() {
        let decls = decls_from_yaml("- {name: flag, type: boolean}");
        assert!(parse_params(&decls, &body(json!({"flag": true})), &ClaimsMap::new()).is_ok());
        let err =
            parse_params(&decls, &body(json!({"flag": "true"})), &ClaimsMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "parameter flag expected boolean, got string");
    }

    #[test]
    fn float_accepts_any_numeric() {
        let decls = decls_from_yaml("- {name: ratio, type: float}");
        let parsed = parse_params(&decls, &body(json!({"ratio": 2})), &ClaimsMap::new()).unwrap();
        assert_eq!(parsed.get("ratio"), Some(&json!(2.0)));
    }

    #[test]
    fn missing_required_parameter() {
        let decls = decls_from_yaml("- {name: id, type: integer}");
        let err = parse_params(&decls, &body(json!({})), &ClaimsMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter id");
    }

    #[test]
    fn unknown_parameter_rejected() {
        let decls = decls_from_yaml("- {name: id, type: integer}");
        let err =
            parse_params(&decls, &body(json!({"id": 1, "bogus": 2})), &ClaimsMap::new())
                .unwrap_err();
        assert_eq!(err.to_string(), "unknown parameter bogus");
    }

    #[test]
    fn optional_missing_takes_default_then_null() {
        let decls = decls_from_yaml(
            r#"
- {name: limit, type: integer, required: false, default: 10}
- {name: cursor, type: string, required: false}
"#,
        );
        let parsed = parse_params(&decls, &body(json!({})), &ClaimsMap::new()).unwrap();
        assert_eq!(parsed.get("limit"), Some(&json!(10)));
        assert_eq!(parsed.get("cursor"), Some(&Value::Null));
    }

    #[test]
    fn null_string_only_when_optional_with_null_default() {
        let decl = ParameterDecl::new("note", ParamType::String, "").optional(Value::Null);
        let parsed = parse_params(
            std::slice::from_ref(&decl),
            &body(json!({"note": null})),
            &ClaimsMap::new(),
        )
        .unwrap();
        assert_eq!(parsed.get("note"), Some(&Value::Null));

        let strict = decls_from_yaml("- {name: note, type: string}");
        assert!(parse_params(&strict, &body(json!({"note": null})), &ClaimsMap::new()).is_err());
    }

    #[test]
    fn array_elements_coerced_recursively() {
        let decls = decls_from_yaml(
            r"
- name: ids
  type: array
  items: {name: ids, type: integer}
",
        );
        let parsed =
            parse_params(&decls, &body(json!({"ids": [1, 2.0, 3]})), &ClaimsMap::new()).unwrap();
        assert_eq!(parsed.get("ids"), Some(&json!([1, 2, 3])));

        let err =
            parse_params(&decls, &body(json!({"ids": [1, "x"]})), &ClaimsMap::new()).unwrap_err();
        assert_eq!(err.to_string(), "parameter ids expected integer, got string");
    }

    #[test]
    fn object_fields_checked() {
        let decls = decls_from_yaml(
            r"
- name: filter
  type: object
  fields:
    - {name: column, type: string}
    - {name: limit, type: integer, required: false, default: 5}
",
        );
        let parsed = parse_params(
            &decls,
            &body(json!({"filter": {"column": "name"}})),
            &ClaimsMap::new(),
        )
        .unwrap();
        assert_eq!(
            parsed.get("filter"),
            Some(&json!({"column": "name", "limit": 5}))
        );

        let err = parse_params(
            &decls,
            &body(json!({"filter": {"column": "name", "junk": 1}})),
            &ClaimsMap::new(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "unknown parameter filter.junk");

        let err = parse_params(&decls, &body(json!({"filter": {}})), &ClaimsMap::new())
            .unwrap_err();
        assert_eq!(err.to_string(), "missing required parameter filter.column");
    }

    #[test]
    fn authenticated_parameter_resolved_from_claims() {
        let decls = decls_from_yaml(
            r"
- name: email
  type: string
  authServices:
    - {name: my-google-auth, field: email}
",
        );

        // no claims: the dedicated message lists candidate services
        let err = parse_params(&decls, &body(json!({})), &ClaimsMap::new()).unwrap_err();
        assert_eq!(
            err.to_string(),
            "parameter email requires a verified claim from one of [my-google-auth]"
        );

        // verified claims supply the value
        let mut claims = ClaimsMap::new();
        claims.insert(
            "my-google-auth".to_string(),
            body(json!({"email": "test@x", "sub": "123"})),
        );
        let parsed = parse_params(&decls, &body(json!({})), &claims).unwrap();
        assert_eq!(parsed.get("email"), Some(&json!("test@x")));
    }

    #[test]
    fn authenticated_parameter_must_not_appear_in_body() {
        let decls = decls_from_yaml(
            r"
- name: email
  type: string
  authServices:
    - {name: my-google-auth, field: email}
",
        );
        let err = parse_params(&decls, &body(json!({"email": "spoof@x"})), &ClaimsMap::new())
            .unwrap_err();
        assert!(err.to_string().contains("must not be set in the request"));
    }

    #[test]
    fn first_matching_service_wins_in_declaration_order() {
        let decls = decls_from_yaml(
            r"
- name: uid
  type: string
  authServices:
    - {name: svc-a, field: sub}
    - {name: svc-b, field: sub}
",
        );
        let mut claims = ClaimsMap::new();
        claims.insert("svc-b".to_string(), body(json!({"sub": "from-b"})));
        let parsed = parse_params(&decls, &body(json!({})), &claims).unwrap();
        assert_eq!(parsed.get("uid"), Some(&json!("from-b")));

        claims.insert("svc-a".to_string(), body(json!({"sub": "from-a"})));
        let parsed = parse_params(&decls, &body(json!({})), &claims).unwrap();
        assert_eq!(parsed.get("uid"), Some(&json!("from-a")));
    }

    #[test]
    fn validate_rejects_array_without_items() {
        let decls = decls_from_yaml("- {name: ids, type: array}");
        let err = validate_decls(&decls).unwrap_err();
        assert!(err.to_string().contains("must declare items"));
    }

    #[test]
    fn validate_rejects_duplicate_names() {
        let decls = decls_from_yaml("[{name: a, type: string}, {name: a, type: integer}]");
        assert!(validate_decls(&decls).is_err());
    }

    #[test]
    fn input_schema_omits_authenticated_parameters() {
        let decls = decls_from_yaml(
            r"
- {name: id, type: integer, description: row id}
- name: email
  type: string
  authServices:
    - {name: my-google-auth, field: email}
",
        );
        let schema = input_schema(&decls);
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"].get("id").is_some());
        assert!(schema["properties"].get("email").is_none());
        assert_eq!(schema["required"], json!(["id"]));
    }

    #[test]
    fn manifest_lists_auth_service_names() {
        let decls = decls_from_yaml(
            r"
- name: email
  type: string
  authServices:
    - {name: my-google-auth, field: email}
",
        );
        let manifest = manifest_parameters(&decls);
        assert_eq!(manifest[0].auth_services, vec!["my-google-auth".to_string()]);
    }

    #[test]
    fn split_at_keeps_order() {
        let decls = decls_from_yaml(
            "[{name: a, type: integer}, {name: b, type: integer}, {name: t, type: string}]",
        );
        let parsed = parse_params(
            &decls,
            &body(json!({"a": 1, "b": 2, "t": "users"})),
            &ClaimsMap::new(),
        )
        .unwrap();
        let (binds, templates) = parsed.split_at(2);
        assert_eq!(binds.positional(), vec![&json!(1), &json!(2)]);
        assert_eq!(templates.get("t"), Some(&json!("users")));
    }
}
