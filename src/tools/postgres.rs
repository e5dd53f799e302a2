//! Postgres SQL tool - a prepared statement with positional parameters

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::query::Query;
use sqlx::{Column, Postgres, Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::params::{ParamValues, ParameterDecl, validate_decls};
use crate::sources::downcast_source;
use crate::sources::postgres::PostgresSource;
use crate::tools::{
    ResolveContext, Tool, ToolConfig, substitute_template, validate_template_decls,
};
use crate::{Result, ServerError};

/// Registry kind tag
pub const KIND: &str = "postgres-sql";

/// Configuration fragment for a Postgres SQL tool
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PostgresSqlConfig {
    #[serde(skip)]
    name: String,
    source: String,
    description: String,
    /// Statement with `$1..$n` placeholders and optional `{{marker}}`
    /// template substitutions
    statement: String,
    #[serde(default)]
    parameters: Vec<ParameterDecl>,
    /// Parameters substituted textually into the statement (table names,
    /// column lists) after identifier validation
    #[serde(default)]
    template_parameters: Vec<ParameterDecl>,
    #[serde(default)]
    auth_required: Vec<String>,
}

/// Decode a `postgres-sql` fragment
pub fn decode_config(name: &str, fragment: &serde_yaml::Value) -> Result<Box<dyn ToolConfig>> {
    let mut config: PostgresSqlConfig = serde_yaml::from_value(fragment.clone())
        .map_err(|e| ServerError::Config(format!("tool {name}: {e}")))?;
    config.name = name.to_string();
    Ok(Box::new(config))
}

#[async_trait]
impl ToolConfig for PostgresSqlConfig {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn initialize(&self, ctx: &ResolveContext<'_>) -> Result<Arc<dyn Tool>> {
        let source = ctx.source(&self.name, &self.source)?;
        let pg = downcast_source::<PostgresSource>(source, KIND, &["postgres"])?;

        let mut parameters = self.parameters.clone();
        parameters.extend(self.template_parameters.iter().cloned());
        validate_decls(&parameters)
            .map_err(|e| ServerError::Config(format!("tool {}: {e}", self.name)))?;
        validate_template_decls(&self.name, &self.template_parameters)?;
        ctx.check_auth_refs(&self.name, &parameters, &self.auth_required)?;

        Ok(Arc::new(PostgresSqlTool {
            name: self.name.clone(),
            description: self.description.clone(),
            statement: self.statement.clone(),
            parameters,
            bind_count: self.parameters.len(),
            auth_required: self.auth_required.clone(),
            pool: pg.pool().clone(),
        }))
    }
}

/// Live Postgres SQL tool
pub struct PostgresSqlTool {
    name: String,
    description: String,
    statement: String,
    /// Positional parameters first, template parameters after
    parameters: Vec<ParameterDecl>,
    bind_count: usize,
    auth_required: Vec<String>,
    pool: PgPool,
}

#[async_trait]
impl Tool for PostgresSqlTool {
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
        let (binds, templates) = params.split_at(self.bind_count);
        let statement = substitute_template(&self.statement, &templates)?;

        let mut query = sqlx::query(&statement);
        for param in &binds {
            query = bind_value(query, &param.name, &param.value)?;
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ServerError::Backend(format!("unable to execute query: {e}")))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in &rows {
            records.push(row_to_json(row)?);
        }
        Ok(Value::Array(records))
    }
}

/// Bind one coerced parameter value positionally
fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    name: &str,
    value: &'q Value,
) -> Result<Query<'q, Postgres, PgArguments>> {
    Ok(match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(f) = n.as_f64() {
                query.bind(f)
            } else {
                return Err(ServerError::Internal(format!(
                    "parameter {name}: unrepresentable number"
                )));
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        Value::Array(items) => bind_array(query, name, items)?,
        // objects travel as jsonb
        Value::Object(_) => query.bind(value.clone()),
    })
}

/// Bind a homogeneous array parameter
fn bind_array<'q>(
    query: Query<'q, Postgres, PgArguments>,
    name: &str,
    items: &[Value],
) -> Result<Query<'q, Postgres, PgArguments>> {
    if items.iter().all(|v| v.as_i64().is_some()) {
        let values: Vec<i64> = items.iter().filter_map(Value::as_i64).collect();
        return Ok(query.bind(values));
    }
    if items.iter().all(Value::is_number) {
        let values: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
        return Ok(query.bind(values));
    }
    if items.iter().all(Value::is_boolean) {
        let values: Vec<bool> = items.iter().filter_map(Value::as_bool).collect();
        return Ok(query.bind(values));
    }
    if items.iter().all(Value::is_string) {
        let values: Vec<String> = items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect();
        return Ok(query.bind(values));
    }
    Err(ServerError::BadRequest(format!(
        "array parameter {name} must contain a single scalar element type"
    )))
}

/// Materialize one row as a column-name to value mapping
fn row_to_json(row: &PgRow) -> Result<Value> {
    let mut record = Map::new();
    for (index, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(index).map_err(|e| {
            ServerError::Backend(format!("unable to read column {}: {e}", column.name()))
        })?;

        let value = if raw.is_null() {
            Value::Null
        } else {
            let type_name = raw.type_info().name().to_string();
            decode_column(row, index, &type_name).map_err(|e| {
                ServerError::Backend(format!("unable to decode column {}: {e}", column.name()))
            })?
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(Value::Object(record))
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> sqlx::Result<Value> {
    Ok(match type_name {
        "BOOL" => Value::from(row.try_get::<bool, _>(index)?),
        "INT2" => Value::from(i64::from(row.try_get::<i16, _>(index)?)),
        "INT4" => Value::from(i64::from(row.try_get::<i32, _>(index)?)),
        "INT8" => Value::from(row.try_get::<i64, _>(index)?),
        "FLOAT4" => Value::from(f64::from(row.try_get::<f32, _>(index)?)),
        "FLOAT8" => Value::from(row.try_get::<f64, _>(index)?),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::from(row.try_get::<String, _>(index)?),
        "JSON" | "JSONB" => row.try_get::<Value, _>(index)?,
        other => {
            debug!(column_type = %other, "column type not representable as JSON, returning null");
            Value::Null
        }
    })
}
