//! SQLite SQL tool - a prepared statement with positional parameters

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use tracing::debug;

use crate::params::{ParamType, ParamValues, ParameterDecl, validate_decls};
use crate::sources::downcast_source;
use crate::sources::sqlite::SqliteSource;
use crate::tools::{
    ResolveContext, Tool, ToolConfig, substitute_template, validate_template_decls,
};
use crate::{Result, ServerError};

/// Registry kind tag
pub const KIND: &str = "sqlite-sql";

/// Configuration fragment for a SQLite SQL tool
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SqliteSqlConfig {
    #[serde(skip)]
    name: String,
    source: String,
    description: String,
    /// Statement with `?` placeholders and optional `{{marker}}` template
    /// substitutions
    statement: String,
    #[serde(default)]
    parameters: Vec<ParameterDecl>,
    #[serde(default)]
    template_parameters: Vec<ParameterDecl>,
    #[serde(default)]
    auth_required: Vec<String>,
}

/// Decode a `sqlite-sql` fragment
pub fn decode_config(name: &str, fragment: &serde_yaml::Value) -> Result<Box<dyn ToolConfig>> {
    let mut config: SqliteSqlConfig = serde_yaml::from_value(fragment.clone())
        .map_err(|e| ServerError::Config(format!("tool {name}: {e}")))?;
    config.name = name.to_string();
    Ok(Box::new(config))
}

#[async_trait]
impl ToolConfig for SqliteSqlConfig {
    fn kind(&self) -> &'static str {
        KIND
    }

    async fn initialize(&self, ctx: &ResolveContext<'_>) -> Result<Arc<dyn Tool>> {
        let source = ctx.source(&self.name, &self.source)?;
        let sqlite = downcast_source::<SqliteSource>(source, KIND, &["sqlite"])?;

        // sqlite has no array or composite bind types
        for decl in &self.parameters {
            if matches!(decl.param_type, ParamType::Array | ParamType::Object) {
                return Err(ServerError::Config(format!(
                    "tool {}: parameter {} has type {}, which sqlite-sql cannot bind",
                    self.name, decl.name, decl.param_type
                )));
            }
        }

        let mut parameters = self.parameters.clone();
        parameters.extend(self.template_parameters.iter().cloned());
        validate_decls(&parameters)
            .map_err(|e| ServerError::Config(format!("tool {}: {e}", self.name)))?;
        validate_template_decls(&self.name, &self.template_parameters)?;
        ctx.check_auth_refs(&self.name, &parameters, &self.auth_required)?;

        Ok(Arc::new(SqliteSqlTool {
            name: self.name.clone(),
            description: self.description.clone(),
            statement: self.statement.clone(),
            parameters,
            bind_count: self.parameters.len(),
            auth_required: self.auth_required.clone(),
            pool: sqlite.pool().clone(),
        }))
    }
}

/// Live SQLite SQL tool
pub struct SqliteSqlTool {
    name: String,
    description: String,
    statement: String,
    parameters: Vec<ParameterDecl>,
    bind_count: usize,
    auth_required: Vec<String>,
    pool: SqlitePool,
}

#[async_trait]
impl Tool for SqliteSqlTool {
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
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    name: &str,
    value: &'q Value,
) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>> {
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
        Value::Array(_) | Value::Object(_) => {
            return Err(ServerError::BadRequest(format!(
                "parameter {name}: sqlite cannot bind array or object values"
            )));
        }
    })
}

/// Materialize one row as a column-name to value mapping
fn row_to_json(row: &SqliteRow) -> Result<Value> {
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

fn decode_column(row: &SqliteRow, index: usize, type_name: &str) -> sqlx::Result<Value> {
    Ok(match type_name {
        "INTEGER" => Value::from(row.try_get::<i64, _>(index)?),
        "REAL" => Value::from(row.try_get::<f64, _>(index)?),
        "TEXT" => Value::from(row.try_get::<String, _>(index)?),
        "BOOLEAN" => Value::from(row.try_get::<bool, _>(index)?),
        other => {
            debug!(column_type = %other, "column type not representable as JSON, returning null");
            Value::Null
        }
    })
}
