//! Plugin registries - kind-tagged decoders for sources, auth services,
//! and tools
//!
//! Registration happens once, in [`Registry::builtin`], before any request
//! is served. An explicit registration list keeps startup ordering visible
//! and the registry contents testable; there are no hidden init-time side
//! effects. Registering the same kind twice is fatal, and lookup of an
//! unknown kind reports the full candidate list.

use std::collections::BTreeMap;

use crate::auth::{self, AuthServiceConfig};
use crate::sources::{self, SourceConfig};
use crate::tools::{self, ToolConfig};
use crate::{Result, ServerError};

/// Decoder for a source configuration fragment
pub type SourceDecoder = fn(&str, &serde_yaml::Value) -> Result<Box<dyn SourceConfig>>;

/// Decoder for an auth-service configuration fragment
pub type AuthServiceDecoder = fn(&str, &serde_yaml::Value) -> Result<Box<dyn AuthServiceConfig>>;

/// Decoder for a tool configuration fragment
pub type ToolDecoder = fn(&str, &serde_yaml::Value) -> Result<Box<dyn ToolConfig>>;

/// Kind-to-decoder maps for the three configuration namespaces
#[derive(Default)]
pub struct Registry {
    sources: BTreeMap<&'static str, SourceDecoder>,
    auth_services: BTreeMap<&'static str, AuthServiceDecoder>,
    tools: BTreeMap<&'static str, ToolDecoder>,
}

impl Registry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry with every built-in kind registered
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();

        registry.register_source(sources::postgres::KIND, sources::postgres::decode_config)?;
        registry.register_source(sources::sqlite::KIND, sources::sqlite::decode_config)?;
        registry.register_source(sources::http::KIND, sources::http::decode_config)?;
        registry.register_source(sources::spanner::KIND, sources::spanner::decode_config)?;

        registry.register_auth_service(auth::google::KIND, auth::google::decode_config)?;

        registry.register_tool(tools::postgres::KIND, tools::postgres::decode_config)?;
        registry.register_tool(tools::sqlite::KIND, tools::sqlite::decode_config)?;
        registry.register_tool(tools::http::KIND, tools::http::decode_config)?;
        registry.register_tool(tools::spanner::KIND, tools::spanner::decode_config)?;

        Ok(registry)
    }

    /// Register a source kind; a duplicate kind aborts startup
    pub fn register_source(&mut self, kind: &'static str, decoder: SourceDecoder) -> Result<()> {
        if self.sources.insert(kind, decoder).is_some() {
            return Err(ServerError::Config(format!(
                "duplicate registration of source kind {kind}"
            )));
        }
        Ok(())
    }

    /// Register an auth-service kind; a duplicate kind aborts startup
    pub fn register_auth_service(
        &mut self,
        kind: &'static str,
        decoder: AuthServiceDecoder,
    ) -> Result<()> {
        if self.auth_services.insert(kind, decoder).is_some() {
            return Err(ServerError::Config(format!(
                "duplicate registration of auth service kind {kind}"
            )));
        }
        Ok(())
    }

    /// Register a tool kind; a duplicate kind aborts startup
    pub fn register_tool(&mut self, kind: &'static str, decoder: ToolDecoder) -> Result<()> {
        if self.tools.insert(kind, decoder).is_some() {
            return Err(ServerError::Config(format!(
                "duplicate registration of tool kind {kind}"
            )));
        }
        Ok(())
    }

    /// Decode a source fragment by its kind
    pub fn decode_source(
        &self,
        name: &str,
        kind: &str,
        fragment: &serde_yaml::Value,
    ) -> Result<Box<dyn SourceConfig>> {
        let decoder = self.sources.get(kind).ok_or_else(|| {
            ServerError::Config(format!(
                "unknown source kind {kind} for source {name}; known kinds: [{}]",
                join_keys(&self.sources)
            ))
        })?;
        decoder(name, fragment)
    }

    /// Decode an auth-service fragment by its kind
    pub fn decode_auth_service(
        &self,
        name: &str,
        kind: &str,
        fragment: &serde_yaml::Value,
    ) -> Result<Box<dyn AuthServiceConfig>> {
        let decoder = self.auth_services.get(kind).ok_or_else(|| {
            ServerError::Config(format!(
                "unknown auth service kind {kind} for auth service {name}; known kinds: [{}]",
                join_keys(&self.auth_services)
            ))
        })?;
        decoder(name, fragment)
    }

    /// Decode a tool fragment by its kind
    pub fn decode_tool(
        &self,
        name: &str,
        kind: &str,
        fragment: &serde_yaml::Value,
    ) -> Result<Box<dyn ToolConfig>> {
        let decoder = self.tools.get(kind).ok_or_else(|| {
            ServerError::Config(format!(
                "unknown tool kind {kind} for tool {name}; known kinds: [{}]",
                join_keys(&self.tools)
            ))
        })?;
        decoder(name, fragment)
    }

    /// Registered source kinds, sorted
    #[must_use]
    pub fn source_kinds(&self) -> Vec<&'static str> {
        self.sources.keys().copied().collect()
    }

    /// Registered tool kinds, sorted
    #[must_use]
    pub fn tool_kinds(&self) -> Vec<&'static str> {
        self.tools.keys().copied().collect()
    }
}

fn join_keys<V>(map: &BTreeMap<&'static str, V>) -> String {
    map.keys().copied().collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn builtin_registers_every_kind_once() {
        let registry = Registry::builtin().unwrap();
        assert_eq!(
            registry.source_kinds(),
            vec!["http", "postgres", "spanner-admin", "sqlite"]
        );
        assert_eq!(
            registry.tool_kinds(),
            vec!["http", "postgres-sql", "spanner-create-instance", "sqlite-sql"]
        );
    }

    #[test]
    fn duplicate_source_kind_is_fatal() {
        let mut registry = Registry::builtin().unwrap();
        let err = registry
            .register_source(crate::sources::postgres::KIND, crate::sources::postgres::decode_config)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: duplicate registration of source kind postgres"
        );
    }

    #[test]
    fn duplicate_tool_kind_is_fatal() {
        let mut registry = Registry::builtin().unwrap();
        assert!(
            registry
                .register_tool(crate::tools::http::KIND, crate::tools::http::decode_config)
                .is_err()
        );
    }

    #[test]
    fn unknown_kind_lists_candidates() {
        let registry = Registry::builtin().unwrap();
        let fragment: serde_yaml::Value = serde_yaml::from_str("{}").unwrap();
        let err = registry
            .decode_source("foo", "no-such-kind", &fragment)
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("no-such-kind"));
        assert!(message.contains("http, postgres, spanner-admin, sqlite"));
    }
}
