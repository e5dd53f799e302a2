//! Configuration document parsing and resolution
//!
//! The tools document is a single YAML file with three sections, each a
//! mapping from name to a kind-tagged fragment. Fragments are decoded in
//! two passes: the resolver extracts `kind` and hands the remaining mapping
//! to the decoder registered for that kind, so each variant owns its own
//! strict schema.
//!
//! Resolution order is fixed: decode sources, decode auth services,
//! initialize sources, initialize auth services, then decode and
//! initialize tools against the two live maps. Any failure releases
//! everything initialized so far.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::AuthService;
use crate::registry::Registry;
use crate::sources::Source;
use crate::tools::{ResolveContext, Tool};
use crate::{Result, ServerError};

/// Parsed tools document, sections still in fragment form
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolsFile {
    /// Source fragments by name
    #[serde(default)]
    pub sources: BTreeMap<String, serde_yaml::Value>,
    /// Auth-service fragments by name
    #[serde(default, rename = "authServices")]
    pub auth_services: BTreeMap<String, serde_yaml::Value>,
    /// Tool fragments by name
    #[serde(default)]
    pub tools: BTreeMap<String, serde_yaml::Value>,
}

impl ToolsFile {
    /// Parse the document text; unknown top-level keys are rejected
    pub fn parse(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| ServerError::Config(format!("unable to parse tools file: {e}")))
    }
}

/// Extract the `kind` tag from a fragment and return the remaining mapping
fn split_kind(
    section: &str,
    name: &str,
    fragment: &serde_yaml::Value,
) -> Result<(String, serde_yaml::Value)> {
    let Some(mapping) = fragment.as_mapping() else {
        return Err(ServerError::Config(format!(
            "{section} {name} must be a mapping"
        )));
    };

    let mut mapping = mapping.clone();
    let kind = mapping
        .remove("kind")
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| {
            ServerError::Config(format!("{section} {name} is missing a kind field"))
        })?;
    Ok((kind, serde_yaml::Value::Mapping(mapping)))
}

/// The frozen, per-generation collection of live sources, auth services,
/// and tools
///
/// The set exclusively owns its sources and auth services; tools share the
/// underlying handles and are guaranteed the referent outlives them because
/// generations are only released after their last holder drops.
pub struct ToolSet {
    sources: HashMap<String, Arc<dyn Source>>,
    auth_services: HashMap<String, Arc<dyn AuthService>>,
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("sources", &self.sources.keys().collect::<Vec<_>>())
            .field("auth_services", &self.auth_services.keys().collect::<Vec<_>>())
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ToolSet {
    /// Look up a tool by name
    #[must_use]
    pub fn tool(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// All tools by name
    #[must_use]
    pub fn tools(&self) -> &HashMap<String, Arc<dyn Tool>> {
        &self.tools
    }

    /// All auth services by name
    #[must_use]
    pub fn auth_services(&self) -> &HashMap<String, Arc<dyn AuthService>> {
        &self.auth_services
    }

    /// All sources by name
    #[must_use]
    pub fn sources(&self) -> &HashMap<String, Arc<dyn Source>> {
        &self.sources
    }

    /// Release every live handle owned by this generation
    pub async fn close(&self) {
        for service in self.auth_services.values() {
            service.close().await;
        }
        for source in self.sources.values() {
            debug!(source = %source.name(), "closing source");
            source.close().await;
        }
    }
}

/// Resolve a parsed document into a frozen [`ToolSet`]
pub async fn resolve(registry: &Registry, file: &ToolsFile) -> Result<ToolSet> {
    // Pass 1: decode everything before touching the network, so pure
    // configuration mistakes never open connections
    let mut source_configs = Vec::with_capacity(file.sources.len());
    for (name, fragment) in &file.sources {
        let (kind, fragment) = split_kind("source", name, fragment)?;
        source_configs.push((name.clone(), registry.decode_source(name, &kind, &fragment)?));
    }

    let mut auth_configs = Vec::with_capacity(file.auth_services.len());
    for (name, fragment) in &file.auth_services {
        let (kind, fragment) = split_kind("auth service", name, fragment)?;
        auth_configs.push((
            name.clone(),
            registry.decode_auth_service(name, &kind, &fragment)?,
        ));
    }

    // Pass 2: initialize in dependency order, releasing partial state on
    // any failure
    let mut sources: HashMap<String, Arc<dyn Source>> = HashMap::new();
    let mut auth_services: HashMap<String, Arc<dyn AuthService>> = HashMap::new();

    for (name, config) in source_configs {
        match config.initialize().await {
            Ok(source) => {
                sources.insert(name, source);
            }
            Err(e) => {
                release(&sources, &auth_services).await;
                return Err(e);
            }
        }
    }

    for (name, config) in auth_configs {
        match config.initialize().await {
            Ok(service) => {
                auth_services.insert(name, service);
            }
            Err(e) => {
                release(&sources, &auth_services).await;
                return Err(e);
            }
        }
    }

    let mut tools: HashMap<String, Arc<dyn Tool>> = HashMap::new();
    {
        let ctx = ResolveContext {
            sources: &sources,
            auth_services: &auth_services,
        };
        for (name, fragment) in &file.tools {
            let outcome = split_kind("tool", name, fragment).and_then(|(kind, fragment)| {
                registry.decode_tool(name, &kind, &fragment)
            });
            let config = match outcome {
                Ok(config) => config,
                Err(e) => {
                    release(&sources, &auth_services).await;
                    return Err(e);
                }
            };
            match config.initialize(&ctx).await {
                Ok(tool) => {
                    tools.insert(name.clone(), tool);
                }
                Err(e) => {
                    release(&sources, &auth_services).await;
                    return Err(e);
                }
            }
        }
    }

    info!(
        sources = sources.len(),
        auth_services = auth_services.len(),
        tools = tools.len(),
        "tool set resolved"
    );

    Ok(ToolSet {
        sources,
        auth_services,
        tools,
    })
}

async fn release(
    sources: &HashMap<String, Arc<dyn Source>>,
    auth_services: &HashMap<String, Arc<dyn AuthService>>,
) {
    for service in auth_services.values() {
        service.close().await;
    }
    for source in sources.values() {
        source.close().await;
    }
}

/// Atomically swappable pointer to the current tool set generation
///
/// Readers clone the inner [`Arc`] for the duration of one request; a swap
/// replaces the pointer without blocking them. The displaced generation is
/// closed by a background task once its last holder drops, so in-flight
/// requests drain before sources are released.
pub struct ToolSetHandle {
    current: RwLock<Arc<ToolSet>>,
}

impl ToolSetHandle {
    /// Wrap the initial generation
    #[must_use]
    pub fn new(toolset: ToolSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(toolset)),
        }
    }

    /// The current generation
    #[must_use]
    pub fn load(&self) -> Arc<ToolSet> {
        Arc::clone(&self.current.read())
    }

    /// Install a new generation and schedule the old one for release after
    /// its in-flight requests complete
    pub fn swap(&self, next: ToolSet) {
        let old = {
            let mut current = self.current.write();
            std::mem::replace(&mut *current, Arc::new(next))
        };
        tokio::spawn(drain_and_close(old));
    }
}

async fn drain_and_close(old: Arc<ToolSet>) {
    // reference-counted drain: the swap holder is the last reference once
    // every request that loaded this generation has finished
    while Arc::strong_count(&old) > 1 {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    }
    debug!("previous tool set generation drained, closing sources");
    old.close().await;
}
