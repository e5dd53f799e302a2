//! Source abstraction - initialized handles to backing systems
//!
//! A source is built once from its configuration fragment and shared by
//! every tool bound to it. Sources are internally synchronized (connection
//! pools, HTTP clients); the tool layer issues concurrent calls without
//! further coordination. Capability matching between a tool kind and its
//! source happens by downcast, not by subtyping: a tool asks for the
//! concrete source type it needs and fails resolution otherwise.

pub mod http;
pub mod postgres;
pub mod spanner;
pub mod sqlite;

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{Result, ServerError};

/// Decoded configuration for one source, ready to be initialized
#[async_trait]
pub trait SourceConfig: Send + Sync + std::fmt::Debug {
    /// Kind tag this configuration was registered under
    fn kind(&self) -> &'static str;

    /// Open the live handle (may connect to the network)
    async fn initialize(&self) -> Result<Arc<dyn Source>>;
}

/// A live, thread-safe handle to a backend
///
/// Never mutated after creation; owned by the tool set and released at
/// shutdown or after a reload generation drains.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug + 'static {
    /// Source name from the document
    fn name(&self) -> &str;

    /// Kind tag
    fn kind(&self) -> &'static str;

    /// Capability downcast hook
    fn as_any(&self) -> &dyn Any;

    /// Release underlying resources; must be safe to call once at the end
    /// of the source's generation
    async fn close(&self) {}
}

/// Downcast a source to the concrete type a tool kind requires
///
/// Produces the capability-mismatch diagnostic when the bound source is of
/// an incompatible kind.
pub fn downcast_source<'a, T: Source>(
    source: &'a Arc<dyn Source>,
    tool_kind: &str,
    compatible: &[&str],
) -> Result<&'a T> {
    source.as_any().downcast_ref::<T>().ok_or_else(|| {
        ServerError::Config(format!(
            "invalid source for {tool_kind}: source kind must be one of [{}]",
            compatible.join(", ")
        ))
    })
}
