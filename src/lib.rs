//! Toolhost - generic MCP function host
//!
//! Exposes named, schema-described pure functions as remotely callable
//! tools over JSON-RPC, via stdio or HTTP, with precedence-ordered exposure
//! filtering and per-call timeout/concurrency limits.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod filter;
pub mod observe;
pub mod protocol;
pub mod registry;
pub mod schema;
pub mod transport;
pub mod weather;

pub use config::{OverflowPolicy, ServerConfig, TransportKind};
pub use dispatch::Dispatcher;
pub use error::{ErrorKind, ErrorRecord, HostError, Result};
pub use filter::{ExposedView, FilterPolicy};
pub use registry::{ToolDescriptor, ToolHandler, ToolRegistry, ToolSpec};
pub use schema::ToolSchema;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
