//! Tool registry
//!
//! Maps tool names to handlers, schemas and descriptive metadata. The
//! registry is populated during start-up, sealed, and read-only afterwards,
//! so shared access needs no locking.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{HostError, Result};
use crate::schema::ToolSchema;

/// Uniform handler signature: validated arguments in, result or error out
///
/// A handler flags a user-input problem by returning
/// [`HostError::InvalidInput`]; any other error normalizes to internal.
pub type ToolHandler = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// An immutable registered tool
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub schema: ToolSchema,
    /// Grouping tag consulted only by filtering
    pub domain: Option<String>,
    /// Grouping tag consulted only by filtering
    pub category: Option<String>,
    pub handler: ToolHandler,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("domain", &self.domain)
            .field("category", &self.category)
            .finish_non_exhaustive()
    }
}

/// Builder-side registration input
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON-Schema-shaped declaration, parsed and checked at registration
    pub schema: Value,
    pub domain: Option<String>,
    pub category: Option<String>,
    pub handler: ToolHandler,
}

/// Registry of callable tools
///
/// Enforces name uniqueness and immutability once sealed. Registration order
/// is preserved for `list()`.
pub struct ToolRegistry {
    tools: Vec<Arc<ToolDescriptor>>,
    index: HashMap<String, usize>,
    sealed: bool,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            sealed: false,
        }
    }

    /// Register a tool
    ///
    /// Fails with `DuplicateTool` if the name is taken, `InvalidSchema` if
    /// the declaration does not self-validate, `RegistryClosed` after
    /// `seal()`. Failure leaves the registry unchanged.
    pub fn register(&mut self, spec: ToolSpec) -> Result<()> {
        if self.sealed {
            return Err(HostError::RegistryClosed(spec.name));
        }
        if spec.name.is_empty() {
            return Err(HostError::InvalidSchema {
                tool: spec.name,
                message: "tool name must be non-empty".to_string(),
            });
        }
        if self.index.contains_key(&spec.name) {
            return Err(HostError::DuplicateTool(spec.name));
        }

        let schema = ToolSchema::parse(&spec.schema).map_err(|err| match err {
            HostError::InvalidSchema { message, .. } => HostError::InvalidSchema {
                tool: spec.name.clone(),
                message,
            },
            other => other,
        })?;

        let descriptor = Arc::new(ToolDescriptor {
            name: spec.name.clone(),
            description: spec.description,
            schema,
            domain: spec.domain,
            category: spec.category,
            handler: spec.handler,
        });

        self.index.insert(spec.name, self.tools.len());
        self.tools.push(descriptor);
        Ok(())
    }

    /// Freeze the registry; all later registration fails
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<ToolDescriptor>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// All descriptors in registration order
    pub fn list(&self) -> impl Iterator<Item = &Arc<ToolDescriptor>> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
