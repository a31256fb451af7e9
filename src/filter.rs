//! Tool exposure filtering
//!
//! A resolved `FilterPolicy` decides which registered tools a server instance
//! actually exposes. The policy is immutable for the lifetime of the
//! instance; the derived `ExposedView` is computed once after the registry is
//! sealed and shared read-only with the dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::registry::{ToolDescriptor, ToolRegistry};

/// Resolved allow/deny rule sets
///
/// Each rule set is optional. `None` means "not configured"; `Some(vec![])`
/// is a configured-but-empty allowlist and excludes everything - explicit
/// denial, not absence of restriction.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterPolicy {
    #[serde(default)]
    pub function_allowlist: Option<Vec<String>>,
    #[serde(default)]
    pub function_denylist: Option<Vec<String>>,
    #[serde(default)]
    pub domain_allowlist: Option<Vec<String>>,
    #[serde(default)]
    pub category_allowlist: Option<Vec<String>>,
}

impl FilterPolicy {
    /// Policy with no rules configured: everything is exposed
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Decide whether a descriptor is exposed
    ///
    /// Precedence: denylist always wins; then the first configured rule among
    /// function allowlist, domain allowlist and category allowlist decides
    /// alone; with nothing configured, the tool is included.
    pub fn includes(&self, tool: &ToolDescriptor) -> bool {
        if let Some(deny) = &self.function_denylist {
            if deny.iter().any(|n| n == &tool.name) {
                return false;
            }
        }
        if let Some(allow) = &self.function_allowlist {
            return allow.iter().any(|n| n == &tool.name);
        }
        if let Some(domains) = &self.domain_allowlist {
            return match &tool.domain {
                Some(domain) => domains.iter().any(|d| d == domain),
                None => false,
            };
        }
        if let Some(categories) = &self.category_allowlist {
            return match &tool.category {
                Some(category) => categories.iter().any(|c| c == category),
                None => false,
            };
        }
        true
    }

    /// True when no rule set is configured
    pub fn is_unrestricted(&self) -> bool {
        self.function_allowlist.is_none()
            && self.function_denylist.is_none()
            && self.domain_allowlist.is_none()
            && self.category_allowlist.is_none()
    }
}

/// The filtered, cached subset of the registry visible to callers
///
/// Never holds an entry absent from the registry. Iteration order follows
/// registration order.
#[derive(Debug, Clone)]
pub struct ExposedView {
    tools: Vec<Arc<ToolDescriptor>>,
    index: HashMap<String, usize>,
}

impl ExposedView {
    /// Evaluate the policy against a sealed registry
    pub fn new(registry: &ToolRegistry, policy: &FilterPolicy) -> Self {
        let mut tools = Vec::new();
        let mut index = HashMap::new();
        for descriptor in registry.list() {
            if policy.includes(descriptor) {
                index.insert(descriptor.name.clone(), tools.len());
                tools.push(Arc::clone(descriptor));
            }
        }
        Self { tools, index }
    }

    /// Look up an exposed tool; filtered-out and unregistered names are
    /// indistinguishable here by design
    pub fn get(&self, name: &str) -> Option<&Arc<ToolDescriptor>> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

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
