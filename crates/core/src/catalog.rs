//! Node capability catalog.
//!
//! Extensions contribute node classes through an explicit
//! [`NodeProvider`] interface (or a JSON definition file) instead of
//! being discovered and executed at runtime. The catalog backs the
//! `/object_info` routes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Description of a single node class as exposed to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Inputs, outputs, category and any other class metadata.
    #[serde(flatten)]
    pub fields: serde_json::Map<String, serde_json::Value>,
}

impl NodeDefinition {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: Some(display_name.into()),
            fields: serde_json::Map::new(),
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}

/// A source of node classes, e.g. one extension package.
pub trait NodeProvider {
    /// Name used in logs.
    fn name(&self) -> &str;

    fn nodes(&self) -> Vec<(String, NodeDefinition)>;
}

#[derive(Debug, Default, Clone)]
pub struct NodeCatalog {
    nodes: BTreeMap<String, NodeDefinition>,
}

impl NodeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a catalog from a JSON object mapping class name to definition.
    pub fn from_json_file(path: &Path) -> Result<Self, CoreError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            CoreError::Internal(format!("reading node catalog {}: {e}", path.display()))
        })?;
        let nodes: BTreeMap<String, NodeDefinition> = serde_json::from_str(&text)
            .map_err(|e| CoreError::Validation(format!("node catalog {}: {e}", path.display())))?;
        Ok(Self { nodes })
    }

    /// Add a node class. Returns `false` (leaving the existing entry in
    /// place) if the name is already registered.
    pub fn register(&mut self, name: impl Into<String>, definition: NodeDefinition) -> bool {
        let name = name.into();
        if self.nodes.contains_key(&name) {
            return false;
        }
        self.nodes.insert(name, definition);
        true
    }

    /// Add or overwrite a node class.
    pub fn replace(&mut self, name: impl Into<String>, definition: NodeDefinition) {
        self.nodes.insert(name.into(), definition);
    }

    /// Register every class a provider offers. Returns how many were added.
    pub fn install(&mut self, provider: &dyn NodeProvider) -> usize {
        let mut added = 0;
        for (name, definition) in provider.nodes() {
            if self.register(name.clone(), definition) {
                added += 1;
            } else {
                tracing::warn!(
                    provider = provider.name(),
                    node_class = %name,
                    "Skipping node class already registered",
                );
            }
        }
        tracing::info!(provider = provider.name(), added, "Installed node provider");
        added
    }

    pub fn get(&self, name: &str) -> Option<&NodeDefinition> {
        self.nodes.get(name)
    }

    pub fn all(&self) -> &BTreeMap<String, NodeDefinition> {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
