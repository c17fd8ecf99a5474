// Tool registry: named executable units exposed through tools/list and
// tools/call.

use crate::messages::tools::{CallToolResult, Tool};
use crate::protocol::JsonRpcError;
use anyhow::Result;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Page size used by the built-in tools/list handler.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// One server-side tool implementation.
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync {
    /// The advertised tool definition.
    fn definition(&self) -> Tool;

    /// Execute with the raw arguments object from tools/call. Domain
    /// failures should be reported in-band via an `is_error` result; an
    /// `Err` is treated as a server fault.
    async fn execute(&self, arguments: Value) -> Result<CallToolResult>;
}

/// Registry of available tools, keyed by name. Sorted iteration keeps
/// listing and pagination deterministic.
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Registering a second tool under the same name
    /// replaces the first; wiring code relies on this to override
    /// defaults deliberately.
    pub fn register(&mut self, tool: Arc<dyn ToolHandler>) {
        let name = tool.definition().name;
        if self.tools.insert(name.clone(), tool).is_some() {
            tracing::debug!(tool = %name, "tool replaced");
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ToolHandler>> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All tool definitions in name order.
    pub fn definitions(&self) -> Vec<Tool> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// One page of definitions. The cursor is the name of the last tool
    /// of the previous page, passed back verbatim by the client; an
    /// unknown cursor is a caller error.
    pub fn page(
        &self,
        cursor: Option<&str>,
        page_size: usize,
    ) -> Result<(Vec<Tool>, Option<String>), JsonRpcError> {
        if let Some(cursor) = cursor {
            if !self.tools.contains_key(cursor) {
                return Err(JsonRpcError::invalid_params(
                    format!("unknown cursor: {cursor:?}"),
                    None,
                ));
            }
        }

        let start = match cursor {
            Some(cursor) => std::ops::Bound::Excluded(cursor),
            None => std::ops::Bound::Unbounded,
        };
        let mut remaining = self.tools.range::<str, _>((start, std::ops::Bound::Unbounded));

        let page: Vec<Tool> = remaining
            .by_ref()
            .take(page_size)
            .map(|(_, tool)| tool.definition())
            .collect();

        let next_cursor = if remaining.next().is_some() {
            page.last().map(|tool| tool.name.clone())
        } else {
            None
        };

        Ok((page, next_cursor))
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// Helpers for building tool input schemas.

pub fn json_schema_object(properties: Value, required: Vec<&str>) -> Value {
    serde_json::json!({
        "type": "object",
        "properties": properties,
        "required": required
    })
}

pub fn json_schema_string(description: &str) -> Value {
    serde_json::json!({
        "type": "string",
        "description": description
    })
}

pub fn json_schema_number(description: &str) -> Value {
    serde_json::json!({
        "type": "number",
        "description": description
    })
}

pub fn json_schema_boolean(description: &str) -> Value {
    serde_json::json!({
        "type": "boolean",
        "description": description
    })
}
