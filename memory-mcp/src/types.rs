//! Wire types for the `tools/*` and `resources/*` MCP methods.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Parameters of a `tools/call` request.
#[derive(Debug, Deserialize)]
pub struct CallToolParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// A tool descriptor returned from `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// A resource descriptor returned from `resources/list`.
#[derive(Debug, Clone, Serialize)]
pub struct ResourceDescriptor {
    pub uri: String,
    pub name: String,
    pub description: String,
    pub mime_type: String,
}

/// Parameters of a `resources/read` request.
#[derive(Debug, Deserialize)]
pub struct ReadResourceParams {
    pub uri: String,
}
