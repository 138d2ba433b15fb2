//! JSON-RPC error-code mapping over [`memory_core::Error`].

use thiserror::Error;

/// Standard JSON-RPC 2.0 error codes, plus the server-error range used for
/// domain-specific failures.
pub mod codes {
    pub const PARSE_ERROR: i32 = -32700;
    pub const INVALID_REQUEST: i32 = -32600;
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL_ERROR: i32 = -32603;

    pub const VALIDATION: i32 = -32001;
    pub const NOT_FOUND: i32 = -32002;
    pub const CONSTITUTIVE_PROTECTION: i32 = -32003;
    pub const TRANSIENT: i32 = -32004;
}

/// Errors surfaced by the MCP server shell itself, distinct from domain
/// errors that tools translate into structured `status` fields.
#[derive(Debug, Error)]
pub enum McpError {
    #[error("unknown method: {0}")]
    MethodNotFound(String),

    #[error("unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Core(#[from] memory_core::Error),
}

impl McpError {
    /// JSON-RPC error code for this error.
    #[must_use]
    pub fn code(&self) -> i32 {
        match self {
            Self::MethodNotFound(_) => codes::METHOD_NOT_FOUND,
            Self::UnknownTool(_) | Self::InvalidParams(_) => codes::INVALID_PARAMS,
            Self::Core(err) => match err {
                memory_core::Error::Validation { .. } => codes::VALIDATION,
                memory_core::Error::NotFound(_) => codes::NOT_FOUND,
                memory_core::Error::ConstitutiveProtection { .. } => {
                    codes::CONSTITUTIVE_PROTECTION
                }
                memory_core::Error::Embedding(_)
                | memory_core::Error::Database(_)
                | memory_core::Error::Timeout(_)
                | memory_core::Error::CircuitBreakerOpen => codes::TRANSIENT,
                memory_core::Error::Configuration(_) | memory_core::Error::Serialization(_) => {
                    codes::INTERNAL_ERROR
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constitutive_protection_maps_to_its_own_code() {
        let err = McpError::Core(memory_core::Error::ConstitutiveProtection {
            edge_id: uuid::Uuid::nil(),
            relation: "LOVES".into(),
        });
        assert_eq!(err.code(), codes::CONSTITUTIVE_PROTECTION);
    }

    #[test]
    fn unknown_tool_maps_to_invalid_params() {
        let err = McpError::UnknownTool("bogus".into());
        assert_eq!(err.code(), codes::INVALID_PARAMS);
    }
}
