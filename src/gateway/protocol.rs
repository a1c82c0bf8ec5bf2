// Strongbox — JSON-RPC 2.0 Protocol Types
//
// Minimal JSON-RPC 2.0 implementation for the UDS gateway, plus the mapping
// from typed Strongbox errors to application error codes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, StrongboxError};

/// A JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub method: String,
    #[serde(default)]
    pub params: Value,
    pub id: Value,
}

/// A JSON-RPC 2.0 success/error response.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
    pub id: Value,
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC 2.0 error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Application error codes, one per `ErrorKind`
pub const NOT_FOUND: i32 = -32010;
pub const ALREADY_EXISTS: i32 = -32011;
pub const UNAUTHENTICATED: i32 = -32012;
pub const FORBIDDEN: i32 = -32013;
pub const VALIDATION_FAILED: i32 = -32014;
pub const QUOTA_EXCEEDED: i32 = -32015;
pub const PAYLOAD_TOO_LARGE: i32 = -32016;
pub const STORAGE_ERROR: i32 = -32017;

pub fn error_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::NotFound => NOT_FOUND,
        ErrorKind::AlreadyExists => ALREADY_EXISTS,
        ErrorKind::Unauthorized => UNAUTHENTICATED,
        ErrorKind::Forbidden => FORBIDDEN,
        ErrorKind::ValidationFailed => VALIDATION_FAILED,
        ErrorKind::QuotaExceeded => QUOTA_EXCEEDED,
        ErrorKind::PayloadTooLarge => PAYLOAD_TOO_LARGE,
        ErrorKind::Internal => STORAGE_ERROR,
    }
}

impl JsonRpcResponse {
    /// Create a success response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response.
    pub fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Create a parse error response (id is null because we couldn't parse it).
    pub fn parse_error(message: impl Into<String>) -> Self {
        Self::error(Value::Null, PARSE_ERROR, message)
    }

    /// Map a typed error to a response. Authentication failures all read
    /// the same and internal details never leave the process.
    pub fn from_error(id: Value, err: &StrongboxError) -> Self {
        let kind = err.kind();
        let message = match kind {
            ErrorKind::Unauthorized => "unauthenticated".to_string(),
            ErrorKind::Internal => "internal error".to_string(),
            _ => err.to_string(),
        };
        Self::error(id, error_code(kind), message)
    }
}

impl JsonRpcRequest {
    /// Validate that this is a proper JSON-RPC 2.0 request.
    pub fn validate(&self) -> Result<(), String> {
        if self.jsonrpc != "2.0" {
            return Err("jsonrpc must be \"2.0\"".to_string());
        }
        if self.method.is_empty() {
            return Err("method must not be empty".to_string());
        }
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
