// JSON-RPC 2.0 envelope types (transported over stdio, one message per line)

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 Request
///
/// A request without an `id` is a notification: it must never be answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: impl Into<Value>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id.into()),
            method: method.into(),
            params,
        }
    }

    pub fn notification(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: None,
            method: method.into(),
            params,
        }
    }

    pub fn is_notification(&self) -> bool {
        self.id.is_none()
    }

    /// Envelope invariants checked before dispatch. Handlers never see a
    /// request that fails here.
    pub fn validate(&self) -> Result<(), JsonRpcError> {
        if self.jsonrpc != JSONRPC_VERSION {
            return Err(JsonRpcError::invalid_request(
                format!("unsupported jsonrpc version: {:?}", self.jsonrpc),
                None,
            ));
        }
        if self.method.is_empty() {
            return Err(JsonRpcError::invalid_request("method must not be empty", None));
        }
        if let Some(id) = &self.id {
            if !id.is_string() && !id.is_number() {
                return Err(JsonRpcError::invalid_request(
                    "id must be a string or a number",
                    None,
                ));
            }
        }
        if let Some(params) = &self.params {
            if !params.is_object() && !params.is_array() {
                return Err(JsonRpcError::invalid_request(
                    "params must be a structured value",
                    None,
                ));
            }
        }
        Ok(())
    }
}

/// JSON-RPC 2.0 Response
///
/// Correlates to exactly one prior request by `id`. The payload is a sum
/// type, so a response structurally carries a result or an error, never
/// both and never neither.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    #[serde(flatten)]
    pub payload: ResponsePayload,
}

/// Success/error union of a response. Serializes as the standard `result`
/// or `error` member of the envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponsePayload {
    Result(Value),
    Error(JsonRpcError),
}

// Deserialized by hand so that "exactly one of result/error" is enforced
// on inbound data too; a flattened enum would accept envelopes carrying
// both members.
impl<'de> Deserialize<'de> for JsonRpcResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error as _;

        let value = Value::deserialize(deserializer)?;
        let Value::Object(mut map) = value else {
            return Err(D::Error::custom("response must be an object"));
        };

        let jsonrpc = match map.remove("jsonrpc") {
            Some(Value::String(version)) => version,
            _ => return Err(D::Error::custom("missing jsonrpc version")),
        };
        let id = map
            .remove("id")
            .ok_or_else(|| D::Error::custom("missing id"))?;

        let payload = match (map.remove("result"), map.remove("error")) {
            (Some(result), None) => ResponsePayload::Result(result),
            (None, Some(error)) => {
                ResponsePayload::Error(serde_json::from_value(error).map_err(D::Error::custom)?)
            }
            (Some(_), Some(_)) => {
                return Err(D::Error::custom("response carries both result and error"))
            }
            (None, None) => {
                return Err(D::Error::custom("response carries neither result nor error"))
            }
        };

        Ok(Self {
            jsonrpc,
            id,
            payload,
        })
    }
}

impl JsonRpcResponse {
    pub fn success(id: impl Into<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            payload: ResponsePayload::Result(result),
        }
    }

    pub fn error(id: impl Into<Value>, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            payload: ResponsePayload::Error(error),
        }
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.payload {
            ResponsePayload::Result(value) => Some(value),
            ResponsePayload::Error(_) => None,
        }
    }

    pub fn err(&self) -> Option<&JsonRpcError> {
        match &self.payload {
            ResponsePayload::Result(_) => None,
            ResponsePayload::Error(error) => Some(error),
        }
    }
}

// JSON-RPC 2.0 reserved error codes. No custom code space at this layer.
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

/// JSON-RPC 2.0 Error
///
/// Immutable once constructed; serialized onto the wire as-is. Callers
/// pick the code deliberately through the per-code constructors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{message} (code {code})")]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    pub fn new(code: i32, message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            code,
            message: message.into(),
            data,
        }
    }

    pub fn parse_error(message: impl Into<String>, data: Option<Value>) -> Self {
        Self::new(PARSE_ERROR, message, data)
    }

    pub fn invalid_request(message: impl Into<String>, data: Option<Value>) -> Self {
        Self::new(INVALID_REQUEST, message, data)
    }

    pub fn method_not_found(message: impl Into<String>, data: Option<Value>) -> Self {
        Self::new(METHOD_NOT_FOUND, message, data)
    }

    pub fn invalid_params(message: impl Into<String>, data: Option<Value>) -> Self {
        Self::new(INVALID_PARAMS, message, data)
    }

    pub fn internal_error(message: impl Into<String>, data: Option<Value>) -> Self {
        Self::new(INTERNAL_ERROR, message, data)
    }

    /// Wrap a fault that was not expressed as a structured error. The
    /// original is preserved in `data` for diagnosis, never dropped.
    pub fn from_fault(err: &dyn std::fmt::Display) -> Self {
        Self::internal_error("Internal error", Some(Value::String(err.to_string())))
    }
}
