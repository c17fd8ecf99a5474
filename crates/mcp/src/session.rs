// Capability session: per-connection handshake state and negotiated
// capabilities. Owned by one connection, never shared across connections.

use crate::messages::logging::LoggingLevel;
use crate::messages::{ClientCapabilities, Implementation, InitializeParams, PROTOCOL_VERSION};
use crate::messages::{METHOD_INITIALIZE, NOTIFICATION_INITIALIZED};
use crate::protocol::JsonRpcError;

/// Handshake progression. Requests other than `initialize` are rejected
/// until the client has completed the exchange; premature traffic is
/// refused, never queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Initializing,
    Ready,
    Closed,
}

#[derive(Debug)]
pub struct CapabilitySession {
    state: SessionState,
    protocol_version: Option<String>,
    client_capabilities: ClientCapabilities,
    client_info: Option<Implementation>,
    log_level: LoggingLevel,
}

impl CapabilitySession {
    pub fn new() -> Self {
        Self {
            state: SessionState::Uninitialized,
            protocol_version: None,
            client_capabilities: ClientCapabilities::default(),
            client_info: None,
            log_level: LoggingLevel::Info,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Check whether `method` is legal in the current state.
    pub fn gate(&self, method: &str) -> Result<(), JsonRpcError> {
        match self.state {
            SessionState::Ready => Ok(()),
            SessionState::Uninitialized => {
                if method == METHOD_INITIALIZE {
                    Ok(())
                } else {
                    Err(JsonRpcError::invalid_request(
                        format!("'{method}' before initialize"),
                        None,
                    ))
                }
            }
            SessionState::Initializing => {
                if method == NOTIFICATION_INITIALIZED {
                    Ok(())
                } else {
                    Err(JsonRpcError::invalid_request(
                        format!("'{method}' before the initialized notification"),
                        None,
                    ))
                }
            }
            SessionState::Closed => Err(JsonRpcError::invalid_request(
                "connection is closed",
                None,
            )),
        }
    }

    /// Record the client's initialize request and negotiate the protocol
    /// version. A mismatch is not fatal: the server answers with the
    /// version it supports and the client decides compatibility.
    pub fn begin_initialize(
        &mut self,
        params: InitializeParams,
    ) -> Result<String, JsonRpcError> {
        if self.state != SessionState::Uninitialized {
            return Err(JsonRpcError::invalid_request("already initialized", None));
        }

        let negotiated = if params.protocol_version == PROTOCOL_VERSION {
            params.protocol_version.clone()
        } else {
            tracing::warn!(
                requested = %params.protocol_version,
                supported = PROTOCOL_VERSION,
                "client requested an unsupported protocol version"
            );
            PROTOCOL_VERSION.to_string()
        };

        self.protocol_version = Some(negotiated.clone());
        self.client_capabilities = params.capabilities;
        self.client_info = Some(params.client_info);
        self.state = SessionState::Initializing;

        Ok(negotiated)
    }

    pub fn mark_initialized(&mut self) -> Result<(), JsonRpcError> {
        if self.state != SessionState::Initializing {
            return Err(JsonRpcError::invalid_request(
                "initialized notification outside the handshake",
                None,
            ));
        }
        self.state = SessionState::Ready;
        Ok(())
    }

    pub fn close(&mut self) {
        self.state = SessionState::Closed;
    }

    pub fn client_info(&self) -> Option<&Implementation> {
        self.client_info.as_ref()
    }

    pub fn client_capabilities(&self) -> &ClientCapabilities {
        &self.client_capabilities
    }

    /// Minimum severity the client wants forwarded via
    /// `notifications/message`.
    pub fn log_level(&self) -> LoggingLevel {
        self.log_level
    }

    pub fn set_log_level(&mut self, level: LoggingLevel) {
        self.log_level = level;
    }
}

impl Default for CapabilitySession {
    fn default() -> Self {
        Self::new()
    }
}
