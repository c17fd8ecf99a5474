// Payloads of the fixed notification vocabulary. Notifications are
// fire-and-forget: never assigned an id, never answered.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Sent by the client to abandon an in-flight request. The request id is
/// the same opaque token the original request carried.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledParams {
    pub request_id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Progress on a long-running request, keyed by the progress token the
/// client supplied.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressParams {
    pub progress_token: Value,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<f64>,
}

/// A subscribed resource changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceUpdatedParams {
    pub uri: String,
}
