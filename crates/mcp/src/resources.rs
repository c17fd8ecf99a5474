// Resource provider seam. Providers own what the resources exist and how
// they read; the protocol layer owns listing methods, subscription
// bookkeeping and error mapping.

use crate::messages::resources::{
    ListResourceTemplatesResult, ListResourcesResult, ResourceContents,
};
use crate::protocol::JsonRpcError;

/// Source of resources exposed through resources/list, resources/read and
/// resources/templates/list. Cursors are produced and interpreted by the
/// provider only; the protocol layer forwards them untouched.
#[async_trait::async_trait]
pub trait ResourceProvider: Send + Sync {
    /// Whether resources/subscribe is meaningful for this provider.
    fn supports_subscribe(&self) -> bool {
        false
    }

    async fn list(&self, cursor: Option<String>) -> Result<ListResourcesResult, JsonRpcError>;

    async fn templates(
        &self,
        cursor: Option<String>,
    ) -> Result<ListResourceTemplatesResult, JsonRpcError> {
        let _ = cursor;
        Ok(ListResourceTemplatesResult {
            resource_templates: vec![],
            next_cursor: None,
        })
    }

    async fn read(&self, uri: &str) -> Result<Vec<ResourceContents>, JsonRpcError>;
}
