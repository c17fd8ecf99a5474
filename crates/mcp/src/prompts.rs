// Prompt provider seam.

use crate::messages::prompts::{GetPromptResult, ListPromptsResult};
use crate::protocol::JsonRpcError;
use std::collections::HashMap;

/// Source of prompts exposed through prompts/list and prompts/get.
#[async_trait::async_trait]
pub trait PromptProvider: Send + Sync {
    async fn list(&self, cursor: Option<String>) -> Result<ListPromptsResult, JsonRpcError>;

    async fn get(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> Result<GetPromptResult, JsonRpcError>;
}
