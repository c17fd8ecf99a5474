// Store prompts: canned starting points that lean on the store tools.

use std::collections::HashMap;
use storefront_mcp::messages::prompts::{
    GetPromptResult, ListPromptsResult, Prompt, PromptArgument, PromptMessage, Role,
};
use storefront_mcp::messages::Content;
use storefront_mcp::protocol::JsonRpcError;
use storefront_mcp::PromptProvider;

const SUMMARIZE_ORDER: &str = "summarize_order";
const FIND_PRODUCTS: &str = "find_products";

pub struct StorePrompts;

impl StorePrompts {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StorePrompts {
    fn default() -> Self {
        Self::new()
    }
}

fn required_argument(
    arguments: &Option<HashMap<String, String>>,
    name: &str,
) -> Result<String, JsonRpcError> {
    arguments
        .as_ref()
        .and_then(|args| args.get(name))
        .cloned()
        .ok_or_else(|| {
            JsonRpcError::invalid_params(format!("missing required argument: {name}"), None)
        })
}

#[async_trait::async_trait]
impl PromptProvider for StorePrompts {
    async fn list(&self, _cursor: Option<String>) -> Result<ListPromptsResult, JsonRpcError> {
        Ok(ListPromptsResult {
            prompts: vec![
                Prompt {
                    name: SUMMARIZE_ORDER.to_string(),
                    description: Some("Summarize one order's status, items and total".to_string()),
                    arguments: vec![PromptArgument {
                        name: "order_id".to_string(),
                        description: Some("The order id to summarize".to_string()),
                        required: true,
                    }],
                },
                Prompt {
                    name: FIND_PRODUCTS.to_string(),
                    description: Some("Find products matching a description".to_string()),
                    arguments: vec![
                        PromptArgument {
                            name: "query".to_string(),
                            description: Some("What to look for".to_string()),
                            required: true,
                        },
                        PromptArgument {
                            name: "budget".to_string(),
                            description: Some("Optional maximum total price".to_string()),
                            required: false,
                        },
                    ],
                },
            ],
            next_cursor: None,
        })
    }

    async fn get(
        &self,
        name: &str,
        arguments: Option<HashMap<String, String>>,
    ) -> Result<GetPromptResult, JsonRpcError> {
        match name {
            SUMMARIZE_ORDER => {
                let order_id = required_argument(&arguments, "order_id")?;
                Ok(GetPromptResult {
                    description: Some(format!("Summary of order {order_id}")),
                    messages: vec![PromptMessage {
                        role: Role::User,
                        content: Content::text(format!(
                            "Fetch order {order_id} with the get_order tool and summarize \
                             it: current status, line items, total, and anything that looks \
                             unusual."
                        )),
                    }],
                })
            }
            FIND_PRODUCTS => {
                let query = required_argument(&arguments, "query")?;
                let budget = arguments
                    .as_ref()
                    .and_then(|args| args.get("budget"))
                    .cloned();

                let mut text = format!(
                    "Search the storefront for products matching '{query}' using the \
                     search_products tool."
                );
                if let Some(budget) = budget {
                    text.push_str(&format!(" Keep the total under ${budget}."));
                }
                text.push_str(" Present the best options with their prices.");

                Ok(GetPromptResult {
                    description: Some(format!("Product hunt for '{query}'")),
                    messages: vec![PromptMessage {
                        role: Role::User,
                        content: Content::text(text),
                    }],
                })
            }
            other => Err(JsonRpcError::invalid_params(
                format!("unknown prompt: {other}"),
                None,
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_advertises_both_prompts() {
        let prompts = StorePrompts::new();
        let result = prompts.list(None).await.unwrap();
        let names: Vec<&str> = result.prompts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec![SUMMARIZE_ORDER, FIND_PRODUCTS]);
    }

    #[tokio::test]
    async fn test_summarize_order_embeds_argument() {
        let prompts = StorePrompts::new();
        let mut args = HashMap::new();
        args.insert("order_id".to_string(), "42".to_string());

        let result = prompts.get(SUMMARIZE_ORDER, Some(args)).await.unwrap();
        match &result.messages[0].content {
            Content::Text { text } => assert!(text.contains("order 42")),
            other => panic!("expected text content, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_missing_required_argument() {
        let prompts = StorePrompts::new();
        let err = prompts.get(SUMMARIZE_ORDER, None).await.unwrap_err();
        assert_eq!(err.code, storefront_mcp::protocol::INVALID_PARAMS);
    }

    #[tokio::test]
    async fn test_unknown_prompt() {
        let prompts = StorePrompts::new();
        let err = prompts.get("write_poem", None).await.unwrap_err();
        assert_eq!(err.code, storefront_mcp::protocol::INVALID_PARAMS);
    }
}
