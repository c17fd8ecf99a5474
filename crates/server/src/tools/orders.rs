// Order tools. These hit authenticated endpoints; the backend token is
// configured on the SDK client.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use storefront_mcp::messages::tools::{CallToolResult, Tool};
use storefront_mcp::tools::{json_schema_number, json_schema_object, json_schema_string, ToolHandler};
use storefront_sdk::api::{Order, OrderListQuery, OrderStatus};
use storefront_sdk::{SdkError, StoreClient};

fn format_order(order: &Order) -> String {
    let mut text = format!(
        "Order #{} [{}] - ${:.2}",
        order.id, order.status, order.total
    );
    if let Some(created_at) = &order.created_at {
        let _ = write!(text, " ({})", created_at.to_rfc3339());
    }
    text
}

/// Tool to list recent orders.
pub struct ListOrdersTool {
    client: Arc<StoreClient>,
}

impl ListOrdersTool {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct ListOrdersArgs {
    #[serde(default)]
    page: Option<u64>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    status: Option<OrderStatus>,
}

#[async_trait::async_trait]
impl ToolHandler for ListOrdersTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "list_orders".to_string(),
            description: "Lists orders from the storefront. Supports optional pagination \
                          and filtering by status (pending, paid, shipped, delivered, \
                          cancelled)."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "page": json_schema_number("Page number for pagination (default: 1)"),
                    "limit": json_schema_number("Number of orders per page (default: 10)"),
                    "status": json_schema_string("Filter by order status")
                }),
                vec![],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: ListOrdersArgs =
            serde_json::from_value(arguments).context("Invalid arguments for list_orders")?;

        tracing::info!(page = ?args.page, status = ?args.status, "Listing orders");

        let page = self
            .client
            .orders()
            .list(&OrderListQuery {
                page: args.page,
                limit: args.limit,
                status: args.status,
            })
            .await
            .context("failed to list orders")?;

        let mut text = format!("Found {} orders\n\n", page.data.len());
        for (i, order) in page.data.iter().enumerate() {
            let _ = writeln!(text, "{}. {}", i + 1, format_order(order));
        }

        Ok(CallToolResult::text(text))
    }
}

/// Tool to fetch one order with its line items.
pub struct GetOrderTool {
    client: Arc<StoreClient>,
}

impl GetOrderTool {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct GetOrderArgs {
    order_id: u64,
}

#[async_trait::async_trait]
impl ToolHandler for GetOrderTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "get_order".to_string(),
            description: "Fetches a single order by id, including its line items.".to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "order_id": json_schema_number("The order id to fetch")
                }),
                vec!["order_id"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: GetOrderArgs =
            serde_json::from_value(arguments).context("Invalid arguments for get_order")?;

        tracing::info!(order_id = args.order_id, "Fetching order");

        let order = match self.client.orders().get(args.order_id).await {
            Ok(order) => order,
            Err(SdkError::NotFound(_)) => {
                return Ok(CallToolResult::error(format!(
                    "order {} not found",
                    args.order_id
                )));
            }
            Err(err) => return Err(err).context("failed to fetch order"),
        };

        let mut text = format_order(&order);
        text.push_str("\n\nItems:\n");
        for item in &order.items {
            let _ = writeln!(
                text,
                "- {} x {} @ ${:.2}",
                item.quantity,
                item.name.as_deref().unwrap_or("(unnamed product)"),
                item.price
            );
        }

        Ok(CallToolResult::text(text))
    }
}
