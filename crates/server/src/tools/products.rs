// Product tools: catalog browsing and search backed by the storefront
// API.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fmt::Write as _;
use std::sync::Arc;
use storefront_mcp::messages::tools::{CallToolResult, Tool};
use storefront_mcp::tools::{json_schema_number, json_schema_object, json_schema_string, ToolHandler};
use storefront_sdk::api::{Product, ProductListQuery, ProductSearchQuery};
use storefront_sdk::StoreClient;

fn format_product(product: &Product) -> String {
    format!(
        "**{}** (ID: {}) - ${:.2}",
        product.name, product.id, product.price
    )
}

/// Tool to list products from the catalog.
pub struct ListProductsTool {
    client: Arc<StoreClient>,
}

impl ListProductsTool {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct ListProductsArgs {
    #[serde(default)]
    page: Option<u64>,
    #[serde(default)]
    limit: Option<u64>,
}

#[async_trait::async_trait]
impl ToolHandler for ListProductsTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "list_products".to_string(),
            description: "Lists products from the storefront catalog. Supports optional \
                          pagination with page and limit parameters."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "page": json_schema_number("Page number for pagination (default: 1)"),
                    "limit": json_schema_number("Number of products per page (default: 10)")
                }),
                vec![],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: ListProductsArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for list_products")?;

        tracing::info!(page = ?args.page, limit = ?args.limit, "Listing products");

        let page = self
            .client
            .products()
            .list(&ProductListQuery {
                page: args.page,
                limit: args.limit,
            })
            .await
            .context("failed to list products")?;

        let mut text = format!("Found {} products\n\n", page.data.len());
        for (i, product) in page.data.iter().enumerate() {
            let _ = writeln!(text, "{}. {}", i + 1, format_product(product));
        }

        Ok(CallToolResult::text(text))
    }
}

/// Tool to search products by text and filters.
pub struct SearchProductsTool {
    client: Arc<StoreClient>,
}

impl SearchProductsTool {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }
}

#[derive(Debug, Deserialize)]
struct SearchProductsArgs {
    q: String,
    #[serde(default)]
    page: Option<u64>,
    #[serde(default)]
    limit: Option<u64>,
    #[serde(default)]
    category_id: Option<u64>,
    #[serde(default)]
    min_price: Option<f64>,
    #[serde(default)]
    max_price: Option<f64>,
}

#[async_trait::async_trait]
impl ToolHandler for SearchProductsTool {
    fn definition(&self) -> Tool {
        Tool {
            name: "search_products".to_string(),
            description: "Full-text search products by name, SKU and description with \
                          optional filters for category, price range and pagination."
                .to_string(),
            input_schema: json_schema_object(
                serde_json::json!({
                    "q": json_schema_string("Search query (matches name, SKU and description)"),
                    "page": json_schema_number("Page number for pagination (default: 1)"),
                    "limit": json_schema_number("Number of results per page (default: 10)"),
                    "category_id": json_schema_number("Filter by category ID"),
                    "min_price": json_schema_number("Minimum price filter"),
                    "max_price": json_schema_number("Maximum price filter")
                }),
                vec!["q"],
            ),
        }
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<CallToolResult> {
        let args: SearchProductsArgs = serde_json::from_value(arguments)
            .context("Invalid arguments for search_products")?;

        tracing::info!(query = %args.q, "Searching products");

        let page = self
            .client
            .products()
            .search(&ProductSearchQuery {
                q: args.q.clone(),
                page: args.page,
                limit: args.limit,
                category_id: args.category_id,
                min_price: args.min_price,
                max_price: args.max_price,
            })
            .await
            .context("failed to search products")?;

        tracing::info!(count = page.data.len(), "Product search completed");

        let mut text = format!(
            "Found {} products matching '{}'\n\n",
            page.data.len(),
            args.q
        );
        for (i, product) in page.data.iter().enumerate() {
            let _ = writeln!(text, "{}. {}", i + 1, format_product(product));
        }

        Ok(CallToolResult::text(text))
    }
}
