//! Products API endpoints.

use crate::client::StoreClient;
use crate::error::SdkResult;
use serde::{Deserialize, Serialize};

/// Products API for browsing and searching the catalog.
pub struct ProductsApi<'a> {
    client: &'a StoreClient,
}

impl<'a> ProductsApi<'a> {
    pub(crate) fn new(client: &'a StoreClient) -> Self {
        Self { client }
    }

    /// List products with optional pagination.
    pub async fn list(&self, query: &ProductListQuery) -> SdkResult<ProductPage> {
        self.client.http.get_with_query("/products", query).await
    }

    /// Full-text search across name, SKU and description.
    pub async fn search(&self, query: &ProductSearchQuery) -> SdkResult<ProductPage> {
        self.client
            .http
            .get_with_query("/products/search", query)
            .await
    }

    /// Fetch a single product by id.
    pub async fn get(&self, id: u64) -> SdkResult<Product> {
        self.client.http.get(&format!("/products/{id}")).await
    }
}

/// A product in the store catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub price: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
}

/// One page of products.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPage {
    pub data: Vec<Product>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
}

/// Query parameters for listing products.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
}

/// Query parameters for searching products.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductSearchQuery {
    /// Search query, matched against name, SKU and description.
    pub q: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
}
