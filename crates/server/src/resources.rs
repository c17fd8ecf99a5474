// Catalog resources: read-only views of the store exposed as MCP
// resources. URIs use the store:// scheme; individual products are
// addressed through the store://products/{id} template.

use std::sync::Arc;
use storefront_mcp::messages::resources::{
    ListResourceTemplatesResult, ListResourcesResult, Resource, ResourceContents,
    ResourceTemplate,
};
use storefront_mcp::protocol::JsonRpcError;
use storefront_mcp::ResourceProvider;
use storefront_sdk::api::ProductListQuery;
use storefront_sdk::{SdkError, StoreClient};

const CATALOG_URI: &str = "store://catalog";
const PRODUCT_URI_PREFIX: &str = "store://products/";

pub struct CatalogResources {
    client: Arc<StoreClient>,
}

impl CatalogResources {
    pub fn new(client: Arc<StoreClient>) -> Self {
        Self { client }
    }

    async fn read_catalog(&self) -> Result<ResourceContents, JsonRpcError> {
        let page = self
            .client
            .products()
            .list(&ProductListQuery {
                page: None,
                limit: Some(50),
            })
            .await
            .map_err(map_sdk_err)?;

        let json = serde_json::to_string_pretty(&page.data)
            .map_err(|err| JsonRpcError::from_fault(&err))?;
        Ok(ResourceContents::text(
            CATALOG_URI,
            Some("application/json"),
            json,
        ))
    }

    async fn read_product(&self, uri: &str, raw_id: &str) -> Result<ResourceContents, JsonRpcError> {
        let id: u64 = raw_id.parse().map_err(|_| {
            JsonRpcError::invalid_params(format!("invalid product id: {raw_id:?}"), None)
        })?;

        let product = self.client.products().get(id).await.map_err(map_sdk_err)?;
        let json = serde_json::to_string_pretty(&product)
            .map_err(|err| JsonRpcError::from_fault(&err))?;
        Ok(ResourceContents::text(uri, Some("application/json"), json))
    }
}

#[async_trait::async_trait]
impl ResourceProvider for CatalogResources {
    fn supports_subscribe(&self) -> bool {
        true
    }

    async fn list(&self, _cursor: Option<String>) -> Result<ListResourcesResult, JsonRpcError> {
        Ok(ListResourcesResult {
            resources: vec![Resource {
                uri: CATALOG_URI.to_string(),
                name: "Product catalog".to_string(),
                description: Some("The first page of the store's product catalog".to_string()),
                mime_type: Some("application/json".to_string()),
            }],
            next_cursor: None,
        })
    }

    async fn templates(
        &self,
        _cursor: Option<String>,
    ) -> Result<ListResourceTemplatesResult, JsonRpcError> {
        Ok(ListResourceTemplatesResult {
            resource_templates: vec![ResourceTemplate {
                uri_template: "store://products/{id}".to_string(),
                name: "Product".to_string(),
                description: Some("A single product by numeric id".to_string()),
                mime_type: Some("application/json".to_string()),
            }],
            next_cursor: None,
        })
    }

    async fn read(&self, uri: &str) -> Result<Vec<ResourceContents>, JsonRpcError> {
        let contents = if uri == CATALOG_URI {
            self.read_catalog().await?
        } else if let Some(raw_id) = uri.strip_prefix(PRODUCT_URI_PREFIX) {
            self.read_product(uri, raw_id).await?
        } else {
            return Err(JsonRpcError::invalid_params(
                format!("unknown resource: {uri}"),
                None,
            ));
        };
        Ok(vec![contents])
    }
}

fn map_sdk_err(err: SdkError) -> JsonRpcError {
    match err {
        SdkError::NotFound(message) => {
            JsonRpcError::invalid_params(format!("not found: {message}"), None)
        }
        other => JsonRpcError::from_fault(&other),
    }
}
