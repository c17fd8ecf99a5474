//! # Storefront SDK
//!
//! Typed Rust client for the storefront e-commerce REST API. The MCP
//! server's tool, resource and prompt modules reach the backend only
//! through this crate.
//!
//! ```no_run
//! use storefront_sdk::StoreClient;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = StoreClient::builder()
//!     .base_url("https://api.store.example.com")
//!     .api_token("sk-...")
//!     .build()?;
//!
//! let page = client.products().list(&Default::default()).await?;
//! println!("{} products", page.data.len());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod error;
pub mod http;

pub use client::{StoreClient, StoreClientBuilder};
pub use config::{ClientConfig, RetryConfig};
pub use error::{SdkError, SdkResult};
