// Store tools exposed over MCP.

pub mod orders;
pub mod products;

pub use orders::{GetOrderTool, ListOrdersTool};
pub use products::{ListProductsTool, SearchProductsTool};
