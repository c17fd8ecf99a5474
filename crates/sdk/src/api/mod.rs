//! Typed endpoints of the storefront API.

pub mod orders;
pub mod products;

pub use orders::{Order, OrderItem, OrderListQuery, OrderPage, OrderStatus, OrdersApi};
pub use products::{Product, ProductListQuery, ProductPage, ProductSearchQuery, ProductsApi};
