//! Service layer - use cases built on the unit of work.

mod customer_service;
mod order_service;
mod product_service;

pub use customer_service::{CustomerManager, CustomerProfile, CustomerService};
pub use order_service::{
    LogNotifier, OrderDetails, OrderManagement, OrderNotifier, OrderService, OrderSummary,
};
pub use product_service::{
    catalog_columns, ProductCatalog, ProductDetail, ProductService, ProductSummary,
};

#[cfg(any(test, feature = "test-utils"))]
pub use order_service::MockOrderNotifier;
