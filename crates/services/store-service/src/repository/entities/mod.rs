//! SeaORM entity definitions
//!
//! These are the persisted record types the data-access layer manages.
//! Each one declares its navigations so expansion paths can be resolved by name.

pub mod address;
pub mod cart;
pub mod customer;
pub mod delivery_man;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_image;

pub use order::OrderStatus;
