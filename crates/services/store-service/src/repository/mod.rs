//! Repository layer for data access.
//!
//! [`Repository`] is the single generic implementation; the marker traits below
//! decide which capabilities an entity family gets.

mod base;
mod customer_repository;
pub mod entities;
pub mod expansion;
mod generic;
pub mod pagination;
pub mod projection;
pub mod query;

pub use base::{KeyedRepository, PaginatedRepository, ReadRepository, WriteRepository};
pub use customer_repository::CustomerAddresses;
pub use expansion::{
    decide_strategy, Expanded, ExpansionPlan, ExpansionPolicy, FetchStrategy, Navigable,
    RelatedNode, RelatedSet,
};
pub use generic::Repository;
pub use pagination::PaginatedList;
pub use projection::Selector;
pub use query::{ColumnMap, ColumnType, QueryFilters, SortDirection, SortSpec};

/// Entity families addressed by a single primary key value.
pub trait Keyed: Navigable {}

/// Entity families listed through request-driven paging.
pub trait Paged: Navigable {}
