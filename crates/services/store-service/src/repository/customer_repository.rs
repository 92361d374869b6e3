//! Address queries scoped to one customer.

use async_trait::async_trait;
use sea_orm::{ColumnTrait, Condition};

use super::base::{ReadRepository, WriteRepository};
use super::entities::address;
use super::generic::Repository;
use super::query::SortSpec;
use common::AppResult;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait CustomerAddresses: Send + Sync {
    /// Every address of `customer_id`, oldest first, untracked
    async fn all_addresses(&self, customer_id: &str) -> AppResult<Vec<address::Model>>;

    /// Clear the default flag on every address of `customer_id`, immediately.
    ///
    /// Returns the number of rows touched.
    async fn clear_default_address(&self, customer_id: &str) -> AppResult<u64>;
}

#[async_trait]
impl CustomerAddresses for Repository<address::Entity> {
    async fn all_addresses(&self, customer_id: &str) -> AppResult<Vec<address::Model>> {
        self.find_all_ordered(
            Condition::all().add(address::Column::CustomerId.eq(customer_id)),
            None,
            None,
            Some(SortSpec::asc(address::Column::Id)),
        )
        .await
    }

    async fn clear_default_address(&self, customer_id: &str) -> AppResult<u64> {
        self.execute_update(
            Condition::all()
                .add(address::Column::CustomerId.eq(customer_id))
                .add(address::Column::IsDefault.eq(true)),
            address::Column::IsDefault,
            false,
        )
        .await
    }
}
