//! Customer profile and address use cases.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, Condition};
use serde::Serialize;
use tracing::info;

use crate::infra::UnitOfWork;
use crate::repository::entities::{address, customer};
use crate::repository::{CustomerAddresses, KeyedRepository, ReadRepository};
use common::{AppResult, OptionExt};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerProfile {
    pub customer: customer::Model,
    pub addresses: Vec<address::Model>,
    pub default_address: Option<address::Model>,
}

#[async_trait]
pub trait CustomerService: Send + Sync {
    async fn profile(&self, customer_id: &str) -> AppResult<CustomerProfile>;

    async fn addresses(&self, customer_id: &str) -> AppResult<Vec<address::Model>>;

    /// Make `address_id` the only default address of `customer_id`
    async fn set_default_address(
        &self,
        customer_id: &str,
        address_id: i32,
    ) -> AppResult<address::Model>;
}

pub struct CustomerManager {
    uow: Arc<dyn UnitOfWork>,
}

impl CustomerManager {
    pub fn new(uow: Arc<dyn UnitOfWork>) -> Self {
        Self { uow }
    }
}

#[async_trait]
impl CustomerService for CustomerManager {
    async fn profile(&self, customer_id: &str) -> AppResult<CustomerProfile> {
        let expanded = self
            .uow
            .customers()
            .find_expanded(
                Condition::all().add(customer::Column::Id.eq(customer_id)),
                &["addresses", "default_address"],
            )
            .await?
            .ok_or_not_found()?;

        let related = &expanded.related;
        Ok(CustomerProfile {
            addresses: related
                .get::<address::Entity>("addresses")
                .into_iter()
                .cloned()
                .collect(),
            default_address: related
                .first::<address::Entity>("default_address")
                .cloned(),
            customer: expanded.entity,
        })
    }

    async fn addresses(&self, customer_id: &str) -> AppResult<Vec<address::Model>> {
        self.uow.addresses().all_addresses(customer_id).await
    }

    async fn set_default_address(
        &self,
        customer_id: &str,
        address_id: i32,
    ) -> AppResult<address::Model> {
        let addresses = self.uow.addresses();

        let address = addresses
            .get(address_id)
            .await?
            .filter(|a| a.get().customer_id == customer_id)
            .ok_or_not_found()?;
        let customer = self
            .uow
            .customers()
            .get(customer_id.to_string())
            .await?
            .ok_or_not_found()?;

        // Runs immediately; the tracked flag below is forced so it is written back.
        let cleared = addresses.clear_default_address(customer_id).await?;

        address.modify(|a| a.is_default = true);
        address.mark_modified(address::Column::IsDefault);
        customer.modify(|c| c.default_address_id = Some(address_id));

        self.uow.complete().await?;
        info!(customer_id, address_id, cleared, "Default address changed");

        Ok(address.get())
    }
}
