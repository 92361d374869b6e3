//! Order use cases.
//!
//! Every operation stages its writes across several repositories and finishes
//! with one `complete`, so an order, its items, the stock changes and the
//! emptied cart are persisted together or not at all.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ColumnTrait, Condition, DerivePartialModel, FromQueryResult};
use serde::Serialize;
use tracing::{info, warn};

use crate::infra::UnitOfWork;
use crate::repository::entities::{
    address, cart, customer, delivery_man, order, order_item, product, OrderStatus,
};
use crate::repository::{
    ColumnMap, ColumnType, PaginatedList, PaginatedRepository, QueryFilters, ReadRepository,
    WriteRepository,
};
use common::{AppError, AppResult, OptionExt};

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

/// Receives order events once they are committed.
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    async fn delivery_assigned(
        &self,
        order: &order::Model,
        delivery_man: &delivery_man::Model,
    ) -> AppResult<()>;
}

/// Notifier that only writes a log line.
pub struct LogNotifier;

#[async_trait]
impl OrderNotifier for LogNotifier {
    async fn delivery_assigned(
        &self,
        order: &order::Model,
        delivery_man: &delivery_man::Model,
    ) -> AppResult<()> {
        info!(
            order_id = order.id,
            delivery_man = %delivery_man.name,
            "Delivery assigned"
        );
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, DerivePartialModel, FromQueryResult, Serialize)]
#[sea_orm(entity = "order::Entity")]
#[serde(rename_all = "camelCase")]
pub struct OrderSummary {
    pub id: i32,
    pub order_date: chrono::DateTime<Utc>,
    pub total_amount: i64,
    pub status: OrderStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDetails {
    pub order: order::Model,
    pub items: Vec<(order_item::Model, Option<product::Model>)>,
    pub delivery_man: Option<delivery_man::Model>,
}

fn order_columns() -> ColumnMap<order::Entity> {
    ColumnMap::new("date", order::Column::OrderDate, ColumnType::Date)
        .insert("id", order::Column::Id, ColumnType::Int)
        .insert("total", order::Column::TotalAmount, ColumnType::Int)
        .insert("status", order::Column::Status, ColumnType::String)
}

#[async_trait]
pub trait OrderService: Send + Sync {
    /// Turn the customer's cart into a pending order shipped to their default address
    async fn place_order(&self, customer_id: &str, shipping_cost: i64) -> AppResult<order::Model>;

    /// Cancel a pending or processing order and return its items to stock
    async fn cancel_order(&self, order_id: i32) -> AppResult<order::Model>;

    /// Hand an order to a delivery man, then notify
    async fn assign_delivery(&self, order_id: i32, delivery_man_id: i32)
        -> AppResult<order::Model>;

    async fn order_details(&self, order_id: i32) -> AppResult<OrderDetails>;

    async fn list_orders(
        &self,
        customer_id: &str,
        filters: QueryFilters,
    ) -> AppResult<PaginatedList<OrderSummary>>;
}

pub struct OrderManagement {
    uow: Arc<dyn UnitOfWork>,
    notifier: Arc<dyn OrderNotifier>,
}

impl OrderManagement {
    pub fn new(uow: Arc<dyn UnitOfWork>, notifier: Arc<dyn OrderNotifier>) -> Self {
        Self { uow, notifier }
    }
}

#[async_trait]
impl OrderService for OrderManagement {
    async fn place_order(&self, customer_id: &str, shipping_cost: i64) -> AppResult<order::Model> {
        let customer = self
            .uow
            .customers()
            .tracked_find_expanded(
                Condition::all().add(customer::Column::Id.eq(customer_id)),
                &["cart_items.product", "default_address"],
            )
            .await?
            .ok_or_not_found()?;

        let address = customer
            .related
            .first::<address::Entity>("default_address")
            .cloned()
            .ok_or_else(|| AppError::validation("Customer has no default address"))?;

        let nodes = customer.related.nested("cart_items");
        if nodes.is_empty() {
            return Err(AppError::validation("Cart is empty"));
        }

        // Check every line before any stock is touched
        let mut lines = Vec::with_capacity(nodes.len());
        for node in nodes {
            let Some(line) = node.model::<cart::Entity>() else {
                continue;
            };
            let product = node
                .related()
                .first_tracked::<product::Entity>("product")
                .ok_or_not_found()?;
            let snapshot = product.get();
            if snapshot.storage_quantity < line.quantity {
                return Err(AppError::validation(format!(
                    "Not enough stock for {}",
                    snapshot.name
                )));
            }
            lines.push((line.clone(), product, snapshot.selling_price));
        }

        let mut staged_items = Vec::with_capacity(lines.len());
        let mut subtotal = 0i64;
        for (line, product, unit_price) in &lines {
            product.modify(|p| p.storage_quantity -= line.quantity);
            subtotal += unit_price * i64::from(line.quantity);
            staged_items.push(order_item::Model {
                id: 0,
                order_id: 0,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: *unit_price,
            });
        }

        let order = self.uow.orders().add(order::Model {
            id: 0,
            customer_id: customer_id.to_string(),
            order_date: Utc::now(),
            shipping_cost,
            total_amount: subtotal + shipping_cost,
            delivery_man_id: None,
            status: OrderStatus::Pending,
            shipping_address: address.to_string(),
        })?;
        for item in self.uow.order_items().add_range(staged_items)? {
            item.link(order_item::Column::OrderId, &order);
        }
        let cart_lines: Vec<cart::Model> = lines.into_iter().map(|(line, ..)| line).collect();
        self.uow.carts().delete_range(&cart_lines)?;

        let written = self.uow.complete().await?;
        let placed = order.get();
        info!(
            order_id = placed.id,
            customer_id,
            lines = cart_lines.len(),
            written,
            "Order placed"
        );
        Ok(placed)
    }

    async fn cancel_order(&self, order_id: i32) -> AppResult<order::Model> {
        let expanded = self
            .uow
            .orders()
            .tracked_find_expanded(
                Condition::all().add(order::Column::Id.eq(order_id)),
                &["order_items.product"],
            )
            .await?
            .ok_or_not_found()?;
        let order = expanded.entity;
        if !matches!(
            order.get().status,
            OrderStatus::Pending | OrderStatus::Processing
        ) {
            return Err(AppError::validation(
                "Only pending or processing orders can be canceled",
            ));
        }

        for node in expanded.related.nested("order_items") {
            let Some(item) = node.model::<order_item::Entity>() else {
                continue;
            };
            if let Some(product) = node.related().first_tracked::<product::Entity>("product") {
                product.modify(|p| p.storage_quantity += item.quantity);
            }
        }
        order.modify(|o| o.status = OrderStatus::Canceled);

        self.uow.complete().await?;
        Ok(order.get())
    }

    async fn assign_delivery(
        &self,
        order_id: i32,
        delivery_man_id: i32,
    ) -> AppResult<order::Model> {
        let orders = self.uow.orders();
        let current = orders
            .find(Condition::all().add(order::Column::Id.eq(order_id)))
            .await?
            .ok_or_not_found()?;
        let delivery_man = self
            .uow
            .delivery_men()
            .find(Condition::all().add(delivery_man::Column::Id.eq(delivery_man_id)))
            .await?
            .ok_or_not_found()?;

        orders.attach(current.clone())?;
        let assigned = order::Model {
            delivery_man_id: Some(delivery_man_id),
            ..current
        };
        let tracked = orders.mark_property_modified(&assigned, order::Column::DeliveryManId)?;

        self.uow.complete().await?;
        let order = tracked.get();

        if let Err(err) = self.notifier.delivery_assigned(&order, &delivery_man).await {
            warn!(order_id, error = %err, "Delivery notification failed");
        }
        Ok(order)
    }

    async fn order_details(&self, order_id: i32) -> AppResult<OrderDetails> {
        let expanded = self
            .uow
            .orders()
            .find_expanded(
                Condition::all().add(order::Column::Id.eq(order_id)),
                &["order_items.product", "delivery_man"],
            )
            .await?
            .ok_or_not_found()?;

        let items = expanded
            .related
            .nested("order_items")
            .iter()
            .filter_map(|node| {
                let item = node.model::<order_item::Entity>()?.clone();
                let product = node.related().first::<product::Entity>("product").cloned();
                Some((item, product))
            })
            .collect();

        Ok(OrderDetails {
            delivery_man: expanded
                .related
                .first::<delivery_man::Entity>("delivery_man")
                .cloned(),
            items,
            order: expanded.entity,
        })
    }

    async fn list_orders(
        &self,
        customer_id: &str,
        filters: QueryFilters,
    ) -> AppResult<PaginatedList<OrderSummary>> {
        self.uow
            .orders()
            .find_paginated_list::<OrderSummary>(
                Condition::all().add(order::Column::CustomerId.eq(customer_id)),
                &filters,
                &order_columns(),
            )
            .await
    }
}
