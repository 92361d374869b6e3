//! Shared fixtures: a migrated in-memory SQLite store with a small data set.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use sea_orm::{ActiveModelBehavior, ActiveModelTrait, EntityTrait, IntoActiveModel};

use common::DatabaseConfig;
use store_service_lib::infra::{Database, Persistence};
use store_service_lib::repository::entities::{
    address, cart, customer, delivery_man, order, order_item, product, product_image, OrderStatus,
};
use store_service_lib::repository::ExpansionPolicy;

pub const CUSTOMER: &str = "customer-1";

pub async fn memory_database() -> Database {
    Database::connect(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
    })
    .await
    .expect("in-memory database")
}

pub fn unit_of_work(db: &Database) -> Arc<Persistence> {
    Arc::new(Persistence::new(db.get_connection(), ExpansionPolicy::default()))
}

pub fn unit_of_work_with(db: &Database, policy: ExpansionPolicy) -> Arc<Persistence> {
    Arc::new(Persistence::new(db.get_connection(), policy))
}

/// Policy that always loads related data in one statement.
pub fn always_combined() -> ExpansionPolicy {
    ExpansionPolicy {
        max_depth: usize::MAX,
        max_count: usize::MAX,
    }
}

/// Policy that always loads related data one relation hop at a time.
pub fn always_split() -> ExpansionPolicy {
    ExpansionPolicy {
        max_depth: 0,
        max_count: 0,
    }
}

pub async fn insert<A>(db: &Database, active: A)
where
    A: ActiveModelTrait + ActiveModelBehavior + Send,
    <A::Entity as EntityTrait>::Model: IntoActiveModel<A>,
{
    active.insert(db.connection()).await.expect("fixture row");
}

/// Three products (ids 1..=3, prices 2500 / 4000 / 1200), images for the first
/// two, one delivery man, one customer with an address and a cart line, and two
/// orders: #1 with two items, #2 with one item.
pub async fn seed(db: &Database) {
    for (id, name, quantity, price) in [
        (1, "Kettle", 5, 2_500),
        (2, "Teapot", 2, 4_000),
        (3, "Mug", 40, 1_200),
    ] {
        insert(
            db,
            product::Model {
                id,
                name: name.to_string(),
                description: format!("{name} description"),
                storage_quantity: quantity,
                current_price: price - 500,
                selling_price: price,
            }
            .into_active_model(),
        )
        .await;
    }

    for (id, product_id, url) in [
        (1, 1, "/kettle-side.png"),
        (2, 1, "/kettle-front.png"),
        (3, 2, "/teapot.png"),
    ] {
        insert(
            db,
            product_image::Model {
                id,
                product_id,
                url: url.to_string(),
                is_main: id != 2,
            }
            .into_active_model(),
        )
        .await;
    }

    insert(
        db,
        delivery_man::Model {
            id: 1,
            name: "Omar".to_string(),
            phone_number: "+20 100 000 0002".to_string(),
        }
        .into_active_model(),
    )
    .await;

    insert(
        db,
        customer::Model {
            id: CUSTOMER.to_string(),
            full_name: "Mona Ali".to_string(),
            default_address_id: Some(1),
        }
        .into_active_model(),
    )
    .await;

    insert(
        db,
        address::Model {
            id: 1,
            customer_id: CUSTOMER.to_string(),
            governorate: "Cairo".to_string(),
            city: "Nasr City".to_string(),
            street: "5 Abbas St".to_string(),
            note: None,
            is_default: true,
        }
        .into_active_model(),
    )
    .await;

    insert(
        db,
        cart::Model {
            customer_id: CUSTOMER.to_string(),
            product_id: 3,
            quantity: 4,
            added_at: Utc::now(),
        }
        .into_active_model(),
    )
    .await;

    for (id, day, total, delivery_man_id) in [(1, 1, 9_000, Some(1)), (2, 2, 1_200, None)] {
        insert(
            db,
            order::Model {
                id,
                customer_id: CUSTOMER.to_string(),
                order_date: Utc.with_ymd_and_hms(2025, 3, day, 10, 0, 0).unwrap(),
                shipping_cost: 0,
                total_amount: total,
                delivery_man_id,
                status: OrderStatus::Pending,
                shipping_address: "Cairo, Nasr City, 5 Abbas St.".to_string(),
            }
            .into_active_model(),
        )
        .await;
    }

    for (id, order_id, product_id, quantity, unit_price) in
        [(1, 1, 2, 1, 4_000), (2, 1, 1, 2, 2_500), (3, 2, 3, 1, 1_200)]
    {
        insert(
            db,
            order_item::Model {
                id,
                order_id,
                product_id,
                quantity,
                unit_price,
            }
            .into_active_model(),
        )
        .await;
    }
}
