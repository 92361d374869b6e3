//! In-memory store shared by unit tests.

use std::sync::Arc;

use chrono::Utc;
use sea_orm::{ActiveModelTrait, IntoActiveModel};

use crate::infra::{Database, Persistence};
use crate::repository::entities::{address, cart, customer, delivery_man, product};
use crate::repository::ExpansionPolicy;
use common::DatabaseConfig;

pub(crate) const CUSTOMER: &str = "customer-1";

/// Migrated SQLite database living for as long as its single connection.
pub(crate) async fn memory_database() -> Database {
    Database::connect(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
    })
    .await
    .expect("in-memory database")
}

pub(crate) fn unit_of_work(db: &Database) -> Arc<Persistence> {
    Arc::new(Persistence::new(db.get_connection(), ExpansionPolicy::default()))
}

/// Two products, one delivery man, and a customer with a default address and
/// two cart lines. Written directly, outside any unit of work.
pub(crate) async fn seed_store(db: &Database) {
    let conn = db.connection();

    for (id, name, quantity, price) in [(1, "Kettle", 5, 2_500), (2, "Teapot", 2, 4_000)] {
        product::Model {
            id,
            name: name.to_string(),
            description: format!("{name} description"),
            storage_quantity: quantity,
            current_price: price - 500,
            selling_price: price,
        }
        .into_active_model()
        .insert(conn)
        .await
        .expect("product");
    }

    delivery_man::Model {
        id: 1,
        name: "Omar".to_string(),
        phone_number: "+20 100 000 0002".to_string(),
    }
    .into_active_model()
    .insert(conn)
    .await
    .expect("delivery man");

    customer::Model {
        id: CUSTOMER.to_string(),
        full_name: "Mona Ali".to_string(),
        default_address_id: Some(1),
    }
    .into_active_model()
    .insert(conn)
    .await
    .expect("customer");

    for (id, street, is_default) in [(1, "5 Abbas St", true), (2, "9 Tahrir Sq", false)] {
        address::Model {
            id,
            customer_id: CUSTOMER.to_string(),
            governorate: "Cairo".to_string(),
            city: "Nasr City".to_string(),
            street: street.to_string(),
            note: None,
            is_default,
        }
        .into_active_model()
        .insert(conn)
        .await
        .expect("address");
    }

    for (product_id, quantity) in [(1, 2), (2, 1)] {
        cart::Model {
            customer_id: CUSTOMER.to_string(),
            product_id,
            quantity,
            added_at: Utc::now(),
        }
        .into_active_model()
        .insert(conn)
        .await
        .expect("cart line");
    }
}
