//! Store Service Library
//!
//! Generic data-access layer for the store: repositories over every entity
//! family, a request-driven query and pagination engine, related-data expansion,
//! and a unit of work that commits staged changes atomically.

pub mod config;
pub mod infra;
pub mod repository;
pub mod service;

#[cfg(test)]
mod test_support;

use std::sync::Arc;

use chrono::Utc;
use sea_orm::Condition;
use tracing::info;

use crate::config::StoreServiceConfig;
use crate::infra::{Database, Persistence, UnitOfWork};
use crate::repository::entities::{address, cart, customer, delivery_man, product, product_image};
use crate::repository::{ExpansionPolicy, QueryFilters, ReadRepository, WriteRepository};
use crate::service::{ProductCatalog, ProductService};

/// Open a unit of work on `db` with the configured expansion thresholds.
pub fn unit_of_work(db: &Database, config: &StoreServiceConfig) -> Arc<Persistence> {
    Arc::new(Persistence::new(
        db.get_connection(),
        ExpansionPolicy::from(config.expansion),
    ))
}

/// Run migrations (for CLI commands).
pub async fn run_migrations(action: MigrateAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = StoreServiceConfig::from_env();
    let db = Database::connect_without_migrations(&config.database).await?;

    match action {
        MigrateAction::Up => {
            db.run_migrations().await?;
            info!("Migrations applied successfully");
        }
        MigrateAction::Down => {
            db.rollback_migration().await?;
            info!("Rolled back last migration");
        }
        MigrateAction::Status => {
            let status = db.migration_status().await?;
            for (name, applied) in status {
                let marker = if applied { "[x]" } else { "[ ]" };
                println!("{} {}", marker, name);
            }
        }
        MigrateAction::Fresh => {
            db.fresh_migrations().await?;
            info!("Database reset and migrations applied");
        }
    }

    Ok(())
}

/// Migration action type.
#[derive(Debug, Clone, Copy)]
pub enum MigrateAction {
    Up,
    Down,
    Status,
    Fresh,
}

/// Insert a small demo catalog unless products already exist.
pub async fn seed() -> Result<(), Box<dyn std::error::Error>> {
    let config = StoreServiceConfig::from_env();
    let db = Database::connect(&config.database).await?;
    let uow = unit_of_work(&db, &config);

    let written = seed_catalog(&*uow).await.map_err(|e| e.user_message())?;
    uow.dispose();

    info!(written, "Seed finished");
    Ok(())
}

/// Print one catalog page as JSON.
///
/// A missing page size takes the configured default; oversized pages are clamped.
pub async fn list_products(
    mut filters: QueryFilters,
    page_size: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = StoreServiceConfig::from_env();
    let db = Database::connect(&config.database).await?;
    let uow = unit_of_work(&db, &config);

    filters.page_size = page_size.unwrap_or(config.pagination.default_page_size);
    let catalog = ProductCatalog::new(
        Arc::clone(&uow) as Arc<dyn UnitOfWork>,
        config.pagination.max_page_size,
    );
    let page = catalog
        .list_products(filters)
        .await
        .map_err(|e| e.user_message())?;
    uow.dispose();

    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}

/// Stage and commit the demo catalog through `uow`; returns the entries written.
pub async fn seed_catalog(uow: &dyn UnitOfWork) -> common::AppResult<usize> {
    if uow.products().any(Condition::all()).await? {
        info!("Catalog already seeded");
        return Ok(0);
    }

    let catalog = [
        ("Espresso Machine", "15 bar pump, steel body", 12, 89_900, 109_900),
        ("Burr Grinder", "40 grind settings", 30, 24_900, 32_900),
        ("Milk Jug", "600 ml, stainless", 80, 1_900, 2_900),
    ];
    for (name, description, quantity, cost, price) in catalog {
        let product = uow.products().add(product::Model {
            id: 0,
            name: name.to_string(),
            description: description.to_string(),
            storage_quantity: quantity,
            current_price: cost,
            selling_price: price,
        })?;
        let image = uow.product_images().add(product_image::Model {
            id: 0,
            product_id: 0,
            url: format!("/images/{}.png", name.to_lowercase().replace(' ', "-")),
            is_main: true,
        })?;
        image.link(product_image::Column::ProductId, &product);
    }

    uow.delivery_men().add(delivery_man::Model {
        id: 0,
        name: "Karim Adel".to_string(),
        phone_number: "+20 100 000 0001".to_string(),
    })?;

    let customer = uow.customers().add(customer::Model {
        id: "demo-customer".to_string(),
        full_name: "Demo Customer".to_string(),
        default_address_id: None,
    })?;
    let address = uow.addresses().add(address::Model {
        id: 0,
        customer_id: String::new(),
        governorate: "Cairo".to_string(),
        city: "Nasr City".to_string(),
        street: "5 Abbas St".to_string(),
        note: None,
        is_default: true,
    })?;
    address.link(address::Column::CustomerId, &customer);

    let mut written = uow.complete().await?;

    // The address id exists only after the first commit.
    customer.modify(|c| c.default_address_id = Some(address.get().id));
    let first_product = uow
        .products()
        .find_all_ordered(Condition::all(), Some(1), None, None)
        .await?;
    if let Some(product) = first_product.first() {
        uow.carts().add(cart::Model {
            customer_id: customer.get().id,
            product_id: product.id,
            quantity: 1,
            added_at: Utc::now(),
        })?;
    }
    written += uow.complete().await?;

    Ok(written)
}
