//! Atomic commit, column-level writes and lifecycle of the unit of work.

mod support;

use chrono::Utc;
use sea_orm::{ColumnTrait, Condition};
use tokio_util::sync::CancellationToken;

use common::AppError;
use store_service_lib::infra::{EntryState, UnitOfWork, UnitOfWorkState};
use store_service_lib::repository::entities::{cart, order, order_item, product, OrderStatus};
use store_service_lib::repository::{KeyedRepository, ReadRepository, WriteRepository};
use support::{memory_database, seed, unit_of_work, CUSTOMER};

fn spoon() -> product::Model {
    product::Model {
        id: 0,
        name: "Spoon".to_string(),
        description: "Teaspoon".to_string(),
        storage_quantity: 10,
        current_price: 100,
        selling_price: 150,
    }
}

fn line(product_id: i32, quantity: i32, unit_price: i64) -> order_item::Model {
    order_item::Model {
        id: 0,
        order_id: 0,
        product_id,
        quantity,
        unit_price,
    }
}

#[tokio::test]
async fn test_only_changed_columns_are_written() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    let kettle = uow.products().get(1).await.unwrap().unwrap();
    kettle.modify(|p| p.storage_quantity = 1);

    // Someone else edits another column of the same row in the meantime.
    let other = unit_of_work(&db);
    other
        .products()
        .execute_update(
            Condition::all().add(product::Column::Id.eq(1)),
            product::Column::Description,
            "Edited elsewhere",
        )
        .await
        .unwrap();

    assert_eq!(uow.complete().await.unwrap(), 1);

    let stored = other
        .products()
        .find(Condition::all().add(product::Column::Id.eq(1)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.storage_quantity, 1);
    assert_eq!(stored.description, "Edited elsewhere");
}

#[tokio::test]
async fn test_failed_commit_persists_nothing_and_keeps_changes() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    uow.products().add(spoon()).unwrap();
    uow.order_items()
        .add(order_item::Model {
            order_id: 999,
            ..line(1, 1, 2_500)
        })
        .unwrap();

    let result = uow.complete().await;
    assert!(matches!(result, Err(AppError::Persistence(_))), "{result:?}");
    assert!(uow.has_changes().unwrap());
    assert_eq!(uow.state(), UnitOfWorkState::Open);

    let check = unit_of_work(&db);
    assert_eq!(check.products().count().await.unwrap(), 3);
    assert_eq!(check.order_items().count().await.unwrap(), 3);

    uow.discard_changes().unwrap();
    assert!(!uow.has_changes().unwrap());
    assert_eq!(uow.complete().await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_of_a_vanished_row_fails_the_commit() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    uow.products()
        .delete(&product::Model { id: 99, ..spoon() })
        .unwrap();

    let result = uow.complete().await;
    assert!(matches!(result, Err(AppError::Persistence(_))), "{result:?}");
    assert!(uow.has_changes().unwrap());
}

#[tokio::test]
async fn test_generated_key_is_visible_after_commit() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    let added = uow.products().add(spoon()).unwrap();
    assert_eq!(added.state(), EntryState::Added);
    assert_eq!(uow.complete().await.unwrap(), 1);

    let id = added.get().id;
    assert_eq!(id, 4);
    assert_eq!(added.state(), EntryState::Unchanged);

    let again = uow.products().get(id).await.unwrap().unwrap();
    assert!(again.same_entry(&added));
}

#[tokio::test]
async fn test_order_and_items_commit_together() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    let placed = uow
        .orders()
        .add(order::Model {
            id: 0,
            customer_id: CUSTOMER.to_string(),
            order_date: Utc::now(),
            shipping_cost: 300,
            total_amount: 5_300,
            delivery_man_id: None,
            status: OrderStatus::Pending,
            shipping_address: "Cairo, Nasr City, 5 Abbas St.".to_string(),
        })
        .unwrap();
    let items = uow
        .order_items()
        .add_range(vec![line(1, 1, 2_500), line(3, 2, 1_200)])
        .unwrap();
    for item in &items {
        item.link(order_item::Column::OrderId, &placed);
    }

    assert_eq!(uow.complete().await.unwrap(), 3);

    let order_id = placed.get().id;
    assert_eq!(order_id, 3);
    assert!(items.iter().all(|item| item.get().order_id == order_id));

    let stored = uow
        .order_items()
        .find_all(Condition::all().add(order_item::Column::OrderId.eq(order_id)))
        .await
        .unwrap();
    assert_eq!(stored.len(), 2);
}

#[tokio::test]
async fn test_lifecycle_states() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);
    assert_eq!(uow.state(), UnitOfWorkState::Open);

    uow.products().add(spoon()).unwrap();
    uow.complete().await.unwrap();
    assert_eq!(uow.state(), UnitOfWorkState::Committed);

    // A committed unit of work still takes more work.
    let again = uow.products().add(spoon()).unwrap();
    assert_eq!(uow.complete().await.unwrap(), 1);
    assert_eq!(again.get().id, 5);

    let products = uow.products();
    uow.dispose();
    uow.dispose();
    assert_eq!(uow.state(), UnitOfWorkState::Disposed);
    assert_eq!(again.state(), EntryState::Detached);

    assert!(matches!(products.count().await, Err(AppError::Disposed)));
    assert!(matches!(products.add(spoon()), Err(AppError::Disposed)));
    assert!(matches!(uow.complete().await, Err(AppError::Disposed)));
    assert!(matches!(uow.discard_changes(), Err(AppError::Disposed)));
}

#[tokio::test]
async fn test_cancelled_commit_writes_nothing() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    uow.products().add(spoon()).unwrap();
    let token = CancellationToken::new();
    token.cancel();

    let result = uow.complete_with(&token).await;
    assert!(matches!(result, Err(AppError::Cancelled)), "{result:?}");
    assert!(uow.has_changes().unwrap());
    assert_eq!(unit_of_work(&db).products().count().await.unwrap(), 3);

    assert_eq!(uow.complete_with(&CancellationToken::new()).await.unwrap(), 1);
}

#[tokio::test]
async fn test_bulk_operations_bypass_staging() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    let mug = uow.products().get(3).await.unwrap().unwrap();
    mug.modify(|p| p.name = "Big Mug".to_string());

    let removed = uow
        .carts()
        .execute_delete(Condition::all().add(cart::Column::CustomerId.eq(CUSTOMER)))
        .await;
    assert!(removed.is_ok());
    assert_eq!(unit_of_work(&db).carts().count().await.unwrap(), 0);

    // The staged rename is untouched by the immediate delete.
    assert_eq!(mug.state(), EntryState::Modified);
    assert_eq!(uow.complete().await.unwrap(), 1);
}
