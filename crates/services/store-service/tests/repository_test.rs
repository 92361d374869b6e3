//! Generic repository tests against an in-memory store.

mod support;

use sea_orm::{ColumnTrait, Condition, DerivePartialModel, FromQueryResult};

use common::AppError;
use store_service_lib::infra::{EntryState, UnitOfWork};
use store_service_lib::repository::entities::{cart, customer, order, order_item, product};
use store_service_lib::repository::{
    CustomerAddresses, KeyedRepository, ReadRepository, Selector, SortSpec, WriteRepository,
};
use support::{memory_database, seed, unit_of_work, CUSTOMER};

#[derive(Debug, PartialEq, DerivePartialModel, FromQueryResult)]
#[sea_orm(entity = "product::Entity")]
struct NameAndPrice {
    name: String,
    selling_price: i64,
}

#[derive(Debug, PartialEq, FromQueryResult)]
struct CustomerOfOrder {
    customer_id: String,
}

fn product_id(id: i32) -> Condition {
    Condition::all().add(product::Column::Id.eq(id))
}

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

#[tokio::test]
async fn test_untracked_reads_are_detached() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    let mut kettle = uow.products().find(product_id(1)).await.unwrap().unwrap();
    kettle.storage_quantity = 0;

    assert!(!uow.has_changes().unwrap());
    assert_eq!(uow.complete().await.unwrap(), 0);

    let stored = unit_of_work(&db)
        .products()
        .find(product_id(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.storage_quantity, 5);
}

#[tokio::test]
async fn test_absent_rows_are_not_errors() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    assert!(uow.products().find(product_id(99)).await.unwrap().is_none());
    assert!(uow.products().get(99).await.unwrap().is_none());
    assert!(uow
        .products()
        .find_all(product_id(99))
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_tracked_reads_share_one_instance() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);
    let products = uow.products();

    let by_key = products.get(2).await.unwrap().unwrap();
    let by_filter = products.tracked_find(product_id(2)).await.unwrap().unwrap();
    let from_list = products
        .tracked_get_all()
        .await
        .unwrap()
        .into_iter()
        .find(|p| p.get().id == 2)
        .unwrap();

    assert!(by_key.same_entry(&by_filter));
    assert!(by_key.same_entry(&from_list));

    by_key.modify(|p| p.name = "Tea Pot".to_string());
    assert_eq!(from_list.get().name, "Tea Pot");
    assert_eq!(by_filter.state(), EntryState::Modified);
}

#[tokio::test]
async fn test_count_any_and_exists() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);
    let products = uow.products();

    assert_eq!(products.count().await.unwrap(), 3);
    assert_eq!(
        products
            .count_where(Condition::all().add(product::Column::SellingPrice.gt(2_000)))
            .await
            .unwrap(),
        2
    );
    assert!(products
        .any(Condition::all().add(product::Column::Name.eq("Mug")))
        .await
        .unwrap());
    assert!(!products
        .any(Condition::all().add(product::Column::Name.eq("Spoon")))
        .await
        .unwrap());
    assert!(products.exists(3).await.unwrap());
    assert!(!products.exists(4).await.unwrap());
}

#[tokio::test]
async fn test_find_all_ordered_windows_the_sorted_rows() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);
    let products = uow.products();

    let names: Vec<String> = products
        .find_all_ordered(
            Condition::all(),
            Some(2),
            Some(1),
            Some(SortSpec::desc(product::Column::SellingPrice)),
        )
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();

    assert_eq!(names, vec!["Kettle", "Mug"]);
}

#[tokio::test]
async fn test_default_shape_projection() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);
    let products = uow.products();

    let single = products
        .find_projection::<NameAndPrice>(product_id(3))
        .await
        .unwrap();
    assert_eq!(
        single,
        Some(NameAndPrice {
            name: "Mug".to_string(),
            selling_price: 1_200,
        })
    );

    let all = products.get_all_projection::<NameAndPrice>().await.unwrap();
    assert_eq!(all.len(), 3);
}

#[tokio::test]
async fn test_selector_projection_deduplicates_in_the_query() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);
    let orders = uow.orders();

    let selector = Selector::<order::Entity>::new()
        .column(order::Column::CustomerId)
        .distinct();
    let customers = orders
        .find_all_projection_with::<CustomerOfOrder>(Condition::all(), &selector)
        .await
        .unwrap();

    assert_eq!(
        customers,
        vec![CustomerOfOrder {
            customer_id: CUSTOMER.to_string(),
        }]
    );

    let empty = Selector::<order::Entity>::new();
    assert!(matches!(
        orders
            .find_projection_with::<CustomerOfOrder>(Condition::all(), &empty)
            .await,
        Err(AppError::Validation(_))
    ));
}

#[tokio::test]
async fn test_add_with_an_already_tracked_natural_key_conflicts() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);
    let customers = uow.customers();

    customers.get(CUSTOMER.to_string()).await.unwrap().unwrap();
    let duplicate = customers.add(customer::Model {
        id: CUSTOMER.to_string(),
        full_name: "Someone Else".to_string(),
        default_address_id: None,
    });

    assert!(matches!(duplicate, Err(AppError::Conflict(_))));
}

#[tokio::test]
async fn test_update_of_a_detached_model_writes_the_row() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    let mut mug = unit_of_work(&db)
        .products()
        .find(product_id(3))
        .await
        .unwrap()
        .unwrap();
    mug.selling_price = 1_500;
    mug.description = "Stoneware".to_string();

    let tracked = uow.products().update(mug).unwrap();
    assert_eq!(tracked.state(), EntryState::Modified);
    assert_eq!(uow.complete().await.unwrap(), 1);

    let stored = unit_of_work(&db)
        .products()
        .find(product_id(3))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.selling_price, 1_500);
    assert_eq!(stored.description, "Stoneware");
}

#[tokio::test]
async fn test_staged_deletes_across_repositories_run_at_commit() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    let mug = uow.products().find(product_id(3)).await.unwrap().unwrap();
    let items = uow
        .order_items()
        .find_all(Condition::all().add(order_item::Column::ProductId.eq(3)))
        .await
        .unwrap();
    let lines = uow
        .carts()
        .find_all(Condition::all().add(cart::Column::ProductId.eq(3)))
        .await
        .unwrap();
    assert_eq!((items.len(), lines.len()), (1, 1));

    // Rows referencing the mug go first.
    uow.order_items().delete_range(&items).unwrap();
    uow.carts().delete_range(&lines).unwrap();
    uow.products().delete(&mug).unwrap();
    assert!(unit_of_work(&db).products().exists(3).await.unwrap());

    assert_eq!(uow.complete().await.unwrap(), 3);

    let check = unit_of_work(&db);
    assert!(!check.products().exists(3).await.unwrap());
    assert_eq!(check.order_items().count().await.unwrap(), 2);
    assert_eq!(check.carts().count().await.unwrap(), 0);
}

#[tokio::test]
async fn test_deleting_an_added_entity_untracks_it() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    let spoon = uow.products().add(spoon()).unwrap();
    uow.products().delete_tracked(&spoon).unwrap();

    assert_eq!(spoon.state(), EntryState::Detached);
    assert!(!uow.has_changes().unwrap());
    assert_eq!(uow.complete().await.unwrap(), 0);
}

#[tokio::test]
async fn test_deleting_an_added_model_by_value_untracks_it() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    let spoon = uow.products().add(spoon()).unwrap();
    uow.products().delete(&spoon.get()).unwrap();

    assert_eq!(spoon.state(), EntryState::Detached);
    assert!(!uow.has_changes().unwrap());
    assert_eq!(uow.complete().await.unwrap(), 0);
    assert_eq!(unit_of_work(&db).products().count().await.unwrap(), 3);
}

#[tokio::test]
async fn test_updating_an_added_model_by_value_keeps_one_insert() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    let spoon = uow.products().add(spoon()).unwrap();
    let updated = uow
        .products()
        .update(product::Model {
            selling_price: 175,
            ..spoon.get()
        })
        .unwrap();

    assert!(updated.same_entry(&spoon));
    assert_eq!(updated.state(), EntryState::Added);
    assert_eq!(uow.complete().await.unwrap(), 1);

    let stored = unit_of_work(&db)
        .products()
        .find(product_id(spoon.get().id))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.selling_price, 175);
    assert_eq!(unit_of_work(&db).products().count().await.unwrap(), 4);
}

#[tokio::test]
async fn test_ambiguous_added_models_need_their_handle() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);
    let products = uow.products();

    let spoon = products.add(spoon()).unwrap();
    let fork = products
        .add(product::Model {
            name: "Fork".to_string(),
            ..spoon.get()
        })
        .unwrap();

    let renamed = products.update(product::Model {
        name: "Knife".to_string(),
        ..spoon.get()
    });
    assert!(matches!(renamed, Err(AppError::NotTracked(_))), "{renamed:?}");

    // An exact copy still identifies one of them.
    products.delete(&fork.get()).unwrap();
    assert_eq!(fork.state(), EntryState::Detached);
    assert_eq!(spoon.state(), EntryState::Added);
    assert_eq!(uow.complete().await.unwrap(), 1);
}

#[tokio::test]
async fn test_mark_property_modified_requires_a_tracked_entity() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);
    let orders = uow.orders();
    let order = orders
        .find(Condition::all().add(order::Column::Id.eq(2)))
        .await
        .unwrap()
        .unwrap();

    let untracked = orders.mark_property_modified(&order, order::Column::Status);
    assert!(matches!(untracked, Err(AppError::NotTracked(_))));

    orders.attach(order.clone()).unwrap();
    let unknown = orders.mark_property_modified_named(&order, "warehouse");
    assert!(matches!(
        unknown,
        Err(AppError::UnknownColumn { ref column, .. }) if column == "warehouse"
    ));
    assert!(orders
        .mark_property_modified_named(&order, "status")
        .is_ok());
}

#[tokio::test]
async fn test_mark_property_modified_writes_only_that_column() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);
    let orders = uow.orders();
    let order = orders
        .find(Condition::all().add(order::Column::Id.eq(2)))
        .await
        .unwrap()
        .unwrap();

    orders.attach(order.clone()).unwrap();
    let changed = order::Model {
        delivery_man_id: Some(1),
        total_amount: 1,
        ..order
    };
    orders
        .mark_property_modified(&changed, order::Column::DeliveryManId)
        .unwrap();
    uow.complete().await.unwrap();

    let stored = unit_of_work(&db)
        .orders()
        .find(Condition::all().add(order::Column::Id.eq(2)))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.delivery_man_id, Some(1));
    assert_eq!(stored.total_amount, 1_200);
}

#[tokio::test]
async fn test_execute_delete_and_update_are_immediate() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);

    let updated = uow
        .products()
        .execute_update(
            Condition::all().add(product::Column::SellingPrice.lt(3_000)),
            product::Column::StorageQuantity,
            0,
        )
        .await
        .unwrap();
    assert_eq!(updated, 2);

    let deleted = uow
        .carts()
        .execute_delete(Condition::all())
        .await
        .unwrap();
    assert_eq!(deleted, 1);
    assert!(!uow.has_changes().unwrap());

    let check = unit_of_work(&db);
    assert_eq!(check.carts().count().await.unwrap(), 0);
    assert_eq!(
        check
            .products()
            .count_where(Condition::all().add(product::Column::StorageQuantity.eq(0)))
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn test_customer_address_helpers() {
    let db = memory_database().await;
    seed(&db).await;
    let uow = unit_of_work(&db);
    let addresses = uow.addresses();

    let all = addresses.all_addresses(CUSTOMER).await.unwrap();
    assert_eq!(all.len(), 1);
    assert!(all[0].is_default);

    assert_eq!(addresses.clear_default_address(CUSTOMER).await.unwrap(), 1);
    assert_eq!(addresses.clear_default_address(CUSTOMER).await.unwrap(), 0);
    assert!(!addresses.all_addresses(CUSTOMER).await.unwrap()[0].is_default);
}
