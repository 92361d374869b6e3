//! Order database entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::repository::expansion::{Navigable, Navigation};
use crate::repository::{Keyed, Paged};

/// Order lifecycle, stored by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Text")]
pub enum OrderStatus {
    #[sea_orm(string_value = "Pending")]
    Pending,
    #[sea_orm(string_value = "Processing")]
    Processing,
    #[sea_orm(string_value = "Shipped")]
    Shipped,
    #[sea_orm(string_value = "Delivered")]
    Delivered,
    #[sea_orm(string_value = "Canceled")]
    Canceled,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub customer_id: String,
    pub order_date: DateTimeUtc,
    pub shipping_cost: i64,
    pub total_amount: i64,
    pub delivery_man_id: Option<i32>,
    pub status: OrderStatus,
    pub shipping_address: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::delivery_man::Entity",
        from = "Column::DeliveryManId",
        to = "super::delivery_man::Column::Id",
        on_delete = "SetNull"
    )]
    DeliveryMan,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::delivery_man::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DeliveryMan.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Navigable for Entity {
    fn navigation(name: &str) -> Option<Navigation> {
        match name {
            "order_items" => Navigation::new::<super::order_item::Entity>(Relation::OrderItems.def()),
            "customer" => Navigation::new::<super::customer::Entity>(Relation::Customer.def()),
            "delivery_man" => Navigation::new::<super::delivery_man::Entity>(Relation::DeliveryMan.def()),
            _ => None,
        }
    }
}

impl Keyed for Entity {}
impl Paged for Entity {}
