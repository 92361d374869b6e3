//! Order line database entity.

use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::repository::expansion::{Navigable, Navigation};
use crate::repository::{Keyed, Paged};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub order_id: i32,
    pub product_id: i32,
    pub quantity: i32,
    pub unit_price: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id",
        on_delete = "Cascade"
    )]
    Order,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id"
    )]
    Product,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn total_price(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price
    }
}

impl Navigable for Entity {
    fn navigation(name: &str) -> Option<Navigation> {
        match name {
            "order" => Navigation::new::<super::order::Entity>(Relation::Order.def()),
            "product" => Navigation::new::<super::product::Entity>(Relation::Product.def()),
            _ => None,
        }
    }
}

impl Keyed for Entity {}
impl Paged for Entity {}
