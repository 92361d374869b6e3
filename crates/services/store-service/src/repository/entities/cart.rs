//! Cart line database entity.
//!
//! Keyed by (customer, product); only predicate-based access is exposed for it.

use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::repository::expansion::{Navigable, Navigation};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "carts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub customer_id: String,
    #[sea_orm(primary_key, auto_increment = false)]
    pub product_id: i32,
    pub quantity: i32,
    pub added_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::CustomerId",
        to = "super::customer::Column::Id",
        on_delete = "Cascade"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Cascade"
    )]
    Product,
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Navigable for Entity {
    fn navigation(name: &str) -> Option<Navigation> {
        match name {
            "customer" => Navigation::new::<super::customer::Entity>(Relation::Customer.def()),
            "product" => Navigation::new::<super::product::Entity>(Relation::Product.def()),
            _ => None,
        }
    }
}
