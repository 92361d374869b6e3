//! Product database entity.

use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::repository::expansion::{Navigable, Navigation};
use crate::repository::{Keyed, Paged};

/// Prices are stored in minor currency units.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub description: String,
    pub storage_quantity: i32,
    pub current_price: i64,
    pub selling_price: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::product_image::Entity")]
    Images,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::cart::Entity")]
    CartItems,
}

impl Related<super::product_image::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Images.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn is_available(&self) -> bool {
        self.storage_quantity > 0
    }
}

impl Navigable for Entity {
    fn navigation(name: &str) -> Option<Navigation> {
        match name {
            "images" => Navigation::new::<super::product_image::Entity>(Relation::Images.def()),
            "order_items" => Navigation::new::<super::order_item::Entity>(Relation::OrderItems.def()),
            "cart_items" => Navigation::new::<super::cart::Entity>(Relation::CartItems.def()),
            _ => None,
        }
    }
}

impl Keyed for Entity {}
impl Paged for Entity {}
