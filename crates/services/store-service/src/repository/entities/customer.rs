//! Customer database entity.
//!
//! The key is the identity-provider user id, so it is never store-generated.

use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::repository::expansion::{Navigable, Navigation};
use crate::repository::Keyed;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub full_name: String,
    pub default_address_id: Option<i32>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::address::Entity")]
    Addresses,
    #[sea_orm(has_many = "super::cart::Entity")]
    CartItems,
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
    #[sea_orm(
        belongs_to = "super::address::Entity",
        from = "Column::DefaultAddressId",
        to = "super::address::Column::Id"
    )]
    DefaultAddress,
}

impl Related<super::address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Addresses.def()
    }
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CartItems.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Navigable for Entity {
    fn navigation(name: &str) -> Option<Navigation> {
        match name {
            "addresses" => Navigation::new::<super::address::Entity>(Relation::Addresses.def()),
            "cart_items" => Navigation::new::<super::cart::Entity>(Relation::CartItems.def()),
            "orders" => Navigation::new::<super::order::Entity>(Relation::Orders.def()),
            "default_address" => {
                Navigation::new::<super::address::Entity>(Relation::DefaultAddress.def())
            }
            _ => None,
        }
    }
}

impl Keyed for Entity {}
