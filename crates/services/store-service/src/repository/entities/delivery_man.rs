//! Delivery staff database entity.

use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::repository::expansion::{Navigable, Navigation};
use crate::repository::Keyed;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "delivery_men")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub phone_number: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order::Entity")]
    Orders,
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
            "orders" => Navigation::new::<super::order::Entity>(Relation::Orders.def()),
            _ => None,
        }
    }
}

impl Keyed for Entity {}
