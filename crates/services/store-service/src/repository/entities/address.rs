//! Customer address database entity.

use std::fmt;

use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::repository::expansion::{Navigable, Navigation};
use crate::repository::Keyed;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "addresses")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub customer_id: String,
    pub governorate: String,
    pub city: String,
    pub street: String,
    pub note: Option<String>,
    pub is_default: bool,
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
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Single-line shipping label, e.g. `Cairo, Nasr City, 5 Abbas St.`
impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}.", self.governorate, self.city, self.street)?;
        match self.note.as_deref().map(str::trim) {
            Some(note) if !note.is_empty() => write!(f, " Note: {note}"),
            _ => Ok(()),
        }
    }
}

impl Navigable for Entity {
    fn navigation(name: &str) -> Option<Navigation> {
        match name {
            "customer" => Navigation::new::<super::customer::Entity>(Relation::Customer.def()),
            _ => None,
        }
    }
}

impl Keyed for Entity {}
