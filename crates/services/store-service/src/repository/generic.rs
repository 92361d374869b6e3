//! Generic repository over any entity family.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ActiveModelBehavior, EntityTrait, IntoActiveModel, PrimaryKeyTrait};

use super::base::{KeyedRepository, PaginatedRepository, ReadRepository, WriteRepository};
use super::expansion::Navigable;
use super::{Keyed, Paged};
use crate::infra::context::DbContext;

/// Repository for entity `E`, bound to one unit of work's context.
pub struct Repository<E: EntityTrait> {
    context: Arc<DbContext>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: EntityTrait> Repository<E> {
    pub fn new(context: Arc<DbContext>) -> Self {
        Self {
            context,
            _entity: PhantomData,
        }
    }
}

impl<E: EntityTrait> fmt::Debug for Repository<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Repository")
            .field("entity", &E::default().table_name())
            .finish()
    }
}

#[async_trait]
impl<E> ReadRepository<E> for Repository<E>
where
    E: Navigable,
    E::Model: Sync + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelBehavior + Send,
{
    fn context(&self) -> &DbContext {
        &self.context
    }
}

#[async_trait]
impl<E> WriteRepository<E> for Repository<E>
where
    E: Navigable,
    E::Model: Sync + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelBehavior + Send,
{
}

#[async_trait]
impl<E> KeyedRepository<E> for Repository<E>
where
    E: Keyed,
    E::Model: Sync + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: Send + Sync,
{
}

#[async_trait]
impl<E> PaginatedRepository<E> for Repository<E>
where
    E: Paged,
    E::Model: Sync + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelBehavior + Send,
{
}
