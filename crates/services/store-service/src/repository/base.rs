//! Repository capability traits.
//!
//! Every capability is written once as default methods over [`ReadRepository::context`];
//! a concrete repository only supplies the shared persistence context and picks
//! which capabilities its entity family gets.
//!
//! Reads come in two flavours. Untracked reads return detached snapshots that
//! never influence a commit. Tracked reads return [`Tracked`] handles on the unit
//! of work's canonical copy of each row, and changes made through them are
//! written by the next `complete`.

use std::str::FromStr;

use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelBehavior, Condition, EntityTrait, FromQueryResult, IntoActiveModel, PaginatorTrait,
    PartialModelTrait, PrimaryKeyTrait, QueryFilter, Value,
};
use tracing::{debug, info};

use super::expansion::{self, Expanded, ExpansionPlan, Navigable, RootQuery};
use super::pagination::{paginate, PaginatedList};
use super::projection::Selector;
use super::query::{ColumnMap, QueryFilters, QueryPlan, SortSpec};
use super::{Keyed, Paged};
use crate::infra::change_tracker::{ChangeTracker, EntityKey, EntryState, Tracked};
use crate::infra::context::DbContext;
use common::{AppError, AppResult};

/// Read operations
#[async_trait]
pub trait ReadRepository<E>: Send + Sync
where
    E: Navigable,
    E::Model: Sync + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelBehavior + Send,
{
    /// Persistence context shared with the owning unit of work
    fn context(&self) -> &DbContext;

    /// First row matching `condition`, untracked
    async fn find(&self, condition: Condition) -> AppResult<Option<E::Model>> {
        let db = self.context().connection()?;
        Ok(E::find().filter(condition).one(&db).await?)
    }

    /// All rows matching `condition`, untracked
    async fn find_all(&self, condition: Condition) -> AppResult<Vec<E::Model>> {
        let db = self.context().connection()?;
        Ok(E::find().filter(condition).all(&db).await?)
    }

    /// Every row, untracked
    async fn get_all(&self) -> AppResult<Vec<E::Model>> {
        self.find_all(Condition::all()).await
    }

    /// Rows matching `condition` in `order_by` order (key order when absent),
    /// skipping `skip` rows and returning at most `take`
    async fn find_all_ordered(
        &self,
        condition: Condition,
        take: Option<u64>,
        skip: Option<u64>,
        order_by: Option<SortSpec<E>>,
    ) -> AppResult<Vec<E::Model>> {
        let db = self.context().connection()?;
        let root = RootQuery {
            select: E::find().filter(condition),
            sort: order_by,
            skip,
            take,
        };
        Ok(root.ordered().all(&db).await?)
    }

    /// First row matching `condition` with the related data named by `paths`
    async fn find_expanded(
        &self,
        condition: Condition,
        paths: &[&str],
    ) -> AppResult<Option<Expanded<E::Model>>> {
        let plan = ExpansionPlan::resolve::<E, _>(paths, self.context().expansion())?;
        let db = self.context().connection()?;

        let mut root = RootQuery::new(E::find().filter(condition));
        root.take = Some(1);

        let rows = expansion::load(&db, root, &plan).await?;
        Ok(rows
            .into_iter()
            .next()
            .map(|(entity, related)| Expanded { entity, related }))
    }

    /// All rows matching `condition` with the related data named by `paths`
    async fn find_all_expanded(
        &self,
        condition: Condition,
        paths: &[&str],
    ) -> AppResult<Vec<Expanded<E::Model>>> {
        let plan = ExpansionPlan::resolve::<E, _>(paths, self.context().expansion())?;
        let db = self.context().connection()?;

        let rows = expansion::load(&db, RootQuery::new(E::find().filter(condition)), &plan).await?;
        Ok(rows
            .into_iter()
            .map(|(entity, related)| Expanded { entity, related })
            .collect())
    }

    /// Every row with the related data named by `paths`
    async fn get_all_expanded(&self, paths: &[&str]) -> AppResult<Vec<Expanded<E::Model>>> {
        self.find_all_expanded(Condition::all(), paths).await
    }

    /// First row matching `condition`, tracked
    async fn tracked_find(&self, condition: Condition) -> AppResult<Option<Tracked<E>>> {
        let db = self.context().connection()?;
        let model = E::find().filter(condition).one(&db).await?;

        let mut tracker = self.context().tracker()?;
        Ok(model.map(|m| tracker.track_loaded::<E>(m)))
    }

    /// All rows matching `condition`, tracked
    async fn tracked_find_all(&self, condition: Condition) -> AppResult<Vec<Tracked<E>>> {
        let db = self.context().connection()?;
        let models = E::find().filter(condition).all(&db).await?;

        let mut tracker = self.context().tracker()?;
        Ok(models
            .into_iter()
            .map(|m| tracker.track_loaded::<E>(m))
            .collect())
    }

    /// Every row, tracked
    async fn tracked_get_all(&self) -> AppResult<Vec<Tracked<E>>> {
        self.tracked_find_all(Condition::all()).await
    }

    /// First row matching `condition`, tracked, with the related data named by `paths`.
    ///
    /// Every related row is tracked too; reach its handle through
    /// [`RelatedSet::tracked`](super::RelatedSet::tracked).
    async fn tracked_find_expanded(
        &self,
        condition: Condition,
        paths: &[&str],
    ) -> AppResult<Option<Expanded<Tracked<E>>>> {
        let plan = ExpansionPlan::resolve::<E, _>(paths, self.context().expansion())?;
        let db = self.context().connection()?;

        let mut root = RootQuery::new(E::find().filter(condition));
        root.take = Some(1);

        let rows = expansion::load(&db, root, &plan).await?;
        let Some((entity, mut related)) = rows.into_iter().next() else {
            return Ok(None);
        };

        let mut tracker = self.context().tracker()?;
        plan.track(&mut related, &mut tracker);
        Ok(Some(Expanded {
            entity: tracker.track_loaded::<E>(entity),
            related,
        }))
    }

    /// Count all rows
    async fn count(&self) -> AppResult<u64> {
        self.count_where(Condition::all()).await
    }

    /// Count rows matching `condition`
    async fn count_where(&self, condition: Condition) -> AppResult<u64> {
        let db = self.context().connection()?;
        Ok(E::find().filter(condition).count(&db).await?)
    }

    /// True when at least one row matches `condition`
    async fn any(&self, condition: Condition) -> AppResult<bool> {
        Ok(self.find(condition).await?.is_some())
    }

    /// Every row in the default projected shape `P`
    async fn get_all_projection<P>(&self) -> AppResult<Vec<P>>
    where
        P: PartialModelTrait + Send + Sync,
    {
        self.find_all_projection::<P>(Condition::all()).await
    }

    /// Every row through `selector`
    async fn get_all_projection_with<P>(&self, selector: &Selector<E>) -> AppResult<Vec<P>>
    where
        P: FromQueryResult + Send + Sync,
    {
        self.find_all_projection_with::<P>(Condition::all(), selector)
            .await
    }

    /// First row matching `condition` projected into `P`
    async fn find_projection<P>(&self, condition: Condition) -> AppResult<Option<P>>
    where
        P: PartialModelTrait + Send + Sync,
    {
        let db = self.context().connection()?;
        Ok(E::find()
            .filter(condition)
            .into_partial_model::<P>()
            .one(&db)
            .await?)
    }

    /// First row matching `condition` through `selector`
    async fn find_projection_with<P>(
        &self,
        condition: Condition,
        selector: &Selector<E>,
    ) -> AppResult<Option<P>>
    where
        P: FromQueryResult + Send + Sync,
    {
        let db = self.context().connection()?;
        let select = selector.apply(E::find().filter(condition))?;
        Ok(select.into_model::<P>().one(&db).await?)
    }

    /// All rows matching `condition` projected into `P`
    async fn find_all_projection<P>(&self, condition: Condition) -> AppResult<Vec<P>>
    where
        P: PartialModelTrait + Send + Sync,
    {
        let db = self.context().connection()?;
        Ok(E::find()
            .filter(condition)
            .into_partial_model::<P>()
            .all(&db)
            .await?)
    }

    /// All rows matching `condition` through `selector`
    async fn find_all_projection_with<P>(
        &self,
        condition: Condition,
        selector: &Selector<E>,
    ) -> AppResult<Vec<P>>
    where
        P: FromQueryResult + Send + Sync,
    {
        let db = self.context().connection()?;
        let select = selector.apply(E::find().filter(condition))?;
        Ok(select.into_model::<P>().all(&db).await?)
    }
}

/// Key lookups for entity families with a single primary key
#[async_trait]
pub trait KeyedRepository<E>: ReadRepository<E>
where
    E: Keyed,
    E::Model: Sync + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelBehavior + Send,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: Send + Sync,
{
    /// Row with `key`, tracked.
    ///
    /// A row already tracked by this unit of work resolves to the same entry.
    async fn get(
        &self,
        key: <E::PrimaryKey as PrimaryKeyTrait>::ValueType,
    ) -> AppResult<Option<Tracked<E>>> {
        let db = self.context().connection()?;
        let model = E::find_by_id(key).one(&db).await?;

        let mut tracker = self.context().tracker()?;
        Ok(model.map(|m| tracker.track_loaded::<E>(m)))
    }

    /// True when a row with `key` exists
    async fn exists(&self, key: <E::PrimaryKey as PrimaryKeyTrait>::ValueType) -> AppResult<bool> {
        let db = self.context().connection()?;
        Ok(E::find_by_id(key).count(&db).await? > 0)
    }
}

/// Staged writes plus immediate bulk operations
///
/// Staged operations only record intent; nothing reaches the store before the
/// unit of work completes. `execute_*` run immediately and bypass staging.
#[async_trait]
pub trait WriteRepository<E>: ReadRepository<E>
where
    E: Navigable,
    E::Model: Sync + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelBehavior + Send,
{
    /// Stage an insert. Store-generated keys are assigned at commit.
    fn add(&self, model: E::Model) -> AppResult<Tracked<E>> {
        let mut tracker = self.context().tracker()?;

        if !<E::PrimaryKey as PrimaryKeyTrait>::auto_increment() {
            let key = EntityKey::of::<E>(&model);
            if tracker.find::<E>(&key).is_some() {
                return Err(AppError::conflict(key.to_string()));
            }
        }

        Ok(tracker.register::<E>(EntryState::Added, None, model))
    }

    fn add_range(&self, models: Vec<E::Model>) -> AppResult<Vec<Tracked<E>>> {
        models.into_iter().map(|m| self.add(m)).collect()
    }

    /// Stage a full-row update of `model`.
    ///
    /// If the row is already tracked its canonical copy takes `model`'s values.
    /// A model of a staged insert still waiting for its generated key updates
    /// that insert instead.
    fn update(&self, model: E::Model) -> AppResult<Tracked<E>> {
        let mut tracker = self.context().tracker()?;

        if let Some(existing) = tracker.find::<E>(&EntityKey::of::<E>(&model)) {
            existing.replace(model);
            return Ok(existing);
        }
        if let Some(added) = pending_insert::<E>(&tracker, &model)? {
            added.replace(model);
            return Ok(added);
        }
        Ok(tracker.register::<E>(EntryState::Modified, Some(model.clone()), model))
    }

    fn update_range(&self, models: Vec<E::Model>) -> AppResult<Vec<Tracked<E>>> {
        models.into_iter().map(|m| self.update(m)).collect()
    }

    /// Stage a delete of `model`'s row. A staged insert is dropped instead.
    fn delete(&self, model: &E::Model) -> AppResult<()> {
        let mut tracker = self.context().tracker()?;

        match tracker.find::<E>(&EntityKey::of::<E>(model)) {
            Some(existing) if existing.state() == EntryState::Added => {
                tracker.untrack(existing.slot())
            }
            Some(existing) => existing.set_state(EntryState::Deleted),
            None => match pending_insert::<E>(&tracker, model)? {
                Some(added) => tracker.untrack(added.slot()),
                None => {
                    tracker.register::<E>(EntryState::Deleted, Some(model.clone()), model.clone());
                }
            },
        }
        Ok(())
    }

    /// Stage a delete through a tracked handle. A not yet inserted row is simply dropped.
    fn delete_tracked(&self, entity: &Tracked<E>) -> AppResult<()> {
        let mut tracker = self.context().tracker()?;

        match entity.state() {
            EntryState::Added => tracker.untrack(entity.slot()),
            EntryState::Detached => return Err(AppError::not_tracked(entity.key().to_string())),
            _ => entity.set_state(EntryState::Deleted),
        }
        Ok(())
    }

    fn delete_range(&self, models: &[E::Model]) -> AppResult<()> {
        models.iter().try_for_each(|m| self.delete(m))
    }

    /// Start tracking `model` as unchanged; an already tracked row keeps its entry.
    fn attach(&self, model: E::Model) -> AppResult<Tracked<E>> {
        let mut tracker = self.context().tracker()?;
        Ok(tracker.track_loaded::<E>(model))
    }

    fn attach_range(&self, models: Vec<E::Model>) -> AppResult<Vec<Tracked<E>>> {
        models.into_iter().map(|m| self.attach(m)).collect()
    }

    /// Write exactly `column` of `model`'s row on the next commit.
    ///
    /// The row must already be tracked; its canonical copy takes `model`'s value
    /// for that column.
    fn mark_property_modified(&self, model: &E::Model, column: E::Column) -> AppResult<Tracked<E>> {
        let tracker = self.context().tracker()?;
        let key = EntityKey::of::<E>(model);

        let tracked = tracker
            .find::<E>(&key)
            .ok_or_else(|| AppError::not_tracked(key.to_string()))?;
        tracked.copy_column(model, column);
        Ok(tracked)
    }

    /// [`mark_property_modified`](Self::mark_property_modified) with the column given by name.
    fn mark_property_modified_named(&self, model: &E::Model, column: &str) -> AppResult<Tracked<E>> {
        let parsed = E::Column::from_str(column).map_err(|_| {
            AppError::unknown_column(E::default().table_name(), column)
        })?;
        self.mark_property_modified(model, parsed)
    }

    /// Delete every row matching `condition` now, outside the staged changes.
    async fn execute_delete(&self, condition: Condition) -> AppResult<u64> {
        let db = self.context().connection()?;
        let result = E::delete_many().filter(condition).exec(&db).await?;

        info!(
            entity = E::default().table_name(),
            rows_affected = result.rows_affected,
            "Bulk delete executed"
        );
        Ok(result.rows_affected)
    }

    /// Set `column` to `value` on every row matching `condition` now, outside the staged changes.
    async fn execute_update<V>(&self, condition: Condition, column: E::Column, value: V) -> AppResult<u64>
    where
        V: Into<Value> + Send,
    {
        let db = self.context().connection()?;
        let result = E::update_many()
            .col_expr(column, Expr::value(value.into()))
            .filter(condition)
            .exec(&db)
            .await?;

        info!(
            entity = E::default().table_name(),
            rows_affected = result.rows_affected,
            "Bulk update executed"
        );
        Ok(result.rows_affected)
    }
}

/// Filtered, sorted and paged listings driven by request filters
#[async_trait]
pub trait PaginatedRepository<E>: ReadRepository<E>
where
    E: Paged,
    E::Model: Sync + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelBehavior + Send,
{
    async fn get_paginated_list<P>(
        &self,
        filters: &QueryFilters,
        columns: &ColumnMap<E>,
    ) -> AppResult<PaginatedList<P>>
    where
        P: PartialModelTrait + Send + Sync,
    {
        self.find_paginated_list::<P>(Condition::all(), filters, columns)
            .await
    }

    /// Page of rows matching `condition` and the request's search, in the request's order
    async fn find_paginated_list<P>(
        &self,
        condition: Condition,
        filters: &QueryFilters,
        columns: &ColumnMap<E>,
    ) -> AppResult<PaginatedList<P>>
    where
        P: PartialModelTrait + Send + Sync,
    {
        let db = self.context().connection()?;
        let plan = QueryPlan::build(columns, filters);
        debug!(
            entity = E::default().table_name(),
            sort = ?plan.sort,
            filtered = plan.is_filtered(),
            page = filters.page_number,
            "Paginated read"
        );

        let root = RootQuery {
            select: filtered(condition, plan.filter),
            sort: Some(plan.sort),
            skip: None,
            take: None,
        };

        Ok(paginate(root.ordered(), &db, filters.page_number, filters.page_size).await?)
    }

    async fn get_paginated_list_expanded(
        &self,
        filters: &QueryFilters,
        columns: &ColumnMap<E>,
        paths: &[&str],
    ) -> AppResult<PaginatedList<Expanded<E::Model>>> {
        self.find_paginated_list_expanded(Condition::all(), filters, columns, paths)
            .await
    }

    /// Page of rows with the related data named by `paths`.
    ///
    /// Paging applies to root rows only, never to the joined related rows.
    async fn find_paginated_list_expanded(
        &self,
        condition: Condition,
        filters: &QueryFilters,
        columns: &ColumnMap<E>,
        paths: &[&str],
    ) -> AppResult<PaginatedList<Expanded<E::Model>>> {
        let expansion_plan = ExpansionPlan::resolve::<E, _>(paths, self.context().expansion())?;
        let db = self.context().connection()?;
        let plan = QueryPlan::build(columns, filters);

        let select = filtered(condition, plan.filter);
        let total_count = select.clone().count(&db).await?;

        let root = RootQuery {
            select,
            sort: Some(plan.sort),
            skip: Some(PaginatedList::<E::Model>::offset(
                filters.page_number,
                filters.page_size,
            )),
            take: Some(filters.page_size),
        };
        let items = expansion::load(&db, root, &expansion_plan)
            .await?
            .into_iter()
            .map(|(entity, related)| Expanded { entity, related })
            .collect();

        Ok(PaginatedList::new(
            items,
            filters.page_number,
            total_count,
            filters.page_size,
        ))
    }
}

fn filtered<E: EntityTrait>(condition: Condition, search: Option<Condition>) -> sea_orm::Select<E> {
    let select = E::find().filter(condition);
    match search {
        Some(search) => select.filter(search),
        None => select,
    }
}

/// The staged insert `model` stands for, when its generated key is still unassigned.
///
/// Several pending inserts share the unassigned key; then only an exact copy of
/// one of them identifies it.
fn pending_insert<E>(tracker: &ChangeTracker, model: &E::Model) -> AppResult<Option<Tracked<E>>>
where
    E: EntityTrait,
    E::Model: Sync + IntoActiveModel<E::ActiveModel>,
    E::ActiveModel: ActiveModelBehavior + Send,
{
    let mut candidates = tracker.pending_inserts::<E>(model);
    if candidates.len() <= 1 {
        return Ok(candidates.pop());
    }

    candidates
        .into_iter()
        .find(|added| added.holds(model))
        .map(Some)
        .ok_or_else(|| {
            AppError::not_tracked(format!(
                "{} matches several staged inserts; use the handle returned by add",
                EntityKey::of::<E>(model)
            ))
        })
}
