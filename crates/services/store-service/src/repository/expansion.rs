//! Related-data expansion.
//!
//! An expansion path such as `"order_items.product"` names a chain of relations to
//! load alongside the root rows. Paths are resolved against each entity's
//! [`Navigable`] table before any I/O, then loaded with one of two strategies:
//!
//! - [`FetchStrategy::Combined`]: one statement, the (already paged) root rows
//!   `LEFT JOIN`ed with every relation on the path tree.
//! - [`FetchStrategy::Split`]: one statement for the roots, then one
//!   `IN (...)` statement per relation hop.
//!
//! Both produce the same [`RelatedSet`] tree; related rows are ordered by key
//! within each parent either way.

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use sea_orm::sea_query::{Alias, Expr, Iden, JoinType, Order, Query};
use sea_orm::{
    ActiveModelBehavior, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityName,
    EntityTrait, FromQueryResult, IdenStatic, Identity, IntoActiveModel, Iterable, ModelTrait,
    PrimaryKeyToColumn, QueryFilter, QueryOrder, QueryResult, QuerySelect, QueryTrait,
    RelationDef, Select, Value,
};
use tracing::debug;

use super::query::SortSpec;
use crate::infra::change_tracker::{ChangeTracker, EntityKey, Tracked};
use common::{AppError, AppResult, ExpansionConfig};

/// How related data is fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStrategy {
    Combined,
    Split,
}

/// Thresholds above which expansion switches to [`FetchStrategy::Split`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpansionPolicy {
    /// Paths with at least this many `.` separators are split
    pub max_depth: usize,
    /// At least this many distinct paths are split
    pub max_count: usize,
}

impl Default for ExpansionPolicy {
    fn default() -> Self {
        ExpansionConfig::default().into()
    }
}

impl From<ExpansionConfig> for ExpansionPolicy {
    fn from(config: ExpansionConfig) -> Self {
        Self {
            max_depth: config.max_depth,
            max_count: config.max_count,
        }
    }
}

impl ExpansionPolicy {
    pub fn decide_strategy<S: AsRef<str>>(&self, paths: &[S]) -> FetchStrategy {
        let distinct: HashSet<&str> = paths.iter().map(AsRef::as_ref).collect();
        let deepest = distinct
            .iter()
            .map(|path| path.matches('.').count())
            .max()
            .unwrap_or(0);

        if deepest >= self.max_depth || distinct.len() >= self.max_count {
            FetchStrategy::Split
        } else {
            FetchStrategy::Combined
        }
    }
}

/// [`ExpansionPolicy::decide_strategy`] with the default thresholds.
pub fn decide_strategy<S: AsRef<str>>(paths: &[S]) -> FetchStrategy {
    ExpansionPolicy::default().decide_strategy(paths)
}

/// Entities that declare named relations usable in expansion paths.
pub trait Navigable: EntityTrait {
    fn navigation(name: &str) -> Option<Navigation>;
}

/// One named relation hop: parent column, target column and target entity.
pub struct Navigation {
    from_column: String,
    to_column: String,
    target: Arc<dyn DynEntity>,
}

impl Navigation {
    /// Build from a single-column relation definition; composite relations yield `None`.
    pub fn new<R>(def: RelationDef) -> Option<Self>
    where
        R: Navigable,
        R::Model: Sync + IntoActiveModel<R::ActiveModel>,
        R::ActiveModel: ActiveModelBehavior + Send,
    {
        Some(Self {
            from_column: single_column(&def.from_col)?,
            to_column: single_column(&def.to_col)?,
            target: Arc::new(EntityHandle::<R>(PhantomData)),
        })
    }

    pub fn target_table(&self) -> String {
        self.target.table()
    }
}

impl fmt::Debug for Navigation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Navigation")
            .field("from", &self.from_column)
            .field("to", &format_args!("{}.{}", self.target.table(), self.to_column))
            .finish()
    }
}

fn single_column(identity: &Identity) -> Option<String> {
    match identity {
        Identity::Unary(iden) => {
            let mut name = String::new();
            iden.unquoted(&mut name);
            Some(name)
        }
        _ => None,
    }
}

/// Entity operations needed once the concrete type is erased behind a path.
#[async_trait]
trait DynEntity: Send + Sync {
    fn table(&self) -> String;

    fn columns(&self) -> Vec<String>;

    fn key_columns(&self) -> Vec<String>;

    fn navigation(&self, name: &str) -> Option<Navigation>;

    fn decode(&self, row: &QueryResult, prefix: &str) -> Result<Arc<dyn RelatedModel>, DbErr>;

    /// Register `model` with `tracker`; the result holds a `Tracked` handle of this entity.
    fn track(
        &self,
        model: &dyn RelatedModel,
        tracker: &mut ChangeTracker,
    ) -> Option<Arc<dyn Any + Send + Sync>>;

    /// Rows whose `column` is one of `values`, ordered by key.
    async fn load_in(
        &self,
        db: &DatabaseConnection,
        column: &str,
        values: Vec<Value>,
    ) -> Result<Vec<Arc<dyn RelatedModel>>, DbErr>;
}

struct EntityHandle<R>(PhantomData<fn() -> R>);

#[async_trait]
impl<R> DynEntity for EntityHandle<R>
where
    R: Navigable,
    R::Model: Sync + IntoActiveModel<R::ActiveModel>,
    R::ActiveModel: ActiveModelBehavior + Send,
{
    fn table(&self) -> String {
        R::default().table_name().to_string()
    }

    fn columns(&self) -> Vec<String> {
        R::Column::iter().map(|c| c.as_str().to_string()).collect()
    }

    fn key_columns(&self) -> Vec<String> {
        R::PrimaryKey::iter()
            .map(|pk| pk.into_column().as_str().to_string())
            .collect()
    }

    fn navigation(&self, name: &str) -> Option<Navigation> {
        R::navigation(name)
    }

    fn decode(&self, row: &QueryResult, prefix: &str) -> Result<Arc<dyn RelatedModel>, DbErr> {
        let model = R::Model::from_query_result(row, prefix)?;
        Ok(Arc::new(ModelOf::<R>(model)))
    }

    fn track(
        &self,
        model: &dyn RelatedModel,
        tracker: &mut ChangeTracker,
    ) -> Option<Arc<dyn Any + Send + Sync>> {
        let model = model.as_any().downcast_ref::<R::Model>()?.clone();
        Some(Arc::new(tracker.track_loaded::<R>(model)))
    }

    async fn load_in(
        &self,
        db: &DatabaseConnection,
        column: &str,
        values: Vec<Value>,
    ) -> Result<Vec<Arc<dyn RelatedModel>>, DbErr> {
        let column = R::Column::from_str(column)
            .map_err(|_| DbErr::Custom(format!("unknown column {column} on {}", self.table())))?;

        let mut select = R::find().filter(column.is_in(values));
        for pk in R::PrimaryKey::iter() {
            select = select.order_by(pk.into_column(), Order::Asc);
        }

        Ok(select
            .all(db)
            .await?
            .into_iter()
            .map(|m| Arc::new(ModelOf::<R>(m)) as Arc<dyn RelatedModel>)
            .collect())
    }
}

/// Type-erased related row.
trait RelatedModel: Send + Sync {
    fn value(&self, column: &str) -> Option<Value>;

    fn values(&self) -> Vec<Value>;

    fn key(&self) -> String;

    fn as_any(&self) -> &dyn Any;

    fn debug(&self) -> String;
}

struct ModelOf<E: EntityTrait>(E::Model);

impl<E> RelatedModel for ModelOf<E>
where
    E: EntityTrait,
    E::Model: Sync,
{
    fn value(&self, column: &str) -> Option<Value> {
        E::Column::from_str(column).ok().map(|c| self.0.get(c))
    }

    fn values(&self) -> Vec<Value> {
        E::Column::iter().map(|c| self.0.get(c)).collect()
    }

    fn key(&self) -> String {
        EntityKey::of::<E>(&self.0).to_string()
    }

    fn as_any(&self) -> &dyn Any {
        &self.0
    }

    fn debug(&self) -> String {
        format!("{:?}", self.0)
    }
}

/// SQL NULL of any column type.
fn is_null(value: &Value) -> bool {
    *value == value.as_null()
}

fn value_key(value: &Value) -> String {
    format!("{value:?}")
}

/// Related rows loaded for one parent, grouped by navigation name.
#[derive(Clone, Default)]
pub struct RelatedSet {
    entries: Vec<(String, Vec<RelatedNode>)>,
}

/// One related row plus whatever was loaded beneath it.
#[derive(Clone)]
pub struct RelatedNode {
    model: Arc<dyn RelatedModel>,
    /// `Tracked` handle when the row came from a tracked read
    tracked: Option<Arc<dyn Any + Send + Sync>>,
    related: RelatedSet,
}

impl RelatedSet {
    fn insert(&mut self, name: String, nodes: Vec<RelatedNode>) {
        self.entries.push((name, nodes));
    }

    /// True when `name` was part of the requested expansion.
    pub fn is_loaded(&self, name: &str) -> bool {
        self.entries.iter().any(|(n, _)| n == name)
    }

    pub fn nested(&self, name: &str) -> &[RelatedNode] {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, nodes)| nodes.as_slice())
            .unwrap_or(&[])
    }

    /// Typed related rows under `name`; rows of another type are skipped.
    pub fn get<R: EntityTrait>(&self, name: &str) -> Vec<&R::Model> {
        self.nested(name)
            .iter()
            .filter_map(RelatedNode::model::<R>)
            .collect()
    }

    /// The single related row of a to-one navigation.
    pub fn first<R: EntityTrait>(&self, name: &str) -> Option<&R::Model> {
        self.nested(name).first().and_then(RelatedNode::model::<R>)
    }

    /// Tracked handles on the rows under `name`; empty for untracked reads.
    pub fn tracked<R: EntityTrait>(&self, name: &str) -> Vec<Tracked<R>> {
        self.nested(name)
            .iter()
            .filter_map(RelatedNode::tracked::<R>)
            .collect()
    }

    pub fn first_tracked<R: EntityTrait>(&self, name: &str) -> Option<Tracked<R>> {
        self.nested(name).first().and_then(RelatedNode::tracked::<R>)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }
}

impl RelatedNode {
    pub fn model<R: EntityTrait>(&self) -> Option<&R::Model> {
        self.model.as_any().downcast_ref::<R::Model>()
    }

    /// Handle on the unit of work's copy of this row.
    ///
    /// Present only for rows loaded by a tracked read. The snapshot returned by
    /// [`model`](Self::model) does not follow later changes made through it.
    pub fn tracked<R: EntityTrait>(&self) -> Option<Tracked<R>> {
        self.tracked.as_ref()?.downcast_ref::<Tracked<R>>().cloned()
    }

    pub fn related(&self) -> &RelatedSet {
        &self.related
    }
}

impl PartialEq for RelatedNode {
    fn eq(&self, other: &Self) -> bool {
        self.model.key() == other.model.key()
            && self.model.values() == other.model.values()
            && self.related == other.related
    }
}

impl PartialEq for RelatedSet {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl fmt::Debug for RelatedNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("RelatedNode");
        s.field("model", &format_args!("{}", self.model.debug()));
        if !self.related.entries.is_empty() {
            s.field("related", &self.related);
        }
        s.finish()
    }
}

impl fmt::Debug for RelatedSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(n, nodes)| (n, nodes)))
            .finish()
    }
}

/// An entity together with the related data requested for it.
#[derive(Debug, Clone)]
pub struct Expanded<T> {
    pub entity: T,
    pub related: RelatedSet,
}

struct PathNode {
    name: String,
    navigation: Navigation,
    children: Vec<PathNode>,
}

/// Expansion paths resolved into a relation tree plus the chosen strategy.
pub struct ExpansionPlan {
    roots: Vec<PathNode>,
    paths: Vec<String>,
    strategy: FetchStrategy,
}

impl ExpansionPlan {
    /// Resolve `paths` against `E`'s navigations.
    ///
    /// Fails with `UnknownNavigation` on the first segment that does not name a relation.
    pub fn resolve<E, S>(paths: &[S], policy: &ExpansionPolicy) -> AppResult<Self>
    where
        E: Navigable,
        S: AsRef<str>,
    {
        let mut roots: Vec<PathNode> = Vec::new();

        for path in paths {
            let path = path.as_ref();
            let mut level = &mut roots;
            let mut owner: Option<Arc<dyn DynEntity>> = None;

            for segment in path.split('.') {
                let index = match level.iter().position(|n| n.name == segment) {
                    Some(index) => index,
                    None => {
                        let navigation = match &owner {
                            None => E::navigation(segment),
                            Some(entity) => entity.navigation(segment),
                        }
                        .ok_or_else(|| {
                            AppError::unknown_navigation(E::default().table_name(), path)
                        })?;

                        level.push(PathNode {
                            name: segment.to_string(),
                            navigation,
                            children: Vec::new(),
                        });
                        level.len() - 1
                    }
                };

                owner = Some(Arc::clone(&level[index].navigation.target));
                level = &mut level[index].children;
            }
        }

        let paths: Vec<String> = paths.iter().map(|p| p.as_ref().to_string()).collect();
        let strategy = policy.decide_strategy(&paths);

        Ok(Self {
            roots,
            paths,
            strategy,
        })
    }

    /// Override the policy's decision.
    pub fn with_strategy(mut self, strategy: FetchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn strategy(&self) -> FetchStrategy {
        self.strategy
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Register every row in `related` with `tracker`, level by level.
    pub(crate) fn track(&self, related: &mut RelatedSet, tracker: &mut ChangeTracker) {
        track_level(&self.roots, related, tracker);
    }
}

fn track_level(nodes: &[PathNode], set: &mut RelatedSet, tracker: &mut ChangeTracker) {
    for node in nodes {
        let Some(entry) = set.entries.iter_mut().find(|entry| entry.0 == node.name) else {
            continue;
        };
        for member in entry.1.iter_mut() {
            member.tracked = node.navigation.target.track(member.model.as_ref(), tracker);
            track_level(&node.children, &mut member.related, tracker);
        }
    }
}

/// Root rows of an expanded read: filter, ordering and window.
pub(crate) struct RootQuery<E: EntityTrait> {
    pub select: Select<E>,
    pub sort: Option<SortSpec<E>>,
    pub skip: Option<u64>,
    pub take: Option<u64>,
}

impl<E: EntityTrait> RootQuery<E> {
    pub fn new(select: Select<E>) -> Self {
        Self {
            select,
            sort: None,
            skip: None,
            take: None,
        }
    }

    /// The root select with ordering and window applied.
    ///
    /// The key is always the final ordering column so windows are stable.
    pub fn ordered(&self) -> Select<E> {
        let mut select = self.select.clone();
        if let Some(sort) = self.sort {
            select = sort.apply(select);
        }
        for pk in E::PrimaryKey::iter() {
            select = select.order_by(pk.into_column(), Order::Asc);
        }
        if let Some(skip) = self.skip {
            select = select.offset(skip);
        }
        if let Some(take) = self.take {
            select = select.limit(take);
        }
        select
    }
}

/// Load the root rows of `root` with the related data named by `plan`.
pub(crate) async fn load<E>(
    db: &DatabaseConnection,
    root: RootQuery<E>,
    plan: &ExpansionPlan,
) -> Result<Vec<(E::Model, RelatedSet)>, DbErr>
where
    E: Navigable,
    E::Model: Sync,
{
    if plan.is_empty() {
        let models = root.ordered().all(db).await?;
        return Ok(models
            .into_iter()
            .map(|m| (m, RelatedSet::default()))
            .collect());
    }

    debug!(
        entity = E::default().table_name(),
        paths = ?plan.paths,
        strategy = ?plan.strategy,
        "Loading expanded rows"
    );

    match plan.strategy {
        FetchStrategy::Combined => load_combined(db, root, plan).await,
        FetchStrategy::Split => load_split(db, root, plan).await,
    }
}

async fn load_split<E>(
    db: &DatabaseConnection,
    root: RootQuery<E>,
    plan: &ExpansionPlan,
) -> Result<Vec<(E::Model, RelatedSet)>, DbErr>
where
    E: Navigable,
    E::Model: Sync,
{
    let models = root.ordered().all(db).await?;
    let parents: Vec<Arc<dyn RelatedModel>> = models
        .iter()
        .map(|m| Arc::new(ModelOf::<E>(m.clone())) as Arc<dyn RelatedModel>)
        .collect();

    let sets = load_children(db, &parents, &plan.roots).await?;
    Ok(models.into_iter().zip(sets).collect())
}

fn load_children<'a>(
    db: &'a DatabaseConnection,
    parents: &'a [Arc<dyn RelatedModel>],
    nodes: &'a [PathNode],
) -> BoxFuture<'a, Result<Vec<RelatedSet>, DbErr>> {
    async move {
        let mut sets = vec![RelatedSet::default(); parents.len()];

        for node in nodes {
            let nav = &node.navigation;

            let mut seen = HashSet::new();
            let keys: Vec<Value> = parents
                .iter()
                .filter_map(|p| p.value(&nav.from_column))
                .filter(|v| !is_null(v) && seen.insert(value_key(v)))
                .collect();

            let children = if keys.is_empty() {
                Vec::new()
            } else {
                nav.target.load_in(db, &nav.to_column, keys).await?
            };
            let nested = load_children(db, &children, &node.children).await?;

            let mut by_parent: HashMap<String, Vec<RelatedNode>> = HashMap::new();
            for (child, related) in children.iter().zip(nested) {
                if let Some(value) = child.value(&nav.to_column) {
                    by_parent
                        .entry(value_key(&value))
                        .or_default()
                        .push(RelatedNode {
                            model: Arc::clone(child),
                            tracked: None,
                            related,
                        });
                }
            }

            for (parent, set) in parents.iter().zip(sets.iter_mut()) {
                let group = parent
                    .value(&nav.from_column)
                    .filter(|v| !is_null(v))
                    .and_then(|v| by_parent.get(&value_key(&v)))
                    .cloned()
                    .unwrap_or_default();
                set.insert(node.name.clone(), group);
            }
        }

        Ok(sets)
    }
    .boxed()
}

struct FlatNode<'a> {
    node: &'a PathNode,
    parent: Option<usize>,
    slot: usize,
    alias: String,
}

fn flatten<'a>(nodes: &'a [PathNode], parent: Option<usize>, out: &mut Vec<FlatNode<'a>>) {
    for (slot, node) in nodes.iter().enumerate() {
        let index = out.len();
        out.push(FlatNode {
            node,
            parent,
            slot,
            alias: format!("j{}", index + 1),
        });
        flatten(&node.children, Some(index), out);
    }
}

struct Assembled {
    model: Option<Arc<dyn RelatedModel>>,
    slots: Vec<Vec<usize>>,
}

impl Assembled {
    fn new(model: Option<Arc<dyn RelatedModel>>, slot_count: usize) -> Self {
        Self {
            model,
            slots: vec![Vec::new(); slot_count],
        }
    }
}

const ROOT_PREFIX: &str = "r0_";

async fn load_combined<E>(
    db: &DatabaseConnection,
    root: RootQuery<E>,
    plan: &ExpansionPlan,
) -> Result<Vec<(E::Model, RelatedSet)>, DbErr>
where
    E: Navigable,
    E::Model: Sync,
{
    let root_table = E::default().table_name().to_string();
    let mut flat = Vec::new();
    flatten(&plan.roots, None, &mut flat);

    let mut stmt = Query::select();
    stmt.from_subquery(root.ordered().into_query(), Alias::new(&root_table));

    for col in E::Column::iter() {
        stmt.expr_as(
            Expr::col((Alias::new(&root_table), Alias::new(col.as_str()))),
            Alias::new(format!("{ROOT_PREFIX}{}", col.as_str())),
        );
    }

    for flat_node in &flat {
        let nav = &flat_node.node.navigation;
        let alias = &flat_node.alias;
        let parent_alias = match flat_node.parent {
            None => root_table.clone(),
            Some(p) => flat[p].alias.clone(),
        };

        stmt.join_as(
            JoinType::LeftJoin,
            Alias::new(nav.target.table()),
            Alias::new(alias),
            Expr::col((Alias::new(alias), Alias::new(&nav.to_column)))
                .equals((Alias::new(&parent_alias), Alias::new(&nav.from_column))),
        );

        for col in nav.target.columns() {
            stmt.expr_as(
                Expr::col((Alias::new(alias), Alias::new(&col))),
                Alias::new(format!("{alias}_{col}")),
            );
        }

        if let Some(key) = nav.target.key_columns().first() {
            stmt.expr_as(
                Expr::col((Alias::new(alias), Alias::new(key))).is_null(),
                Alias::new(format!("{alias}__absent")),
            );
        }
    }

    if let Some(sort) = root.sort {
        stmt.order_by(
            (Alias::new(&root_table), Alias::new(sort.column.as_str())),
            sort.direction.into(),
        );
    }
    for pk in E::PrimaryKey::iter() {
        stmt.order_by(
            (Alias::new(&root_table), Alias::new(pk.into_column().as_str())),
            Order::Asc,
        );
    }
    for flat_node in &flat {
        for key in flat_node.node.navigation.target.key_columns() {
            stmt.order_by((Alias::new(&flat_node.alias), Alias::new(key)), Order::Asc);
        }
    }

    let backend = db.get_database_backend();
    let rows = db.query_all(backend.build(&stmt)).await?;

    let mut arena: Vec<Assembled> = Vec::new();
    let mut roots: Vec<(E::Model, usize)> = Vec::new();
    let mut root_index: HashMap<String, usize> = HashMap::new();
    let mut seen: HashMap<(usize, usize, String), usize> = HashMap::new();

    for row in &rows {
        let model = E::Model::from_query_result(row, ROOT_PREFIX)?;
        let key = EntityKey::of::<E>(&model).to_string();
        let root_at = match root_index.get(&key) {
            Some(at) => *at,
            None => {
                arena.push(Assembled::new(None, plan.roots.len()));
                let at = arena.len() - 1;
                roots.push((model, at));
                root_index.insert(key, at);
                at
            }
        };

        let mut current: Vec<Option<usize>> = vec![None; flat.len()];
        for (i, flat_node) in flat.iter().enumerate() {
            let parent_at = match flat_node.parent {
                None => Some(root_at),
                Some(p) => current[p],
            };
            let Some(parent_at) = parent_at else {
                continue;
            };
            if row.try_get::<bool>("", &format!("{}__absent", flat_node.alias))? {
                continue;
            }

            let child = flat_node
                .node
                .navigation
                .target
                .decode(row, &format!("{}_", flat_node.alias))?;
            let child_key = child.key();

            let at = match seen.get(&(parent_at, i, child_key.clone())) {
                Some(at) => *at,
                None => {
                    arena.push(Assembled::new(Some(child), flat_node.node.children.len()));
                    let at = arena.len() - 1;
                    arena[parent_at].slots[flat_node.slot].push(at);
                    seen.insert((parent_at, i, child_key), at);
                    at
                }
            };
            current[i] = Some(at);
        }
    }

    Ok(roots
        .into_iter()
        .map(|(model, at)| {
            let related = assemble(&arena, &arena[at].slots, &plan.roots);
            (model, related)
        })
        .collect())
}

fn assemble(arena: &[Assembled], slots: &[Vec<usize>], nodes: &[PathNode]) -> RelatedSet {
    let mut set = RelatedSet::default();
    for (node, members) in nodes.iter().zip(slots) {
        let group = members
            .iter()
            .filter_map(|&at| {
                let entry = &arena[at];
                entry.model.as_ref().map(|model| RelatedNode {
                    model: Arc::clone(model),
                    tracked: None,
                    related: assemble(arena, &entry.slots, &node.children),
                })
            })
            .collect();
        set.insert(node.name.clone(), group);
    }
    set
}
