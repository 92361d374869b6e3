//! Query-time projections.
//!
//! The default shape of a projected read is any `DerivePartialModel`; a
//! [`Selector`] describes an explicit column list instead, optionally `DISTINCT`.

use std::marker::PhantomData;

use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{EntityTrait, IdenStatic, QuerySelect, Select};

use common::{AppError, AppResult};

/// Ordered `(expression, alias)` list selected instead of the entity's columns.
pub struct Selector<E: EntityTrait> {
    columns: Vec<(SimpleExpr, String)>,
    distinct: bool,
    _entity: PhantomData<fn() -> E>,
}

impl<E: EntityTrait> Default for Selector<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: EntityTrait> Selector<E> {
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            distinct: false,
            _entity: PhantomData,
        }
    }

    /// Select `column` under its own name.
    pub fn column(self, column: E::Column) -> Self {
        let alias = column.as_str().to_string();
        self.column_as(column, alias)
    }

    pub fn column_as(self, column: E::Column, alias: impl Into<String>) -> Self {
        self.expr_as(Expr::col((E::default(), column)), alias)
    }

    /// Select a computed expression, e.g. a function over several columns.
    pub fn expr_as(mut self, expr: impl Into<SimpleExpr>, alias: impl Into<String>) -> Self {
        self.columns.push((expr.into(), alias.into()));
        self
    }

    /// Emit `SELECT DISTINCT`; duplicates are removed by the store, not in memory.
    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    pub(crate) fn apply(&self, select: Select<E>) -> AppResult<Select<E>> {
        if self.columns.is_empty() {
            return Err(AppError::validation("projection selects no columns"));
        }

        let mut select = select.select_only();
        for (expr, alias) in &self.columns {
            select = select.column_as(expr.clone(), alias.as_str());
        }
        if self.distinct {
            select = select.distinct();
        }
        Ok(select)
    }
}
