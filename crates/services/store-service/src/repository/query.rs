//! Dynamic filter and sort builder.
//!
//! Request-supplied column names are never interpolated into SQL: they are looked
//! up in a [`ColumnMap`] allow-list and replaced by the typed column they map to.
//! Input that cannot be applied (unknown column, value that does not parse for
//! the column's type) is neutralized and logged, never raised.

use std::fmt;

use chrono::{DateTime, Days, NaiveDate, Utc};
use sea_orm::sea_query::{Expr, Func, LikeExpr, SimpleExpr};
use sea_orm::{Condition, EntityTrait, IdenStatic, Order, QueryFilter, QueryOrder, Select};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Sort direction of a dynamic ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    /// `asc`/`ascending`/`desc`/`descending` in any case; anything else is ascending.
    pub fn parse_lenient(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("desc") | Some("descending") => SortDirection::Descending,
            _ => SortDirection::Ascending,
        }
    }
}

impl From<SortDirection> for Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Ascending => Order::Asc,
            SortDirection::Descending => Order::Desc,
        }
    }
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortDirection::Ascending => f.write_str("ASC"),
            SortDirection::Descending => f.write_str("DESC"),
        }
    }
}

/// Ordering on one column.
pub struct SortSpec<E: EntityTrait> {
    pub column: E::Column,
    pub direction: SortDirection,
}

impl<E: EntityTrait> SortSpec<E> {
    pub fn asc(column: E::Column) -> Self {
        Self {
            column,
            direction: SortDirection::Ascending,
        }
    }

    pub fn desc(column: E::Column) -> Self {
        Self {
            column,
            direction: SortDirection::Descending,
        }
    }

    pub(crate) fn apply(self, select: Select<E>) -> Select<E> {
        select.order_by(self.column, self.direction.into())
    }
}

impl<E: EntityTrait> Clone for SortSpec<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E: EntityTrait> Copy for SortSpec<E> {}

impl<E: EntityTrait> fmt::Debug for SortSpec<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.column.as_str(), self.direction)
    }
}

/// Value type of an allow-listed column, used to parse search input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    String,
    Int,
    Bool,
    Date,
}

struct AllowedColumn<E: EntityTrait> {
    name: String,
    column: E::Column,
    kind: ColumnType,
}

/// Ordered allow-list from logical column name to typed column.
///
/// Never empty: the first entry is the fallback sort column.
pub struct ColumnMap<E: EntityTrait> {
    entries: Vec<AllowedColumn<E>>,
}

impl<E: EntityTrait> ColumnMap<E> {
    pub fn new(name: impl Into<String>, column: E::Column, kind: ColumnType) -> Self {
        Self {
            entries: vec![AllowedColumn {
                name: name.into(),
                column,
                kind,
            }],
        }
    }

    /// Add a column; re-using a name replaces its mapping.
    pub fn insert(mut self, name: impl Into<String>, column: E::Column, kind: ColumnType) -> Self {
        let name = name.into();
        match self
            .entries
            .iter_mut()
            .find(|e| e.name.eq_ignore_ascii_case(&name))
        {
            Some(existing) => {
                existing.column = column;
                existing.kind = kind;
            }
            None => self.entries.push(AllowedColumn { name, column, kind }),
        }
        self
    }

    /// Case-insensitive lookup.
    pub fn get(&self, name: &str) -> Option<(E::Column, ColumnType)> {
        self.find(name).map(|e| (e.column, e.kind))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    fn find(&self, name: &str) -> Option<&AllowedColumn<E>> {
        let name = name.trim();
        self.entries.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    fn first(&self) -> &AllowedColumn<E> {
        &self.entries[0]
    }
}

/// Search, sort and page parameters as supplied by a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryFilters {
    pub page_number: u64,
    pub page_size: u64,
    pub search_value: Option<String>,
    pub search_column: Option<String>,
    pub sort_column: Option<String>,
    pub sort_direction: Option<String>,
}

impl Default for QueryFilters {
    fn default() -> Self {
        Self {
            page_number: 1,
            page_size: 10,
            search_value: None,
            search_column: None,
            sort_column: None,
            sort_direction: Some("ASC".to_string()),
        }
    }
}

impl QueryFilters {
    pub fn page(page_number: u64, page_size: u64) -> Self {
        Self {
            page_number,
            page_size,
            ..Self::default()
        }
    }

    pub fn search(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.search_column = Some(column.into());
        self.search_value = Some(value.into());
        self
    }

    pub fn sort(mut self, column: impl Into<String>, direction: impl Into<String>) -> Self {
        self.sort_column = Some(column.into());
        self.sort_direction = Some(direction.into());
        self
    }

    /// Clamp paging into `1..=max_page_size`.
    ///
    /// Callers validating requests use this before handing filters to the pagination engine.
    pub fn clamped(mut self, max_page_size: u64) -> Self {
        self.page_number = self.page_number.max(1);
        self.page_size = self.page_size.clamp(1, max_page_size.max(1));
        self
    }
}

/// A resolved sort plus optional search predicate for one entity.
pub struct QueryPlan<E: EntityTrait> {
    pub sort: SortSpec<E>,
    pub filter: Option<Condition>,
}

impl<E: EntityTrait> QueryPlan<E> {
    pub fn build(columns: &ColumnMap<E>, filters: &QueryFilters) -> Self {
        let sort_entry = match filters.sort_column.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => columns.find(name).unwrap_or_else(|| {
                warn!(column = name, "Sort column is not allow-listed, using default");
                columns.first()
            }),
            _ => columns.first(),
        };

        let sort = SortSpec {
            column: sort_entry.column,
            direction: SortDirection::parse_lenient(filters.sort_direction.as_deref()),
        };

        Self {
            sort,
            filter: search_filter(columns, filters),
        }
    }

    /// Apply the filter and ordering to `select`.
    pub fn apply(&self, select: Select<E>) -> Select<E> {
        let select = match &self.filter {
            Some(condition) => select.filter(condition.clone()),
            None => select,
        };
        self.sort.apply(select)
    }

    pub fn is_filtered(&self) -> bool {
        self.filter.is_some()
    }
}

fn search_filter<E: EntityTrait>(columns: &ColumnMap<E>, filters: &QueryFilters) -> Option<Condition> {
    let name = filters.search_column.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
    let value = filters.search_value.as_deref().map(str::trim).filter(|s| !s.is_empty())?;

    let Some(entry) = columns.find(name) else {
        warn!(column = name, "Search column is not allow-listed, filter ignored");
        return None;
    };

    let target = Expr::col((E::default(), entry.column));
    let expr: Option<SimpleExpr> = match entry.kind {
        ColumnType::String => Some(
            Expr::expr(Func::lower(target)).like(
                LikeExpr::new(format!("%{}%", like_escape(&value.to_lowercase()))).escape('\\'),
            ),
        ),
        ColumnType::Int => value.parse::<i64>().ok().map(|v| target.eq(v)),
        ColumnType::Bool => parse_bool(value).map(|v| target.eq(v)),
        ColumnType::Date => day_range(value).map(|(start, end)| {
            Expr::col((E::default(), entry.column))
                .gte(start)
                .and(Expr::col((E::default(), entry.column)).lt(end))
        }),
    };

    match expr {
        Some(expr) => Some(Condition::all().add(expr)),
        None => {
            warn!(
                column = %entry.name,
                kind = ?entry.kind,
                value,
                "Search value does not parse for column type, filter ignored"
            );
            None
        }
    }
}

fn like_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '%' | '_' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            c => out.push(c),
        }
    }
    out
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

/// `[day 00:00, next day 00:00)` in UTC for a `YYYY-MM-DD` or RFC 3339 input.
fn day_range(raw: &str) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.with_timezone(&Utc).date_naive())
        })?;

    let start = day.and_hms_opt(0, 0, 0)?.and_utc();
    let end = day.checked_add_days(Days::new(1))?.and_hms_opt(0, 0, 0)?.and_utc();
    Some((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::entities::{order, product};
    use sea_orm::{DbBackend, QueryTrait};

    fn product_columns() -> ColumnMap<product::Entity> {
        ColumnMap::new("name", product::Column::Name, ColumnType::String)
            .insert("sellingPrice", product::Column::SellingPrice, ColumnType::Int)
            .insert("storageQuantity", product::Column::StorageQuantity, ColumnType::Int)
    }

    fn sql(plan: &QueryPlan<product::Entity>) -> String {
        plan.apply(product::Entity::find())
            .build(DbBackend::Postgres)
            .to_string()
    }

    #[test]
    fn direction_parsing_is_lenient() {
        assert_eq!(SortDirection::parse_lenient(Some("DESC")), SortDirection::Descending);
        assert_eq!(SortDirection::parse_lenient(Some("descending")), SortDirection::Descending);
        assert_eq!(SortDirection::parse_lenient(Some("Asc")), SortDirection::Ascending);
        assert_eq!(SortDirection::parse_lenient(Some("sideways")), SortDirection::Ascending);
        assert_eq!(SortDirection::parse_lenient(None), SortDirection::Ascending);
    }

    #[test]
    fn column_lookup_ignores_case() {
        let columns = product_columns();
        assert!(matches!(
            columns.get("SELLINGPRICE"),
            Some((product::Column::SellingPrice, ColumnType::Int))
        ));
        assert!(columns.get("password").is_none());
        assert_eq!(columns.names().count(), 3);
    }

    #[test]
    fn unknown_sort_column_falls_back_to_first_entry() {
        let filters = QueryFilters::default().sort("secret", "desc");
        let plan = QueryPlan::build(&product_columns(), &filters);

        assert!(matches!(plan.sort.column, product::Column::Name));
        assert_eq!(plan.sort.direction, SortDirection::Descending);
        assert!(!plan.is_filtered());
    }

    #[test]
    fn string_search_is_case_insensitive_contains_with_escaping() {
        let filters = QueryFilters::default().search("Name", "50%_Off");
        let plan = QueryPlan::build(&product_columns(), &filters);
        let sql = sql(&plan);

        assert!(sql.contains(r#"LOWER("products"."name") LIKE"#), "{sql}");
        assert!(sql.contains("ESCAPE"), "{sql}");
        assert!(sql.contains("_off%"), "{sql}");
        assert!(sql.contains(r#"ORDER BY "products"."name" ASC"#), "{sql}");

        assert_eq!(like_escape(r"50%_Off\"), r"50\%\_Off\\");
    }

    #[test]
    fn numeric_search_that_does_not_parse_is_dropped() {
        let filters = QueryFilters::default().search("sellingPrice", "cheap");
        let plan = QueryPlan::build(&product_columns(), &filters);
        assert!(!plan.is_filtered());

        let filters = QueryFilters::default().search("sellingPrice", "1800");
        let plan = QueryPlan::build(&product_columns(), &filters);
        assert!(sql(&plan).contains(r#""products"."selling_price" = 1800"#));
    }

    #[test]
    fn unknown_search_column_is_dropped() {
        let filters = QueryFilters::default().search("password", "x");
        assert!(!QueryPlan::build(&product_columns(), &filters).is_filtered());
    }

    #[test]
    fn date_search_covers_the_whole_day() {
        let columns = ColumnMap::<order::Entity>::new("orderDate", order::Column::OrderDate, ColumnType::Date);

        let (start, end) = day_range("2025-03-09").unwrap();
        assert_eq!(start.to_rfc3339(), "2025-03-09T00:00:00+00:00");
        assert_eq!(end.to_rfc3339(), "2025-03-10T00:00:00+00:00");
        assert_eq!(day_range("2025-03-09T17:45:00+00:00"), Some((start, end)));
        assert!(day_range("09/03/2025").is_none());

        let plan = QueryPlan::build(&columns, &QueryFilters::default().search("orderdate", "2025-03-09"));
        assert!(plan.is_filtered());
    }

    #[test]
    fn bool_parsing_accepts_only_true_and_false() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("false"), Some(false));
        assert_eq!(parse_bool("yes"), None);
    }

    #[test]
    fn filters_deserialize_with_defaults() {
        let filters: QueryFilters = serde_json::from_str(r#"{"searchColumn":"name"}"#).unwrap();
        assert_eq!(filters.page_number, 1);
        assert_eq!(filters.page_size, 10);
        assert_eq!(filters.sort_direction.as_deref(), Some("ASC"));
        assert_eq!(filters.search_column.as_deref(), Some("name"));

        let clamped = QueryFilters::page(0, 1000).clamped(250);
        assert_eq!((clamped.page_number, clamped.page_size), (1, 250));
    }
}
