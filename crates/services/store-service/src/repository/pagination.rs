//! Pagination engine.

use sea_orm::{
    DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, PartialModelTrait, QuerySelect, Select,
};
use serde::Serialize;

/// One page of results plus navigation metadata.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedList<T> {
    pub items: Vec<T>,
    pub page_number: u64,
    pub total_pages: u64,
    pub total_count: u64,
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

impl<T> PaginatedList<T> {
    /// Build the descriptor for `items`, the page at `page_number` of `total_count` rows.
    ///
    /// `page_number` and `page_size` are expected to be positive; request validation
    /// rejects anything else before it gets here.
    pub fn new(items: Vec<T>, page_number: u64, total_count: u64, page_size: u64) -> Self {
        let total_pages = if page_size > 0 {
            total_count.div_ceil(page_size)
        } else {
            0
        };

        Self {
            items,
            page_number,
            total_pages,
            total_count,
            has_previous_page: page_number > 1 && total_pages > 0,
            has_next_page: page_number < total_pages,
        }
    }

    /// Rows skipped before the page at `page_number`.
    pub fn offset(page_number: u64, page_size: u64) -> u64 {
        page_number.saturating_sub(1) * page_size
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedList<U> {
        PaginatedList {
            items: self.items.into_iter().map(f).collect(),
            page_number: self.page_number,
            total_pages: self.total_pages,
            total_count: self.total_count,
            has_previous_page: self.has_previous_page,
            has_next_page: self.has_next_page,
        }
    }
}

/// Count the filtered, unpaged `select`, then fetch one page projected into `P`.
pub async fn paginate<E, P>(
    select: Select<E>,
    db: &DatabaseConnection,
    page_number: u64,
    page_size: u64,
) -> Result<PaginatedList<P>, DbErr>
where
    E: EntityTrait,
    E::Model: Sync,
    P: PartialModelTrait + Send + Sync,
{
    let total_count = select.clone().count(db).await?;

    let items = select
        .offset(PaginatedList::<P>::offset(page_number, page_size))
        .limit(page_size)
        .into_partial_model::<P>()
        .all(db)
        .await?;

    tracing::debug!(page_number, page_size, total_count, "Fetched page");

    Ok(PaginatedList::new(items, page_number, total_count, page_size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        let page = PaginatedList::new(vec![1, 2], 1, 5, 2);
        assert_eq!(page.total_pages, 3);
        assert!(!page.has_previous_page);
        assert!(page.has_next_page);

        let page = PaginatedList::new(vec![5], 3, 5, 2);
        assert!(page.has_previous_page);
        assert!(!page.has_next_page);
    }

    #[test]
    fn empty_result_has_no_pages_and_no_flags() {
        for requested in [1, 2, 7] {
            let page = PaginatedList::<u8>::new(vec![], requested, 0, 10);
            assert_eq!(page.total_pages, 0);
            assert!(!page.has_previous_page, "page {requested}");
            assert!(!page.has_next_page, "page {requested}");
        }
    }

    #[test]
    fn page_beyond_the_last_is_empty_with_previous_only() {
        let page = PaginatedList::<u8>::new(vec![], 9, 12, 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_previous_page);
        assert!(!page.has_next_page);
    }

    #[test]
    fn flags_hold_across_page_sizes() {
        for total in 0..40u64 {
            for size in 1..8u64 {
                let pages = total.div_ceil(size);
                for number in 1..=pages + 1 {
                    let page = PaginatedList::<u8>::new(vec![], number, total, size);
                    assert_eq!(page.total_pages, pages);
                    assert_eq!(page.has_next_page, number < pages);
                    assert_eq!(page.has_previous_page, number > 1 && pages > 0);
                }
            }
        }
    }

    #[test]
    fn offset_skips_previous_pages() {
        assert_eq!(PaginatedList::<u8>::offset(1, 10), 0);
        assert_eq!(PaginatedList::<u8>::offset(3, 10), 20);
    }

    #[test]
    fn serializes_in_camel_case() {
        let page = PaginatedList::new(vec!["a"], 1, 1, 10);
        let json = serde_json::to_value(&page).unwrap();
        assert_eq!(json["pageNumber"], 1);
        assert_eq!(json["totalPages"], 1);
        assert_eq!(json["hasNextPage"], false);
        assert_eq!(json["items"][0], "a");
    }
}
