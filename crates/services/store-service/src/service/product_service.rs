//! Product catalog use cases.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::{ColumnTrait, Condition, DerivePartialModel, FromQueryResult};
use serde::Serialize;

use crate::infra::UnitOfWork;
use crate::repository::entities::{product, product_image};
use crate::repository::{
    ColumnMap, ColumnType, KeyedRepository, PaginatedList, PaginatedRepository, QueryFilters,
    ReadRepository, Selector,
};
use common::{AppError, AppResult, OptionExt};

/// Catalog row, projected at query time.
#[derive(Debug, Clone, PartialEq, Eq, DerivePartialModel, FromQueryResult, Serialize)]
#[sea_orm(entity = "product::Entity")]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: i32,
    pub name: String,
    pub selling_price: i64,
    pub storage_quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductDetail {
    pub product: product::Model,
    pub images: Vec<product_image::Model>,
}

#[derive(Debug, FromQueryResult)]
struct PricePoint {
    price: i64,
}

/// Columns a catalog request may sort and search on; `id` is the default sort.
pub fn catalog_columns() -> ColumnMap<product::Entity> {
    ColumnMap::new("id", product::Column::Id, ColumnType::Int)
        .insert("name", product::Column::Name, ColumnType::String)
        .insert("price", product::Column::SellingPrice, ColumnType::Int)
        .insert("quantity", product::Column::StorageQuantity, ColumnType::Int)
}

#[async_trait]
pub trait ProductService: Send + Sync {
    /// One catalog page, filtered and sorted as requested
    async fn list_products(&self, filters: QueryFilters) -> AppResult<PaginatedList<ProductSummary>>;

    /// Product with its images
    async fn product_detail(&self, id: i32) -> AppResult<ProductDetail>;

    /// Distinct selling prices, cheapest first
    async fn price_points(&self) -> AppResult<Vec<i64>>;

    /// Add `quantity` units to the stock of product `id`
    async fn restock(&self, id: i32, quantity: i32) -> AppResult<product::Model>;
}

pub struct ProductCatalog {
    uow: Arc<dyn UnitOfWork>,
    columns: ColumnMap<product::Entity>,
    max_page_size: u64,
}

impl ProductCatalog {
    pub fn new(uow: Arc<dyn UnitOfWork>, max_page_size: u64) -> Self {
        Self {
            uow,
            columns: catalog_columns(),
            max_page_size,
        }
    }
}

#[async_trait]
impl ProductService for ProductCatalog {
    async fn list_products(&self, filters: QueryFilters) -> AppResult<PaginatedList<ProductSummary>> {
        let filters = filters.clamped(self.max_page_size);
        self.uow
            .products()
            .get_paginated_list::<ProductSummary>(&filters, &self.columns)
            .await
    }

    async fn product_detail(&self, id: i32) -> AppResult<ProductDetail> {
        let expanded = self
            .uow
            .products()
            .find_expanded(
                Condition::all().add(product::Column::Id.eq(id)),
                &["images"],
            )
            .await?
            .ok_or_not_found()?;

        let images = expanded
            .related
            .get::<product_image::Entity>("images")
            .into_iter()
            .cloned()
            .collect();

        Ok(ProductDetail {
            product: expanded.entity,
            images,
        })
    }

    async fn price_points(&self) -> AppResult<Vec<i64>> {
        let selector = Selector::<product::Entity>::new()
            .column_as(product::Column::SellingPrice, "price")
            .distinct();

        let mut prices: Vec<i64> = self
            .uow
            .products()
            .get_all_projection_with::<PricePoint>(&selector)
            .await?
            .into_iter()
            .map(|p| p.price)
            .collect();
        prices.sort_unstable();
        Ok(prices)
    }

    async fn restock(&self, id: i32, quantity: i32) -> AppResult<product::Model> {
        if quantity <= 0 {
            return Err(AppError::validation("Restock quantity must be positive"));
        }

        let product = self.uow.products().get(id).await?.ok_or_not_found()?;
        product.modify(|p| p.storage_quantity += quantity);

        self.uow.complete().await?;
        Ok(product.get())
    }
}
