//! Migration: Create customers, addresses and cart tables.

use sea_orm_migration::prelude::*;

use super::m20250101_000001_create_catalog_tables::Products;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // No constraint on default_address_id, addresses already reference customers
        manager
            .create_table(
                Table::create()
                    .table(Customers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Customers::Id)
                            .string_len(64)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Customers::FullName).string_len(200).not_null())
                    .col(ColumnDef::new(Customers::DefaultAddressId).integer().null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Addresses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Addresses::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Addresses::CustomerId).string_len(64).not_null())
                    .col(ColumnDef::new(Addresses::Governorate).string_len(100).not_null())
                    .col(ColumnDef::new(Addresses::City).string_len(100).not_null())
                    .col(ColumnDef::new(Addresses::Street).string_len(200).not_null())
                    .col(ColumnDef::new(Addresses::Note).string_len(500).null())
                    .col(
                        ColumnDef::new(Addresses::IsDefault)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_addresses_customer")
                            .from(Addresses::Table, Addresses::CustomerId)
                            .to(Customers::Table, Customers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_addresses_customer_id")
                    .table(Addresses::Table)
                    .col(Addresses::CustomerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Carts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Carts::CustomerId).string_len(64).not_null())
                    .col(ColumnDef::new(Carts::ProductId).integer().not_null())
                    .col(ColumnDef::new(Carts::Quantity).integer().not_null())
                    .col(
                        ColumnDef::new(Carts::AddedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .primary_key(Index::create().col(Carts::CustomerId).col(Carts::ProductId))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_carts_customer")
                            .from(Carts::Table, Carts::CustomerId)
                            .to(Customers::Table, Customers::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_carts_product")
                            .from(Carts::Table, Carts::ProductId)
                            .to(Products::Table, Products::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Carts::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Addresses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Customers::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
pub(super) enum Customers {
    Table,
    Id,
    FullName,
    DefaultAddressId,
}

#[derive(Iden)]
enum Addresses {
    Table,
    Id,
    CustomerId,
    Governorate,
    City,
    Street,
    Note,
    IsDefault,
}

#[derive(Iden)]
enum Carts {
    Table,
    CustomerId,
    ProductId,
    Quantity,
    AddedAt,
}
