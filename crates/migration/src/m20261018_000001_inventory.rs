//! Inventory schema.
//!
//! - `stock_names`: catalog of stocked items
//! - `batches`: one row per delivery, with its running quantity
//! - `transactions`: append-only ledger of additions and removals

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Iden)]
enum StockNames {
    Table,
    Id,
    Name,
    NameNorm,
}

#[derive(Iden)]
enum Batches {
    Table,
    Id,
    StockId,
    QuantityInitial,
    QuantityCurrent,
    DeliveredAt,
    UseBy,
    RecordedAt,
}

#[derive(Iden)]
enum Transactions {
    Table,
    Id,
    BatchId,
    StockId,
    TransactionType,
    Quantity,
    OccurredAt,
    RemovalReason,
    RecordedAt,
}

/// Storage text accepted in `transactions.transaction_type`.
const TRANSACTION_TYPES: [&str; 2] = ["addition", "removal"];

/// Storage text accepted in `transactions.removal_reason`.
const REMOVAL_REASONS: [&str; 5] = ["used", "out_of_date", "returned", "lost", "destroyed"];

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Stock names
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(StockNames::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(StockNames::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(StockNames::Name).string().not_null())
                    .col(ColumnDef::new(StockNames::NameNorm).string().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-stock_names-name_norm-unique")
                    .table(StockNames::Table)
                    .col(StockNames::NameNorm)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Batches
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Batches::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Batches::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Batches::StockId).integer().not_null())
                    .col(
                        ColumnDef::new(Batches::QuantityInitial)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Batches::QuantityInitial).gt(0)),
                    )
                    .col(
                        ColumnDef::new(Batches::QuantityCurrent)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Batches::QuantityCurrent).gte(0)),
                    )
                    .col(ColumnDef::new(Batches::DeliveredAt).date().not_null())
                    .col(ColumnDef::new(Batches::UseBy).date().not_null())
                    .col(
                        ColumnDef::new(Batches::RecordedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .check(
                        Expr::col(Batches::QuantityCurrent)
                            .lte(Expr::col(Batches::QuantityInitial)),
                    )
                    .check(Expr::col(Batches::UseBy).gt(Expr::col(Batches::DeliveredAt)))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-batches-stock_id")
                            .from(Batches::Table, Batches::StockId)
                            .to(StockNames::Table, StockNames::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-batches-stock_id")
                    .table(Batches::Table)
                    .col(Batches::StockId)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Transactions
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(Transactions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Transactions::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Transactions::BatchId).integer().not_null())
                    .col(ColumnDef::new(Transactions::StockId).integer().not_null())
                    .col(
                        ColumnDef::new(Transactions::TransactionType)
                            .string()
                            .not_null()
                            .check(
                                Expr::col(Transactions::TransactionType).is_in(TRANSACTION_TYPES),
                            ),
                    )
                    .col(
                        ColumnDef::new(Transactions::Quantity)
                            .big_integer()
                            .not_null()
                            .check(Expr::col(Transactions::Quantity).gt(0)),
                    )
                    .col(ColumnDef::new(Transactions::OccurredAt).date().not_null())
                    .col(
                        ColumnDef::new(Transactions::RemovalReason)
                            .string()
                            .check(
                                Expr::col(Transactions::RemovalReason).is_in(REMOVAL_REASONS),
                            ),
                    )
                    .col(
                        ColumnDef::new(Transactions::RecordedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    // a reason on every removal and on nothing else
                    .check(
                        Expr::col(Transactions::TransactionType)
                            .eq("addition")
                            .and(Expr::col(Transactions::RemovalReason).is_null())
                            .or(Expr::col(Transactions::TransactionType)
                                .eq("removal")
                                .and(Expr::col(Transactions::RemovalReason).is_not_null())),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-batch_id")
                            .from(Transactions::Table, Transactions::BatchId)
                            .to(Batches::Table, Batches::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-transactions-stock_id")
                            .from(Transactions::Table, Transactions::StockId)
                            .to(StockNames::Table, StockNames::Id)
                            .on_delete(ForeignKeyAction::Restrict),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-batch_id")
                    .table(Transactions::Table)
                    .col(Transactions::BatchId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-transactions-stock_id-occurred_at")
                    .table(Transactions::Table)
                    .col(Transactions::StockId)
                    .col(Transactions::OccurredAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Ledger rows reference batches, batches reference the catalog.
        manager
            .drop_table(Table::drop().table(Transactions::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Batches::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(StockNames::Table).to_owned())
            .await?;
        Ok(())
    }
}
