use sea_orm_migration::prelude::*;

use crate::m20260302_000001_wallets::Wallets;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum Journals {
    Table,
    Id,
    EventType,
    EventId,
    CreatedAt,
}

#[derive(Iden)]
enum LedgerEntries {
    Table,
    Id,
    JournalId,
    WalletId,
    AmountCents,
    RefType,
    Description,
    Metadata,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Journals::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Journals::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Journals::EventType).string().not_null())
                    .col(ColumnDef::new(Journals::EventId).string().not_null())
                    .col(ColumnDef::new(Journals::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Journal-level idempotency: one journal per domain event.
        manager
            .create_index(
                Index::create()
                    .name("uidx-journals-event_type-event_id")
                    .table(Journals::Table)
                    .col(Journals::EventType)
                    .col(Journals::EventId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LedgerEntries::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LedgerEntries::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(LedgerEntries::JournalId).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::WalletId).string().not_null())
                    .col(
                        ColumnDef::new(LedgerEntries::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(LedgerEntries::RefType).string().not_null())
                    .col(ColumnDef::new(LedgerEntries::Description).string())
                    .col(ColumnDef::new(LedgerEntries::Metadata).string())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ledger_entries-journal_id")
                            .from(LedgerEntries::Table, LedgerEntries::JournalId)
                            .to(Journals::Table, Journals::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-ledger_entries-wallet_id")
                            .from(LedgerEntries::Table, LedgerEntries::WalletId)
                            .to(Wallets::Table, Wallets::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-journal_id")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::JournalId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-ledger_entries-wallet_id")
                    .table(LedgerEntries::Table)
                    .col(LedgerEntries::WalletId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LedgerEntries::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Journals::Table).to_owned())
            .await?;
        Ok(())
    }
}
