use sea_orm_migration::prelude::*;

use crate::m20260302_000002_ledger::Journals;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum PaymentOutbox {
    Table,
    Id,
    IdempotencyKey,
    InstructorId,
    JournalId,
    FlightSessionId,
    AmountCents,
    Currency,
    IsInstantPayout,
    Status,
    AttemptCount,
    MaxAttempts,
    NextAttemptAt,
    LastAttemptAt,
    FailureMessage,
    ProcessorObjectId,
    CreatedAt,
    CompletedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PaymentOutbox::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(PaymentOutbox::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(PaymentOutbox::IdempotencyKey)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(PaymentOutbox::InstructorId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentOutbox::JournalId).string().not_null())
                    .col(ColumnDef::new(PaymentOutbox::FlightSessionId).string())
                    .col(
                        ColumnDef::new(PaymentOutbox::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentOutbox::Currency).string().not_null())
                    .col(
                        ColumnDef::new(PaymentOutbox::IsInstantPayout)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(PaymentOutbox::Status).string().not_null())
                    .col(
                        ColumnDef::new(PaymentOutbox::AttemptCount)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(PaymentOutbox::MaxAttempts)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentOutbox::NextAttemptAt).timestamp())
                    .col(ColumnDef::new(PaymentOutbox::LastAttemptAt).timestamp())
                    .col(ColumnDef::new(PaymentOutbox::FailureMessage).string())
                    .col(ColumnDef::new(PaymentOutbox::ProcessorObjectId).string())
                    .col(
                        ColumnDef::new(PaymentOutbox::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(ColumnDef::new(PaymentOutbox::CompletedAt).timestamp())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-payment_outbox-journal_id")
                            .from(PaymentOutbox::Table, PaymentOutbox::JournalId)
                            .to(Journals::Table, Journals::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one outbox entry per (journal, instructor): the key is
        // derived from both, so the constraint enforces the guarantee.
        manager
            .create_index(
                Index::create()
                    .name("uidx-payment_outbox-idempotency_key")
                    .table(PaymentOutbox::Table)
                    .col(PaymentOutbox::IdempotencyKey)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Worker scan: pending entries ordered by due time.
        manager
            .create_index(
                Index::create()
                    .name("idx-payment_outbox-status-next_attempt_at")
                    .table(PaymentOutbox::Table)
                    .col(PaymentOutbox::Status)
                    .col(PaymentOutbox::NextAttemptAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PaymentOutbox::Table).to_owned())
            .await?;
        Ok(())
    }
}
