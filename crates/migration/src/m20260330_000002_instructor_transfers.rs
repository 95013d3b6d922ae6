use sea_orm_migration::prelude::*;

use crate::m20260330_000001_payment_outbox::PaymentOutbox;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum InstructorTransfers {
    Table,
    Id,
    OutboxId,
    InstructorId,
    JournalId,
    FlightSessionId,
    ProcessorTransferId,
    ProcessorAccountId,
    AmountCents,
    Currency,
    Status,
    FailureMessage,
    IsClawbackEligible,
    ClawbackWindowEndsAt,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(InstructorTransfers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(InstructorTransfers::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(InstructorTransfers::OutboxId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstructorTransfers::InstructorId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstructorTransfers::JournalId)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InstructorTransfers::FlightSessionId).string())
                    .col(
                        ColumnDef::new(InstructorTransfers::ProcessorTransferId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstructorTransfers::ProcessorAccountId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstructorTransfers::AmountCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstructorTransfers::Currency)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstructorTransfers::Status)
                            .string()
                            .not_null(),
                    )
                    .col(ColumnDef::new(InstructorTransfers::FailureMessage).string())
                    .col(
                        ColumnDef::new(InstructorTransfers::IsClawbackEligible)
                            .boolean()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstructorTransfers::ClawbackWindowEndsAt)
                            .timestamp()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(InstructorTransfers::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-instructor_transfers-outbox_id")
                            .from(InstructorTransfers::Table, InstructorTransfers::OutboxId)
                            .to(PaymentOutbox::Table, PaymentOutbox::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // One transfer record per outbox entry; completion re-entry reuses it.
        manager
            .create_index(
                Index::create()
                    .name("uidx-instructor_transfers-outbox_id")
                    .table(InstructorTransfers::Table)
                    .col(InstructorTransfers::OutboxId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Settlement callbacks look transfers up by the processor's id.
        manager
            .create_index(
                Index::create()
                    .name("idx-instructor_transfers-processor_transfer_id")
                    .table(InstructorTransfers::Table)
                    .col(InstructorTransfers::ProcessorTransferId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(InstructorTransfers::Table).to_owned())
            .await?;
        Ok(())
    }
}
