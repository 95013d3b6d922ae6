use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum ReserveAlerts {
    Table,
    Id,
    AlertType,
    Severity,
    Message,
    PlatformBalanceCents,
    DriftCents,
    ThresholdCents,
    AcknowledgedAt,
    AcknowledgedBy,
    ResolutionNotes,
    CreatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(ReserveAlerts::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(ReserveAlerts::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(ReserveAlerts::AlertType).string().not_null())
                    .col(ColumnDef::new(ReserveAlerts::Severity).string().not_null())
                    .col(ColumnDef::new(ReserveAlerts::Message).string().not_null())
                    .col(ColumnDef::new(ReserveAlerts::PlatformBalanceCents).big_integer())
                    .col(ColumnDef::new(ReserveAlerts::DriftCents).big_integer())
                    .col(ColumnDef::new(ReserveAlerts::ThresholdCents).big_integer())
                    .col(ColumnDef::new(ReserveAlerts::AcknowledgedAt).timestamp())
                    .col(ColumnDef::new(ReserveAlerts::AcknowledgedBy).string())
                    .col(ColumnDef::new(ReserveAlerts::ResolutionNotes).string())
                    .col(
                        ColumnDef::new(ReserveAlerts::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // Dedup check: is there an open alert of this type?
        manager
            .create_index(
                Index::create()
                    .name("idx-reserve_alerts-alert_type-acknowledged_at")
                    .table(ReserveAlerts::Table)
                    .col(ReserveAlerts::AlertType)
                    .col(ReserveAlerts::AcknowledgedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(ReserveAlerts::Table).to_owned())
            .await?;
        Ok(())
    }
}
