use sea_orm::{ConnectionTrait, DbErr};
use sea_orm_migration::prelude::*;
use uuid::Uuid;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum Wallets {
    Table,
    Id,
    OwnerType,
    OwnerId,
    CreatedAt,
}

#[derive(Iden)]
pub enum WalletBalances {
    Table,
    WalletId,
    BalanceCents,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Wallets::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Wallets::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Wallets::OwnerType).string().not_null())
                    .col(ColumnDef::new(Wallets::OwnerId).string())
                    .col(ColumnDef::new(Wallets::CreatedAt).timestamp().not_null())
                    .to_owned(),
            )
            .await?;

        // Unique per owner; owner_id is null only for the seeded platform
        // wallet, which never goes through get-or-create races.
        manager
            .create_index(
                Index::create()
                    .name("uidx-wallets-owner_type-owner_id")
                    .table(Wallets::Table)
                    .col(Wallets::OwnerType)
                    .col(Wallets::OwnerId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(WalletBalances::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WalletBalances::WalletId)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(WalletBalances::BalanceCents)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(WalletBalances::UpdatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-wallet_balances-wallet_id")
                            .from(WalletBalances::Table, WalletBalances::WalletId)
                            .to(Wallets::Table, Wallets::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // Seed the single platform wallet so there is exactly one from day
        // one, with its balance row at zero.
        let db = manager.get_connection();
        let backend = db.get_database_backend();
        let platform_wallet_id = Uuid::new_v4().to_string();
        let now = chrono::Utc::now();

        let wallet_insert = Query::insert()
            .into_table(Wallets::Table)
            .columns([
                Wallets::Id,
                Wallets::OwnerType,
                Wallets::OwnerId,
                Wallets::CreatedAt,
            ])
            .values_panic([
                platform_wallet_id.clone().into(),
                "platform".into(),
                None::<String>.into(),
                now.into(),
            ])
            .to_owned();
        db.execute(backend.build(&wallet_insert)).await?;

        let balance_insert = Query::insert()
            .into_table(WalletBalances::Table)
            .columns([
                WalletBalances::WalletId,
                WalletBalances::BalanceCents,
                WalletBalances::UpdatedAt,
            ])
            .values_panic([platform_wallet_id.into(), 0i64.into(), now.into()])
            .to_owned();
        db.execute(backend.build(&balance_insert)).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WalletBalances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Wallets::Table).to_owned())
            .await?;
        Ok(())
    }
}
