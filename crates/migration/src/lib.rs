pub use sea_orm_migration::prelude::*;

mod m20260302_000001_wallets;
mod m20260302_000002_ledger;
mod m20260315_000001_credit_limits;
mod m20260330_000001_payment_outbox;
mod m20260330_000002_instructor_transfers;
mod m20260412_000001_payout_accounts;
mod m20260412_000002_reserve_alerts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260302_000001_wallets::Migration),
            Box::new(m20260302_000002_ledger::Migration),
            Box::new(m20260315_000001_credit_limits::Migration),
            Box::new(m20260330_000001_payment_outbox::Migration),
            Box::new(m20260330_000002_instructor_transfers::Migration),
            Box::new(m20260412_000001_payout_accounts::Migration),
            Box::new(m20260412_000002_reserve_alerts::Migration),
        ]
    }
}
