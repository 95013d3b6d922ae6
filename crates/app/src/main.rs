use std::sync::Arc;

use migration::{Migrator, MigratorTrait};
use settings::Database;

mod settings;
mod worker;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let settings = settings::Settings::new()?;
    let mut tasks = tokio::task::JoinSet::new();

    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "skyledger={level},server={level},engine={level}",
            level = settings.app.level
        ))
        .init();

    let db = parse_database(&settings.database).await?;
    let processor = Arc::new(engine::HttpProcessor::new(&settings.processor)?);
    let engine = engine::Engine::builder()
        .database(db)
        .processor(processor)
        .reserve_config(settings.reserve)
        .credit_policy(settings.credit)
        .build()?;

    if let Some(server_settings) = settings.server {
        let server_engine = engine.clone();
        tasks.spawn(async move {
            tracing::info!("Found server settings...");
            let bind = server_settings.bind.unwrap_or_else(|| "127.0.0.1".to_string());
            let addr = format!("{}:{}", bind, server_settings.port);
            let listener = match tokio::net::TcpListener::bind(addr).await {
                Ok(listener) => listener,
                Err(err) => {
                    tracing::error!("failed to bind server listener: {err}");
                    return;
                }
            };
            if let Err(err) = server::run_with_listener(
                server_engine,
                server_settings.callback_secret,
                listener,
            )
            .await
            {
                tracing::error!("server failed: {err}");
            }
        });
    }

    if let Some(worker_settings) = settings.worker {
        tracing::info!("Found worker settings...");
        let reconcile_secs = worker_settings.reconcile_secs;
        let outbox_engine = engine.clone();
        let reconcile_engine = engine.clone();
        tasks.spawn(async move {
            worker::run_outbox_worker(outbox_engine, worker_settings).await;
        });
        tasks.spawn(async move {
            worker::run_reconciliation(reconcile_engine, reconcile_secs).await;
        });
    }

    while tasks.join_next().await.is_some() {
        tasks.shutdown().await;
    }

    Ok(())
}

async fn parse_database(
    config: &Database,
) -> Result<sea_orm::DatabaseConnection, Box<dyn std::error::Error + Send + Sync>> {
    let url = match config {
        Database::Memory => String::from("sqlite::memory:"),
        Database::Sqlite(path) => format!("sqlite:{}?mode=rwc", path),
    };

    let database = sea_orm::Database::connect(url).await?;
    Migrator::up(&database, None).await?;
    Ok(database)
}
