use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use sea_orm::Database;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use engine::{
    Engine, PaymentProcessor, ProcessorBalance, ProcessorError, ProcessorTransfer,
    TransferRequest, WalletOwner,
};
use migration::MigratorTrait;
use server::ServerState;

const CALLBACK_SECRET: &str = "whsec_test";

struct StubProcessor {
    transfers: Mutex<Vec<ProcessorTransfer>>,
}

#[async_trait]
impl PaymentProcessor for StubProcessor {
    async fn create_transfer(
        &self,
        request: &TransferRequest,
    ) -> Result<ProcessorTransfer, ProcessorError> {
        let transfer = ProcessorTransfer {
            id: format!("tr_{}", request.idempotency_key),
            amount_cents: request.amount_cents,
            destination_account_id: request.destination_account_id.clone(),
        };
        self.transfers.lock().unwrap().push(transfer.clone());
        Ok(transfer)
    }

    async fn retrieve_balance(&self) -> Result<ProcessorBalance, ProcessorError> {
        Ok(ProcessorBalance {
            available_cents: 0,
            pending_cents: 0,
        })
    }

    async fn find_transfer_by_key(
        &self,
        _idempotency_key: &str,
    ) -> Result<Option<ProcessorTransfer>, ProcessorError> {
        Ok(None)
    }
}

async fn test_app() -> (Router, Arc<Engine>) {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();

    let engine = Engine::builder()
        .database(db)
        .processor(Arc::new(StubProcessor {
            transfers: Mutex::new(Vec::new()),
        }))
        .build()
        .unwrap();
    let engine = Arc::new(engine);

    let state = ServerState {
        engine: engine.clone(),
        callback_secret: CALLBACK_SECRET.to_string(),
    };
    (server::router(state), engine)
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

fn journal_body(engine_platform: Uuid, student_wallet: Uuid, event_id: &str, amount: i64) -> Value {
    json!({
        "event_type": "training_event",
        "event_id": event_id,
        "entries": [
            { "wallet_id": student_wallet, "amount_cents": -amount, "ref_type": "training_event" },
            { "wallet_id": engine_platform, "amount_cents": amount, "ref_type": "training_event" },
        ],
    })
}

#[tokio::test]
async fn posting_a_journal_is_idempotent_over_http() {
    let (app, engine) = test_app().await;
    let student_wallet = engine
        .get_or_create_wallet(WalletOwner::Student {
            student_id: Uuid::new_v4(),
        })
        .await
        .unwrap();
    let platform_wallet = engine.get_or_create_wallet(WalletOwner::Platform).await.unwrap();

    let body = journal_body(platform_wallet, student_wallet, "evt-http-1", 5_000);
    let (status, first) = send_json(&app, "POST", "/journals", body.clone()).await;
    assert_eq!(status, StatusCode::OK);

    let (status, second) = send_json(&app, "POST", "/journals", body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["journal_id"], second["journal_id"]);
}

#[tokio::test]
async fn unbalanced_journals_get_a_422() {
    let (app, engine) = test_app().await;
    let platform_wallet = engine.get_or_create_wallet(WalletOwner::Platform).await.unwrap();

    let body = json!({
        "event_type": "training_event",
        "event_id": "evt-http-2",
        "entries": [
            { "wallet_id": platform_wallet, "amount_cents": 500, "ref_type": "training_event" },
        ],
    });
    let (status, error) = send_json(&app, "POST", "/journals", body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(error["error"].as_str().unwrap().contains("balance"));
}

#[tokio::test]
async fn platform_balance_reads_back_posted_margin() {
    let (app, engine) = test_app().await;
    let student_wallet = engine
        .get_or_create_wallet(WalletOwner::Student {
            student_id: Uuid::new_v4(),
        })
        .await
        .unwrap();
    let platform_wallet = engine.get_or_create_wallet(WalletOwner::Platform).await.unwrap();

    let body = journal_body(platform_wallet, student_wallet, "evt-http-3", 7_500);
    send_json(&app, "POST", "/journals", body).await;

    let (status, balance) = get(&app, "/balances/platform").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["balance_cents"], 7_500);
}

#[tokio::test]
async fn enqueue_returns_the_same_outbox_row_on_replay() {
    let (app, engine) = test_app().await;
    let student_id = Uuid::new_v4();
    let instructor_id = Uuid::new_v4();
    let student_wallet = engine
        .get_or_create_wallet(WalletOwner::Student { student_id })
        .await
        .unwrap();
    let platform_wallet = engine.get_or_create_wallet(WalletOwner::Platform).await.unwrap();

    let (_, journal) = send_json(
        &app,
        "POST",
        "/journals",
        journal_body(platform_wallet, student_wallet, "evt-http-4", 9_000),
    )
    .await;
    let journal_id = journal["journal_id"].as_str().unwrap().to_string();

    let enqueue = json!({
        "instructor_id": instructor_id,
        "amount_cents": 7_000,
        "journal_id": journal_id,
    });
    let (status, first) = send_json(&app, "POST", "/transfers", enqueue.clone()).await;
    assert_eq!(status, StatusCode::OK);
    let (_, second) = send_json(&app, "POST", "/transfers", enqueue).await;
    assert_eq!(first["outbox_id"], second["outbox_id"]);
}

#[tokio::test]
async fn reserve_endpoint_reports_status() {
    let (app, _engine) = test_app().await;

    let (status, reserve) = get(&app, "/reserve").await;
    assert_eq!(status, StatusCode::OK);
    // Empty ledger: reserve of zero is critical under the default config.
    assert_eq!(reserve["health"], "critical");
    assert_eq!(reserve["current_reserve_cents"], 0);
}

#[tokio::test]
async fn alerts_list_and_acknowledge_round_trip() {
    let (app, _engine) = test_app().await;

    // The critical reserve check above persists an alert row.
    get(&app, "/reserve").await;

    let (status, alerts) = get(&app, "/alerts").await;
    assert_eq!(status, StatusCode::OK);
    let alert_id = alerts[0]["id"].as_str().unwrap().to_string();

    let (status, _) = send_json(
        &app,
        "POST",
        &format!("/alerts/{alert_id}/acknowledge"),
        json!({ "acknowledged_by": "ops" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, alerts) = get(&app, "/alerts").await;
    assert!(
        alerts
            .as_array()
            .unwrap()
            .iter()
            .all(|a| a["id"].as_str() != Some(alert_id.as_str()))
    );
}

#[tokio::test]
async fn callbacks_require_the_shared_secret() {
    let (app, engine) = test_app().await;
    let instructor_id = Uuid::new_v4();

    let event = json!({
        "type": "account_updated",
        "instructor_id": instructor_id,
        "account_id": "acct_http",
        "payouts_enabled": true,
    });

    // Missing header.
    let (status, _) = send_json(&app, "POST", "/callbacks/processor", event.clone()).await;
    assert!(status.is_client_error());

    // Wrong secret.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/callbacks/processor")
                .header("content-type", "application/json")
                .header("x-processor-secret", "wrong")
                .body(Body::from(event.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Right secret.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/callbacks/processor")
                .header("content-type", "application/json")
                .header("x-processor-secret", CALLBACK_SECRET)
                .body(Body::from(event.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The account landed.
    let check = engine
        .payout_account_updated(instructor_id, "acct_http", true)
        .await;
    assert!(check.is_ok());
}

#[tokio::test]
async fn credit_check_answers_over_http() {
    let (app, _engine) = test_app().await;
    let student_id = Uuid::new_v4();

    let (status, check) = send_json(
        &app,
        "POST",
        &format!("/credit/{student_id}/check"),
        json!({ "proposed_charge_cents": 5_000 }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(check["allowed"], true);
    assert_eq!(check["new_balance_cents"], -5_000);

    let (status, risks) = get(&app, "/credit/risk").await;
    assert_eq!(status, StatusCode::OK);
    assert!(risks.as_array().unwrap().is_empty());
}
