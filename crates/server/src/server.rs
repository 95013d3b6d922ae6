use axum::{
    Router,
    routing::{get, post},
};
use axum_extra::headers::{Error as AxumError, Header};

use std::sync::Arc;

use crate::{alerts, balances, callbacks, credit, journals, reserve, transfers};
use engine::Engine;

static PROCESSOR_SECRET_HEADER: axum::http::HeaderName =
    axum::http::HeaderName::from_static("x-processor-secret");

#[derive(Clone)]
pub struct ServerState {
    pub engine: Arc<Engine>,
    /// Shared secret the processor sends with every callback.
    pub callback_secret: String,
}

/// `TypedHeader` for the processor callback secret.
///
/// Callback requests must carry an "x-processor-secret" entry matching the
/// configured secret; everything else is rejected before parsing the body.
#[derive(Debug)]
pub(crate) struct ProcessorSecret(pub String);

impl Header for ProcessorSecret {
    fn name() -> &'static axum::http::HeaderName {
        &PROCESSOR_SECRET_HEADER
    }

    fn decode<'i, I>(values: &mut I) -> Result<Self, AxumError>
    where
        Self: Sized,
        I: Iterator<Item = &'i axum::http::HeaderValue>,
    {
        let value = values.next().ok_or_else(AxumError::invalid)?;
        let Ok(value) = value.to_str() else {
            return Err(AxumError::invalid());
        };

        Ok(ProcessorSecret(value.to_string()))
    }

    fn encode<E: Extend<axum::http::HeaderValue>>(&self, values: &mut E) {
        match axum::http::HeaderValue::from_str(&self.0) {
            Ok(value) => values.extend(std::iter::once(value)),
            Err(_) => tracing::error!("failed to encode x-processor-secret header"),
        }
    }
}

pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/journals", post(journals::post_new))
        .route("/wallets/{wallet_id}/entries", get(journals::wallet_entries))
        .route("/transfers", post(transfers::enqueue))
        .route("/reserve", get(reserve::get_status))
        .route("/balances/platform", get(balances::platform))
        .route("/alerts", get(alerts::list))
        .route("/alerts/{alert_id}/acknowledge", post(alerts::acknowledge))
        .route("/credit/risk", get(credit::risk))
        .route("/credit/{student_id}/check", post(credit::check))
        .route("/callbacks/processor", post(callbacks::receive))
        .with_state(state)
}

pub async fn run(engine: Engine, callback_secret: String) {
    let listener = match tokio::net::TcpListener::bind("127.0.0.1:3000").await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!("failed to bind server listener: {err}");
            return;
        }
    };
    if let Err(err) = run_with_listener(engine, callback_secret, listener).await {
        tracing::error!("server failed: {err}");
    }
}

pub async fn run_with_listener(
    engine: Engine,
    callback_secret: String,
    listener: tokio::net::TcpListener,
) -> Result<(), std::io::Error> {
    let addr = listener.local_addr()?;
    tracing::info!("Server listening on {}", addr);

    let state = ServerState {
        engine: Arc::new(engine),
        callback_secret,
    };

    axum::serve(listener, router(state)).await
}

pub fn spawn_with_listener(
    engine: Engine,
    callback_secret: String,
    listener: tokio::net::TcpListener,
) -> Result<std::net::SocketAddr, std::io::Error> {
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(err) = run_with_listener(engine, callback_secret, listener).await {
            tracing::error!("server failed: {err}");
        }
    });

    Ok(addr)
}
