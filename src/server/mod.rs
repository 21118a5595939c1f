//! Webhook HTTP surface
//!
//! One POST endpoint receives the platform's event batches; every
//! processed body is acknowledged with 200 regardless of what the events
//! contained. Only a bad signature is rejected.

use crate::config::Config;
use crate::engine::{EventKind, VotingEngine};
use crate::line::{verify_signature, ReplySender, WebhookEnvelope};
use crate::store::VoteStore;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

const SIGNATURE_HEADER: &str = "x-line-signature";

/// Shared state for the webhook handlers.
pub struct AppState {
    config: Arc<Config>,
    engine: VotingEngine,
    store: VoteStore,
    sender: Arc<dyn ReplySender>,
    /// Serializes the load-mutate-save critical section. The store has no
    /// atomic update primitive, so concurrent events from duplicate
    /// webhook deliveries would race on the whole-file write without it.
    write_gate: Mutex<()>,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(config: Arc<Config>, store: VoteStore, sender: Arc<dyn ReplySender>) -> Self {
        Self {
            engine: VotingEngine::new(config.clone()),
            config,
            store,
            sender,
            write_gate: Mutex::new(()),
        }
    }
}

/// Build the webhook router.
pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/callback", post(callback))
        .route("/healthz", get(healthz))
        .with_state(state)
}

/// Bind and serve until SIGINT/SIGTERM.
pub async fn run(state: SharedState, bind: &str) -> Result<(), std::io::Error> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "webhook server listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn healthz() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("SENBATSU_GIT_HASH"),
        "status": "ok",
    }))
}

async fn callback(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    if !verify_signature(&state.config.line.channel_secret, &body, signature) {
        warn!("rejecting webhook with bad signature");
        return StatusCode::BAD_REQUEST;
    }

    let envelope: WebhookEnvelope = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(error) => {
            // An authenticated but unparseable body is acked anyway;
            // the platform would only redeliver it.
            warn!(%error, "dropping unparseable webhook body");
            return StatusCode::OK;
        }
    };

    for event in &envelope.events {
        let Some((user_id, kind, reply_token)) = event.to_inbound() else {
            continue;
        };
        handle_inbound(&state, &user_id, &kind, &reply_token).await;
    }

    StatusCode::OK
}

/// Load, decide, persist, reply, for one event.
async fn handle_inbound(state: &AppState, user_id: &str, kind: &EventKind, reply_token: &str) {
    let _guard = state.write_gate.lock().await;

    let mut dataset = match state.store.load(&state.config.candidates).await {
        Ok(dataset) => dataset,
        Err(error) => {
            error!(%error, "cannot load vote dataset; dropping event");
            return;
        }
    };

    let now = chrono::Utc::now().with_timezone(&state.config.timezone);
    let decision = state.engine.handle_event(user_id, kind, &mut dataset, now);

    if decision.persist {
        if let Err(error) = state.store.save(&dataset).await {
            // The decision stands; the user-visible reply may claim
            // success while this write was lost.
            error!(%error, "failed to persist vote dataset");
        }
    }

    if let Err(error) = state.sender.send_reply(reply_token, &decision.replies).await {
        error!(%error, "failed to deliver reply");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("shutting down on Ctrl+C"),
        _ = terminate => info!("shutting down on SIGTERM"),
    }
}
