//! HTTP intake for GitHub App webhook deliveries plus local replay of a saved
//! delivery.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use bench_github::bench_event::{TriggerEvent, ISSUE_COMMENT_EVENT};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::dispatch::{BenchDispatcher, DispatchOutcome};

pub const GITHUB_EVENT_HEADER: &str = "x-github-event";
pub const GITHUB_DELIVERY_HEADER: &str = "x-github-delivery";
pub const GITHUB_SIGNATURE_HEADER: &str = "x-hub-signature-256";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookSignatureError {
    #[error("missing {GITHUB_SIGNATURE_HEADER} header")]
    Missing,
    #[error("github webhook signature must use sha256=<hex> format")]
    MalformedFormat,
    #[error("invalid signature digest: {0}")]
    MalformedDigest(String),
    #[error("webhook signature verification failed")]
    Mismatch,
}

pub fn verify_github_signature(
    body: &[u8],
    signature: Option<&str>,
    secret: &str,
) -> Result<(), WebhookSignatureError> {
    let signature = signature.ok_or(WebhookSignatureError::Missing)?;
    let Some(digest_hex) = signature.trim().strip_prefix("sha256=") else {
        return Err(WebhookSignatureError::MalformedFormat);
    };
    let expected = decode_hex(digest_hex).map_err(WebhookSignatureError::MalformedDigest)?;
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .map_err(|error| WebhookSignatureError::MalformedDigest(error.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookSignatureError::Mismatch)
}

fn decode_hex(value: &str) -> Result<Vec<u8>, String> {
    if value.is_empty() {
        return Err("digest cannot be empty".to_string());
    }
    if value.len() % 2 != 0 {
        return Err("digest must have an even number of hex characters".to_string());
    }
    value
        .as_bytes()
        .chunks(2)
        .map(|pair| {
            let hex = std::str::from_utf8(pair).map_err(|_| "invalid utf-8 in digest".to_string())?;
            u8::from_str_radix(hex, 16).map_err(|_| format!("invalid hex byte '{hex}'"))
        })
        .collect()
}

/// `Ok(None)` for deliveries of other event types.
pub fn trigger_event_for_delivery(event_name: &str, payload: Value) -> Result<Option<TriggerEvent>> {
    if event_name != ISSUE_COMMENT_EVENT {
        return Ok(None);
    }
    TriggerEvent::from_payload_value(payload).map(Some)
}

struct WebhookServerState {
    dispatcher: Arc<BenchDispatcher>,
    webhook_secret: Option<String>,
}

pub fn build_webhook_router(
    dispatcher: Arc<BenchDispatcher>,
    webhook_secret: Option<String>,
) -> Router {
    let state = Arc::new(WebhookServerState {
        dispatcher,
        webhook_secret: webhook_secret.filter(|secret| !secret.trim().is_empty()),
    });
    Router::new()
        .route("/", post(handle_github_webhook))
        .route("/api/github/webhooks", post(handle_github_webhook))
        .route("/healthz", get(handle_health))
        .with_state(state)
}

pub async fn run_webhook_server(
    bind: &str,
    webhook_secret: Option<String>,
    dispatcher: Arc<BenchDispatcher>,
) -> Result<()> {
    let listener = TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    let local_addr = listener
        .local_addr()
        .context("failed to resolve webhook bound address")?;
    let verify_signatures = webhook_secret.is_some();
    tracing::info!(
        addr = %local_addr,
        verify_signatures,
        output_mode = dispatcher.settings().output_mode.as_str(),
        "bench-bot webhook server listening"
    );

    let app = build_webhook_router(dispatcher, webhook_secret);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await
        .context("webhook server exited unexpectedly")
}

async fn handle_health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status":"ok"})))
}

fn error_response(status: StatusCode, code: &str, message: String) -> (StatusCode, Json<Value>) {
    (
        status,
        Json(json!({"error":{"code":code,"message":message}})),
    )
}

fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
}

async fn handle_github_webhook(
    State(state): State<Arc<WebhookServerState>>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let header = |name| header_value(&headers, name);
    let delivery_id = header(GITHUB_DELIVERY_HEADER).unwrap_or("unknown").to_string();

    if let Some(secret) = state.webhook_secret.as_deref() {
        if let Err(error) = verify_github_signature(&body, header(GITHUB_SIGNATURE_HEADER), secret)
        {
            tracing::warn!(delivery_id = %delivery_id, %error, "rejected webhook delivery");
            return error_response(StatusCode::UNAUTHORIZED, "auth_failed", error.to_string());
        }
    }

    let Some(event_name) = header(GITHUB_EVENT_HEADER).map(str::to_string) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "missing_event",
            format!("missing {GITHUB_EVENT_HEADER} header"),
        );
    };
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(payload) => payload,
        Err(error) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_json",
                format!("webhook body is not valid json: {error}"),
            );
        }
    };

    let event = match trigger_event_for_delivery(&event_name, payload) {
        Ok(Some(event)) => event,
        Ok(None) => {
            tracing::debug!(delivery_id = %delivery_id, event = %event_name, "ignoring webhook event");
            return (
                StatusCode::ACCEPTED,
                Json(json!({"status":"ignored","event":event_name})),
            );
        }
        Err(error) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_payload",
                format!("{error:#}"),
            );
        }
    };

    tracing::debug!(
        delivery_id = %delivery_id,
        repo = %event.repo_slug(),
        issue_number = event.issue_number,
        "accepted issue_comment delivery"
    );
    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        dispatcher.handle_event(event).await;
    });
    (
        StatusCode::ACCEPTED,
        Json(json!({"status":"accepted","delivery":delivery_id})),
    )
}

#[derive(Debug, Clone, Deserialize)]
/// Saved delivery in the `{name, id, payload}` layout written by GitHub App
/// tooling.
pub struct ReplayEnvelope {
    pub name: String,
    #[serde(default)]
    pub id: Option<Value>,
    pub payload: Value,
}

/// Feed a saved delivery through the pipeline once. Returns `Ok(None)` when
/// no file exists at `path`.
pub async fn replay_saved_delivery(
    path: &Path,
    dispatcher: &BenchDispatcher,
) -> Result<Option<DispatchOutcome>> {
    if !tokio::fs::try_exists(path)
        .await
        .with_context(|| format!("failed to inspect {}", path.display()))?
    {
        return Ok(None);
    }
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let envelope: ReplayEnvelope = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse saved delivery {}", path.display()))?;
    tracing::info!(
        path = %path.display(),
        event = %envelope.name,
        id = ?envelope.id,
        "replaying saved webhook delivery"
    );
    let outcome = match trigger_event_for_delivery(&envelope.name, envelope.payload)? {
        Some(event) => dispatcher.handle_event(event).await,
        None => DispatchOutcome::NotApplicable,
    };
    Ok(Some(outcome))
}
