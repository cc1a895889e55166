//! Test utilities for kasa-core
//!
//! Notifiers that record or fail on demand, and a mock webhook server that
//! captures what `WebhookNotifier` posts.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use rust_decimal::Decimal;
use tokio::sync::oneshot;

use crate::error::{Error, Result};
use crate::notify::Notifier;

/// Notifier that records every low-balance call
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    calls: Mutex<Vec<(Decimal, Decimal)>>,
}

impl RecordingNotifier {
    /// `(current_total, threshold)` for each notification, in order
    pub fn calls(&self) -> Vec<(Decimal, Decimal)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify_low_balance(&self, current_total: Decimal, threshold: Decimal) -> Result<()> {
        self.calls.lock().unwrap().push((current_total, threshold));
        Ok(())
    }

    async fn send_test(&self) -> Result<()> {
        Ok(())
    }
}

/// Notifier whose delivery always fails
#[derive(Debug, Default)]
pub struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    fn name(&self) -> &str {
        "failing"
    }

    async fn notify_low_balance(&self, _current_total: Decimal, _threshold: Decimal) -> Result<()> {
        Err(Error::Notification("delivery refused".to_string()))
    }

    async fn send_test(&self) -> Result<()> {
        Err(Error::Notification("delivery refused".to_string()))
    }
}

#[derive(Clone)]
struct WebhookState {
    received: Arc<Mutex<Vec<serde_json::Value>>>,
    status: StatusCode,
}

/// Local HTTP server that accepts webhook posts
pub struct MockWebhookServer {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<serde_json::Value>>>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockWebhookServer {
    /// Start a server that answers 200 OK
    pub async fn start() -> Self {
        Self::start_with_status(StatusCode::OK).await
    }

    /// Start a server that answers every post with `status`
    pub async fn start_with_status(status: StatusCode) -> Self {
        let state = WebhookState {
            received: Arc::default(),
            status,
        };
        let received = state.received.clone();

        let app = Router::new()
            .route("/hook", post(handle_hook))
            .with_state(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .unwrap();
        });

        Self {
            addr,
            received,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/hook", self.addr)
    }

    /// JSON bodies received so far
    pub fn received(&self) -> Vec<serde_json::Value> {
        self.received.lock().unwrap().clone()
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for MockWebhookServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn handle_hook(
    State(state): State<WebhookState>,
    Json(body): Json<serde_json::Value>,
) -> StatusCode {
    state.received.lock().unwrap().push(body);
    state.status
}
