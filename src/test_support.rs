//! In-process stand-in for the PDF backend, used by the async tests.

use crate::config::BackendConfig;
use axum::{
    Router,
    extract::{Multipart, State},
    http::{StatusCode, Uri},
    routing::get,
};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::sync::Notify;

#[derive(Debug, Clone, Default)]
pub struct SeenRequest {
    pub path: String,
    pub fields: Vec<(String, String)>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub file_len: usize,
}

impl SeenRequest {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Clone)]
struct FakeState {
    status: StatusCode,
    body: String,
    gate: Option<Arc<Notify>>,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

pub struct FakeBackend {
    pub base_url: String,
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl FakeBackend {
    /// Answers every POST with `status` and `body`.
    pub async fn start(status: StatusCode, body: impl Into<String>) -> Self {
        Self::spawn(status, body.into(), None).await
    }

    /// Like `start`, but each reply waits for a permit on `gate`.
    pub async fn gated(status: StatusCode, body: impl Into<String>, gate: Arc<Notify>) -> Self {
        Self::spawn(status, body.into(), Some(gate)).await
    }

    async fn spawn(status: StatusCode, body: String, gate: Option<Arc<Notify>>) -> Self {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let state = FakeState {
            status,
            body,
            gate,
            seen: seen.clone(),
        };
        let app = Router::new()
            .route("/", get(root))
            .fallback(record)
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        FakeBackend {
            base_url: format!("http://{addr}"),
            seen,
        }
    }

    pub fn config(&self) -> BackendConfig {
        BackendConfig {
            base_url: self.base_url.clone(),
            ..BackendConfig::default()
        }
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }
}

async fn root() -> &'static str {
    "\"server is up\""
}

async fn record(
    State(state): State<FakeState>,
    uri: Uri,
    mut multipart: Multipart,
) -> (StatusCode, String) {
    let mut seen = SeenRequest {
        path: uri.path().to_string(),
        ..SeenRequest::default()
    };

    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or("").to_string();
        if name == "file" {
            seen.file_name = field.file_name().map(str::to_string);
            seen.file_type = field.content_type().map(str::to_string);
            seen.file_len = field.bytes().await.unwrap().len();
        } else {
            let value = field.text().await.unwrap();
            seen.fields.push((name, value));
        }
    }
    state.seen.lock().unwrap().push(seen);

    if let Some(gate) = &state.gate {
        gate.notified().await;
    }

    (state.status, state.body.clone())
}
