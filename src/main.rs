mod config;
mod models;
mod services;
#[cfg(test)]
mod test_support;

use anyhow::Context;
use axum::{
    Form, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, Json, Redirect},
    routing::{get, post},
};
use config::Config;
use models::{Mode, Outcome, PageRange, PdfFile};
use serde::{Deserialize, Serialize};
use services::backend::BackendClient;
use services::session::{Rejection, Session, Tone};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, fmt};
use uuid::Uuid;

#[derive(Clone)]
struct AppState {
    session: Arc<Mutex<Session>>,
    backend: Arc<BackendClient>,
}

impl AppState {
    fn new(config: &Config) -> Self {
        AppState {
            session: Arc::new(Mutex::new(Session::new(config.default_range))),
            backend: Arc::new(BackendClient::new(config.backend.clone())),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("loading configuration")?;
    let state = AppState::new(&config);
    let app = router(state, config.max_upload_bytes);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    tracing::info!(backend = %config.backend.base_url, "Listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/select", post(select_file))
        .route("/submit", post(submit))
        .route("/api/status", get(status))
        .route("/health", get(health_check))
        .route("/backend/health", get(backend_health))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_upload_bytes))
                .layer(
                    CorsLayer::new()
                        .allow_origin(tower_http::cors::Any)
                        .allow_methods(tower_http::cors::AllowMethods::any())
                        .allow_headers(tower_http::cors::AllowHeaders::any()),
                ),
        )
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let session = state.session.lock().await;
    Html(services::page::render(&session))
}

async fn health_check() -> &'static str {
    "OK"
}

async fn backend_health(State(state): State<AppState>) -> (StatusCode, String) {
    match state.backend.probe().await {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => {
            tracing::warn!(error = %e, "backend probe failed");
            (StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

async fn select_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, StatusCode> {
    let mut picked = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() == Some("file") {
            let name = field.file_name().unwrap_or("").to_string();
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            // Browsers send an empty unnamed part when nothing was picked.
            if !(name.is_empty() && data.is_empty()) {
                picked = Some(PdfFile::new(name, content_type, data.to_vec()));
            }
        }
    }

    let mut session = state.session.lock().await;
    let selected = match picked {
        Some(file) => session.select_file(file),
        None => session.clear_selection(),
    };
    if let Err(rejection) = selected {
        tracing::debug!(reason = %rejection, "selection not accepted");
    }
    Ok(Redirect::to("/"))
}

#[derive(Debug, Deserialize)]
struct SubmitForm {
    #[serde(default)]
    mode: Mode,
    #[serde(default)]
    start: String,
    #[serde(default)]
    end: String,
}

fn parse_bound(field: &'static str, raw: &str) -> Result<u32, Rejection> {
    raw.trim().parse().map_err(|_| Rejection::InvalidBound {
        field,
        raw: raw.to_string(),
    })
}

async fn submit(State(state): State<AppState>, Form(form): Form<SubmitForm>) -> Redirect {
    let job = {
        let mut session = state.session.lock().await;
        let range = parse_bound("Start", &form.start)
            .and_then(|start| Ok(PageRange::new(start, parse_bound("End", &form.end)?)));
        let range = match range {
            Ok(range) => range,
            Err(rejection) => {
                session.refuse(rejection);
                return Redirect::to("/");
            }
        };
        session.set_mode(form.mode);
        session.set_range(range);
        match session.begin_submit() {
            Ok(job) => job,
            Err(_) => return Redirect::to("/"),
        }
    };

    // Detached from the request so a dropped connection cannot leave the session in flight.
    let session = state.session.clone();
    let backend = state.backend.clone();
    tokio::spawn(async move {
        let result = backend.submit(&job).await;
        session.lock().await.finish(job.attempt, result);
    });

    Redirect::to("/")
}

#[derive(Serialize)]
struct StatusView {
    tone: Tone,
    message: String,
    in_flight: bool,
    attempt: Option<Uuid>,
    file: Option<String>,
    mode: Mode,
    range: PageRange,
    elapsed_secs: Option<f64>,
    outcome: Option<Outcome>,
}

async fn status(State(state): State<AppState>) -> Json<StatusView> {
    let session = state.session.lock().await;
    let status = session.status();
    Json(StatusView {
        tone: status.tone(),
        message: status.message(),
        in_flight: status.is_in_flight(),
        attempt: status.report().map(|report| report.attempt),
        file: session.selection().map(|file| file.name.clone()),
        mode: session.mode(),
        range: session.range(),
        elapsed_secs: status.elapsed().map(|elapsed| elapsed.as_secs_f64()),
        outcome: status.report().map(|report| report.outcome.clone()),
    })
}
