use anyhow::{Context, Result};
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use minijinja::{context, Environment};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

use crate::config::HttpConfig;
use crate::error::AppError;
use crate::metadata_store::{MetadataStore, QrRecord};
use crate::object_store::ObjectStore;
use crate::qr;

/// Application state shared across handlers
///
/// Clients are constructed once at startup and injected here; handlers hold
/// no other state.
#[derive(Clone)]
pub struct AppState {
    pub object_store: Arc<ObjectStore>,
    pub metadata_store: Arc<MetadataStore>,
    templates: Arc<Environment<'static>>,
}

impl AppState {
    pub fn new(object_store: Arc<ObjectStore>, metadata_store: Arc<MetadataStore>) -> Self {
        let mut templates = Environment::new();
        templates
            .add_template("index.html", include_str!("../templates/index.html"))
            .expect("embedded index template is valid");

        Self {
            object_store,
            metadata_store,
            templates: Arc::new(templates),
        }
    }
}

/// Form body for the generation route
#[derive(Debug, Deserialize)]
pub struct GenerateForm {
    #[serde(default)]
    pub dato: String,
}

/// Row handed to the history template
#[derive(Debug, Serialize)]
struct HistoryRow {
    dato: String,
    image_url: String,
    created_at: String,
}

impl HistoryRow {
    fn from_record(record: QrRecord, object_store: &ObjectStore) -> Self {
        Self {
            image_url: object_store.display_url(&record.filename),
            dato: record.dato,
            created_at: record
                .created_at
                .format("%Y-%m-%d %H:%M:%S UTC")
                .to_string(),
        }
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(history_page))
        .route("/generar", post(generate))
        .route("/get_qr/:name", get(get_qr))
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "qr-archive"
    }))
}

/// History page: ping the database, list records (empty on failure), render
#[instrument(skip(state))]
async fn history_page(State(state): State<AppState>) -> Response {
    let (records, db_status, db_status_class) = match state.metadata_store.ping().await {
        Ok(()) => match state.metadata_store.list_all().await {
            Ok(records) => (records, "Connected", "success"),
            Err(e) => {
                error!(error = %e, "History query failed");
                (Vec::new(), "History unavailable", "error")
            }
        },
        Err(e) => {
            warn!(error = %e, "Database unreachable");
            (Vec::new(), "Connection failed", "error")
        }
    };

    let rows: Vec<HistoryRow> = records
        .into_iter()
        .map(|record| HistoryRow::from_record(record, &state.object_store))
        .collect();

    let template = state
        .templates
        .get_template("index.html")
        .expect("index template is registered");

    match template.render(context! { records => rows, db_status, db_status_class }) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Template render failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Generation route: encode, upload, record, redirect
///
/// Empty input after trimming is a no-op redirect. Failures are logged and
/// still redirect; the browser never sees an error page from this route.
#[instrument(skip(state, form))]
async fn generate(State(state): State<AppState>, Form(form): Form<GenerateForm>) -> Redirect {
    let dato = form.dato.trim();
    if dato.is_empty() {
        return Redirect::to("/");
    }

    if let Err(e) = generate_and_record(&state, dato).await {
        error!(error = %e, "Generation failed");
    }

    Redirect::to("/")
}

/// Encode the payload, upload the image, then insert the record.
///
/// A record is created if and only if the upload succeeded; an insert
/// failure after a successful upload leaves an orphaned image but no record.
async fn generate_and_record(state: &AppState, dato: &str) -> crate::error::Result<()> {
    let png = qr::encode_png(dato)?;

    let now = Utc::now();
    let key = state.object_store.generate_object_key(now);

    if let Err(e) = state.object_store.upload_png(&key, png).await {
        metrics::counter!("qr.upload_failures").increment(1);
        return Err(e);
    }

    state
        .metadata_store
        .insert(QrRecord {
            dato: dato.to_string(),
            filename: key.clone(),
            created_at: now,
        })
        .await?;

    metrics::counter!("qr.generated").increment(1);
    info!(key = %key, "QR code generated");
    Ok(())
}

/// Image proxy: stream stored bytes back with the PNG content type
///
/// 404 when the object is absent, 500 on any other store failure.
#[instrument(skip(state))]
async fn get_qr(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> std::result::Result<Response, AppError> {
    // Route captures a single segment; reject anything that would escape the
    // configured prefix after URL decoding.
    if name.contains('/') || name.contains("..") {
        return Err(AppError::NotFound(format!("object '{name}'")));
    }

    let key = format!("{}/{}", state.object_store.key_prefix(), name);
    let bytes = state.object_store.fetch(&key).await?;

    metrics::counter!("qr.proxied_fetches").increment(1);

    Ok(([(header::CONTENT_TYPE, "image/png")], bytes).into_response())
}

/// Start the HTTP server
pub async fn serve(state: AppState, config: &HttpConfig) -> Result<()> {
    let router = create_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router).await.context("HTTP server error")?;

    Ok(())
}
