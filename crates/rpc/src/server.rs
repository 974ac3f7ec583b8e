use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::{Body, Bytes};
use axum::extract::{Path as AxumPath, State};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{Local, NaiveDate};
use churn_core::temporal::{self, DAYS_SINCE_LAST, QTD_SOL_LAST_30D};
use churn_core::{assess, ChurnAssessment, ChurnError, Clock, FeatureMap, ModelContext, ID_COLUMN};
use churn_storage::{
    count_external_history_rows, read_external_history, render_cell, CustomerStore, HistoryLog,
    StoreError, UpdateOutcome,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Stored contact-rate column bumped by the contact simulation
pub const TAXA_CONTATO_DIA: &str = "TAXA_CONTATO_DIA";

const FRONTEND_MISSING: &str = "Pasta frontend não encontrada";
const SAVE_SUCCESS: &str = "Dados do cliente atualizados e histórico registrado!";

/// Files the service reports on or serves directly
#[derive(Clone, Debug)]
pub struct ServicePaths {
    pub model_path: PathBuf,
    pub database_path: PathBuf,
    pub external_history_path: PathBuf,
    pub frontend_dir: PathBuf,
}

#[derive(Clone)]
pub struct AppState {
    pub model: Arc<ModelContext>,
    pub store: Arc<dyn CustomerStore>,
    pub history: Arc<dyn HistoryLog>,
    pub paths: ServicePaths,
    /// Snapshot date of the customer store
    pub reference_date: NaiveDate,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    fn index_file(&self) -> PathBuf {
        self.paths.frontend_dir.join("index.html")
    }
}

pub type SharedState = Arc<AppState>;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    model_loaded: bool,
    database_exists: bool,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    historico_registros: usize,
    base_clientes_existe: bool,
    modelo_existe: bool,
    features_suportadas: Vec<String>,
    model_hash: Option<String>,
}

#[derive(Debug, Serialize)]
struct SaveResponse {
    status: &'static str,
    message: &'static str,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

impl From<ChurnError> for ApiError {
    fn from(err: ChurnError) -> Self {
        match err {
            ChurnError::ModelUnavailable => Self::service_unavailable(err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => Self::not_found(err.to_string()),
            StoreError::Validation(_) => Self::bad_request(err.to_string()),
            other => Self::internal(other.to_string()),
        }
    }
}

pub async fn start_server(state: AppState, addr: &str) -> Result<()> {
    let shared = Arc::new(state);
    let app = build_router(shared);
    let listener = bind_listener(addr).await?;
    info!("Churn API listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind HTTP listener on {addr}"))
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

pub fn build_router(state: SharedState) -> Router {
    let mut router = Router::new()
        .route("/", get(serve_index))
        .route("/predict", post(handle_predict))
        .route("/predict_legacy", post(handle_predict))
        .route("/cliente/:id_cliente", get(handle_get_customer))
        .route("/atualizar_temporal/:id_cliente", get(handle_temporal))
        .route("/salvar_historico", post(handle_save_history))
        .route("/simular_contato/:id_cliente", get(handle_simulate_contact))
        .route("/historico", get(handle_list_history))
        .route("/estatisticas", get(handle_stats))
        .route("/health", get(handle_health));

    if state.paths.frontend_dir.exists() {
        info!("Serving frontend assets from {:?}", state.paths.frontend_dir);
        router = router.fallback(serve_static_assets);
    } else {
        warn!(
            "Frontend directory {:?} does not exist",
            state.paths.frontend_dir
        );
    }

    router
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn serve_index(State(state): State<SharedState>, req: Request<Body>) -> Response {
    let index_path = state.index_file();
    if !index_path.is_file() {
        warn!("Frontend index not found at {:?}", index_path);
        return ApiError::internal(FRONTEND_MISSING).into_response();
    }

    match ServeFile::new(index_path).oneshot(req).await {
        Ok(response) => response.into_response(),
        Err(err) => ApiError::internal(format!("failed to serve index: {err}")).into_response(),
    }
}

async fn serve_static_assets(State(state): State<SharedState>, req: Request<Body>) -> Response {
    let service = ServeDir::new(&state.paths.frontend_dir);
    match service.oneshot(req).await {
        Ok(response) => response.into_response(),
        Err(err) => {
            warn!("Static asset error: {}", err);
            ApiError::internal(format!("failed to serve static asset: {err}")).into_response()
        }
    }
}

/// Request body as a mapping. An empty body or a JSON value that is not an
/// object reads as an empty mapping; malformed JSON is rejected.
fn parse_payload(body: &[u8]) -> Result<FeatureMap, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(FeatureMap::new());
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|err| ApiError::bad_request(format!("invalid JSON body: {err}")))?;
    Ok(match value {
        Value::Object(map) => map,
        _ => FeatureMap::new(),
    })
}

async fn handle_predict(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<ChurnAssessment>, ApiError> {
    state.model.model()?;
    let input = parse_payload(&body)?;
    let assessment = assess(&state.model, &input)?;
    debug!(
        "Scored payload: {}% ({}), model used: {}",
        assessment.percentual_churn, assessment.nivel_risco, assessment.usou_modelo
    );
    Ok(Json(assessment))
}

async fn handle_get_customer(
    State(state): State<SharedState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Map<String, Value>>, ApiError> {
    let record = state.store.get(&id)?;
    Ok(Json(record.values(state.model.features())))
}

async fn handle_temporal(
    State(state): State<SharedState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<temporal::TemporalProjection>, ApiError> {
    let record = state.store.get(&id)?;
    let projection = temporal::project(
        record.value(DAYS_SINCE_LAST),
        record.value(QTD_SOL_LAST_30D),
        state.reference_date,
        state.clock.today(),
    );
    Ok(Json(projection))
}

async fn handle_simulate_contact(
    State(state): State<SharedState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<Value>, ApiError> {
    let record = state.store.get(&id)?;
    Ok(Json(json!({ TAXA_CONTATO_DIA: record.value(TAXA_CONTATO_DIA) + 1.0 })))
}

async fn handle_save_history(
    State(state): State<SharedState>,
    body: Bytes,
) -> Result<Json<SaveResponse>, ApiError> {
    let payload = parse_payload(&body)?;
    let id = match payload.get(ID_COLUMN) {
        None | Some(Value::Null) => {
            return Err(ApiError::bad_request(format!("{ID_COLUMN} é obrigatório")))
        }
        Some(value) => render_cell(value).trim().to_string(),
    };

    let updates: BTreeMap<String, String> = state
        .model
        .features()
        .iter()
        .filter_map(|feature| {
            payload
                .get(feature)
                .map(|value| (feature.clone(), render_cell(value)))
        })
        .collect();

    let updated = state.store.update_fields(&id, &updates);
    match &updated {
        Ok(UpdateOutcome::Updated(rows)) => {
            info!("Customer store updated for id {} ({} row(s))", id, rows)
        }
        Ok(UpdateOutcome::NotFound) => warn!("Id {} not found in customer store, skipping update", id),
        Ok(UpdateOutcome::StoreMissing) => warn!("Customer store missing, skipping update for id {}", id),
        Err(err) => warn!("Customer store update failed for id {}: {}", id, err),
    }

    let appended = state.history.append(&payload);
    match &appended {
        Ok(()) => info!("History entry recorded for id {}", id),
        Err(err) => warn!("History append failed for id {}: {}", id, err),
    }

    updated?;
    appended?;

    Ok(Json(SaveResponse {
        status: "success",
        message: SAVE_SUCCESS,
    }))
}

async fn handle_list_history(State(state): State<SharedState>) -> Result<Json<Value>, ApiError> {
    let rows = read_external_history(&state.paths.external_history_path)?;
    Ok(Json(json!({ "historico": rows })))
}

async fn handle_stats(State(state): State<SharedState>) -> Result<Json<StatsResponse>, ApiError> {
    let historico_registros = count_external_history_rows(&state.paths.external_history_path)?;
    Ok(Json(StatsResponse {
        historico_registros,
        base_clientes_existe: state.store.exists(),
        modelo_existe: state.paths.model_path.exists(),
        features_suportadas: state.model.features().to_vec(),
        model_hash: state.model.model_hash().map(str::to_string),
    }))
}

async fn handle_health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        model_loaded: state.model.is_loaded(),
        database_exists: state.store.exists(),
        timestamp: Local::now()
            .naive_local()
            .format("%Y-%m-%dT%H:%M:%S%.6f")
            .to_string(),
    })
}

impl ApiError {
    fn bad_request<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    fn not_found<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    fn internal<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    fn service_unavailable<S: Into<String>>(message: S) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}
