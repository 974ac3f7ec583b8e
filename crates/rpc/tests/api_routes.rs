//! Route-level tests driving the router in-process.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::NaiveDate;
use churn_core::gbdt::{sigmoid, GbdtClassifier, Node, Tree};
use churn_core::rules::to_percentage;
use churn_core::{FixedClock, ModelContext};
use churn_rpc::{build_router, AppState, ServicePaths};
use churn_storage::{CsvCustomerStore, CsvHistoryLog};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

const FEATURES: [&str; 3] = ["DAYS_SINCE_LAST", "QTD_SOL_LAST_30D", "TAXA_CONTATO_DIA"];

const STORE: &str = "ID_CLIENTE,DAYS_SINCE_LAST,QTD_SOL_LAST_30D,TAXA_CONTATO_DIA,NOME\n\
                     123.0,10,2,\"0,5\",Alfa\n\
                     0456,28,3,1,Beta\n";

/// Stump on recency: silent for more than 90 days pushes the raw score up.
fn test_model() -> ModelContext {
    let tree = Tree::new(vec![
        Node::internal(0, 0, 90.0, 1, 2),
        Node::leaf(1, -2.0),
        Node::leaf(2, 2.0),
    ]);
    let model = GbdtClassifier::new(vec![tree], 0.0, 1.0, Vec::new());
    let features = FEATURES.iter().map(|s| s.to_string()).collect();
    ModelContext::from_parts(model, features).unwrap()
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 11, 5).unwrap()
}

fn state(dir: &Path, model: ModelContext) -> AppState {
    let database_path = dir.join("base_clientes.csv");
    AppState {
        model: Arc::new(model),
        store: Arc::new(CsvCustomerStore::new(&database_path)),
        history: Arc::new(CsvHistoryLog::new(dir.join("historico_analises.csv"))),
        paths: ServicePaths {
            model_path: dir.join("models").join("churn_model.json"),
            database_path,
            external_history_path: dir.join("historico.csv"),
            frontend_dir: dir.join("frontend"),
        },
        reference_date: NaiveDate::from_ymd_opt(2025, 10, 31).unwrap(),
        clock: Arc::new(FixedClock(today())),
    }
}

fn router_with_store(dir: &TempDir) -> Router {
    fs::write(dir.path().join("base_clientes.csv"), STORE).unwrap();
    build_router(Arc::new(state(dir.path(), test_model())))
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Value) {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

async fn post(router: &Router, uri: &str, body: impl Into<Body>) -> (StatusCode, Value) {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap();
    send(router, request).await
}

fn rounded_percent(raw_score: f64) -> f64 {
    to_percentage(sigmoid(raw_score))
}

#[tokio::test]
async fn predict_scores_active_customer_on_both_routes() {
    let dir = TempDir::new().unwrap();
    let router = router_with_store(&dir);
    let payload = json!({"DAYS_SINCE_LAST": 10, "QTD_SOL_LAST_30D": "1", "EXTRA": "ignored"});

    let (status, body) = post(&router, "/predict", payload.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["percentual_churn"], json!(rounded_percent(-2.0)));
    assert_eq!(body["nivel_risco"], json!("BAIXO"));
    assert_eq!(body["usou_modelo"], json!(true));
    assert!(body.get("motivo").is_none());

    let (status, legacy) = post(&router, "/predict_legacy", payload.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(legacy, body);

    let (_, stale) = post(&router, "/predict", json!({"DAYS_SINCE_LAST": "120,5"}).to_string()).await;
    assert_eq!(stale["percentual_churn"], json!(rounded_percent(2.0)));
    assert_eq!(stale["nivel_risco"], json!("ALTO"));
}

#[tokio::test]
async fn predict_applies_inactivity_rules() {
    let dir = TempDir::new().unwrap();
    let router = router_with_store(&dir);

    for body in ["", "[]", r#"{"DAYS_SINCE_LAST": 0, "QTD_SOL_LAST_30D": "0,0"}"#] {
        let (status, result) = post(&router, "/predict", body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(result["percentual_churn"], json!(0.0));
        assert_eq!(result["usou_modelo"], json!(false));
        assert_eq!(
            result["motivo"],
            json!("Cliente inativo (features zeradas por regra de negócio)")
        );
    }

    let (_, result) = post(&router, "/predict", r#"{"DAYS_SINCE_LAST": 400, "QTD_SOL_LAST_30D": 2}"#).await;
    assert_eq!(result["nivel_risco"], json!("BAIXO"));
    assert_eq!(result["usou_modelo"], json!(false));
    assert_eq!(
        result["motivo"],
        json!("Cliente inativo há mais de 1 ano (regra de negócio)")
    );
}

#[tokio::test]
async fn predict_rejects_malformed_json() {
    let dir = TempDir::new().unwrap();
    let router = router_with_store(&dir);
    let (status, body) = post(&router, "/predict", "{oops").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn missing_model_degrades_service() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("base_clientes.csv"), STORE).unwrap();
    let unloaded = ModelContext::load(dir.path().join("absent.json")).unwrap();
    let router = build_router(Arc::new(state(dir.path(), unloaded)));

    let (status, body) = post(&router, "/predict", r#"{"DAYS_SINCE_LAST": 10}"#).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!({"error": "Modelo não carregado"}));

    let (status, body) = post(&router, "/predict_legacy", "{oops").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], json!("Modelo não carregado"));

    let (status, health) = get(&router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], json!("healthy"));
    assert_eq!(health["model_loaded"], json!(false));
    assert_eq!(health["database_exists"], json!(true));
    assert!(health["timestamp"].is_string());

    let (_, stats) = get(&router, "/estatisticas").await;
    assert_eq!(stats["modelo_existe"], json!(false));
    assert_eq!(stats["features_suportadas"], json!([]));
    assert_eq!(stats["model_hash"], Value::Null);
}

#[tokio::test]
async fn customer_lookup_normalizes_ids() {
    let dir = TempDir::new().unwrap();
    let router = router_with_store(&dir);

    for uri in ["/cliente/123", "/cliente/123.0", "/cliente/%20123%20"] {
        let (status, body) = get(&router, uri).await;
        assert_eq!(status, StatusCode::OK, "uri = {uri}");
        assert_eq!(
            body,
            json!({"DAYS_SINCE_LAST": 10.0, "QTD_SOL_LAST_30D": 2.0, "TAXA_CONTATO_DIA": 0.5})
        );
    }

    let (status, body) = get(&router, "/cliente/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Cliente não encontrado"}));
}

#[tokio::test]
async fn customer_lookup_without_store_is_server_error() {
    let dir = TempDir::new().unwrap();
    let router = build_router(Arc::new(state(dir.path(), test_model())));
    let (status, body) = get(&router, "/cliente/123").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn temporal_projection_uses_reference_date() {
    let dir = TempDir::new().unwrap();
    let router = router_with_store(&dir);

    let (status, body) = get(&router, "/atualizar_temporal/123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"DAYS_SINCE_LAST": 15, "QTD_SOL_LAST_30D": 2}));

    // 28 + 5 days crosses the 30-day window
    let (_, body) = get(&router, "/atualizar_temporal/456").await;
    assert_eq!(body, json!({"DAYS_SINCE_LAST": 33, "QTD_SOL_LAST_30D": 0}));

    let (status, _) = get(&router, "/atualizar_temporal/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // projection is not written back
    let (_, stored) = get(&router, "/cliente/123").await;
    assert_eq!(stored["DAYS_SINCE_LAST"], json!(10.0));
}

#[tokio::test]
async fn save_history_updates_store_and_appends_log() {
    let dir = TempDir::new().unwrap();
    let router = router_with_store(&dir);

    let payload = json!({
        "ID_CLIENTE": "123.0",
        "DAYS_SINCE_LAST": 0,
        "QTD_SOL_LAST_30D": "5",
        "percentual_churn": 11.92,
    });
    let (status, body) = post(&router, "/salvar_historico", payload.to_string()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "status": "success",
            "message": "Dados do cliente atualizados e histórico registrado!"
        })
    );

    let (_, stored) = get(&router, "/cliente/123").await;
    assert_eq!(stored["DAYS_SINCE_LAST"], json!(0.0));
    assert_eq!(stored["QTD_SOL_LAST_30D"], json!(5.0));
    assert_eq!(stored["TAXA_CONTATO_DIA"], json!(0.5));

    // non-feature keys never reach the store
    let store_text = fs::read_to_string(dir.path().join("base_clientes.csv")).unwrap();
    assert!(!store_text.contains("percentual_churn"));
    assert!(store_text.contains("Alfa"));

    let log = fs::read_to_string(dir.path().join("historico_analises.csv")).unwrap();
    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(
        lines,
        vec![
            "ID_CLIENTE,DAYS_SINCE_LAST,QTD_SOL_LAST_30D,percentual_churn",
            "123.0,0,5,11.92",
        ]
    );
}

#[tokio::test]
async fn save_history_for_unknown_customer_still_logs() {
    let dir = TempDir::new().unwrap();
    let router = router_with_store(&dir);

    let (status, _) = post(
        &router,
        "/salvar_historico",
        json!({"ID_CLIENTE": 999, "DAYS_SINCE_LAST": 1}).to_string(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(dir.path().join("historico_analises.csv").exists());
}

#[tokio::test]
async fn save_history_requires_customer_id() {
    let dir = TempDir::new().unwrap();
    let router = router_with_store(&dir);

    let (status, body) = post(&router, "/salvar_historico", r#"{"DAYS_SINCE_LAST": 1}"#).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("ID_CLIENTE"));
    assert!(!dir.path().join("historico_analises.csv").exists());
}

#[tokio::test]
async fn simulate_contact_increments_rate() {
    let dir = TempDir::new().unwrap();
    let router = router_with_store(&dir);

    let (status, body) = get(&router, "/simular_contato/123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"TAXA_CONTATO_DIA": 1.5}));

    let (status, _) = get(&router, "/simular_contato/999").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn external_history_and_stats() {
    let dir = TempDir::new().unwrap();
    let router = router_with_store(&dir);

    let (status, body) = get(&router, "/historico").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"historico": []}));

    let (_, stats) = get(&router, "/estatisticas").await;
    assert_eq!(stats["historico_registros"], json!(0));

    fs::write(
        dir.path().join("historico.csv"),
        "\u{feff}ID_CLIENTE;DATA;RISCO\n123;2025-11-01;BAIXO\n456;2025-11-02;ALTO\n",
    )
    .unwrap();

    let (_, body) = get(&router, "/historico").await;
    assert_eq!(
        body["historico"],
        json!([
            {"ID_CLIENTE": "123", "DATA": "2025-11-01", "RISCO": "BAIXO"},
            {"ID_CLIENTE": "456", "DATA": "2025-11-02", "RISCO": "ALTO"},
        ])
    );

    let (status, stats) = get(&router, "/estatisticas").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stats["historico_registros"], json!(2));
    assert_eq!(stats["base_clientes_existe"], json!(true));
    assert_eq!(stats["modelo_existe"], json!(false));
    assert_eq!(stats["features_suportadas"], json!(FEATURES));
}

#[tokio::test]
async fn index_requires_frontend() {
    let dir = TempDir::new().unwrap();
    let router = router_with_store(&dir);
    let (status, body) = get(&router, "/").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body, json!({"error": "Pasta frontend não encontrada"}));

    let frontend = dir.path().join("frontend");
    fs::create_dir_all(&frontend).unwrap();
    fs::write(frontend.join("index.html"), "<html>churn</html>").unwrap();
    let router = router_with_store(&dir);

    let response = router
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"<html>churn</html>");
}
