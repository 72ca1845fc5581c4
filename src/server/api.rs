//! HTTP API server implementation

use axum::{
    extract::{rejection::JsonRejection, Json, Path, Query, State},
    http::StatusCode,
    response::Html,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::core::errors::ExplainerError;
use crate::core::explainer::Explainer;
use crate::core::models::{
    Definition, DrugPair, InteractionRecord, LookupOutcome, TicketState, NO_MATCH_NOTICE,
};

/// The single-page UI
const INDEX_HTML: &str = include_str!("page.html");

/// Application state
#[derive(Clone)]
pub struct AppState {
    explainer: Explainer,
}

/// Health check response
#[derive(Serialize)]
struct HealthResponse {
    status: String,
    service: String,
    version: String,
    definitions_enabled: bool,
    /// Terminology session state, absent when definitions are disabled
    #[serde(skip_serializing_if = "Option::is_none")]
    ticket_state: Option<TicketState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ticket_issued_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Serialize)]
struct PairsResponse {
    pairs: Vec<String>,
}

/// Pair selection, either `pair=A + B` or `drug1=A&drug2=B`
#[derive(Deserialize)]
pub struct InteractionQuery {
    pub pair: Option<String>,
    pub drug1: Option<String>,
    pub drug2: Option<String>,
}

impl InteractionQuery {
    fn to_pair(&self) -> Result<DrugPair, ExplainerError> {
        match (&self.pair, &self.drug1, &self.drug2) {
            (Some(pair), _, _) => DrugPair::parse(pair),
            (None, Some(d1), Some(d2)) if !d1.trim().is_empty() && !d2.trim().is_empty() => {
                Ok(DrugPair::new(d1.trim(), d2.trim()))
            }
            _ => Err(ExplainerError::InvalidInput {
                message: "provide 'pair' or both 'drug1' and 'drug2'".to_string(),
            }),
        }
    }
}

/// Stored interaction as shown to the user
#[derive(Serialize)]
pub struct RecordView {
    pub drug_1: String,
    pub drug_2: String,
    pub description: String,
    pub cui_1: Option<String>,
    pub cui_2: Option<String>,
}

impl From<&InteractionRecord> for RecordView {
    fn from(r: &InteractionRecord) -> Self {
        Self {
            drug_1: r.drug_1.clone(),
            drug_2: r.drug_2.clone(),
            description: r.description.clone(),
            cui_1: r.cui_1.clone(),
            cui_2: r.cui_2.clone(),
        }
    }
}

#[derive(Serialize)]
pub struct InteractionResponse {
    pub pair: String,
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record: Option<RecordView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

/// Simplification request: `text` for free text, `pair` for a stored description
#[derive(Deserialize)]
pub struct SimplifyRequest {
    pub text: Option<String>,
    pub pair: Option<String>,
}

#[derive(Serialize)]
pub struct SimplifyResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub simplified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Serialize)]
pub struct DefinitionResponse {
    pub cui: String,
    pub definition: Option<Definition>,
}

/// Error response
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub code: String,
}

type ApiError = (StatusCode, axum::Json<ErrorResponse>);

/// Map an explainer error onto a status and a user-facing message
fn api_error(err: ExplainerError) -> ApiError {
    let (status, code) = match &err {
        ExplainerError::EmptyInput => (StatusCode::BAD_REQUEST, "empty_input"),
        ExplainerError::InvalidInput { .. } => (StatusCode::BAD_REQUEST, "invalid_request"),
        ExplainerError::SimplifierUnavailable { .. } => {
            (StatusCode::SERVICE_UNAVAILABLE, "simplification_unavailable")
        }
        ExplainerError::TerminologyDisabled => {
            (StatusCode::SERVICE_UNAVAILABLE, "definitions_disabled")
        }
        ExplainerError::TerminologyUnreachable { .. } | ExplainerError::TerminologyAuth { .. } => {
            (StatusCode::BAD_GATEWAY, "definition_service_unreachable")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
    };

    if err.is_upstream() {
        warn!("Upstream failure: {}", err);
    } else if status.is_server_error() {
        error!("Request failed: {}", err);
    }

    (
        status,
        axum::Json(ErrorResponse {
            error: ErrorDetail {
                message: err.to_string(),
                code: code.to_string(),
            },
        }),
    )
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Health check handler
async fn health_check(State(state): State<Arc<AppState>>) -> axum::Json<HealthResponse> {
    axum::Json(HealthResponse {
        status: "ok".to_string(),
        service: "drug-explainer".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        definitions_enabled: state.explainer.definitions_enabled(),
        ticket_state: state.explainer.ticket_state(),
        ticket_issued_at: state.explainer.ticket_issued_at(),
    })
}

async fn get_pairs(State(state): State<Arc<AppState>>) -> axum::Json<PairsResponse> {
    axum::Json(PairsResponse {
        pairs: state.explainer.pairs(),
    })
}

/// Stored description and codes for a pair; never calls the model
async fn get_interaction(
    State(state): State<Arc<AppState>>,
    Query(query): Query<InteractionQuery>,
) -> Result<axum::Json<InteractionResponse>, ApiError> {
    let pair = query.to_pair().map_err(api_error)?;

    let response = match state.explainer.lookup(&pair) {
        LookupOutcome::Found(record) => InteractionResponse {
            pair: pair.to_string(),
            found: true,
            record: Some(record.into()),
            warning: None,
        },
        LookupOutcome::NoMatch => InteractionResponse {
            pair: pair.to_string(),
            found: false,
            record: None,
            warning: Some(NO_MATCH_NOTICE.to_string()),
        },
    };

    Ok(axum::Json(response))
}

/// One model call per request, on either the stored description or free text
async fn simplify(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SimplifyRequest>, JsonRejection>,
) -> Result<axum::Json<SimplifyResponse>, ApiError> {
    let Json(payload) = payload.map_err(|rejection| {
        api_error(ExplainerError::InvalidInput {
            message: rejection.body_text(),
        })
    })?;

    if let Some(pair) = payload.pair {
        let pair = DrugPair::parse(&pair).map_err(api_error)?;
        let response = match state.explainer.simplify_record(&pair).await.map_err(api_error)? {
            Some((record, simplified)) => SimplifyResponse {
                found: true,
                original: Some(record.description),
                simplified: Some(simplified),
                warning: None,
            },
            None => SimplifyResponse {
                found: false,
                original: None,
                simplified: None,
                warning: Some(NO_MATCH_NOTICE.to_string()),
            },
        };
        return Ok(axum::Json(response));
    }

    let text = payload.text.unwrap_or_default();
    let simplified = state
        .explainer
        .simplify_text(&text)
        .await
        .map_err(api_error)?;

    Ok(axum::Json(SimplifyResponse {
        found: true,
        original: Some(text),
        simplified: Some(simplified),
        warning: None,
    }))
}

async fn get_definition(
    State(state): State<Arc<AppState>>,
    Path(cui): Path<String>,
) -> Result<axum::Json<DefinitionResponse>, ApiError> {
    let definition = state.explainer.definition(&cui).await.map_err(api_error)?;
    Ok(axum::Json(DefinitionResponse { cui, definition }))
}

/// Build the router over a ready explainer
pub fn router(explainer: Explainer) -> Router {
    let state = Arc::new(AppState { explainer });

    Router::new()
        .route("/", get(index))
        .route("/health", get(health_check))
        .route("/api/pairs", get(get_pairs))
        .route("/api/interaction", get(get_interaction))
        .route("/api/simplify", post(simplify))
        .route("/api/definitions/:cui", get(get_definition))
        .with_state(state)
}

/// Run the HTTP server
pub async fn run_server(host: String, port: u16, explainer: Explainer) -> anyhow::Result<()> {
    let app = router(explainer);

    // Bind address
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::ExplainerConfig;
    use crate::core::explainer::tests::{sample_table, RecordingSimplifier};
    use crate::core::terminology::TerminologySession;
    use assert_json_diff::{assert_json_eq, assert_json_include};
    use serde_json::json;
    use std::sync::atomic::Ordering;

    async fn spawn(simplifier: Arc<RecordingSimplifier>) -> String {
        serve(Explainer::new(sample_table(), simplifier, None)).await
    }

    async fn serve(explainer: Explainer) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(explainer)).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_index_serves_page() {
        let base = spawn(Arc::new(RecordingSimplifier::default())).await;
        let body = reqwest::get(base.as_str()).await.unwrap().text().await.unwrap();
        assert!(body.contains("Drug Interaction Explainer"));
    }

    #[tokio::test]
    async fn test_health_without_definitions() {
        let base = spawn(Arc::new(RecordingSimplifier::default())).await;
        let body: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_json_eq!(
            body,
            json!({
                "status": "ok",
                "service": "drug-explainer",
                "version": env!("CARGO_PKG_VERSION"),
                "definitions_enabled": false
            })
        );
    }

    #[tokio::test]
    async fn test_health_reports_ticket_state() {
        let config = ExplainerConfig {
            umls_api_key: Some("key".to_string()),
            ..Default::default()
        };
        let session = TerminologySession::from_config(&config).unwrap();
        let explainer = Explainer::new(
            sample_table(),
            Arc::new(RecordingSimplifier::default()),
            session,
        );
        let base = serve(explainer).await;

        let body: serde_json::Value = reqwest::get(format!("{}/health", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_json_include!(
            actual: body.clone(),
            expected: json!({"definitions_enabled": true, "ticket_state": "no_ticket"})
        );
        assert!(body.get("ticket_issued_at").is_none());
    }

    #[tokio::test]
    async fn test_pairs_listing() {
        let base = spawn(Arc::new(RecordingSimplifier::default())).await;
        let body: serde_json::Value = reqwest::get(format!("{}/api/pairs", base))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_json_eq!(
            body,
            json!({"pairs": ["DrugA + DrugB", "Warfarin + Aspirin"]})
        );
    }

    #[tokio::test]
    async fn test_interaction_returns_record_verbatim_without_model_call() {
        let simplifier = Arc::new(RecordingSimplifier::default());
        let base = spawn(simplifier.clone()).await;

        let body: serde_json::Value = reqwest::Client::new()
            .get(format!("{}/api/interaction", base))
            .query(&[("pair", "DrugA + DrugB")])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_json_eq!(
            body,
            json!({
                "pair": "DrugA + DrugB",
                "found": true,
                "record": {
                    "drug_1": "DrugA",
                    "drug_2": "DrugB",
                    "description": "May increase bleeding risk",
                    "cui_1": "CUI001",
                    "cui_2": "CUI002"
                }
            })
        );
        assert_eq!(simplifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_interaction_no_match_is_warning() {
        let base = spawn(Arc::new(RecordingSimplifier::default())).await;

        let response = reqwest::Client::new()
            .get(format!("{}/api/interaction", base))
            .query(&[("drug1", "DrugB"), ("drug2", "DrugA")])
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_json_include!(
            actual: body,
            expected: json!({"found": false, "warning": NO_MATCH_NOTICE})
        );
    }

    #[tokio::test]
    async fn test_simplify_blank_text_warns_without_model_call() {
        let simplifier = Arc::new(RecordingSimplifier::default());
        let base = spawn(simplifier.clone()).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/simplify", base))
            .json(&json!({"text": "   "}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_json_include!(
            actual: body,
            expected: json!({"error": {"code": "empty_input", "message": "Please enter a valid description."}})
        );
        assert_eq!(simplifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_simplify_malformed_body_is_json_error() {
        let simplifier = Arc::new(RecordingSimplifier::default());
        let base = spawn(simplifier.clone()).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/simplify", base))
            .header("content-type", "application/json")
            .body("{not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 400);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_json_include!(
            actual: body,
            expected: json!({"error": {"code": "invalid_request"}})
        );
        assert_eq!(simplifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_simplify_pair_calls_model_once() {
        let simplifier = Arc::new(RecordingSimplifier::default());
        let base = spawn(simplifier.clone()).await;

        let body: serde_json::Value = reqwest::Client::new()
            .post(format!("{}/api/simplify", base))
            .json(&json!({"pair": "DrugA + DrugB"}))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_json_eq!(
            body,
            json!({
                "found": true,
                "original": "May increase bleeding risk",
                "simplified": "simple: May increase bleeding risk"
            })
        );
        assert_eq!(simplifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_simplify_model_failure_is_503() {
        let simplifier = Arc::new(RecordingSimplifier {
            fail: true,
            ..Default::default()
        });
        let base = spawn(simplifier).await;

        let response = reqwest::Client::new()
            .post(format!("{}/api/simplify", base))
            .json(&json!({"text": "Take with food."}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 503);

        let body: serde_json::Value = response.json().await.unwrap();
        assert_json_include!(
            actual: body,
            expected: json!({"error": {"code": "simplification_unavailable"}})
        );
    }

    #[tokio::test]
    async fn test_definition_disabled_without_key() {
        let base = spawn(Arc::new(RecordingSimplifier::default())).await;

        let response = reqwest::get(format!("{}/api/definitions/CUI001", base))
            .await
            .unwrap();
        assert_eq!(response.status(), 503);
    }
}
