//! Model wrapper: text simplification behind a single async trait

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::core::config::ExplainerConfig;
use crate::core::errors::{ExplainerError, Result};

/// A pretrained text-to-text model that rewrites text in simpler language.
///
/// The model is opaque; any service that maps text to a simplified
/// rewrite satisfies the contract.
#[async_trait]
pub trait Simplifier: Send + Sync {
    async fn simplify(&self, text: &str) -> Result<String>;
}

/// Simplifier backed by a hosted sequence-to-sequence inference endpoint
#[derive(Debug, Clone)]
pub struct HttpSimplifier {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    prefix: String,
    max_new_tokens: u32,
    max_retries: u32,
    retry_delay_ms: u64,
}

impl HttpSimplifier {
    /// Create a new simplifier from configuration
    pub fn new(config: &ExplainerConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .pool_idle_timeout(Some(Duration::from_secs(30)))
            .build()?;

        info!("Simplifier endpoint: {}", config.simplifier_endpoint);

        Ok(Self {
            client,
            endpoint: config.simplifier_endpoint.clone(),
            api_key: config.simplifier_api_key.clone(),
            prefix: config.simplifier_prefix.clone(),
            max_new_tokens: config.simplifier_max_new_tokens,
            max_retries: config.simplifier_max_retries,
            retry_delay_ms: config.retry_delay_ms,
        })
    }

    /// Send one generation request
    async fn send_request(&self, text: &str) -> Result<String> {
        let body = serde_json::json!({
            "inputs": format!("{}{}", self.prefix, text),
            "parameters": {
                "max_new_tokens": self.max_new_tokens
            }
        });

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ExplainerError::SimplifierUnavailable {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ExplainerError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        let json: serde_json::Value =
            response
                .json()
                .await
                .map_err(|e| ExplainerError::SimplifierUnavailable {
                    message: format!("unreadable response: {}", e),
                })?;

        extract_generated_text(&json).ok_or_else(|| ExplainerError::SimplifierUnavailable {
            message: "no generated text in response".to_string(),
        })
    }
}

#[async_trait]
impl Simplifier for HttpSimplifier {
    async fn simplify(&self, text: &str) -> Result<String> {
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = backoff_delay(self.retry_delay_ms, attempt);
                debug!("Model still loading, retry {} in {}ms", attempt, delay);
                sleep(Duration::from_millis(delay)).await;
            }

            match self.send_request(text).await {
                Ok(simplified) => {
                    if attempt > 0 {
                        info!("Simplified after {} retries", attempt);
                    }
                    return Ok(simplified);
                }
                // 503 means the model is still being loaded
                Err(ExplainerError::ApiError { status: 503, .. }) if attempt < self.max_retries => {
                    attempt += 1;
                }
                Err(ExplainerError::ApiError { status, message }) => {
                    warn!("Simplifier returned {}: {}", status, message);
                    return Err(ExplainerError::SimplifierUnavailable {
                        message: format!("model service returned {}", status),
                    });
                }
                Err(e) => {
                    warn!("Simplification failed: {}", e);
                    return Err(e);
                }
            }
        }
    }
}

/// Exponential backoff before retry `attempt`, clamped instead of overflowing
fn backoff_delay(base_ms: u64, attempt: u32) -> u64 {
    base_ms.saturating_mul(2_u64.saturating_pow(attempt.saturating_sub(1)))
}

/// Pull the generated text out of the common inference response shapes:
/// `[{"generated_text": ..}]`, `{"generated_text": ..}` or `summary_text`.
fn extract_generated_text(json: &serde_json::Value) -> Option<String> {
    let item = match json {
        serde_json::Value::Array(items) => items.first()?,
        other => other,
    };

    item.get("generated_text")
        .or_else(|| item.get("summary_text"))
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::post, Json, Router};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_backoff_delay_doubles_and_saturates() {
        assert_eq!(backoff_delay(1000, 1), 1000);
        assert_eq!(backoff_delay(1000, 2), 2000);
        assert_eq!(backoff_delay(1000, 4), 8000);
        assert_eq!(backoff_delay(1000, 64), u64::MAX);
        assert_eq!(backoff_delay(u64::MAX, 3), u64::MAX);
        assert_eq!(backoff_delay(0, 100), 0);
    }

    #[test]
    fn test_extract_generated_text_shapes() {
        let array = serde_json::json!([{"generated_text": " Simple words. "}]);
        assert_eq!(extract_generated_text(&array).as_deref(), Some("Simple words."));

        let object = serde_json::json!({"generated_text": "Plain"});
        assert_eq!(extract_generated_text(&object).as_deref(), Some("Plain"));

        let summary = serde_json::json!([{"summary_text": "Short"}]);
        assert_eq!(extract_generated_text(&summary).as_deref(), Some("Short"));

        assert!(extract_generated_text(&serde_json::json!([])).is_none());
        assert!(extract_generated_text(&serde_json::json!({"error": "x"})).is_none());
    }

    async fn spawn(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/generate", addr)
    }

    fn config(endpoint: String) -> ExplainerConfig {
        ExplainerConfig {
            simplifier_endpoint: endpoint,
            retry_delay_ms: 1,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_simplify_sends_prefixed_input() {
        let app = Router::new().route(
            "/generate",
            post(|Json(body): Json<serde_json::Value>| async move {
                let input = body["inputs"].as_str().unwrap_or_default().to_string();
                Json(serde_json::json!([{ "generated_text": input.to_uppercase() }]))
            }),
        );
        let simplifier = HttpSimplifier::new(&config(spawn(app).await)).unwrap();

        let out = simplifier.simplify("may increase risk").await.unwrap();
        assert_eq!(out, "SIMPLIFY: MAY INCREASE RISK");
    }

    #[tokio::test]
    async fn test_simplify_retries_while_model_loads() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let app = Router::new().route(
            "/generate",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        (StatusCode::SERVICE_UNAVAILABLE, Json(serde_json::json!({"error": "loading"})))
                    } else {
                        (StatusCode::OK, Json(serde_json::json!([{"generated_text": "ok"}])))
                    }
                }
            }),
        );
        let simplifier = HttpSimplifier::new(&config(spawn(app).await)).unwrap();

        assert_eq!(simplifier.simplify("text").await.unwrap(), "ok");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_simplify_classifies_server_error() {
        let app = Router::new().route(
            "/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
        );
        let simplifier = HttpSimplifier::new(&config(spawn(app).await)).unwrap();

        let err = simplifier.simplify("text").await.unwrap_err();
        assert!(matches!(err, ExplainerError::SimplifierUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_simplify_unreachable_service() {
        let simplifier =
            HttpSimplifier::new(&config("http://127.0.0.1:1/generate".to_string())).unwrap();

        let err = simplifier.simplify("text").await.unwrap_err();
        assert!(matches!(err, ExplainerError::SimplifierUnavailable { .. }));
    }
}
