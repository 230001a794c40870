//! Webhook HTTP server
//!
//! Exposes `POST /webhook/` for the chat gateway and `GET /health` for
//! liveness probes. Each webhook runs the agent pipeline in its own task so a
//! slow model call can be answered with a timeout payload while the pipeline
//! still finishes and records its outcome.

use crate::agent::{AgentReply, FinanceAgent, InboundMessage};
use crate::config::ServerConfig;
use crate::error::{FinbotError, Result};
use axum::extract::{DefaultBodyLimit, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn, Instrument};
use uuid::Uuid;

/// Reply when the pipeline outlives the request timeout
pub const TIMEOUT_MESSAGE: &str =
    "El mensaje sigue en proceso. Revisa tu historial en unos momentos.";

/// Reply when the pipeline task crashed
pub const INTERNAL_ERROR_MESSAGE: &str =
    "No se pudo procesar el mensaje. Intente nuevamente o use texto.";

/// Webhook request body
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookBody {
    /// Sender identifier
    #[serde(rename = "from")]
    pub sender: String,
    /// Literal text or base64 payload
    pub content: String,
    /// Media tag
    pub mimetype: String,
    /// Attachment name, if any
    #[serde(default)]
    pub filename: Option<String>,
}

impl From<WebhookBody> for InboundMessage {
    fn from(body: WebhookBody) -> Self {
        Self {
            sender: body.sender,
            content: body.content,
            mimetype: body.mimetype,
            filename: body.filename,
        }
    }
}

/// Webhook response body: `{"response": ...}` or `{"error": ...}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WebhookResponse {
    Response(String),
    Error(String),
}

impl From<AgentReply> for WebhookResponse {
    fn from(reply: AgentReply) -> Self {
        match reply {
            AgentReply::Response(text) => Self::Response(text),
            AgentReply::Error(text) => Self::Error(text),
        }
    }
}

struct AppState {
    agent: Arc<FinanceAgent>,
    request_timeout: Duration,
}

/// Build the router (for testing without binding to a port)
pub fn router(agent: Arc<FinanceAgent>, config: &ServerConfig) -> Router {
    build_router(
        AppState {
            agent,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
        },
        config.max_body_bytes,
    )
}

fn build_router(state: AppState, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/webhook", post(webhook))
        .route("/webhook/", post(webhook))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(Arc::new(state))
}

/// Bind and serve until Ctrl-C
///
/// # Errors
///
/// Returns error if the address cannot be bound or the server fails
pub async fn serve(agent: Arc<FinanceAgent>, config: &ServerConfig) -> Result<()> {
    let app = router(agent, config);
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| FinbotError::Config(format!("Failed to bind {}: {}", addr, e)))?;

    info!("Finbot webhook listening on http://{}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "ok": true }))
}

async fn webhook(
    State(state): State<Arc<AppState>>,
    Json(body): Json<WebhookBody>,
) -> Json<WebhookResponse> {
    let span = tracing::info_span!(
        "webhook",
        request_id = %Uuid::new_v4(),
        sender = %body.sender
    );

    async move {
        info!(
            mimetype = %body.mimetype,
            filename = body.filename.as_deref().unwrap_or(""),
            "Received webhook"
        );

        let agent = Arc::clone(&state.agent);
        let message = InboundMessage::from(body);
        let task = tokio::spawn(
            async move { agent.process_message(message).await }.instrument(tracing::Span::current()),
        );

        let response = match tokio::time::timeout(state.request_timeout, task).await {
            Ok(Ok(reply)) => WebhookResponse::from(reply),
            Ok(Err(join_error)) => {
                error!("Pipeline task failed: {}", join_error);
                WebhookResponse::Error(INTERNAL_ERROR_MESSAGE.to_string())
            }
            Err(_) => {
                warn!(
                    timeout_secs = state.request_timeout.as_secs_f64(),
                    "Pipeline still running after request timeout"
                );
                WebhookResponse::Error(TIMEOUT_MESSAGE.to_string())
            }
        };

        match &response {
            WebhookResponse::Response(_) => info!("Webhook answered"),
            WebhookResponse::Error(text) => warn!(error = %text, "Webhook answered with error"),
        }
        Json(response)
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Turn;
    use crate::providers::{CompletionResponse, Provider};
    use crate::test_utils::{temp_dir, temp_store, RecordingLedger, ScriptedProvider};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct SlowProvider;

    #[async_trait]
    impl Provider for SlowProvider {
        async fn complete(&self, _system: &str, _turns: &[Turn]) -> Result<CompletionResponse> {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(CompletionResponse::new("¿Cuánto gastaste?"))
        }

        async fn transcribe_audio(&self, _audio: &[u8], _mime_type: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn extract_image_text(&self, _image: &[u8], _mime_type: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    struct PanickingProvider;

    #[async_trait]
    impl Provider for PanickingProvider {
        async fn complete(&self, _system: &str, _turns: &[Turn]) -> Result<CompletionResponse> {
            panic!("provider exploded");
        }

        async fn transcribe_audio(&self, _audio: &[u8], _mime_type: &str) -> Result<String> {
            Ok(String::new())
        }

        async fn extract_image_text(&self, _image: &[u8], _mime_type: &str) -> Result<String> {
            Ok(String::new())
        }
    }

    fn app_with(provider: Arc<dyn Provider>, dir: &tempfile::TempDir, timeout: Duration) -> Router {
        let agent = FinanceAgent::new(provider, Arc::new(RecordingLedger::new()), temp_store(dir), "S/");
        build_router(
            AppState {
                agent: Arc::new(agent),
                request_timeout: timeout,
            },
            1024 * 1024,
        )
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(resp: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health_returns_ok() {
        let dir = temp_dir();
        let app = app_with(Arc::new(ScriptedProvider::default()), &dir, Duration::from_secs(5));

        let resp = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["ok"], true);
    }

    #[tokio::test]
    async fn test_webhook_returns_response() {
        let dir = temp_dir();
        let provider = Arc::new(ScriptedProvider::new(["¿Cuánto gastaste en el taxi?"]));
        let app = app_with(provider, &dir, Duration::from_secs(5));

        let resp = app
            .oneshot(post_json(
                "/webhook/",
                serde_json::json!({"from": "51999", "content": "taxi", "mimetype": "text"}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let json = json_body(resp).await;
        assert_eq!(json["response"], "¿Cuánto gastaste en el taxi?");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_webhook_without_trailing_slash() {
        let dir = temp_dir();
        let provider = Arc::new(ScriptedProvider::new(["ok"]));
        let app = app_with(provider, &dir, Duration::from_secs(5));

        let resp = app
            .oneshot(post_json(
                "/webhook",
                serde_json::json!({"from": "51999", "content": "taxi", "mimetype": "text", "filename": ""}),
            ))
            .await
            .unwrap();

        assert_eq!(json_body(resp).await["response"], "ok");
    }

    #[tokio::test]
    async fn test_webhook_unsupported_media_is_error_payload() {
        let dir = temp_dir();
        let app = app_with(Arc::new(ScriptedProvider::default()), &dir, Duration::from_secs(5));

        let resp = app
            .oneshot(post_json(
                "/webhook/",
                serde_json::json!({"from": "51999", "content": "AAAA", "mimetype": "video/mp4"}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            json_body(resp).await["error"],
            crate::agent::core::UNSUPPORTED_MESSAGE
        );
    }

    #[tokio::test]
    async fn test_webhook_rejects_malformed_json() {
        let dir = temp_dir();
        let app = app_with(Arc::new(ScriptedProvider::default()), &dir, Duration::from_secs(5));

        let resp = app
            .oneshot(post_json("/webhook/", serde_json::json!({"content": "taxi"})))
            .await
            .unwrap();

        assert!(resp.status().is_client_error());
    }

    #[tokio::test]
    async fn test_webhook_timeout_keeps_pipeline_running() {
        let dir = temp_dir();
        let agent = Arc::new(FinanceAgent::new(
            Arc::new(SlowProvider),
            Arc::new(RecordingLedger::new()),
            temp_store(&dir),
            "S/",
        ));
        let app = build_router(
            AppState {
                agent: Arc::clone(&agent),
                request_timeout: Duration::from_millis(50),
            },
            1024 * 1024,
        );

        let resp = app
            .oneshot(post_json(
                "/webhook/",
                serde_json::json!({"from": "51999", "content": "taxi", "mimetype": "text"}),
            ))
            .await
            .unwrap();
        assert_eq!(json_body(resp).await["error"], TIMEOUT_MESSAGE);

        // The detached pipeline still records the exchange.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert_eq!(agent.store().turn_count("51999").unwrap(), 2);
    }

    #[tokio::test]
    async fn test_webhook_panic_becomes_error_payload() {
        let dir = temp_dir();
        let app = app_with(Arc::new(PanickingProvider), &dir, Duration::from_secs(5));

        let resp = app
            .oneshot(post_json(
                "/webhook/",
                serde_json::json!({"from": "51999", "content": "taxi", "mimetype": "text"}),
            ))
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(json_body(resp).await["error"], INTERNAL_ERROR_MESSAGE);
    }

    #[test]
    fn test_response_serialization() {
        let json = serde_json::to_value(WebhookResponse::Response("hola".into())).unwrap();
        assert_eq!(json, serde_json::json!({"response": "hola"}));
        let json = serde_json::to_value(WebhookResponse::Error("mal".into())).unwrap();
        assert_eq!(json, serde_json::json!({"error": "mal"}));
    }
}
