//! HTTP API（axum）
//!
//! - POST /api/ai_tooling  {prompt}      -> {result}
//! - POST /api/orchestrate {goal}        -> {tasks, assignments}
//! - POST /api/workflow    {tasks:[..]}  -> {results}
//! - GET  /api/data                      -> 各数据连接器状态
//! - GET  /api/health                    -> "OK"
//!
//! 只有输入校验失败返回 400；任务失败、推理不可用等都以 200 + 结果内容返回。

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::AppConfig;
use crate::core::error::OrchestrationError;
use crate::core::fault::AlwaysSucceed;
use crate::core::orchestrator::{OrchestrationPlan, Orchestrator};
use crate::data::DataInfrastructure;
use crate::guardrails::Guardrails;
use crate::llm::InferenceSelector;
use crate::memory::ContextStore;
use crate::tooling::AiTooling;

/// 路由共享状态
pub struct AppState {
    pub orchestrator: Orchestrator,
    pub tooling: AiTooling,
    pub data: DataInfrastructure,
}

impl AppState {
    /// 按配置组装；推理后端使用模拟实现
    pub fn from_config(cfg: &AppConfig) -> crate::core::error::Result<Self> {
        let selector = Arc::new(InferenceSelector::simulated(
            cfg.models.clone(),
            Arc::new(AlwaysSucceed),
        ));
        Ok(Self {
            orchestrator: Orchestrator::from_config(cfg, Arc::clone(&selector)),
            tooling: AiTooling::new(selector, Guardrails::new()?, Arc::new(ContextStore::new())),
            data: DataInfrastructure::simulated(),
        })
    }
}

type ApiError = (StatusCode, Json<Value>);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({ "error": message.into() })))
}

fn map_error(err: OrchestrationError) -> ApiError {
    match err {
        OrchestrationError::Validation(message) => bad_request(message),
        other => {
            tracing::error!(error = %other, "Request failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": other.to_string() })),
            )
        }
    }
}

/// 请求体不是合法 JSON 时统一返回 400
fn parse_body<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    body.map(|Json(v)| v).map_err(|rejection| {
        tracing::warn!(error = %rejection.body_text(), "Malformed request body");
        bad_request(format!("Invalid request body: {}", rejection.body_text()))
    })
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PromptResponse {
    pub result: String,
}

#[derive(Debug, Deserialize)]
pub struct GoalRequest {
    #[serde(default)]
    pub goal: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WorkflowRequest {
    #[serde(default)]
    pub tasks: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct WorkflowResponse {
    pub results: BTreeMap<String, String>,
}

async fn api_ai_tooling(
    State(state): State<Arc<AppState>>,
    body: Result<Json<PromptRequest>, JsonRejection>,
) -> Result<Json<PromptResponse>, ApiError> {
    let req = parse_body(body)?;
    let prompt = req.prompt.unwrap_or_default();
    if prompt.trim().is_empty() {
        return Err(bad_request("No prompt provided"));
    }
    let result = state.tooling.process_prompt(&prompt).await.map_err(map_error)?;
    Ok(Json(PromptResponse { result }))
}

async fn api_orchestrate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<GoalRequest>, JsonRejection>,
) -> Result<Json<OrchestrationPlan>, ApiError> {
    let req = parse_body(body)?;
    let goal = req.goal.unwrap_or_default();
    let plan = state.orchestrator.orchestrate(&goal).await.map_err(map_error)?;
    Ok(Json(plan))
}

async fn api_workflow(
    State(state): State<Arc<AppState>>,
    body: Result<Json<WorkflowRequest>, JsonRejection>,
) -> Result<Json<WorkflowResponse>, ApiError> {
    let req = parse_body(body)?;
    let tasks = req.tasks.unwrap_or_default();
    let report = state.orchestrator.workflow(tasks.as_slice()).await.map_err(map_error)?;
    Ok(Json(WorkflowResponse {
        results: report.results(),
    }))
}

async fn api_data(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, String>> {
    Json(state.data.status_report().await)
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ai_tooling", post(api_ai_tooling))
        .route("/api/orchestrate", post(api_orchestrate))
        .route("/api/workflow", post(api_workflow))
        .route("/api/data", get(api_data))
        .route("/api/health", get(|| async { "OK" }))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request};
    use tower::ServiceExt;

    fn app() -> Router {
        let mut cfg = AppConfig::default();
        cfg.orchestration.retry_backoff_ms = 0;
        create_router(Arc::new(AppState::from_config(&cfg).unwrap()))
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let response = app()
            .oneshot(post_json("/api/ai_tooling", r#"{"prompt": ""}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "No prompt provided"}));
    }

    #[tokio::test]
    async fn test_prompt_processed() {
        let response = app()
            .oneshot(post_json("/api/ai_tooling", r#"{"prompt": "Subject line for bob@acme.com"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body["result"],
            "Inference result from deepseek-r1 for prompt: Subject line for [REDACTED_EMAIL]"
        );
    }

    #[tokio::test]
    async fn test_orchestrate() {
        let response = app()
            .oneshot(post_json("/api/orchestrate", r#"{"goal": "Increase signups"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["tasks"].as_array().unwrap().len(), 4);
        assert_eq!(body["tasks"][0]["status"], "pending");
        assert_eq!(body["assignments"]["Enforce data compliance"], "Compliance Guard");
    }

    #[tokio::test]
    async fn test_missing_goal_rejected() {
        let response = app()
            .oneshot(post_json("/api/orchestrate", "{}"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({"error": "No goal provided"}));
    }

    #[tokio::test]
    async fn test_workflow() {
        let response = app()
            .oneshot(post_json("/api/workflow", r#"{"tasks": ["Send digest", "Sync contacts"]}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["results"]["Send digest"], "Send digest completed");
        assert_eq!(body["results"]["Sync contacts"], "Sync contacts completed");
    }

    #[tokio::test]
    async fn test_empty_workflow_rejected() {
        for payload in [r#"{"tasks": []}"#, "{}"] {
            let response = app().oneshot(post_json("/api/workflow", payload)).await.unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_json(response).await, json!({"error": "No tasks provided"}));
        }
    }

    #[tokio::test]
    async fn test_malformed_json_rejected() {
        let response = app()
            .oneshot(post_json("/api/orchestrate", "{goal:"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
    }

    #[tokio::test]
    async fn test_data_status() {
        let response = app()
            .oneshot(Request::builder().uri("/api/data").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({
                "snowflake": "connected",
                "redpanda": "connected",
                "placeholder_services": "connected"
            })
        );
    }
}
