//! 可观测性：日志初始化与事件上报
//!
//! 事件 `{type: "status"|"anomaly", details: {...}}` 只写不读，发送失败只记日志。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::ObservabilitySection;

/// 日志：默认 info，可通过 RUST_LOG 覆盖
pub fn init() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();
}

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Status,
    Anomaly,
}

/// 上报给外部观测服务的事件
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservabilityEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub details: Map<String, Value>,
}

impl ObservabilityEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            details: Map::new(),
        }
    }

    pub fn status(status: impl Into<String>) -> Self {
        Self::new(EventKind::Status).with("status", status.into())
    }

    pub fn anomaly(message: impl Into<String>) -> Self {
        Self::new(EventKind::Anomaly).with("message", message.into())
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details.get(key)
    }
}

/// 事件接收端；调用方视角下不会失败
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: ObservabilityEvent);
}

/// 只写日志（默认）
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

#[async_trait]
impl EventSink for TracingSink {
    async fn send(&self, event: ObservabilityEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => tracing::info!(target: "observability", %payload, "Event recorded"),
            Err(e) => tracing::warn!(target: "observability", error = %e, "Event not serializable"),
        }
    }
}

/// 以 JSON POST 上报到外部端点（Bearer 认证）
pub struct HttpEventSink {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpEventSink {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EventSink for HttpEventSink {
    async fn send(&self, event: ObservabilityEvent) {
        let mut request = self.client.post(&self.endpoint).json(&event);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }
        match request.send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::debug!(target: "observability", kind = ?event.kind, "Event sent");
            }
            Ok(resp) => {
                tracing::warn!(target: "observability", status = %resp.status(), "Event rejected by sink");
            }
            Err(e) => {
                tracing::warn!(target: "observability", error = %e, "Failed to send event");
            }
        }
    }
}

/// 内存收集（测试与本地排查用）
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<ObservabilityEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ObservabilityEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

#[async_trait]
impl EventSink for MemorySink {
    async fn send(&self, event: ObservabilityEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// 根据配置选择接收端：有 endpoint（配置或 MAILY_OBSERVABILITY_URL）走 HTTP，否则只写日志
pub fn sink_from_config(cfg: &ObservabilitySection) -> Arc<dyn EventSink> {
    let endpoint = cfg
        .endpoint
        .clone()
        .or_else(|| std::env::var("MAILY_OBSERVABILITY_URL").ok());
    let api_key = cfg
        .api_key
        .clone()
        .or_else(|| std::env::var("MAILY_OBSERVABILITY_API_KEY").ok());

    match endpoint {
        Some(endpoint) => {
            tracing::info!(%endpoint, "Observability events go to HTTP sink");
            Arc::new(HttpEventSink::new(endpoint, api_key))
        }
        None => Arc::new(TracingSink),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_schema() {
        let event = ObservabilityEvent::anomaly("Anomaly detected during health check")
            .with("error_count", 7);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "anomaly");
        assert_eq!(json["details"]["error_count"], 7);
        assert_eq!(
            json["details"]["message"],
            "Anomaly detected during health check"
        );

        let status = serde_json::to_value(ObservabilityEvent::status("remediation completed"))
            .unwrap();
        assert_eq!(
            status,
            serde_json::json!({"type": "status", "details": {"status": "remediation completed"}})
        );
    }

    #[tokio::test]
    async fn test_memory_sink_collects() {
        let sink = MemorySink::new();
        sink.send(ObservabilityEvent::status("ok")).await;
        sink.send(ObservabilityEvent::anomaly("bad")).await;
        assert_eq!(sink.events().len(), 2);
        assert_eq!(sink.count(EventKind::Anomaly), 1);
    }

    #[tokio::test]
    async fn test_http_sink_never_propagates_errors() {
        // 无监听端口：发送失败只记日志
        let sink = HttpEventSink::new("http://127.0.0.1:9/events", Some("key".to_string()));
        sink.send(ObservabilityEvent::status("ok")).await;
        assert_eq!(sink.endpoint(), "http://127.0.0.1:9/events");
    }
}
