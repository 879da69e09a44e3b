//! 模拟推理后端（用于测试与 CLI 演示，无需 API）
//!
//! 成功时返回 "Inference result from {name} for prompt: {prompt}"；是否成功由注入的 FaultSource 决定。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::fault::{AlwaysSucceed, FaultSource};
use crate::llm::{InferenceBackend, LlmError};

/// 模拟后端
pub struct MockBackend {
    name: String,
    faults: Arc<dyn FaultSource>,
    calls: AtomicUsize,
}

impl MockBackend {
    pub fn new(name: impl Into<String>, faults: Arc<dyn FaultSource>) -> Self {
        Self {
            name: name.into(),
            faults,
            calls: AtomicUsize::new(0),
        }
    }

    /// 永远成功的后端
    pub fn healthy(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(AlwaysSucceed))
    }

    /// 已被调用的次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn infer(&self, prompt: &str) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.faults.next_ok() {
            Ok(format!("Inference result from {} for prompt: {}", self.name, prompt))
        } else {
            Err(LlmError::Unavailable(format!("{} failed (simulated)", self.name)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fault::AlwaysFail;

    #[tokio::test]
    async fn test_mock_backend_counts_calls() {
        let ok = MockBackend::healthy("A");
        assert_eq!(
            ok.infer("hi").await.unwrap(),
            "Inference result from A for prompt: hi"
        );

        let bad = MockBackend::new("B", Arc::new(AlwaysFail));
        assert!(bad.infer("hi").await.is_err());
        assert!(bad.infer("hi").await.is_err());
        assert_eq!(ok.calls(), 1);
        assert_eq!(bad.calls(), 2);
    }
}
