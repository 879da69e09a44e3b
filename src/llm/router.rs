//! 推理后端降级选择器
//!
//! 按文本长度粗略判断复杂度，选出首选后端；首选失败后按 `[active] + fallback_models` 声明顺序
//! 依次尝试，第一个成功即返回。单个后端 panic 视为该后端失败。
//! 全部失败时返回 InferenceResult::Unavailable，从不向外抛错。

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use serde::Serialize;

use super::{InferenceBackend, MockBackend};
use crate::config::ModelsConfig;
use crate::core::fault::FaultSource;

/// 任务复杂度（只看长度）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskComplexity {
    /// 短文本：优先快速后端
    Fast,
    /// 长文本：优先 complex_model
    Complex,
}

/// 长度复杂度判断
pub struct TaskClassifier;

impl TaskClassifier {
    pub fn classify(task_text: &str, fast_threshold_chars: usize) -> TaskComplexity {
        if task_text.chars().count() < fast_threshold_chars {
            TaskComplexity::Fast
        } else {
            TaskComplexity::Complex
        }
    }
}

/// 一次选择 + 推理的结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum InferenceResult {
    Success { backend: String, output: String },
    /// 降级链上所有后端都失败
    Unavailable { attempted: Vec<String> },
}

impl InferenceResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn backend(&self) -> Option<&str> {
        match self {
            Self::Success { backend, .. } => Some(backend),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Success { output, .. } => Some(output),
            Self::Unavailable { .. } => None,
        }
    }
}

/// 推理降级选择器；模型配置只读
pub struct InferenceSelector {
    models: ModelsConfig,
    backends: HashMap<String, Arc<dyn InferenceBackend>>,
}

impl InferenceSelector {
    pub fn new(models: ModelsConfig) -> Self {
        Self {
            models,
            backends: HashMap::new(),
        }
    }

    /// 注册后端（按 backend.name() 索引）
    pub fn register(&mut self, backend: Arc<dyn InferenceBackend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    pub fn with_backend(mut self, backend: Arc<dyn InferenceBackend>) -> Self {
        self.register(backend);
        self
    }

    /// 为配置中出现的每个模型名注册一个模拟后端（无外部 API 时使用）
    pub fn simulated(models: ModelsConfig, faults: Arc<dyn FaultSource>) -> Self {
        let mut names: Vec<String> = models.chain().into_iter().map(String::from).collect();
        if let Some(ref complex) = models.complex_model {
            if !names.contains(complex) {
                names.push(complex.clone());
            }
        }
        let mut selector = Self::new(models);
        for name in names {
            selector.register(Arc::new(MockBackend::new(name, Arc::clone(&faults))));
        }
        selector
    }

    pub fn backend_count(&self) -> usize {
        self.backends.len()
    }

    /// 首选后端名称
    pub fn preferred(&self, task_text: &str) -> &str {
        match TaskClassifier::classify(task_text, self.models.fast_threshold_chars) {
            TaskComplexity::Fast => &self.models.active_model,
            TaskComplexity::Complex => self
                .models
                .complex_model
                .as_deref()
                .unwrap_or(&self.models.active_model),
        }
    }

    /// 实际尝试顺序：首选后端，然后 `[active] + fallback_models` 中尚未尝试的
    pub fn candidate_order(&self, task_text: &str) -> Vec<String> {
        let mut order: Vec<String> = vec![self.preferred(task_text).to_string()];
        for name in self.models.chain() {
            if !order.iter().any(|n| n == name) {
                order.push(name.to_string());
            }
        }
        order
    }

    /// 选择后端并推理
    pub async fn select_and_infer(&self, task_text: &str) -> InferenceResult {
        let mut attempted = Vec::new();

        for name in self.candidate_order(task_text) {
            attempted.push(name.clone());
            let Some(backend) = self.backends.get(&name) else {
                tracing::warn!(backend = %name, "Backend not registered, skipping");
                continue;
            };

            tracing::info!(backend = %name, "Attempting inference");
            match AssertUnwindSafe(backend.infer(task_text)).catch_unwind().await {
                Ok(Ok(output)) => {
                    tracing::info!(backend = %name, "Inference succeeded");
                    return InferenceResult::Success {
                        backend: name,
                        output,
                    };
                }
                Ok(Err(e)) => {
                    tracing::error!(backend = %name, error = %e, "Inference failed, falling back");
                }
                Err(_) => {
                    tracing::error!(backend = %name, "Backend panicked, falling back");
                }
            }
        }

        tracing::error!(?attempted, "All backends failed");
        InferenceResult::Unavailable { attempted }
    }
}
