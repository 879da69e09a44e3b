//! 推理后端抽象
//!
//! 核心只依赖 InferenceBackend；具体提供方（托管 API、本地模型）在边界外实现。

use async_trait::async_trait;
use thiserror::Error;

/// 单个后端调用失败的原因
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// 推理后端 trait
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// 后端名称，对应配置中的 active_model / fallback_models
    fn name(&self) -> &str;

    async fn infer(&self, prompt: &str) -> Result<String, LlmError>;
}
