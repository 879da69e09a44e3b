//! AI 工具入口：护栏校验 -> 推理降级链 -> 记录上下文 -> PII 脱敏

use std::sync::Arc;

use crate::core::error::{OrchestrationError, Result};
use crate::guardrails::Guardrails;
use crate::llm::{InferenceResult, InferenceSelector};
use crate::memory::ContextStore;

/// 护栏拒绝时的固定返回
pub const ETHICS_REJECTION: &str = "Prompt failed ethical validation.";
/// 所有后端都失败时的固定返回
pub const INFERENCE_UNAVAILABLE: &str = "Inference failed: All models unavailable.";
/// 最近一次推理结果在上下文存储中的键
pub const LAST_INFERENCE_KEY: &str = "last_inference";

pub struct AiTooling {
    selector: Arc<InferenceSelector>,
    guardrails: Guardrails,
    context: Arc<ContextStore>,
}

impl AiTooling {
    pub fn new(selector: Arc<InferenceSelector>, guardrails: Guardrails, context: Arc<ContextStore>) -> Self {
        Self {
            selector,
            guardrails,
            context,
        }
    }

    pub fn context(&self) -> &Arc<ContextStore> {
        &self.context
    }

    /// 处理一条提示词
    ///
    /// 空白提示词返回 Validation 错误；其余情况（包括护栏拒绝、推理不可用）都返回文本结果。
    pub async fn process_prompt(&self, prompt: &str) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(OrchestrationError::Validation("No prompt provided".to_string()));
        }
        tracing::info!(chars = prompt.chars().count(), "Processing prompt");

        if !self.guardrails.validate_message(prompt) {
            tracing::error!("Prompt failed ethical validation, aborting");
            return Ok(ETHICS_REJECTION.to_string());
        }

        let output = match self.selector.select_and_infer(prompt).await {
            InferenceResult::Success { output, .. } => output,
            InferenceResult::Unavailable { .. } => INFERENCE_UNAVAILABLE.to_string(),
        };
        self.context.store_context(LAST_INFERENCE_KEY, output.as_str());

        let redacted = self.guardrails.redact_pii(&output);
        tracing::info!("Prompt processed");
        Ok(redacted)
    }
}
