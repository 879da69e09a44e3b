//! 编排错误类型
//!
//! 只有 Validation 会越过 API 边界（HTTP 400）；其余错误在组件内部被收敛为状态或结果值。

use thiserror::Error;

use crate::core::task::{TaskId, TaskStatus};

/// 编排核心可能出现的错误（输入校验、状态机违例、内部组件失败）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    /// 调用方输入缺失或非法，直接拒绝请求
    #[error("Validation error: {0}")]
    Validation(String),

    /// 任务已离开 Pending，不允许再修改优先级 / Agent
    #[error("Task {task_id} is {status}, only pending tasks can be modified")]
    InvalidState { task_id: TaskId, status: TaskStatus },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    /// 备份记录状态机只能前进
    #[error("Invalid backup transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Health sample error: {0}")]
    Sample(String),

    #[error("Remediation error: {0}")]
    Remediation(String),

    #[error("Recovery step failed: {0}")]
    Recovery(String),
}

impl OrchestrationError {
    /// 是否属于应以 400 返回给调用方的输入错误
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<config::ConfigError> for OrchestrationError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OrchestrationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = OrchestrationError::Validation("goal is empty".to_string());
        assert_eq!(err.to_string(), "Validation error: goal is empty");
        assert!(err.is_validation());

        let err = OrchestrationError::InvalidState {
            task_id: TaskId::from("t-1"),
            status: TaskStatus::Running,
        };
        assert_eq!(
            err.to_string(),
            "Task t-1 is running, only pending tasks can be modified"
        );
        assert!(!err.is_validation());
    }
}
