//! Maily - 营销数据平台的编排核心
//!
//! 模块划分：
//! - **api**: HTTP 接口（axum，feature `web`）
//! - **config**: 应用配置加载（TOML / YAML + 环境变量）
//! - **core**: 任务模型、目标分解、Agent 委派、有界重试执行、故障注入、优雅关闭
//! - **data**: 数据连接器状态
//! - **guardrails**: 禁用词校验与 PII 脱敏
//! - **llm**: 推理后端抽象与降级选择器
//! - **memory**: 进程内上下文存储
//! - **observability**: 日志初始化与事件上报
//! - **pipeline**: 自愈监控、灾备演练、ETL、修复动作
//! - **tooling**: 提示词处理入口（护栏 + 推理 + 脱敏）

#[cfg(feature = "web")]
pub mod api;
pub mod config;
pub mod core;
pub mod data;
pub mod guardrails;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod pipeline;
pub mod tooling;

pub use crate::core::{OrchestrationError, Orchestrator, Task, TaskStatus};
