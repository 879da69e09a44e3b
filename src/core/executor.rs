//! 执行引擎：按顺序执行任务，有界重试
//!
//! 每个任务最多尝试 2 次：首次失败后固定退避再重试一次，仍失败则标记 Failed。
//! 单个任务的失败（包括 panic）只记录在该任务的结果里，不会中断整批执行。

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::FutureExt;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::config::OrchestrationSection;
use crate::core::fault::FaultSource;
use crate::core::task::{Task, TaskId};
use crate::llm::{InferenceResult, InferenceSelector};

/// 每个任务的尝试次数上限（首次 + 一次重试）
pub const MAX_ATTEMPTS: u32 = 2;

/// 单次尝试的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    Success(String),
    Failure(String),
}

/// 任务的实际工作单元
#[async_trait]
pub trait UnitOfWork: Send + Sync {
    /// attempt 从 1 开始
    async fn attempt(&self, task: &Task, attempt: u32) -> AttemptResult;
}

/// 通过推理降级链完成任务
pub struct InferenceWork {
    selector: Arc<InferenceSelector>,
}

impl InferenceWork {
    pub fn new(selector: Arc<InferenceSelector>) -> Self {
        Self { selector }
    }
}

#[async_trait]
impl UnitOfWork for InferenceWork {
    async fn attempt(&self, task: &Task, _attempt: u32) -> AttemptResult {
        let agent = task.assigned_agent().map(|a| a.name).unwrap_or("unassigned");
        match self.selector.select_and_infer(task.description()).await {
            InferenceResult::Success { backend, output } => {
                AttemptResult::Success(format!("{output} (via {backend}, agent {agent})"))
            }
            InferenceResult::Unavailable { attempted } => AttemptResult::Failure(format!(
                "inference unavailable after trying {}",
                attempted.join(", ")
            )),
        }
    }
}

/// 模拟工作：耗时 work_duration，成败由故障源决定
pub struct SimulatedWork {
    faults: Arc<dyn FaultSource>,
    work_duration: Duration,
}

impl SimulatedWork {
    pub fn new(faults: Arc<dyn FaultSource>, work_duration: Duration) -> Self {
        Self {
            faults,
            work_duration,
        }
    }
}

#[async_trait]
impl UnitOfWork for SimulatedWork {
    async fn attempt(&self, task: &Task, attempt: u32) -> AttemptResult {
        if !self.work_duration.is_zero() {
            tokio::time::sleep(self.work_duration).await;
        }
        if self.faults.next_ok() {
            AttemptResult::Success(format!("{} done", task.description()))
        } else {
            AttemptResult::Failure(format!("simulated task failure on attempt {attempt}"))
        }
    }
}

/// 重试策略：默认固定退避；multiplier > 1 时按指数增长
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
    multiplier: f64,
}

impl RetryPolicy {
    /// max_attempts 被限制在 [1, MAX_ATTEMPTS]
    pub fn new(max_attempts: u32, backoff: Duration) -> Self {
        Self {
            max_attempts: max_attempts.clamp(1, MAX_ATTEMPTS),
            backoff,
            multiplier: 1.0,
        }
    }

    pub fn fixed(backoff: Duration) -> Self {
        Self::new(MAX_ATTEMPTS, backoff)
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// 第 failed_attempt 次失败后的等待时间
    pub fn backoff_for(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1) as i32;
        self.backoff.mul_f64(self.multiplier.powi(exp))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(Duration::from_secs(1))
    }
}

impl From<&OrchestrationSection> for RetryPolicy {
    fn from(cfg: &OrchestrationSection) -> Self {
        Self::new(cfg.max_attempts, Duration::from_millis(cfg.retry_backoff_ms))
            .with_multiplier(cfg.retry_multiplier)
    }
}

/// 单个任务的最终结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Completed {
        message: String,
        output: String,
        attempts: u32,
    },
    Failed {
        message: String,
        reason: String,
        attempts: u32,
    },
}

impl TaskOutcome {
    /// "<desc> completed" / "<desc> completed after retry" / "<desc> failed"
    pub fn message(&self) -> &str {
        match self {
            Self::Completed { message, .. } | Self::Failed { message, .. } => message,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            Self::Completed { attempts, .. } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// 一批任务的执行报告（保持执行顺序）
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    outcomes: Vec<(TaskId, TaskOutcome)>,
    tasks: Vec<Task>,
}

impl RunReport {
    pub fn outcomes(&self) -> &[(TaskId, TaskOutcome)] {
        &self.outcomes
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn outcome(&self, id: &TaskId) -> Option<&TaskOutcome> {
        self.outcomes
            .iter()
            .find(|(task_id, _)| task_id == id)
            .map(|(_, outcome)| outcome)
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn failed_count(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| !o.is_completed()).count()
    }

    /// 任务描述 -> 结果文本，供 /api/workflow 返回
    pub fn results(&self) -> BTreeMap<String, String> {
        self.tasks
            .iter()
            .zip(&self.outcomes)
            .map(|(task, (_, outcome))| (task.description().to_string(), outcome.message().to_string()))
            .collect()
    }
}

/// 执行引擎
pub struct ExecutionEngine {
    work: Arc<dyn UnitOfWork>,
    policy: RetryPolicy,
}

impl ExecutionEngine {
    pub fn new(work: Arc<dyn UnitOfWork>, policy: RetryPolicy) -> Self {
        Self { work, policy }
    }

    /// 按给定顺序依次执行；调用方负责先用 TaskScheduler::order 排序
    pub async fn run(&self, tasks: Vec<Task>) -> RunReport {
        tracing::info!(count = tasks.len(), "Starting workflow");
        let mut report = RunReport::default();

        for mut task in tasks {
            let outcome = self.run_task(&mut task).await;
            tracing::info!(task_id = %task.id(), result = outcome.message(), "Task finished");
            report.outcomes.push((task.id().clone(), outcome));
            report.tasks.push(task);
        }

        tracing::info!(
            total = report.len(),
            failed = report.failed_count(),
            "Workflow finished"
        );
        report
    }

    /// 后台执行单个任务，不阻塞调用方
    pub fn submit(self: &Arc<Self>, task: Task) -> JoinHandle<RunReport> {
        let engine = Arc::clone(self);
        tokio::spawn(async move { engine.run(vec![task]).await })
    }

    async fn run_task(&self, task: &mut Task) -> TaskOutcome {
        let description = task.description().to_string();

        if let Err(e) = task.start() {
            tracing::warn!(task_id = %task.id(), error = %e, "Task skipped");
            return TaskOutcome::Failed {
                message: format!("{description} failed"),
                reason: e.to_string(),
                attempts: 0,
            };
        }

        let mut attempt = 1;
        loop {
            tracing::info!(task_id = %task.id(), attempt, "Executing task: {}", description);
            let result = AssertUnwindSafe(self.work.attempt(task, attempt))
                .catch_unwind()
                .await
                .unwrap_or_else(|_| AttemptResult::Failure("unit of work panicked".to_string()));

            match result {
                AttemptResult::Success(output) => {
                    task.finish(true);
                    let message = if attempt == 1 {
                        format!("{description} completed")
                    } else {
                        format!("{description} completed after retry")
                    };
                    return TaskOutcome::Completed {
                        message,
                        output,
                        attempts: attempt,
                    };
                }
                AttemptResult::Failure(reason) if attempt >= self.policy.max_attempts() => {
                    tracing::error!(task_id = %task.id(), attempt, %reason, "Task failed after retry");
                    task.finish(false);
                    return TaskOutcome::Failed {
                        message: format!("{description} failed"),
                        reason,
                        attempts: attempt,
                    };
                }
                AttemptResult::Failure(reason) => {
                    let delay = self.policy.backoff_for(attempt);
                    tracing::warn!(
                        task_id = %task.id(),
                        attempt,
                        %reason,
                        backoff_ms = delay.as_millis() as u64,
                        "Task attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
