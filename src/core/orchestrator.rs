//! 编排器：把分解、委派、排序、执行串起来
//!
//! HTTP 与 CLI 都只经过这里，不直接拼装各组件。

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use crate::config::AppConfig;
use crate::core::decomposer::GoalDecomposer;
use crate::core::error::{OrchestrationError, Result};
use crate::core::executor::{ExecutionEngine, InferenceWork, RetryPolicy, RunReport};
use crate::core::task::Task;
use crate::core::task_scheduler::TaskScheduler;
use crate::llm::InferenceSelector;

/// orchestrate 的返回：已委派但尚未执行的任务
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationPlan {
    pub tasks: Vec<Task>,
    /// 任务描述 -> Agent 名称
    pub assignments: BTreeMap<String, String>,
}

/// 编排器
pub struct Orchestrator {
    decomposer: GoalDecomposer,
    scheduler: TaskScheduler,
    engine: Arc<ExecutionEngine>,
    default_priority: i32,
}

impl Orchestrator {
    pub fn new(decomposer: GoalDecomposer, scheduler: TaskScheduler, engine: Arc<ExecutionEngine>) -> Self {
        Self {
            decomposer,
            scheduler,
            engine,
            default_priority: crate::core::task::DEFAULT_PRIORITY,
        }
    }

    /// 按配置组装：营销四步分解 + 推理降级链执行
    pub fn from_config(cfg: &AppConfig, selector: Arc<InferenceSelector>) -> Self {
        let priority = cfg.orchestration.default_priority;
        let engine = ExecutionEngine::new(
            Arc::new(InferenceWork::new(selector)),
            RetryPolicy::from(&cfg.orchestration),
        );
        Self::new(
            GoalDecomposer::default().with_default_priority(priority),
            TaskScheduler::default(),
            Arc::new(engine),
        )
        .with_default_priority(priority)
    }

    /// workflow 中直接给出的任务所用优先级
    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }

    /// 分解目标并委派 Agent，不执行
    pub async fn orchestrate(&self, goal: &str) -> Result<OrchestrationPlan> {
        let mut tasks = self.decomposer.decompose(goal).await?;
        self.scheduler.assign(&mut tasks);
        let assignments = self.scheduler.assignments(&tasks);
        Ok(OrchestrationPlan { tasks, assignments })
    }

    /// 执行一组任务描述：建任务 -> 委派 -> 排序 -> 执行
    pub async fn workflow<S: AsRef<str>>(&self, descriptions: &[S]) -> Result<RunReport> {
        if descriptions.is_empty() {
            return Err(OrchestrationError::Validation("No tasks provided".to_string()));
        }
        let mut tasks = descriptions
            .iter()
            .map(|d| Task::new(d.as_ref(), self.default_priority))
            .collect::<Result<Vec<_>>>()?;
        self.scheduler.assign(&mut tasks);
        Ok(self.engine.run(self.scheduler.order(tasks)).await)
    }

    /// 分解目标后直接执行
    pub async fn run_goal(&self, goal: &str) -> Result<RunReport> {
        let plan = self.orchestrate(goal).await?;
        Ok(self.engine.run(self.scheduler.order(plan.tasks)).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelsConfig;
    use crate::core::fault::{AlwaysSucceed, ScriptedFaults};
    use crate::core::executor::SimulatedWork;
    use crate::core::task::TaskStatus;
    use crate::llm::MockBackend;
    use std::time::Duration;

    fn simulated(faults: ScriptedFaults) -> Orchestrator {
        let engine = ExecutionEngine::new(
            Arc::new(SimulatedWork::new(Arc::new(faults), Duration::ZERO)),
            RetryPolicy::fixed(Duration::ZERO),
        );
        Orchestrator::new(GoalDecomposer::default(), TaskScheduler::default(), Arc::new(engine))
    }

    #[tokio::test]
    async fn test_orchestrate_assigns_every_task() {
        let orchestrator = simulated(ScriptedFaults::new([true; 0]).then(true));
        let plan = orchestrator.orchestrate("Increase signups").await.unwrap();
        assert_eq!(plan.tasks.len(), 4);
        assert!(plan.tasks.iter().all(|t| t.assigned_agent().is_some()));
        assert_eq!(plan.assignments["Enforce data compliance"], "Compliance Guard");
        assert_eq!(plan.assignments["Identify missing integration tools"], "Toolsmith");
    }

    #[tokio::test]
    async fn test_orchestrate_blank_goal() {
        let orchestrator = simulated(ScriptedFaults::new([true; 0]).then(true));
        let err = orchestrator.orchestrate("").await.unwrap_err();
        assert_eq!(err, OrchestrationError::Validation("No goal provided".to_string()));
    }

    #[tokio::test]
    async fn test_workflow_results_by_description() {
        // 第一个任务失败一次后成功，第二个两次都失败
        let orchestrator = simulated(ScriptedFaults::new([false, true, false, false]));
        let report = orchestrator.workflow(&["Send welcome email", "Sync contacts"]).await.unwrap();
        let results = report.results();
        assert_eq!(results["Send welcome email"], "Send welcome email completed after retry");
        assert_eq!(results["Sync contacts"], "Sync contacts failed");
        assert_eq!(report.tasks()[1].status(), TaskStatus::Failed);
    }

    #[tokio::test]
    async fn test_workflow_rejects_empty_list() {
        let orchestrator = simulated(ScriptedFaults::new([true; 0]).then(true));
        let empty: [&str; 0] = [];
        let err = orchestrator.workflow(&empty).await.unwrap_err();
        assert_eq!(err, OrchestrationError::Validation("No tasks provided".to_string()));
    }

    #[tokio::test]
    async fn test_from_config_runs_through_inference() {
        let mut cfg = AppConfig::default();
        cfg.models = ModelsConfig::new("A", vec![]);
        cfg.orchestration.retry_backoff_ms = 0;
        let selector = InferenceSelector::new(cfg.models.clone())
            .with_backend(Arc::new(MockBackend::new("A", Arc::new(AlwaysSucceed))));
        let orchestrator = Orchestrator::from_config(&cfg, Arc::new(selector));

        let report = orchestrator.run_goal("Increase signups").await.unwrap();
        assert_eq!(report.len(), 4);
        assert!(report
            .outcomes()
            .iter()
            .all(|(_, o)| o.message().ends_with(" completed")));
    }
}
