//! 任务调度：Agent 委派 / 优先级调整 / 执行顺序
//!
//! order() 的结果就是执行引擎的执行顺序：按优先级升序，同优先级保持插入顺序（稳定排序）。

use std::collections::BTreeMap;

use crate::core::error::{OrchestrationError, Result};
use crate::core::task::{AgentRegistry, Task, TaskId};

/// 任务调度器
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    registry: AgentRegistry,
}

impl TaskScheduler {
    pub fn new(registry: AgentRegistry) -> Self {
        Self { registry }
    }

    /// 为每个 Pending 任务按能力匹配指派 Agent；非 Pending 任务保持不变
    pub fn assign(&self, tasks: &mut [Task]) {
        for task in tasks.iter_mut().filter(|t| t.is_pending()) {
            let agent = self.registry.lookup(task.description());
            if task.assign_agent(agent).is_ok() {
                tracing::debug!(task_id = %task.id(), agent = agent.name, "Agent assigned");
            }
        }
        tracing::info!(count = tasks.len(), "Tasks delegated to agents");
    }

    /// 调整任务优先级；任务不存在或已离开 Pending 时报错
    pub fn reprioritize(&self, tasks: &mut [Task], task_id: &TaskId, priority: i32) -> Result<()> {
        let task = tasks
            .iter_mut()
            .find(|t| t.id() == task_id)
            .ok_or_else(|| OrchestrationError::TaskNotFound(task_id.clone()))?;
        task.set_priority(priority)?;
        tracing::info!(task_id = %task_id, priority, "Task reprioritized");
        Ok(())
    }

    /// 按优先级升序排列（稳定）
    pub fn order(&self, mut tasks: Vec<Task>) -> Vec<Task> {
        tasks.sort_by_key(|t| t.priority());
        tasks
    }

    /// 描述 -> Agent 名称，供 /api/orchestrate 返回
    pub fn assignments(&self, tasks: &[Task]) -> BTreeMap<String, String> {
        tasks
            .iter()
            .filter_map(|t| {
                t.assigned_agent()
                    .map(|a| (t.description().to_string(), a.name.to_string()))
            })
            .collect()
    }
}
