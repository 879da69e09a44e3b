//! 目标分解：goal 字符串 -> 有序 Task 列表
//!
//! 具体策略（静态模板 / 外部服务）实现 DecompositionStrategy；GoalDecomposer 负责输入校验与建 Task。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::{OrchestrationError, Result};
use crate::core::task::{Task, DEFAULT_PRIORITY};

/// 分解策略：返回有序的任务描述
#[async_trait]
pub trait DecompositionStrategy: Send + Sync {
    async fn descriptions(&self, goal: &str) -> Result<Vec<String>>;

    fn name(&self) -> &'static str;
}

/// 营销活动固定四步（与目标内容无关）
#[derive(Debug, Default, Clone, Copy)]
pub struct CampaignDecomposer;

#[async_trait]
impl DecompositionStrategy for CampaignDecomposer {
    async fn descriptions(&self, _goal: &str) -> Result<Vec<String>> {
        Ok(vec![
            "Extract campaign performance metrics".to_string(),
            "Generate creative campaign variants".to_string(),
            "Identify missing integration tools".to_string(),
            "Enforce data compliance".to_string(),
        ])
    }

    fn name(&self) -> &'static str {
        "campaign"
    }
}

/// 模板分解：每个模板中的 `{goal}` 替换为目标文本
#[derive(Debug, Clone)]
pub struct TemplateDecomposer {
    templates: Vec<String>,
}

impl TemplateDecomposer {
    pub fn new(templates: Vec<String>) -> Self {
        Self { templates }
    }
}

impl Default for TemplateDecomposer {
    fn default() -> Self {
        Self::new(vec![
            "Task 1: Understand {goal}".to_string(),
            "Task 2: Plan for {goal}".to_string(),
            "Task 3: Execute {goal}".to_string(),
        ])
    }
}

#[async_trait]
impl DecompositionStrategy for TemplateDecomposer {
    async fn descriptions(&self, goal: &str) -> Result<Vec<String>> {
        Ok(self
            .templates
            .iter()
            .map(|t| t.replace("{goal}", goal))
            .collect())
    }

    fn name(&self) -> &'static str {
        "template"
    }
}

/// 目标分解器
#[derive(Clone)]
pub struct GoalDecomposer {
    strategy: Arc<dyn DecompositionStrategy>,
    default_priority: i32,
}

impl GoalDecomposer {
    pub fn new(strategy: Arc<dyn DecompositionStrategy>) -> Self {
        Self {
            strategy,
            default_priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_default_priority(mut self, priority: i32) -> Self {
        self.default_priority = priority;
        self
    }

    /// 分解目标；空白目标或空结果均视为 Validation 错误
    pub async fn decompose(&self, goal: &str) -> Result<Vec<Task>> {
        let goal = goal.trim();
        if goal.is_empty() {
            return Err(OrchestrationError::Validation("No goal provided".to_string()));
        }

        tracing::info!(strategy = self.strategy.name(), goal, "Decomposing goal");
        let descriptions = self.strategy.descriptions(goal).await?;
        if descriptions.is_empty() {
            return Err(OrchestrationError::Validation(format!(
                "goal '{goal}' produced no tasks"
            )));
        }

        let tasks = descriptions
            .into_iter()
            .map(|d| Task::new(d, self.default_priority))
            .collect::<Result<Vec<_>>>()?;
        tracing::info!(count = tasks.len(), "Goal decomposed");
        Ok(tasks)
    }
}

impl Default for GoalDecomposer {
    fn default() -> Self {
        Self::new(Arc::new(CampaignDecomposer))
    }
}
