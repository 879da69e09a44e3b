//! 任务模型：Task / TaskStatus / Agent 注册表
//!
//! Task 只有在 Pending 时才能修改优先级与 Agent；状态推进由执行引擎负责。

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::error::{OrchestrationError, Result};

/// 分解器创建任务时使用的默认优先级（数值越小越紧急）
pub const DEFAULT_PRIORITY: i32 = 5;

/// 任务 ID
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new() -> Self {
        Self(format!("task_{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for TaskId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 任务状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    /// 等待执行（唯一可被调度器修改的状态）
    Pending,
    /// 正在执行
    Running,
    /// 已完成
    Completed,
    /// 重试后仍失败
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 能力型 Agent：静态注册，运行时不增删
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Agent {
    pub name: &'static str,
    pub capability_tag: &'static str,
    /// 与任务描述做小写子串匹配的关键词
    #[serde(skip)]
    pub keywords: &'static [&'static str],
}

impl Agent {
    /// 任务描述命中的关键词个数
    pub fn match_score(&self, description: &str) -> usize {
        let lower = description.to_lowercase();
        self.keywords.iter().filter(|k| lower.contains(*k)).count()
    }
}

pub const STRATEGIST: Agent = Agent {
    name: "Campaign Strategist",
    capability_tag: "strategist",
    keywords: &[
        "campaign", "strategy", "plan", "understand", "metric", "performance", "creative",
        "variant", "analy", "signup", "conversion",
    ],
};

pub const TOOLSMITH: Agent = Agent {
    name: "Toolsmith",
    capability_tag: "toolsmith",
    keywords: &["tool", "integration", "build", "automat", "connector", "restart", "pipeline"],
};

pub const COMPLIANCE: Agent = Agent {
    name: "Compliance Guard",
    capability_tag: "compliance",
    keywords: &["compliance", "gdpr", "privacy", "consent", "enforce", "regulat", "pii"],
};

/// 无任何关键词命中时兜底
pub const GENERALIST: Agent = Agent {
    name: "Default Agent",
    capability_tag: "generalist",
    keywords: &[],
};

/// 固定的 Agent 注册表；顺序即同分时的优先顺序
#[derive(Debug, Clone)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    fallback: Agent,
}

impl AgentRegistry {
    pub fn new(agents: Vec<Agent>, fallback: Agent) -> Self {
        Self { agents, fallback }
    }

    /// 按关键词命中数选择 Agent；同分取注册顺序靠前者，全部未命中返回兜底 Agent
    pub fn lookup(&self, description: &str) -> Agent {
        let mut best: Option<(usize, Agent)> = None;
        for agent in &self.agents {
            let score = agent.match_score(description);
            if score == 0 {
                continue;
            }
            match best {
                Some((best_score, _)) if best_score >= score => {}
                _ => best = Some((score, *agent)),
            }
        }
        best.map(|(_, a)| a).unwrap_or(self.fallback)
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new(vec![STRATEGIST, TOOLSMITH, COMPLIANCE], GENERALIST)
    }
}

/// 编排任务
#[derive(Debug, Clone, Serialize)]
pub struct Task {
    id: TaskId,
    description: String,
    priority: i32,
    assigned_agent: Option<Agent>,
    status: TaskStatus,
}

impl Task {
    /// 创建 Pending 任务；描述不能为空白
    pub fn new(description: impl Into<String>, priority: i32) -> Result<Self> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(OrchestrationError::Validation(
                "task description must not be empty".to_string(),
            ));
        }
        Ok(Self {
            id: TaskId::new(),
            description,
            priority,
            assigned_agent: None,
            status: TaskStatus::Pending,
        })
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn assigned_agent(&self) -> Option<Agent> {
        self.assigned_agent
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn is_pending(&self) -> bool {
        self.status == TaskStatus::Pending
    }

    fn ensure_pending(&self) -> Result<()> {
        if self.is_pending() {
            Ok(())
        } else {
            Err(OrchestrationError::InvalidState {
                task_id: self.id.clone(),
                status: self.status,
            })
        }
    }

    pub fn set_priority(&mut self, priority: i32) -> Result<()> {
        self.ensure_pending()?;
        self.priority = priority;
        Ok(())
    }

    pub fn assign_agent(&mut self, agent: Agent) -> Result<()> {
        self.ensure_pending()?;
        self.assigned_agent = Some(agent);
        Ok(())
    }

    pub(crate) fn start(&mut self) -> Result<()> {
        self.ensure_pending()?;
        self.status = TaskStatus::Running;
        Ok(())
    }

    pub(crate) fn finish(&mut self, succeeded: bool) {
        self.status = if succeeded {
            TaskStatus::Completed
        } else {
            TaskStatus::Failed
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_task_is_pending_with_priority() {
        let task = Task::new("Plan for launch", DEFAULT_PRIORITY).unwrap();
        assert_eq!(task.status(), TaskStatus::Pending);
        assert_eq!(task.priority(), DEFAULT_PRIORITY);
        assert!(task.assigned_agent().is_none());
        assert!(task.id().as_str().starts_with("task_"));
    }

    #[test]
    fn test_blank_description_rejected() {
        let err = Task::new("   ", DEFAULT_PRIORITY).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_priority_frozen_after_start() {
        let mut task = Task::new("Enforce data compliance", 5).unwrap();
        task.set_priority(1).unwrap();
        task.start().unwrap();
        assert!(matches!(
            task.set_priority(3),
            Err(OrchestrationError::InvalidState { status: TaskStatus::Running, .. })
        ));
        assert!(task.assign_agent(COMPLIANCE).is_err());
        assert_eq!(task.priority(), 1);

        task.finish(true);
        assert_eq!(task.status(), TaskStatus::Completed);
        assert!(task.start().is_err());
    }

    #[test]
    fn test_registry_lookup() {
        let registry = AgentRegistry::default();
        assert_eq!(
            registry.lookup("Extract campaign performance metrics").capability_tag,
            "strategist"
        );
        assert_eq!(
            registry.lookup("Identify missing integration tools").capability_tag,
            "toolsmith"
        );
        assert_eq!(registry.lookup("Enforce data compliance").capability_tag, "compliance");
        assert_eq!(registry.lookup("Water the garden").capability_tag, "generalist");
    }

    #[test]
    fn test_registry_tie_prefers_registration_order() {
        let registry = AgentRegistry::default();
        // "campaign" -> strategist, "tool" -> toolsmith：各命中 1 个
        assert_eq!(registry.lookup("campaign tool").capability_tag, "strategist");
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Completed).unwrap();
        assert_eq!(json, "\"completed\"");
    }
}
