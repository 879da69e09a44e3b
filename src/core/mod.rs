//! 编排核心：任务模型、目标分解、调度委派、有界重试执行、故障注入、优雅关闭

pub mod decomposer;
pub mod error;
pub mod executor;
pub mod fault;
pub mod orchestrator;
pub mod shutdown;
pub mod task;
pub mod task_scheduler;

pub use decomposer::{CampaignDecomposer, DecompositionStrategy, GoalDecomposer, TemplateDecomposer};
pub use error::{OrchestrationError, Result};
pub use executor::{
    AttemptResult, ExecutionEngine, InferenceWork, RetryPolicy, RunReport, SimulatedWork,
    TaskOutcome, UnitOfWork,
};
pub use fault::{AlwaysFail, AlwaysSucceed, FaultSource, RandomFaults, ScriptedFaults};
pub use orchestrator::{OrchestrationPlan, Orchestrator};
pub use shutdown::{ShutdownCoordinator, ShutdownManager, ShutdownReason};
pub use task::{Agent, AgentRegistry, Task, TaskId, TaskStatus};
pub use task_scheduler::TaskScheduler;
