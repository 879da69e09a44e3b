//! 数据管道运维：自愈监控、灾备演练、ETL、修复动作

pub mod etl;
pub mod health;
pub mod recovery;
pub mod remediation;

pub use etl::{EtlPipeline, EtlRecord};
pub use health::{
    FixedSamples, HealthMonitor, HealthSample, HealthSampler, MonitorState, MonitorStats,
    Remediation, SimulatedSampler,
};
pub use recovery::{
    BackupRecord, BackupStatus, BackupStore, DrillOutcome, DrillReport, DrillStage,
    RecoveryChain, SimulatedBackupStore,
};
pub use remediation::{PipelineRestart, RemediationGenerator, RESTART_TASK};
