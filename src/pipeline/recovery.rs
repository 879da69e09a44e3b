//! 灾备演练：备份 -> 恢复 -> 校验
//!
//! 状态机只能前进：Created -> Restoring -> {Restored, Failed}，Restored -> Validating -> {Validated, Failed}。
//! 恢复失败的记录永远不会进入 Validating。每一步只执行一次，不重试。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;

use crate::core::error::{OrchestrationError, Result};
use crate::core::fault::FaultSource;
use crate::observability::{EventSink, ObservabilityEvent};

/// 备份记录状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupStatus {
    Created,
    Restoring,
    Restored,
    Validating,
    Validated,
    Failed,
}

impl BackupStatus {
    pub fn can_transition_to(self, next: BackupStatus) -> bool {
        use BackupStatus::*;
        matches!(
            (self, next),
            (Created, Restoring)
                | (Restoring, Restored)
                | (Restoring, Failed)
                | (Restored, Validating)
                | (Validating, Validated)
                | (Validating, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Validated | Self::Failed)
    }
}

impl fmt::Display for BackupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Created => "created",
            Self::Restoring => "restoring",
            Self::Restored => "restored",
            Self::Validating => "validating",
            Self::Validated => "validated",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// 一次备份；由持有它的演练独占
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackupRecord {
    id: String,
    created_at: DateTime<Utc>,
    status: BackupStatus,
}

impl BackupRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            created_at: Utc::now(),
            status: BackupStatus::Created,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn status(&self) -> BackupStatus {
        self.status
    }

    pub fn transition(&mut self, next: BackupStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(OrchestrationError::InvalidTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(backup_id = %self.id, from = %self.status, to = %next, "Backup transition");
        self.status = next;
        Ok(())
    }
}

/// 备份存储的三个步骤
#[async_trait]
pub trait BackupStore: Send + Sync {
    /// 返回新备份的 ID
    async fn create(&self) -> Result<String>;

    async fn restore(&self, backup_id: &str) -> Result<()>;

    async fn validate(&self, backup_id: &str) -> Result<()>;
}

/// 模拟存储：恢复与校验的成败各由一个故障源决定
pub struct SimulatedBackupStore {
    restore_faults: Arc<dyn FaultSource>,
    validate_faults: Arc<dyn FaultSource>,
    step_delay: Duration,
}

impl SimulatedBackupStore {
    pub fn new(restore_faults: Arc<dyn FaultSource>, validate_faults: Arc<dyn FaultSource>) -> Self {
        Self {
            restore_faults,
            validate_faults,
            step_delay: Duration::ZERO,
        }
    }

    /// 每一步模拟耗时
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    async fn pause(&self) {
        if !self.step_delay.is_zero() {
            tokio::time::sleep(self.step_delay).await;
        }
    }
}

#[async_trait]
impl BackupStore for SimulatedBackupStore {
    async fn create(&self) -> Result<String> {
        self.pause().await;
        let id = rand::thread_rng().gen_range(1000..=9999);
        Ok(format!("backup_{id}"))
    }

    async fn restore(&self, backup_id: &str) -> Result<()> {
        self.pause().await;
        if self.restore_faults.next_ok() {
            Ok(())
        } else {
            Err(OrchestrationError::Recovery(format!("restore of {backup_id} failed")))
        }
    }

    async fn validate(&self, backup_id: &str) -> Result<()> {
        self.pause().await;
        if self.validate_faults.next_ok() {
            Ok(())
        } else {
            Err(OrchestrationError::Recovery(format!(
                "data validation failed after restoring {backup_id}"
            )))
        }
    }
}

/// 演练步骤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DrillStage {
    Backup,
    Restore,
    Validate,
}

impl fmt::Display for DrillStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Backup => "backup",
            Self::Restore => "restore",
            Self::Validate => "validate",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum DrillOutcome {
    Validated,
    Failed { stage: DrillStage },
}

impl DrillOutcome {
    pub fn passed(&self) -> bool {
        matches!(self, Self::Validated)
    }
}

/// 一次演练的结果；备份创建失败时没有记录
#[derive(Debug, Clone, Serialize)]
pub struct DrillReport {
    pub record: Option<BackupRecord>,
    pub outcome: DrillOutcome,
}

/// 灾备链
pub struct RecoveryChain {
    store: Arc<dyn BackupStore>,
    sink: Arc<dyn EventSink>,
}

impl RecoveryChain {
    pub fn new(store: Arc<dyn BackupStore>, sink: Arc<dyn EventSink>) -> Self {
        Self { store, sink }
    }

    pub async fn create_backup(&self) -> Result<BackupRecord> {
        tracing::info!("Starting backup creation");
        let id = self.store.create().await?;
        tracing::info!(backup_id = %id, "Backup created");
        Ok(BackupRecord::new(id))
    }

    /// 失败时记录进入 Failed
    pub async fn restore(&self, record: &mut BackupRecord) -> bool {
        if let Err(e) = record.transition(BackupStatus::Restoring) {
            tracing::error!(backup_id = %record.id(), error = %e, "Restore not allowed");
            return false;
        }
        tracing::info!(backup_id = %record.id(), "Restoring from backup");

        let (next, ok) = match self.store.restore(record.id()).await {
            Ok(()) => (BackupStatus::Restored, true),
            Err(e) => {
                tracing::error!(backup_id = %record.id(), error = %e, "Restoration failed");
                (BackupStatus::Failed, false)
            }
        };
        let transitioned = record.transition(next).is_ok();
        ok && transitioned
    }

    /// 只有 Restored 的记录可以校验；失败时记录进入 Failed
    pub async fn validate(&self, record: &mut BackupRecord) -> bool {
        if let Err(e) = record.transition(BackupStatus::Validating) {
            tracing::error!(backup_id = %record.id(), error = %e, "Validation not allowed");
            return false;
        }
        tracing::info!(backup_id = %record.id(), "Validating restored data integrity");

        match self.store.validate(record.id()).await {
            Ok(()) => record.transition(BackupStatus::Validated).is_ok(),
            Err(e) => {
                tracing::error!(backup_id = %record.id(), error = %e, "Validation failed");
                let _ = record.transition(BackupStatus::Failed);
                false
            }
        }
    }

    /// 完整演练一次，并上报结果事件
    pub async fn run_drill(&self) -> DrillReport {
        tracing::info!("Simulating disaster recovery backup and restore");

        let report = match self.create_backup().await {
            Err(e) => {
                tracing::error!(error = %e, "Backup creation failed");
                DrillReport {
                    record: None,
                    outcome: DrillOutcome::Failed {
                        stage: DrillStage::Backup,
                    },
                }
            }
            Ok(mut record) => {
                let outcome = if !self.restore(&mut record).await {
                    DrillOutcome::Failed {
                        stage: DrillStage::Restore,
                    }
                } else if !self.validate(&mut record).await {
                    DrillOutcome::Failed {
                        stage: DrillStage::Validate,
                    }
                } else {
                    DrillOutcome::Validated
                };
                DrillReport {
                    record: Some(record),
                    outcome,
                }
            }
        };

        let backup_id = report.record.as_ref().map(|r| r.id().to_string());
        let event = match &report.outcome {
            DrillOutcome::Validated => {
                tracing::info!(backup_id = ?backup_id, "Disaster recovery test passed");
                ObservabilityEvent::status("disaster recovery test passed")
            }
            DrillOutcome::Failed { stage } => {
                tracing::error!(backup_id = ?backup_id, %stage, "Disaster recovery test failed");
                ObservabilityEvent::anomaly(format!("disaster recovery test failed during {stage}"))
                    .with("stage", stage.to_string())
            }
        };
        let event = match backup_id {
            Some(id) => event.with("backup_id", id),
            None => event,
        };
        self.sink.send(event).await;
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fault::{AlwaysFail, AlwaysSucceed};
    use crate::observability::{EventKind, MemorySink};

    struct BrokenStore;

    #[async_trait]
    impl BackupStore for BrokenStore {
        async fn create(&self) -> Result<String> {
            Err(OrchestrationError::Recovery("no space left".to_string()))
        }

        async fn restore(&self, _backup_id: &str) -> Result<()> {
            Ok(())
        }

        async fn validate(&self, _backup_id: &str) -> Result<()> {
            Ok(())
        }
    }

    fn chain(restore_ok: bool, validate_ok: bool, sink: Arc<MemorySink>) -> RecoveryChain {
        let pick = |ok: bool| -> Arc<dyn FaultSource> {
            if ok {
                Arc::new(AlwaysSucceed)
            } else {
                Arc::new(AlwaysFail)
            }
        };
        let store = SimulatedBackupStore::new(pick(restore_ok), pick(validate_ok));
        RecoveryChain::new(Arc::new(store), sink)
    }

    #[test]
    fn test_transitions_only_forward() {
        let mut record = BackupRecord::new("backup_1");
        assert!(record.transition(BackupStatus::Validating).is_err());
        record.transition(BackupStatus::Restoring).unwrap();
        record.transition(BackupStatus::Restored).unwrap();
        assert!(matches!(
            record.transition(BackupStatus::Restoring),
            Err(OrchestrationError::InvalidTransition { .. })
        ));
        record.transition(BackupStatus::Validating).unwrap();
        record.transition(BackupStatus::Validated).unwrap();
        assert!(record.status().is_terminal());
        assert!(record.transition(BackupStatus::Failed).is_err());
    }

    #[tokio::test]
    async fn test_drill_passes() {
        let sink = Arc::new(MemorySink::new());
        let report = chain(true, true, sink.clone()).run_drill().await;
        assert!(report.outcome.passed());
        let record = report.record.unwrap();
        assert_eq!(record.status(), BackupStatus::Validated);
        assert!(record.id().starts_with("backup_"));
        assert_eq!(sink.count(EventKind::Status), 1);
    }

    #[tokio::test]
    async fn test_failed_restore_never_validates() {
        let sink = Arc::new(MemorySink::new());
        let chain = chain(false, true, sink.clone());
        let mut record = chain.create_backup().await.unwrap();
        assert!(!chain.restore(&mut record).await);
        assert_eq!(record.status(), BackupStatus::Failed);
        assert!(!chain.validate(&mut record).await);
        assert_eq!(record.status(), BackupStatus::Failed);

        let report = chain.run_drill().await;
        assert_eq!(
            report.outcome,
            DrillOutcome::Failed {
                stage: DrillStage::Restore
            }
        );
        let events = sink.events();
        assert_eq!(events[0].kind, EventKind::Anomaly);
        assert_eq!(events[0].detail("stage").unwrap(), "restore");
    }

    #[tokio::test]
    async fn test_validation_failure_after_restore() {
        let sink = Arc::new(MemorySink::new());
        let report = chain(true, false, sink.clone()).run_drill().await;
        assert_eq!(
            report.outcome,
            DrillOutcome::Failed {
                stage: DrillStage::Validate
            }
        );
        assert_eq!(report.record.unwrap().status(), BackupStatus::Failed);
        assert_eq!(sink.count(EventKind::Anomaly), 1);
    }

    #[tokio::test]
    async fn test_backup_creation_failure() {
        let sink = Arc::new(MemorySink::new());
        let chain = RecoveryChain::new(Arc::new(BrokenStore), sink.clone());
        let report = chain.run_drill().await;
        assert!(report.record.is_none());
        assert_eq!(
            report.outcome,
            DrillOutcome::Failed {
                stage: DrillStage::Backup
            }
        );
        assert!(sink.events()[0].detail("backup_id").is_none());
    }
}
