//! 优雅关闭
//!
//! 统一监听 Ctrl+C / SIGTERM，取消长驻循环（自愈监控、HTTP 服务），再依次执行收尾任务：
//! - 正在进行的修复动作跑完后再退出
//! - 最后一条状态事件发往观测服务

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::observability::{EventSink, ObservabilityEvent};

/// 关闭信号管理器
#[derive(Clone)]
pub struct ShutdownManager {
    shutdown_token: CancellationToken,
    reason_tx: broadcast::Sender<ShutdownReason>,
}

/// 关闭原因
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// Ctrl+C
    UserInitiated,
    /// SIGTERM
    Signal,
}

impl ShutdownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserInitiated => "user initiated",
            Self::Signal => "signal",
        }
    }
}

impl ShutdownManager {
    pub fn new() -> Self {
        let (reason_tx, _) = broadcast::channel(1);
        Self {
            shutdown_token: CancellationToken::new(),
            reason_tx,
        }
    }

    /// 取消 token，交给 HealthMonitor::run 等长驻循环
    pub fn token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn shutdown(&self, reason: ShutdownReason) {
        tracing::info!(reason = reason.as_str(), "Shutdown requested");
        let _ = self.reason_tx.send(reason);
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownReason> {
        self.reason_tx.subscribe()
    }

    pub async fn wait_for_shutdown(&self) {
        self.shutdown_token.cancelled().await;
    }

    /// 安装系统信号处理器 (Ctrl+C, SIGTERM)
    pub fn install_signal_handlers(self: &Arc<Self>) {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
                manager.shutdown(ShutdownReason::UserInitiated);
            }
        });

        #[cfg(unix)]
        {
            let manager = Arc::clone(self);
            tokio::spawn(async move {
                use tokio::signal::unix::{signal, SignalKind};
                if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                    sigterm.recv().await;
                    tracing::info!("Received SIGTERM, initiating graceful shutdown...");
                    manager.shutdown(ShutdownReason::Signal);
                }
            });
        }
    }
}

impl Default for ShutdownManager {
    fn default() -> Self {
        Self::new()
    }
}

/// 关闭时执行的收尾任务
#[async_trait::async_trait]
pub trait ShutdownCleanup: Send + Sync {
    async fn cleanup(&self) -> anyhow::Result<()>;

    /// 用于日志
    fn name(&self) -> &'static str;
}

/// 依次执行收尾任务，每个任务有独立超时
pub struct ShutdownCoordinator {
    manager: Arc<ShutdownManager>,
    cleanup_tasks: Vec<Arc<dyn ShutdownCleanup>>,
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(manager: Arc<ShutdownManager>) -> Self {
        Self {
            manager,
            cleanup_tasks: Vec::new(),
            timeout: Duration::from_secs(5),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn register<T: ShutdownCleanup + 'static>(&mut self, task: T) {
        self.cleanup_tasks.push(Arc::new(task));
    }

    /// 单个任务失败或超时只记日志，继续执行后面的任务
    pub async fn run_cleanup(&self) -> usize {
        tracing::info!("Running {} cleanup tasks...", self.cleanup_tasks.len());
        let mut succeeded = 0;

        for task in &self.cleanup_tasks {
            let name = task.name();
            match tokio::time::timeout(self.timeout, task.cleanup()).await {
                Ok(Ok(())) => {
                    tracing::info!("Cleanup task '{}' completed successfully", name);
                    succeeded += 1;
                }
                Ok(Err(e)) => {
                    tracing::warn!("Cleanup task '{}' failed: {}", name, e);
                }
                Err(_) => {
                    tracing::warn!(
                        "Cleanup task '{}' timed out after {}ms",
                        name,
                        self.timeout.as_millis()
                    );
                }
            }
        }

        tracing::info!("All cleanup tasks finished");
        succeeded
    }

    pub fn manager(&self) -> &Arc<ShutdownManager> {
        &self.manager
    }
}

/// 退出前向观测服务发送一条 status 事件
pub struct FinalStatusCleanup {
    sink: Arc<dyn EventSink>,
    component: &'static str,
}

impl FinalStatusCleanup {
    pub fn new(sink: Arc<dyn EventSink>, component: &'static str) -> Self {
        Self { sink, component }
    }
}

#[async_trait::async_trait]
impl ShutdownCleanup for FinalStatusCleanup {
    async fn cleanup(&self) -> anyhow::Result<()> {
        self.sink
            .send(ObservabilityEvent::status(format!("{} stopped", self.component)))
            .await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "FinalStatus"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::{EventKind, MemorySink};

    #[test]
    fn test_shutdown_manager_token() {
        let manager = ShutdownManager::new();
        let token = manager.token();
        assert!(!manager.is_shutdown());
        assert!(!token.is_cancelled());
        manager.shutdown(ShutdownReason::UserInitiated);
        assert!(manager.is_shutdown());
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_reason_broadcast() {
        let manager = ShutdownManager::new();
        let mut rx = manager.subscribe();
        manager.shutdown(ShutdownReason::Signal);
        assert_eq!(rx.recv().await.unwrap(), ShutdownReason::Signal);
        manager.wait_for_shutdown().await;
    }

    struct FailingCleanup;

    #[async_trait::async_trait]
    impl ShutdownCleanup for FailingCleanup {
        async fn cleanup(&self) -> anyhow::Result<()> {
            anyhow::bail!("disk full")
        }

        fn name(&self) -> &'static str {
            "Failing"
        }
    }

    #[tokio::test]
    async fn test_coordinator_runs_all_tasks() {
        let sink = Arc::new(MemorySink::new());
        let mut coordinator = ShutdownCoordinator::new(Arc::new(ShutdownManager::new()))
            .with_timeout(Duration::from_secs(1));
        coordinator.register(FailingCleanup);
        coordinator.register(FinalStatusCleanup::new(sink.clone(), "self-healing monitor"));

        assert_eq!(coordinator.run_cleanup().await, 1);
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Status);
        assert_eq!(
            events[0].detail("status").unwrap(),
            "self-healing monitor stopped"
        );
    }
}
