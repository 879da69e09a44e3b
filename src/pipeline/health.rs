//! 自愈监控：周期采样管道健康度，异常时触发修复
//!
//! 状态：Healthy -> Anomaly -> Remediating -> Healthy。
//! 单次迭代中的故障（采样失败、修复失败、超时或 panic）只记日志与计数，不会终止循环。
//! 取消只在迭代边界检查：正在进行的修复会先跑完。

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use rand::Rng;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::HealthSection;
use crate::core::error::{OrchestrationError, Result};
use crate::observability::{EventSink, ObservabilityEvent};

pub const ANOMALY_MESSAGE: &str = "Anomaly detected during health check";
pub const REMEDIATION_COMPLETED: &str = "remediation completed";
pub const REMEDIATION_FAILED: &str = "remediation failed";

/// 一次健康采样（不持久化）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSample {
    pub timestamp: DateTime<Utc>,
    pub error_count: u32,
    /// error_count > threshold
    pub anomaly: bool,
}

impl HealthSample {
    pub fn classify(error_count: u32, threshold: u32) -> Self {
        Self {
            timestamp: Utc::now(),
            error_count,
            anomaly: error_count > threshold,
        }
    }
}

/// 健康度采样：返回本周期的错误数
#[async_trait]
pub trait HealthSampler: Send + Sync {
    async fn error_count(&self) -> Result<u32>;
}

/// 随机采样 [0, max_errors]
#[derive(Debug, Clone, Copy)]
pub struct SimulatedSampler {
    max_errors: u32,
}

impl SimulatedSampler {
    pub fn new(max_errors: u32) -> Self {
        Self { max_errors }
    }
}

impl Default for SimulatedSampler {
    fn default() -> Self {
        Self::new(10)
    }
}

#[async_trait]
impl HealthSampler for SimulatedSampler {
    async fn error_count(&self) -> Result<u32> {
        let count = rand::thread_rng().gen_range(0..=self.max_errors);
        tracing::info!(error_count = count, "Simulated error count");
        Ok(count)
    }
}

/// 按给定序列返回采样结果；耗尽后返回 0
#[derive(Debug, Default)]
pub struct FixedSamples {
    samples: Mutex<VecDeque<Result<u32>>>,
}

impl FixedSamples {
    pub fn new(counts: impl IntoIterator<Item = u32>) -> Self {
        Self::from_results(counts.into_iter().map(Ok))
    }

    /// 可以混入 Err，用于模拟采样故障
    pub fn from_results(results: impl IntoIterator<Item = Result<u32>>) -> Self {
        Self {
            samples: Mutex::new(results.into_iter().collect()),
        }
    }
}

#[async_trait]
impl HealthSampler for FixedSamples {
    async fn error_count(&self) -> Result<u32> {
        match self.samples.lock() {
            Ok(mut samples) => samples.pop_front().unwrap_or(Ok(0)),
            Err(_) => Err(OrchestrationError::Sample("sample queue poisoned".to_string())),
        }
    }
}

/// 修复动作
#[async_trait]
pub trait Remediation: Send + Sync {
    async fn remediate(&self, sample: &HealthSample) -> Result<()>;

    fn name(&self) -> &str;
}

/// 监控状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorState {
    Healthy,
    Anomaly,
    Remediating,
}

/// 监控循环累计统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MonitorStats {
    pub iterations: u64,
    pub anomalies: u64,
    pub remediations: u64,
    /// 采样失败 + 修复失败 / 超时 / panic
    pub faults: u64,
}

/// 自愈监控
pub struct HealthMonitor {
    sampler: Arc<dyn HealthSampler>,
    remediation: Arc<dyn Remediation>,
    sink: Arc<dyn EventSink>,
    threshold: u32,
    interval: Duration,
    remediation_timeout: Duration,
    state: Mutex<MonitorState>,
    stats: Mutex<MonitorStats>,
}

impl HealthMonitor {
    pub fn new(
        sampler: Arc<dyn HealthSampler>,
        remediation: Arc<dyn Remediation>,
        sink: Arc<dyn EventSink>,
        cfg: &HealthSection,
    ) -> Self {
        Self {
            sampler,
            remediation,
            sink,
            threshold: cfg.anomaly_threshold,
            interval: cfg.interval(),
            remediation_timeout: cfg.remediation_timeout(),
            state: Mutex::new(MonitorState::Healthy),
            stats: Mutex::new(MonitorStats::default()),
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state.lock().map(|s| *s).unwrap_or(MonitorState::Healthy)
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats.lock().map(|s| *s).unwrap_or_default()
    }

    fn set_state(&self, state: MonitorState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    fn record(&self, f: impl FnOnce(&mut MonitorStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }

    /// 执行一次迭代；采样失败时返回 None
    pub async fn tick(&self) -> Option<HealthSample> {
        self.record(|s| s.iterations += 1);

        let error_count = match AssertUnwindSafe(self.sampler.error_count())
            .catch_unwind()
            .await
        {
            Ok(Ok(count)) => count,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Health sample failed");
                self.record(|s| s.faults += 1);
                return None;
            }
            Err(_) => {
                tracing::error!("Health sampler panicked");
                self.record(|s| s.faults += 1);
                return None;
            }
        };

        let sample = HealthSample::classify(error_count, self.threshold);
        if !sample.anomaly {
            self.set_state(MonitorState::Healthy);
            tracing::info!(error_count, "Pipeline health is normal");
            return Some(sample);
        }

        self.set_state(MonitorState::Anomaly);
        self.record(|s| s.anomalies += 1);
        tracing::warn!(error_count, "Anomaly detected, triggering remediation");
        self.sink
            .send(ObservabilityEvent::anomaly(ANOMALY_MESSAGE).with("error_count", error_count))
            .await;

        self.set_state(MonitorState::Remediating);
        let status = match tokio::time::timeout(
            self.remediation_timeout,
            AssertUnwindSafe(self.remediation.remediate(&sample)).catch_unwind(),
        )
        .await
        {
            Ok(Ok(Ok(()))) => {
                self.record(|s| s.remediations += 1);
                tracing::info!(action = self.remediation.name(), "Remediation completed");
                REMEDIATION_COMPLETED
            }
            Ok(Ok(Err(e))) => {
                self.record(|s| s.faults += 1);
                tracing::error!(action = self.remediation.name(), error = %e, "Remediation failed");
                REMEDIATION_FAILED
            }
            Ok(Err(_)) => {
                self.record(|s| s.faults += 1);
                tracing::error!(action = self.remediation.name(), "Remediation panicked");
                REMEDIATION_FAILED
            }
            Err(_) => {
                self.record(|s| s.faults += 1);
                tracing::error!(
                    action = self.remediation.name(),
                    timeout_ms = self.remediation_timeout.as_millis() as u64,
                    "Remediation timed out"
                );
                REMEDIATION_FAILED
            }
        };
        self.sink.send(ObservabilityEvent::status(status)).await;
        self.set_state(MonitorState::Healthy);
        Some(sample)
    }

    /// 按固定间隔循环直到 token 被取消（首个 tick 立即执行）
    pub async fn run(&self, token: CancellationToken) -> MonitorStats {
        tracing::info!(
            interval_ms = self.interval.as_millis() as u64,
            threshold = self.threshold,
            "Starting self-healing monitor"
        );
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
            }
            self.tick().await;
        }

        let stats = self.stats();
        tracing::info!(?stats, "Self-healing monitor stopped");
        stats
    }
}
