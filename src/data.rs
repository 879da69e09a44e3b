//! 数据基础设施：各数据连接器的连接状态
//!
//! 连接器只报告状态，不做读写；GET /api/data 直接返回 status_report()。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::error::{OrchestrationError, Result};
use crate::core::fault::{AlwaysSucceed, FaultSource};

/// 外部数据系统连接器
#[async_trait]
pub trait DataConnector: Send + Sync {
    fn name(&self) -> &str;

    /// 建立 / 检查连接，返回状态文本
    async fn connect(&self) -> Result<String>;
}

/// 模拟连接器：按故障源返回 "connected" 或错误
pub struct SimulatedConnector {
    name: String,
    faults: Arc<dyn FaultSource>,
}

impl SimulatedConnector {
    pub fn new(name: impl Into<String>, faults: Arc<dyn FaultSource>) -> Self {
        Self {
            name: name.into(),
            faults,
        }
    }

    pub fn healthy(name: impl Into<String>) -> Self {
        Self::new(name, Arc::new(AlwaysSucceed))
    }
}

#[async_trait]
impl DataConnector for SimulatedConnector {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<String> {
        if self.faults.next_ok() {
            tracing::info!(connector = %self.name, "Connected");
            Ok("connected".to_string())
        } else {
            Err(OrchestrationError::Backend(format!("{} unreachable", self.name)))
        }
    }
}

/// 连接器集合
pub struct DataInfrastructure {
    connectors: Vec<Arc<dyn DataConnector>>,
}

impl DataInfrastructure {
    pub fn new(connectors: Vec<Arc<dyn DataConnector>>) -> Self {
        Self { connectors }
    }

    /// snowflake / redpanda / placeholder_services 三个模拟连接器
    pub fn simulated() -> Self {
        Self::new(vec![
            Arc::new(SimulatedConnector::healthy("snowflake")),
            Arc::new(SimulatedConnector::healthy("redpanda")),
            Arc::new(SimulatedConnector::healthy("placeholder_services")),
        ])
    }

    pub fn connector_names(&self) -> Vec<&str> {
        self.connectors.iter().map(|c| c.name()).collect()
    }

    /// 并发检查所有连接器；失败的连接器状态为 "error: ..."
    pub async fn status_report(&self) -> BTreeMap<String, String> {
        let checks = self.connectors.iter().map(|c| async move {
            let status = match c.connect().await {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!(connector = c.name(), error = %e, "Connector check failed");
                    format!("error: {e}")
                }
            };
            (c.name().to_string(), status)
        });
        futures_util::future::join_all(checks).await.into_iter().collect()
    }
}

impl Default for DataInfrastructure {
    fn default() -> Self {
        Self::simulated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fault::AlwaysFail;

    #[tokio::test]
    async fn test_simulated_report() {
        let report = DataInfrastructure::simulated().status_report().await;
        assert_eq!(report.len(), 3);
        assert_eq!(report["snowflake"], "connected");
        assert_eq!(report["redpanda"], "connected");
        assert_eq!(report["placeholder_services"], "connected");
    }

    #[tokio::test]
    async fn test_failed_connector_reported() {
        let infra = DataInfrastructure::new(vec![
            Arc::new(SimulatedConnector::healthy("snowflake")),
            Arc::new(SimulatedConnector::new("redpanda", Arc::new(AlwaysFail))),
        ]);
        let report = infra.status_report().await;
        assert_eq!(report["snowflake"], "connected");
        assert!(report["redpanda"].starts_with("error: "));
        assert_eq!(infra.connector_names(), vec!["snowflake", "redpanda"]);
    }
}
