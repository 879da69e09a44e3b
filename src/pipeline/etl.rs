//! ETL 管道：extract -> transform（值转大写）-> load
//!
//! 成功时上报 status 事件；load 失败时上报 anomaly 事件并返回错误。

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::error::{OrchestrationError, Result};
use crate::core::fault::{AlwaysSucceed, FaultSource};
use crate::observability::{EventSink, ObservabilityEvent};

pub const ETL_COMPLETED: &str = "ETL pipeline completed successfully";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EtlRecord {
    pub id: u32,
    pub value: String,
}

impl EtlRecord {
    pub fn new(id: u32, value: impl Into<String>) -> Self {
        Self {
            id,
            value: value.into(),
        }
    }
}

pub struct EtlPipeline {
    source: Vec<EtlRecord>,
    load_faults: Arc<dyn FaultSource>,
    sink: Arc<dyn EventSink>,
}

impl EtlPipeline {
    pub fn new(source: Vec<EtlRecord>, load_faults: Arc<dyn FaultSource>, sink: Arc<dyn EventSink>) -> Self {
        Self {
            source,
            load_faults,
            sink,
        }
    }

    /// 内置两条样例数据，load 总是成功
    pub fn sample(sink: Arc<dyn EventSink>) -> Self {
        Self::new(
            vec![EtlRecord::new(1, "raw1"), EtlRecord::new(2, "raw2")],
            Arc::new(AlwaysSucceed),
            sink,
        )
    }

    pub fn with_load_faults(mut self, faults: Arc<dyn FaultSource>) -> Self {
        self.load_faults = faults;
        self
    }

    pub fn extract(&self) -> Vec<EtlRecord> {
        tracing::info!(count = self.source.len(), "Extracting data from source");
        self.source.clone()
    }

    pub fn transform(&self, data: Vec<EtlRecord>) -> Vec<EtlRecord> {
        let transformed: Vec<_> = data
            .into_iter()
            .map(|r| EtlRecord::new(r.id, r.value.to_uppercase()))
            .collect();
        tracing::info!(count = transformed.len(), "Transformation complete");
        transformed
    }

    /// 返回写入条数
    pub fn load(&self, data: &[EtlRecord]) -> Result<usize> {
        tracing::info!(count = data.len(), "Loading data into target system");
        if self.load_faults.next_ok() {
            Ok(data.len())
        } else {
            Err(OrchestrationError::Backend("target system rejected load".to_string()))
        }
    }

    /// 跑完整条管道，返回已写入的数据
    pub async fn run(&self) -> Result<Vec<EtlRecord>> {
        let data = self.transform(self.extract());
        match self.load(&data) {
            Ok(loaded) => {
                tracing::info!(loaded, "ETL pipeline completed");
                self.sink.send(ObservabilityEvent::status(ETL_COMPLETED)).await;
                Ok(data)
            }
            Err(e) => {
                tracing::error!(error = %e, "ETL pipeline encountered an error");
                self.sink
                    .send(ObservabilityEvent::anomaly("ETL pipeline failed").with("error", e.to_string()))
                    .await;
                Err(e)
            }
        }
    }
}
