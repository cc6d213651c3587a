//! Oracle adapter (C1) and aggregator (C2).

mod aggregator;

pub use aggregator::OracleAggregator;

use crate::error::{Result, TrustWrapperError};
use crate::types::{OracleDataPoint, OracleDataType, OracleQuery};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleHealthStatus {
    Healthy,
    Degraded,
    Down,
}

#[derive(Debug, Clone)]
pub struct OracleHealth {
    pub status: OracleHealthStatus,
    pub success_rate: f64,
    pub avg_response_ms: f64,
}

/// Contract for a single external data source. Adapters never retry
/// internally; retry policy is the aggregator's job.
#[async_trait]
pub trait OracleAdapter: Send + Sync {
    fn id(&self) -> &str;
    fn supported_types(&self) -> &[OracleDataType];

    async fn connect(&self) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;
    async fn get_data(&self, query: &OracleQuery) -> Result<OracleDataPoint>;
    async fn get_latest(&self, data_type: OracleDataType) -> Result<Option<OracleDataPoint>>;
    async fn health(&self) -> OracleHealth;
}

/// In-memory adapter used by tests and by callers without a live price
/// feed. Deterministic: data is whatever was `seed`ed, returned as-is.
pub struct MockOracleAdapter {
    id: String,
    supported: Vec<OracleDataType>,
    connected: std::sync::atomic::AtomicBool,
    latest: Arc<RwLock<HashMap<OracleDataType, OracleDataPoint>>>,
    confidence_default: f64,
}

impl MockOracleAdapter {
    pub fn new(id: impl Into<String>, supported: Vec<OracleDataType>) -> Self {
        Self {
            id: id.into(),
            supported,
            connected: std::sync::atomic::AtomicBool::new(false),
            latest: Arc::new(RwLock::new(HashMap::new())),
            confidence_default: 0.80,
        }
    }

    pub async fn seed(&self, point: OracleDataPoint) {
        self.latest.write().await.insert(point.data_type, point);
    }
}

#[async_trait]
impl OracleAdapter for MockOracleAdapter {
    fn id(&self) -> &str {
        &self.id
    }

    fn supported_types(&self) -> &[OracleDataType] {
        &self.supported
    }

    async fn connect(&self) -> Result<()> {
        self.connected.store(true, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.store(false, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn get_data(&self, query: &OracleQuery) -> Result<OracleDataPoint> {
        if !self.connected.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(TrustWrapperError::OracleUnavailable(format!(
                "{} is not connected",
                self.id
            )));
        }
        self.latest
            .read()
            .await
            .get(&query.data_type)
            .cloned()
            .ok_or_else(|| TrustWrapperError::OracleUnavailable(format!(
                "{} has no data for {:?}",
                self.id, query.data_type
            )))
    }

    async fn get_latest(&self, data_type: OracleDataType) -> Result<Option<OracleDataPoint>> {
        Ok(self.latest.read().await.get(&data_type).cloned())
    }

    async fn health(&self) -> OracleHealth {
        OracleHealth {
            status: if self.connected.load(std::sync::atomic::Ordering::SeqCst) {
                OracleHealthStatus::Healthy
            } else {
                OracleHealthStatus::Down
            },
            success_rate: 1.0,
            avg_response_ms: 5.0,
        }
    }
}

impl MockOracleAdapter {
    pub fn default_confidence(&self) -> f64 {
        self.confidence_default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OracleValue, now_unix_s};
    use std::collections::BTreeMap;

    #[tokio::test]
    async fn mock_adapter_requires_connect() {
        let adapter = MockOracleAdapter::new("mock-1", vec![OracleDataType::Price]);
        let query = OracleQuery {
            query_id: "q1".into(),
            data_type: OracleDataType::Price,
            parameters: BTreeMap::new(),
            timeout_ms: 1000,
        };
        assert!(adapter.get_data(&query).await.is_err());
        adapter.connect().await.unwrap();
        adapter
            .seed(OracleDataPoint {
                oracle_id: "mock-1".into(),
                data_type: OracleDataType::Price,
                value: OracleValue::Numeric(100.0),
                timestamp: now_unix_s(),
                confidence: 0.95,
                source_address: None,
                metadata: BTreeMap::new(),
            })
            .await;
        let point = adapter.get_data(&query).await.unwrap();
        assert_eq!(point.value.as_numeric(), Some(100.0));
    }
}
