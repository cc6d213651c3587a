//! Oracle aggregator (C2): fans a query out to N adapters in parallel and
//! applies the numeric/non-numeric consensus rules.

use super::OracleAdapter;
use crate::types::{now_unix_s, OracleConsensus, OracleDataType, OracleQuery, OracleValue};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

pub struct OracleAggregator {
    adapters: Vec<Arc<dyn OracleAdapter>>,
    /// `adapter.reliability` weight, keyed by adapter id; defaults to 1.0.
    reliability: HashMap<String, f64>,
}

impl OracleAggregator {
    pub fn new(adapters: Vec<Arc<dyn OracleAdapter>>) -> Self {
        Self {
            adapters,
            reliability: HashMap::new(),
        }
    }

    pub fn set_reliability(&mut self, adapter_id: impl Into<String>, reliability: f64) {
        self.reliability.insert(adapter_id.into(), reliability.clamp(0.0, 1.0));
    }

    fn reliability_of(&self, adapter_id: &str) -> f64 {
        *self.reliability.get(adapter_id).unwrap_or(&1.0)
    }

    /// Runs the query against every adapter with a per-adapter timeout,
    /// within a global deadline, then applies the consensus rule.
    pub async fn aggregate(
        &self,
        query: &OracleQuery,
        per_adapter_timeout: Duration,
        global_deadline: Duration,
        freshness_window_s: u64,
        deviation_threshold: f64,
    ) -> Option<OracleConsensus> {
        let fetches = self.adapters.iter().map(|adapter| {
            let adapter = adapter.clone();
            let query = query.clone();
            async move {
                tokio::time::timeout(per_adapter_timeout, adapter.get_data(&query))
                    .await
                    .ok()
                    .and_then(|r| r.ok())
                    .map(|point| (adapter.id().to_string(), point))
            }
        });

        let results = tokio::time::timeout(global_deadline, futures::future::join_all(fetches))
            .await
            .unwrap_or_default();

        let now = now_unix_s();
        let fresh: Vec<_> = results
            .into_iter()
            .flatten()
            .filter(|(_, point)| now.saturating_sub(point.timestamp) <= freshness_window_s)
            .collect();

        if fresh.is_empty() {
            return None;
        }

        match &fresh[0].1.value {
            OracleValue::Numeric(_) => {
                Some(self.aggregate_numeric(query.data_type, &fresh, deviation_threshold))
            }
            OracleValue::Text(_) => Some(self.aggregate_categorical(query.data_type, &fresh)),
        }
    }

    fn aggregate_numeric(
        &self,
        data_type: OracleDataType,
        fresh: &[(String, crate::types::OracleDataPoint)],
        deviation_threshold: f64,
    ) -> OracleConsensus {
        let values: Vec<f64> = fresh.iter().filter_map(|(_, p)| p.value.as_numeric()).collect();
        let avg = values.iter().sum::<f64>() / values.len() as f64;

        let max_deviation = if avg.abs() > f64::EPSILON {
            values
                .iter()
                .map(|v| ((v - avg) / avg).abs())
                .fold(0.0_f64, f64::max)
        } else {
            0.0
        };

        let consensus_achieved = values.len() >= 2 && max_deviation <= deviation_threshold;

        let now = now_unix_s();
        let total_weight: f64 = fresh
            .iter()
            .map(|(id, point)| {
                let age = now.saturating_sub(point.timestamp) as f64;
                let freshness_factor = (1.0 - age / (data_type.default_freshness_window_s() as f64 + 1.0)).max(0.0);
                self.reliability_of(id) * freshness_factor
            })
            .sum();

        let aggregated_confidence = if total_weight > 0.0 {
            fresh
                .iter()
                .map(|(id, point)| {
                    let age = now.saturating_sub(point.timestamp) as f64;
                    let freshness_factor =
                        (1.0 - age / (data_type.default_freshness_window_s() as f64 + 1.0)).max(0.0);
                    point.confidence * self.reliability_of(id) * freshness_factor
                })
                .sum::<f64>()
                / total_weight
        } else {
            values.iter().sum::<f64>() / values.len().max(1) as f64 * 0.0
        };

        let value = if consensus_achieved || values.len() < 2 {
            avg
        } else {
            median(&values)
        };

        OracleConsensus {
            data_type,
            value: OracleValue::Numeric(value),
            confidence: aggregated_confidence,
            consensus_achieved,
            max_deviation,
            contributing_sources: fresh.len(),
        }
    }

    fn aggregate_categorical(
        &self,
        data_type: OracleDataType,
        fresh: &[(String, crate::types::OracleDataPoint)],
    ) -> OracleConsensus {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for (_, point) in fresh {
            if let OracleValue::Text(text) = &point.value {
                *counts.entry(text.clone()).or_insert(0) += 1;
            }
        }
        let total = fresh.len().max(1);
        let (winner, count) = counts
            .into_iter()
            .max_by_key(|(_, c)| *c)
            .unwrap_or(("".to_string(), 0));

        OracleConsensus {
            data_type,
            value: OracleValue::Text(winner),
            confidence: count as f64 / total as f64,
            consensus_achieved: true,
            max_deviation: 0.0,
            contributing_sources: fresh.len(),
        }
    }
}

fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::MockOracleAdapter;
    use crate::types::OracleDataPoint;
    use std::collections::BTreeMap;

    async fn seeded_adapter(id: &str, value: f64, confidence: f64) -> Arc<dyn OracleAdapter> {
        let adapter = Arc::new(MockOracleAdapter::new(id, vec![OracleDataType::Price]));
        adapter.connect().await.unwrap();
        adapter
            .seed(OracleDataPoint {
                oracle_id: id.into(),
                data_type: OracleDataType::Price,
                value: OracleValue::Numeric(value),
                timestamp: now_unix_s(),
                confidence,
                source_address: None,
                metadata: BTreeMap::new(),
            })
            .await;
        adapter
    }

    #[tokio::test]
    async fn consensus_achieved_within_deviation_threshold() {
        let adapters = vec![
            seeded_adapter("a", 100.0, 0.95).await,
            seeded_adapter("b", 100.5, 0.90).await,
            seeded_adapter("c", 99.8, 0.92).await,
        ];
        let aggregator = OracleAggregator::new(adapters);
        let query = OracleQuery {
            query_id: "q1".into(),
            data_type: OracleDataType::Price,
            parameters: BTreeMap::new(),
            timeout_ms: 1000,
        };
        let result = aggregator
            .aggregate(
                &query,
                Duration::from_millis(200),
                Duration::from_secs(1),
                300,
                0.02,
            )
            .await
            .unwrap();
        assert!(result.consensus_achieved);
        assert_eq!(result.contributing_sources, 3);
    }

    #[tokio::test]
    async fn deviation_exceeding_threshold_fails_consensus() {
        let adapters = vec![
            seeded_adapter("a", 100.0, 0.95).await,
            seeded_adapter("b", 140.0, 0.90).await,
        ];
        let aggregator = OracleAggregator::new(adapters);
        let query = OracleQuery {
            query_id: "q1".into(),
            data_type: OracleDataType::Price,
            parameters: BTreeMap::new(),
            timeout_ms: 1000,
        };
        let result = aggregator
            .aggregate(
                &query,
                Duration::from_millis(200),
                Duration::from_secs(1),
                300,
                0.02,
            )
            .await
            .unwrap();
        assert!(!result.consensus_achieved);
    }
}
