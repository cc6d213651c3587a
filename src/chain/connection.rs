//! Connection manager (C7): pools adapters by chain type, reconnects with
//! exponential backoff, and runs a background health probe loop.

use super::ChainAdapter;
use crate::types::ChainType;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct HealthRecord {
    pub consecutive_failures: u32,
    pub avg_response_ms: f64,
    pub last_error: Option<String>,
    pub connected: bool,
}

impl Default for HealthRecord {
    fn default() -> Self {
        Self {
            consecutive_failures: 0,
            avg_response_ms: 0.0,
            last_error: None,
            connected: false,
        }
    }
}

pub struct ConnectionManagerConfig {
    pub max_retry_attempts: u32,
    pub connection_timeout: Duration,
    pub health_check_interval: Duration,
}

impl Default for ConnectionManagerConfig {
    fn default() -> Self {
        Self {
            max_retry_attempts: 3,
            connection_timeout: Duration::from_secs(10),
            health_check_interval: Duration::from_secs(30),
        }
    }
}

struct Entry {
    adapter: Arc<dyn ChainAdapter>,
    health: HealthRecord,
}

/// Owns the adapter pool. Mutated only through its own methods (the
/// single-writer discipline a node's connection pool typically enforces),
/// with a background task driving periodic health probes.
pub struct ConnectionManager {
    config: ConnectionManagerConfig,
    pool: Arc<RwLock<HashMap<ChainType, Entry>>>,
    monitor: RwLock<Option<JoinHandle<()>>>,
}

impl ConnectionManager {
    pub fn new(config: ConnectionManagerConfig) -> Self {
        Self {
            config,
            pool: Arc::new(RwLock::new(HashMap::new())),
            monitor: RwLock::new(None),
        }
    }

    pub async fn register(&self, adapter: Arc<dyn ChainAdapter>) {
        let chain_type = adapter.chain_type();
        self.pool.write().await.insert(
            chain_type,
            Entry {
                adapter,
                health: HealthRecord::default(),
            },
        );
    }

    /// Connects an adapter with exponential backoff (`2^attempt` seconds,
    /// capped by `max_retry_attempts`).
    pub async fn connect_with_backoff(&self, chain_type: ChainType) -> bool {
        let adapter = {
            let pool = self.pool.read().await;
            match pool.get(&chain_type) {
                Some(entry) => entry.adapter.clone(),
                None => return false,
            }
        };

        for attempt in 0..self.config.max_retry_attempts {
            let connect = tokio::time::timeout(self.config.connection_timeout, adapter.connect());
            match connect.await {
                Ok(Ok(())) => {
                    self.record_success(chain_type).await;
                    return true;
                }
                Ok(Err(e)) => self.record_failure(chain_type, e.to_string()).await,
                Err(_) => self.record_failure(chain_type, "connect timed out".into()).await,
            }
            let backoff = Duration::from_secs(2u64.saturating_pow(attempt));
            tokio::time::sleep(backoff).await;
        }
        false
    }

    async fn record_success(&self, chain_type: ChainType) {
        if let Some(entry) = self.pool.write().await.get_mut(&chain_type) {
            entry.health.consecutive_failures = 0;
            entry.health.connected = true;
            entry.health.last_error = None;
        }
    }

    async fn record_failure(&self, chain_type: ChainType, error: String) {
        if let Some(entry) = self.pool.write().await.get_mut(&chain_type) {
            entry.health.consecutive_failures += 1;
            entry.health.connected = false;
            entry.health.last_error = Some(error);
        }
    }

    /// Excludes adapters whose `consecutive_failures >= max_retry_attempts`.
    pub async fn get_healthy_adapters(&self) -> Vec<Arc<dyn ChainAdapter>> {
        self.pool
            .read()
            .await
            .values()
            .filter(|entry| entry.health.consecutive_failures < self.config.max_retry_attempts)
            .map(|entry| entry.adapter.clone())
            .collect()
    }

    pub async fn health_of(&self, chain_type: ChainType) -> Option<HealthRecord> {
        self.pool.read().await.get(&chain_type).map(|e| e.health.clone())
    }

    /// Spawns the background probe loop. Each tick calls
    /// `get_chain_metrics` on every registered adapter; success resets the
    /// failure count, failure increments it and triggers a reconnect once
    /// the threshold (>=3) is crossed.
    pub fn start_monitor(self: &Arc<Self>) {
        let manager = self.clone();
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(manager.config.health_check_interval);
            loop {
                interval.tick().await;
                let chain_types: Vec<ChainType> = manager.pool.read().await.keys().copied().collect();
                for chain_type in chain_types {
                    manager.probe_once(chain_type).await;
                }
            }
        });
        // start_monitor may be called more than once in tests; only the
        // most recent handle is retained, previous ones are aborted.
        if let Ok(mut guard) = self.monitor.try_write() {
            if let Some(previous) = guard.replace(handle) {
                previous.abort();
            }
        }
    }

    async fn probe_once(&self, chain_type: ChainType) {
        let adapter = {
            let pool = self.pool.read().await;
            match pool.get(&chain_type) {
                Some(entry) => entry.adapter.clone(),
                None => return,
            }
        };
        match adapter.get_chain_metrics().await {
            Ok(_) => self.record_success(chain_type).await,
            Err(e) => {
                self.record_failure(chain_type, e.to_string()).await;
                let failures = self
                    .pool
                    .read()
                    .await
                    .get(&chain_type)
                    .map(|e| e.health.consecutive_failures)
                    .unwrap_or(0);
                if failures >= 3 {
                    tracing::warn!(chain = %chain_type, "adapter unhealthy, attempting reconnect");
                    self.connect_with_backoff(chain_type).await;
                }
            }
        }
    }

    /// Drains the monitor task before callers drop the manager.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.monitor.write().await.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainAdapter;

    #[tokio::test]
    async fn healthy_adapters_exclude_repeatedly_failing_ones() {
        let manager = ConnectionManager::new(ConnectionManagerConfig {
            max_retry_attempts: 3,
            connection_timeout: Duration::from_millis(50),
            health_check_interval: Duration::from_secs(3600),
        });
        let adapter = Arc::new(MockChainAdapter::new(ChainType::Ethereum));
        manager.register(adapter.clone()).await;

        for _ in 0..3 {
            manager.record_failure(ChainType::Ethereum, "boom".into()).await;
        }
        assert!(manager.get_healthy_adapters().await.is_empty());

        manager.record_success(ChainType::Ethereum).await;
        assert_eq!(manager.get_healthy_adapters().await.len(), 1);
    }
}
