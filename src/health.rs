//! Bridge health monitor (C11): per-route rolling metrics, composite
//! health score, and asynchronous alert callbacks.

use crate::types::ChainType;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

const ROLLING_WINDOW_SAMPLES: usize = 20;
const DEFAULT_TARGET_LATENCY_MS: f64 = 200.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertKind {
    RouteDown,
    HighLatency,
    ConsensusTimeout,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub kind: AlertKind,
    pub route: (ChainType, ChainType),
    pub message: String,
}

#[derive(Debug, Clone, Default)]
struct RouteSamples {
    latency_ms: VecDeque<f64>,
    errors: VecDeque<bool>,
    uptime_samples: VecDeque<bool>,
    throughput_msg_s: f64,
    high_latency_streak: u32,
}

impl RouteSamples {
    fn push(&mut self, latency_ms: f64, errored: bool, up: bool) {
        push_bounded(&mut self.latency_ms, latency_ms);
        push_bounded(&mut self.errors, errored);
        push_bounded(&mut self.uptime_samples, up);
    }

    fn error_rate(&self) -> f64 {
        if self.errors.is_empty() {
            return 0.0;
        }
        self.errors.iter().filter(|e| **e).count() as f64 / self.errors.len() as f64
    }

    fn uptime_pct(&self) -> f64 {
        if self.uptime_samples.is_empty() {
            return 1.0;
        }
        self.uptime_samples.iter().filter(|u| **u).count() as f64 / self.uptime_samples.len() as f64
    }

    fn avg_latency_ms(&self) -> f64 {
        if self.latency_ms.is_empty() {
            return 0.0;
        }
        self.latency_ms.iter().sum::<f64>() / self.latency_ms.len() as f64
    }

    /// `health = uptime * (1 - clamp(error_rate, 0, 0.15)) * min(1, target_latency / observed_latency)`.
    fn health_score(&self, target_latency_ms: f64) -> f64 {
        let observed = self.avg_latency_ms().max(1.0);
        let latency_factor = (target_latency_ms / observed).min(1.0);
        let error_penalty = 1.0 - self.error_rate().clamp(0.0, 0.15);
        (self.uptime_pct() * error_penalty * latency_factor).clamp(0.0, 1.0)
    }
}

fn push_bounded<T>(deque: &mut VecDeque<T>, value: T) {
    deque.push_back(value);
    if deque.len() > ROLLING_WINDOW_SAMPLES {
        deque.pop_front();
    }
}

type AlertCallback = Arc<dyn Fn(Alert) + Send + Sync>;

/// Owns rolling metrics per route and invokes registered callbacks
/// asynchronously; never blocks the recording path on a callback.
pub struct HealthMonitor {
    routes: RwLock<HashMap<(ChainType, ChainType), RouteSamples>>,
    callbacks: RwLock<HashMap<&'static str, Vec<AlertCallback>>>,
    target_latency_ms: f64,
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            callbacks: RwLock::new(HashMap::new()),
            target_latency_ms: DEFAULT_TARGET_LATENCY_MS,
        }
    }

    pub async fn register_callback(&self, kind: AlertKind, callback: AlertCallback) {
        let key = match kind {
            AlertKind::RouteDown => "route_down",
            AlertKind::HighLatency => "high_latency",
            AlertKind::ConsensusTimeout => "consensus_timeout",
        };
        self.callbacks.write().await.entry(key).or_default().push(callback);
    }

    async fn fire(&self, alert: Alert) {
        let key = match alert.kind {
            AlertKind::RouteDown => "route_down",
            AlertKind::HighLatency => "high_latency",
            AlertKind::ConsensusTimeout => "consensus_timeout",
        };
        let callbacks = self.callbacks.read().await.get(key).cloned().unwrap_or_default();
        for callback in callbacks {
            let alert = alert.clone();
            // Never block recording on a slow callback.
            tokio::spawn(async move {
                callback(alert);
            });
        }
    }

    pub async fn record_sample(
        &self,
        route: (ChainType, ChainType),
        latency_ms: f64,
        errored: bool,
        up: bool,
    ) {
        let health = {
            let mut routes = self.routes.write().await;
            let samples = routes.entry(route).or_default();
            samples.push(latency_ms, errored, up);
            if latency_ms > self.target_latency_ms * 2.0 {
                samples.high_latency_streak += 1;
            } else {
                samples.high_latency_streak = 0;
            }
            (samples.health_score(self.target_latency_ms), samples.high_latency_streak)
        };

        if health.0 < 0.2 {
            self.fire(Alert {
                kind: AlertKind::RouteDown,
                route,
                message: format!("health score {:.3} below 0.2", health.0),
            })
            .await;
        }
        if health.1 >= 3 {
            self.fire(Alert {
                kind: AlertKind::HighLatency,
                route,
                message: format!("latency above 2x baseline for {} samples", health.1),
            })
            .await;
        }
    }

    pub async fn report_consensus_timeout(&self, route: (ChainType, ChainType)) {
        self.fire(Alert {
            kind: AlertKind::ConsensusTimeout,
            route,
            message: "consensus instance timed out".to_string(),
        })
        .await;
    }

    pub async fn health_score(&self, route: (ChainType, ChainType)) -> Option<f64> {
        self.routes
            .read()
            .await
            .get(&route)
            .map(|s| s.health_score(self.target_latency_ms))
    }
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn route_down_alert_fires_below_threshold() {
        let monitor = HealthMonitor::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        monitor
            .register_callback(
                AlertKind::RouteDown,
                Arc::new(move |_alert| {
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .await;

        let route = (ChainType::Ethereum, ChainType::Solana);
        for _ in 0..5 {
            monitor.record_sample(route, 5000.0, true, false).await;
        }
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(fired.load(Ordering::SeqCst) > 0);
    }

    #[tokio::test]
    async fn healthy_route_scores_near_one() {
        let monitor = HealthMonitor::new();
        let route = (ChainType::Ethereum, ChainType::Solana);
        for _ in 0..5 {
            monitor.record_sample(route, 50.0, false, true).await;
        }
        let score = monitor.health_score(route).await.unwrap();
        assert!(score > 0.9, "score was {score}");
    }
}
