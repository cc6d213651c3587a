//! Bridge routes: health-scored `(source, target)` pairs. Self-routes are
//! rejected at construction (I3).

use crate::types::ChainType;
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct BridgeRoute {
    pub source: ChainType,
    pub target: ChainType,
    pub health_score: f64,
    pub latency_ms: f64,
    pub throughput_msg_s: f64,
    pub reliability: f64,
    pub active: bool,
}

impl BridgeRoute {
    pub fn new(source: ChainType, target: ChainType) -> Option<Self> {
        if source == target {
            return None;
        }
        Some(Self {
            source,
            target,
            health_score: 1.0,
            latency_ms: 0.0,
            throughput_msg_s: 0.0,
            reliability: 1.0,
            active: true,
        })
    }
}

/// Holds one route per `(source, target)` pair. Produced as all pairs over
/// a chain set, `src != dst`, then filtered by health.
pub struct RouteTable {
    routes: HashMap<(ChainType, ChainType), BridgeRoute>,
}

impl RouteTable {
    pub fn from_chains(chains: &[ChainType]) -> Self {
        let mut routes = HashMap::new();
        for &source in chains {
            for &target in chains {
                if let Some(route) = BridgeRoute::new(source, target) {
                    routes.insert((source, target), route);
                }
            }
        }
        Self { routes }
    }

    pub fn get(&self, source: ChainType, target: ChainType) -> Option<&BridgeRoute> {
        self.routes.get(&(source, target))
    }

    pub fn update_health(&mut self, source: ChainType, target: ChainType, health_score: f64) {
        if let Some(route) = self.routes.get_mut(&(source, target)) {
            route.health_score = health_score;
            route.active = health_score >= 0.2;
        }
    }

    /// Active routes, filtered by health, for dispatch fan-out.
    pub fn active_routes_from(&self, source: ChainType) -> Vec<&BridgeRoute> {
        self.routes
            .values()
            .filter(|r| r.source == source && r.active)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_route_is_rejected() {
        assert!(BridgeRoute::new(ChainType::Ethereum, ChainType::Ethereum).is_none());
    }

    #[test]
    fn route_table_covers_all_ordered_pairs() {
        let chains = vec![ChainType::Ethereum, ChainType::Solana, ChainType::Cardano];
        let table = RouteTable::from_chains(&chains);
        assert_eq!(table.routes.len(), 6); // 3*2 ordered pairs, no self-routes
        assert!(table.get(ChainType::Ethereum, ChainType::Solana).is_some());
        assert!(table.get(ChainType::Ethereum, ChainType::Ethereum).is_none());
    }
}
