//! Bridge message broker (C8): typed, priority-queued, retried cross-chain
//! message delivery over the routes produced by `route`.

mod broker;
mod route;

pub use broker::MessageBroker;
pub use route::{BridgeRoute, RouteTable};
