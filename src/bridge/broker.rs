//! Message broker worker pool: priority queue, dispatch via the target
//! chain's adapter, retry on failure with a fixed backoff schedule.

use super::RouteTable;
use crate::chain::ChainAdapter;
use crate::error::{Result, TrustWrapperError};
use crate::types::{
    now_unix_s, BridgeMessage, BridgeMessageStatus, BridgeMessageType, ChainType, Priority,
};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::cmp::Ordering;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Priority-ordered queue entry. Higher priority first, FIFO within the
/// same priority via the monotonic `seq` tiebreak.
struct QueueEntry {
    priority: Priority,
    seq: u64,
    message: BridgeMessage,
}

impl PartialEq for QueueEntry {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}
impl Eq for QueueEntry {}
impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| other.seq.cmp(&self.seq)) // lower seq = earlier = higher in max-heap
    }
}

const RETRY_BACKOFF_SECONDS: [u64; 4] = [1, 5, 15, 60];

pub struct MessageBroker {
    adapters: HashMap<ChainType, Arc<dyn ChainAdapter>>,
    routes: RwLock<RouteTable>,
    queue: Mutex<BinaryHeap<QueueEntry>>,
    pending: RwLock<HashMap<String, BridgeMessage>>,
    next_seq: std::sync::atomic::AtomicU64,
    max_retries: u32,
    dropped_requests: RwLock<HashSet<String>>,
}

impl MessageBroker {
    pub fn new(adapters: Vec<Arc<dyn ChainAdapter>>, max_retries: u32) -> Self {
        let chains: Vec<ChainType> = adapters.iter().map(|a| a.chain_type()).collect();
        let mut map = HashMap::new();
        for adapter in adapters {
            map.insert(adapter.chain_type(), adapter);
        }
        Self {
            adapters: map,
            routes: RwLock::new(RouteTable::from_chains(&chains)),
            queue: Mutex::new(BinaryHeap::new()),
            pending: RwLock::new(HashMap::new()),
            next_seq: std::sync::atomic::AtomicU64::new(0),
            max_retries,
            dropped_requests: RwLock::new(HashSet::new()),
        }
    }

    pub fn worker_count(&self) -> usize {
        5.min(self.adapters.len().max(1))
    }

    /// Enqueues a message after confirming an active route exists for
    /// `(source, target)` (I3 is already enforced by `RouteTable`).
    pub async fn enqueue(&self, message: BridgeMessage) -> Result<()> {
        {
            let routes = self.routes.read().await;
            if routes.get(message.source_chain, message.target_chain).is_none() {
                return Err(TrustWrapperError::BridgeRouteUnavailable {
                    source: message.source_chain.to_string(),
                    target: message.target_chain.to_string(),
                });
            }
        }
        let seq = self.next_seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.pending.write().await.insert(message.message_id.clone(), message.clone());
        self.queue.lock().await.push(QueueEntry {
            priority: message.priority,
            seq,
            message,
        });
        Ok(())
    }

    /// Drops all pending messages for a request id (used by the
    /// orchestrator on cancellation).
    pub async fn drop_pending_for_request(&self, request_id: &str) {
        self.dropped_requests.write().await.insert(request_id.to_string());
        let mut pending = self.pending.write().await;
        pending.retain(|_, m| !message_belongs_to(m, request_id));
    }

    /// Runs one worker iteration: dequeue, check expiry, dispatch, await
    /// confirmation, retry with backoff on failure. Returns the message's
    /// resulting status, or `None` if the queue was empty.
    pub async fn process_one(&self) -> Option<BridgeMessageStatus> {
        let entry = self.queue.lock().await.pop()?;
        let mut message = entry.message;

        if self.request_was_dropped(&message).await {
            self.pending.write().await.remove(&message.message_id);
            return Some(BridgeMessageStatus::Failed);
        }

        if now_unix_s() > message.deadline {
            message.status = BridgeMessageStatus::Timeout;
            self.pending.write().await.insert(message.message_id.clone(), message.clone());
            return Some(message.status);
        }

        let Some(adapter) = self.adapters.get(&message.target_chain) else {
            message.status = BridgeMessageStatus::Failed;
            return Some(message.status);
        };

        message.status = BridgeMessageStatus::Transmitted;

        let dispatch_result = match message.message_type {
            BridgeMessageType::ConsensusVote => {
                adapter
                    .submit_consensus_vote(&message.message_id, true, 1.0, 1.0)
                    .await
                    .map(|_| ())
            }
            _ => adapter.connect().await,
        };

        match dispatch_result {
            Ok(()) => {
                let confirmed = adapter
                    .confirm_message_delivery(&message.message_id)
                    .await
                    .unwrap_or(false);
                message.status = if confirmed {
                    BridgeMessageStatus::Confirmed
                } else {
                    BridgeMessageStatus::Transmitted
                };
                self.pending.write().await.insert(message.message_id.clone(), message.clone());
                Some(message.status)
            }
            Err(_) => {
                if message.retry_count >= self.max_retries.min(message.max_retries) {
                    message.status = BridgeMessageStatus::Failed;
                    self.pending.write().await.insert(message.message_id.clone(), message.clone());
                    return Some(message.status);
                }
                let backoff_idx = (message.retry_count as usize).min(RETRY_BACKOFF_SECONDS.len() - 1);
                let backoff = RETRY_BACKOFF_SECONDS[backoff_idx];
                message.retry_count += 1;
                tracing::debug!(message_id = %message.message_id, backoff_s = backoff, "retrying bridge message");
                let seq = self.next_seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                self.pending.write().await.insert(message.message_id.clone(), message.clone());
                self.queue.lock().await.push(QueueEntry {
                    priority: message.priority,
                    seq,
                    message,
                });
                Some(BridgeMessageStatus::Pending)
            }
        }
    }

    async fn request_was_dropped(&self, message: &BridgeMessage) -> bool {
        let request_id = extract_request_id(message);
        self.dropped_requests.read().await.contains(&request_id)
    }

    pub async fn status_of(&self, message_id: &str) -> Option<BridgeMessageStatus> {
        self.pending.read().await.get(message_id).map(|m| m.status)
    }
}

fn message_belongs_to(message: &BridgeMessage, request_id: &str) -> bool {
    extract_request_id(message) == request_id
}

/// The payload embeds the owning request id as its first 36 bytes (a
/// UUID string) by convention; messages constructed outside that
/// convention simply never match a drop filter.
fn extract_request_id(message: &BridgeMessage) -> String {
    String::from_utf8_lossy(message.payload.get(..36).unwrap_or(&message.payload)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::MockChainAdapter;
    use crate::types::ChainType;

    fn make_message(target: ChainType, priority: Priority) -> BridgeMessage {
        BridgeMessage {
            message_id: uuid::Uuid::new_v4().to_string(),
            message_type: BridgeMessageType::Sync,
            source_chain: ChainType::Ethereum,
            target_chain: target,
            payload: b"req-0000000000000000000000000000000000".to_vec(),
            priority,
            retry_count: 0,
            max_retries: 3,
            status: BridgeMessageStatus::Pending,
            created_at: now_unix_s(),
            deadline: now_unix_s() + 30,
        }
    }

    #[tokio::test]
    async fn enqueue_rejects_unknown_route() {
        let adapter = Arc::new(MockChainAdapter::new(ChainType::Ethereum));
        let broker = MessageBroker::new(vec![adapter], 3);
        let message = make_message(ChainType::Solana, Priority::Normal);
        assert!(broker.enqueue(message).await.is_err());
    }

    #[tokio::test]
    async fn happy_path_message_gets_confirmed() {
        let eth = Arc::new(MockChainAdapter::new(ChainType::Ethereum));
        let sol = Arc::new(MockChainAdapter::new(ChainType::Solana));
        sol.connect().await.unwrap();
        let broker = MessageBroker::new(vec![eth, sol.clone()], 3);
        let message = make_message(ChainType::Solana, Priority::High);
        let message_id = message.message_id.clone();
        broker.enqueue(message).await.unwrap();
        sol.mark_delivered(&message_id).await;

        let status = broker.process_one().await.unwrap();
        assert_eq!(status, BridgeMessageStatus::Confirmed);
    }

    #[tokio::test]
    async fn higher_priority_dequeues_first() {
        let eth = Arc::new(MockChainAdapter::new(ChainType::Ethereum));
        let sol = Arc::new(MockChainAdapter::new(ChainType::Solana));
        sol.connect().await.unwrap();
        let broker = MessageBroker::new(vec![eth, sol], 3);

        let low = make_message(ChainType::Solana, Priority::Low);
        let high = make_message(ChainType::Solana, Priority::Critical);
        let high_id = high.message_id.clone();
        broker.enqueue(low).await.unwrap();
        broker.enqueue(high).await.unwrap();

        broker.process_one().await;
        let status = broker.status_of(&high_id).await;
        assert!(status.is_some());
    }
}
