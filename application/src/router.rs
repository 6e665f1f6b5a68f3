//! In-memory message router for agent-to-agent communication.
//!
//! Each registered agent has a priority-ordered queue. Messages can be
//! sent directly, broadcast, or replied to; agents either poll with
//! `receive` or subscribe with a filter and get matching messages over a
//! channel. Messages may carry a TTL and expire unread.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use uuid::Uuid;

use concord_domain::protocol::Priority;
use concord_domain::util::current_timestamp_ms;

/// Recipient id used for broadcasts.
pub const BROADCAST: &str = "broadcast";

/// Delivery state of a routed message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    /// Queued, not yet seen by the recipient.
    Pending,
    /// Returned from `receive` at least once.
    Delivered,
    /// Marked read by the recipient.
    Read,
    /// Acknowledged and removed from the queue.
    Processed,
    /// A subscriber channel rejected the message.
    Failed,
    /// TTL elapsed before delivery.
    Expired,
}

/// A message in flight between agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutedMessage {
    pub id: Uuid,
    pub sender_id: String,
    /// Agent id, or [`BROADCAST`].
    pub recipient_id: String,
    pub kind: String,
    pub payload: Value,
    pub priority: Priority,
    pub status: MessageStatus,
    /// Groups a request/response thread.
    pub correlation_id: Uuid,
    /// Original message id when this is a reply.
    pub reply_to: Option<Uuid>,
    pub timestamp_ms: u64,
    pub expires_at_ms: Option<u64>,
}

impl RoutedMessage {
    fn is_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_some_and(|at| now_ms > at)
    }
}

/// Options for `send` and `broadcast`.
#[derive(Debug, Clone, Default)]
pub struct SendOptions {
    pub priority: Priority,
    pub ttl_ms: Option<u64>,
    pub correlation_id: Option<Uuid>,
    pub reply_to: Option<Uuid>,
    /// Broadcast only: agent ids skipped in addition to the sender.
    pub exclude: Vec<String>,
}

impl SendOptions {
    pub fn with_priority(priority: Priority) -> Self {
        Self {
            priority,
            ..Self::default()
        }
    }
}

/// Subscription filter. Empty filter matches everything.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    pub sender_id: Option<String>,
    pub kinds: Option<Vec<String>>,
    pub min_priority: Option<Priority>,
}

impl MessageFilter {
    fn matches(&self, message: &RoutedMessage) -> bool {
        if let Some(sender) = &self.sender_id {
            if &message.sender_id != sender {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.iter().any(|k| k == &message.kind) {
                return false;
            }
        }
        if let Some(min) = self.min_priority {
            if message.priority < min {
                return false;
            }
        }
        true
    }
}

/// Options for polling with `receive`.
#[derive(Debug, Clone, Default)]
pub struct ReceiveOptions {
    pub max_messages: Option<usize>,
    pub kinds: Option<Vec<String>>,
    pub min_priority: Option<Priority>,
    pub mark_as_read: bool,
}

struct Subscription {
    id: Uuid,
    agent_id: String,
    filter: MessageFilter,
    sender: mpsc::UnboundedSender<RoutedMessage>,
}

#[derive(Default)]
struct RouterState {
    /// Per-agent queues of message ids, ordered by priority then arrival.
    queues: HashMap<String, Vec<Uuid>>,
    subscriptions: Vec<Subscription>,
    messages: HashMap<Uuid, RoutedMessage>,
}

/// Router statistics snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterStats {
    pub total_messages: usize,
    pub pending_messages: usize,
    pub delivered_messages: usize,
    pub processed_messages: usize,
    pub agent_count: usize,
}

/// In-memory router. Cheap to share behind an `Arc`.
#[derive(Default)]
pub struct MessageRouter {
    state: Mutex<RouterState>,
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the agent's queue if it does not exist.
    pub fn register_agent(&self, agent_id: &str) {
        let mut state = self.lock();
        state.queues.entry(agent_id.to_string()).or_default();
    }

    /// Drop the agent's queue and subscriptions.
    pub fn unregister_agent(&self, agent_id: &str) {
        let mut state = self.lock();
        state.queues.remove(agent_id);
        state.subscriptions.retain(|s| s.agent_id != agent_id);
    }

    /// Queue a message for one recipient, creating its queue on demand.
    /// Returns a snapshot of the queued message.
    pub fn send(
        &self,
        sender_id: &str,
        recipient_id: &str,
        kind: &str,
        payload: Value,
        options: SendOptions,
    ) -> RoutedMessage {
        let message = self.build_message(sender_id, recipient_id, kind, payload, &options);
        let snapshot = message.clone();
        let mut state = self.lock();
        state.messages.insert(message.id, message);
        Self::enqueue(&mut state, recipient_id, snapshot.id, snapshot.priority);
        debug!(id = %snapshot.id, recipient_id, kind, "message queued");
        Self::notify(&mut state, recipient_id, &snapshot);
        snapshot
    }

    /// Queue a message for every registered agent except the sender and
    /// any excluded ids.
    pub fn broadcast(
        &self,
        sender_id: &str,
        kind: &str,
        payload: Value,
        options: SendOptions,
    ) -> RoutedMessage {
        let message = self.build_message(sender_id, BROADCAST, kind, payload, &options);
        let snapshot = message.clone();
        let mut state = self.lock();
        state.messages.insert(message.id, message);

        let recipients: Vec<String> = state
            .queues
            .keys()
            .filter(|id| id.as_str() != sender_id && !options.exclude.contains(id))
            .cloned()
            .collect();
        debug!(id = %snapshot.id, kind, recipients = recipients.len(), "broadcast queued");
        for recipient in &recipients {
            Self::enqueue(&mut state, recipient, snapshot.id, snapshot.priority);
            Self::notify(&mut state, recipient, &snapshot);
        }
        snapshot
    }

    /// Reply to a message, inheriting its correlation id. Returns `None`
    /// when the original message is unknown.
    pub fn reply(
        &self,
        original_id: Uuid,
        sender_id: &str,
        kind: &str,
        payload: Value,
        mut options: SendOptions,
    ) -> Option<RoutedMessage> {
        let (recipient, correlation_id) = {
            let state = self.lock();
            let original = state.messages.get(&original_id)?;
            (original.sender_id.clone(), original.correlation_id)
        };
        options.correlation_id = Some(correlation_id);
        options.reply_to = Some(original_id);
        Some(self.send(sender_id, &recipient, kind, payload, options))
    }

    /// Poll the agent's queue. Matching pending messages become
    /// delivered (and read, when requested); expired ones are skipped
    /// and marked.
    pub fn receive(&self, agent_id: &str, options: ReceiveOptions) -> Vec<RoutedMessage> {
        let mut state = self.lock();
        let now = current_timestamp_ms();
        let ids = state.queues.get(agent_id).cloned().unwrap_or_default();

        let mut out = Vec::new();
        for id in ids {
            if options.max_messages.is_some_and(|max| out.len() >= max) {
                break;
            }
            let Some(message) = state.messages.get_mut(&id) else {
                continue;
            };
            if message.status == MessageStatus::Expired {
                continue;
            }
            if message.is_expired(now) {
                message.status = MessageStatus::Expired;
                warn!(id = %message.id, "message expired before delivery");
                continue;
            }
            if let Some(kinds) = &options.kinds {
                if !kinds.iter().any(|k| k == &message.kind) {
                    continue;
                }
            }
            if options.min_priority.is_some_and(|min| message.priority < min) {
                continue;
            }
            if message.status == MessageStatus::Pending {
                message.status = MessageStatus::Delivered;
            }
            if options.mark_as_read && message.status == MessageStatus::Delivered {
                message.status = MessageStatus::Read;
            }
            out.push(message.clone());
        }
        out
    }

    /// Mark a message processed and drop it from its recipient's queue.
    pub fn acknowledge(&self, message_id: Uuid) -> bool {
        let mut state = self.lock();
        let Some(message) = state.messages.get_mut(&message_id) else {
            return false;
        };
        message.status = MessageStatus::Processed;
        let recipient = message.recipient_id.clone();
        if let Some(queue) = state.queues.get_mut(&recipient) {
            queue.retain(|&id| id != message_id);
        }
        true
    }

    /// Subscribe to messages for an agent. Matching messages are pushed
    /// over the returned channel as they are queued. Registers the agent
    /// as a side effect.
    pub fn subscribe(
        &self,
        agent_id: &str,
        filter: MessageFilter,
    ) -> (Uuid, mpsc::UnboundedReceiver<RoutedMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        let mut state = self.lock();
        state.queues.entry(agent_id.to_string()).or_default();
        state.subscriptions.push(Subscription {
            id,
            agent_id: agent_id.to_string(),
            filter,
            sender: tx,
        });
        (id, rx)
    }

    pub fn unsubscribe(&self, subscription_id: Uuid) -> bool {
        let mut state = self.lock();
        let before = state.subscriptions.len();
        state.subscriptions.retain(|s| s.id != subscription_id);
        state.subscriptions.len() < before
    }

    /// Pending or delivered messages waiting for an agent.
    pub fn pending_count(&self, agent_id: &str) -> usize {
        let state = self.lock();
        state
            .queues
            .get(agent_id)
            .map(|queue| {
                queue
                    .iter()
                    .filter_map(|id| state.messages.get(id))
                    .filter(|m| {
                        matches!(m.status, MessageStatus::Pending | MessageStatus::Delivered)
                    })
                    .count()
            })
            .unwrap_or(0)
    }

    /// All messages sharing a correlation id, oldest first.
    pub fn thread(&self, correlation_id: Uuid) -> Vec<RoutedMessage> {
        let state = self.lock();
        let mut messages: Vec<RoutedMessage> = state
            .messages
            .values()
            .filter(|m| m.correlation_id == correlation_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.timestamp_ms);
        messages
    }

    pub fn message(&self, message_id: Uuid) -> Option<RoutedMessage> {
        self.lock().messages.get(&message_id).cloned()
    }

    pub fn registered_agents(&self) -> Vec<String> {
        let mut agents: Vec<String> = self.lock().queues.keys().cloned().collect();
        agents.sort();
        agents
    }

    /// Mark every overdue, unprocessed message expired.
    pub fn expire_due(&self) -> usize {
        let mut state = self.lock();
        let now = current_timestamp_ms();
        let mut expired = 0;
        for message in state.messages.values_mut() {
            if message.is_expired(now)
                && !matches!(
                    message.status,
                    MessageStatus::Expired | MessageStatus::Processed
                )
            {
                message.status = MessageStatus::Expired;
                expired += 1;
            }
        }
        expired
    }

    pub fn clear_queue(&self, agent_id: &str) {
        let mut state = self.lock();
        if let Some(queue) = state.queues.get_mut(agent_id) {
            queue.clear();
        }
    }

    pub fn clear_all(&self) {
        let mut state = self.lock();
        state.queues.clear();
        state.messages.clear();
    }

    pub fn stats(&self) -> RouterStats {
        let state = self.lock();
        let mut stats = RouterStats {
            total_messages: state.messages.len(),
            agent_count: state.queues.len(),
            ..RouterStats::default()
        };
        for message in state.messages.values() {
            match message.status {
                MessageStatus::Pending => stats.pending_messages += 1,
                MessageStatus::Delivered | MessageStatus::Read => stats.delivered_messages += 1,
                MessageStatus::Processed => stats.processed_messages += 1,
                _ => {}
            }
        }
        stats
    }

    fn build_message(
        &self,
        sender_id: &str,
        recipient_id: &str,
        kind: &str,
        payload: Value,
        options: &SendOptions,
    ) -> RoutedMessage {
        let now = current_timestamp_ms();
        RoutedMessage {
            id: Uuid::new_v4(),
            sender_id: sender_id.to_string(),
            recipient_id: recipient_id.to_string(),
            kind: kind.to_string(),
            payload,
            priority: options.priority,
            status: MessageStatus::Pending,
            correlation_id: options.correlation_id.unwrap_or_else(Uuid::new_v4),
            reply_to: options.reply_to,
            timestamp_ms: now,
            expires_at_ms: options.ttl_ms.map(|ttl| now + ttl),
        }
    }

    /// Insert into the queue keeping higher priorities first and arrival
    /// order within a priority.
    fn enqueue(state: &mut RouterState, recipient_id: &str, id: Uuid, priority: Priority) {
        let queue = state.queues.entry(recipient_id.to_string()).or_default();
        let at = queue
            .iter()
            .position(|qid| {
                state
                    .messages
                    .get(qid)
                    .is_some_and(|m| m.priority < priority)
            })
            .unwrap_or(queue.len());
        queue.insert(at, id);
    }

    /// Push to matching subscribers. A closed channel marks the message
    /// failed but never affects other subscribers.
    fn notify(state: &mut RouterState, recipient_id: &str, message: &RoutedMessage) {
        let mut failed = false;
        for sub in &state.subscriptions {
            if sub.agent_id != recipient_id || !sub.filter.matches(message) {
                continue;
            }
            if sub.sender.send(message.clone()).is_err() {
                warn!(id = %message.id, agent = %sub.agent_id, "subscriber channel closed");
                failed = true;
            }
        }
        if failed {
            if let Some(stored) = state.messages.get_mut(&message.id) {
                stored.status = MessageStatus::Failed;
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RouterState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}
