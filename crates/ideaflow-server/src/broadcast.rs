//! Progress event and team-chat broadcasting.
//!
//! An explicit registry of per-key broadcast senders, created at process
//! start and injected wherever events are published - never an ambient
//! singleton. Progress channels are keyed by conversation or team id; the
//! team chat gets its own registry keyed by team id.
//!
//! Delivery is at-most-once and fire-and-forget: each subscriber gets a
//! bounded ring buffer and a slow subscriber observes `Lagged` (oldest
//! events dropped) instead of ever blocking the publisher.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use ideaflow_core::{ConversationId, ProgressEvent, TeamId, TeamMessage};

/// Per-subscriber buffer capacity; overflow drops the oldest events.
pub const CHANNEL_CAPACITY: usize = 64;

/// Grace period before a terminal run's conversation channel is removed.
const CHANNEL_LINGER: Duration = Duration::from_secs(5);

/// Key for a progress broadcast channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKey {
    Conversation(ConversationId),
    Team(TeamId),
}

/// Registry of live broadcast channels for one payload type.
///
/// Lifecycle: created once at startup; entries are created lazily on first
/// publish/subscribe and removed explicitly (with a linger) when the
/// producing run completes.
pub struct BroadcastRegistry<K, T> {
    channels: RwLock<HashMap<K, broadcast::Sender<T>>>,
}

/// Progress events, keyed by conversation or team.
pub type ChannelRegistry = BroadcastRegistry<ChannelKey, ProgressEvent>;

/// Team chat fan-out, keyed by team.
pub type TeamChatRegistry = BroadcastRegistry<TeamId, TeamMessage>;

impl<K, T> BroadcastRegistry<K, T>
where
    K: Eq + Hash + Clone + Send + Sync + std::fmt::Debug + 'static,
    T: Clone + Send + 'static,
{
    /// Create an empty registry.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            channels: RwLock::new(HashMap::new()),
        })
    }

    /// Get or create the sender for a key.
    pub async fn sender(&self, key: &K) -> broadcast::Sender<T> {
        if let Some(tx) = self.channels.read().await.get(key) {
            return tx.clone();
        }
        let mut channels = self.channels.write().await;
        channels
            .entry(key.clone())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }

    /// Subscribe to a key, creating the channel if needed.
    pub async fn subscribe(&self, key: &K) -> broadcast::Receiver<T> {
        self.sender(key).await.subscribe()
    }

    /// Publish to a key. Fire-and-forget: an error just means no
    /// subscriber is currently listening.
    pub async fn publish(&self, key: &K, value: T) {
        let tx = {
            let channels = self.channels.read().await;
            match channels.get(key) {
                Some(tx) => tx.clone(),
                None => return,
            }
        };
        let delivered = tx.send(value).unwrap_or(0);
        debug!(?key, delivered, "Broadcast published");
    }

    /// Remove a channel after a linger, letting attached subscribers drain.
    pub fn remove_later(self: Arc<Self>, key: K) {
        tokio::spawn(async move {
            tokio::time::sleep(CHANNEL_LINGER).await;
            self.channels.write().await.remove(&key);
        });
    }

    /// Number of live subscribers on a key, zero if the channel is absent.
    pub async fn subscriber_count(&self, key: &K) -> usize {
        self.channels
            .read()
            .await
            .get(key)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }

    /// Number of live channels.
    pub async fn channel_count(&self) -> usize {
        self.channels.read().await.len()
    }
}

/// Publishes run progress to both the conversation and team channels.
pub struct ProgressBroadcaster {
    registry: Arc<ChannelRegistry>,
}

impl ProgressBroadcaster {
    /// Create a broadcaster over an injected registry.
    pub fn new(registry: Arc<ChannelRegistry>) -> Self {
        Self { registry }
    }

    /// The underlying registry, for subscriber attachment.
    pub fn registry(&self) -> &Arc<ChannelRegistry> {
        &self.registry
    }

    /// Publish one event to the run's conversation and team channels.
    pub async fn publish(
        &self,
        conversation_id: &ConversationId,
        team_id: &TeamId,
        event: ProgressEvent,
    ) {
        self.registry
            .publish(&ChannelKey::Conversation(conversation_id.clone()), event.clone())
            .await;
        self.registry
            .publish(&ChannelKey::Team(team_id.clone()), event)
            .await;
    }

    /// Schedule removal of a conversation channel once its run is terminal.
    pub fn retire_conversation(&self, conversation_id: &ConversationId) {
        Arc::clone(&self.registry)
            .remove_later(ChannelKey::Conversation(conversation_id.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ideaflow_core::{RunId, Stage};

    fn event() -> ProgressEvent {
        ProgressEvent::stage_started(RunId::generate(), Stage::Crystallize)
    }

    #[tokio::test]
    async fn test_subscribe_then_publish() {
        let registry = ChannelRegistry::new();
        let key = ChannelKey::Team(TeamId::new("team-1"));

        let mut rx = registry.subscribe(&key).await;
        registry.publish(&key, event()).await;

        let received = rx.recv().await.unwrap();
        assert_eq!(received.stage, Some(Stage::Crystallize));
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_noop() {
        let registry = ChannelRegistry::new();
        let key = ChannelKey::Conversation(ConversationId::new("conv-1"));
        // Must not panic or block.
        registry.publish(&key, event()).await;
        assert_eq!(registry.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_drops_oldest_never_blocks() {
        let registry = ChannelRegistry::new();
        let key = ChannelKey::Team(TeamId::new("team-1"));
        let mut rx = registry.subscribe(&key).await;

        // Overflow the subscriber's buffer without ever awaiting the
        // receiver; the publisher must not block.
        for _ in 0..(CHANNEL_CAPACITY * 2) {
            registry.publish(&key, event()).await;
        }

        match rx.recv().await {
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                assert!(skipped as usize >= CHANNEL_CAPACITY);
            }
            other => panic!("expected lag, got {:?}", other),
        }
        // After the lag report the subscriber resumes with newer events.
        assert!(rx.recv().await.is_ok());
    }

    #[tokio::test]
    async fn test_broadcaster_fans_out_to_both_keys() {
        let registry = ChannelRegistry::new();
        let broadcaster = ProgressBroadcaster::new(Arc::clone(&registry));
        let conv = ConversationId::new("conv-1");
        let team = TeamId::new("team-1");

        let mut conv_rx = registry.subscribe(&ChannelKey::Conversation(conv.clone())).await;
        let mut team_rx = registry.subscribe(&ChannelKey::Team(team.clone())).await;

        broadcaster.publish(&conv, &team, event()).await;

        assert!(conv_rx.recv().await.is_ok());
        assert!(team_rx.recv().await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retired_channel_is_removed_after_linger() {
        let registry = ChannelRegistry::new();
        let broadcaster = ProgressBroadcaster::new(Arc::clone(&registry));
        let conv = ConversationId::new("conv-1");
        let key = ChannelKey::Conversation(conv.clone());

        let _rx = registry.subscribe(&key).await;
        assert_eq!(registry.channel_count().await, 1);

        broadcaster.retire_conversation(&conv);
        tokio::time::sleep(CHANNEL_LINGER + Duration::from_millis(10)).await;
        assert_eq!(registry.channel_count().await, 0);
    }

    #[tokio::test]
    async fn test_team_chat_counts_subscribers() {
        let chat = TeamChatRegistry::new();
        let team = TeamId::new("team-1");
        assert_eq!(chat.subscriber_count(&team).await, 0);

        let _a = chat.subscribe(&team).await;
        let _b = chat.subscribe(&team).await;
        assert_eq!(chat.subscriber_count(&team).await, 2);

        chat.publish(&team, TeamMessage::chat("hello")).await;
    }
}
