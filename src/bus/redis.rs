use async_trait::async_trait;
use futures_util::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use redis::{Client, RedisError};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use uuid::Uuid;

use super::{Broker, LocalBroker, Subscription, Topic};
use crate::chat::protocol::ServerMessage;

const CHANNEL_PATTERNS: [&str; 2] = ["chat_*", "user_*"];
const MIN_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Broker for multi-instance deployments.
///
/// Publishes go to Redis; a relay task pattern-subscribes to every topic and
/// hands incoming frames to the local broker, which owns this instance's
/// sockets. While the relay is reconnecting, or if Redis rejects a publish,
/// frames are also delivered locally so this instance's sockets keep working.
#[derive(Clone)]
pub struct RedisBroker {
    connection: ConnectionManager,
    local: Arc<LocalBroker>,
    relay_up: Arc<AtomicBool>,
}

impl RedisBroker {
    pub async fn connect(redis_url: &str) -> Result<Self, RedisError> {
        let client = Client::open(redis_url)?;
        let connection = ConnectionManager::new(client.clone()).await?;
        let local = Arc::new(LocalBroker::new());
        let relay_up = Arc::new(AtomicBool::new(true));

        let pubsub = subscribe_all(&client).await?;
        tokio::spawn(run_relay(client, pubsub, local.clone(), relay_up.clone()));

        Ok(Self {
            connection,
            local,
            relay_up,
        })
    }
}

async fn subscribe_all(client: &Client) -> Result<PubSub, RedisError> {
    let mut pubsub = client.get_async_pubsub().await?;
    for pattern in CHANNEL_PATTERNS {
        pubsub.psubscribe(pattern).await?;
    }
    Ok(pubsub)
}

/// Relay until the connection drops, then resubscribe with backoff. Runs for
/// the lifetime of the process.
async fn run_relay(
    client: Client,
    mut pubsub: PubSub,
    local: Arc<LocalBroker>,
    relay_up: Arc<AtomicBool>,
) {
    loop {
        relay(&mut pubsub, &local).await;
        relay_up.store(false, Ordering::SeqCst);
        tracing::warn!("Redis pub/sub relay disconnected, delivering locally until it is back");

        let mut backoff = MIN_BACKOFF;
        pubsub = loop {
            tokio::time::sleep(backoff).await;
            match subscribe_all(&client).await {
                Ok(pubsub) => break pubsub,
                Err(e) => {
                    tracing::warn!("Redis pub/sub resubscribe failed, retrying in {backoff:?}: {e}");
                    backoff = next_backoff(backoff);
                }
            }
        };

        relay_up.store(true, Ordering::SeqCst);
        tracing::info!("Redis pub/sub relay reconnected");
    }
}

async fn relay(pubsub: &mut PubSub, local: &LocalBroker) {
    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let channel = msg.get_channel_name().to_string();
        let Some(topic) = Topic::parse(&channel) else {
            tracing::debug!("Ignoring message on unknown channel {channel}");
            continue;
        };

        let payload: String = match msg.get_payload() {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Unreadable payload on {channel}: {e}");
                continue;
            }
        };

        match serde_json::from_str::<ServerMessage>(&payload) {
            Ok(message) => local.publish(topic, message).await,
            Err(e) => tracing::warn!("Malformed frame on {channel}: {e}"),
        }
    }
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// A frame reaches local sockets through the relay only when the publish
/// succeeded and the relay is subscribed.
fn deliver_locally(published: bool, relay_up: bool) -> bool {
    !published || !relay_up
}

#[async_trait]
impl Broker for RedisBroker {
    async fn publish(&self, topic: Topic, message: ServerMessage) {
        let payload = match serde_json::to_string(&message) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Failed to serialize frame for {topic}: {e}");
                return;
            }
        };

        let result: redis::RedisResult<i64> = redis::cmd("PUBLISH")
            .arg(topic.name())
            .arg(payload)
            .query_async(&mut self.connection.clone())
            .await;

        if let Err(e) = &result {
            tracing::warn!("Redis publish on {topic} failed, delivering locally: {e}");
        }
        if deliver_locally(result.is_ok(), self.relay_up.load(Ordering::SeqCst)) {
            self.local.publish(topic, message).await;
        }
    }

    async fn subscribe(&self, topics: Vec<Topic>) -> Subscription {
        self.local.subscribe(topics).await
    }

    async fn unsubscribe(&self, subscription_id: Uuid) {
        self.local.unsubscribe(subscription_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_up_to_the_cap() {
        assert_eq!(next_backoff(MIN_BACKOFF), Duration::from_secs(1));
        assert_eq!(next_backoff(Duration::from_secs(20)), MAX_BACKOFF);
        assert_eq!(next_backoff(MAX_BACKOFF), MAX_BACKOFF);
    }

    #[test]
    fn frames_stay_local_while_relay_is_down() {
        assert!(!deliver_locally(true, true));
        assert!(deliver_locally(true, false));
        assert!(deliver_locally(false, true));
        assert!(deliver_locally(false, false));
    }
}
