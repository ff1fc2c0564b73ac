use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use super::{Broker, Subscription, Topic};
use crate::chat::protocol::ServerMessage;

#[derive(Debug, Clone)]
struct Subscriber {
    id: Uuid,
    sender: mpsc::UnboundedSender<ServerMessage>,
}

/// In-process broker: topic -> connected subscriber handles.
#[derive(Default)]
pub struct LocalBroker {
    topics: RwLock<HashMap<Topic, Vec<Subscriber>>>,
}

impl LocalBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live subscribers on `topic`.
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        let topics = self.topics.read().await;
        topics
            .get(&topic)
            .map(|subs| subs.iter().filter(|s| !s.sender.is_closed()).count())
            .unwrap_or(0)
    }
}

#[async_trait]
impl Broker for LocalBroker {
    async fn publish(&self, topic: Topic, message: ServerMessage) {
        let topics = self.topics.read().await;
        let Some(subscribers) = topics.get(&topic) else {
            tracing::debug!("No subscribers on {topic}, dropping message");
            return;
        };

        for subscriber in subscribers {
            // A failed send means the session is gone; unsubscribe cleans it up.
            let _ = subscriber.sender.send(message.clone());
        }
    }

    async fn subscribe(&self, topics: Vec<Topic>) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();

        let mut map = self.topics.write().await;
        for topic in &topics {
            map.entry(*topic).or_default().push(Subscriber {
                id,
                sender: tx.clone(),
            });
        }

        Subscription {
            id,
            topics,
            receiver: rx,
        }
    }

    async fn unsubscribe(&self, subscription_id: Uuid) {
        let mut map = self.topics.write().await;
        for subscribers in map.values_mut() {
            subscribers.retain(|s| s.id != subscription_id && !s.sender.is_closed());
        }
        map.retain(|_, subscribers| !subscribers.is_empty());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(message: &str) -> ServerMessage {
        ServerMessage::Error {
            message: message.to_string(),
        }
    }

    #[tokio::test]
    async fn publish_reaches_every_subscriber_of_the_topic() {
        let broker = LocalBroker::new();
        let room = Topic::Room(Uuid::new_v4());

        let mut a = broker.subscribe(vec![room]).await;
        let mut b = broker.subscribe(vec![room]).await;
        broker.publish(room, error("hello")).await;

        assert!(matches!(a.receiver.try_recv(), Ok(ServerMessage::Error { .. })));
        assert!(matches!(b.receiver.try_recv(), Ok(ServerMessage::Error { .. })));
    }

    #[tokio::test]
    async fn publish_does_not_leak_across_topics() {
        let broker = LocalBroker::new();
        let user = Uuid::new_v4();

        let mut sub = broker.subscribe(vec![Topic::User(user)]).await;
        broker.publish(Topic::RoomUpdates(user), error("x")).await;

        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn one_subscription_can_listen_on_several_topics() {
        let broker = LocalBroker::new();
        let user = Uuid::new_v4();

        let mut sub = broker
            .subscribe(vec![Topic::User(user), Topic::RoomUpdates(user)])
            .await;
        broker.publish(Topic::User(user), error("a")).await;
        broker.publish(Topic::RoomUpdates(user), error("b")).await;

        assert!(sub.receiver.try_recv().is_ok());
        assert!(sub.receiver.try_recv().is_ok());
    }

    #[tokio::test]
    async fn unsubscribe_stops_delivery() {
        let broker = LocalBroker::new();
        let room = Topic::Room(Uuid::new_v4());

        let sub = broker.subscribe(vec![room]).await;
        assert_eq!(broker.subscriber_count(room).await, 1);

        broker.unsubscribe(sub.id).await;
        assert_eq!(broker.subscriber_count(room).await, 0);

        // No subscribers left: publish is a silent no-op.
        broker.publish(room, error("gone")).await;
    }
}
