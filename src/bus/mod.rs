//! Topic-addressed publish/subscribe for realtime pushes.
//!
//! Domain code publishes [`ServerMessage`]s to a [`Topic`] without knowing
//! whether anyone is listening or how the frames reach a socket. Delivery is
//! best-effort: a publish to a topic with no subscribers is dropped.

pub mod local;
pub mod redis;

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::chat::protocol::ServerMessage;

pub use local::LocalBroker;
pub use redis::RedisBroker;

/// Shared handle stored in actix app data and passed to services.
pub type Bus = Arc<dyn Broker>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Everyone connected to a chat room.
    Room(Uuid),
    /// One user's notification channel.
    User(Uuid),
    /// Room list updates (new message previews) for one user.
    RoomUpdates(Uuid),
}

impl Topic {
    pub fn name(&self) -> String {
        match self {
            Topic::Room(id) => format!("chat_{id}"),
            Topic::User(id) => format!("user_{id}"),
            Topic::RoomUpdates(id) => format!("user_{id}_room_updates"),
        }
    }

    /// Inverse of [`Topic::name`].
    pub fn parse(name: &str) -> Option<Self> {
        if let Some(rest) = name.strip_prefix("chat_") {
            return Uuid::parse_str(rest).ok().map(Topic::Room);
        }

        let rest = name.strip_prefix("user_")?;
        match rest.strip_suffix("_room_updates") {
            Some(id) => Uuid::parse_str(id).ok().map(Topic::RoomUpdates),
            None => Uuid::parse_str(rest).ok().map(Topic::User),
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// Pick the broker for this process: Redis-backed when a URL is configured,
/// in-process otherwise.
pub async fn connect(redis_url: Option<&str>) -> Result<Bus, ::redis::RedisError> {
    match redis_url {
        Some(url) => {
            let broker = RedisBroker::connect(url).await?;
            tracing::info!("Realtime bus relaying through Redis");
            Ok(Arc::new(broker))
        }
        None => {
            tracing::info!("Realtime bus running in-process");
            Ok(Arc::new(LocalBroker::new()))
        }
    }
}

/// A live subscription. Dropping the receiver is enough to stop delivery;
/// [`Broker::unsubscribe`] also frees the slot.
#[derive(Debug)]
pub struct Subscription {
    pub id: Uuid,
    pub topics: Vec<Topic>,
    pub receiver: mpsc::UnboundedReceiver<ServerMessage>,
}

#[async_trait]
pub trait Broker: Send + Sync {
    /// Fan `message` out to every current subscriber of `topic`.
    async fn publish(&self, topic: Topic, message: ServerMessage);

    /// Register one receiver for all of `topics`.
    async fn subscribe(&self, topics: Vec<Topic>) -> Subscription;

    async fn unsubscribe(&self, subscription_id: Uuid);
}
