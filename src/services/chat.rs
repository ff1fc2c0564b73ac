//! Two-person chat rooms.
//!
//! A message is stored before it is broadcast, so every frame a client sees
//! refers to a durable row. The receiver also gets a room-list update and a
//! persisted notification for when they are not looking at the room.

use sea_orm::ConnectionTrait;
use uuid::Uuid;

use crate::auth::authorization::verify_room_participant;
use crate::bus::{Broker, Subscription, Topic};
use crate::chat::protocol::ServerMessage;
use crate::db::messages as message_db;
use crate::db::rooms as room_db;
use crate::db::users as user_db;
use crate::error::{AppError, AppResult};
use crate::models::messages::{self, CreateMessage};
use crate::models::notifications::{CreateNotification, NotificationType};
use crate::models::rooms::{self, RoomKey, RoomSummary};
use crate::models::users;
use crate::services::notifications::notify_quietly;

pub const MAX_MESSAGE_LEN: usize = 5000;
const HISTORY_LIMIT: u64 = 200;

/// Get or create the room between `user` and `other_user_id`.
pub async fn open_room<C: ConnectionTrait>(
    db: &C,
    user: &users::Model,
    other_user_id: Uuid,
) -> AppResult<rooms::Model> {
    let key = RoomKey::new(user.id, other_user_id)
        .ok_or_else(|| AppError::Validation("You cannot chat with yourself".to_string()))?;

    if user_db::get_user_by_id(db, other_user_id).await?.is_none() {
        return Err(AppError::NotFound(format!("User {other_user_id} not found")));
    }

    Ok(room_db::get_or_create_room(db, key).await?)
}

/// The caller's rooms with the latest message and unread count of each.
pub async fn list_rooms<C: ConnectionTrait>(
    db: &C,
    user: &users::Model,
) -> AppResult<Vec<RoomSummary>> {
    let rooms = room_db::get_rooms_for_user(db, user.id).await?;
    let room_ids: Vec<Uuid> = rooms.iter().map(|r| r.id).collect();
    let other_ids: Vec<Uuid> = rooms.iter().map(|r| r.other_participant(user.id)).collect();

    let latest = message_db::get_latest_messages_for_rooms(db, room_ids.clone()).await?;
    let unread = message_db::count_unread_for_rooms(db, room_ids, user.id).await?;
    let others = user_db::get_users_by_ids(db, other_ids).await?;

    let mut summaries: Vec<RoomSummary> = rooms
        .into_iter()
        .map(|room| {
            let other_user_id = room.other_participant(user.id);
            let last = latest.get(&room.id);
            RoomSummary {
                room_id: room.id,
                other_user_id,
                other_user_name: others.get(&other_user_id).map(|u| u.public_name()),
                last_message: last.map(|m| m.content.clone()),
                last_message_at: last.map(|m| m.created_at),
                unread_count: unread.get(&room.id).copied().unwrap_or(0),
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
    Ok(summaries)
}

/// Room history, oldest first.
pub async fn room_history<C: ConnectionTrait>(
    db: &C,
    user: &users::Model,
    room_id: Uuid,
) -> AppResult<Vec<messages::Model>> {
    verify_room_participant(db, room_id, user.id).await?;

    let mut history =
        message_db::get_messages_by_room(db, room_id, HISTORY_LIMIT, None, None).await?;
    history.reverse();
    Ok(history)
}

/// Called when a participant connects to the room channel: everything the
/// other participant sent is now read. Nothing is pushed.
pub async fn join_room<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    room_id: Uuid,
) -> AppResult<rooms::Model> {
    let room = verify_room_participant(db, room_id, user_id).await?;
    let marked = message_db::mark_all_read_for_room(db, room_id, user_id).await?;
    if marked > 0 {
        tracing::debug!("Marked {marked} messages read in room {room_id} for {user_id}");
    }
    Ok(room)
}

/// Join the room channel: subscribe first, then mark the backlog read, so a
/// message sent in between is either pushed on the subscription or already
/// marked read.
pub async fn enter_room<C: ConnectionTrait>(
    db: &C,
    bus: &dyn Broker,
    user_id: Uuid,
    room_id: Uuid,
) -> AppResult<Subscription> {
    verify_room_participant(db, room_id, user_id).await?;

    let subscription = bus.subscribe(vec![Topic::Room(room_id)]).await;
    if let Err(e) = join_room(db, user_id, room_id).await {
        bus.unsubscribe(subscription.id).await;
        return Err(e);
    }
    Ok(subscription)
}

/// Persist a message, then fan it out.
pub async fn send_message<C: ConnectionTrait>(
    db: &C,
    bus: &dyn Broker,
    sender: &users::Model,
    room_id: Uuid,
    content: &str,
) -> AppResult<messages::Model> {
    let content = content.trim();
    if content.is_empty() {
        return Err(AppError::Validation(
            "Message content cannot be empty".to_string(),
        ));
    }
    if content.chars().count() > MAX_MESSAGE_LEN {
        return Err(AppError::Validation(format!(
            "Message cannot be longer than {MAX_MESSAGE_LEN} characters"
        )));
    }

    let room = verify_room_participant(db, room_id, sender.id).await?;
    let receiver_id = room.other_participant(sender.id);

    let saved = message_db::insert_message(
        db,
        CreateMessage {
            room_id,
            sender_id: sender.id,
            content: content.to_string(),
        },
    )
    .await?;

    let timestamp = saved.created_at.to_rfc3339();

    bus.publish(
        Topic::Room(room_id),
        ServerMessage::ChatMessage {
            message: saved.content.clone(),
            sender_id: sender.id,
            timestamp: timestamp.clone(),
            message_id: saved.id,
            room: room_id,
            is_read: saved.is_read,
        },
    )
    .await;

    bus.publish(
        Topic::RoomUpdates(receiver_id),
        ServerMessage::RoomUpdate {
            room: room_id,
            sender_id: sender.id,
            last_message: saved.content.clone(),
            timestamp,
        },
    )
    .await;

    notify_quietly(
        db,
        bus,
        CreateNotification {
            user_id: receiver_id,
            title: "New Message".to_string(),
            body: format!("You received a message from {}", sender.public_name()),
            notification_type: NotificationType::Message,
            target_url: Some(format!("/chat/{room_id}")),
        },
    )
    .await;

    Ok(saved)
}
