use sea_orm::ConnectionTrait;
use uuid::Uuid;

use crate::bus::{Broker, Topic};
use crate::chat::protocol::ServerMessage;
use crate::db::notifications as notification_db;
use crate::db::users as user_db;
use crate::error::{AppError, AppResult};
use crate::models::notifications::{self, CreateNotification, NotificationType};

impl From<&notifications::Model> for ServerMessage {
    fn from(n: &notifications::Model) -> Self {
        ServerMessage::Notification {
            id: n.id,
            title: n.title.clone(),
            body: n.body.clone(),
            notification_type: n.notification_type,
            url: n.target_url.clone(),
            created_at: n.created_at.to_rfc3339(),
        }
    }
}

/// Notification about an order, linking to the order page.
pub fn order_notice(
    user_id: Uuid,
    order_id: Uuid,
    title: &str,
    body: String,
    notification_type: NotificationType,
) -> CreateNotification {
    CreateNotification {
        user_id,
        title: title.to_string(),
        body,
        notification_type,
        target_url: Some(format!("/orders/{order_id}")),
    }
}

/// Push an already persisted notification to the owner's channel.
pub async fn push(bus: &dyn Broker, notification: &notifications::Model) {
    bus.publish(Topic::User(notification.user_id), notification.into())
        .await;
}

/// Persist a notification, then push it. The row is written first so an
/// offline user still finds it on the next pull.
pub async fn notify_user<C: ConnectionTrait>(
    db: &C,
    bus: &dyn Broker,
    input: CreateNotification,
) -> AppResult<notifications::Model> {
    let saved = notification_db::insert_notification(db, input).await?;
    push(bus, &saved).await;
    Ok(saved)
}

/// [`notify_user`] for side effects of an operation that already committed:
/// a failure is logged, not returned.
pub async fn notify_quietly<C: ConnectionTrait>(db: &C, bus: &dyn Broker, input: CreateNotification) {
    let user_id = input.user_id;
    if let Err(e) = notify_user(db, bus, input).await {
        tracing::warn!("Failed to notify user {user_id}: {e}");
    }
}

/// System notification to every admin.
pub async fn notify_admins<C: ConnectionTrait>(
    db: &C,
    bus: &dyn Broker,
    title: &str,
    body: &str,
    target_url: Option<String>,
) -> AppResult<usize> {
    let admins = user_db::get_admins(db).await?;
    for admin in &admins {
        notify_user(
            db,
            bus,
            CreateNotification {
                user_id: admin.id,
                title: title.to_string(),
                body: body.to_string(),
                notification_type: NotificationType::System,
                target_url: target_url.clone(),
            },
        )
        .await?;
    }

    Ok(admins.len())
}

pub async fn list_notifications<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    unread_only: bool,
    page: u64,
    limit: u64,
) -> AppResult<Vec<notifications::Model>> {
    Ok(notification_db::get_notifications_for_user(db, user_id, unread_only, page, limit).await?)
}

/// Acknowledge one notification. Someone else's notification reads as missing.
pub async fn mark_read<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    notification_id: Uuid,
) -> AppResult<notifications::Model> {
    notification_db::mark_notification_read(db, notification_id, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Notification {notification_id} not found")))
}

pub async fn mark_all_read<C: ConnectionTrait>(db: &C, user_id: Uuid) -> AppResult<u64> {
    Ok(notification_db::mark_all_read(db, user_id).await?)
}
