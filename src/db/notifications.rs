use sea_orm::prelude::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::models::notifications::{self, CreateNotification};

/// Persist a notification.
pub async fn insert_notification<C: ConnectionTrait>(
    db: &C,
    input: CreateNotification,
) -> Result<notifications::Model, DbErr> {
    let notification = notifications::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(input.user_id),
        title: Set(input.title),
        body: Set(input.body),
        notification_type: Set(input.notification_type),
        is_read: Set(false),
        target_url: Set(input.target_url),
        created_at: Set(chrono::Utc::now()),
    };

    notification.insert(db).await
}

/// A user's notifications, newest first.
pub async fn get_notifications_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
    unread_only: bool,
    page: u64,
    limit: u64,
) -> Result<Vec<notifications::Model>, DbErr> {
    let mut query = notifications::Entity::find()
        .filter(notifications::Column::UserId.eq(user_id));

    if unread_only {
        query = query.filter(notifications::Column::IsRead.eq(false));
    }

    query
        .order_by_desc(notifications::Column::CreatedAt)
        .order_by_desc(notifications::Column::Id)
        .offset((page.saturating_sub(1)) * limit)
        .limit(limit)
        .all(db)
        .await
}

/// Mark one notification read. Only the owner's rows match.
pub async fn mark_notification_read<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    user_id: Uuid,
) -> Result<Option<notifications::Model>, DbErr> {
    let Some(notification) = notifications::Entity::find_by_id(id)
        .filter(notifications::Column::UserId.eq(user_id))
        .one(db)
        .await?
    else {
        return Ok(None);
    };

    if notification.is_read {
        return Ok(Some(notification));
    }

    let mut active: notifications::ActiveModel = notification.into();
    active.is_read = Set(true);
    active.update(db).await.map(Some)
}

/// Mark every unread notification of a user as read.
pub async fn mark_all_read<C: ConnectionTrait>(db: &C, user_id: Uuid) -> Result<u64, DbErr> {
    let result = notifications::Entity::update_many()
        .col_expr(notifications::Column::IsRead, Expr::value(true))
        .filter(notifications::Column::UserId.eq(user_id))
        .filter(notifications::Column::IsRead.eq(false))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}
