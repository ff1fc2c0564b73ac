use sea_orm::prelude::Expr;
use sea_orm::*;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::models::messages::{self, CreateMessage};

/// Insert a new message.
pub async fn insert_message<C: ConnectionTrait>(
    db: &C,
    input: CreateMessage,
) -> Result<messages::Model, DbErr> {
    let new_message = messages::ActiveModel {
        id: Set(Uuid::new_v4()),
        room_id: Set(input.room_id),
        sender_id: Set(input.sender_id),
        content: Set(input.content),
        is_read: Set(false),
        created_at: Set(chrono::Utc::now()),
    };

    new_message.insert(db).await
}

/// Fetch messages for a room, newest first, with keyset pagination on
/// `(created_at, id)`.
pub async fn get_messages_by_room<C: ConnectionTrait>(
    db: &C,
    room_id: Uuid,
    limit: u64,
    cursor_created_at: Option<chrono::DateTime<chrono::Utc>>,
    cursor_id: Option<Uuid>,
) -> Result<Vec<messages::Model>, DbErr> {
    let mut query = messages::Entity::find().filter(messages::Column::RoomId.eq(room_id));

    if let (Some(cursor_created_at), Some(cursor_id)) = (cursor_created_at, cursor_id) {
        query = query.filter(
            Condition::any()
                .add(messages::Column::CreatedAt.lt(cursor_created_at))
                .add(
                    Condition::all()
                        .add(messages::Column::CreatedAt.eq(cursor_created_at))
                        .add(messages::Column::Id.lt(cursor_id)),
                ),
        );
    }

    query
        .order_by_desc(messages::Column::CreatedAt)
        .order_by_desc(messages::Column::Id)
        .limit(limit)
        .all(db)
        .await
}

pub async fn get_message_by_id<C: ConnectionTrait>(
    db: &C,
    message_id: Uuid,
) -> Result<Option<messages::Model>, DbErr> {
    messages::Entity::find_by_id(message_id).one(db).await
}

/// Mark every message in a room as read for `reader_id`, i.e. the messages
/// the other participant sent.
pub async fn mark_all_read_for_room<C: ConnectionTrait>(
    db: &C,
    room_id: Uuid,
    reader_id: Uuid,
) -> Result<u64, DbErr> {
    let result = messages::Entity::update_many()
        .col_expr(messages::Column::IsRead, Expr::value(true))
        .filter(messages::Column::RoomId.eq(room_id))
        .filter(messages::Column::SenderId.ne(reader_id))
        .filter(messages::Column::IsRead.eq(false))
        .exec(db)
        .await?;

    Ok(result.rows_affected)
}

/// Count unread messages for many rooms in one query and return a
/// room_id -> unread_count map.
pub async fn count_unread_for_rooms<C: ConnectionTrait>(
    db: &C,
    room_ids: Vec<Uuid>,
    user_id: Uuid,
) -> Result<HashMap<Uuid, u64>, DbErr> {
    if room_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let unread_messages = messages::Entity::find()
        .filter(messages::Column::RoomId.is_in(room_ids))
        .filter(messages::Column::SenderId.ne(user_id))
        .filter(messages::Column::IsRead.eq(false))
        .all(db)
        .await?;

    let mut counts: HashMap<Uuid, u64> = HashMap::new();
    for message in unread_messages {
        *counts.entry(message.room_id).or_insert(0) += 1;
    }

    Ok(counts)
}

/// Latest message per room, keyed by room id.
pub async fn get_latest_messages_for_rooms<C: ConnectionTrait>(
    db: &C,
    room_ids: Vec<Uuid>,
) -> Result<HashMap<Uuid, messages::Model>, DbErr> {
    if room_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = messages::Entity::find()
        .filter(messages::Column::RoomId.is_in(room_ids))
        .order_by_asc(messages::Column::RoomId)
        .order_by_desc(messages::Column::CreatedAt)
        .order_by_desc(messages::Column::Id)
        .all(db)
        .await?;

    let mut latest: HashMap<Uuid, messages::Model> = HashMap::new();
    let mut seen: HashSet<Uuid> = HashSet::new();

    for row in rows {
        if seen.insert(row.room_id) {
            latest.insert(row.room_id, row);
        }
    }

    Ok(latest)
}
