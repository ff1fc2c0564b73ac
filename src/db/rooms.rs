use sea_orm::*;
use uuid::Uuid;

use crate::models::rooms::{self, RoomKey};

pub async fn get_room_by_id<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<rooms::Model>, DbErr> {
    rooms::Entity::find_by_id(id).one(db).await
}

pub async fn get_room_by_key<C: ConnectionTrait>(
    db: &C,
    key: RoomKey,
) -> Result<Option<rooms::Model>, DbErr> {
    rooms::Entity::find()
        .filter(rooms::Column::User1Id.eq(key.user1()))
        .filter(rooms::Column::User2Id.eq(key.user2()))
        .one(db)
        .await
}

/// Return the room for `key`, creating it on first use.
///
/// Two users opening the same room at once race on the unique pair index;
/// the loser re-reads the winner's row.
pub async fn get_or_create_room<C: ConnectionTrait>(
    db: &C,
    key: RoomKey,
) -> Result<rooms::Model, DbErr> {
    if let Some(room) = get_room_by_key(db, key).await? {
        return Ok(room);
    }

    let room = rooms::ActiveModel {
        id: Set(Uuid::new_v4()),
        user1_id: Set(key.user1()),
        user2_id: Set(key.user2()),
        created_at: Set(chrono::Utc::now()),
    };

    match room.insert(db).await {
        Ok(room) => Ok(room),
        Err(err) => match get_room_by_key(db, key).await? {
            Some(room) => Ok(room),
            None => Err(err),
        },
    }
}

/// Rooms `user_id` takes part in, newest first.
pub async fn get_rooms_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> Result<Vec<rooms::Model>, DbErr> {
    rooms::Entity::find()
        .filter(
            Condition::any()
                .add(rooms::Column::User1Id.eq(user_id))
                .add(rooms::Column::User2Id.eq(user_id)),
        )
        .order_by_desc(rooms::Column::CreatedAt)
        .all(db)
        .await
}
