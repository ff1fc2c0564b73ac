use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SeaORM entity for the `rooms` table: a private chat between two users.
///
/// Participants are stored in canonical order (`user1_id < user2_id`), so the
/// unique index on the pair identifies the room regardless of who opened it.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "rooms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user1_id: Uuid,
    pub user2_id: Uuid,
    pub created_at: DateTimeUtc,
}

impl Model {
    pub fn has_participant(&self, user_id: Uuid) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: Uuid) -> Uuid {
        if self.user1_id == user_id {
            self.user2_id
        } else {
            self.user1_id
        }
    }
}

/// Order-independent identity of a two-person room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoomKey {
    low: Uuid,
    high: Uuid,
}

impl RoomKey {
    /// Returns `None` when both ids are the same user.
    pub fn new(a: Uuid, b: Uuid) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self { low: a, high: b }),
            std::cmp::Ordering::Greater => Some(Self { low: b, high: a }),
            std::cmp::Ordering::Equal => None,
        }
    }

    pub fn user1(&self) -> Uuid {
        self.low
    }

    pub fn user2(&self) -> Uuid {
        self.high
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::messages::Entity")]
    Messages,
}

impl Related<super::messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

/// Request body for POST /api/chat/rooms.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenRoom {
    pub user_id: Uuid,
}

/// Response for the room list endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSummary {
    pub room_id: Uuid,
    pub other_user_id: Uuid,
    pub other_user_name: Option<String>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTimeUtc>,
    pub unread_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_key_ignores_argument_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert_eq!(RoomKey::new(a, b), RoomKey::new(b, a));

        let key = RoomKey::new(a, b).unwrap();
        assert!(key.user1() < key.user2());
    }

    #[test]
    fn room_key_rejects_self_chat() {
        let a = Uuid::new_v4();
        assert!(RoomKey::new(a, a).is_none());
    }
}
