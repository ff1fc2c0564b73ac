use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SeaORM entity for the `order_statuses` reference table.
///
/// Rows are seeded by the migration crate and never written at runtime.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_statuses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(column_type = "Text")]
    pub description: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::orders::Entity")]
    Orders,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Lifecycle stage of an order, keyed by the seeded `order_statuses.id`.
///
/// ```text
/// InProgress ──► Delivered ──► Completed
///     │            │  ▲
///     │            ▼  │
///     │          Revision
///     ▼
/// Cancelled  (reachable from every non-terminal state)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    InProgress,
    Delivered,
    Completed,
    Cancelled,
    Revision,
}

impl OrderState {
    pub const ALL: [OrderState; 5] = [
        OrderState::InProgress,
        OrderState::Delivered,
        OrderState::Completed,
        OrderState::Cancelled,
        OrderState::Revision,
    ];

    /// Primary key of the matching `order_statuses` row.
    pub fn id(self) -> i32 {
        match self {
            OrderState::InProgress => 1,
            OrderState::Delivered => 2,
            OrderState::Completed => 3,
            OrderState::Cancelled => 4,
            OrderState::Revision => 5,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.id() == id)
    }

    /// Display name, identical to the seeded `order_statuses.name`.
    pub fn name(self) -> &'static str {
        match self {
            OrderState::InProgress => "In Progress",
            OrderState::Delivered => "Delivered",
            OrderState::Completed => "Completed",
            OrderState::Cancelled => "Cancelled",
            OrderState::Revision => "Revision Requested",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderState::Completed | OrderState::Cancelled)
    }

    pub fn can_transition_to(self, next: OrderState) -> bool {
        use OrderState::*;
        match (self, next) {
            (InProgress, Delivered) => true,
            (Delivered, Completed) | (Delivered, Revision) => true,
            (Revision, Delivered) => true,
            (from, Cancelled) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl std::fmt::Display for OrderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::OrderState::{self, *};

    #[test]
    fn ids_round_trip_through_the_reference_table() {
        for state in OrderState::ALL {
            assert_eq!(OrderState::from_id(state.id()), Some(state));
        }
        assert_eq!(OrderState::from_id(0), None);
        assert_eq!(OrderState::from_id(42), None);
    }

    #[test]
    fn only_delivered_orders_can_complete() {
        assert!(Delivered.can_transition_to(Completed));
        assert!(!InProgress.can_transition_to(Completed));
        assert!(!Revision.can_transition_to(Completed));
    }

    #[test]
    fn revision_loops_back_to_delivered() {
        assert!(Delivered.can_transition_to(Revision));
        assert!(Revision.can_transition_to(Delivered));
        assert!(!InProgress.can_transition_to(Revision));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        for next in OrderState::ALL {
            assert!(!Completed.can_transition_to(next));
            assert!(!Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn every_open_state_can_be_cancelled() {
        for state in [InProgress, Delivered, Revision] {
            assert!(state.can_transition_to(Cancelled));
        }
    }
}
