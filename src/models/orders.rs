use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::order_statuses::OrderState;

/// SeaORM entity for the `orders` table.
///
/// `version` is bumped by every write; see `db::orders::apply_changes`.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub gig_id: Uuid,
    pub status_id: Option<i32>,
    #[sea_orm(column_type = "Text")]
    pub requirements: String,
    pub delivery_date: Option<DateTimeUtc>,
    pub is_active: bool,
    pub is_paid: bool,
    pub external_transaction_id: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub platform_fee: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))", nullable)]
    pub seller_payout: Option<Decimal>,
    pub payout_sent: bool,
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Current lifecycle stage. `None` if the status row was removed.
    pub fn state(&self) -> Option<OrderState> {
        self.status_id.and_then(OrderState::from_id)
    }

    pub fn is_in(&self, state: OrderState) -> bool {
        self.state() == Some(state)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::BuyerId",
        to = "super::users::Column::Id"
    )]
    Buyer,
    #[sea_orm(
        belongs_to = "super::gigs::Entity",
        from = "Column::GigId",
        to = "super::gigs::Column::Id"
    )]
    Gig,
    #[sea_orm(
        belongs_to = "super::order_statuses::Entity",
        from = "Column::StatusId",
        to = "super::order_statuses::Column::Id"
    )]
    Status,
    #[sea_orm(has_many = "super::payment_transactions::Entity")]
    PaymentTransactions,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Buyer.def()
    }
}

impl Related<super::gigs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Gig.def()
    }
}

impl Related<super::order_statuses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Status.def()
    }
}

impl Related<super::payment_transactions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

/// Request body for POST /api/orders. The buyer comes from the JWT.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub gig_id: Uuid,
    pub requirements: String,
}

/// Request body for PATCH /api/orders/{id}.
///
/// Which fields are allowed depends on who is asking: the seller may send
/// `status` (Delivered only) and `delivery_date`, the buyer only `requirements`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateOrder {
    pub requirements: Option<String>,
    pub status: Option<OrderState>,
    pub delivery_date: Option<chrono::DateTime<chrono::Utc>>,
}

/// Order representation for API responses, with the status name resolved.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub gig_id: Uuid,
    pub status: Option<OrderState>,
    pub status_name: Option<&'static str>,
    pub requirements: String,
    pub delivery_date: Option<DateTimeUtc>,
    pub is_active: bool,
    pub is_paid: bool,
    pub external_transaction_id: Option<String>,
    pub platform_fee: Option<Decimal>,
    pub seller_payout: Option<Decimal>,
    pub payout_sent: bool,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl From<Model> for OrderResponse {
    fn from(m: Model) -> Self {
        let status = m.state();
        Self {
            id: m.id,
            buyer_id: m.buyer_id,
            gig_id: m.gig_id,
            status,
            status_name: status.map(OrderState::name),
            requirements: m.requirements,
            delivery_date: m.delivery_date,
            is_active: m.is_active,
            is_paid: m.is_paid,
            external_transaction_id: m.external_transaction_id,
            platform_fee: m.platform_fee,
            seller_payout: m.seller_payout,
            payout_sent: m.payout_sent,
            created_at: m.created_at,
            updated_at: m.updated_at,
        }
    }
}
