use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// SeaORM entity for the `withdrawal_requests` table.
///
/// `settled_amount` is the part of `amount` matched against whole order payouts
/// when an admin processed the request; the remainder keeps counting against
/// the seller's available balance.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "withdrawal_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub seller_id: Uuid,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub amount: Decimal,
    pub first_name: String,
    pub last_name: String,
    pub iban: String,
    pub is_processed: bool,
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub settled_amount: Decimal,
    pub created_at: DateTimeUtc,
    pub processed_at: Option<DateTimeUtc>,
}

impl Model {
    /// Amount still reserved against unsent order payouts.
    pub fn outstanding(&self) -> Decimal {
        self.amount - self.settled_amount
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::SellerId",
        to = "super::users::Column::Id"
    )]
    Seller,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Seller.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

// ── DTOs ──

/// Where the money goes.
#[derive(Debug, Clone, Deserialize)]
pub struct PayeeDetails {
    pub first_name: String,
    pub last_name: String,
    pub iban: String,
}

/// Request body for POST /api/payments/withdrawals.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWithdrawal {
    pub amount: Option<Decimal>,
    pub first_name: String,
    pub last_name: String,
    pub iban: String,
}

impl CreateWithdrawal {
    pub fn payee(&self) -> PayeeDetails {
        PayeeDetails {
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            iban: self.iban.clone(),
        }
    }
}
