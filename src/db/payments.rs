use rust_decimal::Decimal;
use sea_orm::prelude::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::models::payment_transactions::{self, CreateTransaction, TransactionStatus};
use crate::models::withdrawal_requests::{self, PayeeDetails};

// ── Payment transactions ──

/// Record one gateway interaction.
pub async fn insert_transaction<C: ConnectionTrait>(
    db: &C,
    input: CreateTransaction,
) -> Result<payment_transactions::Model, DbErr> {
    let now = chrono::Utc::now();
    let tx = payment_transactions::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(input.order_id),
        user_id: Set(input.user_id),
        transaction_type: Set(input.transaction_type),
        reference: Set(input.reference),
        amount: Set(input.amount),
        status: Set(input.status),
        created_at: Set(now),
        updated_at: Set(now),
    };

    tx.insert(db).await
}

/// Look up a transaction by the gateway's opaque reference.
pub async fn get_transaction_by_reference<C: ConnectionTrait>(
    db: &C,
    reference: &str,
) -> Result<Option<payment_transactions::Model>, DbErr> {
    payment_transactions::Entity::find()
        .filter(payment_transactions::Column::Reference.eq(reference))
        .one(db)
        .await
}

/// All transactions recorded for an order, oldest first.
pub async fn get_transactions_by_order<C: ConnectionTrait>(
    db: &C,
    order_id: Uuid,
) -> Result<Vec<payment_transactions::Model>, DbErr> {
    payment_transactions::Entity::find()
        .filter(payment_transactions::Column::OrderId.eq(order_id))
        .order_by_asc(payment_transactions::Column::CreatedAt)
        .all(db)
        .await
}

/// Move a transaction from `from` to `to`. Returns false when the row was not
/// in `from` any more, which makes concurrent webhook deliveries harmless.
pub async fn transition_transaction_status<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    from: TransactionStatus,
    to: TransactionStatus,
) -> Result<bool, DbErr> {
    let result = payment_transactions::Entity::update_many()
        .col_expr(payment_transactions::Column::Status, Expr::value(to))
        .col_expr(
            payment_transactions::Column::UpdatedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(payment_transactions::Column::Id.eq(id))
        .filter(payment_transactions::Column::Status.eq(from))
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}

// ── Withdrawal requests ──

pub async fn insert_withdrawal<C: ConnectionTrait>(
    db: &C,
    seller_id: Uuid,
    amount: Decimal,
    payee: PayeeDetails,
) -> Result<withdrawal_requests::Model, DbErr> {
    let request = withdrawal_requests::ActiveModel {
        id: Set(Uuid::new_v4()),
        seller_id: Set(seller_id),
        amount: Set(amount),
        first_name: Set(payee.first_name),
        last_name: Set(payee.last_name),
        iban: Set(payee.iban),
        is_processed: Set(false),
        settled_amount: Set(Decimal::ZERO),
        created_at: Set(chrono::Utc::now()),
        processed_at: Set(None),
    };

    request.insert(db).await
}

pub async fn get_withdrawal_by_id<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<withdrawal_requests::Model>, DbErr> {
    withdrawal_requests::Entity::find_by_id(id).one(db).await
}

/// Every withdrawal request of a seller, newest first.
pub async fn get_withdrawals_by_seller<C: ConnectionTrait>(
    db: &C,
    seller_id: Uuid,
) -> Result<Vec<withdrawal_requests::Model>, DbErr> {
    withdrawal_requests::Entity::find()
        .filter(withdrawal_requests::Column::SellerId.eq(seller_id))
        .order_by_desc(withdrawal_requests::Column::CreatedAt)
        .all(db)
        .await
}

/// Flip `is_processed` (one-way) and record how much was settled against
/// order payouts. Returns false if the request had already been processed.
pub async fn mark_withdrawal_processed<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
    settled_amount: Decimal,
) -> Result<bool, DbErr> {
    let result = withdrawal_requests::Entity::update_many()
        .col_expr(withdrawal_requests::Column::IsProcessed, Expr::value(true))
        .col_expr(
            withdrawal_requests::Column::SettledAmount,
            Expr::value(settled_amount),
        )
        .col_expr(
            withdrawal_requests::Column::ProcessedAt,
            Expr::value(chrono::Utc::now()),
        )
        .filter(withdrawal_requests::Column::Id.eq(id))
        .filter(withdrawal_requests::Column::IsProcessed.eq(false))
        .exec(db)
        .await?;

    Ok(result.rows_affected > 0)
}
