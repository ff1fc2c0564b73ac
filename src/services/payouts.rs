//! Seller earnings, withdrawals, payout approval and the auto-release sweep.
//!
//! Available balance is the sum of unsent payouts on completed, paid orders,
//! minus whatever part of each withdrawal request has not been settled
//! against those payouts yet. A request therefore reserves its amount from
//! the moment it is filed, and processing it only moves money from
//! "reserved" to "sent".

use rust_decimal::Decimal;
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait, QuerySelect, TransactionTrait,
};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::authorization::require_admin;
use crate::bus::{Broker, Bus};
use crate::config::PayoutConfig;
use crate::db::orders::{self as order_db, OrderChanges};
use crate::db::payments as payment_db;
use crate::error::{AppError, AppResult};
use crate::ledger;
use crate::models::notifications::{CreateNotification, NotificationType};
use crate::models::order_statuses::OrderState;
use crate::models::payment_transactions::{CreateTransaction, TransactionStatus, TransactionType};
use crate::models::withdrawal_requests::{self, CreateWithdrawal};
use crate::models::{gigs, orders, users};
use crate::services::notifications::{self as notify, order_notice};
use crate::services::orders::completion_changes;

const MAX_IBAN_LEN: usize = 34;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Balances {
    /// Earned and withdrawable.
    pub available: Decimal,
    /// Collected from buyers on orders that are not completed yet.
    pub held: Decimal,
    pub total_paid_out: Decimal,
    /// Requested but not yet processed by an admin.
    pub pending_withdrawals: Decimal,
}

pub async fn balances<C: ConnectionTrait>(db: &C, seller_id: Uuid) -> AppResult<Balances> {
    let unsent: Decimal = order_db::find_unsent_payouts_by_seller(db, seller_id)
        .await?
        .iter()
        .map(payout_of)
        .sum();

    let withdrawals = payment_db::get_withdrawals_by_seller(db, seller_id).await?;
    let reserved: Decimal = withdrawals.iter().map(|w| w.outstanding()).sum();
    let pending_withdrawals: Decimal = withdrawals
        .iter()
        .filter(|w| !w.is_processed)
        .map(|w| w.amount)
        .sum();

    let held: Decimal = order_db::find_paid_by_seller_in_states(
        db,
        seller_id,
        &[
            OrderState::InProgress,
            OrderState::Delivered,
            OrderState::Revision,
        ],
    )
    .await?
    .iter()
    .map(|(_, gig)| gig.price)
    .sum();

    let total_paid_out: Decimal = order_db::find_sent_payouts_by_seller(db, seller_id)
        .await?
        .iter()
        .map(payout_of)
        .sum();

    Ok(Balances {
        available: ledger::to_cents((unsent - reserved).max(Decimal::ZERO)),
        held: ledger::to_cents(held),
        total_paid_out: ledger::to_cents(total_paid_out),
        pending_withdrawals: ledger::to_cents(pending_withdrawals),
    })
}

fn payout_of(order: &orders::Model) -> Decimal {
    order.seller_payout.unwrap_or(Decimal::ZERO)
}

fn validate_withdrawal(input: &CreateWithdrawal) -> AppResult<Decimal> {
    let amount = input
        .amount
        .ok_or_else(|| AppError::Validation("Amount required".to_string()))?;

    if amount <= Decimal::ZERO {
        return Err(AppError::Validation(
            "Amount must be greater than zero".to_string(),
        ));
    }
    if amount.round_dp(2) != amount {
        return Err(AppError::Validation(
            "Amount cannot have more than two decimal places".to_string(),
        ));
    }
    if input.first_name.trim().is_empty() || input.last_name.trim().is_empty() {
        return Err(AppError::Validation("Payee name is required".to_string()));
    }

    let iban = input.iban.trim();
    if iban.is_empty()
        || iban.len() > MAX_IBAN_LEN
        || !iban.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(AppError::Validation("IBAN is invalid".to_string()));
    }

    Ok(amount)
}

/// File a withdrawal request against the seller's available balance and
/// tell the admins about it.
pub async fn request_withdrawal(
    db: &DatabaseConnection,
    bus: &dyn Broker,
    seller: &users::Model,
    input: CreateWithdrawal,
) -> AppResult<withdrawal_requests::Model> {
    let amount = validate_withdrawal(&input)?;
    let mut payee = input.payee();
    payee.iban = payee.iban.trim().to_ascii_uppercase();

    let txn = db.begin().await?;

    // Serialize concurrent requests of one seller on Postgres. SQLite
    // already serializes writers.
    if txn.get_database_backend() == DbBackend::Postgres {
        users::Entity::find_by_id(seller.id)
            .lock_exclusive()
            .one(&txn)
            .await?;
    }

    let available = balances(&txn, seller.id).await?.available;
    if amount > available {
        return Err(AppError::InsufficientBalance {
            requested: amount,
            available,
        });
    }

    let request = payment_db::insert_withdrawal(&txn, seller.id, amount, payee).await?;
    txn.commit().await?;

    tracing::info!(
        "Withdrawal {} of {amount} requested by seller {}",
        request.id,
        seller.id
    );

    let body = format!(
        "{} requested a withdrawal of {amount}.",
        seller.public_name()
    );
    if let Err(e) = notify::notify_admins(
        db,
        bus,
        "New Withdrawal Request",
        &body,
        Some(format!("/admin/withdrawals/{}", request.id)),
    )
    .await
    {
        tracing::warn!("Failed to notify admins about withdrawal {}: {e}", request.id);
    }

    Ok(request)
}

pub async fn list_withdrawals<C: ConnectionTrait>(
    db: &C,
    seller_id: Uuid,
) -> AppResult<Vec<withdrawal_requests::Model>> {
    Ok(payment_db::get_withdrawals_by_seller(db, seller_id).await?)
}

/// Record an outgoing payout for one order.
async fn record_payout<C: ConnectionTrait>(
    db: &C,
    order: &orders::Model,
    seller_id: Uuid,
) -> AppResult<()> {
    payment_db::insert_transaction(
        db,
        CreateTransaction {
            order_id: order.id,
            user_id: seller_id,
            transaction_type: TransactionType::Payout,
            reference: format!("payout_{}", order.id),
            amount: payout_of(order),
            status: TransactionStatus::Success,
        },
    )
    .await?;
    Ok(())
}

/// Admin marks a withdrawal as paid out. The seller's oldest unsent payouts
/// that fit in the requested amount are marked sent in the same transaction.
pub async fn approve_withdrawal(
    db: &DatabaseConnection,
    bus: &dyn Broker,
    admin: &users::Model,
    withdrawal_id: Uuid,
) -> AppResult<withdrawal_requests::Model> {
    require_admin(admin)?;

    let request = payment_db::get_withdrawal_by_id(db, withdrawal_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Withdrawal {withdrawal_id} not found")))?;

    if request.is_processed {
        return Err(AppError::Conflict(
            "Withdrawal already processed".to_string(),
        ));
    }

    let txn = db.begin().await?;

    let mut remaining = request.amount;
    let mut settled = Decimal::ZERO;
    for order in order_db::find_unsent_payouts_by_seller(&txn, request.seller_id).await? {
        let payout = payout_of(&order);
        if payout > remaining {
            continue;
        }

        let changes = OrderChanges {
            payout_sent: Some(true),
            ..Default::default()
        };
        if let Some(sent) = order_db::apply_changes(&txn, &order, changes).await? {
            record_payout(&txn, &sent, request.seller_id).await?;
            remaining -= payout;
            settled += payout;
        }
    }

    if !payment_db::mark_withdrawal_processed(&txn, request.id, settled).await? {
        return Err(AppError::Conflict(
            "Withdrawal already processed".to_string(),
        ));
    }
    txn.commit().await?;

    tracing::info!(
        "Withdrawal {} processed by {}, {settled} settled against order payouts",
        request.id,
        admin.id
    );

    notify::notify_quietly(
        db,
        bus,
        CreateNotification {
            user_id: request.seller_id,
            title: "Withdrawal Processed".to_string(),
            body: format!("Your withdrawal of {} has been processed.", request.amount),
            notification_type: NotificationType::System,
            target_url: Some("/earnings".to_string()),
        },
    )
    .await;

    payment_db::get_withdrawal_by_id(db, request.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Withdrawal {withdrawal_id} not found")))
}

/// Admin releases the payout of one completed order.
pub async fn approve_payout(
    db: &DatabaseConnection,
    bus: &dyn Broker,
    admin: &users::Model,
    order_id: Uuid,
) -> AppResult<orders::Model> {
    require_admin(admin)?;

    let (order, gig) = order_db::get_order_with_gig(db, order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;

    if !order.is_in(OrderState::Completed) {
        return Err(AppError::Conflict(
            "Only completed orders can be paid out".to_string(),
        ));
    }
    if !order.is_paid {
        return Err(AppError::Unpaid);
    }
    if order.payout_sent {
        return Err(AppError::Conflict("Payout already sent".to_string()));
    }

    let txn = db.begin().await?;
    let updated = order_db::apply_changes(
        &txn,
        &order,
        OrderChanges {
            payout_sent: Some(true),
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(|| AppError::Conflict("Payout already sent".to_string()))?;
    record_payout(&txn, &updated, gig.seller_id).await?;
    txn.commit().await?;

    tracing::info!("Payout for order {} approved by {}", order.id, admin.id);

    notify::notify_quietly(
        db,
        bus,
        order_notice(
            gig.seller_id,
            order.id,
            "Payout Sent",
            format!(
                "The payout of {} for order #{} has been sent.",
                payout_of(&updated),
                order.id
            ),
            NotificationType::System,
        ),
    )
    .await;

    Ok(updated)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub completed: Vec<Uuid>,
    /// Orders another writer changed between the scan and the update.
    pub skipped: usize,
    pub failed: usize,
}

/// Complete every paid order that has sat in Delivered for longer than
/// `grace`. Buyer silence counts as acceptance.
///
/// Each order is written with the same version-guarded update a buyer's
/// completion uses, so concurrent sweeps and user actions complete an order
/// at most once. One order failing does not stop the rest.
pub async fn sweep_overdue_deliveries(
    db: &DatabaseConnection,
    bus: &dyn Broker,
    grace: chrono::Duration,
    now: chrono::DateTime<chrono::Utc>,
) -> AppResult<SweepReport> {
    let cutoff = now - grace;
    let overdue = order_db::find_overdue_deliveries(db, cutoff).await?;
    let mut report = SweepReport::default();

    for (order, gig) in overdue {
        match complete_overdue(db, &order, &gig).await {
            Ok(Some(_)) => {
                report.completed.push(order.id);
                notify::notify_quietly(
                    db,
                    bus,
                    order_notice(
                        gig.seller_id,
                        order.id,
                        "Order Completed",
                        format!(
                            "Order #{} was completed automatically after the review period.",
                            order.id
                        ),
                        NotificationType::Order,
                    ),
                )
                .await;
            }
            Ok(None) => {
                tracing::debug!("Order {} changed during sweep, skipping", order.id);
                report.skipped += 1;
            }
            Err(e) => {
                tracing::error!("Failed to auto-complete order {}: {e}", order.id);
                report.failed += 1;
            }
        }
    }

    if !report.completed.is_empty() || report.failed > 0 {
        tracing::info!(
            "Payout sweep: {} completed, {} skipped, {} failed",
            report.completed.len(),
            report.skipped,
            report.failed
        );
    }

    Ok(report)
}

async fn complete_overdue(
    db: &DatabaseConnection,
    order: &orders::Model,
    gig: &gigs::Model,
) -> AppResult<Option<orders::Model>> {
    let split = ledger::compute_split(gig.price);
    Ok(order_db::apply_changes(db, order, completion_changes(&split)).await?)
}

/// Run the sweep every `config.sweep_interval` until the runtime shuts down.
pub fn spawn_sweeper(
    db: DatabaseConnection,
    bus: Bus,
    config: PayoutConfig,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(config.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            if let Err(e) =
                sweep_overdue_deliveries(&db, bus.as_ref(), config.grace_period, chrono::Utc::now())
                    .await
            {
                tracing::error!("Payout sweep failed: {e}");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn withdrawal(amount: Option<Decimal>, iban: &str) -> CreateWithdrawal {
        CreateWithdrawal {
            amount,
            first_name: "Dana".to_string(),
            last_name: "Levi".to_string(),
            iban: iban.to_string(),
        }
    }

    #[test]
    fn withdrawal_requires_positive_amount() {
        assert!(matches!(
            validate_withdrawal(&withdrawal(None, "PS92PALS000000000400123456702")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_withdrawal(&withdrawal(Some(Decimal::ZERO), "PS92PALS000000000400123456702")),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            validate_withdrawal(&withdrawal(Some(Decimal::new(1, 3)), "PS92PALS000000000400123456702")),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn withdrawal_rejects_malformed_iban() {
        let amount = Some(Decimal::new(5000, 2));
        assert!(validate_withdrawal(&withdrawal(amount, "PS92PALS000000000400123456702")).is_ok());
        assert!(validate_withdrawal(&withdrawal(amount, "")).is_err());
        assert!(validate_withdrawal(&withdrawal(amount, "PS92-PALS")).is_err());
        assert!(validate_withdrawal(&withdrawal(amount, &"A".repeat(35))).is_err());
    }
}
