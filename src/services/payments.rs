//! Checkout initiation and webhook reconciliation.

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::authorization::{Party, load_order_for};
use crate::bus::Broker;
use crate::db::orders::{self as order_db, OrderChanges};
use crate::db::payments as payment_db;
use crate::error::{AppError, AppResult};
use crate::gateway::{CheckoutRequest, PaymentGateway, WebhookPayload};
use crate::ledger;
use crate::models::notifications::NotificationType;
use crate::models::payment_transactions::{CreateTransaction, TransactionStatus, TransactionType};
use crate::models::{orders, users};
use crate::services::notifications::{notify_quietly, order_notice};

/// Attempts at re-reading an order whose version moved under us while
/// flipping `is_paid`.
const PAID_FLAG_ATTEMPTS: usize = 3;

#[derive(Debug, Clone, Serialize)]
pub struct InitiatedPayment {
    pub checkout_url: String,
    pub transaction_id: String,
}

/// What a webhook delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// Unknown reference or unusable status. Nothing changed.
    Ignored,
    /// Replay of a status already recorded.
    Unchanged,
    Updated {
        status: TransactionStatus,
        order_marked_paid: bool,
    },
}

/// Open a checkout session for the buyer's order.
///
/// The gateway is called once; a non-2xx answer is handed back verbatim. On
/// success the pending transaction and the order's reference are written in
/// one database transaction.
pub async fn initiate_payment(
    db: &DatabaseConnection,
    gateway: &dyn PaymentGateway,
    user: &users::Model,
    order_id: Uuid,
) -> AppResult<InitiatedPayment> {
    let (order, gig, party) = load_order_for(db, order_id, user).await?;

    if party != Party::Buyer {
        return Err(AppError::Forbidden(
            "Only the buyer can pay for this order".to_string(),
        ));
    }
    if order.is_paid {
        return Err(AppError::Conflict("Order already paid".to_string()));
    }
    if !order.is_active {
        return Err(AppError::Conflict(
            "Cannot pay for a cancelled order".to_string(),
        ));
    }

    let amount_minor = ledger::to_minor_units(gig.price).ok_or_else(|| {
        AppError::Validation(format!("Order amount {} is out of range", gig.price))
    })?;

    let session = gateway
        .initialize(CheckoutRequest {
            order_id: order.id,
            amount_minor,
            email: user.email.clone(),
        })
        .await?;

    let txn = db.begin().await?;
    payment_db::insert_transaction(
        &txn,
        CreateTransaction {
            order_id: order.id,
            user_id: user.id,
            transaction_type: TransactionType::Payment,
            reference: session.reference.clone(),
            amount: gig.price,
            status: TransactionStatus::Pending,
        },
    )
    .await?;

    // Re-read inside the transaction so a concurrent edit does not fail the
    // checkout the gateway has already opened.
    let fresh = order_db::get_order_by_id(&txn, order.id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order {order_id} not found")))?;
    if fresh.is_paid {
        return Err(AppError::Conflict("Order already paid".to_string()));
    }
    order_db::apply_changes(
        &txn,
        &fresh,
        OrderChanges {
            external_transaction_id: Some(session.reference.clone()),
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(|| {
        AppError::Conflict(format!(
            "Order {order_id} was modified concurrently, reload and retry"
        ))
    })?;
    txn.commit().await?;

    tracing::info!(
        "Checkout {} opened for order {}",
        session.reference,
        order.id
    );

    Ok(InitiatedPayment {
        checkout_url: session.authorization_url,
        transaction_id: session.reference,
    })
}

/// Reconcile an asynchronous gateway confirmation.
///
/// Unknown references are dropped; the gateway retries blindly and may send
/// events for resources we never created. A successful transaction is never
/// downgraded, and `is_paid` only flips once.
pub async fn handle_webhook(
    db: &DatabaseConnection,
    bus: &dyn Broker,
    payload: WebhookPayload,
) -> AppResult<WebhookOutcome> {
    let reference = payload.data.reference;

    let Some(tx) = payment_db::get_transaction_by_reference(db, &reference).await? else {
        tracing::warn!("Webhook for unknown reference {reference}, discarding");
        return Ok(WebhookOutcome::Ignored);
    };

    let Some(status) = TransactionStatus::from_gateway(&payload.data.status) else {
        tracing::warn!(
            "Webhook for {reference} carried unknown status {:?}, discarding",
            payload.data.status
        );
        return Ok(WebhookOutcome::Ignored);
    };

    if tx.status.is_final() && status != tx.status {
        tracing::warn!("Ignoring {status:?} for settled transaction {reference}");
        return Ok(WebhookOutcome::Ignored);
    }

    let txn = db.begin().await?;

    let status_changed = status != tx.status
        && payment_db::transition_transaction_status(&txn, tx.id, tx.status, status).await?;

    let mut paid_order = None;
    if status == TransactionStatus::Success && tx.transaction_type == TransactionType::Payment {
        paid_order = mark_order_paid(&txn, tx.order_id).await?;
    }

    txn.commit().await?;

    if !status_changed && paid_order.is_none() {
        tracing::debug!("Webhook replay for {reference}, nothing to do");
        return Ok(WebhookOutcome::Unchanged);
    }

    tracing::info!("Transaction {reference} is now {status:?}");

    if let Some(order) = &paid_order {
        tracing::info!("Order {} marked paid", order.id);
        notify_payment_confirmed(db, bus, order).await;
    }

    Ok(WebhookOutcome::Updated {
        status,
        order_marked_paid: paid_order.is_some(),
    })
}

/// Flip `is_paid` if it is not set yet. Returns the order only when this call
/// did the flip.
async fn mark_order_paid<C: ConnectionTrait>(
    db: &C,
    order_id: Uuid,
) -> AppResult<Option<orders::Model>> {
    for _ in 0..PAID_FLAG_ATTEMPTS {
        let Some(order) = order_db::get_order_by_id(db, order_id).await? else {
            tracing::warn!("Paid transaction references missing order {order_id}");
            return Ok(None);
        };
        if order.is_paid {
            return Ok(None);
        }

        let changes = OrderChanges {
            is_paid: Some(true),
            ..Default::default()
        };
        if let Some(updated) = order_db::apply_changes(db, &order, changes).await? {
            return Ok(Some(updated));
        }
    }

    Err(AppError::Conflict(format!(
        "Order {order_id} kept changing while recording payment"
    )))
}

async fn notify_payment_confirmed(db: &DatabaseConnection, bus: &dyn Broker, order: &orders::Model) {
    notify_quietly(
        db,
        bus,
        order_notice(
            order.buyer_id,
            order.id,
            "Payment Confirmed",
            format!("Your payment for order #{} was received.", order.id),
            NotificationType::System,
        ),
    )
    .await;

    match crate::db::gigs::get_gig_by_id(db, order.gig_id).await {
        Ok(Some(gig)) => {
            notify_quietly(
                db,
                bus,
                order_notice(
                    gig.seller_id,
                    order.id,
                    "Order Paid",
                    format!("Order #{} has been paid. You can start working.", order.id),
                    NotificationType::System,
                ),
            )
            .await
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Could not load gig for paid order {}: {e}", order.id),
    }
}
