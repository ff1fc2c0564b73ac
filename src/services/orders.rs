//! Order lifecycle: creation, party-scoped edits, completion and cancellation.
//!
//! Every write goes through [`order_db::apply_changes`], a single UPDATE
//! guarded by the version the caller read. A lost race surfaces as
//! [`AppError::Conflict`] and leaves the row as the winner wrote it.

use sea_orm::{ConnectionTrait, DatabaseConnection, TransactionTrait};
use serde::Serialize;
use uuid::Uuid;

use crate::auth::authorization::{Party, load_order_for};
use crate::bus::Broker;
use crate::db::gigs as gig_db;
use crate::db::notifications as notification_db;
use crate::db::orders::{self as order_db, OrderChanges};
use crate::error::{AppError, AppResult};
use crate::ledger::{self, FeeSplit};
use crate::models::notifications::NotificationType;
use crate::models::order_statuses::{self, OrderState};
use crate::models::orders::{self, CreateOrder, UpdateOrder};
use crate::models::users;
use crate::services::notifications::{self as notify, order_notice};

/// Which side of the caller's orders to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    Any,
    Buyer,
    Seller,
}

/// Result of a buyer completing an order.
#[derive(Debug, Clone, Serialize)]
pub struct Completion {
    pub order: orders::OrderResponse,
    #[serde(flatten)]
    pub split: FeeSplit,
}

fn current_state(order: &orders::Model) -> AppResult<OrderState> {
    order
        .state()
        .ok_or_else(|| AppError::Conflict(format!("Order {} has no status", order.id)))
}

fn stale(order_id: Uuid) -> AppError {
    AppError::Conflict(format!(
        "Order {order_id} was modified concurrently, reload and retry"
    ))
}

/// Place an order on a gig. The seller's notification is stored in the same
/// transaction as the order.
pub async fn create_order(
    db: &DatabaseConnection,
    bus: &dyn Broker,
    buyer: &users::Model,
    input: CreateOrder,
) -> AppResult<orders::Model> {
    let gig = gig_db::get_gig_by_id(db, input.gig_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Gig {} not found", input.gig_id)))?;

    if !gig.is_active {
        return Err(AppError::Validation(
            "This gig is not accepting orders".to_string(),
        ));
    }
    if gig.seller_id == buyer.id {
        return Err(AppError::Validation(
            "You cannot order your own gig".to_string(),
        ));
    }

    let txn = db.begin().await?;
    let order = order_db::insert_order(&txn, buyer.id, input).await?;
    let notification = notification_db::insert_notification(
        &txn,
        order_notice(
            gig.seller_id,
            order.id,
            "New Order Received",
            format!("Order #{} has been placed.", order.id),
            NotificationType::Order,
        ),
    )
    .await?;
    txn.commit().await?;

    tracing::info!(
        "Order {} placed by {} on gig {}",
        order.id,
        buyer.id,
        gig.id
    );
    notify::push(bus, &notification).await;

    Ok(order)
}

/// A single order, visible to its buyer, its seller and admins.
pub async fn get_order<C: ConnectionTrait>(
    db: &C,
    user: &users::Model,
    order_id: Uuid,
) -> AppResult<orders::Model> {
    let (order, _, _) = load_order_for(db, order_id, user).await?;
    Ok(order)
}

pub async fn list_orders<C: ConnectionTrait>(
    db: &C,
    user: &users::Model,
    side: OrderSide,
) -> AppResult<Vec<orders::Model>> {
    let rows = match side {
        OrderSide::Any => order_db::get_active_orders_for_user(db, user.id).await?,
        OrderSide::Buyer => order_db::get_active_orders_by_buyer(db, user.id).await?,
        OrderSide::Seller => order_db::get_active_orders_by_seller(db, user.id).await?,
    };
    Ok(rows)
}

pub async fn list_statuses<C: ConnectionTrait>(db: &C) -> AppResult<Vec<order_statuses::Model>> {
    Ok(order_db::get_statuses(db).await?)
}

/// Party-scoped edit.
///
/// The buyer may only change `requirements`; doing so on a delivered order
/// sends it back for revision. The seller may only mark the order Delivered
/// and set the delivery date. Admins who are not a party can cancel but not
/// edit.
pub async fn update_order(
    db: &DatabaseConnection,
    bus: &dyn Broker,
    user: &users::Model,
    order_id: Uuid,
    input: UpdateOrder,
) -> AppResult<orders::Model> {
    let (order, gig, party) = load_order_for(db, order_id, user).await?;
    let state = current_state(&order)?;

    let changes = match party {
        Party::Buyer => buyer_changes(state, input)?,
        Party::Seller => seller_changes(state, input, chrono::Utc::now())?,
        Party::Admin | Party::Stranger => {
            return Err(AppError::Forbidden(
                "Only the buyer or the seller can edit an order".to_string(),
            ));
        }
    };

    let new_state = changes.status;
    let updated = order_db::apply_changes(db, &order, changes)
        .await?
        .ok_or_else(|| stale(order.id))?;

    match new_state {
        Some(OrderState::Delivered) => {
            tracing::info!("Order {} delivered", order.id);
            notify::notify_quietly(
                db,
                bus,
                order_notice(
                    order.buyer_id,
                    order.id,
                    "Order Delivered",
                    format!("Order #{} has been delivered.", order.id),
                    NotificationType::Order,
                ),
            )
            .await;
        }
        Some(OrderState::Revision) => {
            tracing::info!("Revision requested on order {}", order.id);
            notify::notify_quietly(
                db,
                bus,
                order_notice(
                    gig.seller_id,
                    order.id,
                    "Revision Requested",
                    format!("The buyer updated the requirements of order #{}.", order.id),
                    NotificationType::Order,
                ),
            )
            .await;
        }
        _ => {}
    }

    Ok(updated)
}

fn buyer_changes(state: OrderState, input: UpdateOrder) -> AppResult<OrderChanges> {
    if input.status.is_some() || input.delivery_date.is_some() {
        return Err(AppError::Forbidden(
            "Buyers can only edit the requirements".to_string(),
        ));
    }
    let requirements = input
        .requirements
        .ok_or_else(|| AppError::Validation("Nothing to update".to_string()))?;

    if state.is_terminal() {
        return Err(AppError::Conflict(format!(
            "Cannot edit an order that is {state}"
        )));
    }

    let status = (state == OrderState::Delivered).then_some(OrderState::Revision);

    Ok(OrderChanges {
        requirements: Some(requirements),
        status,
        ..Default::default()
    })
}

/// The delivery date anchors the buyer's acceptance window, so it can only
/// move forward from `now`.
fn seller_changes(
    state: OrderState,
    input: UpdateOrder,
    now: chrono::DateTime<chrono::Utc>,
) -> AppResult<OrderChanges> {
    if input.requirements.is_some() {
        return Err(AppError::Forbidden(
            "Only the buyer can edit the requirements".to_string(),
        ));
    }

    if input.delivery_date.is_some_and(|date| date < now) {
        return Err(AppError::Validation(
            "Delivery date cannot be in the past".to_string(),
        ));
    }

    match input.status {
        Some(OrderState::Delivered) => {
            if !state.can_transition_to(OrderState::Delivered) {
                return Err(AppError::Conflict(format!(
                    "Cannot deliver an order that is {state}"
                )));
            }
            Ok(OrderChanges {
                status: Some(OrderState::Delivered),
                delivery_date: Some(input.delivery_date.unwrap_or(now)),
                ..Default::default()
            })
        }
        Some(_) => Err(AppError::Forbidden(
            "Sellers can only mark an order as Delivered".to_string(),
        )),
        None => {
            let delivery_date = input
                .delivery_date
                .ok_or_else(|| AppError::Validation("Nothing to update".to_string()))?;
            if state.is_terminal() {
                return Err(AppError::Conflict(format!(
                    "Cannot edit an order that is {state}"
                )));
            }
            Ok(OrderChanges {
                delivery_date: Some(delivery_date),
                ..Default::default()
            })
        }
    }
}

/// Buyer accepts the delivery. Fees are computed once and written together
/// with the Completed status.
pub async fn complete_order(
    db: &DatabaseConnection,
    bus: &dyn Broker,
    user: &users::Model,
    order_id: Uuid,
) -> AppResult<Completion> {
    let (order, gig, party) = load_order_for(db, order_id, user).await?;

    if party != Party::Buyer {
        return Err(AppError::Forbidden(
            "Only the buyer can complete this order".to_string(),
        ));
    }

    let state = current_state(&order)?;
    if state == OrderState::Completed {
        return Err(AppError::Conflict(
            "Order already marked as completed".to_string(),
        ));
    }
    if !order.is_paid {
        return Err(AppError::Unpaid);
    }
    if !state.can_transition_to(OrderState::Completed) {
        return Err(AppError::Conflict(format!(
            "Cannot complete an order that is {state}"
        )));
    }

    let split = ledger::compute_split(gig.price);
    let updated = order_db::apply_changes(db, &order, completion_changes(&split))
        .await?
        .ok_or_else(|| stale(order.id))?;

    tracing::info!(
        "Order {} completed, seller payout {}",
        order.id,
        split.seller_payout
    );
    notify::notify_quietly(
        db,
        bus,
        order_notice(
            gig.seller_id,
            order.id,
            "Order Completed",
            format!("Order #{} was accepted by the buyer.", order.id),
            NotificationType::Order,
        ),
    )
    .await;

    Ok(Completion {
        order: updated.into(),
        split,
    })
}

/// The write that moves an order to Completed.
pub(crate) fn completion_changes(split: &FeeSplit) -> OrderChanges {
    OrderChanges {
        status: Some(OrderState::Completed),
        fees: Some((split.platform_fee, split.seller_payout)),
        payout_sent: Some(false),
        ..Default::default()
    }
}

/// Soft-delete. Buyer, seller and admins may cancel any non-terminal order.
pub async fn cancel_order(
    db: &DatabaseConnection,
    bus: &dyn Broker,
    user: &users::Model,
    order_id: Uuid,
) -> AppResult<orders::Model> {
    let (order, gig, party) = load_order_for(db, order_id, user).await?;
    let state = current_state(&order)?;

    if !state.can_transition_to(OrderState::Cancelled) {
        return Err(AppError::Conflict(format!(
            "Cannot cancel an order that is {state}"
        )));
    }

    let updated = order_db::apply_changes(
        db,
        &order,
        OrderChanges {
            status: Some(OrderState::Cancelled),
            is_active: Some(false),
            ..Default::default()
        },
    )
    .await?
    .ok_or_else(|| stale(order.id))?;

    tracing::info!("Order {} cancelled by {} ({party:?})", order.id, user.id);

    let recipients = match party {
        Party::Buyer => vec![gig.seller_id],
        Party::Seller => vec![order.buyer_id],
        _ => vec![order.buyer_id, gig.seller_id],
    };
    for recipient in recipients {
        notify::notify_quietly(
            db,
            bus,
            order_notice(
                recipient,
                order.id,
                "Order Cancelled",
                format!("Order #{} has been cancelled.", order.id),
                NotificationType::Order,
            ),
        )
        .await;
    }

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn edit(requirements: Option<&str>, status: Option<OrderState>) -> UpdateOrder {
        UpdateOrder {
            requirements: requirements.map(str::to_string),
            status,
            delivery_date: None,
        }
    }

    #[test]
    fn buyer_edit_on_delivered_order_requests_revision() {
        let changes = buyer_changes(OrderState::Delivered, edit(Some("more blue"), None)).unwrap();
        assert_eq!(changes.status, Some(OrderState::Revision));
        assert_eq!(changes.requirements.as_deref(), Some("more blue"));
    }

    #[test]
    fn buyer_edit_in_progress_keeps_state() {
        let changes = buyer_changes(OrderState::InProgress, edit(Some("x"), None)).unwrap();
        assert_eq!(changes.status, None);
    }

    #[test]
    fn buyer_cannot_set_status() {
        let err = buyer_changes(OrderState::Delivered, edit(None, Some(OrderState::Completed)))
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn seller_cannot_jump_to_completed() {
        for state in OrderState::ALL {
            let err = seller_changes(state, edit(None, Some(OrderState::Completed)), Utc::now())
                .unwrap_err();
            assert!(matches!(err, AppError::Forbidden(_)));
        }
    }

    #[test]
    fn seller_delivery_defaults_the_delivery_date() {
        let now = Utc::now();
        let changes = seller_changes(
            OrderState::Revision,
            edit(None, Some(OrderState::Delivered)),
            now,
        )
        .unwrap();
        assert_eq!(changes.status, Some(OrderState::Delivered));
        assert_eq!(changes.delivery_date, Some(now));
    }

    #[test]
    fn seller_cannot_redeliver_a_delivered_order() {
        let err = seller_changes(
            OrderState::Delivered,
            edit(None, Some(OrderState::Delivered)),
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn seller_cannot_backdate_delivery() {
        let now = Utc::now();
        let mut input = edit(None, Some(OrderState::Delivered));
        input.delivery_date = Some(now - Duration::days(10));
        let err = seller_changes(OrderState::InProgress, input, now).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut input = edit(None, None);
        input.delivery_date = Some(now - Duration::seconds(1));
        let err = seller_changes(OrderState::Delivered, input, now).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn seller_may_postpone_delivery_date() {
        let now = Utc::now();
        let mut input = edit(None, None);
        input.delivery_date = Some(now + Duration::days(2));
        let changes = seller_changes(OrderState::Delivered, input, now).unwrap();
        assert_eq!(changes.delivery_date, Some(now + Duration::days(2)));
        assert_eq!(changes.status, None);
    }
}
