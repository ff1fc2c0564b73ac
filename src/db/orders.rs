use rust_decimal::Decimal;
use sea_orm::prelude::Expr;
use sea_orm::*;
use uuid::Uuid;

use crate::models::gigs;
use crate::models::order_statuses::{self, OrderState};
use crate::models::orders::{self, CreateOrder};

/// Insert a new order for `buyer_id` in the In Progress state.
pub async fn insert_order<C: ConnectionTrait>(
    db: &C,
    buyer_id: Uuid,
    input: CreateOrder,
) -> Result<orders::Model, DbErr> {
    let now = chrono::Utc::now();
    let new_order = orders::ActiveModel {
        id: Set(Uuid::new_v4()),
        buyer_id: Set(buyer_id),
        gig_id: Set(input.gig_id),
        status_id: Set(Some(OrderState::InProgress.id())),
        requirements: Set(input.requirements),
        delivery_date: Set(None),
        is_active: Set(true),
        is_paid: Set(false),
        external_transaction_id: Set(None),
        platform_fee: Set(None),
        seller_payout: Set(None),
        payout_sent: Set(false),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };

    new_order.insert(db).await
}

/// Fetch a single order by ID, active or not.
pub async fn get_order_by_id<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<orders::Model>, DbErr> {
    orders::Entity::find_by_id(id).one(db).await
}

/// Fetch an order together with the gig it was placed on.
pub async fn get_order_with_gig<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<(orders::Model, gigs::Model)>, DbErr> {
    let row = orders::Entity::find_by_id(id)
        .find_also_related(gigs::Entity)
        .one(db)
        .await?;

    Ok(row.and_then(|(order, gig)| gig.map(|gig| (order, gig))))
}

/// Active orders placed by `buyer_id`, newest first.
pub async fn get_active_orders_by_buyer<C: ConnectionTrait>(
    db: &C,
    buyer_id: Uuid,
) -> Result<Vec<orders::Model>, DbErr> {
    orders::Entity::find()
        .filter(orders::Column::BuyerId.eq(buyer_id))
        .filter(orders::Column::IsActive.eq(true))
        .order_by_desc(orders::Column::CreatedAt)
        .all(db)
        .await
}

/// Active orders on gigs owned by `seller_id`, newest first.
pub async fn get_active_orders_by_seller<C: ConnectionTrait>(
    db: &C,
    seller_id: Uuid,
) -> Result<Vec<orders::Model>, DbErr> {
    orders::Entity::find()
        .inner_join(gigs::Entity)
        .filter(gigs::Column::SellerId.eq(seller_id))
        .filter(orders::Column::IsActive.eq(true))
        .order_by_desc(orders::Column::CreatedAt)
        .all(db)
        .await
}

/// Active orders where `user_id` is either the buyer or the seller.
pub async fn get_active_orders_for_user<C: ConnectionTrait>(
    db: &C,
    user_id: Uuid,
) -> Result<Vec<orders::Model>, DbErr> {
    orders::Entity::find()
        .inner_join(gigs::Entity)
        .filter(
            Condition::any()
                .add(orders::Column::BuyerId.eq(user_id))
                .add(gigs::Column::SellerId.eq(user_id)),
        )
        .filter(orders::Column::IsActive.eq(true))
        .order_by_desc(orders::Column::CreatedAt)
        .all(db)
        .await
}

/// The static status reference rows.
pub async fn get_statuses<C: ConnectionTrait>(
    db: &C,
) -> Result<Vec<order_statuses::Model>, DbErr> {
    order_statuses::Entity::find()
        .order_by_asc(order_statuses::Column::Id)
        .all(db)
        .await
}

/// A partial write to an order. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct OrderChanges {
    pub status: Option<OrderState>,
    pub requirements: Option<String>,
    pub delivery_date: Option<chrono::DateTime<chrono::Utc>>,
    pub is_active: Option<bool>,
    pub is_paid: Option<bool>,
    pub external_transaction_id: Option<String>,
    /// `(platform_fee, seller_payout)`, always written together.
    pub fees: Option<(Decimal, Decimal)>,
    pub payout_sent: Option<bool>,
}

/// Write `changes` to `order` in one statement, guarded by the version the
/// caller read. Returns `Ok(None)` when another writer got there first; the
/// row is left untouched in that case.
pub async fn apply_changes<C: ConnectionTrait>(
    db: &C,
    order: &orders::Model,
    changes: OrderChanges,
) -> Result<Option<orders::Model>, DbErr> {
    let mut update = orders::Entity::update_many()
        .col_expr(orders::Column::Version, Expr::value(order.version + 1))
        .col_expr(orders::Column::UpdatedAt, Expr::value(chrono::Utc::now()));

    if let Some(state) = changes.status {
        update = update.col_expr(orders::Column::StatusId, Expr::value(state.id()));
    }
    if let Some(requirements) = changes.requirements {
        update = update.col_expr(orders::Column::Requirements, Expr::value(requirements));
    }
    if let Some(delivery_date) = changes.delivery_date {
        update = update.col_expr(orders::Column::DeliveryDate, Expr::value(delivery_date));
    }
    if let Some(is_active) = changes.is_active {
        update = update.col_expr(orders::Column::IsActive, Expr::value(is_active));
    }
    if let Some(is_paid) = changes.is_paid {
        update = update.col_expr(orders::Column::IsPaid, Expr::value(is_paid));
    }
    if let Some(reference) = changes.external_transaction_id {
        update = update.col_expr(orders::Column::ExternalTransactionId, Expr::value(reference));
    }
    if let Some((platform_fee, seller_payout)) = changes.fees {
        update = update
            .col_expr(orders::Column::PlatformFee, Expr::value(platform_fee))
            .col_expr(orders::Column::SellerPayout, Expr::value(seller_payout));
    }
    if let Some(payout_sent) = changes.payout_sent {
        update = update.col_expr(orders::Column::PayoutSent, Expr::value(payout_sent));
    }

    let result = update
        .filter(orders::Column::Id.eq(order.id))
        .filter(orders::Column::Version.eq(order.version))
        .exec(db)
        .await?;

    if result.rows_affected == 0 {
        return Ok(None);
    }

    get_order_by_id(db, order.id).await
}

/// Delivered, paid, not yet paid out, and delivered on or before `cutoff`.
pub async fn find_overdue_deliveries<C: ConnectionTrait>(
    db: &C,
    cutoff: chrono::DateTime<chrono::Utc>,
) -> Result<Vec<(orders::Model, gigs::Model)>, DbErr> {
    let rows = orders::Entity::find()
        .find_also_related(gigs::Entity)
        .filter(orders::Column::StatusId.eq(OrderState::Delivered.id()))
        .filter(orders::Column::IsActive.eq(true))
        .filter(orders::Column::IsPaid.eq(true))
        .filter(orders::Column::PayoutSent.eq(false))
        .filter(orders::Column::DeliveryDate.lte(cutoff))
        .order_by_asc(orders::Column::DeliveryDate)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(order, gig)| gig.map(|gig| (order, gig)))
        .collect())
}

/// Completed and paid orders of `seller_id` whose payout has not been sent,
/// oldest first.
pub async fn find_unsent_payouts_by_seller<C: ConnectionTrait>(
    db: &C,
    seller_id: Uuid,
) -> Result<Vec<orders::Model>, DbErr> {
    orders::Entity::find()
        .inner_join(gigs::Entity)
        .filter(gigs::Column::SellerId.eq(seller_id))
        .filter(orders::Column::StatusId.eq(OrderState::Completed.id()))
        .filter(orders::Column::IsPaid.eq(true))
        .filter(orders::Column::PayoutSent.eq(false))
        .order_by_asc(orders::Column::UpdatedAt)
        .order_by_asc(orders::Column::Id)
        .all(db)
        .await
}

/// Completed orders of `seller_id` whose payout has been sent.
pub async fn find_sent_payouts_by_seller<C: ConnectionTrait>(
    db: &C,
    seller_id: Uuid,
) -> Result<Vec<orders::Model>, DbErr> {
    orders::Entity::find()
        .inner_join(gigs::Entity)
        .filter(gigs::Column::SellerId.eq(seller_id))
        .filter(orders::Column::StatusId.eq(OrderState::Completed.id()))
        .filter(orders::Column::PayoutSent.eq(true))
        .all(db)
        .await
}

/// Paid, still-active orders of `seller_id` in any of `states`, with their gig.
pub async fn find_paid_by_seller_in_states<C: ConnectionTrait>(
    db: &C,
    seller_id: Uuid,
    states: &[OrderState],
) -> Result<Vec<(orders::Model, gigs::Model)>, DbErr> {
    let status_ids: Vec<i32> = states.iter().map(|s| s.id()).collect();

    let rows = orders::Entity::find()
        .find_also_related(gigs::Entity)
        .filter(gigs::Column::SellerId.eq(seller_id))
        .filter(orders::Column::StatusId.is_in(status_ids))
        .filter(orders::Column::IsPaid.eq(true))
        .filter(orders::Column::IsActive.eq(true))
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(order, gig)| gig.map(|gig| (order, gig)))
        .collect())
}
