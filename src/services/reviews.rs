use sea_orm::ConnectionTrait;
use uuid::Uuid;

use crate::auth::authorization::{Party, load_order_for};
use crate::db::reviews as review_db;
use crate::error::{AppError, AppResult};
use crate::models::order_statuses::OrderState;
use crate::models::reviews::{self, CreateReview};
use crate::models::users;

const ALREADY_REVIEWED: &str = "This order has already been reviewed";

/// The buyer reviews a completed order, once.
pub async fn create_review<C: ConnectionTrait>(
    db: &C,
    user: &users::Model,
    order_id: Uuid,
    input: CreateReview,
) -> AppResult<reviews::Model> {
    if !(1..=5).contains(&input.rating) {
        return Err(AppError::Validation(
            "Rating must be between 1 and 5".to_string(),
        ));
    }

    let (order, gig, party) = load_order_for(db, order_id, user).await?;
    if party != Party::Buyer {
        return Err(AppError::Forbidden(
            "Only the buyer can review this order".to_string(),
        ));
    }
    if !order.is_in(OrderState::Completed) {
        return Err(AppError::Conflict(
            "Only completed orders can be reviewed".to_string(),
        ));
    }
    if review_db::review_exists_for_order(db, order.id).await? {
        return Err(AppError::Conflict(ALREADY_REVIEWED.to_string()));
    }

    // A concurrent request can pass the check above; the unique index decides.
    let review = review_db::insert_review(db, &order, gig.seller_id, input)
        .await
        .map_err(|e| AppError::conflict_on_duplicate(e, ALREADY_REVIEWED))?;
    tracing::info!("Review {} left on order {}", review.id, order.id);
    Ok(review)
}

pub async fn list_reviews_for_gig<C: ConnectionTrait>(
    db: &C,
    gig_id: Uuid,
) -> AppResult<Vec<reviews::Model>> {
    Ok(review_db::get_reviews_by_gig(db, gig_id).await?)
}
