use sea_orm::*;
use uuid::Uuid;

use crate::models::orders;
use crate::models::reviews::{self, CreateReview};

/// Insert a review for a completed order.
pub async fn insert_review<C: ConnectionTrait>(
    db: &C,
    order: &orders::Model,
    seller_id: Uuid,
    input: CreateReview,
) -> Result<reviews::Model, DbErr> {
    let review = reviews::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        gig_id: Set(order.gig_id),
        reviewer_id: Set(order.buyer_id),
        seller_id: Set(seller_id),
        rating: Set(input.rating),
        comment: Set(input.comment),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
    };

    review.insert(db).await
}

pub async fn review_exists_for_order<C: ConnectionTrait>(
    db: &C,
    order_id: Uuid,
) -> Result<bool, DbErr> {
    let count = reviews::Entity::find()
        .filter(reviews::Column::OrderId.eq(order_id))
        .count(db)
        .await?;

    Ok(count > 0)
}

/// Active reviews on a gig, newest first.
pub async fn get_reviews_by_gig<C: ConnectionTrait>(
    db: &C,
    gig_id: Uuid,
) -> Result<Vec<reviews::Model>, DbErr> {
    reviews::Entity::find()
        .filter(reviews::Column::GigId.eq(gig_id))
        .filter(reviews::Column::IsActive.eq(true))
        .order_by_desc(reviews::Column::CreatedAt)
        .all(db)
        .await
}
