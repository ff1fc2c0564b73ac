use sea_orm::*;
use uuid::Uuid;

use crate::models::gigs::{self, CreateGig};

/// Insert a new gig owned by `seller_id`.
pub async fn insert_gig<C: ConnectionTrait>(
    db: &C,
    input: CreateGig,
    seller_id: Uuid,
) -> Result<gigs::Model, DbErr> {
    let new_gig = gigs::ActiveModel {
        id: Set(Uuid::new_v4()),
        seller_id: Set(seller_id),
        title: Set(input.title),
        description: Set(input.description),
        price: Set(input.price),
        delivery_time_days: Set(input.delivery_time_days),
        thumbnail_url: Set(input.thumbnail_url),
        is_active: Set(true),
        created_at: Set(chrono::Utc::now()),
    };

    new_gig.insert(db).await
}

/// Fetch a single gig by ID.
pub async fn get_gig_by_id<C: ConnectionTrait>(
    db: &C,
    id: Uuid,
) -> Result<Option<gigs::Model>, DbErr> {
    gigs::Entity::find_by_id(id).one(db).await
}
