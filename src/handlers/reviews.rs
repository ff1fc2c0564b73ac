use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::reviews::CreateReview;
use crate::services::reviews as review_service;

/// POST /api/reviews/orders/{order_id}
pub async fn create_review(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
    body: web::Json<CreateReview>,
) -> AppResult<HttpResponse> {
    let review =
        review_service::create_review(db.get_ref(), &user.0, path.into_inner(), body.into_inner())
            .await?;
    Ok(HttpResponse::Created().json(review))
}

/// GET /api/reviews/gigs/{gig_id}
pub async fn get_gig_reviews(
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let reviews = review_service::list_reviews_for_gig(db.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(reviews))
}
