use actix_web::{HttpResponse, web};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::db::gigs as gig_db;
use crate::error::{AppError, AppResult};
use crate::models::gigs::CreateGig;

/// GET /api/gigs/{id} — a single gig.
pub async fn get_gig(
    _user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let gig = gig_db::get_gig_by_id(db.get_ref(), id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Gig {id} not found")))?;
    Ok(HttpResponse::Ok().json(gig))
}

/// POST /api/gigs — list a new gig owned by the caller.
pub async fn create_gig(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    body: web::Json<CreateGig>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    if input.title.trim().is_empty() {
        return Err(AppError::Validation("Title is required".to_string()));
    }
    if input.price < Decimal::ZERO {
        return Err(AppError::Validation("Price cannot be negative".to_string()));
    }
    if input.delivery_time_days < 1 {
        return Err(AppError::Validation(
            "Delivery time must be at least one day".to_string(),
        ));
    }

    let gig = gig_db::insert_gig(db.get_ref(), input, user.0.id).await?;
    Ok(HttpResponse::Created().json(gig))
}
