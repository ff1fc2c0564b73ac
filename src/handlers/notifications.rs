use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::error::AppResult;
use crate::models::notifications::NotificationQuery;
use crate::services::notifications as notification_service;

/// GET /api/notifications?unread=true&page=1&limit=20
pub async fn get_notifications(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    query: web::Query<NotificationQuery>,
) -> AppResult<HttpResponse> {
    let page = query.page.unwrap_or(1).max(1);
    let limit = query.limit.unwrap_or(20).clamp(1, 100);

    let rows = notification_service::list_notifications(
        db.get_ref(),
        user.0.id,
        query.unread.unwrap_or(false),
        page,
        limit,
    )
    .await?;
    Ok(HttpResponse::Ok().json(rows))
}

/// POST /api/notifications/{id}/read
pub async fn mark_read(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let notification =
        notification_service::mark_read(db.get_ref(), user.0.id, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(notification))
}

/// POST /api/notifications/read-all
pub async fn mark_all_read(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    let updated = notification_service::mark_all_read(db.get_ref(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "updated": updated })))
}
