use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;

use crate::auth::middleware::AuthenticatedUser;
use crate::db::users;
use crate::error::{AppError, AppResult};
use crate::models::users::{CompleteProfile, Roles, UserResponse};

/// GET /api/auth/me — the authenticated user's profile.
pub async fn me(user: AuthenticatedUser) -> HttpResponse {
    HttpResponse::Ok().json(UserResponse::from(user.0))
}

/// POST /api/auth/complete-profile — set username, role and display name
/// after first login. The admin role cannot be self-assigned.
pub async fn complete_profile(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    body: web::Json<CompleteProfile>,
) -> AppResult<HttpResponse> {
    let input = body.into_inner();
    if input.role == Some(Roles::Admin) && !user.0.is_admin() {
        return Err(AppError::Forbidden(
            "The admin role cannot be self-assigned".to_string(),
        ));
    }

    let updated = users::complete_profile(db.get_ref(), user.0.id, input).await?;
    Ok(HttpResponse::Ok().json(UserResponse::from(updated)))
}
