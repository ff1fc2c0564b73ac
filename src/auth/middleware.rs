use actix_web::FromRequest;
use actix_web::{Error, HttpRequest, dev::Payload, web};
use sea_orm::DatabaseConnection;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::auth::jwks::JwksCache;
use crate::auth::jwt;
use crate::db::users::find_or_create_from_auth;
use crate::error::AppError;
use crate::models::users::{self, CreateUserFromAuth, Roles};

/// The caller, resolved from the `Authorization: Bearer <jwt>` header. First
/// contact creates the local user row as a buyer.
pub struct AuthenticatedUser(pub users::Model);

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self, Self::Error>>>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let req = req.clone();

        Box::pin(async move {
            let token = req
                .headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?
                .strip_prefix("Bearer ")
                .ok_or_else(|| {
                    AppError::Unauthorized("Authorization header must be: Bearer <token>".into())
                })?
                .to_string();

            let user = authenticate(&req, &token).await?;
            Ok(AuthenticatedUser(user))
        })
    }
}

/// Verify `token` and load (or create) the user it belongs to. Shared by the
/// header extractor and the WebSocket handshakes, which carry the token in
/// the query string.
pub async fn authenticate(req: &HttpRequest, token: &str) -> Result<users::Model, AppError> {
    let jwks_cache = req
        .app_data::<web::Data<Arc<JwksCache>>>()
        .ok_or_else(|| AppError::Internal("JWKS cache not configured".into()))?;

    let claims = jwt::validate_token(token, jwks_cache.get_ref())
        .await
        .map_err(|e| AppError::Unauthorized(format!("Invalid token: {e}")))?;

    let user_id = claims.user_id().map_err(AppError::Unauthorized)?;
    let email = claims
        .user_email()
        .ok_or_else(|| AppError::Unauthorized("No email in token claims".into()))?;

    let db = req
        .app_data::<web::Data<DatabaseConnection>>()
        .ok_or_else(|| AppError::Internal("Database not configured".into()))?;

    let user = find_or_create_from_auth(
        db.get_ref(),
        CreateUserFromAuth {
            id: user_id,
            email,
            display_name: claims.display_name(),
            avatar_url: claims.avatar_url(),
            auth_provider: "google".to_string(),
            role: Roles::Buyer,
        },
    )
    .await?;

    Ok(user)
}
