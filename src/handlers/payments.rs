use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::bus::Bus;
use crate::error::AppResult;
use crate::gateway::{PaymentGateway, WebhookPayload};
use crate::models::orders::OrderResponse;
use crate::models::withdrawal_requests::CreateWithdrawal;
use crate::services::payments as payment_service;
use crate::services::payouts as payout_service;

/// Shared gateway handle in app data.
pub type Gateway = Arc<dyn PaymentGateway>;

/// POST /api/payments/orders/{id}/initiate — open a checkout session.
pub async fn initiate_payment(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    gateway: web::Data<Gateway>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let initiated = payment_service::initiate_payment(
        db.get_ref(),
        gateway.get_ref().as_ref(),
        &user.0,
        path.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(initiated))
}

/// POST /api/payments/webhook — gateway callback, unauthenticated.
///
/// Always answers 200 for well-formed payloads so the gateway stops
/// retrying; unknown references are dropped inside the service.
pub async fn webhook(
    db: web::Data<DatabaseConnection>,
    bus: web::Data<Bus>,
    body: web::Json<WebhookPayload>,
) -> AppResult<HttpResponse> {
    payment_service::handle_webhook(db.get_ref(), bus.get_ref().as_ref(), body.into_inner())
        .await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "detail": "Webhook processed." })))
}

/// GET /api/payments/earnings
pub async fn get_earnings(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    let balances = payout_service::balances(db.get_ref(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(balances))
}

/// GET /api/payments/withdrawals — the caller's own requests.
pub async fn get_withdrawals(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    let requests = payout_service::list_withdrawals(db.get_ref(), user.0.id).await?;
    Ok(HttpResponse::Ok().json(requests))
}

/// POST /api/payments/withdrawals
pub async fn request_withdrawal(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    bus: web::Data<Bus>,
    body: web::Json<CreateWithdrawal>,
) -> AppResult<HttpResponse> {
    let request = payout_service::request_withdrawal(
        db.get_ref(),
        bus.get_ref().as_ref(),
        &user.0,
        body.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Created().json(request))
}

/// POST /api/payments/withdrawals/{id}/approve — admin only.
pub async fn approve_withdrawal(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    bus: web::Data<Bus>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let request = payout_service::approve_withdrawal(
        db.get_ref(),
        bus.get_ref().as_ref(),
        &user.0,
        path.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(request))
}

/// POST /api/payments/orders/{id}/payout — admin only.
pub async fn approve_payout(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    bus: web::Data<Bus>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let order = payout_service::approve_payout(
        db.get_ref(),
        bus.get_ref().as_ref(),
        &user.0,
        path.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
