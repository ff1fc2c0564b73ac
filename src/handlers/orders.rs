use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::bus::Bus;
use crate::error::AppResult;
use crate::models::orders::{CreateOrder, OrderResponse, UpdateOrder};
use crate::services::orders::{self as order_service, OrderSide};

fn order_list(rows: Vec<crate::models::orders::Model>) -> Vec<OrderResponse> {
    rows.into_iter().map(OrderResponse::from).collect()
}

/// GET /api/orders — active orders where the caller is buyer or seller.
pub async fn get_orders(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    let rows = order_service::list_orders(db.get_ref(), &user.0, OrderSide::Any).await?;
    Ok(HttpResponse::Ok().json(order_list(rows)))
}

/// GET /api/orders/buyer
pub async fn get_buyer_orders(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    let rows = order_service::list_orders(db.get_ref(), &user.0, OrderSide::Buyer).await?;
    Ok(HttpResponse::Ok().json(order_list(rows)))
}

/// GET /api/orders/seller
pub async fn get_seller_orders(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    let rows = order_service::list_orders(db.get_ref(), &user.0, OrderSide::Seller).await?;
    Ok(HttpResponse::Ok().json(order_list(rows)))
}

/// GET /api/orders/statuses — the static status table.
pub async fn get_statuses(db: web::Data<DatabaseConnection>) -> AppResult<HttpResponse> {
    let statuses = order_service::list_statuses(db.get_ref()).await?;
    Ok(HttpResponse::Ok().json(statuses))
}

/// GET /api/orders/{id}
pub async fn get_order(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let order = order_service::get_order(db.get_ref(), &user.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /api/orders
pub async fn create_order(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    bus: web::Data<Bus>,
    body: web::Json<CreateOrder>,
) -> AppResult<HttpResponse> {
    let order =
        order_service::create_order(db.get_ref(), bus.get_ref().as_ref(), &user.0, body.into_inner())
            .await?;
    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}

/// PATCH /api/orders/{id}
pub async fn update_order(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    bus: web::Data<Bus>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateOrder>,
) -> AppResult<HttpResponse> {
    let order = order_service::update_order(
        db.get_ref(),
        bus.get_ref().as_ref(),
        &user.0,
        path.into_inner(),
        body.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /api/orders/{id}/complete — buyer accepts the delivery.
pub async fn complete_order(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    bus: web::Data<Bus>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let completion = order_service::complete_order(
        db.get_ref(),
        bus.get_ref().as_ref(),
        &user.0,
        path.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(completion))
}

/// DELETE /api/orders/{id} — soft-delete (cancel).
pub async fn cancel_order(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    bus: web::Data<Bus>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let order = order_service::cancel_order(
        db.get_ref(),
        bus.get_ref().as_ref(),
        &user.0,
        path.into_inner(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
