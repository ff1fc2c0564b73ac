use actix_web::{HttpResponse, web};
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::middleware::AuthenticatedUser;
use crate::bus::Bus;
use crate::error::AppResult;
use crate::models::messages::{MessageResponse, SendMessage};
use crate::models::rooms::OpenRoom;
use crate::services::chat as chat_service;

/// POST /api/chat/rooms — get or create the room with another user.
pub async fn open_room(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    body: web::Json<OpenRoom>,
) -> AppResult<HttpResponse> {
    let room = chat_service::open_room(db.get_ref(), &user.0, body.user_id).await?;
    Ok(HttpResponse::Ok().json(room))
}

/// GET /api/chat/rooms — the caller's rooms, most recent activity first.
pub async fn get_rooms(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
) -> AppResult<HttpResponse> {
    let rooms = chat_service::list_rooms(db.get_ref(), &user.0).await?;
    Ok(HttpResponse::Ok().json(rooms))
}

/// GET /api/chat/rooms/{id}/messages — history, oldest first.
pub async fn get_messages(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    path: web::Path<Uuid>,
) -> AppResult<HttpResponse> {
    let history = chat_service::room_history(db.get_ref(), &user.0, path.into_inner()).await?;
    let body: Vec<MessageResponse> = history.into_iter().map(MessageResponse::from).collect();
    Ok(HttpResponse::Ok().json(body))
}

/// POST /api/chat/rooms/{id}/messages — send over REST.
pub async fn send_message(
    user: AuthenticatedUser,
    db: web::Data<DatabaseConnection>,
    bus: web::Data<Bus>,
    path: web::Path<Uuid>,
    body: web::Json<SendMessage>,
) -> AppResult<HttpResponse> {
    let saved = chat_service::send_message(
        db.get_ref(),
        bus.get_ref().as_ref(),
        &user.0,
        path.into_inner(),
        &body.message,
    )
    .await?;
    Ok(HttpResponse::Created().json(MessageResponse::from(saved)))
}
