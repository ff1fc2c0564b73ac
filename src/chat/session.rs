use actix_web::{HttpRequest, HttpResponse, web};
use actix_ws::Message;
use futures_util::StreamExt;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use crate::auth::middleware::authenticate;
use crate::bus::{Bus, Subscription, Topic};
use crate::chat::protocol::{ClientMessage, ServerMessage};
use crate::error::AppError;
use crate::models::users;
use crate::services::chat as chat_service;

/// Query params for the WebSocket handshake endpoints. Browsers cannot set
/// an Authorization header on the upgrade request.
#[derive(Debug, serde::Deserialize)]
pub struct WsQuery {
    pub token: String,
}

/// GET /api/chat/ws/{room_id}?token=<jwt>
///
/// Joins the room channel. Connecting marks the other participant's messages
/// as read; client frames `{"message": "..."}` are sent through the same
/// pipeline as the REST endpoint.
pub async fn room_ws(
    req: HttpRequest,
    stream: web::Payload,
    path: web::Path<Uuid>,
    query: web::Query<WsQuery>,
    db: web::Data<DatabaseConnection>,
    bus: web::Data<Bus>,
) -> Result<HttpResponse, actix_web::Error> {
    let room_id = path.into_inner();
    let user = authenticate(&req, &query.token).await?;

    let subscription =
        chat_service::enter_room(db.get_ref(), bus.get_ref().as_ref(), user.id, room_id).await?;

    let (response, session, msg_stream) = match actix_ws::handle(&req, stream) {
        Ok(handshake) => handshake,
        Err(e) => {
            bus.unsubscribe(subscription.id).await;
            return Err(e);
        }
    };

    actix_web::rt::spawn(run_session(
        session,
        msg_stream,
        subscription,
        Some(RoomContext {
            room_id,
            user,
            db: db.get_ref().clone(),
        }),
        bus.get_ref().clone(),
    ));

    Ok(response)
}

/// GET /api/notifications/ws?token=<jwt>
///
/// Per-user channel: notifications and room-list updates. Inbound text is
/// ignored.
pub async fn user_ws(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<WsQuery>,
    bus: web::Data<Bus>,
) -> Result<HttpResponse, actix_web::Error> {
    let user = authenticate(&req, &query.token).await?;

    let (response, session, msg_stream) = actix_ws::handle(&req, stream)?;
    let subscription = bus
        .subscribe(vec![Topic::User(user.id), Topic::RoomUpdates(user.id)])
        .await;

    actix_web::rt::spawn(run_session(
        session,
        msg_stream,
        subscription,
        None,
        bus.get_ref().clone(),
    ));

    Ok(response)
}

/// What a room socket needs to turn inbound frames into messages.
struct RoomContext {
    room_id: Uuid,
    user: users::Model,
    db: DatabaseConnection,
}

/// Drives one socket: forwards bus frames out, handles inbound frames, and
/// drops the subscription on disconnect.
async fn run_session(
    mut session: actix_ws::Session,
    mut msg_stream: actix_ws::MessageStream,
    mut subscription: Subscription,
    room: Option<RoomContext>,
    bus: Bus,
) {
    loop {
        tokio::select! {
            Some(msg) = msg_stream.next() => {
                match msg {
                    Ok(Message::Text(text)) => {
                        if let Some(room) = &room {
                            handle_client_message(&text, &mut session, room, &bus).await;
                        }
                    }
                    Ok(Message::Ping(bytes)) => {
                        if session.pong(&bytes).await.is_err() {
                            break;
                        }
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    _ => {}
                }
            }
            Some(frame) = subscription.receiver.recv() => {
                if session.text(frame.to_json()).await.is_err() {
                    break;
                }
            }
            else => break,
        }
    }

    bus.unsubscribe(subscription.id).await;
    let _ = session.close(None).await;
}

async fn handle_client_message(
    text: &str,
    session: &mut actix_ws::Session,
    room: &RoomContext,
    bus: &Bus,
) {
    let frame: ClientMessage = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            let err = ServerMessage::error(format!("Invalid message format: {e}"));
            let _ = session.text(err.to_json()).await;
            return;
        }
    };

    // The broadcast on the room topic echoes the stored message back to this
    // socket too, so only failures are answered directly.
    if let Err(e) =
        chat_service::send_message(&room.db, bus.as_ref(), &room.user, room.room_id, &frame.message)
            .await
    {
        let message = match e {
            AppError::Database(_) | AppError::Internal(_) => {
                tracing::error!("Failed to send message in room {}: {e}", room.room_id);
                "Failed to save message".to_string()
            }
            other => other.to_string(),
        };
        let _ = session.text(ServerMessage::error(message).to_json()).await;
    }
}
