mod common;

use rust_decimal_macros::dec;

use common::*;
use gigmarket_backend::bus::{Broker, Topic};
use gigmarket_backend::chat::protocol::ServerMessage;
use gigmarket_backend::db::notifications as notification_db;
use gigmarket_backend::error::AppError;
use gigmarket_backend::models::notifications::NotificationType;
use gigmarket_backend::services::chat;

#[tokio::test]
async fn room_is_shared_by_both_participants() {
    let db = setup_db().await;
    let m = market(&db, dec!(10.00)).await;

    let from_buyer = chat::open_room(&db, &m.buyer, m.seller.id).await.unwrap();
    let from_seller = chat::open_room(&db, &m.seller, m.buyer.id).await.unwrap();
    assert_eq!(from_buyer.id, from_seller.id);
    assert!(from_buyer.user1_id < from_buyer.user2_id);
}

#[tokio::test]
async fn cannot_chat_with_yourself() {
    let db = setup_db().await;
    let m = market(&db, dec!(10.00)).await;

    let err = chat::open_room(&db, &m.buyer, m.buyer.id).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let err = chat::open_room(&db, &m.buyer, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));
}

#[tokio::test]
async fn message_is_stored_then_fanned_out() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(10.00)).await;
    let room = chat::open_room(&db, &m.buyer, m.seller.id).await.unwrap();

    let mut in_room = bus.local.subscribe(vec![Topic::Room(room.id)]).await;
    let mut seller_feed = bus
        .local
        .subscribe(vec![Topic::User(m.seller.id), Topic::RoomUpdates(m.seller.id)])
        .await;

    let saved = chat::send_message(&db, bus.broker(), &m.buyer, room.id, "  hello there  ")
        .await
        .unwrap();
    assert_eq!(saved.content, "hello there");
    assert!(!saved.is_read);

    match in_room.receiver.try_recv().unwrap() {
        ServerMessage::ChatMessage {
            message,
            sender_id,
            message_id,
            room: room_id,
            ..
        } => {
            assert_eq!(message, "hello there");
            assert_eq!(sender_id, m.buyer.id);
            assert_eq!(message_id, saved.id);
            assert_eq!(room_id, room.id);
        }
        other => panic!("expected chat message, got {other:?}"),
    }

    let mut got_update = false;
    let mut got_notification = false;
    while let Ok(frame) = seller_feed.receiver.try_recv() {
        match frame {
            ServerMessage::RoomUpdate {
                room: room_id,
                last_message,
                ..
            } => {
                assert_eq!(room_id, room.id);
                assert_eq!(last_message, "hello there");
                got_update = true;
            }
            ServerMessage::Notification {
                notification_type, ..
            } => {
                assert_eq!(notification_type, NotificationType::Message);
                got_notification = true;
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }
    assert!(got_update && got_notification);

    let stored = notification_db::get_notifications_for_user(&db, m.seller.id, true, 1, 10)
        .await
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].target_url.as_deref(), Some(format!("/chat/{}", room.id).as_str()));
}

#[tokio::test]
async fn empty_and_oversized_messages_are_rejected() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(10.00)).await;
    let room = chat::open_room(&db, &m.buyer, m.seller.id).await.unwrap();

    let err = chat::send_message(&db, bus.broker(), &m.buyer, room.id, "   ")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    let long = "x".repeat(chat::MAX_MESSAGE_LEN + 1);
    let err = chat::send_message(&db, bus.broker(), &m.buyer, room.id, &long)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));

    assert!(chat::room_history(&db, &m.buyer, room.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn joining_marks_incoming_messages_read() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(10.00)).await;
    let room = chat::open_room(&db, &m.buyer, m.seller.id).await.unwrap();

    chat::send_message(&db, bus.broker(), &m.buyer, room.id, "first")
        .await
        .unwrap();
    chat::send_message(&db, bus.broker(), &m.seller, room.id, "reply")
        .await
        .unwrap();
    chat::send_message(&db, bus.broker(), &m.buyer, room.id, "second")
        .await
        .unwrap();

    let rooms = chat::list_rooms(&db, &m.seller).await.unwrap();
    assert_eq!(rooms.len(), 1);
    assert_eq!(rooms[0].unread_count, 2);
    assert_eq!(rooms[0].other_user_id, m.buyer.id);

    chat::join_room(&db, m.seller.id, room.id).await.unwrap();

    let rooms = chat::list_rooms(&db, &m.seller).await.unwrap();
    assert_eq!(rooms[0].unread_count, 0);

    // The seller's own reply stays unread until the buyer joins.
    let buyer_rooms = chat::list_rooms(&db, &m.buyer).await.unwrap();
    assert_eq!(buyer_rooms[0].unread_count, 1);

    let history = chat::room_history(&db, &m.buyer, room.id).await.unwrap();
    let contents: Vec<&str> = history.iter().map(|msg| msg.content.as_str()).collect();
    assert_eq!(contents.len(), 3);
    assert!(contents.contains(&"first") && contents.contains(&"reply"));
}

#[tokio::test]
async fn strangers_cannot_enter_a_room() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(10.00)).await;
    let room = chat::open_room(&db, &m.buyer, m.seller.id).await.unwrap();

    let err = chat::join_room(&db, m.stranger.id, room.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = chat::send_message(&db, bus.broker(), &m.stranger, room.id, "hi")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let err = chat::room_history(&db, &m.stranger, room.id).await.unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
}

#[tokio::test]
async fn entering_a_room_subscribes_before_marking_read() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(10.00)).await;
    let room = chat::open_room(&db, &m.buyer, m.seller.id).await.unwrap();

    chat::send_message(&db, bus.broker(), &m.buyer, room.id, "before")
        .await
        .unwrap();

    let mut subscription = chat::enter_room(&db, bus.broker(), m.seller.id, room.id)
        .await
        .unwrap();
    assert_eq!(bus.local.subscriber_count(Topic::Room(room.id)).await, 1);
    assert_eq!(chat::list_rooms(&db, &m.seller).await.unwrap()[0].unread_count, 0);

    let after = chat::send_message(&db, bus.broker(), &m.buyer, room.id, "after")
        .await
        .unwrap();
    match subscription.receiver.try_recv().unwrap() {
        ServerMessage::ChatMessage { message_id, .. } => assert_eq!(message_id, after.id),
        other => panic!("expected chat message, got {other:?}"),
    }
}

#[tokio::test]
async fn stranger_entering_a_room_leaves_no_subscription() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(10.00)).await;
    let room = chat::open_room(&db, &m.buyer, m.seller.id).await.unwrap();

    let err = chat::enter_room(&db, bus.broker(), m.stranger.id, room.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(bus.local.subscriber_count(Topic::Room(room.id)).await, 0);
}
