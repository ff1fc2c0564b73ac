mod common;

use rust_decimal_macros::dec;

use common::*;
use gigmarket_backend::db::payments as payment_db;
use gigmarket_backend::error::AppError;
use gigmarket_backend::gateway::{WebhookData, WebhookPayload};
use gigmarket_backend::models::payment_transactions::{TransactionStatus, TransactionType};
use gigmarket_backend::services::payments::{self as payment_service, WebhookOutcome};

fn webhook(reference: &str, status: &str) -> WebhookPayload {
    WebhookPayload {
        data: WebhookData {
            reference: reference.to_string(),
            status: status.to_string(),
        },
    }
}

#[tokio::test]
async fn initiate_records_pending_transaction_and_reference() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.50)).await;
    let order = place_order(&db, &bus, &m).await;
    let gateway = FakeGateway::default();

    let initiated = payment_service::initiate_payment(&db, &gateway, &m.buyer, order.id)
        .await
        .unwrap();

    {
        let calls = gateway.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].amount_minor, 10050);
        assert_eq!(calls[0].email, m.buyer.email);
    }

    let tx = payment_db::get_transaction_by_reference(&db, &initiated.transaction_id)
        .await
        .unwrap()
        .expect("transaction recorded");
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(tx.transaction_type, TransactionType::Payment);
    assert_eq!(tx.order_id, order.id);
    assert_eq!(cents(tx.amount), dec!(100.50));

    let stored = reload(&db, order.id).await;
    assert_eq!(
        stored.external_transaction_id.as_deref(),
        Some(initiated.transaction_id.as_str())
    );
    assert!(!stored.is_paid);
}

#[tokio::test]
async fn gateway_rejection_is_passed_through_without_writes() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    let order = place_order(&db, &bus, &m).await;
    let gateway = FakeGateway::rejecting(401, r#"{"status":false,"message":"Invalid key"}"#);

    let err = payment_service::initiate_payment(&db, &gateway, &m.buyer, order.id)
        .await
        .unwrap_err();

    match err {
        AppError::Gateway { status, body } => {
            assert_eq!(status, 401);
            assert!(body.contains("Invalid key"));
        }
        other => panic!("expected gateway error, got {other:?}"),
    }
    assert_eq!(gateway.call_count(), 1);
    assert!(reload(&db, order.id).await.external_transaction_id.is_none());
    assert!(
        payment_db::get_transactions_by_order(&db, order.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn paid_order_cannot_be_initiated_again() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    let order = paid_order(&db, &bus, &m).await;
    let gateway = FakeGateway::default();

    let err = payment_service::initiate_payment(&db, &gateway, &m.buyer, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn only_the_buyer_can_pay() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    let order = place_order(&db, &bus, &m).await;
    let gateway = FakeGateway::default();

    let err = payment_service::initiate_payment(&db, &gateway, &m.seller, order.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));
    assert_eq!(gateway.call_count(), 0);
}

#[tokio::test]
async fn success_webhook_marks_order_paid_once() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    let order = place_order(&db, &bus, &m).await;
    let gateway = FakeGateway::default();
    let initiated = payment_service::initiate_payment(&db, &gateway, &m.buyer, order.id)
        .await
        .unwrap();

    let first = payment_service::handle_webhook(
        &db,
        bus.broker(),
        webhook(&initiated.transaction_id, "success"),
    )
    .await
    .unwrap();
    assert_eq!(
        first,
        WebhookOutcome::Updated {
            status: TransactionStatus::Success,
            order_marked_paid: true,
        }
    );
    let after_first = reload(&db, order.id).await;
    assert!(after_first.is_paid);

    let replay = payment_service::handle_webhook(
        &db,
        bus.broker(),
        webhook(&initiated.transaction_id, "success"),
    )
    .await
    .unwrap();
    assert_eq!(replay, WebhookOutcome::Unchanged);

    let after_replay = reload(&db, order.id).await;
    assert_eq!(after_replay.version, after_first.version);
    assert_eq!(after_replay.is_paid, after_first.is_paid);
}

#[tokio::test]
async fn success_is_never_downgraded() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    let order = place_order(&db, &bus, &m).await;
    let gateway = FakeGateway::default();
    let initiated = payment_service::initiate_payment(&db, &gateway, &m.buyer, order.id)
        .await
        .unwrap();

    payment_service::handle_webhook(&db, bus.broker(), webhook(&initiated.transaction_id, "success"))
        .await
        .unwrap();
    let late = payment_service::handle_webhook(
        &db,
        bus.broker(),
        webhook(&initiated.transaction_id, "failed"),
    )
    .await
    .unwrap();
    assert_eq!(late, WebhookOutcome::Ignored);

    let tx = payment_db::get_transaction_by_reference(&db, &initiated.transaction_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(tx.status, TransactionStatus::Success);
    assert!(reload(&db, order.id).await.is_paid);
}

#[tokio::test]
async fn failed_webhook_records_status_without_paying() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    let order = place_order(&db, &bus, &m).await;
    let gateway = FakeGateway::default();
    let initiated = payment_service::initiate_payment(&db, &gateway, &m.buyer, order.id)
        .await
        .unwrap();

    let outcome = payment_service::handle_webhook(
        &db,
        bus.broker(),
        webhook(&initiated.transaction_id, "abandoned"),
    )
    .await
    .unwrap();
    assert_eq!(
        outcome,
        WebhookOutcome::Updated {
            status: TransactionStatus::Failed,
            order_marked_paid: false,
        }
    );
    assert!(!reload(&db, order.id).await.is_paid);
}

#[tokio::test]
async fn unknown_reference_is_silently_ignored() {
    let db = setup_db().await;
    let bus = bus();

    let outcome = payment_service::handle_webhook(&db, bus.broker(), webhook("ref_nobody", "success"))
        .await
        .unwrap();
    assert_eq!(outcome, WebhookOutcome::Ignored);
}
