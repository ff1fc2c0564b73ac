mod common;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use common::*;
use gigmarket_backend::db::notifications as notification_db;
use gigmarket_backend::db::payments as payment_db;
use gigmarket_backend::error::AppError;
use gigmarket_backend::models::order_statuses::OrderState;
use gigmarket_backend::models::payment_transactions::TransactionType;
use gigmarket_backend::models::withdrawal_requests::CreateWithdrawal;
use gigmarket_backend::services::payouts;

fn withdrawal(amount: Decimal) -> CreateWithdrawal {
    CreateWithdrawal {
        amount: Some(amount),
        first_name: "Dana".to_string(),
        last_name: "Levi".to_string(),
        iban: "PS92PALS000000000400123456702".to_string(),
    }
}

#[tokio::test]
async fn balances_split_held_and_available() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;

    completed_order(&db, &bus, &m).await;
    paid_order(&db, &bus, &m).await;
    place_order(&db, &bus, &m).await; // unpaid: neither held nor available

    let balances = payouts::balances(&db, m.seller.id).await.unwrap();
    assert_eq!(balances.available, dec!(90.19));
    assert_eq!(balances.held, dec!(100.00));
    assert_eq!(balances.total_paid_out, Decimal::ZERO);
    assert_eq!(balances.pending_withdrawals, Decimal::ZERO);
}

#[tokio::test]
async fn withdrawal_above_available_is_rejected() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    completed_order(&db, &bus, &m).await;

    let err = payouts::request_withdrawal(&db, bus.broker(), &m.seller, withdrawal(dec!(90.20)))
        .await
        .unwrap_err();
    match err {
        AppError::InsufficientBalance {
            requested,
            available,
        } => {
            assert_eq!(requested, dec!(90.20));
            assert_eq!(available, dec!(90.19));
        }
        other => panic!("expected insufficient balance, got {other:?}"),
    }
    assert!(
        payment_db::get_withdrawals_by_seller(&db, m.seller.id)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn withdrawals_never_exceed_earnings() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    completed_order(&db, &bus, &m).await;

    let requests = [dec!(40.00), dec!(40.00), dec!(40.00), dec!(10.19), dec!(0.01)];
    let mut accepted = Decimal::ZERO;
    for amount in requests {
        match payouts::request_withdrawal(&db, bus.broker(), &m.seller, withdrawal(amount)).await {
            Ok(_) => accepted += amount,
            Err(AppError::InsufficientBalance { .. }) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }

    assert_eq!(accepted, dec!(90.19));
    let balances = payouts::balances(&db, m.seller.id).await.unwrap();
    assert_eq!(balances.available, Decimal::ZERO);
    assert_eq!(balances.pending_withdrawals, dec!(90.19));
}

#[tokio::test]
async fn withdrawal_request_notifies_admins() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    completed_order(&db, &bus, &m).await;

    let request = payouts::request_withdrawal(&db, bus.broker(), &m.seller, withdrawal(dec!(50.00)))
        .await
        .unwrap();
    assert!(!request.is_processed);

    let admin_feed = notification_db::get_notifications_for_user(&db, m.admin.id, false, 1, 10)
        .await
        .unwrap();
    assert_eq!(admin_feed.len(), 1);
    assert_eq!(admin_feed[0].title, "New Withdrawal Request");
}

#[tokio::test]
async fn missing_amount_is_a_validation_error() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;

    let mut input = withdrawal(dec!(1.00));
    input.amount = None;
    let err = payouts::request_withdrawal(&db, bus.broker(), &m.seller, input)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn approving_withdrawal_settles_whole_payouts() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    let first = completed_order(&db, &bus, &m).await;
    let second = completed_order(&db, &bus, &m).await;

    let request = payouts::request_withdrawal(&db, bus.broker(), &m.seller, withdrawal(dec!(100.00)))
        .await
        .unwrap();

    let err = payouts::approve_withdrawal(&db, bus.broker(), &m.seller, request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let processed = payouts::approve_withdrawal(&db, bus.broker(), &m.admin, request.id)
        .await
        .unwrap();
    assert!(processed.is_processed);
    assert!(processed.processed_at.is_some());
    assert_eq!(cents(processed.settled_amount), dec!(90.19));

    let sent = [
        reload(&db, first.id).await.payout_sent,
        reload(&db, second.id).await.payout_sent,
    ];
    assert_eq!(sent.iter().filter(|s| **s).count(), 1);

    // 180.38 earned, 100 withdrawn.
    let balances = payouts::balances(&db, m.seller.id).await.unwrap();
    assert_eq!(balances.available, dec!(80.38));
    assert_eq!(balances.total_paid_out, dec!(90.19));
    assert_eq!(balances.pending_withdrawals, Decimal::ZERO);

    let err = payouts::approve_withdrawal(&db, bus.broker(), &m.admin, request.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn approve_payout_requires_admin_and_completion() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    let delivered = delivered_order(&db, &bus, &m, 0).await;

    let err = payouts::approve_payout(&db, bus.broker(), &m.admin, delivered.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));

    let completed = completed_order(&db, &bus, &m).await;
    let err = payouts::approve_payout(&db, bus.broker(), &m.seller, completed.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden(_)));

    let paid_out = payouts::approve_payout(&db, bus.broker(), &m.admin, completed.id)
        .await
        .unwrap();
    assert!(paid_out.payout_sent);

    let txs = payment_db::get_transactions_by_order(&db, completed.id).await.unwrap();
    assert_eq!(txs.len(), 1);
    assert_eq!(txs[0].transaction_type, TransactionType::Payout);
    assert_eq!(txs[0].reference, format!("payout_{}", completed.id));
    assert_eq!(cents(txs[0].amount), dec!(90.19));

    let err = payouts::approve_payout(&db, bus.broker(), &m.admin, completed.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Conflict(_)));
}

#[tokio::test]
async fn sweep_completes_stale_delivery_exactly_once() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    let stale = delivered_order(&db, &bus, &m, 6).await;
    let fresh = delivered_order(&db, &bus, &m, 1).await;
    let grace = Duration::days(5);

    let report = payouts::sweep_overdue_deliveries(&db, bus.broker(), grace, Utc::now())
        .await
        .unwrap();
    assert_eq!(report.completed, vec![stale.id]);
    assert_eq!(report.failed, 0);

    let swept = reload(&db, stale.id).await;
    assert_eq!(swept.state(), Some(OrderState::Completed));
    assert_eq!(swept.seller_payout.map(cents), Some(dec!(90.19)));
    assert!(!swept.payout_sent);
    assert_eq!(reload(&db, fresh.id).await.state(), Some(OrderState::Delivered));

    let again = payouts::sweep_overdue_deliveries(&db, bus.broker(), grace, Utc::now())
        .await
        .unwrap();
    assert!(again.completed.is_empty());
    assert_eq!(reload(&db, stale.id).await.version, swept.version);
}

#[tokio::test]
async fn sweep_skips_unpaid_deliveries() {
    let db = setup_db().await;
    let bus = bus();
    let m = market(&db, dec!(100.00)).await;
    let order = place_order(&db, &bus, &m).await;
    let order = force(
        &db,
        &order,
        gigmarket_backend::db::orders::OrderChanges {
            status: Some(OrderState::Delivered),
            delivery_date: Some(Utc::now() - Duration::days(10)),
            ..Default::default()
        },
    )
    .await;

    let report = payouts::sweep_overdue_deliveries(&db, bus.broker(), Duration::days(5), Utc::now())
        .await
        .unwrap();
    assert!(report.completed.is_empty());
    assert_eq!(reload(&db, order.id).await.state(), Some(OrderState::Delivered));
}
