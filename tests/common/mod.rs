#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::{Database, DatabaseConnection};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use gigmarket_backend::bus::{Broker, Bus, LocalBroker};
use gigmarket_backend::db::gigs as gig_db;
use gigmarket_backend::db::orders::{self as order_db, OrderChanges};
use gigmarket_backend::db::users as user_db;
use gigmarket_backend::gateway::{CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway};
use gigmarket_backend::models::gigs::{self, CreateGig};
use gigmarket_backend::models::order_statuses::OrderState;
use gigmarket_backend::models::orders::{self, CreateOrder};
use gigmarket_backend::models::users::{self, CreateUserFromAuth, Roles};
use gigmarket_backend::services::orders as order_service;
use migration::{Migrator, MigratorTrait};

pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("connect to in-memory sqlite");
    Migrator::up(&db, None).await.expect("run migrations");
    db
}

pub struct TestBus {
    pub local: Arc<LocalBroker>,
    pub bus: Bus,
}

pub fn bus() -> TestBus {
    let local = Arc::new(LocalBroker::new());
    let bus: Bus = local.clone();
    TestBus { local, bus }
}

impl TestBus {
    pub fn broker(&self) -> &dyn Broker {
        self.bus.as_ref()
    }
}

pub async fn user(db: &DatabaseConnection, name: &str, role: Roles) -> users::Model {
    user_db::find_or_create_from_auth(
        db,
        CreateUserFromAuth {
            id: Uuid::new_v4(),
            email: format!("{name}-{}@example.com", Uuid::new_v4().simple()),
            display_name: Some(name.to_string()),
            avatar_url: None,
            auth_provider: "google".to_string(),
            role,
        },
    )
    .await
    .expect("create user")
}

pub async fn gig(db: &DatabaseConnection, seller: &users::Model, price: Decimal) -> gigs::Model {
    gig_db::insert_gig(
        db,
        CreateGig {
            title: "Logo design".to_string(),
            description: "A logo in three styles".to_string(),
            price,
            delivery_time_days: 3,
            thumbnail_url: None,
        },
        seller.id,
    )
    .await
    .expect("create gig")
}

/// Buyer, seller, admin and a gig priced `price`.
pub struct Market {
    pub buyer: users::Model,
    pub seller: users::Model,
    pub admin: users::Model,
    pub stranger: users::Model,
    pub gig: gigs::Model,
}

pub async fn market(db: &DatabaseConnection, price: Decimal) -> Market {
    let buyer = user(db, "buyer", Roles::Buyer).await;
    let seller = user(db, "seller", Roles::Seller).await;
    let admin = user(db, "admin", Roles::Admin).await;
    let stranger = user(db, "stranger", Roles::Buyer).await;
    let gig = gig(db, &seller, price).await;
    Market {
        buyer,
        seller,
        admin,
        stranger,
        gig,
    }
}

pub async fn place_order(db: &DatabaseConnection, bus: &TestBus, m: &Market) -> orders::Model {
    order_service::create_order(
        db,
        bus.broker(),
        &m.buyer,
        CreateOrder {
            gig_id: m.gig.id,
            requirements: "Blue and white, vector output".to_string(),
        },
    )
    .await
    .expect("create order")
}

/// Force columns directly, bypassing the state machine.
pub async fn force(
    db: &DatabaseConnection,
    order: &orders::Model,
    changes: OrderChanges,
) -> orders::Model {
    order_db::apply_changes(db, order, changes)
        .await
        .expect("update order")
        .expect("order not modified concurrently")
}

pub async fn paid_order(db: &DatabaseConnection, bus: &TestBus, m: &Market) -> orders::Model {
    let order = place_order(db, bus, m).await;
    force(
        db,
        &order,
        OrderChanges {
            is_paid: Some(true),
            ..Default::default()
        },
    )
    .await
}

/// Paid order the seller delivered `days_ago` days back.
pub async fn delivered_order(
    db: &DatabaseConnection,
    bus: &TestBus,
    m: &Market,
    days_ago: i64,
) -> orders::Model {
    let order = paid_order(db, bus, m).await;
    force(
        db,
        &order,
        OrderChanges {
            status: Some(OrderState::Delivered),
            delivery_date: Some(Utc::now() - Duration::days(days_ago)),
            ..Default::default()
        },
    )
    .await
}

pub async fn completed_order(db: &DatabaseConnection, bus: &TestBus, m: &Market) -> orders::Model {
    let order = delivered_order(db, bus, m, 0).await;
    order_service::complete_order(db, bus.broker(), &m.buyer, order.id)
        .await
        .expect("complete order");
    reload(db, order.id).await
}

pub async fn reload(db: &DatabaseConnection, order_id: Uuid) -> orders::Model {
    order_db::get_order_by_id(db, order_id)
        .await
        .expect("load order")
        .expect("order exists")
}

/// Money read back from SQLite, normalized to cents.
pub fn cents(value: Decimal) -> Decimal {
    value.round_dp(2).normalize()
}

/// In-memory stand-in for the payment gateway.
#[derive(Default)]
pub struct FakeGateway {
    pub calls: Mutex<Vec<CheckoutRequest>>,
    pub reject_with: Option<(u16, String)>,
}

impl FakeGateway {
    pub fn rejecting(status: u16, body: &str) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            reject_with: Some((status, body.to_string())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn initialize(&self, request: CheckoutRequest) -> Result<CheckoutSession, GatewayError> {
        let order_id = request.order_id;
        let mut calls = self.calls.lock().unwrap();
        calls.push(request);

        if let Some((status, body)) = &self.reject_with {
            return Err(GatewayError::Rejected {
                status: *status,
                body: body.clone(),
            });
        }

        Ok(CheckoutSession {
            reference: format!("ref_{}_{}", order_id.simple(), calls.len()),
            authorization_url: format!("https://pay.example.com/checkout/{order_id}"),
        })
    }
}
