use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use dotenv::dotenv;
use gigmarket_backend::auth::jwks::JwksCache;
use gigmarket_backend::config::AppConfig;
use gigmarket_backend::gateway::HttpPaymentGateway;
use gigmarket_backend::handlers::payments::Gateway;
use gigmarket_backend::services::payouts;
use gigmarket_backend::{bus, create_pool, handlers};
use migration::{Migrator, MigratorTrait};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = AppConfig::from_env().expect("Invalid configuration");

    let db = create_pool(&config.database_url)
        .await
        .expect("Failed to connect to database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    let db_data = web::Data::new(db.clone());

    let bus = bus::connect(config.redis_url.as_deref())
        .await
        .expect("Failed to connect to Redis");
    let bus_data = web::Data::new(bus.clone());

    let jwks_cache = web::Data::new(Arc::new(JwksCache::new(&config.auth)));

    let gateway: Gateway = Arc::new(HttpPaymentGateway::new(config.gateway.clone()));
    let gateway_data = web::Data::new(gateway);

    payouts::spawn_sweeper(db, bus, config.payout.clone());
    tracing::info!(
        "Payout sweep every {:?}, grace period {} days",
        config.payout.sweep_interval,
        config.payout.grace_period.num_days()
    );

    let bind_addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Server running at http://{bind_addr}");

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
            .allowed_headers(vec![
                actix_web::http::header::AUTHORIZATION,
                actix_web::http::header::CONTENT_TYPE,
                actix_web::http::header::ACCEPT,
            ])
            .max_age(3600);

        App::new()
            .wrap(cors)
            .app_data(db_data.clone())
            .app_data(bus_data.clone())
            .app_data(jwks_cache.clone())
            .app_data(gateway_data.clone())
            .service(web::scope("/api").configure(handlers::init_routes))
    })
    .bind(&bind_addr)?
    .run()
    .await
}
