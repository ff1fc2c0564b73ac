pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_users_table;
mod m20260301_000002_create_gigs_table;
mod m20260301_000003_create_order_statuses_table;
mod m20260301_000004_create_orders_table;
mod m20260301_000005_create_payment_tables;
mod m20260301_000006_create_notifications_table;
mod m20260301_000007_create_chat_tables;
mod m20260301_000008_create_reviews_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_users_table::Migration),
            Box::new(m20260301_000002_create_gigs_table::Migration),
            Box::new(m20260301_000003_create_order_statuses_table::Migration),
            Box::new(m20260301_000004_create_orders_table::Migration),
            Box::new(m20260301_000005_create_payment_tables::Migration),
            Box::new(m20260301_000006_create_notifications_table::Migration),
            Box::new(m20260301_000007_create_chat_tables::Migration),
            Box::new(m20260301_000008_create_reviews_table::Migration),
        ]
    }
}
