pub mod gigs;
pub mod messages;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod reviews;
pub mod rooms;
pub mod users;

use sea_orm::{Database, DatabaseConnection, DbErr};

/// Create a SeaORM database connection pool for `database_url`.
pub async fn create_pool(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}
