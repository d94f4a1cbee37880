use std::time::Duration;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Schema,
};
use tracing::info;

use crate::{config::AppConfig, entities};

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Establishes the connection pool described by the application config.
pub async fn establish_connection(config: &AppConfig) -> Result<DbPool, DbErr> {
    let mut opt = ConnectOptions::new(config.database_url.clone());
    opt.max_connections(config.db_max_connections)
        .min_connections(config.db_min_connections)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(8))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(false);

    let pool = Database::connect(opt).await?;
    info!("database connection established");

    if config.auto_migrate {
        ensure_schema(&pool).await?;
    }

    Ok(pool)
}

/// Creates any missing tables from the entity definitions.
///
/// Used for development and tests; production schema is managed out of band.
pub async fn ensure_schema(db: &DatabaseConnection) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    let mut statements = vec![
        schema.create_table_from_entity(entities::category::Entity),
        schema.create_table_from_entity(entities::product::Entity),
        schema.create_table_from_entity(entities::product_variant::Entity),
        schema.create_table_from_entity(entities::cart::Entity),
        schema.create_table_from_entity(entities::cart_item::Entity),
        schema.create_table_from_entity(entities::coupon::Entity),
        schema.create_table_from_entity(entities::customer_address::Entity),
        schema.create_table_from_entity(entities::order::Entity),
        schema.create_table_from_entity(entities::order_item::Entity),
        schema.create_table_from_entity(entities::order_status_history::Entity),
    ];

    for statement in &mut statements {
        statement.if_not_exists();
        db.execute(backend.build(&*statement)).await?;
    }

    info!("schema bootstrap complete");
    Ok(())
}
