//! Database configuration module.
//!
//! This module handles the `SQLite` connection and table creation using `SeaORM`.
//! Tables are generated from the entity definitions with
//! `Schema::create_table_from_entity`; composite natural keys, which the entity
//! macros cannot express, are added as explicit unique indexes.

use crate::entities::{
    CustomProductLink, DesignEvent, DesignLike, DesignReaction, Favorite, PaymentTransaction,
    SharedDesign, SystemState, UserEntitlement, custom_product_link, design_like, design_reaction,
    favorite,
};
use crate::errors::Result;
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema,
    sea_query::{Index, IndexCreateStatement},
};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/plantaia.sqlite?mode=rwc";

/// Gets the database URL from the `DATABASE_URL` environment variable or returns
/// the default local `SQLite` file.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database at `database_url`.
pub async fn create_connection(database_url: &str) -> Result<DatabaseConnection> {
    debug!("Connecting to database at {database_url}");
    Database::connect(database_url).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

fn unique_indexes() -> Vec<IndexCreateStatement> {
    vec![
        Index::create()
            .name("idx_favorites_user_room")
            .table(Favorite)
            .col(favorite::Column::UserId)
            .col(favorite::Column::RoomId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_design_likes_user_design")
            .table(DesignLike)
            .col(design_like::Column::UserId)
            .col(design_like::Column::DesignId)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_design_reactions_design_emoji")
            .table(DesignReaction)
            .col(design_reaction::Column::DesignId)
            .col(design_reaction::Column::Emoji)
            .unique()
            .if_not_exists()
            .to_owned(),
        Index::create()
            .name("idx_custom_product_links_key")
            .table(CustomProductLink)
            .col(custom_product_link::Column::UserId)
            .col(custom_product_link::Column::RoomId)
            .col(custom_product_link::Column::ProductName)
            .unique()
            .if_not_exists()
            .to_owned(),
    ]
}

/// Creates all tables and unique indexes if they do not exist yet.
///
/// Parent tables are created before the tables that reference them.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    create_table(db, &schema, UserEntitlement).await?;
    create_table(db, &schema, PaymentTransaction).await?;
    create_table(db, &schema, Favorite).await?;
    create_table(db, &schema, SharedDesign).await?;
    create_table(db, &schema, DesignLike).await?;
    create_table(db, &schema, DesignReaction).await?;
    create_table(db, &schema, CustomProductLink).await?;
    create_table(db, &schema, DesignEvent).await?;
    create_table(db, &schema, SystemState).await?;

    for index in unique_indexes() {
        db.execute(builder.build(&index)).await?;
    }

    info!("Database tables ready");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{
        PaymentTransactionModel, SharedDesignModel, SystemStateModel, UserEntitlementModel,
    };
    use sea_orm::QuerySelect;

    #[tokio::test]
    async fn test_create_tables() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;

        // Test that tables exist by querying them
        let _: Vec<UserEntitlementModel> = UserEntitlement::find().limit(1).all(&db).await?;
        let _: Vec<PaymentTransactionModel> =
            PaymentTransaction::find().limit(1).all(&db).await?;
        let _: Vec<SharedDesignModel> = SharedDesign::find().limit(1).all(&db).await?;
        let _: Vec<SystemStateModel> = SystemState::find().limit(1).all(&db).await?;

        Ok(())
    }

    #[tokio::test]
    async fn test_create_tables_is_repeatable() -> Result<()> {
        let db = Database::connect("sqlite::memory:").await?;
        create_tables(&db).await?;
        create_tables(&db).await?;
        Ok(())
    }
}
