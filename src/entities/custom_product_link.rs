//! Custom product link entity - per-user override of a discovered product's purchase URL.
//!
//! Keyed by (`user_id`, `room_id`, `product_name`); saving again replaces the URL.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Custom product link database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "custom_product_links")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the override
    pub user_id: String,
    /// Room the product was discovered in
    pub room_id: String,
    /// Product name as returned by discovery
    pub product_name: String,
    /// Replacement purchase URL
    pub custom_url: String,
    /// When the link was last saved
    pub updated_at: DateTimeUtc,
}

/// `CustomProductLink` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
