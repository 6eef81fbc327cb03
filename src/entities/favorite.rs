//! Favorite entity - a user's saved room renders.
//!
//! Unique per (`user_id`, `room_id`); the index is created alongside the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Favorite database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "favorites")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owner of the favorite
    pub user_id: String,
    /// Identifier of the generated room
    pub room_id: String,
    /// Display name, e.g. `"Kitchen (Scandinavian)"`
    pub room_name: String,
    /// Render location (data URL or remote URL)
    pub image_url: String,
    /// When the room was favorited
    pub created_at: DateTimeUtc,
}

/// `Favorite` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
