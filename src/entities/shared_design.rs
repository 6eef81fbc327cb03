//! Shared design entity - the community feed.
//!
//! Each row is a room render published by a user. `likes` is maintained with
//! atomic column updates by the like toggle and never drops below zero.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Shared design database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "shared_designs")]
pub struct Model {
    /// Design identifier (UUID)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// User who shared the design
    pub user_id: String,
    /// Room the design was generated as
    pub room_id: String,
    /// Display name of the room
    pub room_name: String,
    /// Render location
    pub image_url: String,
    /// Number of likes
    pub likes: i64,
    /// When the design was shared
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `SharedDesign` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One design has many likes
    #[sea_orm(has_many = "super::design_like::Entity")]
    Likes,
    /// One design has many reaction counters
    #[sea_orm(has_many = "super::design_reaction::Entity")]
    Reactions,
}

impl Related<super::design_like::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Likes.def()
    }
}

impl Related<super::design_reaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
