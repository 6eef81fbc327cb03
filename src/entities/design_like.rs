//! Design like entity - who liked which shared design. Unique per (`user_id`, `design_id`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Like database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "design_likes")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User who liked the design
    pub user_id: String,
    /// Liked design
    pub design_id: String,
    /// When the like was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between `DesignLike` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each like belongs to one shared design
    #[sea_orm(
        belongs_to = "super::shared_design::Entity",
        from = "Column::DesignId",
        to = "super::shared_design::Column::Id"
    )]
    SharedDesign,
}

impl Related<super::shared_design::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SharedDesign.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
