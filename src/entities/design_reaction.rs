//! Design reaction entity - emoji counters per shared design, unique per (`design_id`, `emoji`).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reaction counter database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "design_reactions")]
pub struct Model {
    /// Unique identifier
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Design the reaction belongs to
    pub design_id: String,
    /// The emoji itself
    pub emoji: String,
    /// How many times it was used
    pub count: i64,
}

/// Defines relationships between `DesignReaction` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each counter belongs to one shared design
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
