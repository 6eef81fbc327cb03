//! Design event entity - append-only log of studio and social actions.
//!
//! The per-user studio view is rebuilt by replaying these rows in id order.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Design event database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "design_events")]
pub struct Model {
    /// Monotonic identifier, defines replay order
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User the event belongs to
    pub user_id: String,
    /// Event kind: `"generated"`, `"favorited"`, `"unfavorited"`, `"shared"`, `"liked"`, `"unliked"`
    pub kind: String,
    /// Room or design the event is about
    pub subject_id: String,
    /// Kind-specific data
    pub payload: Json,
    /// When the event was appended
    pub occurred_at: DateTimeUtc,
}

/// `DesignEvent` has no relationships with other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
