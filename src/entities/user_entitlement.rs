//! User entitlement entity - one row per account holding the spendable balance and plan tier.
//!
//! Rows are created implicitly at first login (Free, 0 credits) and are never deleted
//! while the account exists. `credits` is kept non-negative by the ledger operations.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Entitlement database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user_entitlements")]
pub struct Model {
    /// Stable identity issued by the external auth system
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Spendable credit balance, never negative
    pub credits: i64,
    /// Plan tier name (`"Free"`, `"Basic"`, `"Pro"` or `"VIP"`)
    pub plan: String,
    /// When the account row was first created
    pub created_at: DateTimeUtc,
    /// Last balance or plan mutation
    pub updated_at: DateTimeUtc,
}

/// Entitlements are referenced by user id only; no enforced relations
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
