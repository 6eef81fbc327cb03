//! Payment transaction entity - append-only ledger with one row per checkout session.
//!
//! `session_id` is the idempotency key for webhook crediting and carries a unique
//! constraint, so at most one row can exist per checkout session.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Payment transaction database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payment_transactions")]
pub struct Model {
    /// Unique identifier for the ledger row
    #[sea_orm(primary_key)]
    pub id: i64,
    /// External checkout session identifier
    #[sea_orm(unique)]
    pub session_id: String,
    /// Account the session was paid for
    pub user_id: String,
    /// Amount charged, in the smallest currency unit
    pub amount_cents: i64,
    /// Credits granted by this session (0 for failures)
    pub credits_purchased: i64,
    /// Plan bought with this session, if it was a subscription
    pub plan_purchased: Option<String>,
    /// `"completed"` or `"failed"`
    pub status: String,
    /// When the row was written
    pub created_at: DateTimeUtc,
}

/// Transactions are not joined to entitlements; webhooks may arrive before first login
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
