//! Entitlement business logic - the credit ledger behind every paid feature.
//!
//! Each account has one `user_entitlements` row holding its spendable balance and
//! plan tier. Balances only change through single-statement conditional updates,
//! so two spenders racing on the same account can never drive it negative or lose
//! each other's update. Payment crediting is keyed by the checkout session id: the
//! unique constraint on `payment_transactions.session_id` decides whether a
//! confirmation is new, and the credit happens in the same database transaction as
//! the insert that won.

use crate::{
    core::plan::Plan,
    entities::{
        PaymentTransaction, PaymentTransactionModel, UserEntitlement, UserEntitlementModel,
        payment_transaction, user_entitlement,
    },
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{
    QueryOrder, Set, TransactionTrait,
    prelude::*,
    sea_query::{Expr, OnConflict},
};
use serde::Serialize;
use tracing::{info, instrument, warn};

const STATUS_COMPLETED: &str = "completed";
const STATUS_FAILED: &str = "failed";

/// Spendable balance and tier of one account
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Balance {
    /// Credits available to spend
    pub credits: i64,
    /// Current subscription tier
    pub plan: Plan,
}

impl From<&UserEntitlementModel> for Balance {
    fn from(model: &UserEntitlementModel) -> Self {
        let plan = model.plan.parse().unwrap_or_else(|_| {
            warn!(user_id = %model.user_id, plan = %model.plan, "Unknown stored plan, treating as Free");
            Plan::Free
        });
        Self {
            credits: model.credits,
            plan,
        }
    }
}

/// A checkout session the payment provider reported as paid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentConfirmation {
    /// Idempotency key
    pub session_id: String,
    /// Account to credit
    pub user_id: String,
    /// Credits bought
    pub credits: i64,
    /// Tier bought, for subscriptions
    pub plan: Option<Plan>,
    /// Amount charged, in the smallest currency unit
    pub amount_cents: i64,
}

/// What [`apply_payment_confirmation`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    /// First delivery for this session; the account was credited
    Credited(Balance),
    /// The session was already applied; nothing changed
    AlreadyApplied,
}

/// Creates the account row at first login with a Free plan and no credits.
///
/// Calling it for an existing account is a no-op. Returns `true` when a row was created.
pub async fn ensure_account<C>(db: &C, user_id: &str) -> Result<bool>
where
    C: ConnectionTrait,
{
    let now = Utc::now();
    let account = user_entitlement::ActiveModel {
        user_id: Set(user_id.to_string()),
        credits: Set(0),
        plan: Set(Plan::Free.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let inserted = UserEntitlement::insert(account)
        .on_conflict(
            OnConflict::column(user_entitlement::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    if inserted > 0 {
        info!(user_id, "Created entitlement account");
    }
    Ok(inserted > 0)
}

/// Returns the balance and plan of `user_id`.
///
/// # Errors
/// `NotFound` when the account has never been created.
pub async fn get_balance<C>(db: &C, user_id: &str) -> Result<Balance>
where
    C: ConnectionTrait,
{
    UserEntitlement::find_by_id(user_id)
        .one(db)
        .await?
        .map(|model| Balance::from(&model))
        .ok_or_else(|| Error::NotFound {
            entity: "account",
            key: user_id.to_string(),
        })
}

/// Like [`get_balance`], but a missing account reads as `{0, Free}`.
pub async fn balance_or_default<C>(db: &C, user_id: &str) -> Result<Balance>
where
    C: ConnectionTrait,
{
    match get_balance(db, user_id).await {
        Err(Error::NotFound { .. }) => Ok(Balance::default()),
        other => other,
    }
}

/// Debits `amount` credits, clamping the balance at zero instead of rejecting.
///
/// Runs as one `UPDATE .. SET credits = CASE WHEN credits >= amount THEN credits - amount
/// ELSE 0 END`, so concurrent debits are never lost. Callers that must not
/// over-spend use [`try_debit`].
#[instrument(skip(db))]
pub async fn debit(db: &DatabaseConnection, user_id: &str, amount: i64) -> Result<Balance> {
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;
    let updated = UserEntitlement::update_many()
        .col_expr(
            user_entitlement::Column::Credits,
            Expr::case(
                Expr::col(user_entitlement::Column::Credits).gte(amount),
                Expr::col(user_entitlement::Column::Credits).sub(amount),
            )
            .finally(0_i64)
            .into(),
        )
        .col_expr(user_entitlement::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(user_entitlement::Column::UserId.eq(user_id))
        .exec(&txn)
        .await?;

    if updated.rows_affected == 0 {
        return Err(Error::NotFound {
            entity: "account",
            key: user_id.to_string(),
        });
    }

    let balance = get_balance(&txn, user_id).await?;
    txn.commit().await?;
    info!(user_id, amount, credits = balance.credits, "Debited credits");
    Ok(balance)
}

/// Spends `amount` credits only if the balance covers it.
///
/// The check and the decrement are the same `UPDATE .. WHERE credits >= amount`
/// statement; zero affected rows means the spend lost.
///
/// # Errors
/// - `InvalidAmount` if `amount <= 0`
/// - `InsufficientCredits` if the balance is below `amount`
/// - `NotFound` if the account does not exist
#[instrument(skip(db))]
pub async fn try_debit(db: &DatabaseConnection, user_id: &str, amount: i64) -> Result<Balance> {
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;
    let updated = UserEntitlement::update_many()
        .col_expr(
            user_entitlement::Column::Credits,
            Expr::col(user_entitlement::Column::Credits).sub(amount),
        )
        .col_expr(user_entitlement::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(user_entitlement::Column::UserId.eq(user_id))
        .filter(user_entitlement::Column::Credits.gte(amount))
        .exec(&txn)
        .await?;

    let balance = get_balance(&txn, user_id).await?;
    if updated.rows_affected == 0 {
        return Err(Error::InsufficientCredits {
            current: balance.credits,
            required: amount,
        });
    }

    txn.commit().await?;
    info!(user_id, amount, credits = balance.credits, "Spent credits");
    Ok(balance)
}

async fn credit_in<C>(db: &C, user_id: &str, amount: i64, plan: Option<Plan>) -> Result<Balance>
where
    C: ConnectionTrait,
{
    ensure_account(db, user_id).await?;

    let mut update = UserEntitlement::update_many()
        .col_expr(
            user_entitlement::Column::Credits,
            Expr::col(user_entitlement::Column::Credits).add(amount),
        )
        .col_expr(user_entitlement::Column::UpdatedAt, Expr::value(Utc::now()));
    if let Some(plan) = plan {
        update = update.col_expr(user_entitlement::Column::Plan, Expr::value(plan.to_string()));
    }
    update
        .filter(user_entitlement::Column::UserId.eq(user_id))
        .exec(db)
        .await?;

    get_balance(db, user_id).await
}

/// Adds `amount` credits and, if given, overwrites the plan tier.
///
/// Creates the account first if the payment arrived before the first login.
#[instrument(skip(db))]
pub async fn credit(
    db: &DatabaseConnection,
    user_id: &str,
    amount: i64,
    plan: Option<Plan>,
) -> Result<Balance> {
    if amount < 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;
    let balance = credit_in(&txn, user_id, amount, plan).await?;
    txn.commit().await?;
    info!(user_id, amount, credits = balance.credits, plan = %balance.plan, "Credited account");
    Ok(balance)
}

/// Applies a paid checkout session exactly once.
///
/// Within one transaction the `completed` row is inserted with `ON CONFLICT DO
/// NOTHING`; the account is credited only if that insert wrote a row. A session
/// previously recorded as `failed` is upgraded in place and credited. Any other
/// existing row means the confirmation was already applied.
#[instrument(skip(db, confirmation), fields(session_id = %confirmation.session_id, user_id = %confirmation.user_id))]
pub async fn apply_payment_confirmation(
    db: &DatabaseConnection,
    confirmation: &PaymentConfirmation,
) -> Result<PaymentOutcome> {
    if confirmation.credits < 0 {
        return Err(Error::InvalidAmount {
            amount: confirmation.credits,
        });
    }

    let txn = db.begin().await?;
    let row = payment_transaction::ActiveModel {
        session_id: Set(confirmation.session_id.clone()),
        user_id: Set(confirmation.user_id.clone()),
        amount_cents: Set(confirmation.amount_cents),
        credits_purchased: Set(confirmation.credits),
        plan_purchased: Set(confirmation.plan.map(|plan| plan.to_string())),
        status: Set(STATUS_COMPLETED.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let inserted = PaymentTransaction::insert(row)
        .on_conflict(
            OnConflict::column(payment_transaction::Column::SessionId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(&txn)
        .await?;

    if inserted == 0 {
        // A failed attempt may later succeed under the same session
        let upgraded = PaymentTransaction::update_many()
            .col_expr(
                payment_transaction::Column::Status,
                Expr::value(STATUS_COMPLETED),
            )
            .col_expr(
                payment_transaction::Column::CreditsPurchased,
                Expr::value(confirmation.credits),
            )
            .col_expr(
                payment_transaction::Column::PlanPurchased,
                Expr::value(confirmation.plan.map(|plan| plan.to_string())),
            )
            .col_expr(
                payment_transaction::Column::AmountCents,
                Expr::value(confirmation.amount_cents),
            )
            .filter(payment_transaction::Column::SessionId.eq(&confirmation.session_id))
            .filter(payment_transaction::Column::Status.eq(STATUS_FAILED))
            .exec(&txn)
            .await?;

        if upgraded.rows_affected == 0 {
            txn.rollback().await?;
            info!("Payment confirmation already applied");
            return Ok(PaymentOutcome::AlreadyApplied);
        }
    }

    let balance = credit_in(
        &txn,
        &confirmation.user_id,
        confirmation.credits,
        confirmation.plan,
    )
    .await?;
    txn.commit().await?;

    info!(
        credits = confirmation.credits,
        balance = balance.credits,
        plan = %balance.plan,
        "Payment confirmation applied"
    );
    Ok(PaymentOutcome::Credited(balance))
}

/// Records an asynchronous payment failure without touching the balance.
///
/// Returns `false` if the session already has a row.
#[instrument(skip(db))]
pub async fn record_failed_payment(
    db: &DatabaseConnection,
    session_id: &str,
    user_id: &str,
    amount_cents: i64,
) -> Result<bool> {
    let row = payment_transaction::ActiveModel {
        session_id: Set(session_id.to_string()),
        user_id: Set(user_id.to_string()),
        amount_cents: Set(amount_cents),
        credits_purchased: Set(0),
        plan_purchased: Set(None),
        status: Set(STATUS_FAILED.to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    };

    let inserted = PaymentTransaction::insert(row)
        .on_conflict(
            OnConflict::column(payment_transaction::Column::SessionId)
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;

    if inserted > 0 {
        warn!("Recorded failed payment");
    }
    Ok(inserted > 0)
}

/// Payment history of `user_id`, newest first.
pub async fn list_transactions(
    db: &DatabaseConnection,
    user_id: &str,
) -> Result<Vec<PaymentTransactionModel>> {
    PaymentTransaction::find()
        .filter(payment_transaction::Column::UserId.eq(user_id))
        .order_by_desc(payment_transaction::Column::CreatedAt)
        .order_by_desc(payment_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
