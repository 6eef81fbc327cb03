//! Monthly plan renewal
//!
//! Every account receives its tier's monthly credit allotment once per calendar
//! month. The month of the last renewal is kept under a single key in the
//! `system_state` table, so running the check again in the same month (at startup,
//! then hourly) changes nothing.

use crate::{
    config::settings::AppConfig,
    core::plan::Plan,
    entities::{SystemState, UserEntitlement, system_state, user_entitlement},
    errors::{Error, Result},
};
use chrono::{Datelike, NaiveDate, Utc};
use sea_orm::{Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::info;

const LAST_PLAN_RENEWAL_KEY: &str = "last_plan_renewal";

/// Credits granted to one tier during a renewal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierRenewal {
    /// Tier that was renewed
    pub plan: Plan,
    /// Credits added to each account on the tier
    pub allotment: i64,
    /// Number of accounts credited
    pub accounts: u64,
}

/// Result of one renewal run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalSummary {
    /// Per-tier breakdown, in tier order
    pub tiers: Vec<TierRenewal>,
    /// Date the renewal ran
    pub renewal_date: NaiveDate,
}

impl RenewalSummary {
    /// Total number of accounts credited across all tiers
    #[must_use]
    pub fn total_accounts(&self) -> u64 {
        self.tiers.iter().map(|tier| tier.accounts).sum()
    }
}

/// Returns the date of the last renewal, if one was ever recorded.
pub async fn get_last_renewal_date<C>(db: &C) -> Result<Option<NaiveDate>>
where
    C: ConnectionTrait,
{
    let state = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_PLAN_RENEWAL_KEY))
        .one(db)
        .await?;

    state
        .map(|s| {
            NaiveDate::parse_from_str(&s.value, "%Y-%m-%d").map_err(|e| Error::Config {
                message: format!("Failed to parse last renewal date: {e}"),
            })
        })
        .transpose()
}

async fn set_last_renewal_date<C>(db: &C, date: NaiveDate) -> Result<()>
where
    C: ConnectionTrait,
{
    let date_str = date.format("%Y-%m-%d").to_string();
    let now = Utc::now().naive_utc();

    let existing = SystemState::find()
        .filter(system_state::Column::Key.eq(LAST_PLAN_RENEWAL_KEY))
        .one(db)
        .await?;

    if let Some(state) = existing {
        let mut active_model: system_state::ActiveModel = state.into();
        active_model.value = Set(date_str);
        active_model.updated_at = Set(now);
        active_model.update(db).await?;
    } else {
        system_state::ActiveModel {
            key: Set(LAST_PLAN_RENEWAL_KEY.to_string()),
            value: Set(date_str),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    Ok(())
}

/// True when `today` falls in a later month than the last recorded renewal.
pub async fn is_renewal_due<C>(db: &C, today: NaiveDate) -> Result<bool>
where
    C: ConnectionTrait,
{
    Ok(get_last_renewal_date(db).await?.is_none_or(|last| {
        last.year() != today.year() || last.month() != today.month()
    }))
}

/// Credits every account its plan allotment, at most once per month of `today`.
///
/// Returns `None` when the month was already renewed. All tiers are renewed in
/// one transaction together with the bookkeeping row.
pub async fn renew_plans(
    db: &DatabaseConnection,
    config: &AppConfig,
    today: NaiveDate,
) -> Result<Option<RenewalSummary>> {
    let txn = db.begin().await?;

    if !is_renewal_due(&txn, today).await? {
        return Ok(None);
    }

    let mut tiers = Vec::with_capacity(Plan::ALL.len());
    for plan in Plan::ALL {
        let allotment = config.monthly_allotment(plan);
        let accounts = if allotment > 0 {
            UserEntitlement::update_many()
                .col_expr(
                    user_entitlement::Column::Credits,
                    Expr::col(user_entitlement::Column::Credits).add(allotment),
                )
                .col_expr(user_entitlement::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(user_entitlement::Column::Plan.eq(plan.as_str()))
                .exec(&txn)
                .await?
                .rows_affected
        } else {
            0
        };
        tiers.push(TierRenewal {
            plan,
            allotment,
            accounts,
        });
    }

    set_last_renewal_date(&txn, today).await?;
    txn.commit().await?;

    let summary = RenewalSummary {
        tiers,
        renewal_date: today,
    };
    info!("{}", format_renewal_summary(&summary));
    Ok(Some(summary))
}

/// Runs [`renew_plans`] for the current UTC date.
pub async fn renew_plans_if_due(
    db: &DatabaseConnection,
    config: &AppConfig,
) -> Result<Option<RenewalSummary>> {
    renew_plans(db, config, Utc::now().date_naive()).await
}

/// One-line human-readable summary of a renewal, for logs.
#[must_use]
pub fn format_renewal_summary(summary: &RenewalSummary) -> String {
    let tiers = summary
        .tiers
        .iter()
        .map(|tier| format!("{} {}x{}", tier.plan, tier.accounts, tier.allotment))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Plan renewal - {} - {} accounts ({tiers})",
        summary.renewal_date.format("%B %Y"),
        summary.total_accounts()
    )
}
