//! Subscription tiers.
//!
//! Tiers are a closed set ordered by their monthly credit allotment, so
//! `Plan::Free < Plan::Basic < Plan::Pro < Plan::Vip`.

use crate::errors::Error;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Subscription tier of an account
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Plan {
    /// Default tier for every new account
    #[default]
    Free,
    /// Entry paid tier
    Basic,
    /// Mid paid tier
    Pro,
    /// Top tier
    #[serde(rename = "VIP")]
    Vip,
}

impl Plan {
    /// All tiers in ascending order
    pub const ALL: [Self; 4] = [Self::Free, Self::Basic, Self::Pro, Self::Vip];

    /// Name stored in the database and shown to users.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "Free",
            Self::Basic => "Basic",
            Self::Pro => "Pro",
            Self::Vip => "VIP",
        }
    }

    /// Monthly allotment used when `config.toml` does not list the tier.
    #[must_use]
    pub const fn default_monthly_credits(self) -> i64 {
        match self {
            Self::Free => 20,
            Self::Basic => 100,
            Self::Pro => 500,
            Self::Vip => 1500,
        }
    }

    /// Public share links are a commercial feature: any paid tier.
    #[must_use]
    pub fn allows_commercial_sharing(self) -> bool {
        self > Self::Free
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|plan| plan.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::invalid_payload(format!("unknown plan '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_plans_ordered_by_allotment() {
        for pair in Plan::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert!(pair[0].default_monthly_credits() < pair[1].default_monthly_credits());
        }
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("vip".parse::<Plan>().unwrap(), Plan::Vip);
        assert_eq!(" Pro ".parse::<Plan>().unwrap(), Plan::Pro);
        assert!(matches!(
            "Platinum".parse::<Plan>(),
            Err(Error::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_display_round_trips_through_storage_name() {
        for plan in Plan::ALL {
            assert_eq!(plan.to_string().parse::<Plan>().unwrap(), plan);
        }
    }

    #[test]
    fn test_only_paid_plans_share_commercially() {
        assert!(!Plan::Free.allows_commercial_sharing());
        assert!(Plan::Basic.allows_commercial_sharing());
        assert!(Plan::Vip.allows_commercial_sharing());
    }

    #[test]
    fn test_serde_uses_display_names() {
        assert_eq!(serde_json::to_string(&Plan::Vip).unwrap(), "\"VIP\"");
        let parsed: Plan = serde_json::from_str("\"Basic\"").unwrap();
        assert_eq!(parsed, Plan::Basic);
    }
}
