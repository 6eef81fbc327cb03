//! Application settings loaded from `config.toml`.
//!
//! Every section has defaults, so a partial file (or none at all, see
//! [`load_config_or_default`]) still yields a working configuration. Secrets are
//! not part of this file; see [`crate::config::env`].

use crate::core::plan::Plan;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// HTTP listener
    #[serde(default)]
    pub server: ServerConfig,
    /// Session token validation
    #[serde(default)]
    pub auth: AuthConfig,
    /// Credit cost per paid feature
    #[serde(default)]
    pub costs: FeatureCosts,
    /// Public share links
    #[serde(default)]
    pub sharing: SharingConfig,
    /// Checkout redirect targets
    #[serde(default)]
    pub checkout: CheckoutConfig,
    /// Subscription tiers with their allotments and prices
    #[serde(default = "default_plans")]
    pub plans: Vec<PlanConfig>,
    /// One-time credit packs
    #[serde(default)]
    pub credit_packs: Vec<CreditPackConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            auth: AuthConfig::default(),
            costs: FeatureCosts::default(),
            sharing: SharingConfig::default(),
            checkout: CheckoutConfig::default(),
            plans: default_plans(),
            credit_packs: Vec::new(),
        }
    }
}

/// Address the HTTP server binds to
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind
    pub host: String,
    /// Port to bind
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// Session token validation settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Expected `aud` claim; audience is not checked when absent
    pub audience: Option<String>,
}

/// Credits charged per feature invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct FeatureCosts {
    /// Floor plan generation (sketch or text)
    pub floor_plan: i64,
    /// Per room in a redesign batch
    pub room_redesign: i64,
    /// Product discovery in a render
    pub product_discovery: i64,
    /// Color palette extraction
    pub color_palette: i64,
    /// House exterior generation
    pub house_exterior: i64,
}

impl Default for FeatureCosts {
    fn default() -> Self {
        Self {
            floor_plan: 1,
            room_redesign: 2,
            product_discovery: 1,
            color_palette: 1,
            house_exterior: 2,
        }
    }
}

/// Public share link settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SharingConfig {
    /// Origin share links are built on
    pub base_url: String,
}

impl Default for SharingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://plantaia.com".to_string(),
        }
    }
}

/// Where the checkout provider sends the browser back to
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckoutConfig {
    /// Redirect after a completed checkout
    pub success_url: String,
    /// Redirect after an abandoned checkout
    pub cancel_url: String,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            success_url: "https://plantaia.com/?checkout=success".to_string(),
            cancel_url: "https://plantaia.com/?checkout=cancelled".to_string(),
        }
    }
}

/// A subscription tier as sold through checkout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PlanConfig {
    /// Catalog identifier used by checkout requests
    pub id: String,
    /// Tier granted by the subscription
    pub plan: Plan,
    /// Provider price identifier; tiers without one cannot be bought
    #[serde(default)]
    pub price_id: Option<String>,
    /// Credits granted at each monthly renewal
    pub monthly_credits: i64,
}

/// A one-time credit pack
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CreditPackConfig {
    /// Catalog identifier used by checkout requests
    pub id: String,
    /// Display name
    pub name: String,
    /// Provider price identifier
    pub price_id: String,
    /// Credits granted on payment
    pub credits: i64,
}

/// Something a user can pay for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CatalogItem<'a> {
    /// One-time credits
    CreditPack(&'a CreditPackConfig),
    /// Recurring tier upgrade
    Subscription(&'a PlanConfig),
}

impl CatalogItem<'_> {
    /// Provider price identifier, if the item is purchasable
    #[must_use]
    pub fn price_id(&self) -> Option<&str> {
        match self {
            Self::CreditPack(pack) => Some(pack.price_id.as_str()),
            Self::Subscription(plan) => plan.price_id.as_deref(),
        }
    }

    /// Credits granted when the payment is confirmed
    #[must_use]
    pub const fn credits(&self) -> i64 {
        match self {
            Self::CreditPack(pack) => pack.credits,
            Self::Subscription(plan) => plan.monthly_credits,
        }
    }

    /// Tier granted when the payment is confirmed
    #[must_use]
    pub const fn plan(&self) -> Option<Plan> {
        match self {
            Self::CreditPack(_) => None,
            Self::Subscription(plan) => Some(plan.plan),
        }
    }

    /// Whether checkout should open a recurring subscription
    #[must_use]
    pub const fn is_subscription(&self) -> bool {
        matches!(self, Self::Subscription(_))
    }
}

fn default_plans() -> Vec<PlanConfig> {
    Plan::ALL
        .into_iter()
        .map(|plan| PlanConfig {
            id: plan.as_str().to_ascii_lowercase(),
            plan,
            price_id: None,
            monthly_credits: plan.default_monthly_credits(),
        })
        .collect()
}

impl AppConfig {
    /// Credits granted to `plan` at each monthly renewal.
    #[must_use]
    pub fn monthly_allotment(&self, plan: Plan) -> i64 {
        self.plans
            .iter()
            .find(|entry| entry.plan == plan)
            .map_or_else(|| plan.default_monthly_credits(), |entry| entry.monthly_credits)
    }

    /// Looks up a credit pack or plan by its catalog id.
    #[must_use]
    pub fn catalog_item(&self, id: &str) -> Option<CatalogItem<'_>> {
        self.credit_packs
            .iter()
            .find(|pack| pack.id == id)
            .map(CatalogItem::CreditPack)
            .or_else(|| {
                self.plans
                    .iter()
                    .find(|plan| plan.id == id)
                    .map(CatalogItem::Subscription)
            })
    }

    fn validate(self) -> Result<Self> {
        let negative_cost = [
            self.costs.floor_plan,
            self.costs.room_redesign,
            self.costs.product_discovery,
            self.costs.color_palette,
            self.costs.house_exterior,
        ]
        .into_iter()
        .any(|cost| cost < 0);
        if negative_cost {
            return Err(Error::Config {
                message: "feature costs must not be negative".to_string(),
            });
        }
        if let Some(pack) = self.credit_packs.iter().find(|pack| pack.credits <= 0) {
            return Err(Error::Config {
                message: format!("credit pack '{}' must grant credits", pack.id),
            });
        }
        if let Some(plan) = self.plans.iter().find(|plan| plan.monthly_credits < 0) {
            return Err(Error::Config {
                message: format!("plan '{}' has a negative allotment", plan.id),
            });
        }
        Ok(self)
    }
}

/// Parses and validates configuration from TOML text
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })?;
    config.validate()
}

/// Loads configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - A cost, pack or plan allotment is out of range
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;
    parse_config(&contents)
}

/// Loads `path`, falling back to built-in defaults when the file does not exist.
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    if path.as_ref().exists() {
        load_config(path)
    } else {
        tracing::warn!(
            "No config file at {:?}; using built-in defaults",
            path.as_ref()
        );
        Ok(AppConfig::default())
    }
}
