//! JSON HTTP API over the studio, the social store and the payment bridge.

/// Balance, history and catalog endpoints
pub mod account;
/// Session token extractor
pub mod auth;
/// Community feed endpoints, including the live change stream
pub mod feed;
/// Checkout and payment webhooks
pub mod payments;
/// Favorites and custom product links
pub mod social;
/// Paid studio flows
pub mod studio;

use crate::{
    config::settings::AppConfig,
    core::{feed::FeedNotifier, studio::Studio},
    payment::StripeCheckout,
};
use actix_web::web;
use sea_orm::DatabaseConnection;
use std::sync::Arc;

pub use auth::{AuthKeys, AuthUser};

/// Everything the handlers share
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: DatabaseConnection,
    /// Paid feature flows
    pub studio: Studio,
    /// Live feed change fan-out
    pub notifier: FeedNotifier,
    /// Loaded `config.toml`
    pub config: Arc<AppConfig>,
    /// Session token validation
    pub auth: AuthKeys,
    /// Checkout session client
    pub checkout: StripeCheckout,
    /// Webhook signing secret, if configured
    pub webhook_secret: Option<String>,
}

/// Registers every route.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(account::health)
        .service(payments::stripe_webhook)
        .service(
            web::scope("/api")
                .configure(account::configure)
                .configure(payments::configure)
                .configure(studio::configure)
                .configure(social::configure)
                .configure(feed::configure),
        );
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::{
        config::settings::CheckoutConfig,
        errors::Result,
        test_utils::{FakeGateway, setup_test_db},
    };

    pub const JWT_SECRET: &str = "test-jwt-secret";
    pub const WEBHOOK_SECRET: &str = "whsec_test_secret";

    /// State over a fresh database and a scripted gateway.
    pub async fn test_state(gateway: FakeGateway) -> Result<AppState> {
        let db = setup_test_db().await?;
        let config = Arc::new(AppConfig::default());
        let notifier = FeedNotifier::default();
        let studio = Studio::new(db.clone(), Arc::new(gateway), notifier.clone(), &config);
        Ok(AppState {
            db,
            studio,
            notifier,
            auth: AuthKeys::new(JWT_SECRET, None),
            checkout: StripeCheckout::with_base_url(
                "sk_test",
                CheckoutConfig::default(),
                "http://127.0.0.1:9",
            ),
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            config,
        })
    }

    /// `Authorization` header value for `user_id`.
    pub fn bearer(user_id: &str) -> (&'static str, String) {
        (
            "Authorization",
            format!("Bearer {}", auth::issue_token(JWT_SECRET, user_id)),
        )
    }
}
