//! Checkout session creation.
//!
//! A session carries the buyer and what they bought in its metadata; the webhook
//! reads it back when the provider confirms payment.

use crate::{
    config::settings::{CatalogItem, CheckoutConfig},
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Where to send the buyer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutLink {
    /// Checkout session id
    pub id: String,
    /// Hosted checkout page
    pub url: String,
}

/// Client for the provider's checkout API
#[derive(Clone)]
pub struct StripeCheckout {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
    urls: CheckoutConfig,
}

impl std::fmt::Debug for StripeCheckout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeCheckout")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

/// Form fields of a checkout session request.
///
/// # Errors
/// `InvalidPayload` if the item has no provider price.
pub fn session_params(
    user_id: &str,
    item: &CatalogItem<'_>,
    urls: &CheckoutConfig,
) -> Result<Vec<(String, String)>> {
    let price_id = item
        .price_id()
        .ok_or_else(|| Error::invalid_payload("this plan cannot be purchased"))?;
    let mode = if item.is_subscription() {
        "subscription"
    } else {
        "payment"
    };

    let mut params = vec![
        ("mode".to_string(), mode.to_string()),
        ("line_items[0][price]".to_string(), price_id.to_string()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("success_url".to_string(), urls.success_url.clone()),
        ("cancel_url".to_string(), urls.cancel_url.clone()),
        ("client_reference_id".to_string(), user_id.to_string()),
        ("metadata[userId]".to_string(), user_id.to_string()),
        ("metadata[credits]".to_string(), item.credits().to_string()),
    ];
    if let Some(plan) = item.plan() {
        params.push(("metadata[plan]".to_string(), plan.to_string()));
    }
    Ok(params)
}

impl StripeCheckout {
    /// Client against the public API.
    #[must_use]
    pub fn new(secret_key: impl Into<String>, urls: CheckoutConfig) -> Self {
        Self::with_base_url(secret_key, urls, STRIPE_API_BASE)
    }

    /// Client against another endpoint.
    #[must_use]
    pub fn with_base_url(
        secret_key: impl Into<String>,
        urls: CheckoutConfig,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            urls,
        }
    }

    /// Opens a checkout session for `item` on behalf of `user_id`.
    pub async fn create_session(&self, user_id: &str, item: &CatalogItem<'_>) -> Result<CheckoutLink> {
        let params = session_params(user_id, item, &self.urls)?;

        let response = self
            .client
            .post(format!("{}/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Payment {
                message: format!("checkout request failed: {e}"),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| Error::Payment {
            message: format!("unreadable checkout response: {e}"),
        })?;
        if !status.is_success() {
            error!(status = status.as_u16(), "Checkout session rejected: {body}");
            return Err(Error::Payment {
                message: format!("checkout provider returned {status}"),
            });
        }

        let link: CheckoutLink = serde_json::from_str(&body).map_err(|e| Error::Payment {
            message: format!("invalid checkout response: {e}"),
        })?;
        info!(user_id, session_id = %link.id, "Created checkout session");
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::settings::parse_config;
    use httpmock::{Method::POST, MockServer};
    use serde_json::json;
    use std::collections::HashMap;

    const CATALOG: &str = r#"
        [[plans]]
        id = "free"
        plan = "Free"
        monthly_credits = 20

        [[plans]]
        id = "vip"
        plan = "VIP"
        price_id = "price_vip"
        monthly_credits = 1500

        [[credit_packs]]
        id = "credits_200"
        name = "200 Credits"
        price_id = "price_200"
        credits = 200
    "#;

    #[test]
    fn test_credit_pack_params() {
        let config = parse_config(CATALOG).unwrap();
        let item = config.catalog_item("credits_200").unwrap();
        let params: HashMap<_, _> = session_params("user1", &item, &config.checkout)
            .unwrap()
            .into_iter()
            .collect();

        assert_eq!(params["mode"], "payment");
        assert_eq!(params["line_items[0][price]"], "price_200");
        assert_eq!(params["metadata[userId]"], "user1");
        assert_eq!(params["metadata[credits]"], "200");
        assert!(!params.contains_key("metadata[plan]"));
    }

    #[test]
    fn test_subscription_params_carry_plan() {
        let config = parse_config(CATALOG).unwrap();
        let item = config.catalog_item("vip").unwrap();
        let params: HashMap<_, _> = session_params("user1", &item, &config.checkout)
            .unwrap()
            .into_iter()
            .collect();

        assert_eq!(params["mode"], "subscription");
        assert_eq!(params["metadata[plan]"], "VIP");
        assert_eq!(params["client_reference_id"], "user1");
    }

    #[tokio::test]
    async fn test_create_session_returns_link() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/checkout/sessions")
                    .header("Authorization", "Bearer sk_test")
                    .x_www_form_urlencoded_tuple("metadata[userId]", "user1")
                    .x_www_form_urlencoded_tuple("metadata[credits]", "200");
                then.status(200).json_body(json!({
                    "id": "cs_test_1",
                    "url": "https://checkout.example/pay/cs_test_1",
                    "object": "checkout.session"
                }));
            })
            .await;
        let config = parse_config(CATALOG).unwrap();
        let checkout = StripeCheckout::with_base_url("sk_test", config.checkout.clone(), server.base_url());

        let item = config.catalog_item("credits_200").unwrap();
        let link = checkout.create_session("user1", &item).await.unwrap();
        assert_eq!(link.id, "cs_test_1");
        assert_eq!(link.url, "https://checkout.example/pay/cs_test_1");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_session_rejections() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/checkout/sessions");
                then.status(402).json_body(json!({ "error": { "message": "card declined" } }));
            })
            .await;
        let config = parse_config(CATALOG).unwrap();
        let item = config.catalog_item("vip").unwrap();

        let checkout = StripeCheckout::with_base_url("sk_test", config.checkout.clone(), server.base_url());
        assert!(matches!(
            checkout.create_session("user1", &item).await,
            Err(Error::Payment { .. })
        ));

        // A success status with a body that is not a session
        let garbled = MockServer::start_async().await;
        garbled
            .mock_async(|when, then| {
                when.method(POST).path("/checkout/sessions");
                then.status(200).body("<html>maintenance</html>");
            })
            .await;
        let checkout = StripeCheckout::with_base_url("sk_test", config.checkout.clone(), garbled.base_url());
        assert!(matches!(
            checkout.create_session("user1", &item).await,
            Err(Error::Payment { .. })
        ));
    }

    #[test]
    fn test_unpriced_plan_cannot_be_bought() {
        let config = parse_config(CATALOG).unwrap();
        let item = config.catalog_item("free").unwrap();
        assert!(matches!(
            session_params("user1", &item, &config.checkout),
            Err(Error::InvalidPayload { .. })
        ));
    }
}
