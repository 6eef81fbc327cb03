//! Payment webhook handling.
//!
//! Deliveries are at-least-once: the same event may arrive several times, and
//! in any order relative to the browser session that started checkout. Crediting
//! is idempotent per checkout session (see
//! [`entitlement::apply_payment_confirmation`]), so a retried delivery is
//! acknowledged without crediting twice. Any internal failure is returned as an
//! error so the HTTP layer answers 5xx and the provider retries.

use super::signature::verify_signature;
use crate::{
    core::{
        entitlement::{self, Balance, PaymentConfirmation, PaymentOutcome},
        plan::Plan,
    },
    errors::{Error, Result},
};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Paid checkout
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
/// Delayed payment method failed
pub const ASYNC_PAYMENT_FAILED: &str = "checkout.session.async_payment_failed";

/// Outer shape of a provider event
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    /// Provider event id
    #[serde(default)]
    pub id: Option<String>,
    /// Event type, e.g. `checkout.session.completed`
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event body
    pub data: EventData,
}

/// The object an event is about
#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    /// Raw object; its shape depends on the event type
    pub object: serde_json::Value,
}

/// The checkout session fields the bridge reads
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    /// Checkout session id, the idempotency key
    pub id: String,
    /// Fallback user id set when the session was created
    #[serde(default)]
    pub client_reference_id: Option<String>,
    /// Amount charged in the smallest currency unit
    #[serde(default)]
    pub amount_total: Option<i64>,
    /// String metadata attached at checkout creation
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl CheckoutSession {
    /// `userId` metadata, else the client reference id.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.metadata_value("userId").or_else(|| {
            self.client_reference_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
        })
    }

    fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    }

    /// Credits bought; absent means zero.
    pub fn credits(&self) -> Result<i64> {
        let credits = self.metadata_value("credits").map_or(Ok(0), |raw| {
            raw.parse::<i64>()
                .map_err(|_| Error::invalid_payload(format!("credits '{raw}' is not a number")))
        })?;
        if credits < 0 {
            return Err(Error::invalid_payload("credits must not be negative"));
        }
        Ok(credits)
    }

    /// Plan bought, for subscriptions.
    pub fn plan(&self) -> Result<Option<Plan>> {
        self.metadata_value("plan").map(str::parse).transpose()
    }
}

/// What an event asks the ledger to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookAction {
    /// Credit a paid session
    Confirm(PaymentConfirmation),
    /// Record a failed session
    RecordFailure {
        /// Checkout session id
        session_id: String,
        /// Account the session belonged to
        user_id: String,
        /// Amount that failed to charge
        amount_cents: i64,
    },
    /// Acknowledge and do nothing
    Ignore {
        /// Why nothing is done
        reason: String,
    },
}

/// Result reported back to the provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WebhookReceipt {
    /// The account was credited
    Credited {
        /// Balance after crediting
        balance: Balance,
    },
    /// The session had been applied before
    AlreadyApplied,
    /// The failure was recorded
    FailureRecorded,
    /// The event needed no action
    Ignored,
}

/// Parses a raw event body.
pub fn parse_event(body: &[u8]) -> Result<WebhookEvent> {
    serde_json::from_slice(body).map_err(|e| Error::invalid_payload(format!("malformed event: {e}")))
}

fn session_of(event: &WebhookEvent) -> Result<CheckoutSession> {
    serde_json::from_value(event.data.object.clone())
        .map_err(|e| Error::invalid_payload(format!("malformed checkout session: {e}")))
}

/// Decides what an event means for the ledger.
///
/// # Errors
/// `InvalidPayload` when a completed checkout has no user id or unreadable
/// credits or plan.
pub fn interpret(event: &WebhookEvent) -> Result<WebhookAction> {
    match event.event_type.as_str() {
        CHECKOUT_COMPLETED => {
            let session = session_of(event)?;
            let user_id = session
                .user_id()
                .ok_or_else(|| Error::invalid_payload("No user ID in checkout session"))?;
            Ok(WebhookAction::Confirm(PaymentConfirmation {
                user_id: user_id.to_string(),
                credits: session.credits()?,
                plan: session.plan()?,
                amount_cents: session.amount_total.unwrap_or(0),
                session_id: session.id,
            }))
        }
        ASYNC_PAYMENT_FAILED => {
            let session = session_of(event)?;
            Ok(match session.user_id() {
                Some(user_id) => WebhookAction::RecordFailure {
                    user_id: user_id.to_string(),
                    amount_cents: session.amount_total.unwrap_or(0),
                    session_id: session.id,
                },
                None => WebhookAction::Ignore {
                    reason: "failed session without user".to_string(),
                },
            })
        }
        other => Ok(WebhookAction::Ignore {
            reason: format!("unhandled event type {other}"),
        }),
    }
}

/// Carries out `action` against the ledger.
pub async fn execute(db: &DatabaseConnection, action: WebhookAction) -> Result<WebhookReceipt> {
    match action {
        WebhookAction::Confirm(confirmation) => {
            match entitlement::apply_payment_confirmation(db, &confirmation).await? {
                PaymentOutcome::Credited(balance) => Ok(WebhookReceipt::Credited { balance }),
                PaymentOutcome::AlreadyApplied => Ok(WebhookReceipt::AlreadyApplied),
            }
        }
        WebhookAction::RecordFailure {
            session_id,
            user_id,
            amount_cents,
        } => {
            entitlement::record_failed_payment(db, &session_id, &user_id, amount_cents).await?;
            Ok(WebhookReceipt::FailureRecorded)
        }
        WebhookAction::Ignore { reason } => {
            info!("Webhook acknowledged without action: {reason}");
            Ok(WebhookReceipt::Ignored)
        }
    }
}

/// Verifies, parses and applies one delivery.
///
/// With a configured `secret` the signature header is mandatory. Without one,
/// unsigned deliveries are accepted.
#[instrument(skip_all)]
pub async fn handle_webhook(
    db: &DatabaseConnection,
    secret: Option<&str>,
    body: &[u8],
    signature: Option<&str>,
    now: i64,
) -> Result<WebhookReceipt> {
    match secret {
        Some(secret) => {
            let header = signature.ok_or_else(|| Error::InvalidSignature {
                message: "missing signature header".to_string(),
            })?;
            if !verify_signature(body, header, secret, now)? {
                return Err(Error::InvalidSignature {
                    message: "signature does not match".to_string(),
                });
            }
        }
        None => warn!("No webhook secret configured, accepting unsigned delivery"),
    }

    let event = parse_event(body)?;
    info!(event_id = ?event.id, event_type = %event.event_type, "Webhook event received");
    let action = interpret(&event)?;
    execute(db, action).await
}
