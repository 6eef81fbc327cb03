//! Payment bridge - checkout sessions out, signed webhooks in.

/// Checkout session creation
pub mod checkout;
/// Webhook signature verification
pub mod signature;
/// Webhook event handling
pub mod webhook;

pub use checkout::{CheckoutLink, StripeCheckout};
pub use webhook::{WebhookReceipt, handle_webhook};
