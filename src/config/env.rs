//! Secrets loaded from environment variables.
//!
//! API keys and signing secrets never live in `config.toml`; they are read
//! from the process environment (optionally populated from `.env`).

use crate::errors::{Error, Result};
use std::env::VarError;

/// Credentials for the external collaborators
#[derive(Clone)]
pub struct Secrets {
    /// Key for the image generation service
    pub gemini_api_key: String,
    /// Secret key for creating checkout sessions
    pub stripe_secret_key: String,
    /// Webhook signing secret; unsigned webhooks are accepted only when unset
    pub stripe_webhook_secret: Option<String>,
    /// HS256 secret the auth provider signs session tokens with
    pub auth_jwt_secret: String,
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("stripe_webhook_secret", &self.stripe_webhook_secret.is_some())
            .finish_non_exhaustive()
    }
}

impl Secrets {
    /// Reads secrets from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads secrets through `lookup`, treating blank values as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| {
                tracing::error!("{key} is not set");
                Error::EnvVar(VarError::NotPresent)
            })
        };

        Ok(Self {
            gemini_api_key: require("GEMINI_API_KEY")?,
            stripe_secret_key: require("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: get("STRIPE_WEBHOOK_SECRET"),
            auth_jwt_secret: require("AUTH_JWT_SECRET")?,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_loads_all_secrets() {
        let secrets = Secrets::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "g"),
            ("STRIPE_SECRET_KEY", "sk_test"),
            ("STRIPE_WEBHOOK_SECRET", "whsec"),
            ("AUTH_JWT_SECRET", "jwt"),
        ]))
        .unwrap();
        assert_eq!(secrets.gemini_api_key, "g");
        assert_eq!(secrets.stripe_webhook_secret.as_deref(), Some("whsec"));
    }

    #[test]
    fn test_webhook_secret_is_optional_and_blank_means_unset() {
        let secrets = Secrets::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "g"),
            ("STRIPE_SECRET_KEY", "sk_test"),
            ("STRIPE_WEBHOOK_SECRET", "  "),
            ("AUTH_JWT_SECRET", "jwt"),
        ]))
        .unwrap();
        assert!(secrets.stripe_webhook_secret.is_none());
    }

    #[test]
    fn test_missing_required_secret_fails() {
        let result = Secrets::from_lookup(lookup_from(&[("GEMINI_API_KEY", "g")]));
        assert!(matches!(result, Err(Error::EnvVar(VarError::NotPresent))));
    }

    #[test]
    fn test_debug_hides_values() {
        let secrets = Secrets::from_lookup(lookup_from(&[
            ("GEMINI_API_KEY", "very-secret"),
            ("STRIPE_SECRET_KEY", "sk_test"),
            ("AUTH_JWT_SECRET", "jwt"),
        ]))
        .unwrap();
        assert!(!format!("{secrets:?}").contains("very-secret"));
    }
}
