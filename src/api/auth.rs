//! Session token verification.
//!
//! The auth provider issues HS256 tokens whose `sub` claim is the user id.
//! Handlers take an [`AuthUser`] argument to require one.

use crate::{
    api::AppState,
    errors::{Error, Result},
};
use actix_web::{FromRequest, HttpRequest, dev::Payload, http::header, web};
use futures::future::{Ready, ready};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// Claims read from a session token
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Expiry, unix seconds
    pub exp: usize,
}

/// Key and rules for validating session tokens
#[derive(Clone)]
pub struct AuthKeys {
    decoding: DecodingKey,
    validation: Validation,
}

impl AuthKeys {
    /// Validates HS256 tokens signed with `secret`. When an audience is
    /// configured, `aud` must be present and match it.
    #[must_use]
    pub fn new(secret: &str, audience: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        match audience {
            Some(audience) => {
                validation.set_audience(&[audience]);
                validation.set_required_spec_claims(&["exp", "aud"]);
            }
            None => validation.validate_aud = false,
        }
        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// The user id carried by `token`.
    pub fn verify(&self, token: &str) -> Result<String> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            tracing::debug!("Rejected session token: {e}");
            Error::NotAuthenticated
        })?;
        if data.claims.sub.trim().is_empty() {
            return Err(Error::NotAuthenticated);
        }
        Ok(data.claims.sub)
    }
}

/// The signed-in user of a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    /// Stable user id from the auth provider
    pub user_id: String,
}

fn authenticate(req: &HttpRequest) -> Result<AuthUser> {
    let state = req.app_data::<web::Data<AppState>>().ok_or_else(|| Error::Config {
        message: "application state is not registered".to_string(),
    })?;
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(Error::NotAuthenticated)?;

    let user_id = state.auth.verify(token)?;
    Ok(AuthUser { user_id })
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req))
    }
}

/// Signs a token for `user_id` valid for an hour.
#[cfg(test)]
pub fn issue_token(secret: &str, user_id: &str) -> String {
    #![allow(clippy::expect_used)]
    use jsonwebtoken::{EncodingKey, Header, encode};

    let exp = usize::try_from(chrono::Utc::now().timestamp() + 3600).expect("time after epoch");
    let claims = Claims {
        sub: user_id.to_string(),
        exp,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .expect("HS256 signing")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_verify_round_trip() {
        let keys = AuthKeys::new("jwt-secret", None);
        let token = issue_token("jwt-secret", "user-42");
        assert_eq!(keys.verify(&token).unwrap(), "user-42");
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let keys = AuthKeys::new("jwt-secret", None);
        let token = issue_token("other-secret", "user-42");
        assert!(matches!(keys.verify(&token), Err(Error::NotAuthenticated)));
        assert!(matches!(keys.verify("not.a.token"), Err(Error::NotAuthenticated)));
    }

    #[test]
    fn test_audience_is_checked_when_configured() {
        // The test token carries no `aud` claim
        let keys = AuthKeys::new("jwt-secret", Some("plantaia"));
        let token = issue_token("jwt-secret", "user-42");
        assert!(matches!(keys.verify(&token), Err(Error::NotAuthenticated)));
    }

    #[test]
    fn test_matching_audience_is_accepted() {
        use jsonwebtoken::{EncodingKey, Header, encode};

        let exp = chrono::Utc::now().timestamp() + 3600;
        let sign = |aud: &str| {
            encode(
                &Header::new(Algorithm::HS256),
                &serde_json::json!({ "sub": "user-42", "exp": exp, "aud": aud }),
                &EncodingKey::from_secret(b"jwt-secret"),
            )
            .unwrap()
        };
        let keys = AuthKeys::new("jwt-secret", Some("plantaia"));
        assert_eq!(keys.verify(&sign("plantaia")).unwrap(), "user-42");
        assert!(keys.verify(&sign("someone-else")).is_err());
    }
}
