use crate::{
    api::{AppState, AuthUser},
    errors::{Error, Result},
    payment::handle_webhook,
};
use actix_web::{HttpRequest, HttpResponse, post, web};
use serde::Deserialize;

const SIGNATURE_HEADER: &str = "Stripe-Signature";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckoutRequest {
    item_id: String,
}

/// POST /api/checkout - starts paying for a credit pack or plan
#[post("/checkout")]
async fn checkout(
    user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<CheckoutRequest>,
) -> Result<HttpResponse> {
    let item = state
        .config
        .catalog_item(&body.item_id)
        .ok_or_else(|| Error::NotFound {
            entity: "catalog item",
            key: body.item_id.clone(),
        })?;
    let link = state.checkout.create_session(&user.user_id, &item).await?;
    Ok(HttpResponse::Ok().json(link))
}

/// POST /webhooks/stripe
///
/// Reads the raw body so the signature is checked over the exact bytes sent.
#[post("/webhooks/stripe")]
pub async fn stripe_webhook(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let signature = req
        .headers()
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let receipt = handle_webhook(
        &state.db,
        state.webhook_secret.as_deref(),
        &body,
        signature,
        chrono::Utc::now().timestamp(),
    )
    .await?;
    Ok(HttpResponse::Ok().json(receipt))
}

/// Registers the routes of this module.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(checkout);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::api::{configure, test_support::*};
    use crate::core::{entitlement::get_balance, plan::Plan};
    use crate::payment::signature::sign_payload;
    use crate::test_utils::{FakeGateway, create_test_account};
    use actix_web::{App, http::StatusCode, test, web};
    use serde_json::{Value, json};

    fn completed_event(session_id: &str, user_id: &str, credits: i64) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": session_id,
                "amount_total": 999,
                "metadata": { "userId": user_id, "credits": credits.to_string(), "plan": "Pro" }
            }}
        }))
        .unwrap()
    }

    fn signed(body: &[u8]) -> (&'static str, String) {
        (
            "Stripe-Signature",
            sign_payload(body, WEBHOOK_SECRET, chrono::Utc::now().timestamp()),
        )
    }

    #[actix_web::test]
    async fn test_signed_webhook_credits_once() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        let db = state.db.clone();
        create_test_account(&db, "user1", 3, Plan::Free).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;
        let body = completed_event("cs_1", "user1", 100);

        let req = test::TestRequest::post()
            .uri("/webhooks/stripe")
            .insert_header(signed(&body))
            .set_payload(body.clone())
            .to_request();
        let receipt: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt["outcome"], "credited");
        assert_eq!(receipt["balance"]["credits"], 103);

        // Redelivery of the same session
        let req = test::TestRequest::post()
            .uri("/webhooks/stripe")
            .insert_header(signed(&body))
            .set_payload(body)
            .to_request();
        let receipt: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(receipt["outcome"], "already_applied");

        let balance = get_balance(&db, "user1").await.unwrap();
        assert_eq!(balance.credits, 103);
        assert_eq!(balance.plan, Plan::Pro);
    }

    #[actix_web::test]
    async fn test_bad_or_missing_signature_is_rejected() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        let db = state.db.clone();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;
        let body = completed_event("cs_2", "user1", 100);

        let req = test::TestRequest::post()
            .uri("/webhooks/stripe")
            .insert_header(("Stripe-Signature", "t=1,v1=00"))
            .set_payload(body.clone())
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::post()
            .uri("/webhooks/stripe")
            .set_payload(body)
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);

        assert!(get_balance(&db, "user1").await.is_err());
    }

    #[actix_web::test]
    async fn test_checkout_unknown_item_is_not_found() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/checkout")
            .insert_header(bearer("user1"))
            .set_json(json!({ "itemId": "credits_9000" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);

        // Free has no price, so it cannot be bought
        let req = test::TestRequest::post()
            .uri("/api/checkout")
            .insert_header(bearer("user1"))
            .set_json(json!({ "itemId": "free" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::BAD_REQUEST);
    }
}
