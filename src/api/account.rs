use crate::{
    api::{AppState, AuthUser},
    config::settings::{CreditPackConfig, FeatureCosts, PlanConfig},
    core::entitlement::{self, Balance},
    errors::Result,
};
use actix_web::{HttpResponse, get, post, web};
use serde::Serialize;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    user_id: String,
    /// First sign-in created the account
    created: bool,
    balance: Balance,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CatalogResponse<'a> {
    plans: &'a [PlanConfig],
    credit_packs: &'a [CreditPackConfig],
    costs: &'a FeatureCosts,
}

/// GET /health
#[get("/health")]
pub async fn health() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": "ok" }))
}

/// POST /api/session - called after sign-in; opens the account on first use
#[post("/session")]
pub async fn start_session(user: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let created = entitlement::ensure_account(&state.db, &user.user_id).await?;
    let balance = entitlement::get_balance(&state.db, &user.user_id).await?;
    Ok(HttpResponse::Ok().json(SessionResponse {
        user_id: user.user_id,
        created,
        balance,
    }))
}

/// GET /api/credits
#[get("/credits")]
pub async fn credits(user: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let balance = entitlement::balance_or_default(&state.db, &user.user_id).await?;
    Ok(HttpResponse::Ok().json(balance))
}

/// GET /api/transactions
#[get("/transactions")]
pub async fn transactions(user: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let history = entitlement::list_transactions(&state.db, &user.user_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

/// GET /api/catalog - plans, credit packs and feature prices
#[get("/catalog")]
pub async fn catalog(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(CatalogResponse {
        plans: &state.config.plans,
        credit_packs: &state.config.credit_packs,
        costs: &state.config.costs,
    })
}

/// Registers the routes of this module.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(start_session)
        .service(credits)
        .service(transactions)
        .service(catalog);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::api::{configure, test_support::*};
    use crate::test_utils::FakeGateway;
    use actix_web::{App, http::StatusCode, test, web};
    use serde_json::Value;

    #[actix_web::test]
    async fn test_requests_without_token_are_rejected() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/credits").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

        let req = test::TestRequest::get()
            .uri("/api/credits")
            .insert_header(("Authorization", "Bearer garbage"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    }

    #[actix_web::test]
    async fn test_first_session_opens_free_account() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/session")
            .insert_header(bearer("user1"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["created"], true);
        assert_eq!(body["balance"]["credits"], 0);
        assert_eq!(body["balance"]["plan"], "Free");

        let req = test::TestRequest::post()
            .uri("/api/session")
            .insert_header(bearer("user1"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["created"], false);
    }

    #[actix_web::test]
    async fn test_health_and_catalog_are_public() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/health").to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get().uri("/api/catalog").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["plans"].as_array().unwrap().len(), 4);
        assert_eq!(body["costs"]["room_redesign"], 2);
    }
}
