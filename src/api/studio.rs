//! Studio endpoints. Images travel as `data:` URLs in both directions.
//!
//! Paid flows answer 200 with `{"status": "completed", "result": ..}` or
//! `{"status": "purchase_required", "result": {"cost", "balance"}}`.

use crate::{
    api::{AppState, AuthUser},
    core::studio::FloorPlanSource,
    errors::{Error, Result},
    gateway::ImagePart,
};
use actix_web::{HttpResponse, get, post, web};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FloorPlanRequest {
    sketch: Option<String>,
    prompt: Option<String>,
}

impl FloorPlanRequest {
    fn into_source(self) -> Result<FloorPlanSource> {
        match (self.sketch, self.prompt) {
            (Some(sketch), _) => Ok(FloorPlanSource::Sketch {
                image: ImagePart::from_data_url(&sketch)?,
            }),
            (None, Some(prompt)) => Ok(FloorPlanSource::Text { prompt }),
            (None, None) => Err(Error::invalid_payload("send a sketch or a prompt")),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoomsRequest {
    floor_plan: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RedesignRequest {
    floor_plan: String,
    rooms: Vec<String>,
    style: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductsRequest {
    room_id: String,
    image: String,
}

#[derive(Debug, Deserialize)]
struct PaletteRequest {
    image: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HouseRequest {
    room_name: String,
    image: String,
}

/// POST /api/studio/floor-plans
#[post("/floor-plans")]
async fn floor_plans(
    user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<FloorPlanRequest>,
) -> Result<HttpResponse> {
    let source = body.into_inner().into_source()?;
    let outcome = state
        .studio
        .generate_floor_plans(&user.user_id, &source)
        .await?
        .map(|plans| plans.iter().map(ImagePart::to_data_url).collect::<Vec<_>>());
    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /api/studio/rooms
#[post("/rooms")]
async fn rooms(
    _user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<RoomsRequest>,
) -> Result<HttpResponse> {
    let floor_plan = ImagePart::from_data_url(&body.floor_plan)?;
    let rooms = state.studio.extract_rooms(&floor_plan).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "rooms": rooms })))
}

/// POST /api/studio/redesign
#[post("/redesign")]
async fn redesign(
    user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<RedesignRequest>,
) -> Result<HttpResponse> {
    let floor_plan = ImagePart::from_data_url(&body.floor_plan)?;
    let outcome = state
        .studio
        .redesign_rooms(&user.user_id, &floor_plan, &body.rooms, &body.style)
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /api/studio/products
#[post("/products")]
async fn products(
    user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<ProductsRequest>,
) -> Result<HttpResponse> {
    let image = ImagePart::from_data_url(&body.image)?;
    let outcome = state
        .studio
        .find_products(&user.user_id, &body.room_id, &image)
        .await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /api/studio/palette
#[post("/palette")]
async fn palette(
    user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<PaletteRequest>,
) -> Result<HttpResponse> {
    let image = ImagePart::from_data_url(&body.image)?;
    let outcome = state.studio.color_palette(&user.user_id, &image).await?;
    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /api/studio/house
#[post("/house")]
async fn house(
    user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<HouseRequest>,
) -> Result<HttpResponse> {
    let image = ImagePart::from_data_url(&body.image)?;
    let outcome = state
        .studio
        .house_exterior(&user.user_id, &body.room_name, &image)
        .await?
        .map(|house| house.to_data_url());
    Ok(HttpResponse::Ok().json(outcome))
}

/// POST /api/studio/share-link
#[post("/share-link")]
async fn share_link(user: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let link = state.studio.create_share_link(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(link))
}

/// GET /api/studio/projection
#[get("/projection")]
async fn projection(user: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let view = state.studio.projection(&user.user_id).await?;
    Ok(HttpResponse::Ok().json(view))
}

/// Registers the routes of this module.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/studio")
            .service(floor_plans)
            .service(rooms)
            .service(redesign)
            .service(products)
            .service(palette)
            .service(house)
            .service(share_link)
            .service(projection),
    );
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::api::{configure, test_support::*};
    use crate::core::{entitlement::get_balance, plan::Plan};
    use crate::test_utils::{FakeGateway, create_test_account, sample_image};
    use actix_web::{App, http::StatusCode, test, web};
    use serde_json::{Value, json};

    #[actix_web::test]
    async fn test_empty_balance_gets_purchase_prompt() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        create_test_account(&state.db, "user1", 0, Plan::Free).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/studio/palette")
            .insert_header(bearer("user1"))
            .set_json(json!({ "image": sample_image().to_data_url() }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "purchase_required");
        assert_eq!(body["result"]["cost"], 1);
        assert_eq!(body["result"]["balance"], 0);
    }

    #[actix_web::test]
    async fn test_redesign_returns_rooms_and_debits() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        let db = state.db.clone();
        create_test_account(&db, "user1", 5, Plan::Free).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/studio/redesign")
            .insert_header(bearer("user1"))
            .set_json(json!({
                "floorPlan": sample_image().to_data_url(),
                "rooms": ["Kitchen"],
                "style": "Japandi",
            }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["status"], "completed");
        assert_eq!(body["result"]["rooms"][0]["roomName"], "Kitchen (Japandi)");
        assert_eq!(get_balance(&db, "user1").await.unwrap().credits, 3);
    }

    #[actix_web::test]
    async fn test_bad_image_is_rejected() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/studio/rooms")
            .insert_header(bearer("user1"))
            .set_json(json!({ "floorPlan": "https://example.com/plan.png" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_free_plan_cannot_share() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        create_test_account(&state.db, "user1", 10, Plan::Free).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/studio/share-link")
            .insert_header(bearer("user1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    }
}
