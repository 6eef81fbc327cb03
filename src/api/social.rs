use crate::{
    api::{AppState, AuthUser},
    core::{
        product_links,
        social::{self, NewFavorite},
    },
    errors::Result,
};
use actix_web::{HttpResponse, delete, get, post, put, web};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LinkQuery {
    room_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveLinkRequest {
    room_id: String,
    product_name: String,
    custom_url: String,
}

/// GET /api/favorites
#[get("/favorites")]
async fn list_favorites(user: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse> {
    let favorites = social::list_favorites(&state.db, &user.user_id).await?;
    Ok(HttpResponse::Ok().json(favorites))
}

/// POST /api/favorites
#[post("/favorites")]
async fn add_favorite(
    user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<NewFavorite>,
) -> Result<HttpResponse> {
    let added = social::add_favorite(&state.db, &user.user_id, &body).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "favorite": true, "added": added })))
}

/// POST /api/favorites/toggle - the heart button
#[post("/favorites/toggle")]
async fn toggle_favorite(
    user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<NewFavorite>,
) -> Result<HttpResponse> {
    let favorite = social::toggle_favorite(&state.db, &user.user_id, &body).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "favorite": favorite })))
}

/// DELETE /api/favorites/{room_id}
#[delete("/favorites/{room_id}")]
async fn remove_favorite(
    user: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let removed = social::remove_favorite(&state.db, &user.user_id, &path).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "favorite": false, "removed": removed })))
}

/// GET /api/product-links?roomId=
#[get("/product-links")]
async fn list_links(
    user: AuthUser,
    state: web::Data<AppState>,
    query: web::Query<LinkQuery>,
) -> Result<HttpResponse> {
    let links = product_links::list_links(&state.db, &user.user_id, query.room_id.as_deref()).await?;
    Ok(HttpResponse::Ok().json(links))
}

/// PUT /api/product-links
#[put("/product-links")]
async fn save_link(
    user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<SaveLinkRequest>,
) -> Result<HttpResponse> {
    let link = product_links::save_link(
        &state.db,
        &user.user_id,
        &body.room_id,
        &body.product_name,
        &body.custom_url,
    )
    .await?;
    Ok(HttpResponse::Ok().json(link))
}

/// Registers the routes of this module.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(list_favorites)
        .service(add_favorite)
        .service(toggle_favorite)
        .service(remove_favorite)
        .service(list_links)
        .service(save_link);
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use crate::api::{configure, test_support::*};
    use crate::test_utils::FakeGateway;
    use actix_web::{App, http::StatusCode, test, web};
    use serde_json::{Value, json};

    #[actix_web::test]
    async fn test_favorite_toggle_and_delete() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;
        let room = json!({ "roomId": "r1", "roomName": "Den (Boho)", "imageUrl": "data:image/png;base64,AA==" });

        let req = test::TestRequest::post()
            .uri("/api/favorites/toggle")
            .insert_header(bearer("user1"))
            .set_json(&room)
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["favorite"], true);

        let req = test::TestRequest::get()
            .uri("/api/favorites")
            .insert_header(bearer("user1"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body.as_array().unwrap().len(), 1);

        let req = test::TestRequest::delete()
            .uri("/api/favorites/r1")
            .insert_header(bearer("user1"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["removed"], true);
    }

    #[actix_web::test]
    async fn test_product_link_validation() {
        let state = test_state(FakeGateway::default()).await.unwrap();
        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(state))
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::put()
            .uri("/api/product-links")
            .insert_header(bearer("user1"))
            .set_json(json!({ "roomId": "r1", "productName": "Sofa", "customUrl": "ftp://x" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let req = test::TestRequest::put()
            .uri("/api/product-links")
            .insert_header(bearer("user1"))
            .set_json(json!({ "roomId": "r1", "productName": "Sofa", "customUrl": "https://shop.example/sofa" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

        let req = test::TestRequest::get()
            .uri("/api/product-links?roomId=r1")
            .insert_header(bearer("user1"))
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body[0]["custom_url"], "https://shop.example/sofa");
    }
}
