//! Community feed endpoints.
//!
//! `GET /api/feed/events` is a server-sent-events stream of [`FeedChange`]s;
//! clients reload the feed when one arrives.

use crate::{
    api::{AppState, AuthUser},
    core::feed::{self, FeedChange, NewSharedDesign},
    errors::Result,
};
use actix_web::{HttpResponse, delete, get, http::header, post, web};
use futures::Stream;
use serde::Deserialize;
use std::convert::Infallible;
use tokio::sync::broadcast::{Receiver, error::RecvError};

const DEFAULT_FEED_LIMIT: u64 = 50;

#[derive(Debug, Deserialize)]
struct FeedQuery {
    limit: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ReactionRequest {
    emoji: String,
}

fn sse_frame(change: &FeedChange) -> web::Bytes {
    let data = serde_json::to_string(change).unwrap_or_else(|_| r#"{"type":"resync"}"#.to_string());
    web::Bytes::from(format!("event: feed\ndata: {data}\n\n"))
}

/// Feed changes as SSE frames until the notifier goes away.
///
/// A subscriber that falls behind gets a single `resync` instead of the
/// changes it missed.
pub fn change_stream(
    receiver: Receiver<FeedChange>,
) -> impl Stream<Item = std::result::Result<web::Bytes, Infallible>> {
    futures::stream::unfold(receiver, |mut receiver| async move {
        let change = match receiver.recv().await {
            Ok(change) => change,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "Feed subscriber lagged, asking for resync");
                FeedChange::Resync
            }
            Err(RecvError::Closed) => return None,
        };
        Some((Ok(sse_frame(&change)), receiver))
    })
}

/// GET /api/feed?limit=
#[get("/feed")]
async fn list_feed(
    viewer: Option<AuthUser>,
    state: web::Data<AppState>,
    query: web::Query<FeedQuery>,
) -> Result<HttpResponse> {
    let limit = query.limit.unwrap_or(DEFAULT_FEED_LIMIT);
    let items = feed::list_feed(
        &state.db,
        viewer.as_ref().map(|user| user.user_id.as_str()),
        Some(limit),
    )
    .await?;
    Ok(HttpResponse::Ok().json(items))
}

/// POST /api/feed
#[post("/feed")]
async fn share(
    user: AuthUser,
    state: web::Data<AppState>,
    body: web::Json<NewSharedDesign>,
) -> Result<HttpResponse> {
    let design = feed::share_design(&state.db, &state.notifier, &user.user_id, &body).await?;
    Ok(HttpResponse::Created().json(design))
}

/// DELETE /api/feed/{id}
#[delete("/feed/{id}")]
async fn unshare(
    user: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    feed::unshare_design(&state.db, &state.notifier, &user.user_id, &path).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// GET /api/feed/events
#[get("/feed/events")]
async fn events(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(change_stream(state.notifier.subscribe()))
}

/// POST /api/feed/{id}/like - toggles the caller's like
#[post("/feed/{id}/like")]
async fn like(
    user: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let like = feed::toggle_like(&state.db, &state.notifier, &user.user_id, &path).await?;
    Ok(HttpResponse::Ok().json(like))
}

/// GET /api/feed/{id}/reactions
#[get("/feed/{id}/reactions")]
async fn reactions(state: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse> {
    feed::get_design(&state.db, &path).await?;
    let counts = feed::reactions_for(&state.db, &path).await?;
    Ok(HttpResponse::Ok().json(counts))
}

/// POST /api/feed/{id}/reactions
#[post("/feed/{id}/reactions")]
async fn react(
    _user: AuthUser,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<ReactionRequest>,
) -> Result<HttpResponse> {
    let count = feed::react(&state.db, &state.notifier, &path, &body.emoji).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "emoji": body.emoji.trim(), "count": count })))
}

/// Registers the routes of this module.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(events)
        .service(list_feed)
        .service(share)
        .service(unshare)
        .service(like)
        .service(reactions)
        .service(react);
}
