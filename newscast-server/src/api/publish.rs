//! News publishing endpoints
//!
//! `POST /publish` classifies the news, resolves subscribers and registers
//! windowed delivery jobs; it acknowledges once the jobs are registered.
//! `POST /publish/now` is the immediate variant: it delivers synchronously
//! and returns the handles that were reached.
//!
//! Both variants also emit an `Announcement` on the event bus for
//! consumers outside the HTTP channel model.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use chrono::Utc;
use newscast_common::events::NewscastEvent;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::models::{NewsItem, Subscriber};
use crate::services::pipeline::PipelineError;
use crate::services::resolver::ResolveError;
use crate::AppState;

const ANNOUNCE_TOPIC: &str = "newscast.announce";

#[derive(Debug, Serialize)]
pub struct ScheduledResponse {
    pub scheduled: usize,
}

#[derive(Debug, Serialize)]
pub struct ReceiversResponse {
    pub receivers: Vec<String>,
}

/// POST /publish — deferred, windowed delivery
pub async fn publish_news(
    State(state): State<AppState>,
    Json(news): Json<NewsItem>,
) -> ApiResult<Json<ScheduledResponse>> {
    validate(&news)?;

    let subscribers = classify_and_resolve(&state, &news).await?;
    let scheduled = state.scheduler.schedule_news(&news, &subscribers);

    announce(&state, &news, &subscribers);
    state.event_bus.publish(NewscastEvent::DeliveriesScheduled {
        title: news.title.clone(),
        jobs: scheduled,
        timestamp: Utc::now(),
    });

    Ok(Json(ScheduledResponse { scheduled }))
}

/// POST /publish/now — immediate synchronous delivery
pub async fn publish_news_now(
    State(state): State<AppState>,
    Json(news): Json<NewsItem>,
) -> ApiResult<Json<ReceiversResponse>> {
    validate(&news)?;

    let subscribers = classify_and_resolve(&state, &news).await?;
    let receivers = state.executor.deliver_now(&news, &subscribers).await;

    announce(&state, &news, &subscribers);

    Ok(Json(ReceiversResponse { receivers }))
}

async fn classify_and_resolve(
    state: &AppState,
    news: &NewsItem,
) -> ApiResult<Vec<Subscriber>> {
    let outputs = state
        .pipeline
        .classify(news)
        .await
        .map_err(|e: PipelineError| ApiError::Internal(e.to_string()))?;

    state
        .resolver
        .resolve(&news.explicit_tags(), &outputs.by_phase)
        .await
        .map_err(|e: ResolveError| ApiError::Internal(e.to_string()))
}

fn validate(news: &NewsItem) -> ApiResult<()> {
    if news.title.trim().is_empty() {
        return Err(ApiError::BadRequest("title is required".to_string()));
    }
    if news.content.trim().is_empty() {
        return Err(ApiError::BadRequest("content is required".to_string()));
    }
    Ok(())
}

fn announce(state: &AppState, news: &NewsItem, subscribers: &[Subscriber]) {
    let usernames: Vec<String> = subscribers
        .iter()
        .flat_map(|s| s.channel_subscriptions.iter().map(|c| c.handle.clone()))
        .collect();

    state.event_bus.publish(NewscastEvent::Announcement {
        topic: ANNOUNCE_TOPIC.to_string(),
        usernames,
        title: news.title.clone(),
        content: news.content.clone(),
        timestamp: Utc::now(),
    });
}

/// Build publish routes
pub fn publish_routes() -> Router<AppState> {
    Router::new()
        .route("/publish", post(publish_news))
        .route("/publish/now", post(publish_news_now))
}
