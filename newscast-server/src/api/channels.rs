//! Channel listing and registration
//!
//! Registration health-checks the channel's endpoint before upserting it;
//! a channel that does not answer `GET <url>/health` with 200 is refused.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::models::Channel;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ChannelBody {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelResponse {
    pub channel: Channel,
}

#[derive(Debug, Serialize)]
pub struct ChannelsResponse {
    pub channels: Vec<Channel>,
}

/// GET /channels
pub async fn list_channels(State(state): State<AppState>) -> ApiResult<Json<ChannelsResponse>> {
    let channels = state.repo.list_channels().await?;
    Ok(Json(ChannelsResponse { channels }))
}

/// POST /channels
///
/// Health-checks the channel, then upserts it by name. Returns 201 with
/// the channel on success, 400 on any failure.
pub async fn register_channel(
    State(state): State<AppState>,
    Json(body): Json<ChannelBody>,
) -> ApiResult<(StatusCode, Json<ChannelResponse>)> {
    if body.name.is_empty() || body.url.is_empty() {
        return Err(ApiError::BadRequest("name and url are required".to_string()));
    }

    let health_url = format!("{}/health", body.url.trim_end_matches('/'));
    let healthy = match state.http.get(&health_url).send().await {
        Ok(response) => response.status().is_success(),
        Err(e) => {
            tracing::error!(name = %body.name, error = %e, "Channel health check failed");
            false
        }
    };

    if !healthy {
        return Err(ApiError::BadRequest(
            "Failed to register channel".to_string(),
        ));
    }

    let channel = state.repo.register_channel(&body.name, &body.url).await?;
    Ok((StatusCode::CREATED, Json(ChannelResponse { channel })))
}

/// Build channel routes
pub fn channel_routes() -> Router<AppState> {
    Router::new().route("/channels", get(list_channels).post(register_channel))
}
