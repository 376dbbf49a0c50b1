//! newscast-server library interface
//!
//! Exposes the tag-matching and fan-out engine plus the HTTP surface for
//! integration testing.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use newscast_common::config::Config;
use newscast_common::events::EventBus;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

use crate::db::Repository;
use crate::services::{
    CompletionClient, DeliveryExecutor, DeliveryScheduler, PhasePipeline, PhaseRegistryClient,
    SubscriberResolver, SynonymResolver,
};

const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub repo: Repository,
    pub event_bus: EventBus,
    pub pipeline: Arc<PhasePipeline>,
    pub resolver: Arc<SubscriberResolver>,
    pub scheduler: Arc<DeliveryScheduler>,
    pub executor: Arc<DeliveryExecutor>,
    /// Client for channel health checks during registration
    pub http: reqwest::Client,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the engine from configuration and an open database pool
    pub fn new(config: &Config, db: SqlitePool, event_bus: EventBus) -> anyhow::Result<Self> {
        let repo = Repository::new(db);

        let synonyms = Arc::new(SynonymResolver::new(
            &config.synonym_url,
            config.synonym_rate_per_sec,
            config.synonym_concurrency,
        )?);
        let registry = Arc::new(PhaseRegistryClient::new(&config.registry_url)?);
        let completion = Arc::new(CompletionClient::new(config.completion.clone())?);

        let pipeline = Arc::new(PhasePipeline::new(
            repo.clone(),
            synonyms,
            registry.clone(),
            completion,
        ));
        let resolver = Arc::new(SubscriberResolver::new(repo.clone(), registry));

        let executor = Arc::new(DeliveryExecutor::new(config.delivery_timeout_secs)?);
        let scheduler = Arc::new(DeliveryScheduler::new(executor.clone()));

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HEALTH_CHECK_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            repo,
            event_bus,
            pipeline,
            resolver,
            scheduler,
            executor,
            http,
            startup_time: Utc::now(),
        })
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health_routes())
        .nest(
            "/api/v1",
            api::publish_routes().merge(api::channel_routes()),
        )
        .with_state(state)
}
