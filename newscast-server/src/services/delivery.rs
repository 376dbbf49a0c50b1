//! Channel delivery executor
//!
//! Performs the network call to a channel's publish endpoint and classifies
//! the outcome. Delivery is single-attempt: a non-200 status or a network
//! failure is logged as a warning and never retried.

use crate::models::{DeliveryPayload, NewsItem, Subscriber};
use newscast_common::{Error, Result};
use std::time::Duration;

/// Outcome of one delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Channel answered HTTP 200
    Delivered,
    /// Channel answered with a non-200 status
    Rejected(u16),
    /// Network error or timeout
    Failed(String),
}

pub struct DeliveryExecutor {
    client: reqwest::Client,
}

impl DeliveryExecutor {
    /// Create an executor with the given per-attempt timeout
    pub fn new(timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    /// POST the payload to `<channel_url>/publish`
    pub async fn deliver(&self, channel_url: &str, payload: &DeliveryPayload) -> DeliveryOutcome {
        let url = format!("{}/publish", channel_url.trim_end_matches('/'));
        tracing::info!(url = %url, handle = %payload.handle, "POST to channel");

        match self.client.post(&url).json(payload).send().await {
            Ok(response) if response.status().as_u16() == 200 => {
                tracing::info!(
                    handle = %payload.handle,
                    url = %url,
                    "Published message"
                );
                DeliveryOutcome::Delivered
            }
            Ok(response) => {
                let status = response.status().as_u16();
                tracing::warn!(
                    handle = %payload.handle,
                    status = status,
                    "Status code was not 200"
                );
                DeliveryOutcome::Rejected(status)
            }
            Err(e) => {
                tracing::warn!(
                    handle = %payload.handle,
                    error = %e,
                    "Delivery failed"
                );
                DeliveryOutcome::Failed(e.to_string())
            }
        }
    }

    /// Immediate synchronous delivery to every (subscriber, channel) pair.
    ///
    /// Returns the handles that were successfully reached; individual
    /// failures are logged and skipped, they never abort the fan-out.
    pub async fn deliver_now(
        &self,
        news: &NewsItem,
        subscribers: &[Subscriber],
    ) -> Vec<String> {
        let mut receivers = Vec::new();

        for subscriber in subscribers {
            for subscription in &subscriber.channel_subscriptions {
                let payload = DeliveryPayload {
                    title: news.title.clone(),
                    content: news.content.clone(),
                    handle: subscription.handle.clone(),
                };

                if self.deliver(&subscription.channel.url, &payload).await
                    == DeliveryOutcome::Delivered
                {
                    receivers.push(subscription.handle.clone());
                }
            }
        }

        receivers
    }
}
