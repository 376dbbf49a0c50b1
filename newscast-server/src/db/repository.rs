//! Subscriber / tag / channel repository
//!
//! Query surface used by the matching pipeline and the subscriber resolver.
//! Subscribers are hydrated with their tag subscriptions, channel
//! subscriptions, likes and phase associations in one place so the rest of
//! the engine only ever sees complete [`Subscriber`] values.

use crate::models::{Channel, ChannelSubscription, DeliveryWindow, Subscriber};
use chrono::NaiveTime;
use newscast_common::{Error, Result};
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::Tag;

#[derive(Clone)]
pub struct Repository {
    db: SqlitePool,
}

impl Repository {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// All tags in one restriction class
    pub async fn find_tags_by_restriction(&self, restricted: bool) -> Result<Vec<Tag>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT value FROM tags WHERE restricted = ?")
                .bind(restricted as i64)
                .fetch_all(&self.db)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(value,)| Tag { value, restricted })
            .collect())
    }

    /// Subscribers subscribed to any of the given tags
    pub async fn find_subscribers_by_tags(
        &self,
        tags: &BTreeSet<String>,
    ) -> Result<Vec<Subscriber>> {
        let mut ids = BTreeSet::new();
        for tag in tags {
            let rows: Vec<(String,)> = sqlx::query_as(
                "SELECT subscriber_id FROM subscriber_tags WHERE tag_value = ?",
            )
            .bind(tag)
            .fetch_all(&self.db)
            .await?;
            ids.extend(rows.into_iter().map(|(id,)| id));
        }

        self.load_subscribers(ids).await
    }

    /// Subscribers subscribed to any of the given tags AND explicitly
    /// associated with the given phase id
    pub async fn find_subscribers_by_tags_and_phase(
        &self,
        tags: &BTreeSet<String>,
        phase_id: i64,
    ) -> Result<Vec<Subscriber>> {
        let mut ids = BTreeSet::new();
        for tag in tags {
            let rows: Vec<(String,)> = sqlx::query_as(
                r#"
                SELECT st.subscriber_id
                FROM subscriber_tags st
                JOIN subscriber_phases sp ON sp.subscriber_id = st.subscriber_id
                WHERE st.tag_value = ? AND sp.phase_id = ?
                "#,
            )
            .bind(tag)
            .bind(phase_id)
            .fetch_all(&self.db)
            .await?;
            ids.extend(rows.into_iter().map(|(id,)| id));
        }

        self.load_subscribers(ids).await
    }

    /// Every subscriber, hydrated
    pub async fn find_all_subscribers(&self) -> Result<Vec<Subscriber>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT id FROM subscribers")
            .fetch_all(&self.db)
            .await?;

        self.load_subscribers(rows.into_iter().map(|(id,)| id).collect())
            .await
    }

    /// Idempotent channel upsert keyed by name
    pub async fn register_channel(&self, name: &str, url: &str) -> Result<Channel> {
        sqlx::query(
            r#"
            INSERT INTO channels (name, url) VALUES (?, ?)
            ON CONFLICT(name) DO UPDATE SET url = excluded.url
            "#,
        )
        .bind(name)
        .bind(url)
        .execute(&self.db)
        .await?;

        tracing::info!(name = %name, url = %url, "Registered channel");

        Ok(Channel {
            name: name.to_string(),
            url: url.to_string(),
        })
    }

    pub async fn find_channel_by_name(&self, name: &str) -> Result<Option<Channel>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT name, url FROM channels WHERE name = ?")
                .bind(name)
                .fetch_optional(&self.db)
                .await?;

        Ok(row.map(|(name, url)| Channel { name, url }))
    }

    pub async fn list_channels(&self) -> Result<Vec<Channel>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT name, url FROM channels ORDER BY name")
                .fetch_all(&self.db)
                .await?;

        Ok(rows
            .into_iter()
            .map(|(name, url)| Channel { name, url })
            .collect())
    }

    async fn load_subscribers(&self, ids: BTreeSet<String>) -> Result<Vec<Subscriber>> {
        let mut subscribers = Vec::with_capacity(ids.len());
        for id in ids {
            subscribers.push(self.load_subscriber(&id).await?);
        }
        Ok(subscribers)
    }

    async fn load_subscriber(&self, id: &str) -> Result<Subscriber> {
        let (window_start, window_end): (String, String) = sqlx::query_as(
            "SELECT window_start, window_end FROM subscribers WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| Error::NotFound(format!("subscriber {}", id)))?;

        let uuid = Uuid::parse_str(id)
            .map_err(|e| Error::Internal(format!("Invalid UUID in database: {}", e)))?;

        let tag_rows: Vec<(String,)> = sqlx::query_as(
            "SELECT tag_value FROM subscriber_tags WHERE subscriber_id = ?",
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let like_rows: Vec<(String,)> = sqlx::query_as(
            "SELECT like_id FROM subscriber_likes WHERE subscriber_id = ?",
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let phase_rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT phase_id FROM subscriber_phases WHERE subscriber_id = ?",
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        let channel_rows: Vec<(String, String, String)> = sqlx::query_as(
            r#"
            SELECT sc.channel_name, sc.handle, c.url
            FROM subscriber_channels sc
            JOIN channels c ON c.name = sc.channel_name
            WHERE sc.subscriber_id = ?
            "#,
        )
        .bind(id)
        .fetch_all(&self.db)
        .await?;

        Ok(Subscriber {
            id: uuid,
            tag_subscriptions: tag_rows.into_iter().map(|(t,)| t).collect(),
            channel_subscriptions: channel_rows
                .into_iter()
                .map(|(name, handle, url)| ChannelSubscription {
                    handle,
                    channel: Channel { name, url },
                })
                .collect(),
            window: DeliveryWindow {
                start: parse_window_time(&window_start)?,
                end: parse_window_time(&window_end)?,
            },
            likes: like_rows.into_iter().map(|(l,)| l).collect(),
            phases: phase_rows.into_iter().map(|(p,)| p).collect(),
        })
    }
}

fn parse_window_time(text: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(text, "%H:%M")
        .map_err(|e| Error::Internal(format!("Invalid window time '{}': {}", text, e)))
}
