//! Subscriber resolution
//!
//! Turns the explicit tags and the per-phase candidate tag sets into the
//! final deduplicated subscriber list:
//!
//! - subscribers matching the explicit tags directly,
//! - per registry phase, subscribers matching that phase's candidate tags
//!   AND explicitly associated with the phase id,
//! - one non-transitive affinity pass pulling in subscribers who share a
//!   liked item with anyone already selected.
//!
//! The registry's phase count must equal the number of phase tag sets
//! supplied; a mismatch fails the whole resolution with no partial result.

use crate::db::Repository;
use crate::models::{PhaseDescriptor, Subscriber};
use crate::services::phase_registry::{PhaseRegistryClient, RegistryError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Resolution errors
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Phase registry unavailable: {0}")]
    Registry(#[from] RegistryError),

    /// Registry phase count disagrees with the supplied phase tag sets
    #[error("Phase count mismatch: {supplied} phase tag sets, registry reports {reported}")]
    PhaseCountMismatch { supplied: usize, reported: usize },

    #[error("Repository error: {0}")]
    Repository(#[from] newscast_common::Error),
}

pub struct SubscriberResolver {
    repo: Repository,
    registry: Arc<PhaseRegistryClient>,
}

impl SubscriberResolver {
    pub fn new(repo: Repository, registry: Arc<PhaseRegistryClient>) -> Self {
        Self { repo, registry }
    }

    /// Resolve the subscriber list for a classified news item.
    pub async fn resolve(
        &self,
        explicit_tags: &BTreeSet<String>,
        phase_tag_sets: &BTreeMap<i64, BTreeSet<String>>,
    ) -> Result<Vec<Subscriber>, ResolveError> {
        let phases = self.registry.fetch_phases().await?;
        self.resolve_with_phases(explicit_tags, phase_tag_sets, &phases)
            .await
    }

    /// Resolution against an already-fetched phase list.
    pub async fn resolve_with_phases(
        &self,
        explicit_tags: &BTreeSet<String>,
        phase_tag_sets: &BTreeMap<i64, BTreeSet<String>>,
        phases: &[PhaseDescriptor],
    ) -> Result<Vec<Subscriber>, ResolveError> {
        if phases.len() != phase_tag_sets.len() {
            return Err(ResolveError::PhaseCountMismatch {
                supplied: phase_tag_sets.len(),
                reported: phases.len(),
            });
        }

        // Normal subscribers: direct explicit-tag matches
        let mut selected: BTreeMap<Uuid, Subscriber> = BTreeMap::new();
        for subscriber in self.repo.find_subscribers_by_tags(explicit_tags).await? {
            selected.entry(subscriber.id).or_insert(subscriber);
        }

        // Phase-matched subscribers; phase association is a subscriber
        // property, not inferred
        for phase in phases {
            let Some(tags) = phase_tag_sets.get(&phase.id) else {
                continue;
            };
            if tags.is_empty() {
                continue;
            }
            for subscriber in self
                .repo
                .find_subscribers_by_tags_and_phase(tags, phase.id)
                .await?
            {
                selected.entry(subscriber.id).or_insert(subscriber);
            }
        }

        // Affinity propagation: one pass over a snapshot of the selected
        // likes, so a subscriber pulled in here never pulls in further
        // subscribers within the same resolution
        let selected_likes: BTreeSet<String> = selected
            .values()
            .flat_map(|s| s.likes.iter().cloned())
            .collect();

        if !selected_likes.is_empty() {
            let mut pulled = Vec::new();
            for subscriber in self.repo.find_all_subscribers().await? {
                if selected.contains_key(&subscriber.id) {
                    continue;
                }
                if subscriber.likes.iter().any(|l| selected_likes.contains(l)) {
                    tracing::debug!(
                        subscriber = %subscriber.id,
                        "Subscriber pulled in via affinity"
                    );
                    pulled.push(subscriber);
                }
            }
            for subscriber in pulled {
                selected.insert(subscriber.id, subscriber);
            }
        }

        tracing::info!(count = selected.len(), "Resolved subscribers");
        Ok(selected.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn setup_repo() -> (SqlitePool, Repository) {
        let pool = SqlitePool::connect(":memory:").await.unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        (pool.clone(), Repository::new(pool))
    }

    fn resolver(repo: Repository) -> SubscriberResolver {
        // Registry is not contacted by resolve_with_phases
        SubscriberResolver::new(
            repo,
            Arc::new(PhaseRegistryClient::new("http://127.0.0.1:1").unwrap()),
        )
    }

    fn phases(ids: &[i64]) -> Vec<PhaseDescriptor> {
        ids.iter().map(|&id| PhaseDescriptor { id, name: None }).collect()
    }

    fn tag_set(tags: &[&str]) -> BTreeSet<String> {
        tags.iter().map(|s| s.to_string()).collect()
    }

    async fn insert_subscriber(
        pool: &SqlitePool,
        tags: &[&str],
        likes: &[&str],
        phase_ids: &[i64],
    ) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO subscribers (id) VALUES (?)")
            .bind(id.to_string())
            .execute(pool)
            .await
            .unwrap();
        for tag in tags {
            sqlx::query("INSERT OR IGNORE INTO tags (value, restricted) VALUES (?, 0)")
                .bind(tag)
                .execute(pool)
                .await
                .unwrap();
            sqlx::query("INSERT INTO subscriber_tags (subscriber_id, tag_value) VALUES (?, ?)")
                .bind(id.to_string())
                .bind(tag)
                .execute(pool)
                .await
                .unwrap();
        }
        for like in likes {
            sqlx::query("INSERT INTO subscriber_likes (subscriber_id, like_id) VALUES (?, ?)")
                .bind(id.to_string())
                .bind(like)
                .execute(pool)
                .await
                .unwrap();
        }
        for phase_id in phase_ids {
            sqlx::query("INSERT INTO subscriber_phases (subscriber_id, phase_id) VALUES (?, ?)")
                .bind(id.to_string())
                .bind(phase_id)
                .execute(pool)
                .await
                .unwrap();
        }
        id
    }

    #[tokio::test]
    async fn explicit_tags_select_normal_subscribers() {
        let (pool, repo) = setup_repo().await;
        let finance_sub = insert_subscriber(&pool, &["finance"], &[], &[]).await;
        let _sports_sub = insert_subscriber(&pool, &["sports"], &[], &[]).await;

        let resolver = resolver(repo);
        let mut phase_sets = BTreeMap::new();
        phase_sets.insert(1, BTreeSet::new());
        let result = resolver
            .resolve_with_phases(&tag_set(&["finance"]), &phase_sets, &phases(&[1]))
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, finance_sub);
    }

    #[tokio::test]
    async fn phase_matches_require_subscriber_phase_association() {
        let (pool, repo) = setup_repo().await;
        let associated = insert_subscriber(&pool, &["finance"], &[], &[2]).await;
        let _unassociated = insert_subscriber(&pool, &["finance"], &[], &[]).await;

        let resolver = resolver(repo);
        let mut phase_sets = BTreeMap::new();
        phase_sets.insert(1, BTreeSet::new());
        phase_sets.insert(2, tag_set(&["finance"]));
        let result = resolver
            .resolve_with_phases(&BTreeSet::new(), &phase_sets, &phases(&[1, 2]))
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, associated);
    }

    #[tokio::test]
    async fn duplicate_matches_collapse_to_one_entry() {
        let (pool, repo) = setup_repo().await;
        // Matched by explicit tag AND by phase 1
        let id = insert_subscriber(&pool, &["finance"], &[], &[1]).await;

        let resolver = resolver(repo);
        let mut phase_sets = BTreeMap::new();
        phase_sets.insert(1, tag_set(&["finance"]));
        let result = resolver
            .resolve_with_phases(&tag_set(&["finance"]), &phase_sets, &phases(&[1]))
            .await
            .unwrap();

        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, id);
    }

    #[tokio::test]
    async fn affinity_is_single_pass_and_non_transitive() {
        let (pool, repo) = setup_repo().await;
        // A matched by explicit tag; B shares "coffee" with A; C shares
        // "hiking" only with B
        let a = insert_subscriber(&pool, &["finance"], &["coffee"], &[]).await;
        let b = insert_subscriber(&pool, &[], &["coffee", "hiking"], &[]).await;
        let c = insert_subscriber(&pool, &[], &["hiking"], &[]).await;

        let resolver = resolver(repo);
        let mut phase_sets = BTreeMap::new();
        phase_sets.insert(1, BTreeSet::new());
        let result = resolver
            .resolve_with_phases(&tag_set(&["finance"]), &phase_sets, &phases(&[1]))
            .await
            .unwrap();

        let ids: BTreeSet<Uuid> = result.iter().map(|s| s.id).collect();
        assert!(ids.contains(&a));
        assert!(ids.contains(&b), "B shares a like with selected A");
        assert!(!ids.contains(&c), "C only shares a like with pulled-in B");
    }

    #[tokio::test]
    async fn no_duplicates_regardless_of_match_source() {
        let (pool, repo) = setup_repo().await;
        // Matched explicitly, by phase, and reachable via affinity
        let id = insert_subscriber(&pool, &["finance"], &["coffee"], &[1]).await;
        let _peer = insert_subscriber(&pool, &["finance"], &["coffee"], &[]).await;

        let resolver = resolver(repo);
        let mut phase_sets = BTreeMap::new();
        phase_sets.insert(1, tag_set(&["finance"]));
        let result = resolver
            .resolve_with_phases(&tag_set(&["finance"]), &phase_sets, &phases(&[1]))
            .await
            .unwrap();

        let ids: Vec<Uuid> = result.iter().map(|s| s.id).collect();
        let unique: BTreeSet<Uuid> = ids.iter().cloned().collect();
        assert_eq!(ids.len(), unique.len());
        assert!(unique.contains(&id));
    }

    #[tokio::test]
    async fn phase_count_mismatch_returns_no_subscribers() {
        let (pool, repo) = setup_repo().await;
        insert_subscriber(&pool, &["finance"], &[], &[1]).await;

        let resolver = resolver(repo);
        let mut phase_sets = BTreeMap::new();
        phase_sets.insert(1, tag_set(&["finance"]));
        phase_sets.insert(2, BTreeSet::new());

        let err = resolver
            .resolve_with_phases(&tag_set(&["finance"]), &phase_sets, &phases(&[1]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            ResolveError::PhaseCountMismatch {
                supplied: 2,
                reported: 1
            }
        ));
    }
}
