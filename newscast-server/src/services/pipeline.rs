//! Multi-phase tag classification pipeline
//!
//! Runs the text matchers over progressively different tag universes, one
//! pass per registry-declared phase, in strict numeric order:
//!
//! 1. Fuzzy match over public tags (loose threshold)
//! 2. Fuzzy match over synonyms of public tags (tight)
//! 3. Fuzzy match over restricted tags (tight)
//! 4. Fuzzy match over synonyms of restricted tags (tight)
//! 5. Distance match over public tags
//! 6. Distance match over synonyms of public tags
//! 7. Model-based match over public tags
//!
//! Restricted and public pools are never mixed within a single pass. Each
//! pass output is keyed by the registry phase id; the flattened union is
//! computed for diagnostics only, since subscriber resolution operates on
//! the phase-scoped sets.

use crate::db::Repository;
use crate::models::{NewsItem, TagUniverse};
use crate::services::completion::CompletionClient;
use crate::services::matchers::{distance_match, fuzzy_match};
use crate::services::phase_registry::{PhaseRegistryClient, RegistryError};
use crate::services::synonyms::SynonymResolver;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;

/// Number of matcher passes this pipeline implements. The external phase
/// registry must report exactly this many phases for a request to proceed.
pub const PASS_COUNT: usize = 7;

const FUZZY_LOOSE: f64 = 0.4;
const FUZZY_TIGHT: f64 = 0.2;
const DISTANCE_THRESHOLD: usize = 2;

/// Pipeline errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Phase registry unavailable: {0}")]
    Registry(#[from] RegistryError),

    /// The registry disagrees with the number of implemented passes.
    /// Fatal for the request; never degraded to a partial result.
    #[error("Phase count mismatch: pipeline implements {implemented}, registry reports {reported}")]
    PhaseCountMismatch { implemented: usize, reported: usize },

    #[error("Repository error: {0}")]
    Repository(#[from] newscast_common::Error),
}

/// Candidate tag sets keyed by registry phase id
#[derive(Debug, Clone, Default)]
pub struct PhaseOutputs {
    pub by_phase: BTreeMap<i64, BTreeSet<String>>,
}

pub struct PhasePipeline {
    repo: Repository,
    synonyms: Arc<SynonymResolver>,
    registry: Arc<PhaseRegistryClient>,
    completion: Arc<CompletionClient>,
}

impl PhasePipeline {
    pub fn new(
        repo: Repository,
        synonyms: Arc<SynonymResolver>,
        registry: Arc<PhaseRegistryClient>,
        completion: Arc<CompletionClient>,
    ) -> Self {
        Self {
            repo,
            synonyms,
            registry,
            completion,
        }
    }

    /// Classify a news item, producing one candidate tag set per phase.
    pub async fn classify(&self, news: &NewsItem) -> Result<PhaseOutputs, PipelineError> {
        let phases = self.registry.fetch_phases().await?;
        if phases.len() != PASS_COUNT {
            return Err(PipelineError::PhaseCountMismatch {
                implemented: PASS_COUNT,
                reported: phases.len(),
            });
        }

        let title = news.title.to_lowercase();
        let content = news.content.to_lowercase();

        let public: BTreeSet<String> = self
            .repo
            .find_tags_by_restriction(false)
            .await?
            .into_iter()
            .map(|t| t.value.to_lowercase())
            .collect();
        let restricted: BTreeSet<String> = self
            .repo
            .find_tags_by_restriction(true)
            .await?
            .into_iter()
            .map(|t| t.value.to_lowercase())
            .collect();

        let public_flat = TagUniverse::Flat(public.clone());
        let restricted_flat = TagUniverse::Flat(restricted.clone());

        // Pass 1: fuzzy over public tags, loose
        let pass1 = fuzzy_match(&title, &content, &public_flat, FUZZY_LOOSE);

        // Pass 2: fuzzy over public synonyms, tight
        let public_synonyms = self.synonyms.resolve_all(public.iter().cloned()).await;
        let public_syn_universe = TagUniverse::WithSynonyms(public_synonyms);
        let pass2 = fuzzy_match(&title, &content, &public_syn_universe, FUZZY_TIGHT);

        // Pass 3: fuzzy over restricted tags, tight
        let pass3 = fuzzy_match(&title, &content, &restricted_flat, FUZZY_TIGHT);

        // Pass 4: fuzzy over restricted synonyms, tight. A failed synonym
        // batch degrades to empty lists inside resolve_all, so this pass
        // collapses to an empty set rather than aborting the pipeline.
        let restricted_synonyms = self.synonyms.resolve_all(restricted.iter().cloned()).await;
        let pass4 = fuzzy_match(
            &title,
            &content,
            &TagUniverse::WithSynonyms(restricted_synonyms),
            FUZZY_TIGHT,
        );

        // Pass 5: distance over public tags
        let pass5 = distance_match(&title, &content, &public_flat, DISTANCE_THRESHOLD);

        // Pass 6: distance over public synonyms
        let pass6 = distance_match(&title, &content, &public_syn_universe, DISTANCE_THRESHOLD);

        // Pass 7: model-based over public tags. Best-effort: a failing
        // completion service degrades this pass to empty.
        let pass7 = match self.completion.select_tags(&title, &content, &public_flat).await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::warn!(error = %e, "Model-based pass failed, using empty set");
                Vec::new()
            }
        };

        let passes = [pass1, pass2, pass3, pass4, pass5, pass6, pass7];
        let by_phase: BTreeMap<i64, BTreeSet<String>> = phases
            .iter()
            .zip(passes)
            .map(|(phase, pass)| {
                (
                    phase.id,
                    pass.into_iter().map(|t| t.to_lowercase()).collect(),
                )
            })
            .collect();

        // Flattened union, for diagnostics only
        let mut all_tags = news.explicit_tags();
        for tags in by_phase.values() {
            all_tags.extend(tags.iter().cloned());
        }
        tracing::info!(
            title = %news.title,
            tags = ?all_tags,
            "Classified news item"
        );

        Ok(PhaseOutputs { by_phase })
    }
}
