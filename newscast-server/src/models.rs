//! Domain types for the tag-matching and fan-out engine

use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// A classification tag
///
/// `restricted` marks organizational-scope tags; restricted and public tags
/// form disjoint pools and are never mixed within a single matcher call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub value: String,
    pub restricted: bool,
}

/// The tag universe a matcher searches against
///
/// Either a flat pool of canonical tags, or a synonym map produced by the
/// synonym resolver. Matchers operating on a synonym map always emit the
/// canonical tag, never the synonym that matched.
#[derive(Debug, Clone)]
pub enum TagUniverse {
    Flat(BTreeSet<String>),
    WithSynonyms(BTreeMap<String, Vec<String>>),
}

impl TagUniverse {
    /// Iterate (canonical tag, candidate terms) pairs.
    ///
    /// For a flat universe the single candidate term is the tag itself; for
    /// a synonym map the candidates are the tag's synonyms in order.
    pub fn candidates(&self) -> Vec<(&str, Vec<&str>)> {
        match self {
            TagUniverse::Flat(tags) => tags
                .iter()
                .map(|t| (t.as_str(), vec![t.as_str()]))
                .collect(),
            TagUniverse::WithSynonyms(map) => map
                .iter()
                .map(|(tag, syns)| (tag.as_str(), syns.iter().map(|s| s.as_str()).collect()))
                .collect(),
        }
    }

    /// Canonical tags in this universe
    pub fn tags(&self) -> Vec<&str> {
        match self {
            TagUniverse::Flat(tags) => tags.iter().map(|t| t.as_str()).collect(),
            TagUniverse::WithSynonyms(map) => map.keys().map(|t| t.as_str()).collect(),
        }
    }
}

/// One classification phase as declared by the external phase registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseDescriptor {
    pub id: i64,
    /// Human-readable phase name (informational)
    #[serde(default)]
    pub name: Option<String>,
}

/// A subscriber's preferred time-of-day delivery range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

/// A subscriber's registration on one channel, with the per-channel
/// delivery handle (display identifier, distinct from account identity)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSubscription {
    pub handle: String,
    pub channel: Channel,
}

/// A registered delivery channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub name: String,
    pub url: String,
}

/// A subscriber account
///
/// Identity is the id; deduplication throughout resolution compares ids
/// only, so equality is defined over the id alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: Uuid,
    pub tag_subscriptions: BTreeSet<String>,
    pub channel_subscriptions: Vec<ChannelSubscription>,
    pub window: DeliveryWindow,
    /// Opaque liked-item ids driving affinity propagation
    pub likes: BTreeSet<String>,
    /// Phase ids this subscriber is explicitly associated with
    pub phases: BTreeSet<i64>,
}

impl PartialEq for Subscriber {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Subscriber {}

/// The content item being classified and distributed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsItem {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub creator_id: String,
    pub creation_date: DateTime<Utc>,
}

impl NewsItem {
    /// Explicit tags, lower-cased and deduplicated
    pub fn explicit_tags(&self) -> BTreeSet<String> {
        self.tags.iter().map(|t| t.to_lowercase()).collect()
    }
}

/// JSON body POSTed to a channel's publish endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryPayload {
    pub title: String,
    pub content: String,
    pub handle: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subscriber(id: Uuid, likes: &[&str]) -> Subscriber {
        Subscriber {
            id,
            tag_subscriptions: BTreeSet::new(),
            channel_subscriptions: vec![],
            window: DeliveryWindow {
                start: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
                end: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            },
            likes: likes.iter().map(|s| s.to_string()).collect(),
            phases: BTreeSet::new(),
        }
    }

    #[test]
    fn subscriber_equality_is_by_id_only() {
        let id = Uuid::new_v4();
        let a = subscriber(id, &["coffee"]);
        let b = subscriber(id, &["tea"]);
        assert_eq!(a, b);
        assert_ne!(a, subscriber(Uuid::new_v4(), &["coffee"]));
    }

    #[test]
    fn explicit_tags_are_lowercased_and_deduplicated() {
        let news = NewsItem {
            title: "t".to_string(),
            content: "c".to_string(),
            tags: vec!["Finance".to_string(), "finance".to_string(), "Sports".to_string()],
            creator_id: "u1".to_string(),
            creation_date: Utc::now(),
        };
        let tags = news.explicit_tags();
        assert_eq!(tags.len(), 2);
        assert!(tags.contains("finance"));
        assert!(tags.contains("sports"));
    }

    #[test]
    fn flat_universe_candidates_are_the_tags_themselves() {
        let universe = TagUniverse::Flat(
            ["finance", "sports"].iter().map(|s| s.to_string()).collect(),
        );
        let candidates = universe.candidates();
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0], ("finance", vec!["finance"]));
    }

    #[test]
    fn synonym_universe_candidates_keep_canonical_tag() {
        let mut map = BTreeMap::new();
        map.insert(
            "car".to_string(),
            vec!["auto".to_string(), "vehicle".to_string()],
        );
        let universe = TagUniverse::WithSynonyms(map);
        let candidates = universe.candidates();
        assert_eq!(candidates, vec![("car", vec!["auto", "vehicle"])]);
    }
}
