//! Engine services: matching, resolution and delivery

pub mod completion;
pub mod delivery;
pub mod matchers;
pub mod phase_registry;
pub mod pipeline;
pub mod resolver;
pub mod scheduler;
pub mod synonyms;

pub use completion::CompletionClient;
pub use delivery::{DeliveryExecutor, DeliveryOutcome};
pub use phase_registry::PhaseRegistryClient;
pub use pipeline::{PhaseOutputs, PhasePipeline, PASS_COUNT};
pub use resolver::SubscriberResolver;
pub use scheduler::{DeliveryJob, DeliveryScheduler};
pub use synonyms::SynonymResolver;
