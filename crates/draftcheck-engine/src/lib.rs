//! Suggestion orchestration for draftcheck: the remote client, the
//! local/remote decision, and per-surface scheduling.

pub mod engine;
pub mod llm;
pub mod schedule;

pub use engine::{
    ApplyAllOutcome, BackendFuture, EngineConfig, SuggestionBackend, SuggestionEngine,
};
pub use llm::client::{ClientConfig, RemoteSuggestionClient};
pub use schedule::{Scheduler, SurfaceEvent, SurfaceId};
