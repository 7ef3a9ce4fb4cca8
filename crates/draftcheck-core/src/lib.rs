//! Core domain model and contracts for draftcheck.
//!
//! Everything here is synchronous and free of I/O: suggestion types, the
//! local heuristic scanner, the request budget, and the text patcher.

pub mod error;
pub mod patch;
pub mod protocol;
pub mod rate_limit;
pub mod suggest;

pub use error::{Affordance, AnalysisError, RateLimitOrigin};
pub use patch::{PatchOutcome, TextPatcher};
pub use protocol::*;
pub use rate_limit::{RateLimitConfig, RateLimiter, RateLimiterState, SharedRateLimiter};
pub use suggest::{CategoryToggles, Statistics, Suggestion, SuggestionType};
