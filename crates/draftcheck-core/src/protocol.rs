use crate::error::AnalysisError;
use crate::suggest::{CategoryToggles, Statistics, Suggestion};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Flags deciding whether a pass may go remote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnalysisMode {
    pub offline: bool,
    pub rate_limited: bool,
}

impl AnalysisMode {
    pub fn online() -> Self {
        Self::default()
    }

    pub fn offline() -> Self {
        Self {
            offline: true,
            rate_limited: false,
        }
    }
}

/// What one analysis pass hands to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalysisOutcome {
    /// De-duplicated and sorted by position in the analysed text
    pub suggestions: Vec<Suggestion>,
    pub statistics: Statistics,
    pub used_local: bool,
    /// Set whenever the local path ran instead of the API
    pub fallback: Option<AnalysisError>,
}

impl AnalysisOutcome {
    pub fn new(
        suggestions: Vec<Suggestion>,
        used_local: bool,
        fallback: Option<AnalysisError>,
    ) -> Self {
        let statistics = Statistics::from_suggestions(&suggestions);
        Self {
            suggestions,
            statistics,
            used_local,
            fallback,
        }
    }
}

/// Compact status shown next to an editable surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    RateLimited,
    Offline,
    Clean,
    Pending(usize),
}

impl Status {
    pub fn resolve(rate_limited: bool, offline: bool, active: usize) -> Self {
        if rate_limited {
            Status::RateLimited
        } else if offline {
            Status::Offline
        } else if active == 0 {
            Status::Clean
        } else {
            Status::Pending(active)
        }
    }

    pub fn label(&self) -> String {
        match self {
            Status::RateLimited => "Rate limited".to_string(),
            Status::Offline => "Offline mode".to_string(),
            Status::Clean => "Looking good!".to_string(),
            Status::Pending(1) => "1 suggestion".to_string(),
            Status::Pending(n) => format!("{} suggestions", n),
        }
    }
}

/// Messages other surfaces (popup, background) send to an editing surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum SurfaceRequest {
    GetStatistics,
    SetOfflineMode { value: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SurfaceResponse {
    Statistics { statistics: Statistics },
    Ack { success: bool },
}

/// Persisted settings the engine reads but does not own
pub trait SettingsStore: Send + Sync {
    /// `None` (or an empty key) means "unset"
    fn api_key(&self) -> Option<String>;
    fn offline_mode(&self) -> bool;
    fn set_offline_mode(&self, value: bool) -> Result<()>;
    fn suggestion_settings(&self) -> CategoryToggles;
}
