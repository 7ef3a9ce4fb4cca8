use thiserror::Error;

/// Who decided that remote calls must stop for now
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitOrigin {
    /// The local per-minute budget is spent (or the limiter is tripped)
    Budget,
    /// The API answered 429 on every attempt
    Server,
}

/// Why a remote analysis did not produce suggestions
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    #[error("No API key configured. Run 'draftcheck setup' to add one.")]
    MissingApiKey,
    #[error("Offline mode is on; using basic checks only.")]
    Offline,
    #[error("{}", rate_limit_message(*origin))]
    RateLimited { origin: RateLimitOrigin },
    #[error("Unable to reach the API: {0}")]
    Network(String),
    #[error("API error {status}")]
    Api { status: u16 },
    #[error("Failed to parse the API response: {0}")]
    MalformedResponse(String),
}

fn rate_limit_message(origin: RateLimitOrigin) -> &'static str {
    match origin {
        RateLimitOrigin::Budget => {
            "Too many requests in a short period. Using basic checks until the budget resets."
        }
        RateLimitOrigin::Server => "API rate limited. Using basic checks for now.",
    }
}

/// What the presentation layer should offer after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affordance {
    /// Nothing to show beyond the local results
    None,
    /// Offer a retry button or a switch to offline mode
    RetryOrGoOffline,
    /// Point the user at the settings page
    ConfigureApiKey,
}

impl AnalysisError {
    pub fn affordance(&self) -> Affordance {
        match self {
            AnalysisError::MissingApiKey => Affordance::ConfigureApiKey,
            AnalysisError::RateLimited { .. }
            | AnalysisError::Network(_)
            | AnalysisError::Api { .. } => Affordance::RetryOrGoOffline,
            AnalysisError::Offline | AnalysisError::MalformedResponse(_) => Affordance::None,
        }
    }

    /// Only a 429 from the API itself trips the rate limiter.
    pub fn is_server_rate_limit(&self) -> bool {
        matches!(
            self,
            AnalysisError::RateLimited {
                origin: RateLimitOrigin::Server
            }
        )
    }

    pub fn is_transient(&self) -> bool {
        self.affordance() == Affordance::RetryOrGoOffline
    }
}
