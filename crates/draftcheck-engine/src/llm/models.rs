use serde::Deserialize;

/// Chat model used when the config does not name one
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Chat-completion endpoint used when the config does not name one
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Response budget for every request, to keep API costs down
pub const MAX_TOKENS: u32 = 500;

/// Token usage reported by the API
#[derive(Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}
