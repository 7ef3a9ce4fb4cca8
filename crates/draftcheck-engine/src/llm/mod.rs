pub mod client;
pub mod models;
pub mod parse;
pub mod prompts;

pub use client::{ClientConfig, RemoteSuggestionClient};
pub use models::Usage;
