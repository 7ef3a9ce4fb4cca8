//! The local/remote decision for one editable surface
//!
//! `SuggestionEngine` owns the active suggestion set of its surface and reads
//! the process-wide rate limiter. Every remote failure ends in a local
//! fallback; the engine never surfaces a remote error as a fault.

use crate::llm::ClientConfig;
use draftcheck_core::suggest::local;
use draftcheck_core::{
    patch, AnalysisError, AnalysisMode, AnalysisOutcome, CategoryToggles, PatchOutcome,
    RateLimitConfig, RateLimitOrigin, RateLimiter, SettingsStore, SharedRateLimiter, Statistics,
    Status, Suggestion, SuggestionType, SurfaceRequest, SurfaceResponse, TextPatcher,
};
use futures::future::BoxFuture;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Future returned by a suggestion backend
pub type BackendFuture<'a, T> = BoxFuture<'a, Result<T, AnalysisError>>;

/// Anything that can answer analysis and rewrite requests remotely.
///
/// Implementations classify their own failures; the engine decides what to do
/// with them.
pub trait SuggestionBackend: Send + Sync {
    fn analyze<'a>(
        &'a self,
        text: &'a str,
        api_key: &'a str,
    ) -> BackendFuture<'a, Vec<Suggestion>>;

    fn improve<'a>(
        &'a self,
        text: &'a str,
        tone: &'a str,
        api_key: &'a str,
    ) -> BackendFuture<'a, String>;
}

pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(2_000);
pub const DEFAULT_MIN_TEXT_LEN: usize = 20;
pub const NETWORK_OFFLINE_COOLDOWN: Duration = Duration::from_millis(60_000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub rate_limit: RateLimitConfig,
    pub client: ClientConfig,
    /// Trip the shared limiter when the local budget refuses a call
    pub trip_on_budget_exhausted: bool,
    /// Treat the surface as offline for this long after a network failure
    pub network_offline_cooldown: Option<Duration>,
    pub debounce: Duration,
    /// Texts shorter than this many characters are never analysed
    pub min_text_len: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::in_page()
    }
}

impl EngineConfig {
    /// Tuning for an editable field inside a page.
    pub fn in_page() -> Self {
        Self {
            rate_limit: RateLimitConfig::default(),
            client: ClientConfig::default(),
            trip_on_budget_exhausted: true,
            network_offline_cooldown: Some(NETWORK_OFFLINE_COOLDOWN),
            debounce: DEFAULT_DEBOUNCE,
            min_text_len: DEFAULT_MIN_TEXT_LEN,
        }
    }

    /// Tuning for the popup, where the user asks for analysis explicitly.
    pub fn popup() -> Self {
        Self {
            trip_on_budget_exhausted: false,
            network_offline_cooldown: None,
            ..Self::in_page()
        }
    }
}

/// Result of applying every active suggestion in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyAllOutcome {
    pub text: String,
    pub applied: usize,
    pub stale: usize,
}

#[derive(Debug, Default)]
struct EngineState {
    suggestions: Vec<Suggestion>,
    offline_until: Option<Instant>,
    /// Sequence number of the most recently issued analysis
    issued: u64,
}

pub struct SuggestionEngine {
    backend: Arc<dyn SuggestionBackend>,
    store: Arc<dyn SettingsStore>,
    limiter: SharedRateLimiter,
    config: EngineConfig,
    state: Mutex<EngineState>,
}

impl SuggestionEngine {
    /// Engine with a limiter of its own.
    pub fn new(
        backend: Arc<dyn SuggestionBackend>,
        store: Arc<dyn SettingsStore>,
        config: EngineConfig,
    ) -> Self {
        let limiter = RateLimiter::shared(config.rate_limit);
        Self::with_shared_limiter(backend, store, limiter, config)
    }

    /// Engine drawing on a limiter shared with other surfaces.
    pub fn with_shared_limiter(
        backend: Arc<dyn SuggestionBackend>,
        store: Arc<dyn SettingsStore>,
        limiter: SharedRateLimiter,
        config: EngineConfig,
    ) -> Self {
        Self {
            backend,
            store,
            limiter,
            config,
            state: Mutex::new(EngineState::default()),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn limiter(&self) -> SharedRateLimiter {
        Arc::clone(&self.limiter)
    }

    /// Analyse `text` and replace the active suggestion set.
    ///
    /// Returns `None` without touching any state when the text is too short,
    /// and `None` when a newer analysis was issued while this one ran.
    pub async fn analyze(&self, text: &str, mode: AnalysisMode) -> Option<AnalysisOutcome> {
        if text.chars().count() < self.config.min_text_len {
            return None;
        }

        let seq = {
            let mut state = self.lock_state();
            state.issued += 1;
            state.issued
        };

        let (suggestions, used_local, fallback) = self.run_analysis(text, mode).await;
        let toggles = self.store.suggestion_settings();
        let suggestions = normalize(text, suggestions, &toggles);

        let mut state = self.lock_state();
        if state.issued != seq {
            tracing::debug!(seq, latest = state.issued, "discarding superseded analysis");
            return None;
        }
        state.suggestions = suggestions.clone();
        drop(state);

        Some(AnalysisOutcome::new(suggestions, used_local, fallback))
    }

    async fn run_analysis(
        &self,
        text: &str,
        mode: AnalysisMode,
    ) -> (Vec<Suggestion>, bool, Option<AnalysisError>) {
        let now = Instant::now();
        let current = self.mode_at(now);

        if mode.offline || current.offline {
            return local_fallback(text, AnalysisError::Offline);
        }
        if mode.rate_limited || current.rate_limited {
            return local_fallback(text, budget_exhausted());
        }

        let Some(api_key) = self.api_key() else {
            return local_fallback(text, AnalysisError::MissingApiKey);
        };

        if !self.acquire(now) {
            return local_fallback(text, budget_exhausted());
        }

        match self.backend.analyze(text, &api_key).await {
            Ok(suggestions) => {
                tracing::debug!(count = suggestions.len(), "remote analysis succeeded");
                (suggestions, false, None)
            }
            Err(err) => {
                self.record_failure(&err);
                local_fallback(text, err)
            }
        }
    }

    /// Rewrite `text` in the given tone. Remote only.
    pub async fn improve(&self, text: &str, tone: &str) -> Result<String, AnalysisError> {
        let now = Instant::now();
        let current = self.mode_at(now);
        if current.offline {
            return Err(AnalysisError::Offline);
        }
        if current.rate_limited {
            return Err(budget_exhausted());
        }
        let api_key = self.api_key().ok_or(AnalysisError::MissingApiKey)?;
        if !self.acquire(now) {
            return Err(budget_exhausted());
        }

        self.backend
            .improve(text, tone, &api_key)
            .await
            .inspect_err(|err| self.record_failure(err))
    }

    /// Offline and rate-limit flags as they stand right now.
    pub fn current_mode(&self) -> AnalysisMode {
        self.mode_at(Instant::now())
    }

    pub fn suggestions(&self) -> Vec<Suggestion> {
        self.lock_state().suggestions.clone()
    }

    pub fn statistics(&self) -> Statistics {
        Statistics::from_suggestions(&self.lock_state().suggestions)
    }

    pub fn status(&self) -> Status {
        let mode = self.current_mode();
        let active = self.lock_state().suggestions.len();
        Status::resolve(mode.rate_limited, mode.offline, active)
    }

    /// Apply one accepted suggestion and drop it from the active set, whether
    /// or not its target was still present.
    pub fn apply(&self, text: &str, suggestion: &Suggestion) -> PatchOutcome {
        let outcome = patch::apply_once(text, suggestion);
        self.remove_first(suggestion);
        outcome
    }

    /// Apply every active suggestion left to right and clear the set.
    ///
    /// The n-th suggestion sharing a target is placed at the n-th occurrence of
    /// that target, so edits lying between two copies are not skipped.
    pub fn apply_all(&self, text: &str) -> ApplyAllOutcome {
        let suggestions = std::mem::take(&mut self.lock_state().suggestions);
        let mut nth: HashMap<&str, usize> = HashMap::new();
        let mut edits: Vec<(usize, &Suggestion)> = suggestions
            .iter()
            .filter(|s| !s.is_informational())
            .map(|s| {
                let copy = nth.entry(s.original.as_str()).or_insert(0);
                let offset = patch::target_offsets(text, &s.original)
                    .get(*copy)
                    .copied()
                    .unwrap_or(usize::MAX);
                *copy += 1;
                (offset, s)
            })
            .collect();
        edits.sort_by_key(|(offset, _)| *offset);

        let mut patcher = TextPatcher::new();
        let mut current = text.to_string();
        let mut applied = 0;
        for (_, suggestion) in &edits {
            let outcome = patcher.apply(&current, suggestion);
            if outcome.applied {
                applied += 1;
                current = outcome.text;
            }
        }
        ApplyAllOutcome {
            text: current,
            applied,
            stale: edits.len() - applied,
        }
    }

    /// Drop a suggestion without applying it.
    pub fn dismiss(&self, suggestion: &Suggestion) -> bool {
        self.remove_first(suggestion)
    }

    pub fn clear(&self) {
        self.lock_state().suggestions.clear();
    }

    pub fn set_offline_mode(&self, value: bool) -> anyhow::Result<()> {
        self.store.set_offline_mode(value)?;
        if !value {
            self.lock_state().offline_until = None;
        }
        tracing::info!(offline = value, "offline mode changed");
        Ok(())
    }

    /// Answer a message from another surface.
    pub fn handle_request(&self, request: SurfaceRequest) -> SurfaceResponse {
        match request {
            SurfaceRequest::GetStatistics => SurfaceResponse::Statistics {
                statistics: self.statistics(),
            },
            SurfaceRequest::SetOfflineMode { value } => match self.set_offline_mode(value) {
                Ok(()) => SurfaceResponse::Ack { success: true },
                Err(err) => {
                    tracing::warn!(error = %err, "failed to persist offline mode");
                    SurfaceResponse::Ack { success: false }
                }
            },
        }
    }

    fn mode_at(&self, now: Instant) -> AnalysisMode {
        let window_offline = self
            .lock_state()
            .offline_until
            .is_some_and(|until| now < until);
        let rate_limited = self.lock_limiter().is_limited(now);
        AnalysisMode {
            offline: window_offline || self.store.offline_mode(),
            rate_limited,
        }
    }

    fn api_key(&self) -> Option<String> {
        self.store
            .api_key()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
    }

    fn acquire(&self, now: Instant) -> bool {
        let mut limiter = self.lock_limiter();
        if limiter.try_acquire(now) {
            return true;
        }
        if self.config.trip_on_budget_exhausted {
            limiter.trip(now);
        }
        false
    }

    fn record_failure(&self, err: &AnalysisError) {
        let now = Instant::now();
        if err.is_server_rate_limit() {
            self.lock_limiter().trip(now);
        }
        if let (AnalysisError::Network(_), Some(cooldown)) =
            (err, self.config.network_offline_cooldown)
        {
            self.lock_state().offline_until = Some(now + cooldown);
            tracing::info!(
                cooldown_ms = cooldown.as_millis() as u64,
                "network unreachable; using local checks"
            );
        }
        match err {
            AnalysisError::MalformedResponse(reason) => {
                tracing::debug!(reason = %reason, "malformed API response; using local checks");
            }
            other => tracing::warn!(error = %other, "remote analysis failed; using local checks"),
        }
    }

    fn remove_first(&self, suggestion: &Suggestion) -> bool {
        let mut state = self.lock_state();
        match state.suggestions.iter().position(|s| s == suggestion) {
            Some(idx) => {
                state.suggestions.remove(idx);
                true
            }
            None => false,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_limiter(&self) -> MutexGuard<'_, RateLimiter> {
        self.limiter.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn budget_exhausted() -> AnalysisError {
    AnalysisError::RateLimited {
        origin: RateLimitOrigin::Budget,
    }
}

fn local_fallback(
    text: &str,
    reason: AnalysisError,
) -> (Vec<Suggestion>, bool, Option<AnalysisError>) {
    (local::scan(text), true, Some(reason))
}

/// Filter by category, drop targets missing from `text`, collapse duplicate
/// reports, and order by first occurrence.
fn normalize(
    text: &str,
    suggestions: Vec<Suggestion>,
    toggles: &CategoryToggles,
) -> Vec<Suggestion> {
    let mut seen: HashMap<(SuggestionType, String, String), usize> = HashMap::new();
    let mut kept: Vec<(usize, Suggestion)> = Vec::with_capacity(suggestions.len());

    for suggestion in suggestions {
        if !toggles.allows(suggestion.kind) {
            continue;
        }
        let offsets = patch::target_offsets(text, &suggestion.original);
        let Some(&offset) = offsets.first() else {
            continue;
        };
        let key = (
            suggestion.kind,
            suggestion.original.clone(),
            suggestion.replacement.clone(),
        );
        let copies = seen.entry(key).or_insert(0);
        if *copies >= offsets.len() {
            continue;
        }
        *copies += 1;
        kept.push((offset, suggestion));
    }

    kept.sort_by_key(|(offset, _)| *offset);
    kept.into_iter().map(|(_, suggestion)| suggestion).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use futures::FutureExt;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    /// Scripted backend that counts calls
    #[derive(Default)]
    pub(crate) struct FakeBackend {
        pub calls: AtomicUsize,
        pub responses: Mutex<VecDeque<Result<Vec<Suggestion>, AnalysisError>>>,
        pub delays: Mutex<VecDeque<Duration>>,
    }

    impl FakeBackend {
        pub fn with_responses(
            responses: impl IntoIterator<Item = Result<Vec<Suggestion>, AnalysisError>>,
        ) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().collect()),
                ..Self::default()
            }
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl SuggestionBackend for FakeBackend {
        fn analyze<'a>(
            &'a self,
            _text: &'a str,
            _api_key: &'a str,
        ) -> BackendFuture<'a, Vec<Suggestion>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let response = self
                .responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(Vec::new()));
            let delay = self.delays.lock().unwrap().pop_front();
            async move {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                response
            }
            .boxed()
        }

        fn improve<'a>(
            &'a self,
            text: &'a str,
            tone: &'a str,
            _api_key: &'a str,
        ) -> BackendFuture<'a, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(format!("{} ({})", text, tone)) }.boxed()
        }
    }

    pub(crate) struct MemoryStore {
        pub key: Option<String>,
        pub offline: AtomicBool,
        pub toggles: Mutex<CategoryToggles>,
    }

    impl MemoryStore {
        pub fn with_key(key: &str) -> Self {
            Self {
                key: Some(key.to_string()),
                offline: AtomicBool::new(false),
                toggles: Mutex::new(CategoryToggles::default()),
            }
        }
    }

    impl SettingsStore for MemoryStore {
        fn api_key(&self) -> Option<String> {
            self.key.clone()
        }

        fn offline_mode(&self) -> bool {
            self.offline.load(Ordering::SeqCst)
        }

        fn set_offline_mode(&self, value: bool) -> anyhow::Result<()> {
            self.offline.store(value, Ordering::SeqCst);
            Ok(())
        }

        fn suggestion_settings(&self) -> CategoryToggles {
            *self.toggles.lock().unwrap()
        }
    }

    const DRAFT: &str = "This is a apple and their going too fast.  Okay";

    fn engine_with(
        backend: Arc<FakeBackend>,
        store: Arc<MemoryStore>,
        config: EngineConfig,
    ) -> SuggestionEngine {
        SuggestionEngine::new(backend, store, config)
    }

    fn grammar(original: &str, replacement: &str) -> Suggestion {
        Suggestion::new(SuggestionType::Grammar, original, replacement, "")
    }

    #[tokio::test]
    async fn test_short_text_is_never_analysed() {
        let backend = Arc::new(FakeBackend::default());
        let engine = engine_with(
            backend.clone(),
            Arc::new(MemoryStore::with_key("sk-test-key")),
            EngineConfig::in_page(),
        );
        assert!(engine.analyze("too short", AnalysisMode::online()).await.is_none());
        assert!(engine.analyze("", AnalysisMode::offline()).await.is_none());
        assert_eq!(backend.calls(), 0);
        assert_eq!(engine.lock_limiter().state().count_in_window, 0);
    }

    #[tokio::test]
    async fn test_fourth_call_falls_back_without_network() {
        let backend = Arc::new(FakeBackend::default());
        let engine = engine_with(
            backend.clone(),
            Arc::new(MemoryStore::with_key("sk-test-key")),
            EngineConfig::popup(),
        );
        for _ in 0..3 {
            let outcome = engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
            assert!(!outcome.used_local);
        }
        let fourth = engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        assert!(fourth.used_local);
        assert_eq!(
            fourth.fallback,
            Some(AnalysisError::RateLimited {
                origin: RateLimitOrigin::Budget
            })
        );
        assert_eq!(backend.calls(), 3);
        assert!(fourth
            .suggestions
            .iter()
            .any(|s| s.original == "a apple" && s.replacement == "an apple"));
    }

    #[tokio::test]
    async fn test_server_429_trips_limiter() {
        let backend = Arc::new(FakeBackend::with_responses([Err(AnalysisError::RateLimited {
            origin: RateLimitOrigin::Server,
        })]));
        let engine = engine_with(
            backend.clone(),
            Arc::new(MemoryStore::with_key("sk-test-key")),
            EngineConfig::popup(),
        );
        let outcome = engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        assert!(outcome.used_local);
        assert!(engine.lock_limiter().is_tripped(Instant::now()));
        assert_eq!(engine.status(), Status::RateLimited);

        let next = engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        assert!(next.used_local);
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test]
    async fn test_malformed_response_falls_back_without_trip() {
        let backend = Arc::new(FakeBackend::with_responses([Err(
            AnalysisError::MalformedResponse("no suggestions array".to_string()),
        )]));
        let engine = engine_with(
            backend,
            Arc::new(MemoryStore::with_key("sk-test-key")),
            EngineConfig::in_page(),
        );
        let outcome = engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        assert!(outcome.used_local);
        assert!(!outcome.suggestions.is_empty());
        assert!(!engine.lock_limiter().state().tripped);
        assert!(!engine.current_mode().offline);
    }

    #[tokio::test]
    async fn test_network_failure_starts_offline_window() {
        let backend = Arc::new(FakeBackend::with_responses([Err(AnalysisError::Network(
            "could not connect".to_string(),
        ))]));
        let engine = engine_with(
            backend.clone(),
            Arc::new(MemoryStore::with_key("sk-test-key")),
            EngineConfig::in_page(),
        );
        engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        assert!(engine.current_mode().offline);

        let next = engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        assert_eq!(next.fallback, Some(AnalysisError::Offline));
        assert_eq!(backend.calls(), 1);

        engine.set_offline_mode(false).unwrap();
        assert!(!engine.current_mode().offline);
    }

    #[tokio::test]
    async fn test_missing_key_uses_local() {
        let store = Arc::new(MemoryStore {
            key: Some("   ".to_string()),
            ..MemoryStore::with_key("")
        });
        let backend = Arc::new(FakeBackend::default());
        let engine = engine_with(backend.clone(), store, EngineConfig::in_page());
        let outcome = engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        assert_eq!(outcome.fallback, Some(AnalysisError::MissingApiKey));
        assert_eq!(backend.calls(), 0);
        assert_eq!(
            engine.improve(DRAFT, "formal").await,
            Err(AnalysisError::MissingApiKey)
        );
    }

    #[tokio::test]
    async fn test_offline_mode_skips_remote() {
        let store = Arc::new(MemoryStore::with_key("sk-test-key"));
        store.offline.store(true, Ordering::SeqCst);
        let backend = Arc::new(FakeBackend::default());
        let engine = engine_with(backend.clone(), store, EngineConfig::in_page());
        let outcome = engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        assert_eq!(outcome.fallback, Some(AnalysisError::Offline));
        assert_eq!(engine.status(), Status::Offline);
        assert_eq!(
            engine.improve(DRAFT, "formal").await,
            Err(AnalysisError::Offline)
        );
        assert_eq!(backend.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_remote_result_is_success() {
        let backend = Arc::new(FakeBackend::with_responses([Ok(Vec::new())]));
        let engine = engine_with(
            backend,
            Arc::new(MemoryStore::with_key("sk-test-key")),
            EngineConfig::in_page(),
        );
        let outcome = engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        assert!(!outcome.used_local);
        assert!(outcome.suggestions.is_empty());
        assert_eq!(outcome.fallback, None);
        assert_eq!(engine.status(), Status::Clean);
    }

    #[tokio::test]
    async fn test_remote_results_are_filtered_deduped_and_sorted() {
        let text = "so i said i would go, and a apple fell on the table";
        let backend = Arc::new(FakeBackend::with_responses([Ok(vec![
            grammar("a apple", "an apple"),
            grammar("i", "I"),
            grammar("i", "I"),
            grammar("i", "I"),
            grammar("i", "I"),
            grammar("banana", "bananas"),
            Suggestion::flag(SuggestionType::Delivery, "so", "informal"),
        ])]));
        let store = Arc::new(MemoryStore::with_key("sk-test-key"));
        store.toggles.lock().unwrap().delivery = false;
        let engine = engine_with(backend, store, EngineConfig::in_page());

        let outcome = engine.analyze(text, AnalysisMode::online()).await.unwrap();
        // the "i" inside "said" is not a separate occurrence
        assert_eq!(
            outcome.suggestions,
            vec![
                grammar("i", "I"),
                grammar("i", "I"),
                grammar("a apple", "an apple"),
            ]
        );
        assert_eq!(outcome.statistics.grammar, 3);
        assert_eq!(outcome.statistics.delivery, 0);
    }

    #[tokio::test]
    async fn test_apply_and_dismiss_update_active_set() {
        let backend = Arc::new(FakeBackend::with_responses([Ok(vec![
            grammar("a apple", "an apple"),
            grammar("  ", " "),
            grammar("too", "to"),
        ])]));
        let engine = engine_with(
            backend,
            Arc::new(MemoryStore::with_key("sk-test-key")),
            EngineConfig::in_page(),
        );
        engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        assert_eq!(engine.status(), Status::Pending(3));

        let out = engine.apply(DRAFT, &grammar("a apple", "an apple"));
        assert!(out.applied);
        assert_eq!(out.text, "This is an apple and their going too fast.  Okay");
        assert_eq!(engine.suggestions().len(), 2);

        let stale = engine.apply("rewritten entirely", &grammar("too", "to"));
        assert!(!stale.applied);
        assert_eq!(stale.text, "rewritten entirely");
        assert_eq!(engine.suggestions(), vec![grammar("  ", " ")]);

        assert!(engine.dismiss(&grammar("  ", " ")));
        assert!(!engine.dismiss(&grammar("  ", " ")));
        assert_eq!(engine.statistics().total(), 0);
    }

    #[tokio::test]
    async fn test_apply_all_uses_one_cursor() {
        let backend = Arc::new(FakeBackend::with_responses([Ok(vec![
            grammar("a apple", "an apple"),
            Suggestion::flag(SuggestionType::Clarity, "their going", "check"),
            grammar("  ", " "),
        ])]));
        let engine = engine_with(
            backend,
            Arc::new(MemoryStore::with_key("sk-test-key")),
            EngineConfig::in_page(),
        );
        engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        let out = engine.apply_all(DRAFT);
        assert_eq!(out.text, "This is an apple and their going too fast. Okay");
        assert_eq!(out.applied, 2);
        assert_eq!(out.stale, 0);
        assert!(engine.suggestions().is_empty());
    }

    #[tokio::test]
    async fn test_apply_all_reaches_edits_between_repeated_targets() {
        let text = "so i went there.  Then i went home";
        let backend = Arc::new(FakeBackend::with_responses([Ok(vec![
            grammar("i went", "I went"),
            grammar("i went", "I went"),
            grammar("  ", " "),
        ])]));
        let engine = engine_with(
            backend,
            Arc::new(MemoryStore::with_key("sk-test-key")),
            EngineConfig::in_page(),
        );
        let outcome = engine.analyze(text, AnalysisMode::online()).await.unwrap();
        assert_eq!(outcome.suggestions[2], grammar("  ", " "));

        let out = engine.apply_all(text);
        assert_eq!(out.text, "so I went there. Then I went home");
        assert_eq!(out.applied, 3);
        assert_eq!(out.stale, 0);
    }

    #[tokio::test]
    async fn test_local_pronoun_fix_leaves_other_words_alone() {
        let text = "so i said that i would come over later";
        let engine = engine_with(
            Arc::new(FakeBackend::default()),
            Arc::new(MemoryStore::with_key("sk-test-key")),
            EngineConfig::in_page(),
        );
        let outcome = engine.analyze(text, AnalysisMode::offline()).await.unwrap();
        assert!(outcome.used_local);
        assert_eq!(outcome.suggestions.len(), 2);

        let single = engine.apply(text, &outcome.suggestions[0]);
        assert_eq!(single.text, "so I said that i would come over later");

        engine.analyze(text, AnalysisMode::offline()).await.unwrap();
        let out = engine.apply_all(text);
        assert_eq!(out.text, "so I said that I would come over later");
        assert_eq!(out.applied, 2);
        assert_eq!(out.stale, 0);
    }

    #[tokio::test]
    async fn test_handle_surface_requests() {
        let store = Arc::new(MemoryStore::with_key("sk-test-key"));
        let engine = engine_with(
            Arc::new(FakeBackend::default()),
            store.clone(),
            EngineConfig::in_page(),
        );
        engine.analyze(DRAFT, AnalysisMode::offline()).await.unwrap();
        let expected = engine.statistics();
        assert!(expected.total() > 0);
        assert_eq!(
            engine.handle_request(SurfaceRequest::GetStatistics),
            SurfaceResponse::Statistics {
                statistics: expected
            }
        );
        assert_eq!(
            engine.handle_request(SurfaceRequest::SetOfflineMode { value: true }),
            SurfaceResponse::Ack { success: true }
        );
        assert!(store.offline_mode());
    }

    #[tokio::test]
    async fn test_improve_spends_budget() {
        let backend = Arc::new(FakeBackend::default());
        let engine = engine_with(
            backend.clone(),
            Arc::new(MemoryStore::with_key("sk-test-key")),
            EngineConfig::popup(),
        );
        assert_eq!(
            engine.improve("hey there", "formal").await.unwrap(),
            "hey there (formal)"
        );
        assert_eq!(engine.lock_limiter().state().count_in_window, 1);
    }

    #[tokio::test]
    async fn test_in_page_trips_on_budget_exhaustion() {
        let limiter = RateLimiter::shared(RateLimitConfig {
            max_requests: 1,
            ..RateLimitConfig::default()
        });
        let backend = Arc::new(FakeBackend::default());
        let store = Arc::new(MemoryStore::with_key("sk-test-key"));
        let engine = SuggestionEngine::with_shared_limiter(
            backend.clone(),
            store,
            limiter.clone(),
            EngineConfig::in_page(),
        );
        assert!(engine.acquire(Instant::now()));
        assert!(!engine.acquire(Instant::now()));
        assert!(limiter.lock().unwrap().is_tripped(Instant::now()));
        let outcome = engine.analyze(DRAFT, AnalysisMode::online()).await.unwrap();
        assert!(outcome.used_local);
        assert_eq!(backend.calls(), 0);
    }
}
