//! Debounced analysis per editable surface
//!
//! Each input replaces the surface's pending debounce task. Once the debounce
//! elapses the analysis runs detached, so a later input never aborts a request
//! already on the wire; the engine's sequence check drops its result instead.

use crate::engine::{EngineConfig, SuggestionBackend, SuggestionEngine};
use draftcheck_core::{
    AnalysisMode, AnalysisOutcome, RateLimiter, SettingsStore, SharedRateLimiter,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Identity of one editable surface (a field, a file, a popup session)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(pub String);

impl SurfaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

impl fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A committed analysis for one surface
#[derive(Debug, Clone)]
pub struct SurfaceEvent {
    pub surface: SurfaceId,
    /// Input number on this surface that produced the outcome
    pub sequence: u64,
    pub text: String,
    pub outcome: AnalysisOutcome,
}

struct SurfaceSlot {
    engine: Arc<SuggestionEngine>,
    pending: Option<JoinHandle<()>>,
    inputs: u64,
}

pub struct Scheduler {
    backend: Arc<dyn SuggestionBackend>,
    store: Arc<dyn SettingsStore>,
    limiter: SharedRateLimiter,
    config: EngineConfig,
    surfaces: Mutex<HashMap<SurfaceId, SurfaceSlot>>,
    events: mpsc::UnboundedSender<SurfaceEvent>,
}

impl Scheduler {
    /// Scheduler plus the stream its committed outcomes arrive on.
    pub fn new(
        backend: Arc<dyn SuggestionBackend>,
        store: Arc<dyn SettingsStore>,
        config: EngineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SurfaceEvent>) {
        let limiter = RateLimiter::shared(config.rate_limit);
        Self::with_shared_limiter(backend, store, limiter, config)
    }

    pub fn with_shared_limiter(
        backend: Arc<dyn SuggestionBackend>,
        store: Arc<dyn SettingsStore>,
        limiter: SharedRateLimiter,
        config: EngineConfig,
    ) -> (Self, mpsc::UnboundedReceiver<SurfaceEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            backend,
            store,
            limiter,
            config,
            surfaces: Mutex::new(HashMap::new()),
            events,
        };
        (scheduler, rx)
    }

    /// Engine for `surface`, created on first use.
    pub fn engine(&self, surface: &SurfaceId) -> Arc<SuggestionEngine> {
        let mut surfaces = self.lock_surfaces();
        Arc::clone(&self.slot(&mut surfaces, surface).engine)
    }

    /// Record an edit. Must be called from inside a tokio runtime.
    ///
    /// Cancels the surface's pending debounce; text below the minimum length
    /// schedules nothing.
    pub fn input(&self, surface: SurfaceId, text: impl Into<String>) {
        let text = text.into();
        let mut surfaces = self.lock_surfaces();
        let slot = self.slot(&mut surfaces, &surface);

        slot.inputs += 1;
        if let Some(pending) = slot.pending.take() {
            pending.abort();
        }
        if text.chars().count() < self.config.min_text_len {
            return;
        }

        let engine = Arc::clone(&slot.engine);
        let events = self.events.clone();
        let debounce = self.config.debounce;
        let sequence = slot.inputs;
        slot.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            tokio::spawn(async move {
                let Some(outcome) = engine.analyze(&text, AnalysisMode::online()).await else {
                    return;
                };
                let event = SurfaceEvent {
                    surface,
                    sequence,
                    text,
                    outcome,
                };
                if events.send(event).is_err() {
                    tracing::debug!("analysis finished after the event receiver closed");
                }
            });
        }));
    }

    /// Drop a pending debounce without scheduling anything new.
    pub fn cancel(&self, surface: &SurfaceId) {
        if let Some(slot) = self.lock_surfaces().get_mut(surface) {
            if let Some(pending) = slot.pending.take() {
                pending.abort();
            }
        }
    }

    /// Forget a surface and its suggestions.
    pub fn remove(&self, surface: &SurfaceId) -> bool {
        match self.lock_surfaces().remove(surface) {
            Some(slot) => {
                if let Some(pending) = slot.pending {
                    pending.abort();
                }
                true
            }
            None => false,
        }
    }

    pub fn surfaces(&self) -> Vec<SurfaceId> {
        let mut ids: Vec<SurfaceId> = self.lock_surfaces().keys().cloned().collect();
        ids.sort();
        ids
    }

    fn slot<'a>(
        &self,
        surfaces: &'a mut HashMap<SurfaceId, SurfaceSlot>,
        surface: &SurfaceId,
    ) -> &'a mut SurfaceSlot {
        surfaces.entry(surface.clone()).or_insert_with(|| SurfaceSlot {
            engine: Arc::new(SuggestionEngine::with_shared_limiter(
                Arc::clone(&self.backend),
                Arc::clone(&self.store),
                Arc::clone(&self.limiter),
                self.config.clone(),
            )),
            pending: None,
            inputs: 0,
        })
    }

    fn lock_surfaces(&self) -> MutexGuard<'_, HashMap<SurfaceId, SurfaceSlot>> {
        self.surfaces.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        for slot in self.lock_surfaces().values_mut() {
            if let Some(pending) = slot.pending.take() {
                pending.abort();
            }
        }
    }
}
