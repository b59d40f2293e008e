//! Background segmentation collaborator abstraction and session caching
//!
//! The pipeline never depends on a concrete model library. It talks to a
//! [`SegmentationSession`], obtained once per [`ModelSelector`] from a
//! [`SessionFactory`] and kept in a caller-owned [`SessionCache`].

use crate::config::ModelSelector;
use crate::error::{BgCanvasError, Result};
use image::RgbaImage;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A loaded background-removal model
///
/// Implementations must be safe to share read-only across threads once built.
pub trait SegmentationSession: Send + Sync + std::fmt::Debug {
    /// Return an image of identical dimensions whose alpha channel encodes the
    /// estimated foreground
    ///
    /// # Errors
    /// - Model inference failures
    /// - Unsupported input
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage>;

    /// Model variant this session was created for
    fn model(&self) -> ModelSelector;
}

/// Creates sessions for a model variant
///
/// Creation may perform disk or network I/O.
pub trait SessionFactory: Send + Sync {
    /// Create a new session for `model`
    ///
    /// # Errors
    /// - Model weights missing or unreadable
    /// - Model initialization failures
    fn new_session(&self, model: ModelSelector) -> Result<Arc<dyn SegmentationSession>>;
}

/// Session cache statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionCacheStats {
    /// Lookups served from the cache
    pub hits: u64,
    /// Lookups that created a new session
    pub misses: u64,
}

#[derive(Debug, Default)]
struct SessionCacheState {
    sessions: HashMap<ModelSelector, Arc<dyn SegmentationSession>>,
    stats: SessionCacheStats,
}

/// Process-wide store of initialized sessions, keyed by model
///
/// A session is created at most once per model. The cache is injected by the
/// caller instead of living in a global.
#[derive(Debug, Default)]
pub struct SessionCache {
    state: Mutex<SessionCacheState>,
}

impl SessionCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached session for `model`, creating it on first use
    ///
    /// The lock is held while the factory runs, so concurrent first uses of
    /// the same model still produce a single session.
    ///
    /// # Errors
    /// - Session creation failures (nothing is cached in that case)
    /// - Poisoned cache lock
    pub fn get_or_create(
        &self,
        model: ModelSelector,
        factory: &dyn SessionFactory,
    ) -> Result<Arc<dyn SegmentationSession>> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| BgCanvasError::internal("Session cache lock poisoned"))?;

        if let Some(session) = state.sessions.get(&model).cloned() {
            state.stats.hits += 1;
            log::debug!("Session cache hit for model {}", model);
            return Ok(session);
        }

        log::info!("Initializing segmentation session for model {}", model);
        let session = factory.new_session(model)?;
        state.sessions.insert(model, Arc::clone(&session));
        state.stats.misses += 1;
        Ok(session)
    }

    /// Whether a session for `model` has been created
    #[must_use]
    pub fn is_cached(&self, model: ModelSelector) -> bool {
        self.state
            .lock()
            .map(|state| state.sessions.contains_key(&model))
            .unwrap_or(false)
    }

    /// Number of cached sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().map(|state| state.sessions.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of hit/miss counters
    #[must_use]
    pub fn stats(&self) -> SessionCacheStats {
        self.state
            .lock()
            .map(|state| state.stats)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::{MockSegmentationSession, MockSessionFactory};

    #[test]
    fn test_session_created_once_per_model() {
        let factory = MockSessionFactory::new(MockSegmentationSession::alpha_mask);
        let cache = SessionCache::new();

        let first = cache.get_or_create(ModelSelector::U2Net, &factory).unwrap();
        let second = cache.get_or_create(ModelSelector::U2Net, &factory).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(factory.creation_count(), 1);
        assert_eq!(cache.stats(), SessionCacheStats { hits: 1, misses: 1 });
    }

    #[test]
    fn test_distinct_models_get_distinct_sessions() {
        let factory = MockSessionFactory::new(MockSegmentationSession::alpha_mask);
        let cache = SessionCache::new();

        let full = cache.get_or_create(ModelSelector::U2Net, &factory).unwrap();
        let small = cache.get_or_create(ModelSelector::U2NetP, &factory).unwrap();

        assert_eq!(full.model(), ModelSelector::U2Net);
        assert_eq!(small.model(), ModelSelector::U2NetP);
        assert_eq!(cache.len(), 2);
        assert!(cache.is_cached(ModelSelector::U2NetP));
        assert!(!cache.is_cached(ModelSelector::Silueta));
    }

    #[test]
    fn test_failed_creation_is_not_cached() {
        let factory = MockSessionFactory::failing("weights missing");
        let cache = SessionCache::new();

        let err = cache
            .get_or_create(ModelSelector::U2Net, &factory)
            .unwrap_err();
        assert!(err.to_string().contains("weights missing"));
        assert!(cache.is_empty());

        // A later attempt retries the factory
        let _ = cache.get_or_create(ModelSelector::U2Net, &factory);
        assert_eq!(factory.creation_count(), 2);
    }

    #[test]
    fn test_concurrent_first_use_creates_one_session() {
        let factory = Arc::new(MockSessionFactory::new(MockSegmentationSession::alpha_mask));
        let cache = Arc::new(SessionCache::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let factory = Arc::clone(&factory);
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    cache
                        .get_or_create(ModelSelector::Silueta, factory.as_ref())
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(factory.creation_count(), 1);
        assert_eq!(cache.len(), 1);
    }
}
