//! Build result cache.
//!
//! Maps a full [`BuildConfiguration`] to its [`BuildResult`]. The whole
//! check-build-insert sequence runs under one lock, so at most one build runs
//! per distinct configuration even when callers race on a new one. Entries
//! live as long as the cache; configurations are few per process.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use typexpand_telemetry::events;

use crate::config::{BuildConfiguration, OutputMode};
use crate::module::Module;

/// Outcome of a successful build.
#[derive(Debug, Clone)]
pub struct BuildResult {
    /// Module carrying the generated code, when the output mode produces one.
    pub final_module: Option<Module>,
    /// Pre-expansion compile of the user sources. Always present.
    pub scratch_module: Module,
    /// The assembled generated-code document.
    pub generated: String,
}

impl BuildResult {
    /// The module the host should load for a given output mode.
    pub fn generated_module(&self, mode: OutputMode) -> &Module {
        match mode {
            OutputMode::EmbedInHost => self.final_module.as_ref().unwrap_or(&self.scratch_module),
            OutputMode::ExternalArtifact | OutputMode::ExternalSource => &self.scratch_module,
        }
    }
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<BuildConfiguration, Arc<BuildResult>>,
    latest: Option<BuildConfiguration>,
    hits: u64,
    misses: u64,
}

/// Configuration-keyed cache of build results.
#[derive(Default)]
pub struct BuildCache {
    state: Mutex<CacheState>,
}

impl BuildCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached result for `config`, building it on a miss.
    ///
    /// The lock is held across the build. A failed build leaves no entry.
    pub fn get_or_build<F, E>(
        &self,
        config: &BuildConfiguration,
        builder: F,
    ) -> Result<Arc<BuildResult>, E>
    where
        F: FnOnce(&BuildConfiguration) -> Result<BuildResult, E>,
    {
        let mut state = self.state.lock();

        if let Some(result) = state.entries.get(config).cloned() {
            state.hits += 1;
            state.latest = Some(config.clone());
            tracing::debug!(
                event = events::CACHE_HIT,
                fingerprint = %config.fingerprint(),
                "reusing cached build"
            );
            return Ok(result);
        }

        state.misses += 1;
        let result = Arc::new(builder(config)?);
        state.entries.insert(config.clone(), Arc::clone(&result));
        state.latest = Some(config.clone());
        Ok(result)
    }

    /// Look up a cached result without building.
    pub fn get(&self, config: &BuildConfiguration) -> Option<Arc<BuildResult>> {
        self.state.lock().entries.get(config).cloned()
    }

    /// The configuration most recently served, with its result.
    pub fn latest(&self) -> Option<(BuildConfiguration, Arc<BuildResult>)> {
        let state = self.state.lock();
        let config = state.latest.as_ref()?;
        let result = state.entries.get(config)?;
        Some((config.clone(), Arc::clone(result)))
    }

    pub fn contains(&self, config: &BuildConfiguration) -> bool {
        self.state.lock().entries.contains_key(config)
    }

    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            entries: state.entries.len(),
            hits: state.hits,
            misses: state.misses,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached configurations.
    pub entries: usize,
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that ran the builder.
    pub misses: u64,
}
