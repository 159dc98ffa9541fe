//! Top-level expansion engine.
//!
//! Ties the pipeline together: missing-file check, scratch compile, scan,
//! expand, assemble, dispatch, all behind the build cache.

use std::sync::Arc;
use std::time::Instant;

use typexpand_telemetry::events;

use crate::assembler::assemble;
use crate::cache::{BuildCache, BuildResult};
use crate::config::{BuildConfiguration, FileKinds};
use crate::dispatch::dispatch;
use crate::error::ExpandError;
use crate::gateway::{CompileTarget, CompilerGateway, CompilerService};
use crate::matcher::expand;
use crate::module::Module;
use crate::scanner::{scan, Scan};

/// The expansion engine.
///
/// Owns its gateway and build cache; construct one per process (or per test).
pub struct Engine<C> {
    gateway: CompilerGateway<C>,
    cache: BuildCache,
}

impl<C: CompilerService> Engine<C> {
    pub fn new(gateway: CompilerGateway<C>) -> Self {
        Self {
            gateway,
            cache: BuildCache::new(),
        }
    }

    /// Create an engine around a compiler service with default file kinds.
    pub fn with_service(service: C) -> Self {
        Self::new(CompilerGateway::new(service, FileKinds::default()))
    }

    pub fn gateway(&self) -> &CompilerGateway<C> {
        &self.gateway
    }

    pub fn cache(&self) -> &BuildCache {
        &self.cache
    }

    /// Build a configuration, reusing the cached result when there is one.
    pub fn build(&self, config: &BuildConfiguration) -> Result<Arc<BuildResult>, ExpandError> {
        self.cache.get_or_build(config, |config| self.run(config))
    }

    /// Produce the generated document without dispatching or caching.
    pub fn generate(&self, config: &BuildConfiguration) -> Result<String, ExpandError> {
        let (_, found) = self.compile_and_scan(config)?;
        let fragments = expand(&found.types, &found.expanders)?;
        Ok(assemble(&fragments))
    }

    /// Compile the sources and report what the scanner finds.
    pub fn scan(&self, config: &BuildConfiguration) -> Result<Scan, ExpandError> {
        let (_, found) = self.compile_and_scan(config)?;
        Ok(found)
    }

    /// Image bytes of the module that represents the most recent build.
    pub fn generated_module_bytes(&self) -> Option<Vec<u8>> {
        let (config, result) = self.cache.latest()?;
        Some(result.generated_module(config.output_mode()).image().to_vec())
    }

    fn run(&self, config: &BuildConfiguration) -> Result<BuildResult, ExpandError> {
        let fingerprint = config.fingerprint();
        let span = tracing::info_span!("build", fingerprint = %fingerprint, mode = %config.output_mode());
        let _guard = span.enter();

        let started = Instant::now();
        tracing::info!(
            event = events::BUILD_STARTED,
            sources = config.sources().paths().len(),
            "starting build"
        );

        let (scratch, found) = self.compile_and_scan(config)?;
        let fragments = expand(&found.types, &found.expanders)?;
        let generated = assemble(&fragments);

        if generated.is_empty() {
            tracing::info!("no expander produced output");
        }

        let result = dispatch(&self.gateway, config, generated, scratch)?;

        tracing::info!(
            event = events::BUILD_FINISHED,
            types = found.types.len(),
            expanders = found.expanders.len(),
            generated_bytes = result.generated.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "build finished"
        );

        Ok(result)
    }

    fn compile_and_scan(&self, config: &BuildConfiguration) -> Result<(Module, Scan), ExpandError> {
        config.sources().ensure_exists()?;

        let scratch = self.gateway.compile(
            config.sources().paths(),
            config.references(),
            config.flags(),
            CompileTarget::DynamicModule,
        )?;
        let found = scan(&scratch);

        Ok((scratch, found))
    }
}
