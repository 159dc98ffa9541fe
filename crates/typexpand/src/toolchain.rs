//! Command-line options shared by every subcommand.

use std::path::PathBuf;

use clap::Args;
use thiserror::Error;
use typexpand_engine::{
    BuildConfiguration, CompilerGateway, DriverConfig, Engine, ExpandError, FileKinds, OutputMode,
    ProcessCompiler, SourceSpec,
};

/// Errors raised by the command line before or around the engine.
#[derive(Debug, Error)]
pub enum CliError {
    /// No compiler driver was given on the command line or in the environment.
    #[error("no compiler driver configured; pass --compiler or set TYPEXPAND_COMPILER")]
    NoCompiler,

    /// Unknown `--log-format` value.
    #[error("invalid log format '{0}' (expected json or pretty)")]
    LogFormat(String),

    /// Scan report could not be serialized.
    #[error("failed to render report: {0}")]
    Report(#[from] serde_json::Error),

    #[error(transparent)]
    Expand(#[from] ExpandError),
}

/// How to reach the compiler and what files look like.
#[derive(Args, Debug, Clone, Default)]
pub struct Toolchain {
    /// Compiler driver executable.
    #[arg(long, env = "TYPEXPAND_COMPILER", global = true)]
    pub compiler: Option<PathBuf>,

    /// Extra argument passed to the driver before its subcommand (repeatable).
    #[arg(long = "compiler-arg", global = true, allow_hyphen_values = true)]
    pub compiler_args: Vec<String>,

    /// Reference prepended to every compile (repeatable, or comma separated).
    #[arg(
        long = "baseline-reference",
        env = "TYPEXPAND_BASELINE_REFS",
        value_delimiter = ',',
        global = true
    )]
    pub baseline_references: Vec<PathBuf>,

    /// Source file extension (repeatable, or comma separated). Default: src.
    #[arg(long = "source-ext", value_delimiter = ',', global = true)]
    pub source_extensions: Vec<String>,

    /// Compiled artifact extension. Default: lib.
    #[arg(long = "artifact-ext", global = true)]
    pub artifact_extension: Option<String>,
}

impl Toolchain {
    /// File kinds after applying any overrides.
    pub fn file_kinds(&self) -> FileKinds {
        let mut kinds = FileKinds::default();
        if !self.source_extensions.is_empty() {
            kinds = kinds.with_source_extensions(self.source_extensions.iter().cloned());
        }
        if let Some(ext) = &self.artifact_extension {
            kinds = kinds.with_artifact_extension(ext.clone());
        }
        kinds
    }

    /// Build an engine backed by the configured driver program.
    pub fn engine(&self) -> Result<Engine<ProcessCompiler>, CliError> {
        let program = self.compiler.as_ref().ok_or(CliError::NoCompiler)?;
        let kinds = self.file_kinds();

        let driver = DriverConfig::new(program).with_args(self.compiler_args.iter().cloned());
        let service =
            ProcessCompiler::new(driver).with_artifact_extension(kinds.artifact_extension.clone());

        tracing::debug!(
            compiler = %program.display(),
            baseline_references = self.baseline_references.len(),
            "compiler driver configured"
        );

        let gateway = CompilerGateway::new(service, kinds)
            .with_baseline_references(self.baseline_references.iter().cloned());
        Ok(Engine::new(gateway))
    }
}

/// Per-build inputs taken from a subcommand's options.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// A source file, a comma-separated list, or a project manifest.
    pub sources: String,
    /// File to leave out of list and manifest sources.
    pub exclude: Option<PathBuf>,
    pub references: Vec<PathBuf>,
    pub flags: Vec<String>,
    pub mode: OutputMode,
    pub output: PathBuf,
}

impl BuildRequest {
    /// Resolve sources and validate the output path.
    pub fn configuration(&self, kinds: &FileKinds) -> Result<BuildConfiguration, ExpandError> {
        let sources = SourceSpec::resolve(&self.sources, self.exclude.as_deref(), kinds)?;
        Ok(
            BuildConfiguration::new(sources, self.mode, self.output.clone(), kinds)?
                .with_references(self.references.iter().cloned())
                .with_flags(self.flags.iter().cloned()),
        )
    }
}
