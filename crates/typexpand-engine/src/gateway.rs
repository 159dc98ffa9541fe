//! Compiler gateway.
//!
//! Wraps an external [`CompilerService`]: injects the baseline references,
//! partitions diagnostics, and bridges generated text into a compile step
//! through scratch files scoped to the call.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::FileKinds;
use crate::error::ExpandError;
use crate::module::Module;

/// Diagnostic severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// A compiler diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub file: String,
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
    pub message: String,
}

impl Diagnostic {
    /// An error diagnostic that is not tied to any source location.
    pub fn error_without_location(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            file: "<unknown>".to_string(),
            start_line: 0,
            start_column: 0,
            end_line: 0,
            end_column: 0,
            message: message.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({},{})-({},{}) {}",
            self.file,
            self.start_line,
            self.start_column,
            self.end_line,
            self.end_column,
            self.message
        )
    }
}

/// What a compile step should produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileTarget {
    /// An in-memory, introspectable module.
    DynamicModule,
    /// A module written to disk at the given path and also returned loaded.
    ArtifactAt(PathBuf),
}

/// A single request to the compiler service.
#[derive(Debug, Clone)]
pub struct CompileRequest {
    pub sources: Vec<PathBuf>,
    /// Baseline references first, then caller references.
    pub references: Vec<PathBuf>,
    pub flags: Vec<String>,
    pub target: CompileTarget,
}

/// What the compiler service returned.
#[derive(Debug)]
pub struct CompileOutput {
    pub diagnostics: Vec<Diagnostic>,
    /// Present when compilation succeeded.
    pub module: Option<Module>,
}

/// An external compiler that turns files into a module plus diagnostics.
pub trait CompilerService: Send + Sync {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, ExpandError>;
}

impl<C: CompilerService + ?Sized> CompilerService for Arc<C> {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, ExpandError> {
        (**self).compile(request)
    }
}

impl<C: CompilerService + ?Sized> CompilerService for Box<C> {
    fn compile(&self, request: &CompileRequest) -> Result<CompileOutput, ExpandError> {
        (**self).compile(request)
    }
}

/// Gateway in front of a compiler service.
pub struct CompilerGateway<C> {
    service: C,
    baseline_references: Vec<PathBuf>,
    kinds: FileKinds,
}

impl<C: CompilerService> CompilerGateway<C> {
    pub fn new(service: C, kinds: FileKinds) -> Self {
        Self {
            service,
            baseline_references: Vec::new(),
            kinds,
        }
    }

    /// Set the references every compilation needs (core runtime libraries).
    pub fn with_baseline_references<I, P>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.baseline_references = references.into_iter().map(Into::into).collect();
        self
    }

    pub fn service(&self) -> &C {
        &self.service
    }

    pub fn kinds(&self) -> &FileKinds {
        &self.kinds
    }

    pub fn baseline_references(&self) -> &[PathBuf] {
        &self.baseline_references
    }

    /// Compile source files into a module.
    pub fn compile(
        &self,
        sources: &[PathBuf],
        references: &[PathBuf],
        flags: &[String],
        target: CompileTarget,
    ) -> Result<Module, ExpandError> {
        let request = CompileRequest {
            sources: sources.to_vec(),
            references: self.merge_references(references),
            flags: flags.to_vec(),
            target,
        };

        tracing::debug!(
            sources = request.sources.len(),
            references = request.references.len(),
            flags = request.flags.len(),
            "invoking compiler"
        );

        let output = self.service.compile(&request)?;

        let (errors, warnings): (Vec<Diagnostic>, Vec<Diagnostic>) =
            output.diagnostics.into_iter().partition(Diagnostic::is_error);

        for warning in &warnings {
            tracing::debug!(diagnostic = %warning, "discarding compiler warning");
        }

        if !errors.is_empty() {
            return Err(ExpandError::Compile { diagnostics: errors });
        }

        let module = output.module.ok_or_else(|| {
            ExpandError::compile_message("compiler reported no errors but produced no module")
        })?;

        match &request.target {
            CompileTarget::DynamicModule => Ok(module),
            CompileTarget::ArtifactAt(path) => {
                if !path.is_file() {
                    return Err(ExpandError::compile_message(format!(
                        "compiler reported success but wrote no artifact at {}",
                        path.display()
                    )));
                }
                if module.location().is_some() {
                    Ok(module)
                } else {
                    Ok(module.with_location(path))
                }
            }
        }
    }

    /// Compile source files together with generated text.
    ///
    /// The text is written to a scratch source file that lives only for the
    /// duration of this call. Blank text compiles the sources alone.
    pub fn compile_with_generated(
        &self,
        sources: &[PathBuf],
        generated: &str,
        references: &[PathBuf],
        flags: &[String],
        target: CompileTarget,
    ) -> Result<Module, ExpandError> {
        if generated.trim().is_empty() {
            return self.compile(sources, references, flags, target);
        }

        let scratch = tempfile::Builder::new().prefix("typexpand-").tempdir()?;
        let generated_path = scratch.path().join(format!(
            "generated.{}",
            self.kinds.primary_source_extension()
        ));
        std::fs::write(&generated_path, generated)?;

        let mut all_sources = sources.to_vec();
        all_sources.push(generated_path);

        self.compile(&all_sources, references, flags, target)
    }

    fn merge_references(&self, references: &[PathBuf]) -> Vec<PathBuf> {
        let mut merged = self.baseline_references.clone();
        merged.extend(
            references
                .iter()
                .filter(|r| !self.is_baseline(r))
                .cloned(),
        );
        merged
    }

    fn is_baseline(&self, reference: &Path) -> bool {
        self.baseline_references.iter().any(|b| b == reference)
    }
}
