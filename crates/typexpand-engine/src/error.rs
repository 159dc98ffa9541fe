use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::OutputMode;
use crate::gateway::Diagnostic;

/// Errors produced while resolving, compiling, expanding, or dispatching a build.
#[derive(Debug, Error)]
pub enum ExpandError {
    /// E2001: Source path string does not classify as file, list, or manifest.
    #[error("E2001: cannot resolve sources: {0}")]
    SourceResolution(String),

    /// E2002: One or more resolved source files do not exist.
    #[error("E2002: missing source files: {}", display_paths(.0))]
    MissingSourceFiles(Vec<PathBuf>),

    /// E2010: The compiler reported errors.
    #[error("E2010: compilation failed:\n{}", DiagnosticList(.diagnostics))]
    Compile { diagnostics: Vec<Diagnostic> },

    /// E2020: Output path suffix does not match the output mode.
    #[error("E2020: output path '{}' is not valid for {mode} mode (expected a .{expected} file)", .path.display())]
    InvalidOutputPath {
        path: PathBuf,
        mode: OutputMode,
        expected: String,
    },

    /// E2021: Unrecognized output mode value.
    #[error("E2021: unknown output mode '{0}' (expected embed, artifact, or source)")]
    InvalidOutputMode(String),

    /// E2030: An expander faulted while generating code for a type.
    #[error("E2030: expander '{expander}' failed for type '{type_name}': {message}")]
    ExpansionInvocation {
        expander: String,
        type_name: String,
        message: String,
    },

    /// E2040: The compiler driver could not be run or broke protocol.
    #[error("E2040: compiler driver error: {0}")]
    Driver(String),

    /// Project manifest reading or parsing error.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExpandError {
    /// Build a compile error from a single message with no source location.
    pub fn compile_message(message: impl Into<String>) -> Self {
        ExpandError::Compile {
            diagnostics: vec![Diagnostic::error_without_location(message)],
        }
    }
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

struct DiagnosticList<'a>(&'a [Diagnostic]);

impl fmt::Display for DiagnosticList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, diagnostic) in self.0.iter().enumerate() {
            if idx > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{}", diagnostic)?;
        }
        Ok(())
    }
}

/// Join diagnostics into the multi-line form used in compile errors.
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    DiagnosticList(diagnostics).to_string()
}
