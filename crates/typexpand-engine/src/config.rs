//! Build configuration: the hashable identity of a build.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use sha2::{Digest, Sha256};

use crate::error::ExpandError;
use crate::source::SourceSpec;

/// Where the generated code ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputMode {
    /// Generated code is merged into a module handed back to the caller.
    EmbedInHost,
    /// A standalone compiled artifact is produced and copied to the output path.
    ExternalArtifact,
    /// Only the generated text is written to the output path.
    ExternalSource,
}

impl OutputMode {
    /// Canonical kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::EmbedInHost => "embed-in-host",
            OutputMode::ExternalArtifact => "external-artifact",
            OutputMode::ExternalSource => "external-source",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = ExpandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "embed" | "embed-in-host" => Ok(Self::EmbedInHost),
            "artifact" | "external-artifact" => Ok(Self::ExternalArtifact),
            "source" | "external-source" => Ok(Self::ExternalSource),
            _ => Err(ExpandError::InvalidOutputMode(s.to_string())),
        }
    }
}

/// File suffixes the engine needs to know about.
///
/// Extensions are stored without the leading dot and compared case-insensitively.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileKinds {
    /// Extensions of compilable source files. The first is used for scratch files.
    pub source_extensions: Vec<String>,
    /// Extension of compiled library artifacts.
    pub artifact_extension: String,
    /// Extensions of project manifests.
    pub manifest_extensions: Vec<String>,
}

impl Default for FileKinds {
    fn default() -> Self {
        Self {
            source_extensions: vec!["src".to_string()],
            artifact_extension: "lib".to_string(),
            manifest_extensions: vec!["yaml".to_string(), "yml".to_string()],
        }
    }
}

impl FileKinds {
    /// Replace the source extensions.
    pub fn with_source_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.source_extensions = extensions.into_iter().map(|e| normalize_ext(e.into())).collect();
        self
    }

    /// Replace the artifact extension.
    pub fn with_artifact_extension(mut self, extension: impl Into<String>) -> Self {
        self.artifact_extension = normalize_ext(extension.into());
        self
    }

    /// Check whether a path names a source file.
    pub fn is_source(&self, path: &Path) -> bool {
        has_extension(path, &self.source_extensions)
    }

    /// Check whether a path names a library artifact.
    pub fn is_artifact(&self, path: &Path) -> bool {
        has_extension(path, std::slice::from_ref(&self.artifact_extension))
    }

    /// Check whether a path names a project manifest.
    pub fn is_manifest(&self, path: &Path) -> bool {
        has_extension(path, &self.manifest_extensions)
    }

    /// Extension used for scratch source files.
    pub fn primary_source_extension(&self) -> &str {
        self.source_extensions
            .first()
            .map(String::as_str)
            .unwrap_or("src")
    }
}

fn normalize_ext(ext: String) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_lowercase();
            extensions.iter().any(|known| *known == e)
        })
        .unwrap_or(false)
}

/// Full set of inputs that determines a build's cacheable identity.
///
/// Equality and hashing are structural over every field. A configuration
/// cannot be modified once constructed; the `with_*` builders consume it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BuildConfiguration {
    sources: SourceSpec,
    references: Vec<PathBuf>,
    flags: Vec<String>,
    output_mode: OutputMode,
    output_path: PathBuf,
}

impl BuildConfiguration {
    /// Create a configuration, validating the output path against the mode.
    ///
    /// `ExternalArtifact` requires an artifact-suffixed path and
    /// `ExternalSource` a source-suffixed one. `EmbedInHost` ignores the path.
    pub fn new(
        sources: SourceSpec,
        output_mode: OutputMode,
        output_path: impl Into<PathBuf>,
        kinds: &FileKinds,
    ) -> Result<Self, ExpandError> {
        let output_path = output_path.into();
        validate_output_path(&output_path, output_mode, kinds)?;

        let references = sources.manifest_references().to_vec();

        Ok(Self {
            sources,
            references,
            flags: Vec::new(),
            output_mode,
            output_path,
        })
    }

    /// Append extra reference paths, in order.
    pub fn with_references<I, P>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.references.extend(references.into_iter().map(Into::into));
        self
    }

    /// Append extra compiler flags, in order.
    pub fn with_flags<I, S>(mut self, flags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.flags.extend(flags.into_iter().map(Into::into));
        self
    }

    pub fn sources(&self) -> &SourceSpec {
        &self.sources
    }

    pub fn references(&self) -> &[PathBuf] {
        &self.references
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    pub fn output_mode(&self) -> OutputMode {
        self.output_mode
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Short hex digest of the configuration, for log correlation.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sources.form().as_str().as_bytes());
        hasher.update([0]);
        for path in self.sources.paths() {
            hasher.update(b"s:");
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update([0]);
        }
        for path in &self.references {
            hasher.update(b"r:");
            hasher.update(path.to_string_lossy().as_bytes());
            hasher.update([0]);
        }
        for flag in &self.flags {
            hasher.update(b"f:");
            hasher.update(flag.as_bytes());
            hasher.update([0]);
        }
        hasher.update(self.output_mode.as_str().as_bytes());
        hasher.update([0]);
        hasher.update(self.output_path.to_string_lossy().as_bytes());
        let result = hasher.finalize();
        hex::encode(&result[..8])
    }
}

fn validate_output_path(
    path: &Path,
    mode: OutputMode,
    kinds: &FileKinds,
) -> Result<(), ExpandError> {
    let (valid, expected) = match mode {
        OutputMode::EmbedInHost => return Ok(()),
        OutputMode::ExternalArtifact => (kinds.is_artifact(path), kinds.artifact_extension.clone()),
        OutputMode::ExternalSource => (
            kinds.is_source(path),
            kinds.primary_source_extension().to_string(),
        ),
    };

    if valid {
        Ok(())
    } else {
        Err(ExpandError::InvalidOutputPath {
            path: path.to_path_buf(),
            mode,
            expected,
        })
    }
}
