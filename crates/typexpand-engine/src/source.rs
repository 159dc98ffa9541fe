//! Source specification resolution.
//!
//! A user-supplied path string resolves to exactly one of three forms:
//! a single source file, a comma-separated list of source files, or a
//! project manifest (YAML) naming its member files.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::FileKinds;
use crate::error::ExpandError;

/// Which form the user path string took.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceForm {
    /// A single source file.
    File,
    /// A comma-separated list of source files.
    List,
    /// A project manifest resolved to its member files.
    Manifest,
}

impl SourceForm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceForm::File => "file",
            SourceForm::List => "list",
            SourceForm::Manifest => "manifest",
        }
    }
}

/// Resolved, ordered list of source files.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceSpec {
    form: SourceForm,
    paths: Vec<PathBuf>,
    references: Vec<PathBuf>,
}

/// Project manifest (`*.yaml`) listing member source files.
///
/// ```yaml
/// sources:
///   - model.src
///   - generators/show.src
/// references:
///   - ../vendor/collections.lib
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectManifest {
    /// Member source files, relative to the manifest or absolute.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Extra references every build of this project needs.
    #[serde(default)]
    pub references: Vec<String>,
}

impl ProjectManifest {
    /// Load a manifest from a YAML file.
    pub fn load(path: &Path) -> Result<Self, ExpandError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ExpandError::Manifest(format!("failed to read {}: {}", path.display(), e))
        })?;

        Self::parse(&content, path)
    }

    /// Parse a manifest from YAML content.
    pub fn parse(content: &str, path: &Path) -> Result<Self, ExpandError> {
        serde_yaml::from_str(content).map_err(|e| {
            ExpandError::Manifest(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// Resolve member paths against the manifest's directory.
    fn resolve_paths(entries: &[String], base_path: &Path) -> Vec<PathBuf> {
        entries
            .iter()
            .map(|entry| {
                let entry = Path::new(entry.trim());
                if entry.is_absolute() {
                    entry.to_path_buf()
                } else {
                    base_path.join(entry)
                }
            })
            .collect()
    }
}

impl SourceSpec {
    /// Resolve a user path string.
    ///
    /// `exclude` names a file to drop from list and manifest forms, so a
    /// generator project never consumes the file it generates.
    pub fn resolve(
        input: &str,
        exclude: Option<&Path>,
        kinds: &FileKinds,
    ) -> Result<Self, ExpandError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ExpandError::SourceResolution(
                "source path is empty".to_string(),
            ));
        }

        if input.contains(',') {
            return Self::resolve_list(input, exclude, kinds);
        }

        let path = Path::new(input);
        if kinds.is_manifest(path) {
            return Self::resolve_manifest(path, exclude, kinds);
        }

        if kinds.is_source(path) {
            return Ok(Self {
                form: SourceForm::File,
                paths: vec![path.to_path_buf()],
                references: Vec::new(),
            });
        }

        Err(ExpandError::SourceResolution(format!(
            "'{}' is not a source file (.{}), a comma-separated list, or a project manifest (.{})",
            input,
            kinds.source_extensions.join(", ."),
            kinds.manifest_extensions.join(", ."),
        )))
    }

    /// Build a list-form spec from already-resolved paths.
    pub fn from_paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            form: SourceForm::List,
            paths: paths.into_iter().map(Into::into).collect(),
            references: Vec::new(),
        }
    }

    fn resolve_list(
        input: &str,
        exclude: Option<&Path>,
        kinds: &FileKinds,
    ) -> Result<Self, ExpandError> {
        let mut paths = Vec::new();
        for entry in input.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let path = Path::new(entry);
            if !kinds.is_source(path) {
                return Err(ExpandError::SourceResolution(format!(
                    "list entry '{}' is not a source file",
                    entry
                )));
            }
            paths.push(path.to_path_buf());
        }

        let paths = apply_exclusion(paths, exclude);
        if paths.is_empty() {
            return Err(ExpandError::SourceResolution(format!(
                "'{}' names no source files",
                input
            )));
        }

        Ok(Self {
            form: SourceForm::List,
            paths,
            references: Vec::new(),
        })
    }

    fn resolve_manifest(
        path: &Path,
        exclude: Option<&Path>,
        kinds: &FileKinds,
    ) -> Result<Self, ExpandError> {
        let manifest = ProjectManifest::load(path)?;
        let base_path = path.parent().unwrap_or_else(|| Path::new(""));

        let members = ProjectManifest::resolve_paths(&manifest.sources, base_path);
        if let Some(bad) = members.iter().find(|p| !kinds.is_source(p)) {
            return Err(ExpandError::SourceResolution(format!(
                "manifest {} lists '{}', which is not a source file",
                path.display(),
                bad.display()
            )));
        }

        let paths = apply_exclusion(members, exclude);
        if paths.is_empty() {
            return Err(ExpandError::SourceResolution(format!(
                "manifest {} declares no sources",
                path.display()
            )));
        }

        Ok(Self {
            form: SourceForm::Manifest,
            paths,
            references: ProjectManifest::resolve_paths(&manifest.references, base_path),
        })
    }

    pub fn form(&self) -> SourceForm {
        self.form
    }

    /// Resolved source files, in order.
    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    /// References declared by a project manifest (empty for other forms).
    pub fn manifest_references(&self) -> &[PathBuf] {
        &self.references
    }

    /// Every resolved file that does not exist on disk.
    pub fn missing_files(&self) -> Vec<PathBuf> {
        self.paths.iter().filter(|p| !p.is_file()).cloned().collect()
    }

    /// Fail with every missing file if any resolved file does not exist.
    pub fn ensure_exists(&self) -> Result<(), ExpandError> {
        let missing = self.missing_files();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ExpandError::MissingSourceFiles(missing))
        }
    }
}

fn apply_exclusion(paths: Vec<PathBuf>, exclude: Option<&Path>) -> Vec<PathBuf> {
    match exclude {
        Some(excluded) => paths
            .into_iter()
            .filter(|p| !same_file(p, excluded))
            .collect(),
        None => paths,
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
