//! Scratch projects for end-to-end tests.

use std::path::{Path, PathBuf};

use tempfile::TempDir;

/// A temporary directory holding test sources.
///
/// Removed when dropped.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            dir: tempfile::Builder::new().prefix("typexpand-test-").tempdir()?,
        })
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Absolute path of a file inside the project.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Write a file (creating parent directories) and return its path.
    pub fn write(&self, name: &str, content: &str) -> std::io::Result<PathBuf> {
        let path = self.path(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, content)?;
        Ok(path)
    }

    pub fn read(&self, name: &str) -> std::io::Result<String> {
        std::fs::read_to_string(self.path(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_creates_parents_and_cleanup_removes_all() {
        let project = Project::new().unwrap();
        let root = project.root().to_path_buf();
        let path = project.write("nested/dir/a.src", "type m.T A").unwrap();

        assert_eq!(project.read("nested/dir/a.src").unwrap(), "type m.T A");
        assert!(path.starts_with(&root));

        drop(project);
        assert!(!root.exists());
    }
}
