//! Build steps.
//!
//! Each step reads from the source or output tree, delegates the actual
//! transformation to a library, and writes its artifacts into the output
//! tree. Steps never touch the source tree and share no in-memory state;
//! the only coupling between them is the directory one writes and another
//! reads.

pub mod clean;
pub mod images;
pub mod markup;
pub mod sprite;
pub mod styles;
mod svg;
pub mod webp;

use std::fs;
use std::path::{Path, PathBuf};

use crate::discovery::Project;
use crate::error::{Result, SiteError};
use crate::serve::LiveReload;

/// Everything a step needs for one invocation.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    pub project: &'a Project,

    /// Present while a dev session is serving; steps push change
    /// notifications through it after a successful run.
    pub reload: Option<&'a LiveReload>,
}

impl<'a> StepContext<'a> {
    /// Context for one-shot builds (nobody to notify).
    pub fn new(project: &'a Project) -> Self {
        Self {
            project,
            reload: None,
        }
    }

    /// Context for a dev session.
    pub fn with_reload(project: &'a Project, reload: &'a LiveReload) -> Self {
        Self {
            project,
            reload: Some(reload),
        }
    }
}

/// Files a step wrote.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepReport {
    pub outputs: Vec<PathBuf>,
}

impl StepReport {
    pub fn new(outputs: Vec<PathBuf>) -> Self {
        Self { outputs }
    }

    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

/// Write `contents` to `path`, creating parent directories as needed.
pub fn write_output(path: &Path, contents: impl AsRef<[u8]>) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| SiteError::io(parent, "Failed to create output directory", e))?;
    }

    fs::write(path, contents).map_err(|e| SiteError::io(path, "Failed to write file", e))
}

/// Read a whole file.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| SiteError::io(path, "Failed to read file", e))
}

/// Read a whole file as UTF-8.
pub fn read_input_string(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| SiteError::io(path, "Failed to read file", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_output_creates_parents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("build/img/icons/arrow.svg");

        write_output(&path, "<svg/>").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<svg/>");
    }

    #[test]
    fn test_read_missing_input_names_path() {
        let err = read_input(Path::new("/nonexistent/style.scss")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/style.scss"));
    }
}
