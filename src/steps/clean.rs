//! Output tree removal.

use std::fs;
use std::io::ErrorKind;

use crate::error::{Result, SiteError};

use super::{StepContext, StepReport};

/// Delete the output tree recursively. A missing tree is not an error.
///
/// Refuses to run when the output tree overlaps the source tree.
pub fn run(ctx: &StepContext<'_>) -> Result<StepReport> {
    ctx.project.check_layout()?;
    let build = ctx.project.build_dir();

    match fs::remove_dir_all(&build) {
        Ok(()) => Ok(StepReport::new(vec![build])),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(StepReport::default()),
        Err(e) => Err(SiteError::io(&build, "Failed to remove output directory", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{Manifest, Project};
    use tempfile::tempdir;

    #[test]
    fn test_clean_removes_output_tree() {
        let dir = tempdir().unwrap();
        let project = Project::new(dir.path(), Manifest::default());
        fs::create_dir_all(project.css_dir()).unwrap();
        fs::write(project.build_dir().join("old.html"), "<p>stale</p>").unwrap();

        let report = run(&StepContext::new(&project)).unwrap();

        assert_eq!(report.outputs, vec![project.build_dir()]);
        assert!(!project.build_dir().exists());
    }

    #[test]
    fn test_clean_missing_tree_is_noop() {
        let dir = tempdir().unwrap();
        let project = Project::new(dir.path(), Manifest::default());

        let report = run(&StepContext::new(&project)).unwrap();

        assert!(report.is_empty());
    }

    #[test]
    fn test_clean_leaves_source_alone() {
        let dir = tempdir().unwrap();
        let project = Project::new(dir.path(), Manifest::default());
        fs::create_dir_all(project.source_dir()).unwrap();
        fs::write(project.source_dir().join("index.html"), "<p>hi</p>").unwrap();
        fs::create_dir_all(project.build_dir()).unwrap();

        run(&StepContext::new(&project)).unwrap();

        assert!(project.source_dir().join("index.html").exists());
    }

    #[test]
    fn test_clean_refuses_output_equal_to_source() {
        let dir = tempdir().unwrap();
        let mut manifest = Manifest::default();
        manifest.output = manifest.source.clone();
        let project = Project::new(dir.path(), manifest);
        fs::create_dir_all(project.source_dir().join("sass")).unwrap();
        fs::write(project.source_dir().join("sass/style.scss"), "a{}").unwrap();

        let err = run(&StepContext::new(&project)).unwrap_err();

        assert!(matches!(err, SiteError::Config { .. }));
        assert!(project.source_dir().join("sass/style.scss").exists());
    }
}
