//! Init command implementation.
//!
//! Writes a `sitekit.yaml` spelling out every default, so the knobs are
//! discoverable without reading documentation.

use std::fs;
use std::path::Path;

use clap::Args;

use crate::discovery::{Manifest, Project, MANIFEST_FILENAME};
use crate::error::{Result, SiteError};
use crate::output::{display_path, Printer};

/// Initialize a sitekit project by generating sitekit.yaml
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Overwrite an existing sitekit.yaml
    #[arg(long)]
    pub force: bool,
}

pub fn run(root: &Path, args: InitArgs, printer: &Printer) -> Result<()> {
    let manifest_path = root.join(MANIFEST_FILENAME);

    if manifest_path.exists() && !args.force {
        return Err(SiteError::Config {
            message: format!("{} already exists", MANIFEST_FILENAME),
            help: Some("Use --force to overwrite".to_string()),
        });
    }

    let manifest = Manifest::default();
    let yaml = manifest.to_yaml()?;

    fs::write(&manifest_path, yaml)
        .map_err(|e| SiteError::io(&manifest_path, "Failed to write manifest", e))?;

    let project = Project::new(root, manifest);
    if !project.source_dir().is_dir() {
        printer.warning(
            "Missing",
            &format!("source directory {}", display_path(&project.source_dir())),
        );
    }

    printer.success("Created", &display_path(&manifest_path));

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::discover;
    use tempfile::tempdir;

    #[test]
    fn test_init_writes_default_manifest() {
        let dir = tempdir().unwrap();

        run(dir.path(), InitArgs { force: false }, &Printer::new()).unwrap();

        let project = discover(dir.path()).unwrap();
        assert!(project.has_manifest);
        assert_eq!(project.manifest, Manifest::default());
    }

    #[test]
    fn test_init_errors_if_manifest_exists() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILENAME), "output: dist").unwrap();

        let err = run(dir.path(), InitArgs { force: false }, &Printer::new()).unwrap_err();

        assert!(matches!(err, SiteError::Config { .. }));
        let content = fs::read_to_string(dir.path().join(MANIFEST_FILENAME)).unwrap();
        assert_eq!(content, "output: dist");
    }

    #[test]
    fn test_init_force_overwrites() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(MANIFEST_FILENAME), "output: dist").unwrap();

        run(dir.path(), InitArgs { force: true }, &Printer::new()).unwrap();

        let content = fs::read_to_string(dir.path().join(MANIFEST_FILENAME)).unwrap();
        assert!(content.contains("output: build"));
    }
}
