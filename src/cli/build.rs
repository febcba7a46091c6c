//! Build, default and single-step commands.

use std::path::Path;
use std::time::Instant;

use crate::discovery::{discover, Project};
use crate::error::Result;
use crate::output::{display_path, format_duration, plural, Printer};
use crate::pipeline::{self, Task};
use crate::steps::StepContext;
use crate::watch::DevSession;

fn load_project(root: &Path) -> Result<Project> {
    let project = discover(root)?;
    if !project.has_manifest {
        tracing::debug!(root = %root.display(), "no manifest found, using defaults");
    }
    Ok(project)
}

fn build_project(project: &Project, printer: &Printer) -> Result<()> {
    let started = Instant::now();
    let completed = pipeline::build(&StepContext::new(project), printer)?;

    let files: usize = completed.iter().map(|c| c.output.len()).sum();
    printer.success(
        "Finished",
        &format!(
            "{} in {} ({})",
            display_path(&project.build_dir()),
            format_duration(started.elapsed()),
            plural(files, "file", "files")
        ),
    );
    Ok(())
}

/// `sitekit build`: the full graph, failing on the first error.
pub fn run_build(root: &Path, printer: &Printer) -> Result<()> {
    build_project(&load_project(root)?, printer)
}

/// `sitekit <step>`: one task on its own.
pub fn run_step(root: &Path, task: Task, printer: &Printer) -> Result<()> {
    let project = load_project(root)?;
    pipeline::run_task(task, &StepContext::new(&project), printer)?;
    Ok(())
}

/// `sitekit` / `sitekit default`: build, then serve and watch.
pub fn run_default(root: &Path, printer: Printer) -> Result<()> {
    let project = load_project(root)?;
    build_project(&project, &printer)?;
    DevSession::new(project, printer).run()
}
