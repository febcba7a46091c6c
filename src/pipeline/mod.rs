//! Named tasks and the graphs that sequence them.

pub mod graph;
pub mod scheduler;

pub use graph::{CycleError, DependencyGraph};
pub use scheduler::{execute, Completed, RunSummary};

use std::fmt;

use crate::error::Result;
use crate::output::{format_duration, plural, Printer};
use crate::steps::{self, StepContext, StepReport};

/// A named, independently invocable build step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Task {
    Clean,
    OptimizeImages,
    CompileStyles,
    ProcessHtml,
    CreateWebp,
    AssembleSprite,
}

impl Task {
    pub const ALL: [Task; 6] = [
        Task::Clean,
        Task::OptimizeImages,
        Task::CompileStyles,
        Task::ProcessHtml,
        Task::CreateWebp,
        Task::AssembleSprite,
    ];

    /// Name used on the command line and in status output.
    pub fn name(self) -> &'static str {
        match self {
            Task::Clean => "clean",
            Task::OptimizeImages => "optimize-images",
            Task::CompileStyles => "compile-styles",
            Task::ProcessHtml => "process-html",
            Task::CreateWebp => "create-webp",
            Task::AssembleSprite => "assemble-sprite",
        }
    }

    fn verb(self) -> &'static str {
        match self {
            Task::Clean => "Cleaned",
            Task::OptimizeImages => "Optimized",
            Task::CompileStyles => "Compiled",
            Task::ProcessHtml => "Minified",
            Task::CreateWebp => "Converted",
            Task::AssembleSprite => "Assembled",
        }
    }

    /// Run the step behind this task.
    pub fn run(self, ctx: &StepContext<'_>) -> Result<StepReport> {
        match self {
            Task::Clean => steps::clean::run(ctx),
            Task::OptimizeImages => steps::images::run(ctx),
            Task::CompileStyles => steps::styles::run(ctx),
            Task::ProcessHtml => steps::markup::run(ctx),
            Task::CreateWebp => steps::webp::run(ctx),
            Task::AssembleSprite => steps::sprite::run(ctx),
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The full build graph.
///
/// `clean` empties the output tree; images are optimized into it next,
/// and everything else fans out from there. WebP conversion and sprite
/// assembly read the optimized images, so they must not start early.
pub fn build_graph() -> DependencyGraph<Task> {
    let mut graph = DependencyGraph::new();
    graph.add_dependency(Task::OptimizeImages, Task::Clean);
    for task in [
        Task::CompileStyles,
        Task::ProcessHtml,
        Task::AssembleSprite,
        Task::CreateWebp,
    ] {
        graph.add_dependency(task, Task::OptimizeImages);
    }
    graph
}

fn print_completed(printer: &Printer, completed: &Completed<Task, StepReport>) {
    let files = plural(completed.output.len(), "file", "files");
    printer.status(
        completed.node.verb(),
        &format!(
            "{} ({}, {})",
            completed.node,
            files,
            format_duration(completed.elapsed)
        ),
    );
}

/// Run a task graph and print one status line per task.
///
/// The summary is returned as-is; callers decide whether a failure ends
/// the process or is merely reported, so error details are left to them.
pub fn run_graph(
    graph: &DependencyGraph<Task>,
    ctx: &StepContext<'_>,
    printer: &Printer,
) -> Result<RunSummary<Task, StepReport>> {
    let summary = execute(graph, |task| task.run(ctx))?;

    for completed in &summary.completed {
        print_completed(printer, completed);
    }
    for (task, err) in &summary.failed {
        tracing::debug!(%task, error = %err, "task failed");
        printer.error("Failed", &task.to_string());
    }
    for task in &summary.skipped {
        printer.warning("Skipped", &task.to_string());
    }

    Ok(summary)
}

/// Run the full build, failing on the first task error.
pub fn build(ctx: &StepContext<'_>, printer: &Printer) -> Result<Vec<Completed<Task, StepReport>>> {
    run_graph(&build_graph(), ctx, printer)?.into_result()
}

/// Run a single task on its own.
pub fn run_task(task: Task, ctx: &StepContext<'_>, printer: &Printer) -> Result<StepReport> {
    let mut graph = DependencyGraph::new();
    graph.register(task);

    let mut completed = run_graph(&graph, ctx, printer)?.into_result()?;
    Ok(completed
        .pop()
        .map(|completed| completed.output)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::{Manifest, Project};
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_task_names_are_unique() {
        let mut names: Vec<&str> = Task::ALL.iter().map(|t| t.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Task::ALL.len());
    }

    #[test]
    fn test_build_graph_shape() {
        let graph = build_graph();

        assert_eq!(graph.len(), 6);
        let order = graph.topological_sort().unwrap();
        assert_eq!(&order[..2], &[Task::Clean, Task::OptimizeImages]);

        let mut fan_out: Vec<Task> = graph.dependents_of(&Task::OptimizeImages).copied().collect();
        fan_out.sort();
        assert_eq!(
            fan_out,
            vec![
                Task::CompileStyles,
                Task::ProcessHtml,
                Task::CreateWebp,
                Task::AssembleSprite
            ]
        );
    }

    #[test]
    fn test_build_runs_every_task() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(source.join("sass")).unwrap();
        fs::write(source.join("sass/style.scss"), "a { color: red; }").unwrap();
        fs::write(source.join("index.html"), "<p>  hi  </p>").unwrap();

        let project = Project::new(dir.path(), Manifest::default());
        let completed = build(&StepContext::new(&project), &Printer::new()).unwrap();

        assert_eq!(completed.len(), 6);
        assert_eq!(completed[0].node, Task::Clean);
        assert_eq!(completed[1].node, Task::OptimizeImages);
        assert!(dir.path().join("build/css/style.min.css").exists());
        assert!(dir.path().join("build/index.html").exists());
        assert!(dir.path().join("build/img/sprite.svg").exists());
    }

    #[test]
    fn test_build_fails_on_source_error() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(source.join("sass")).unwrap();
        fs::write(source.join("sass/style.scss"), "a { color: red;").unwrap();

        let project = Project::new(dir.path(), Manifest::default());
        let err = build(&StepContext::new(&project), &Printer::new()).unwrap_err();

        assert!(err.is_source_error());
    }

    #[test]
    fn test_failed_build_names_the_task_once() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source");
        fs::create_dir_all(source.join("sass")).unwrap();
        fs::write(source.join("sass/style.scss"), "a { color: red;").unwrap();

        let project = Project::new(dir.path(), Manifest::default());
        let (printer, captured) = Printer::buffered();
        let err = build(&StepContext::new(&project), &printer).unwrap_err();

        let out = String::from_utf8(captured.lock().unwrap().clone()).unwrap();
        assert!(out.contains("Failed compile-styles"));
        assert!(!out.contains(&err.to_string()));
    }

    #[test]
    fn test_run_task_alone() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("build/css")).unwrap();

        let project = Project::new(dir.path(), Manifest::default());
        let report = run_task(Task::Clean, &StepContext::new(&project), &Printer::new()).unwrap();

        assert_eq!(report.outputs, vec![project.build_dir()]);
        assert!(!dir.path().join("build").exists());
    }
}
