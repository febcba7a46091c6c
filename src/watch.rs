//! Interactive development session.
//!
//! A [`DevSession`] starts in [`SessionState::Stopped`]. Serving binds the
//! dev server over the output tree and begins watching the source tree;
//! from then on every batch of file changes re-runs only the steps whose
//! inputs changed. Step failures are reported and the session keeps going.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::Duration;

use glob::Pattern;
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use crate::discovery::{matches_glob, Project};
use crate::error::{Result, SiteError};
use crate::output::{display_path, Printer};
use crate::pipeline::{run_graph, DependencyGraph, RunSummary, Task};
use crate::serve::{self, LiveReload, ServerHandle};
use crate::steps::{StepContext, StepReport};

/// How long [`DevSession::run`] waits for changes per iteration.
const IDLE_POLL: Duration = Duration::from_millis(500);

/// Lifecycle of a dev session. There is no way back from `Serving`;
/// dropping the session releases the port and the watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Stopped,
    Serving(SocketAddr),
}

/// Which steps a batch of changes invalidates.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Affected {
    pub styles: bool,
    pub markup: bool,
}

impl Affected {
    pub fn is_empty(&self) -> bool {
        !self.styles && !self.markup
    }

    pub fn tasks(&self) -> Vec<Task> {
        let mut tasks = Vec::new();
        if self.styles {
            tasks.push(Task::CompileStyles);
        }
        if self.markup {
            tasks.push(Task::ProcessHtml);
        }
        tasks
    }
}

/// Matches changed paths against the style and markup globs.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    source: PathBuf,
    styles: Pattern,
    markup: Pattern,
}

fn compile_glob(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| SiteError::Config {
        message: format!("Invalid glob {}: {}", pattern, e),
        help: None,
    })
}

impl ChangeFilter {
    /// Globs are taken from the manifest and resolved against `source`.
    pub fn new(project: &Project, source: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            source: source.into(),
            styles: compile_glob(&project.manifest.styles.watch)?,
            markup: compile_glob(&project.manifest.markup)?,
        })
    }

    pub fn is_style(&self, path: &Path) -> bool {
        matches_glob(&self.source, path, &self.styles)
    }

    pub fn is_markup(&self, path: &Path) -> bool {
        matches_glob(&self.source, path, &self.markup)
    }

    pub fn classify(&self, paths: &[PathBuf]) -> Affected {
        Affected {
            styles: paths.iter().any(|p| self.is_style(p)),
            markup: paths.iter().any(|p| self.is_markup(p)),
        }
    }
}

/// Result of handling one batch of changes.
#[derive(Debug)]
pub struct Rebuild {
    /// Changed paths that matched a glob.
    pub changed: Vec<PathBuf>,
    pub summary: RunSummary<Task, StepReport>,
}

/// What exists only while serving.
struct Serving {
    // Field order is drop order: stop watching before closing the port
    _watcher: RecommendedWatcher,
    changes: Receiver<PathBuf>,
    filter: ChangeFilter,
    server: ServerHandle,
}

/// Dev server, live reload and watcher for one project.
pub struct DevSession {
    project: Project,
    reload: LiveReload,
    printer: Printer,
    serving: Option<Serving>,
}

impl DevSession {
    pub fn new(project: Project, printer: Printer) -> Self {
        Self {
            project,
            reload: LiveReload::new(),
            printer,
            serving: None,
        }
    }

    pub fn project(&self) -> &Project {
        &self.project
    }

    /// The broadcaster steps publish through while serving.
    pub fn reload(&self) -> &LiveReload {
        &self.reload
    }

    pub fn state(&self) -> SessionState {
        match &self.serving {
            Some(serving) => SessionState::Serving(serving.server.addr()),
            None => SessionState::Stopped,
        }
    }

    /// Enter `Serving`: bind the server, then start watching.
    ///
    /// Calling this on a session that is already serving returns the
    /// bound address without rebinding.
    pub fn serve(&mut self) -> Result<SocketAddr> {
        if let Some(serving) = &self.serving {
            return Ok(serving.server.addr());
        }

        let source = self.project.source_dir();
        let source = fs::canonicalize(&source).map_err(|_| SiteError::Watch {
            message: format!("Source directory not found: {}", source.display()),
        })?;
        let filter = ChangeFilter::new(&self.project, &source)?;

        let config = &self.project.manifest.server;
        let server = serve::start(
            self.project.build_dir(),
            &config.host,
            config.port,
            self.reload.clone(),
        )?;

        let (tx, changes) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Access(_)) {
                        return;
                    }
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
                Err(e) => tracing::warn!(error = %e, "watch error"),
            },
            Config::default(),
        )
        .map_err(|e| SiteError::Watch {
            message: format!("Failed to initialize file watcher: {}", e),
        })?;
        watcher
            .watch(&source, RecursiveMode::Recursive)
            .map_err(|e| SiteError::Watch {
                message: format!("Failed to watch {}: {}", source.display(), e),
            })?;

        let addr = server.addr();
        self.printer.info("Serving", &server.url());
        self.printer.info("Watching", &display_path(&source));

        self.serving = Some(Serving {
            _watcher: watcher,
            changes,
            filter,
            server,
        });
        Ok(addr)
    }

    /// Wait up to `timeout` for changes and re-run the affected steps.
    ///
    /// Everything already queued behind the first change is handled in
    /// the same batch, so each step runs at most once per batch. Returns
    /// `None` if nothing relevant changed. Step failures are printed and
    /// left in the summary; only a dead watcher is an error.
    pub fn poll(&self, timeout: Duration) -> Result<Option<Rebuild>> {
        let serving = self.serving.as_ref().ok_or_else(|| SiteError::Watch {
            message: "session is not serving".to_string(),
        })?;

        let first = match serving.changes.recv_timeout(timeout) {
            Ok(path) => path,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(SiteError::Watch {
                    message: "file watcher stopped".to_string(),
                })
            }
        };

        let mut batch: Vec<PathBuf> = std::iter::once(first)
            .chain(serving.changes.try_iter())
            .collect();
        batch.sort();
        batch.dedup();

        let affected = serving.filter.classify(&batch);
        if affected.is_empty() {
            return Ok(None);
        }

        let changed: Vec<PathBuf> = batch
            .into_iter()
            .filter(|p| serving.filter.is_style(p) || serving.filter.is_markup(p))
            .collect();
        for path in &changed {
            self.printer.info("Changed", &display_path(path));
        }

        let mut graph = DependencyGraph::new();
        for task in affected.tasks() {
            graph.register(task);
        }

        let ctx = StepContext::with_reload(&self.project, &self.reload);
        let summary = run_graph(&graph, &ctx, &self.printer)?;
        for (_, err) in &summary.failed {
            self.printer.report(err);
        }

        Ok(Some(Rebuild { changed, summary }))
    }

    /// Serve and rebuild until the process is interrupted.
    pub fn run(mut self) -> Result<()> {
        self.serve()?;
        loop {
            self.poll(IDLE_POLL)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discovery::Manifest;
    use tempfile::tempdir;

    fn filter() -> ChangeFilter {
        let project = Project::new("/site", Manifest::default());
        ChangeFilter::new(&project, "/site/source").unwrap()
    }

    #[test]
    fn test_classify_style_change() {
        let affected = filter().classify(&[PathBuf::from("/site/source/sass/_variables.scss")]);
        assert_eq!(
            affected,
            Affected {
                styles: true,
                markup: false
            }
        );
        assert_eq!(affected.tasks(), vec![Task::CompileStyles]);
    }

    #[test]
    fn test_classify_markup_is_root_level_only() {
        let filter = filter();

        assert!(filter.classify(&[PathBuf::from("/site/source/index.html")]).markup);
        assert!(filter
            .classify(&[PathBuf::from("/site/source/partials/nav.html")])
            .is_empty());
    }

    #[test]
    fn test_classify_batch_touching_both() {
        let affected = filter().classify(&[
            PathBuf::from("/site/source/about.html"),
            PathBuf::from("/site/source/sass/style.scss"),
            PathBuf::from("/site/source/img/logo.png"),
        ]);

        assert_eq!(affected.tasks(), vec![Task::CompileStyles, Task::ProcessHtml]);
    }

    #[test]
    fn test_classify_ignores_other_trees() {
        let affected = filter().classify(&[
            PathBuf::from("/site/build/css/style.css"),
            PathBuf::from("/elsewhere/source/index.html"),
        ]);
        assert!(affected.is_empty());
    }

    #[test]
    fn test_new_session_is_stopped() {
        let dir = tempdir().unwrap();
        let session = DevSession::new(Project::new(dir.path(), Manifest::default()), Printer::new());

        assert_eq!(session.state(), SessionState::Stopped);
        assert!(session.poll(Duration::from_millis(1)).is_err());
    }

    #[test]
    fn test_serve_requires_source_tree() {
        let dir = tempdir().unwrap();
        let mut manifest = Manifest::default();
        manifest.server.port = 0;
        let mut session = DevSession::new(Project::new(dir.path(), manifest), Printer::new());

        let err = session.serve().unwrap_err();

        assert!(matches!(err, SiteError::Watch { .. }));
        assert_eq!(session.state(), SessionState::Stopped);
    }

    #[test]
    fn test_serve_transitions_once() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("source")).unwrap();
        let mut manifest = Manifest::default();
        manifest.server.port = 0;
        let mut session = DevSession::new(Project::new(dir.path(), manifest), Printer::new());

        let addr = session.serve().unwrap();

        assert_eq!(session.state(), SessionState::Serving(addr));
        assert_eq!(session.serve().unwrap(), addr);
        assert!(session.poll(Duration::from_millis(10)).unwrap().is_none());
    }
}
