//! sitekit - static-site asset pipeline
//!
//! Compiles style sheets, minifies markup, optimizes images, derives WebP
//! copies, assembles an SVG icon sprite, and serves the result with live
//! reload. Each step is a named task; composite pipelines schedule them
//! over a dependency graph.

pub mod cli;
pub mod discovery;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod serve;
pub mod steps;
pub mod watch;

pub use discovery::{discover, Manifest, Project};
pub use error::{Result, SiteError};
pub use pipeline::{build, build_graph, run_task, DependencyGraph, RunSummary, Task};
pub use serve::{LiveReload, ReloadEvent};
pub use steps::{StepContext, StepReport};
pub use watch::{DevSession, SessionState};
