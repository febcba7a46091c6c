pub mod build;
pub mod completions;
pub mod init;
pub mod watch;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::error::Result;
use crate::output::Printer;
use crate::pipeline::Task;

/// sitekit - static-site asset pipeline
#[derive(Parser, Debug)]
#[command(name = "sitekit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Project root (where sitekit.yaml lives)
    #[arg(long, global = true, default_value = ".")]
    pub root: PathBuf,

    /// Show debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run (default: build, then watch)
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Delete the output tree
    Clean,

    /// Optimize source images into the output tree
    OptimizeImages,

    /// Compile, prefix and minify the style sheets
    CompileStyles,

    /// Minify the markup files
    ProcessHtml,

    /// Write WebP siblings of the optimized raster images
    CreateWebp,

    /// Assemble the icon sprite
    AssembleSprite,

    /// Serve the output tree and rebuild styles and markup on change
    Watch,

    /// Run the full build
    Build,

    /// Run the full build, then watch
    Default,

    /// Initialize a sitekit project (generates sitekit.yaml)
    Init(init::InitArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}

impl Commands {
    /// The single task a step command runs.
    pub fn task(&self) -> Option<Task> {
        match self {
            Commands::Clean => Some(Task::Clean),
            Commands::OptimizeImages => Some(Task::OptimizeImages),
            Commands::CompileStyles => Some(Task::CompileStyles),
            Commands::ProcessHtml => Some(Task::ProcessHtml),
            Commands::CreateWebp => Some(Task::CreateWebp),
            Commands::AssembleSprite => Some(Task::AssembleSprite),
            _ => None,
        }
    }
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) {
    let fallback = if verbose { "sitekit=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Dispatch a parsed command line.
pub fn run(cli: Cli) -> Result<()> {
    let Cli { root, command, .. } = cli;
    let printer = Printer::new();

    match command.unwrap_or(Commands::Default) {
        Commands::Init(args) => init::run(&root, args, &printer),
        Commands::Completions(args) => completions::run(args),
        Commands::Build => build::run_build(&root, &printer),
        Commands::Default => build::run_default(&root, printer),
        Commands::Watch => watch::run(&root, printer),
        step => match step.task() {
            Some(task) => build::run_step(&root, task, &printer),
            None => Ok(()),
        },
    }
}
