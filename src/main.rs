use clap::Parser;
use miette::Result;
use sitekit::cli::{self, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli::init_logging(cli.verbose);

    cli::run(cli)?;

    Ok(())
}
