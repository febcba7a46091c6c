//! Watch command implementation.

use std::path::Path;

use crate::discovery::discover;
use crate::error::Result;
use crate::output::Printer;
use crate::watch::DevSession;

/// Serve the output tree and rebuild on change until interrupted.
pub fn run(root: &Path, printer: Printer) -> Result<()> {
    let project = discover(root)?;
    DevSession::new(project, printer).run()
}
