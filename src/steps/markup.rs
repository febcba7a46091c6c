//! Markup minification.
//!
//! Copies every top-level markup file into the output root with
//! insignificant whitespace collapsed.

use minify_html::Cfg;

use crate::discovery::scan_glob;
use crate::error::{Result, SiteError};

use super::{read_input, write_output, StepContext, StepReport};

/// Minifier settings: collapse whitespace, keep everything a reader of the
/// output would still expect to find (comments, optional tags, doctype).
fn minifier_config() -> Cfg {
    Cfg {
        do_not_minify_doctype: true,
        keep_closing_tags: true,
        keep_comments: true,
        keep_html_and_head_opening_tags: true,
        ..Cfg::default()
    }
}

/// Minify a single document.
pub fn minify(source: &[u8]) -> Vec<u8> {
    minify_html::minify(source, &minifier_config())
}

pub fn run(ctx: &StepContext<'_>) -> Result<StepReport> {
    let project = ctx.project;
    let source_dir = project.source_dir();
    let build_dir = project.build_dir();

    let mut outputs = Vec::new();

    for path in scan_glob(&source_dir, &project.manifest.markup)? {
        let source = read_input(&path)?;
        if let Err(e) = std::str::from_utf8(&source) {
            return Err(SiteError::Markup {
                path,
                message: format!("not valid UTF-8: {}", e),
            });
        }

        let relative = path.strip_prefix(&source_dir).unwrap_or(&path);
        let target = build_dir.join(relative);

        write_output(&target, minify(&source))?;
        outputs.push(target);
    }

    if let Some(reload) = ctx.reload {
        reload.reload_page();
    }

    Ok(StepReport::new(outputs))
}
