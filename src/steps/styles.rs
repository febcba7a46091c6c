//! Style sheet compilation.
//!
//! The entry Sass file is compiled with `grass`, then printed twice with
//! `lightningcss`: once readable, once prefixed for the configured browser
//! targets and minified. Each CSS file gets a source map next to it.
//!
//! grass emits no Sass source map, so both maps describe CSS: the readable
//! map points at the compiled CSS and the minified map at `style.css`.

use std::path::{Path, PathBuf};

use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;

use crate::error::{Result, SiteError};

use super::{write_output, StepContext, StepReport};

/// The four artifacts of one compilation.
#[derive(Debug, Clone)]
pub struct CompiledStyles {
    pub css: String,
    pub css_map: String,
    pub min_css: String,
    pub min_map: String,
}

/// Resolve browserslist queries into lightningcss targets.
pub fn resolve_targets(queries: &[String]) -> Result<Targets> {
    if queries.is_empty() {
        return Ok(Targets::default());
    }

    let browsers = Browsers::from_browserslist(queries.iter()).map_err(|e| SiteError::Config {
        message: format!("Invalid browser targets {:?}: {}", queries, e),
        help: Some("styles.targets takes browserslist queries such as \"defaults\"".to_string()),
    })?;

    Ok(Targets {
        browsers,
        ..Targets::default()
    })
}

/// Compile a Sass entry file into plain CSS.
pub fn compile_sass(entry: &Path) -> Result<String> {
    let options = grass::Options::default().style(grass::OutputStyle::Expanded);

    grass::from_path(entry, &options).map_err(|e| SiteError::Style {
        path: entry.to_path_buf(),
        message: e.to_string(),
        help: Some("Fix the Sass source and save again".to_string()),
    })
}

/// Run both CSS passes over compiled Sass output.
///
/// `css_name` labels the sources of both maps: the compiled CSS printed
/// as the readable file, and that file feeding the minified pass.
pub fn process_css(
    compiled: &str,
    css_name: &str,
    targets: Targets,
    entry: &Path,
) -> Result<CompiledStyles> {
    let style_error = |message: String| SiteError::Style {
        path: entry.to_path_buf(),
        message,
        help: None,
    };

    let (css, css_map) = print_css(compiled, css_name, None).map_err(style_error)?;
    let (min_css, min_map) = print_css(&css, css_name, Some(targets)).map_err(style_error)?;

    Ok(CompiledStyles {
        css,
        css_map,
        min_css,
        min_map,
    })
}

/// Parse and print one stylesheet with a source map.
///
/// With `targets`, the sheet is prefixed and minified; without, it is
/// printed as-is.
fn print_css(
    code: &str,
    filename: &str,
    targets: Option<Targets>,
) -> std::result::Result<(String, String), String> {
    let options = ParserOptions {
        filename: filename.to_string(),
        ..ParserOptions::default()
    };
    let mut stylesheet = StyleSheet::parse(code, options).map_err(|e| e.to_string())?;

    if let Some(targets) = targets {
        stylesheet
            .minify(MinifyOptions {
                targets,
                ..MinifyOptions::default()
            })
            .map_err(|e| e.to_string())?;
    }

    let mut source_map = SourceMap::new("/");
    source_map.add_source(filename);
    source_map
        .set_source_content(0, code)
        .map_err(|e| format!("Failed to embed source: {:?}", e))?;

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify: targets.is_some(),
            source_map: Some(&mut source_map),
            targets: targets.unwrap_or_default(),
            ..PrinterOptions::default()
        })
        .map_err(|e| e.to_string())?;

    let map = source_map
        .to_json(None)
        .map_err(|e| format!("Failed to write source map: {:?}", e))?;

    Ok((printed.code, map))
}

/// Append the source map reference to a printed sheet.
fn with_map_url(css: &str, css_file: &str) -> String {
    format!("{}\n/*# sourceMappingURL={}.map */\n", css.trim_end(), css_file)
}

pub fn run(ctx: &StepContext<'_>) -> Result<StepReport> {
    let project = ctx.project;
    let entry = project.style_entry();

    let stem = entry
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("style")
        .to_string();
    let css_file = format!("{}.css", stem);
    let min_file = format!("{}.min.css", stem);

    let targets = resolve_targets(&project.manifest.styles.targets)?;
    let compiled = compile_sass(&entry)?;
    let styles = process_css(&compiled, &css_file, targets, &entry)?;

    let css_dir = project.css_dir();
    let outputs: Vec<PathBuf> = vec![
        css_dir.join(&css_file),
        css_dir.join(format!("{}.map", css_file)),
        css_dir.join(&min_file),
        css_dir.join(format!("{}.map", min_file)),
    ];

    write_output(&outputs[0], with_map_url(&styles.css, &css_file))?;
    write_output(&outputs[1], &styles.css_map)?;
    write_output(&outputs[2], with_map_url(&styles.min_css, &min_file))?;
    write_output(&outputs[3], &styles.min_map)?;

    if let Some(reload) = ctx.reload {
        reload.reload_stylesheets(vec![
            project.url_path(&outputs[0]),
            project.url_path(&outputs[2]),
        ]);
    }

    Ok(StepReport::new(outputs))
}
