//! SVG sprite assembly.
//!
//! Every icon in the output icon directory becomes a `<symbol>` of one
//! inline sprite document, keyed by its file stem. `fill` attributes are
//! removed everywhere so icons take their colour from the page's CSS.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};

use crate::discovery::scan_glob;
use crate::error::{Result, SiteError};

use super::svg::Whitespace;
use super::{read_input_string, write_output, StepContext, StepReport};

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Root attributes carried from an icon's `<svg>` onto its `<symbol>`.
const SYMBOL_ATTRIBUTES: &[&[u8]] = &[b"viewBox", b"preserveAspectRatio"];

/// One icon document.
#[derive(Debug, Clone)]
pub struct Icon {
    /// Symbol identifier (the file stem).
    pub id: String,
    pub path: PathBuf,
    pub source: String,
}

impl Icon {
    pub fn load(path: &Path) -> Result<Self> {
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        Ok(Self {
            id,
            path: path.to_path_buf(),
            source: read_input_string(path)?,
        })
    }
}

fn sprite_error(icon: &Icon, message: impl std::fmt::Display) -> SiteError {
    SiteError::Sprite {
        message: format!("{}: {}", icon.path.display(), message),
        help: None,
    }
}

/// Copy a start tag without its `fill` attribute.
fn without_fill(element: &BytesStart<'_>, icon: &Icon) -> Result<BytesStart<'static>> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut cleaned = BytesStart::new(name);

    for attribute in element.attributes() {
        let attribute = attribute.map_err(|e| sprite_error(icon, e))?;
        if attribute.key.as_ref() != b"fill" {
            cleaned.push_attribute(attribute);
        }
    }

    Ok(cleaned.into_owned())
}

/// Fail when two icons claim the same symbol identifier.
fn check_unique_ids(icons: &[Icon]) -> Result<()> {
    let mut seen: BTreeMap<&str, &Path> = BTreeMap::new();

    for icon in icons {
        if let Some(first) = seen.insert(icon.id.as_str(), icon.path.as_path()) {
            return Err(SiteError::Sprite {
                message: format!(
                    "duplicate symbol id \"{}\" ({} and {})",
                    icon.id,
                    first.display(),
                    icon.path.display()
                ),
                help: Some("Rename one of the icons; symbol ids are not prefixed".to_string()),
            });
        }
    }

    Ok(())
}

/// Accumulates symbols and hoisted definitions across icons.
struct SpriteBuilder {
    symbols: Writer<Vec<u8>>,
    defs: Writer<Vec<u8>>,
    namespaces: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl SpriteBuilder {
    fn new() -> Self {
        Self {
            symbols: Writer::new(Vec::new()),
            defs: Writer::new(Vec::new()),
            namespaces: BTreeMap::new(),
        }
    }

    fn write(&mut self, in_defs: bool, event: Event<'_>, icon: &Icon) -> Result<()> {
        let writer = if in_defs {
            &mut self.defs
        } else {
            &mut self.symbols
        };
        writer.write_event(event).map_err(|e| sprite_error(icon, e))
    }

    /// Turn the icon's root `<svg>` into its `<symbol>` start tag.
    fn symbol_start(&mut self, root: &BytesStart<'_>, icon: &Icon) -> Result<BytesStart<'static>> {
        if root.name().as_ref() != b"svg" {
            return Err(sprite_error(icon, "root element is not <svg>"));
        }

        let mut symbol = BytesStart::new("symbol");
        symbol.push_attribute(("id", icon.id.as_str()));

        for attribute in root.attributes() {
            let attribute = attribute.map_err(|e| sprite_error(icon, e))?;
            let key = attribute.key.as_ref();

            if SYMBOL_ATTRIBUTES.contains(&key) {
                symbol.push_attribute(attribute);
            } else if key.starts_with(b"xmlns:") {
                self.namespaces
                    .entry(key.to_vec())
                    .or_insert_with(|| attribute.value.to_vec());
            }
        }

        Ok(symbol.into_owned())
    }

    fn add(&mut self, icon: &Icon) -> Result<()> {
        let mut reader = Reader::from_str(&icon.source);
        // Element depth; 1 is the root <svg>.
        let mut depth = 0usize;
        // Depth within a hoisted <defs>; 1 is the <defs> element itself.
        let mut in_defs = 0usize;
        let mut whitespace = Whitespace::default();

        loop {
            let event = reader.read_event().map_err(|e| sprite_error(icon, e))?;

            match event {
                Event::Eof => break,
                Event::Decl(_) | Event::DocType(_) | Event::Comment(_) | Event::PI(_) => {}
                Event::Text(text) if whitespace.is_droppable(&text) => {}
                Event::Start(e) => {
                    whitespace.enter(&e);
                    if depth == 0 {
                        let symbol = self.symbol_start(&e, icon)?;
                        self.write(false, Event::Start(symbol), icon)?;
                    } else if depth == 1 && e.name().as_ref() == b"defs" {
                        in_defs = 1;
                    } else {
                        let element = without_fill(&e, icon)?;
                        self.write(in_defs > 0, Event::Start(element), icon)?;
                        if in_defs > 0 {
                            in_defs += 1;
                        }
                    }
                    depth += 1;
                }
                Event::Empty(e) => {
                    if depth == 0 {
                        let symbol = self.symbol_start(&e, icon)?;
                        self.write(false, Event::Empty(symbol), icon)?;
                    } else if !(depth == 1 && e.name().as_ref() == b"defs") {
                        let element = without_fill(&e, icon)?;
                        self.write(in_defs > 0, Event::Empty(element), icon)?;
                    }
                }
                Event::End(e) => {
                    whitespace.leave();
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        self.write(false, Event::End(BytesEnd::new("symbol")), icon)?;
                    } else if in_defs == 1 {
                        in_defs = 0;
                    } else {
                        self.write(in_defs > 0, Event::End(e), icon)?;
                        in_defs = in_defs.saturating_sub(1);
                    }
                }
                other => {
                    if depth > 0 {
                        self.write(in_defs > 0, other, icon)?;
                    }
                }
            }
        }

        Ok(())
    }

    fn finish(self) -> Vec<u8> {
        let mut root = BytesStart::new("svg");
        root.push_attribute(("xmlns", SVG_NAMESPACE));
        for (name, value) in &self.namespaces {
            root.push_attribute(Attribute::from((name.as_slice(), value.as_slice())));
        }

        let mut out = Writer::new(Vec::new());
        // Writing into a Vec cannot fail.
        let _ = out.write_event(Event::Start(root));

        let defs = self.defs.into_inner();
        if !defs.is_empty() {
            out.get_mut().extend_from_slice(b"<defs>");
            out.get_mut().extend_from_slice(&defs);
            out.get_mut().extend_from_slice(b"</defs>");
        }
        out.get_mut().extend_from_slice(&self.symbols.into_inner());

        let _ = out.write_event(Event::End(BytesEnd::new("svg")));
        out.into_inner()
    }
}

/// Merge icons into one inline sprite document.
pub fn assemble_sprite(icons: &[Icon]) -> Result<Vec<u8>> {
    check_unique_ids(icons)?;

    let mut builder = SpriteBuilder::new();
    for icon in icons {
        builder.add(icon)?;
    }

    Ok(builder.finish())
}

/// Symbol identifiers present in a sprite document, in document order.
pub fn symbol_ids(sprite: &str) -> Result<Vec<String>> {
    let mut reader = Reader::from_str(sprite);
    let mut ids = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"symbol" => {
                if let Ok(Some(id)) = e.try_get_attribute("id") {
                    ids.push(String::from_utf8_lossy(&id.value).into_owned());
                }
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(SiteError::Sprite {
                    message: format!("Invalid sprite document: {}", e),
                    help: None,
                })
            }
        }
    }

    Ok(ids)
}

pub fn run(ctx: &StepContext<'_>) -> Result<StepReport> {
    let project = ctx.project;

    let icons = scan_glob(&project.build_icons_dir(), "*.svg")?
        .iter()
        .map(|path| Icon::load(path))
        .collect::<Result<Vec<_>>>()?;

    let sprite = assemble_sprite(&icons)?;
    let target = project.sprite_path();
    write_output(&target, sprite)?;

    tracing::debug!(symbols = icons.len(), "assembled sprite");

    Ok(StepReport::new(vec![target]))
}
