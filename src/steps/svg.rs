//! Helpers shared by the SVG rewriting steps.

use quick_xml::events::BytesStart;

/// Elements whose whitespace-only text is rendered.
const TEXT_ELEMENTS: &[&[u8]] = &[b"text", b"tspan", b"textPath", b"title", b"desc"];

/// Tracks whether whitespace-only text is significant at the current
/// position of a streaming reader.
///
/// Whitespace counts inside text content elements and wherever
/// `xml:space="preserve"` is in effect. Call [`enter`](Self::enter) for
/// every start tag and [`leave`](Self::leave) for every end tag that
/// reaches the writer.
#[derive(Debug, Default)]
pub(crate) struct Whitespace {
    scopes: Vec<bool>,
}

impl Whitespace {
    pub(crate) fn enter(&mut self, element: &BytesStart<'_>) {
        let inherited = self.is_significant();
        let is_text = TEXT_ELEMENTS.contains(&element.local_name().as_ref());
        let preserve = match element.try_get_attribute("xml:space") {
            Ok(Some(space)) => space.value.as_ref() == b"preserve",
            _ => inherited,
        };
        self.scopes.push(is_text || preserve);
    }

    pub(crate) fn leave(&mut self) {
        self.scopes.pop();
    }

    pub(crate) fn is_significant(&self) -> bool {
        self.scopes.last().copied().unwrap_or(false)
    }

    /// Whether `text` can be dropped without changing rendering.
    pub(crate) fn is_droppable(&self, text: &[u8]) -> bool {
        !self.is_significant() && text.iter().all(u8::is_ascii_whitespace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_elements_keep_whitespace() {
        let mut ws = Whitespace::default();
        ws.enter(&BytesStart::new("svg"));
        assert!(ws.is_droppable(b"\n  "));

        ws.enter(&BytesStart::new("text"));
        assert!(!ws.is_droppable(b" "));

        ws.enter(&BytesStart::new("a"));
        assert!(!ws.is_droppable(b" "));

        ws.leave();
        ws.leave();
        assert!(ws.is_droppable(b" "));
    }

    #[test]
    fn test_xml_space_scopes() {
        let mut ws = Whitespace::default();
        ws.enter(&BytesStart::from_content("g xml:space=\"preserve\"", 1));
        assert!(ws.is_significant());

        ws.enter(&BytesStart::from_content("g xml:space=\"default\"", 1));
        assert!(!ws.is_significant());

        ws.leave();
        assert!(ws.is_significant());
    }
}
