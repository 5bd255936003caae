//! Namespace-aware XML document queries.
//!
//! Package parts are small enough to load whole, so they are parsed into an
//! [`Element`] tree and queried with qualified names ([`XName`]) instead of
//! matching prefixed tag names, which differ between producers.

use crate::error::{Error, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::NsReader;

/// SpreadsheetML main namespace.
pub const SPREADSHEET_ML: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";

/// Office document relationships namespace (the `r:` prefix in a workbook).
pub const OFFICE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

/// Package relationships namespace (root of `.rels` parts).
pub const PACKAGE_RELATIONSHIPS: &str =
    "http://schemas.openxmlformats.org/package/2006/relationships";

/// A namespace-qualified element or attribute name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XName {
    pub namespace: &'static str,
    pub local: &'static str,
}

impl XName {
    pub const fn new(namespace: &'static str, local: &'static str) -> Self {
        Self { namespace, local }
    }

    /// Name in the SpreadsheetML main namespace.
    pub const fn sml(local: &'static str) -> Self {
        Self::new(SPREADSHEET_ML, local)
    }

    /// Check a name resolved by [`NsReader`] against this one.
    pub fn matches(&self, ns: &ResolveResult<'_>, local: &[u8]) -> bool {
        match ns {
            ResolveResult::Bound(Namespace(uri)) => {
                *uri == self.namespace.as_bytes() && local == self.local.as_bytes()
            }
            _ => false,
        }
    }

    fn is(&self, namespace: Option<&str>, local: &str) -> bool {
        namespace == Some(self.namespace) && local == self.local
    }
}

pub(crate) const TEXT_OUTSIDE_ROOT: &str = "text outside the root element";
pub(crate) const MULTIPLE_ROOTS: &str = "multiple root elements";

/// Whitespace-only character data, which is allowed around the root element.
pub(crate) fn is_blank(text: &[u8]) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

#[derive(Debug, Clone)]
struct Attribute {
    namespace: Option<String>,
    local: String,
    value: String,
}

/// Child node of an [`Element`].
#[derive(Debug, Clone)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// A parsed XML element with resolved namespaces.
#[derive(Debug, Clone)]
pub struct Element {
    namespace: Option<String>,
    local: String,
    attributes: Vec<Attribute>,
    children: Vec<Node>,
}

impl Element {
    /// Parse a whole document and return its root element.
    ///
    /// `entry` names the archive entry in error messages.
    pub fn parse(entry: &str, xml: &str) -> Result<Element> {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().trim_text(false);

        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            let event = reader.read_event().map_err(|e| Error::malformed(entry, e))?;
            match event {
                Event::Start(e) => {
                    let element = Self::from_start(&reader, entry, &e)?;
                    stack.push(element);
                }
                Event::Empty(e) => {
                    let element = Self::from_start(&reader, entry, &e)?;
                    attach(entry, &mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::malformed(entry, "unmatched end tag"))?;
                    attach(entry, &mut stack, &mut root, element)?;
                }
                Event::Text(e) => match stack.last_mut() {
                    Some(parent) => {
                        let text = e.unescape().map_err(|e| Error::malformed(entry, e))?;
                        parent.children.push(Node::Text(text.into_owned()));
                    }
                    None if is_blank(&e) => {}
                    None => return Err(Error::malformed(entry, TEXT_OUTSIDE_ROOT)),
                },
                Event::CData(e) => match stack.last_mut() {
                    Some(parent) => {
                        let raw = e.into_inner();
                        parent
                            .children
                            .push(Node::Text(String::from_utf8_lossy(&raw).into_owned()));
                    }
                    None => return Err(Error::malformed(entry, TEXT_OUTSIDE_ROOT)),
                },
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::malformed(entry, "unexpected end of document"));
        }
        root.ok_or_else(|| Error::malformed(entry, "no root element"))
    }

    fn from_start(reader: &NsReader<&[u8]>, entry: &str, start: &BytesStart<'_>) -> Result<Element> {
        let (ns, local) = reader.resolve_element(start.name());
        let namespace = namespace_uri(&ns);
        let local = String::from_utf8_lossy(local.as_ref()).into_owned();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| Error::malformed(entry, e))?;
            if attr.key.as_namespace_binding().is_some() {
                continue;
            }
            let (ns, attr_local) = reader.resolve_attribute(attr.key);
            let value = attr
                .unescape_value()
                .map_err(|e| Error::malformed(entry, e))?
                .into_owned();
            attributes.push(Attribute {
                namespace: namespace_uri(&ns),
                local: String::from_utf8_lossy(attr_local.as_ref()).into_owned(),
                value,
            });
        }

        Ok(Element {
            namespace,
            local,
            attributes,
            children: Vec::new(),
        })
    }

    /// Namespace URI, if the element is bound to one.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Check whether this element has the given qualified name.
    pub fn is(&self, name: XName) -> bool {
        name.is(self.namespace(), &self.local)
    }

    /// Value of an unqualified attribute.
    pub fn attr(&self, local: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.namespace.is_none() && a.local == local)
            .map(|a| a.value.as_str())
    }

    /// Value of a namespace-qualified attribute.
    pub fn attr_ns(&self, name: XName) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| name.is(a.namespace.as_deref(), &a.local))
            .map(|a| a.value.as_str())
    }

    /// Child elements, in document order.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|node| match node {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// Child elements with the given name, in document order.
    pub fn children(&self, name: XName) -> impl Iterator<Item = &Element> {
        self.elements().filter(move |e| e.is(name))
    }

    /// First child element with the given name.
    pub fn child(&self, name: XName) -> Option<&Element> {
        self.children(name).next()
    }

    /// All descendant elements with the given name, in document order.
    pub fn descendants(&self, name: XName) -> Vec<&Element> {
        let mut found = Vec::new();
        self.collect_descendants(name, &mut found);
        found
    }

    fn collect_descendants<'a>(&'a self, name: XName, found: &mut Vec<&'a Element>) {
        for child in self.elements() {
            if child.is(name) {
                found.push(child);
            }
            child.collect_descendants(name, found);
        }
    }

    /// Character content directly inside this element.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|node| match node {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    /// Concatenated text of every descendant named `name`, with no separator.
    pub fn joined_text(&self, name: XName) -> String {
        self.descendants(name).iter().map(|e| e.text()).collect()
    }
}

fn attach(
    entry: &str,
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> Result<()> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(Node::Element(element)),
        None if root.is_none() => *root = Some(element),
        None => return Err(Error::malformed(entry, MULTIPLE_ROOTS)),
    }
    Ok(())
}

fn namespace_uri(ns: &ResolveResult<'_>) -> Option<String> {
    match ns {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SI: XName = XName::sml("si");
    const T: XName = XName::sml("t");
    const R_ID: XName = XName::new(OFFICE_RELATIONSHIPS, "id");

    #[test]
    fn test_prefix_independent_matching() {
        let xml = r#"<x:workbook xmlns:x="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
    xmlns:rel="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <x:sheets><x:sheet name="Book" sheetId="1" rel:id="rId3"/></x:sheets>
</x:workbook>"#;
        let root = Element::parse("xl/workbook.xml", xml).unwrap();
        assert!(root.is(XName::sml("workbook")));

        let sheet = root
            .child(XName::sml("sheets"))
            .and_then(|s| s.child(XName::sml("sheet")))
            .unwrap();
        assert_eq!(sheet.attr("name"), Some("Book"));
        assert_eq!(sheet.attr_ns(R_ID), Some("rId3"));
        assert_eq!(sheet.attr("id"), None);
    }

    #[test]
    fn test_other_namespace_ignored() {
        let xml = r#"<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
     xmlns:o="urn:other">
  <si><t>a</t></si><o:si><o:t>b</o:t></o:si><si><t>c</t></si>
</sst>"#;
        let root = Element::parse("sst", xml).unwrap();
        let items: Vec<String> = root.children(SI).map(|si| si.joined_text(T)).collect();
        assert_eq!(items, vec!["a", "c"]);
    }

    #[test]
    fn test_joined_text_keeps_whitespace_and_entities() {
        let xml = r#"<si xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><r><t xml:space="preserve">Smith &amp; </t></r><r><t>Sons</t></r></si>"#;
        let root = Element::parse("si", xml).unwrap();
        assert_eq!(root.joined_text(T), "Smith & Sons");
    }

    #[test]
    fn test_whitespace_around_root_allowed() {
        let xml = "<?xml version=\"1.0\"?>\r\n  <sst/>\n";
        assert!(Element::parse("xl/sharedStrings.xml", xml).is_ok());
    }

    #[test]
    fn test_malformed_documents() {
        for xml in [
            "<sst><si></sst>",
            "<sst><si>",
            "plain text",
            "",
            "<a/><b/>",
            "<a x=\"1\" x=\"2\"/>",
            "junk<sst/>",
            "<sst/>junk",
            "<sst/><![CDATA[x]]>",
        ] {
            let err = Element::parse("xl/sharedStrings.xml", xml).unwrap_err();
            assert!(
                matches!(err, Error::MalformedDocument { ref entry, .. } if entry == "xl/sharedStrings.xml"),
                "expected malformed for {xml:?}, got {err:?}"
            );
        }
    }
}
