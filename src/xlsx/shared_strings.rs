//! Shared string table loading.

use crate::container::Archive;
use crate::error::Result;
use crate::xml::{Element, XName};
use std::io::{Read, Seek};

/// Archive entry holding the shared string table.
pub const SHARED_STRINGS_ENTRY: &str = "xl/sharedStrings.xml";

const SI: XName = XName::sml("si");
const T: XName = XName::sml("t");

/// Strings referenced by index from `t="s"` cells.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SharedStrings {
    /// Items in `si` order
    strings: Vec<String>,
}

impl SharedStrings {
    /// Load the table from an archive.
    ///
    /// A workbook without a shared strings part is valid and yields an empty table.
    pub fn load<R: Read + Seek>(archive: &Archive<R>) -> Result<Self> {
        if !archive.contains(SHARED_STRINGS_ENTRY) {
            tracing::debug!("no shared strings part");
            return Ok(Self::default());
        }
        let xml = archive.read_xml(SHARED_STRINGS_ENTRY)?;
        let table = Self::parse(&xml)?;
        tracing::debug!(count = table.len(), "loaded shared strings");
        Ok(table)
    }

    /// Parse the table from `xl/sharedStrings.xml` content.
    ///
    /// Each `si` item becomes the concatenation of all of its `t` runs.
    pub fn parse(xml: &str) -> Result<Self> {
        let root = Element::parse(SHARED_STRINGS_ENTRY, xml)?;
        let strings = root.children(SI).map(|si| si.joined_text(T)).collect();
        Ok(Self { strings })
    }

    /// String at a zero-based index.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.strings.get(index).map(|s| s.as_str())
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl From<Vec<String>> for SharedStrings {
    fn from(strings: Vec<String>) -> Self {
        Self { strings }
    }
}
