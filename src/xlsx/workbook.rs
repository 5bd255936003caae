//! Workbook sheet list and relationship resolution.

use crate::container::Archive;
use crate::error::{Error, Result};
use crate::xml::{Element, XName, OFFICE_RELATIONSHIPS, PACKAGE_RELATIONSHIPS};
use std::collections::HashMap;
use std::io::{Read, Seek};

/// Workbook part.
pub const WORKBOOK_ENTRY: &str = "xl/workbook.xml";

/// Relationship part of the workbook.
pub const WORKBOOK_RELS_ENTRY: &str = "xl/_rels/workbook.xml.rels";

/// Directory that workbook relationship targets are relative to.
pub const PACKAGE_DIR: &str = "xl/";

const SHEETS: XName = XName::sml("sheets");
const SHEET: XName = XName::sml("sheet");
const SHEET_REL_ID: XName = XName::new(OFFICE_RELATIONSHIPS, "id");
const RELATIONSHIP: XName = XName::new(PACKAGE_RELATIONSHIPS, "Relationship");

/// Sheet info from workbook.xml.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetInfo {
    pub name: String,
    pub sheet_id: String,
    pub rel_id: String,
}

/// A relationship entry from a .rels part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID (e.g., "rId1")
    pub id: String,
    /// Relationship type URI
    pub rel_type: String,
    /// Target path (relative or absolute)
    pub target: String,
}

/// Relationship id to target mapping parsed from a .rels part.
#[derive(Debug, Clone, Default)]
pub struct Relationships {
    by_id: HashMap<String, Relationship>,
}

impl Relationships {
    /// Parse the workbook relationship part.
    pub fn parse(xml: &str) -> Result<Self> {
        let root = Element::parse(WORKBOOK_RELS_ENTRY, xml)?;
        let mut rels = Self::default();
        for rel in root.children(RELATIONSHIP) {
            let (Some(id), Some(target)) = (rel.attr("Id"), rel.attr("Target")) else {
                continue;
            };
            rels.add(Relationship {
                id: id.to_string(),
                rel_type: rel.attr("Type").unwrap_or_default().to_string(),
                target: target.to_string(),
            });
        }
        Ok(rels)
    }

    /// Add a relationship.
    pub fn add(&mut self, rel: Relationship) {
        self.by_id.insert(rel.id.clone(), rel);
    }

    /// Get a relationship by ID.
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.by_id.get(id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// The first sheet together with its archive entry path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSheet {
    pub sheet: SheetInfo,
    pub path: String,
}

/// Every sheet declared in workbook.xml, in order.
pub fn parse_sheets(xml: &str) -> Result<Vec<SheetInfo>> {
    let root = Element::parse(WORKBOOK_ENTRY, xml)?;
    let Some(sheets) = root.child(SHEETS) else {
        return Ok(Vec::new());
    };

    sheets
        .children(SHEET)
        .map(|sheet| {
            let rel_id = sheet.attr_ns(SHEET_REL_ID).ok_or_else(|| {
                Error::malformed(WORKBOOK_ENTRY, "sheet element has no r:id attribute")
            })?;
            Ok(SheetInfo {
                name: sheet.attr("name").unwrap_or_default().to_string(),
                sheet_id: sheet.attr("sheetId").unwrap_or_default().to_string(),
                rel_id: rel_id.to_string(),
            })
        })
        .collect()
}

/// Map a workbook relationship target to an archive entry path.
///
/// Leading separators are dropped and the `xl/` prefix is only added when the
/// target does not already carry it, so `worksheets/sheet1.xml`,
/// `/xl/worksheets/sheet1.xml` and `xl/worksheets/sheet1.xml` all resolve to
/// the same entry.
pub fn resolve_target(target: &str) -> String {
    let trimmed = target.trim_start_matches('/');
    if trimmed.starts_with(PACKAGE_DIR) {
        normalize(trimmed)
    } else {
        normalize(&format!("{}{}", PACKAGE_DIR, trimmed))
    }
}

fn normalize(path: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    for part in path.split(['/', '\\']) {
        match part {
            "" | "." => {}
            ".." => {
                out.pop();
            }
            other => out.push(other),
        }
    }
    out.join("/")
}

/// Find the first declared sheet and the entry that holds it.
pub fn resolve_first_sheet<R: Read + Seek>(archive: &Archive<R>) -> Result<ResolvedSheet> {
    let sheets = parse_sheets(&archive.read_xml(WORKBOOK_ENTRY)?)?;
    let rels = Relationships::parse(&archive.read_xml(WORKBOOK_RELS_ENTRY)?)?;

    let sheet = sheets.into_iter().next().ok_or(Error::MissingSheet)?;
    let rel = rels
        .get(&sheet.rel_id)
        .ok_or_else(|| Error::MissingRelationship(sheet.rel_id.clone()))?;
    let path = resolve_target(&rel.target);

    tracing::debug!(
        sheet = %sheet.name,
        rel_type = %rel.rel_type,
        path = %path,
        "resolved first sheet"
    );
    Ok(ResolvedSheet { sheet, path })
}
