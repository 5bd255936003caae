//! Streaming worksheet row extraction.

use super::shared_strings::SharedStrings;
use crate::error::{Error, Result};
use crate::xml::{is_blank, XName, MULTIPLE_ROOTS, TEXT_OUTSIDE_ROOT};
use quick_xml::events::{BytesStart, Event};
use quick_xml::NsReader;

/// A worksheet row: cell values in document order.
pub type Row = Vec<String>;

const SHEET_DATA: XName = XName::sml("sheetData");
const ROW: XName = XName::sml("row");
const CELL: XName = XName::sml("c");
const VALUE: XName = XName::sml("v");
const INLINE_STRING: XName = XName::sml("is");
const TEXT: XName = XName::sml("t");

/// Cell type marker for shared string references.
const SHARED_STRING_TYPE: &str = "s";

/// Role of an open element relative to the row grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    SheetData,
    Row,
    Cell,
    Value,
    InlineString,
    InlineText,
    Other,
}

#[derive(Debug, Default)]
struct PendingCell {
    cell_type: Option<String>,
    value: Option<String>,
    inline: Option<String>,
}

/// Iterator over the rows of one worksheet part.
///
/// Rows are yielded as soon as their closing tag is read; each `row`
/// element directly under `sheetData` yields exactly one [`Row`] holding one
/// value per `c` element, without filling column gaps.
pub struct RowReader<'a> {
    reader: NsReader<&'a [u8]>,
    shared_strings: &'a SharedStrings,
    entry: String,
    open: Vec<Tag>,
    seen_root: bool,
    row: Option<Row>,
    cell: Option<PendingCell>,
    done: bool,
}

impl<'a> RowReader<'a> {
    /// Create a reader over worksheet XML.
    ///
    /// `entry` names the archive entry in error messages.
    pub fn new(entry: &str, xml: &'a str, shared_strings: &'a SharedStrings) -> Self {
        let mut reader = NsReader::from_str(xml);
        reader.config_mut().trim_text(false);
        Self {
            reader,
            shared_strings,
            entry: entry.to_string(),
            open: Vec::new(),
            seen_root: false,
            row: None,
            cell: None,
            done: false,
        }
    }

    fn classify(&self, start: &BytesStart<'_>) -> Tag {
        let (ns, local) = self.reader.resolve_element(start.name());
        let local = local.as_ref();
        let inside_inline = self.open.contains(&Tag::InlineString);
        match self.open.last() {
            _ if inside_inline && TEXT.matches(&ns, local) => Tag::InlineText,
            _ if inside_inline => Tag::Other,
            Some(Tag::SheetData) if ROW.matches(&ns, local) => Tag::Row,
            Some(Tag::Row) if CELL.matches(&ns, local) => Tag::Cell,
            Some(Tag::Cell) if VALUE.matches(&ns, local) => Tag::Value,
            Some(Tag::Cell) if INLINE_STRING.matches(&ns, local) => Tag::InlineString,
            _ if SHEET_DATA.matches(&ns, local) => Tag::SheetData,
            _ => Tag::Other,
        }
    }

    fn open_tag(&mut self, start: &BytesStart<'_>) -> Result<Tag> {
        if self.open.is_empty() {
            if self.seen_root {
                return Err(Error::malformed(&self.entry, MULTIPLE_ROOTS));
            }
            self.seen_root = true;
        }
        let tag = self.classify(start);
        match tag {
            Tag::Row => self.row = Some(Row::new()),
            Tag::Cell => {
                let cell_type = match start
                    .try_get_attribute("t")
                    .map_err(|e| Error::malformed(&self.entry, e))?
                {
                    Some(attr) => Some(
                        attr.unescape_value()
                            .map_err(|e| Error::malformed(&self.entry, e))?
                            .into_owned(),
                    ),
                    None => None,
                };
                self.cell = Some(PendingCell {
                    cell_type,
                    ..Default::default()
                });
            }
            Tag::Value => {
                if let Some(cell) = self.cell.as_mut() {
                    cell.value.get_or_insert_with(String::new);
                }
            }
            Tag::InlineString => {
                if let Some(cell) = self.cell.as_mut() {
                    cell.inline.get_or_insert_with(String::new);
                }
            }
            _ => {}
        }
        Ok(tag)
    }

    /// Close a tag; returns a finished row when a `row` element ends.
    fn close_tag(&mut self, tag: Tag) -> Option<Row> {
        match tag {
            Tag::Cell => {
                if let Some(cell) = self.cell.take() {
                    let value = self.resolve(cell);
                    if let Some(row) = self.row.as_mut() {
                        row.push(value);
                    }
                }
                None
            }
            Tag::Row => self.row.take(),
            _ => None,
        }
    }

    fn push_text(&mut self, text: &str) {
        let Some(cell) = self.cell.as_mut() else {
            return;
        };
        match self.open.last() {
            Some(Tag::Value) => {
                if let Some(value) = cell.value.as_mut() {
                    value.push_str(text);
                }
            }
            Some(Tag::InlineText) => {
                if let Some(inline) = cell.inline.as_mut() {
                    inline.push_str(text);
                }
            }
            _ => {}
        }
    }

    /// Resolve a finished cell to its literal value.
    fn resolve(&self, cell: PendingCell) -> String {
        match (cell.value, cell.inline) {
            (Some(raw), _) => {
                if cell.cell_type.as_deref() == Some(SHARED_STRING_TYPE) {
                    resolve_shared(self.shared_strings, raw)
                } else {
                    raw
                }
            }
            (None, Some(inline)) => inline,
            (None, None) => String::new(),
        }
    }

    fn next_row(&mut self) -> Result<Option<Row>> {
        loop {
            let event = self
                .reader
                .read_event()
                .map_err(|e| Error::malformed(&self.entry, e))?;
            match event {
                Event::Start(e) => {
                    let tag = self.open_tag(&e)?;
                    self.open.push(tag);
                }
                Event::Empty(e) => {
                    let tag = self.open_tag(&e)?;
                    if let Some(row) = self.close_tag(tag) {
                        return Ok(Some(row));
                    }
                }
                Event::End(_) => {
                    let tag = self
                        .open
                        .pop()
                        .ok_or_else(|| Error::malformed(&self.entry, "unmatched end tag"))?;
                    if let Some(row) = self.close_tag(tag) {
                        return Ok(Some(row));
                    }
                }
                Event::Text(e) => {
                    if self.open.is_empty() {
                        if !is_blank(&e) {
                            return Err(Error::malformed(&self.entry, TEXT_OUTSIDE_ROOT));
                        }
                    } else if self.cell.is_some() {
                        let text = e.unescape().map_err(|e| Error::malformed(&self.entry, e))?;
                        self.push_text(&text);
                    }
                }
                Event::CData(e) => {
                    if self.open.is_empty() {
                        return Err(Error::malformed(&self.entry, TEXT_OUTSIDE_ROOT));
                    }
                    if self.cell.is_some() {
                        let raw = e.into_inner();
                        self.push_text(&String::from_utf8_lossy(&raw));
                    }
                }
                Event::Eof => {
                    if !self.open.is_empty() {
                        return Err(Error::malformed(&self.entry, "unexpected end of document"));
                    }
                    if !self.seen_root {
                        return Err(Error::malformed(&self.entry, "no root element"));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }
}

impl Iterator for RowReader<'_> {
    type Item = Result<Row>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_row() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Look up a shared string reference, falling back to the raw index text.
fn resolve_shared(shared_strings: &SharedStrings, raw: String) -> String {
    match raw.trim().parse::<usize>() {
        Ok(index) => match shared_strings.get(index) {
            Some(s) => s.to_string(),
            None => {
                tracing::warn!(
                    index,
                    table_len = shared_strings.len(),
                    "shared string index out of range, keeping raw value"
                );
                raw
            }
        },
        Err(_) => raw,
    }
}

/// Read every row of a worksheet part.
pub fn parse_rows(entry: &str, xml: &str, shared_strings: &SharedStrings) -> Result<Vec<Row>> {
    RowReader::new(entry, xml, shared_strings).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENTRY: &str = "xl/worksheets/sheet1.xml";

    fn sheet(rows: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"
           xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
  <dimension ref="A1:C3"/>
  <sheetData>{}</sheetData>
</worksheet>"#,
            rows
        )
    }

    fn table(items: &[&str]) -> SharedStrings {
        SharedStrings::from(items.iter().map(|s| s.to_string()).collect::<Vec<_>>())
    }

    #[test]
    fn test_shared_string_cells() {
        let ss = table(&["Policy Number", "Active"]);
        let xml = sheet(r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c></row>"#);
        let rows = parse_rows(ENTRY, &xml, &ss).unwrap();
        assert_eq!(rows, vec![vec!["Policy Number", "Active"]]);
    }

    #[test]
    fn test_numeric_and_other_types_kept_literal() {
        let ss = table(&[]);
        let xml = sheet(
            r#"<row r="1">
<c r="A1"><v>1234.50</v></c>
<c r="B1" t="n"><v>45123</v></c>
<c r="C1" t="b"><v>1</v></c>
<c r="D1" t="str"><f>A1*2</f><v>2469</v></c>
<c r="E1" t="e"><v>#N/A</v></c>
</row>"#,
        );
        let rows = parse_rows(ENTRY, &xml, &ss).unwrap();
        assert_eq!(rows, vec![vec!["1234.50", "45123", "1", "2469", "#N/A"]]);
    }

    #[test]
    fn test_inline_string_runs() {
        let ss = table(&[]);
        let xml = sheet(
            r#"<row r="1">
<c r="A1" t="inlineStr"><is><t>Owner</t></is></c>
<c r="B1" t="inlineStr"><is><r><rPr><i/></rPr><t xml:space="preserve">Jane </t></r><r><t>Doe</t></r></is></c>
</row>"#,
        );
        let rows = parse_rows(ENTRY, &xml, &ss).unwrap();
        assert_eq!(rows, vec![vec!["Owner", "Jane Doe"]]);
    }

    #[test]
    fn test_cells_without_value_are_empty() {
        let ss = table(&["x"]);
        let xml = sheet(
            r#"<row r="1"><c r="A1" s="3"/><c r="B1" t="s"><v>0</v></c><c r="C1" t="s"></c><c r="D1"><v/></c></row>"#,
        );
        let rows = parse_rows(ENTRY, &xml, &ss).unwrap();
        assert_eq!(rows, vec![vec!["", "x", "", ""]]);
    }

    #[test]
    fn test_row_length_matches_cell_elements() {
        let ss = table(&["a", "b", "c"]);
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="s"><v>0</v></c><c r="B1" t="s"><v>1</v></c><c r="C1" t="s"><v>2</v></c></row>
<row r="2"><c r="A2" t="s"><v>0</v></c></row>
<row r="3"/>
<row r="4"><c r="C4" t="s"><v>2</v></c></row>"#,
        );
        let rows = parse_rows(ENTRY, &xml, &ss).unwrap();
        let lengths: Vec<usize> = rows.iter().map(|r| r.len()).collect();
        assert_eq!(lengths, vec![3, 1, 0, 1]);
        // No column-gap filling: C4 lands in position 0.
        assert_eq!(rows[3], vec!["c"]);
    }

    #[test]
    fn test_out_of_range_shared_index_keeps_raw() {
        let ss = table(&["a", "b", "c"]);
        let xml = sheet(
            r#"<row r="1"><c r="A1" t="s"><v>50</v></c><c r="B1" t="s"><v>oops</v></c></row>
<row r="2"><c r="A2" t="s"><v>2</v></c></row>"#,
        );
        let rows = parse_rows(ENTRY, &xml, &ss).unwrap();
        assert_eq!(rows, vec![vec!["50", "oops"], vec!["c"]]);
    }

    #[test]
    fn test_value_text_not_trimmed_and_unescaped() {
        let ss = table(&[]);
        let xml = sheet(r#"<row r="1"><c r="A1" t="str"><v>  A &amp; B </v></c></row>"#);
        let rows = parse_rows(ENTRY, &xml, &ss).unwrap();
        assert_eq!(rows, vec![vec!["  A & B "]]);
    }

    #[test]
    fn test_rows_outside_sheet_data_ignored() {
        let ss = table(&[]);
        let xml = r#"<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<row><c><v>stray</v></c></row>
<sheetData><row><c><v>1</v></c></row></sheetData>
</worksheet>"#;
        let rows = parse_rows(ENTRY, xml, &ss).unwrap();
        assert_eq!(rows, vec![vec!["1"]]);
    }

    #[test]
    fn test_rows_are_streamed() {
        let ss = table(&[]);
        let xml = sheet(r#"<row><c><v>1</v></c></row><row><c><v>2</v></c></row>"#);
        let mut reader = RowReader::new(ENTRY, &xml, &ss);
        assert_eq!(reader.next().unwrap().unwrap(), vec!["1"]);
        assert_eq!(reader.next().unwrap().unwrap(), vec!["2"]);
        assert!(reader.next().is_none());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_malformed_worksheet() {
        let ss = table(&[]);
        for xml in [
            "<worksheet><sheetData><row></sheetData></worksheet>",
            "<worksheet><sheetData>",
            "",
            "junk<worksheet/>",
            "<worksheet/>junk",
            "<worksheet/><worksheet/>",
            "<worksheet><sheetData/></worksheet><worksheet/>",
        ] {
            let err = parse_rows(ENTRY, xml, &ss).unwrap_err();
            assert!(
                matches!(err, Error::MalformedDocument { ref entry, .. } if entry == ENTRY),
                "expected malformed for {xml:?}"
            );
        }
    }
}
