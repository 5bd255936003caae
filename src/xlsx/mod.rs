//! Minimal XLSX reader.
//!
//! Reads the literal cell values of the first worksheet of a workbook as an
//! ordered grid of rows. Formulas, styles, merged cells and additional sheets
//! are not interpreted.
//!
//! # Example
//!
//! ```no_run
//! use policybook::xlsx::WorkbookReader;
//!
//! let reader = WorkbookReader::open("policies.xlsx")?;
//! println!("Sheet: {} ({})", reader.sheet().name, reader.sheet_path());
//!
//! for row in reader.rows()? {
//!     println!("{}", row.join(" | "));
//! }
//! # Ok::<(), policybook::Error>(())
//! ```

mod shared_strings;
mod workbook;
mod worksheet;

pub use shared_strings::{SharedStrings, SHARED_STRINGS_ENTRY};
pub use workbook::{
    parse_sheets, resolve_first_sheet, resolve_target, Relationship, Relationships,
    ResolvedSheet, SheetInfo, PACKAGE_DIR, WORKBOOK_ENTRY, WORKBOOK_RELS_ENTRY,
};
pub use worksheet::{parse_rows, Row, RowReader};

use crate::container::Archive;
use crate::error::Result;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;

/// Reader for the first worksheet of an XLSX workbook.
///
/// Holds the open archive, the shared string table and the resolved sheet
/// location. Dropping the reader closes the archive.
pub struct WorkbookReader<R: Read + Seek = BufReader<File>> {
    archive: Archive<R>,
    shared_strings: SharedStrings,
    sheet: ResolvedSheet,
}

impl WorkbookReader {
    /// Open an XLSX file for reading.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let archive = Archive::open(path)?;
        Self::from_archive(archive)
    }
}

impl WorkbookReader<Cursor<Vec<u8>>> {
    /// Create a reader from bytes.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        let archive = Archive::from_bytes(data)?;
        Self::from_archive(archive)
    }
}

impl<R: Read + Seek> WorkbookReader<R> {
    /// Create a reader from an already opened archive.
    pub fn from_archive(archive: Archive<R>) -> Result<Self> {
        let shared_strings = SharedStrings::load(&archive)?;
        let sheet = resolve_first_sheet(&archive)?;
        Ok(Self {
            archive,
            shared_strings,
            sheet,
        })
    }

    /// Read every row of the first worksheet, top to bottom.
    pub fn rows(&self) -> Result<Vec<Row>> {
        let xml = self.archive.read_xml(&self.sheet.path)?;
        let rows = parse_rows(&self.sheet.path, &xml, &self.shared_strings)?;
        tracing::debug!(sheet = %self.sheet.sheet.name, rows = rows.len(), "read worksheet");
        Ok(rows)
    }

    /// Get a reference to the archive.
    pub fn archive(&self) -> &Archive<R> {
        &self.archive
    }

    /// The loaded shared string table.
    pub fn shared_strings(&self) -> &SharedStrings {
        &self.shared_strings
    }

    /// The first declared sheet.
    pub fn sheet(&self) -> &SheetInfo {
        &self.sheet.sheet
    }

    /// Archive entry holding the first sheet.
    pub fn sheet_path(&self) -> &str {
        &self.sheet.path
    }
}

/// Read the rows of the first worksheet of an XLSX file.
///
/// The archive is closed before this returns, whether or not reading succeeded.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<Row>> {
    WorkbookReader::open(path)?.rows()
}

/// Read the rows of the first worksheet of an in-memory XLSX package.
pub fn read_rows_from_bytes(data: Vec<u8>) -> Result<Vec<Row>> {
    WorkbookReader::from_bytes(data)?.rows()
}
