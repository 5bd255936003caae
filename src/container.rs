//! ZIP container access for spreadsheet packages.

use crate::error::{Error, Result};
use std::cell::RefCell;
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek};
use std::path::Path;
use zip::result::ZipError;

/// Read-only view over a ZIP-packaged spreadsheet.
///
/// The underlying reader (an open file handle for [`Archive::open`]) is owned
/// by the archive and released when it is dropped, on every exit path.
pub struct Archive<R: Read + Seek = BufReader<File>> {
    archive: RefCell<zip::ZipArchive<R>>,
    source: String,
}

impl Archive {
    /// Open an archive from a file path.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use policybook::container::Archive;
    ///
    /// let archive = Archive::open("book.xlsx")?;
    /// assert!(archive.contains("xl/workbook.xml"));
    /// # Ok::<(), policybook::Error>(())
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = path.display().to_string();
        let file = File::open(path).map_err(|e| Error::CorruptArchive {
            path: source.clone(),
            reason: e.to_string(),
        })?;
        Self::from_reader(BufReader::new(file), source)
    }
}

impl Archive<Cursor<Vec<u8>>> {
    /// Create an archive from an in-memory byte vector.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::from_reader(Cursor::new(data), "<memory>")
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Create an archive from any seekable reader.
    pub fn from_reader(reader: R, source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let archive = zip::ZipArchive::new(reader).map_err(|e| Error::CorruptArchive {
            path: source.clone(),
            reason: e.to_string(),
        })?;
        tracing::debug!(source = %source, entries = archive.len(), "opened archive");
        Ok(Self {
            archive: RefCell::new(archive),
            source,
        })
    }

    /// Where the archive was opened from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// List all entry names in the archive.
    pub fn entry_names(&self) -> Vec<String> {
        let archive = self.archive.borrow();
        archive.file_names().map(String::from).collect()
    }

    /// Check if an entry exists in the archive.
    pub fn contains(&self, name: &str) -> bool {
        self.archive.borrow().file_names().any(|n| n == name)
    }

    /// Read the raw bytes of a named entry.
    pub fn read_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let mut archive = self.archive.borrow_mut();
        let mut file = archive.by_name(name).map_err(|e| match e {
            ZipError::FileNotFound => Error::MissingEntry(name.to_string()),
            other => Error::CorruptArchive {
                path: self.source.clone(),
                reason: format!("{}: {}", name, other),
            },
        })?;

        let mut data = Vec::new();
        file.read_to_end(&mut data)
            .map_err(|e| Error::CorruptArchive {
                path: self.source.clone(),
                reason: format!("{}: {}", name, e),
            })?;
        Ok(data)
    }

    /// Read a named entry as XML text.
    ///
    /// Handles different encodings:
    /// - UTF-8 (with or without BOM)
    /// - UTF-16 LE (with BOM: FF FE)
    /// - UTF-16 BE (with BOM: FE FF)
    pub fn read_xml(&self, name: &str) -> Result<String> {
        let bytes = self.read_bytes(name)?;
        decode_xml_bytes(name, &bytes)
    }
}

impl<R: Read + Seek> std::fmt::Debug for Archive<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archive")
            .field("source", &self.source)
            .field("entries", &self.archive.borrow().len())
            .finish()
    }
}

/// Decode XML bytes to a string, honoring a UTF-8 or UTF-16 byte order mark.
pub fn decode_xml_bytes(entry: &str, bytes: &[u8]) -> Result<String> {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8(rest.to_vec()).map_err(|e| Error::malformed(entry, e));
    }

    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        let content = decode_utf16(entry, rest, u16::from_le_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let content = decode_utf16(entry, rest, u16::from_be_bytes)?;
        return Ok(fix_xml_encoding_declaration(&content));
    }

    String::from_utf8(bytes.to_vec()).map_err(|e| Error::malformed(entry, e))
}

fn decode_utf16(entry: &str, bytes: &[u8], unit: fn([u8; 2]) -> u16) -> Result<String> {
    let units = bytes.chunks_exact(2).map(|pair| unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .collect::<std::result::Result<String, _>>()
        .map_err(|e| Error::malformed(entry, e))
}

/// Rewrite a UTF-16 encoding declaration once the text is already decoded,
/// otherwise the XML reader would try to decode it a second time.
fn fix_xml_encoding_declaration(content: &str) -> String {
    if content.starts_with("<?xml") {
        if let Some(end_decl) = content.find("?>") {
            let (decl, rest) = content.split_at(end_decl + 2);
            let fixed_decl = decl
                .replace("encoding=\"UTF-16\"", "encoding=\"UTF-8\"")
                .replace("encoding='UTF-16'", "encoding='UTF-8'")
                .replace("encoding=\"utf-16\"", "encoding=\"UTF-8\"")
                .replace("encoding='utf-16'", "encoding='UTF-8'");
            return format!("{}{}", fixed_decl, rest);
        }
    }
    content.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn zip_bytes(parts: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, bytes) in parts {
            writer.start_file(*name, options).unwrap();
            writer.write_all(bytes).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_entry_access() {
        let data = zip_bytes(&[("xl/workbook.xml", b"<workbook/>"), ("docProps/app.xml", b"<a/>")]);
        let archive = Archive::from_bytes(data).unwrap();

        assert_eq!(archive.source(), "<memory>");
        assert!(archive.contains("xl/workbook.xml"));
        assert!(!archive.contains("xl/sharedStrings.xml"));
        assert_eq!(archive.entry_names().len(), 2);
        assert_eq!(archive.read_bytes("docProps/app.xml").unwrap(), b"<a/>");
        assert_eq!(archive.read_xml("xl/workbook.xml").unwrap(), "<workbook/>");
    }

    #[test]
    fn test_missing_entry() {
        let archive = Archive::from_bytes(zip_bytes(&[("a.xml", b"<a/>")])).unwrap();
        let err = archive.read_bytes("xl/worksheets/sheet1.xml").unwrap_err();
        assert!(matches!(err, Error::MissingEntry(ref name) if name == "xl/worksheets/sheet1.xml"));
    }

    #[test]
    fn test_not_an_archive() {
        let err = Archive::from_bytes(b"Policy Number,Status\n1,Active\n".to_vec()).unwrap_err();
        assert!(matches!(err, Error::CorruptArchive { .. }));
    }

    #[test]
    fn test_unreadable_path() {
        let err = Archive::open("does/not/exist.xlsx").unwrap_err();
        match err {
            Error::CorruptArchive { path, .. } => assert!(path.ends_with("exist.xlsx")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_decode_xml_bytes() {
        let utf16_le = b"\xFF\xFE<\0?\0x\0m\0l\0>\0";
        assert_eq!(decode_xml_bytes("le", utf16_le).unwrap(), "<?xml>");

        let utf16_be = b"\xFE\xFF\0<\0?\0x\0m\0l\0>";
        assert_eq!(decode_xml_bytes("be", utf16_be).unwrap(), "<?xml>");

        let utf8_bom = b"\xEF\xBB\xBF<?xml>";
        assert_eq!(decode_xml_bytes("bom", utf8_bom).unwrap(), "<?xml>");

        let invalid = b"<a>\xFF\xFF</a>";
        assert!(matches!(
            decode_xml_bytes("bad", invalid),
            Err(Error::MalformedDocument { .. })
        ));
    }

    #[test]
    fn test_utf16_declaration_rewritten() {
        let text = "<?xml version=\"1.0\" encoding=\"UTF-16\"?><a/>";
        let mut bytes = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            bytes.extend_from_slice(&unit.to_le_bytes());
        }
        let decoded = decode_xml_bytes("decl", &bytes).unwrap();
        assert_eq!(decoded, "<?xml version=\"1.0\" encoding=\"UTF-8\"?><a/>");
    }
}
