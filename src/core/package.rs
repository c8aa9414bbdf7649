use crate::error::DocxError;
use std::collections::HashMap;
use std::io::{Cursor, Read, Write};
use zip::{write::FileOptions, ZipArchive, ZipWriter};

/// Conventional location of the main document part inside a .docx package.
pub const MAIN_DOCUMENT_PART: &str = "word/document.xml";

/// In-memory OPC package. Parts are read lazily from the original bytes;
/// replaced parts are held until the package is re-emitted.
#[derive(Debug, Clone)]
pub struct Archive {
    source: Vec<u8>,
    entries: Vec<String>,
    replacements: HashMap<String, Vec<u8>>,
}

impl Archive {
    /// Open a package and check that it carries a main document part.
    pub fn open(bytes: &[u8]) -> Result<Self, DocxError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for index in 0..archive.len() {
            entries.push(archive.by_index(index)?.name().to_string());
        }

        if !entries.iter().any(|name| name == MAIN_DOCUMENT_PART) {
            return Err(DocxError::CorruptArchive(format!(
                "missing main document part '{}'",
                MAIN_DOCUMENT_PART
            )));
        }

        Ok(Self {
            source: bytes.to_vec(),
            entries,
            replacements: HashMap::new(),
        })
    }

    pub fn part_names(&self) -> &[String] {
        &self.entries
    }

    pub fn is_modified(&self) -> bool {
        !self.replacements.is_empty()
    }

    pub fn read_part(&self, name: &str) -> Result<Vec<u8>, DocxError> {
        if let Some(bytes) = self.replacements.get(name) {
            return Ok(bytes.clone());
        }

        let mut archive = ZipArchive::new(Cursor::new(self.source.as_slice()))?;
        let mut file = archive.by_name(name)?;
        let mut bytes = Vec::with_capacity(file.size() as usize);
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    /// Read a part as UTF-8 markup. A part that is not valid UTF-8 cannot be
    /// XML, so that case is reported as malformed markup.
    pub fn read_part_string(&self, name: &str) -> Result<String, DocxError> {
        String::from_utf8(self.read_part(name)?)
            .map_err(|e| DocxError::MalformedMarkup(format!("{} is not UTF-8: {}", name, e)))
    }

    pub fn main_document(&self) -> Result<String, DocxError> {
        self.read_part_string(MAIN_DOCUMENT_PART)
    }

    /// Replace the content of an existing part.
    pub fn replace_part(&mut self, name: &str, bytes: Vec<u8>) -> Result<(), DocxError> {
        if !self.entries.iter().any(|entry| entry == name) {
            return Err(DocxError::CorruptArchive(format!("no part named '{}'", name)));
        }
        self.replacements.insert(name.to_string(), bytes);
        Ok(())
    }

    /// Re-emit the package. Entry order, compression method and timestamps
    /// are kept; untouched entries are copied without recompression. An
    /// unmodified archive returns the original bytes.
    pub fn into_bytes(self) -> Result<Vec<u8>, DocxError> {
        if self.replacements.is_empty() {
            return Ok(self.source);
        }

        let mut source = ZipArchive::new(Cursor::new(self.source.as_slice()))?;
        let mut zip_writer = ZipWriter::new(Cursor::new(Vec::with_capacity(self.source.len())));

        for index in 0..source.len() {
            let entry = source.by_index(index)?;
            match self.replacements.get(entry.name()) {
                Some(bytes) => {
                    let name = entry.name().to_string();
                    let options = FileOptions::default()
                        .compression_method(entry.compression())
                        .last_modified_time(entry.last_modified());
                    zip_writer.start_file(name, options)?;
                    zip_writer.write_all(bytes)?;
                }
                None => zip_writer.raw_copy_file(entry)?,
            }
        }

        Ok(zip_writer.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fixtures;

    #[test]
    fn opening_requires_main_document_part() {
        let bytes = fixtures::package(&[("word/styles.xml", "<styles/>")]);
        match Archive::open(&bytes) {
            Err(DocxError::CorruptArchive(msg)) => assert!(msg.contains(MAIN_DOCUMENT_PART)),
            other => panic!("expected corrupt archive, got {:?}", other),
        }
    }

    #[test]
    fn garbage_bytes_are_a_corrupt_archive() {
        assert!(matches!(
            Archive::open(b"definitely not a zip file"),
            Err(DocxError::CorruptArchive(_))
        ));
    }

    #[test]
    fn unmodified_archive_round_trips_byte_for_byte() {
        let bytes = fixtures::docx(&fixtures::document_xml(&["One", "Two"]));
        let archive = Archive::open(&bytes).unwrap();
        assert!(!archive.is_modified());
        assert_eq!(archive.into_bytes().unwrap(), bytes);
    }

    #[test]
    fn replacing_a_part_keeps_every_other_entry() {
        let bytes = fixtures::docx(&fixtures::document_xml(&["One"]));
        let mut archive = Archive::open(&bytes).unwrap();
        let names = archive.part_names().to_vec();
        archive
            .replace_part(MAIN_DOCUMENT_PART, b"<replaced/>".to_vec())
            .unwrap();

        let reopened = Archive::open(&archive.into_bytes().unwrap()).unwrap();
        assert_eq!(reopened.part_names(), names.as_slice());
        assert_eq!(reopened.main_document().unwrap(), "<replaced/>");
        assert_eq!(
            reopened.read_part("word/styles.xml").unwrap(),
            fixtures::STYLES_XML.as_bytes()
        );
    }

    #[test]
    fn replacing_an_unknown_part_is_rejected() {
        let bytes = fixtures::docx(&fixtures::document_xml(&["One"]));
        let mut archive = Archive::open(&bytes).unwrap();
        assert!(archive.replace_part("word/missing.xml", Vec::new()).is_err());
        assert!(!archive.is_modified());
    }

    #[test]
    fn non_utf8_main_part_is_malformed_markup() {
        let bytes = fixtures::package_bytes(&[(MAIN_DOCUMENT_PART, &[0xff, 0xfe, 0x3c][..])]);
        let archive = Archive::open(&bytes).unwrap();
        assert!(matches!(
            archive.main_document(),
            Err(DocxError::MalformedMarkup(_))
        ));
    }
}
