use crate::core::package::Archive;
use crate::core::wordml::W_NS;
use crate::error::DocxError;
use roxmltree::{Document, Node};

pub trait Parser {
    /// Parse a .docx package and return the visible text of every paragraph,
    /// in document order.
    fn parse(&self, archive_bytes: &[u8]) -> Result<Vec<String>, DocxError>;
}

/// TextExtractor: flattens `word/document.xml` into one line per paragraph
/// using roxmltree. Read-only over the package.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl TextExtractor {
    /// Plain-text rendering handed to the annotator. Empty paragraphs keep
    /// their (empty) line so line N is always paragraph N.
    pub fn extract(&self, archive_bytes: &[u8]) -> Result<String, DocxError> {
        Ok(self.parse(archive_bytes)?.join("\n"))
    }

    pub fn extract_from_archive(&self, archive: &Archive) -> Result<String, DocxError> {
        Ok(self.paragraphs_of(archive)?.join("\n"))
    }

    fn paragraphs_of(&self, archive: &Archive) -> Result<Vec<String>, DocxError> {
        let raw_xml = archive.main_document()?;
        let doc_xml = raw_xml.strip_prefix('\u{feff}').unwrap_or(&raw_xml);
        let doc = Document::parse(doc_xml)?;

        Ok(doc
            .descendants()
            .filter(|n| n.has_tag_name((W_NS, "p")))
            .map(|p_node| self.extract_text_from_paragraph(p_node))
            .collect())
    }

    /// Extract text from a paragraph node: `w:t` content, plus `\t` for each
    /// `w:tab` that sits directly in a run (tab stops in `w:pPr` are not text).
    fn extract_text_from_paragraph(&self, p_node: Node) -> String {
        let mut text = String::new();
        for node in p_node.descendants().filter(|n| n.is_element()) {
            if node.has_tag_name((W_NS, "t")) {
                for chunk in node.children().filter(|c| c.is_text()) {
                    text.push_str(chunk.text().unwrap_or_default());
                }
            } else if node.has_tag_name((W_NS, "tab"))
                && node.parent().map_or(false, |parent| parent.has_tag_name((W_NS, "r")))
            {
                text.push('\t');
            }
        }
        text
    }
}

impl Parser for TextExtractor {
    fn parse(&self, archive_bytes: &[u8]) -> Result<Vec<String>, DocxError> {
        let archive = Archive::open(archive_bytes)?;
        self.paragraphs_of(&archive)
    }
}
