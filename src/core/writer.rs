use crate::config::PatchOptions;
use crate::core::package::{Archive, MAIN_DOCUMENT_PART};
use crate::core::tree::{DocumentTree, Element, Node, Origin};
use crate::core::wordml::{self, WordFactory, W_NS};
use crate::error::DocxError;
use crate::Addition;
use log::{debug, info, warn};

/// Writer is responsible for writing annotations back into the original .docx XML
pub trait Writer {
    /// Apply a set of additions to the original package and produce a new one.
    fn write_annotations(
        &self,
        original: &[u8],
        additions: &[Addition],
    ) -> Result<PatchOutcome, DocxError>;
}

/// Why an addition was dropped. Never fatal for the rest of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No source paragraph contains the anchor text.
    AnchorNotFound,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedAddition {
    /// Position in the additions list.
    pub index: usize,
    /// Ordinal of the anchor among the source paragraphs; equals its line
    /// number in the extracted text.
    pub paragraph: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAddition {
    pub index: usize,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchReport {
    pub applied: Vec<AppliedAddition>,
    pub skipped: Vec<SkippedAddition>,
}

impl PatchReport {
    pub fn applied_count(&self) -> usize {
        self.applied.len()
    }

    pub fn nothing_applied(&self) -> bool {
        self.applied.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub bytes: Vec<u8>,
    pub report: PatchReport,
}

/// Inserts annotation paragraphs after their anchor paragraphs.
#[derive(Debug, Clone, Default)]
pub struct PatchEngine {
    options: PatchOptions,
}

impl PatchEngine {
    pub fn new(options: PatchOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PatchOptions {
        &self.options
    }

    /// Patch a package held in memory. The input is never modified; on a
    /// fatal error no output is produced.
    pub fn patch(&self, archive_bytes: &[u8], additions: &[Addition]) -> Result<PatchOutcome, DocxError> {
        let mut archive = Archive::open(archive_bytes)?;
        let report = self.patch_archive(&mut archive, additions)?;
        let bytes = archive.into_bytes()?;
        Ok(PatchOutcome { bytes, report })
    }

    /// Patch the main document part of an opened archive. The part is only
    /// replaced when at least one addition was applied.
    pub fn patch_archive(
        &self,
        archive: &mut Archive,
        additions: &[Addition],
    ) -> Result<PatchReport, DocxError> {
        let doc_xml = archive.main_document()?;
        let mut tree = DocumentTree::parse(&doc_xml)?;

        let report = self.apply(&mut tree, additions);
        info!(
            "Applied {} of {} additions ({} skipped)",
            report.applied.len(),
            additions.len(),
            report.skipped.len()
        );

        if !report.nothing_applied() {
            archive.replace_part(MAIN_DOCUMENT_PART, tree.to_xml()?.into_bytes())?;
        }
        Ok(report)
    }

    /// Apply additions, in order, to one tree. Later anchors are searched in
    /// the already-spliced tree; synthesized paragraphs are never anchors.
    pub fn apply(&self, tree: &mut DocumentTree, additions: &[Addition]) -> PatchReport {
        let mut report = PatchReport::default();

        for (index, addition) in additions.iter().enumerate() {
            match self.apply_one(tree, addition) {
                Ok(paragraph) => {
                    debug!("Addition {} inserted after paragraph {}", index, paragraph);
                    report.applied.push(AppliedAddition { index, paragraph });
                }
                Err(reason) => {
                    warn!(
                        "Skipping addition {} ({:?}): anchor {:?}",
                        index, reason, addition.anchor_text
                    );
                    report.skipped.push(SkippedAddition { index, reason });
                }
            }
        }

        report
    }

    fn apply_one(&self, tree: &mut DocumentTree, addition: &Addition) -> Result<usize, SkipReason> {
        let anchor_text = addition.anchor_text.trim();

        // First source paragraph, in document order, containing the anchor.
        // A blank anchor is contained in every paragraph and lands on the first.
        let mut ordinal = 0;
        let path = tree
            .find_element(|element| {
                if !wordml::is_paragraph(element) || element.origin() != Origin::Parsed {
                    return false;
                }
                let hit = wordml::paragraph_text(element).trim().contains(anchor_text);
                if !hit {
                    ordinal += 1;
                }
                hit
            })
            .ok_or(SkipReason::AnchorNotFound)?;

        let paragraph = match tree.element(&path) {
            Some(anchor) => self.synthesize_paragraph(anchor, &addition.insertion_text),
            None => return Err(SkipReason::AnchorNotFound),
        };

        if tree.insert_after(&path, Node::Element(paragraph)) {
            Ok(ordinal)
        } else {
            Err(SkipReason::AnchorNotFound)
        }
    }

    /// Build the annotation paragraph: the anchor's paragraph properties
    /// minus list membership, section breaks and revision marks, and one run whose
    /// properties come from the anchor's first run with the annotation style
    /// forced on top.
    fn synthesize_paragraph(&self, anchor: &Element, insertion_text: &str) -> Element {
        let factory = WordFactory::for_element(anchor);
        let style = &self.options.style;

        let mut paragraph = factory.paragraph();
        if let Some(paragraph_properties) = anchor.find_child(W_NS, "pPr") {
            let mut paragraph_properties = factory.adopt(paragraph_properties.clone());
            if self.options.strip_numbering {
                paragraph_properties.remove_children(W_NS, "numPr");
            }
            // A cloned sectPr would end a new section after every annotation.
            for local in ["sectPr", "pPrChange"] {
                paragraph_properties.remove_children(W_NS, local);
            }
            if let Some(mark) = paragraph_properties
                .children
                .iter_mut()
                .filter_map(Node::as_element_mut)
                .find(|child| child.is(W_NS, "rPr"))
            {
                for revision in ["ins", "del", "moveFrom", "moveTo", "rPrChange"] {
                    mark.remove_children(W_NS, revision);
                }
            }
            paragraph.push(Node::Element(paragraph_properties));
        }

        let mut run_properties = anchor
            .descendants()
            .find(|element| element.is(W_NS, "r"))
            .and_then(|run| run.find_child(W_NS, "rPr"))
            .map(|rpr| factory.adopt(rpr.clone()))
            .unwrap_or_else(|| factory.run_properties());
        for hidden in ["vanish", "specVanish", "rPrChange"] {
            run_properties.remove_children(W_NS, hidden);
        }
        wordml::set_run_property(&mut run_properties, factory.color(&style.color));
        if style.force_bold_off {
            wordml::set_run_property(&mut run_properties, factory.toggle_off("b"));
            wordml::set_run_property(&mut run_properties, factory.toggle_off("bCs"));
        }

        let mut run = factory.run();
        run.push(Node::Element(run_properties));
        run.push(Node::Element(factory.text(&format!("\t{}", insertion_text))));
        paragraph.push(Node::Element(run));
        paragraph
    }
}

impl Writer for PatchEngine {
    fn write_annotations(
        &self,
        original: &[u8],
        additions: &[Addition],
    ) -> Result<PatchOutcome, DocxError> {
        self.patch(original, additions)
    }
}
