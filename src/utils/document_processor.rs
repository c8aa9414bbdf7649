use crate::annotator::{AnnotationRequest, Annotator, Appendix};
use crate::config::ProcessorConfig;
use crate::core::parser::TextExtractor;
use crate::core::writer::{PatchEngine, PatchReport, Writer};
use crate::error::DocxError;
use log::{debug, error, info, warn};
use rayon::prelude::*;
use thiserror::Error;
use uuid::Uuid;

const OUTPUT_SUFFIX: &str = "_TichHopNLS";

#[derive(Error, Debug)]
pub enum ProcessError {
    /// The run finished but no addition found its anchor. The caller gets
    /// the untouched input back.
    #[error("no annotation could be placed ({} proposed)", .report.skipped.len())]
    NothingApplied { original: Vec<u8>, report: PatchReport },

    #[error("document could not be processed: {source}")]
    Engine { source: DocxError, original: Vec<u8> },

    #[error("annotator failed: {0}")]
    Annotator(#[source] anyhow::Error),
}

impl ProcessError {
    /// The input document, when the failure leaves one to fall back to.
    pub fn original(&self) -> Option<&[u8]> {
        match self {
            ProcessError::NothingApplied { original, .. } | ProcessError::Engine { original, .. } => {
                Some(original)
            }
            ProcessError::Annotator(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessReport {
    pub bytes: Vec<u8>,
    pub proposed: usize,
    pub report: PatchReport,
}

/// An appendix that could not be read; the rest of its batch still loads.
#[derive(Debug)]
pub struct AppendixFailure {
    pub name: String,
    pub error: DocxError,
}

/// Extract -> annotate -> patch for one lesson document at a time, with a set
/// of appendix documents kept as model context between runs.
pub struct DocumentProcessor<A: Annotator> {
    extractor: TextExtractor,
    engine: PatchEngine,
    annotator: A,
    config: ProcessorConfig,
    appendices: Vec<Appendix>,
}

impl<A: Annotator> DocumentProcessor<A> {
    pub fn new(annotator: A, config: ProcessorConfig) -> Self {
        Self {
            extractor: TextExtractor,
            engine: PatchEngine::new(config.patch.clone()),
            annotator,
            config,
            appendices: Vec::new(),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    pub fn appendices(&self) -> &[Appendix] {
        &self.appendices
    }

    /// Run the whole workflow on one document.
    pub fn process(&self, document: &[u8]) -> Result<ProcessReport, ProcessError> {
        let engine_error = |source: DocxError| {
            error!("Failed to process document: {}", source);
            ProcessError::Engine {
                source,
                original: document.to_vec(),
            }
        };

        let text = self.extractor.extract(document).map_err(engine_error)?;
        info!(
            "Extracted {} lines of lesson text, {} appendices in context",
            text.lines().count(),
            self.appendices.len()
        );

        let request = AnnotationRequest::build(&text, &self.appendices, &self.config);
        let additions = self
            .annotator
            .propose(&request)
            .map_err(ProcessError::Annotator)?;
        info!("Annotator proposed {} additions", additions.len());

        let outcome = self
            .engine
            .write_annotations(document, &additions)
            .map_err(engine_error)?;

        if outcome.report.nothing_applied() {
            warn!("None of the {} additions matched; returning the original", additions.len());
            return Err(ProcessError::NothingApplied {
                original: document.to_vec(),
                report: outcome.report,
            });
        }

        Ok(ProcessReport {
            bytes: outcome.bytes,
            proposed: additions.len(),
            report: outcome.report,
        })
    }

    pub fn add_appendix(&mut self, name: &str, bytes: &[u8]) -> Result<&Appendix, DocxError> {
        let appendix = read_appendix(&self.extractor, name, bytes)?;
        self.appendices.push(appendix);
        Ok(&self.appendices[self.appendices.len() - 1])
    }

    /// Load a batch of appendices in parallel. Files that are not `.docx`
    /// are ignored; unreadable ones are returned and do not stop the batch.
    pub fn add_appendices(&mut self, files: &[(String, Vec<u8>)]) -> Vec<AppendixFailure> {
        let extractor = self.extractor;
        let results: Vec<Result<Appendix, AppendixFailure>> = files
            .par_iter()
            .filter(|(name, _)| {
                let is_docx = name.ends_with(".docx");
                if !is_docx {
                    debug!("Ignoring non-docx appendix: {}", name);
                }
                is_docx
            })
            .map(|(name, bytes)| {
                read_appendix(&extractor, name, bytes).map_err(|error| AppendixFailure {
                    name: name.clone(),
                    error,
                })
            })
            .collect();

        let mut failures = Vec::new();
        for result in results {
            match result {
                Ok(appendix) => self.appendices.push(appendix),
                Err(failure) => {
                    warn!("Failed to read appendix {}: {}", failure.name, failure.error);
                    failures.push(failure);
                }
            }
        }
        failures
    }

    /// Drop an appendix by id; returns whether one was removed.
    pub fn remove_appendix(&mut self, id: &str) -> bool {
        let before = self.appendices.len();
        self.appendices.retain(|appendix| appendix.id != id);
        before != self.appendices.len()
    }
}

fn read_appendix(extractor: &TextExtractor, name: &str, bytes: &[u8]) -> Result<Appendix, DocxError> {
    let text = extractor.extract(bytes)?;
    debug!("Appendix {}: {} chars", name, text.chars().count());
    Ok(Appendix {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        text,
    })
}

/// Download name for a patched document: `lesson.docx` -> `lesson_TichHopNLS.docx`.
pub fn output_file_name(input_name: &str) -> String {
    let stem = input_name.strip_suffix(".docx").unwrap_or(input_name);
    format!("{}{}.docx", stem, OUTPUT_SUFFIX)
}
