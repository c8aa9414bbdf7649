pub mod core {
    pub mod package;
    pub mod parser;
    pub mod tree;
    pub mod wordml;
    pub mod writer;

    #[cfg(test)]
    pub(crate) mod fixtures;
}

pub mod utils {
    pub mod document_processor;
}

pub mod annotator;
pub mod config;
pub mod error;

pub use crate::config::{AnnotationStyle, PatchOptions, ProcessorConfig};
pub use crate::core::parser::{Parser, TextExtractor};
pub use crate::core::writer::{PatchEngine, PatchOutcome, PatchReport, Writer};
pub use crate::error::DocxError;

use serde::{Deserialize, Serialize};

/// One proposed annotation: the text to look for, and the text to insert as
/// a new paragraph right after the paragraph that contains it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Addition {
    #[serde(rename = "searchText")]
    pub anchor_text: String,
    #[serde(rename = "nlsContent")]
    pub insertion_text: String,
    /// Placement hint some prompts ask for; not used for matching.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl Addition {
    pub fn new(anchor_text: impl Into<String>, insertion_text: impl Into<String>) -> Self {
        Self {
            anchor_text: anchor_text.into(),
            insertion_text: insertion_text.into(),
            location: None,
        }
    }
}
