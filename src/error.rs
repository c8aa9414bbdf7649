use thiserror::Error;

/// Fatal failures of the extraction and patch operations.
///
/// Anything that goes wrong for a single addition (an anchor that matches
/// nothing) is not an error; see [`crate::core::writer::SkipReason`].
#[derive(Error, Debug)]
pub enum DocxError {
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    #[error("malformed markup: {0}")]
    MalformedMarkup(String),
}

impl From<zip::result::ZipError> for DocxError {
    fn from(err: zip::result::ZipError) -> Self {
        DocxError::CorruptArchive(err.to_string())
    }
}

impl From<std::io::Error> for DocxError {
    fn from(err: std::io::Error) -> Self {
        DocxError::CorruptArchive(err.to_string())
    }
}

impl From<roxmltree::Error> for DocxError {
    fn from(err: roxmltree::Error) -> Self {
        DocxError::MalformedMarkup(err.to_string())
    }
}

impl From<quick_xml::Error> for DocxError {
    fn from(err: quick_xml::Error) -> Self {
        DocxError::MalformedMarkup(err.to_string())
    }
}
