use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {source}", .path.display())]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{}': {source}", .path.display())]
    ParseJson {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("config validation error: {0}")]
    Validation(String),
}

fn default_color() -> String {
    "FF0000".to_string()
}

fn default_true() -> bool {
    true
}

fn default_document_char_budget() -> usize {
    15_000
}

fn default_appendix_char_budget() -> usize {
    8_000
}

/// Visual policy applied to every synthesized run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationStyle {
    /// RGB hex, e.g. `FF0000`.
    #[serde(default = "default_color")]
    pub color: String,
    /// Write `w:b w:val="0"` instead of inheriting bold from the anchor run.
    #[serde(default)]
    pub force_bold_off: bool,
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: default_color(),
            force_bold_off: false,
        }
    }
}

impl AnnotationStyle {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let is_hex = self.color.len() == 6 && self.color.chars().all(|c| c.is_ascii_hexdigit());
        if !is_hex {
            return Err(ConfigError::Validation(format!(
                "color must be a 6-digit hex value, got '{}'",
                self.color
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchOptions {
    #[serde(default)]
    pub style: AnnotationStyle,
    /// Drop `w:numPr` from the cloned paragraph properties so an annotation
    /// never becomes an extra list item.
    #[serde(default = "default_true")]
    pub strip_numbering: bool,
}

impl Default for PatchOptions {
    fn default() -> Self {
        Self {
            style: AnnotationStyle::default(),
            strip_numbering: true,
        }
    }
}

/// How deeply the annotator should integrate competences.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationLevel {
    Basic,
    #[default]
    Standard,
    Extended,
}

impl IntegrationLevel {
    /// Label used in the instructions sent to the model.
    pub fn label(&self) -> &'static str {
        match self {
            IntegrationLevel::Basic => "Cơ bản",
            IntegrationLevel::Standard => "Chuẩn",
            IntegrationLevel::Extended => "Mở rộng",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorConfig {
    #[serde(default)]
    pub patch: PatchOptions,
    #[serde(default)]
    pub level: IntegrationLevel,
    /// Also annotate activity steps, not only the competence sections.
    #[serde(default = "default_true")]
    pub include_activities: bool,
    #[serde(default)]
    pub custom_request: Option<String>,
    #[serde(default = "default_document_char_budget")]
    pub document_char_budget: usize,
    #[serde(default = "default_appendix_char_budget")]
    pub appendix_char_budget: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            patch: PatchOptions::default(),
            level: IntegrationLevel::default(),
            include_activities: true,
            custom_request: None,
            document_char_budget: default_document_char_budget(),
            appendix_char_budget: default_appendix_char_budget(),
        }
    }
}

impl ProcessorConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ProcessorConfig =
            serde_json::from_str(&contents).map_err(|source| ConfigError::ParseJson {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.patch.style.validate()?;
        if self.document_char_budget == 0 {
            return Err(ConfigError::Validation(
                "document_char_budget must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Credentials and model selection for the annotation service, passed to
/// the annotator explicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatorSettings {
    pub api_key: String,
    pub model: String,
}

impl AnnotatorSettings {
    pub const DEFAULT_MODEL: &'static str = "gemini-3-flash-preview";

    /// Read `NLS_API_KEY` (falling back to `GEMINI_API_KEY`) and `NLS_MODEL`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_blank = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let api_key = non_blank("NLS_API_KEY")
            .or_else(|| non_blank("GEMINI_API_KEY"))
            .ok_or_else(|| {
                ConfigError::Validation("NLS_API_KEY or GEMINI_API_KEY must be set".into())
            })?;
        let model = lookup("NLS_MODEL").unwrap_or_else(|| Self::DEFAULT_MODEL.to_string());
        Ok(Self { api_key, model })
    }
}
