use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};
use nls_docx::annotator::RecordedAnnotator;
use nls_docx::config::ProcessorConfig;
use nls_docx::utils::document_processor::{output_file_name, DocumentProcessor, ProcessError};
use nls_docx::TextExtractor;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "nls-docx", about = "Insert digital-competence (NLS) annotations into .docx lesson plans")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the text of every paragraph, one per line.
    Extract { input: PathBuf },
    /// Apply an annotation response (`{"additions": [...]}`) to a document.
    Apply {
        input: PathBuf,
        additions: PathBuf,
        /// Defaults to `<input stem>_TichHopNLS.docx` next to the input.
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// JSON processor configuration.
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        force_bold_off: bool,
        /// Keep list numbering on inserted paragraphs.
        #[arg(long)]
        keep_numbering: bool,
        /// Annotation color as RGB hex.
        #[arg(long)]
        color: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init();

    match Cli::parse().command {
        Command::Extract { input } => extract(&input).await,
        Command::Apply {
            input,
            additions,
            output,
            config,
            force_bold_off,
            keep_numbering,
            color,
        } => {
            let mut config = match config {
                Some(path) => ProcessorConfig::from_json_file(&path)?,
                None => ProcessorConfig::default(),
            };
            if force_bold_off {
                config.patch.style.force_bold_off = true;
            }
            if keep_numbering {
                config.patch.strip_numbering = false;
            }
            if let Some(color) = color {
                config.patch.style.color = color;
            }
            config.validate()?;

            let output = match output {
                Some(path) => path,
                None => default_output_path(&input)?,
            };
            apply(&input, &additions, &output, config).await
        }
    }
}

async fn extract(input: &Path) -> Result<()> {
    let bytes = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    let text = TextExtractor
        .extract(&bytes)
        .with_context(|| format!("failed to extract text from {}", input.display()))?;
    println!("{}", text);
    Ok(())
}

async fn apply(input: &Path, additions: &Path, output: &Path, config: ProcessorConfig) -> Result<()> {
    let document = tokio::fs::read(input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    let response = tokio::fs::read_to_string(additions)
        .await
        .with_context(|| format!("failed to read {}", additions.display()))?;

    let annotator = RecordedAnnotator::from_json(&response)
        .with_context(|| format!("invalid annotation response in {}", additions.display()))?;
    let processor = DocumentProcessor::new(annotator, config);

    match processor.process(&document) {
        Ok(result) => {
            tokio::fs::write(output, &result.bytes)
                .await
                .with_context(|| format!("failed to write {}", output.display()))?;
            for skipped in &result.report.skipped {
                warn!("Addition {} not placed: {:?}", skipped.index, skipped.reason);
            }
            info!("Saved {}", output.display());
            println!(
                "Applied {} of {} additions -> {}",
                result.report.applied_count(),
                result.proposed,
                output.display()
            );
            Ok(())
        }
        Err(ProcessError::NothingApplied { report, .. }) => bail!(
            "none of the {} additions matched a paragraph; {} left unchanged",
            report.skipped.len(),
            input.display()
        ),
        Err(err) => Err(err).with_context(|| format!("failed to annotate {}", input.display())),
    }
}

fn default_output_path(input: &Path) -> Result<PathBuf> {
    let name = input
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("input path has no usable file name: {}", input.display()))?;
    Ok(input.with_file_name(output_file_name(name)))
}
