use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "exam-vocab-ocr",
    version,
    about = "Extract English passages and vocabulary from scanned exam pages"
)]
struct Cli {
    /// Page images of one document, or a single PDF
    #[arg(required_unless_present = "show_ocr_languages")]
    inputs: Vec<PathBuf>,

    /// Enhancement level: light, standard or aggressive
    #[arg(short = 'e', long = "level")]
    level: Option<String>,

    /// Model used for text cleanup (default from settings)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides OPENAI_API_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Skip the LLM cleanup and filter raw OCR text locally
    #[arg(long = "no-cleanup")]
    no_cleanup: bool,

    /// Name recorded as source_file (default: first input path)
    #[arg(long = "source-name")]
    source_name: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Write the JSON result to a file instead of stdout
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Show languages installed for the OCR engine and exit
    #[arg(long = "show-ocr-languages")]
    show_ocr_languages: bool,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    exam_vocab_ocr::logging::init(cli.verbose)?;

    let output = exam_vocab_ocr::run(exam_vocab_ocr::Config {
        inputs: cli.inputs,
        level: cli.level,
        model: cli.model,
        key: cli.key,
        no_cleanup: cli.no_cleanup,
        source_name: cli.source_name,
        settings_path: cli.read_settings,
        show_ocr_languages: cli.show_ocr_languages,
    })
    .await?;

    match cli.output {
        Some(path) => std::fs::write(&path, format!("{}\n", output))
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{}", output),
    }
    Ok(())
}
