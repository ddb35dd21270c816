use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "mangaquick-rust",
    version,
    about = "Detect, translate and re-letter the text of manga pages"
)]
struct Cli {
    /// Page images to translate
    #[arg(required = true)]
    pages: Vec<PathBuf>,

    /// Target language code passed to the translator (default: EN-US)
    #[arg(short = 'l', long = "lang")]
    lang: Option<String>,

    /// Dilation passes applied to the segmentation mask
    #[arg(short = 'D', long = "dilation")]
    dilation: Option<u32>,

    /// Font file used to letter the translations
    #[arg(short = 'f', long = "font")]
    font: Option<PathBuf>,

    /// Largest font size tried when fitting text
    #[arg(short = 's', long = "font-size")]
    font_size: Option<u32>,

    /// Directory holding <page>_mask.png files from the segmentation model
    #[arg(short = 'm', long = "masks")]
    masks: Option<PathBuf>,

    /// Directory holding <page>.json operator edits (canvas export)
    #[arg(short = 'e', long = "edits")]
    edits: Option<PathBuf>,

    /// Work directory for intermediate files (default: prediction)
    #[arg(short = 'w', long = "work-dir")]
    work_dir: Option<PathBuf>,

    /// Zip archive written with the translated pages
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Translation backend: deepl or ollama
    #[arg(short = 't', long = "translator")]
    translator: Option<String>,

    /// API key (overrides DEEPL_KEY)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    mangaquick_rust::logging::init(cli.verbose)?;

    let summary = mangaquick_rust::run(mangaquick_rust::Config {
        pages: cli.pages,
        lang: cli.lang,
        dilation: cli.dilation,
        font: cli.font,
        font_size: cli.font_size,
        masks: cli.masks,
        edits: cli.edits,
        work_dir: cli.work_dir,
        output: cli.output,
        translator: cli.translator,
        key: cli.key,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", summary);
    if summary.all_failed() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
