use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand};
use scan2sheet::{
    BatchReport, BatchStatus, ExtractOptions, GroupingStrategy, PageOutput, PageSelection,
    Pdftoppm, Pipeline, TesseractCli, run_batch_paths,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "scan2xlsx",
    version,
    about = "Rebuild the layout of scanned images and PDFs into styled spreadsheets"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run OCR on the inputs and write one workbook per image or PDF page.
    Extract(ExtractArgs),
}

#[derive(Debug, Args)]
struct ExtractArgs {
    /// Input image or PDF path. Repeatable.
    #[arg(short, long = "input", required = true)]
    inputs: Vec<PathBuf>,

    /// Output directory for workbooks and the archive.
    #[arg(short, long, default_value = ".")]
    output: PathBuf,

    /// JSON file with extraction options; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Minimum OCR confidence (0-100) a word needs to be kept.
    #[arg(long)]
    confidence: Option<i32>,

    /// Vertical distance in pixels within which words share a row.
    #[arg(long)]
    row_height: Option<u32>,

    /// Largest horizontal gap in pixels still treated as a word space.
    #[arg(long)]
    word_spacing: Option<u32>,

    /// Horizontal gap in pixels that starts a new column.
    #[arg(long)]
    column_break: Option<u32>,

    /// Grouping strategy: word-spacing or simple-column-gap.
    #[arg(long)]
    strategy: Option<String>,

    /// Write all pages of a PDF into one workbook, one sheet per page.
    #[arg(long)]
    merge_pages: bool,

    /// PDF page selection like 1-3,5.
    #[arg(long)]
    pages: Option<String>,

    /// Rasterization resolution for PDF pages.
    #[arg(long)]
    dpi: Option<u32>,

    /// Skip grayscale/contrast/denoise pre-processing.
    #[arg(long)]
    no_preprocess: bool,

    /// Tesseract language code(s), e.g. eng or eng+deu.
    #[arg(long = "lang")]
    language: Option<String>,

    /// Path to the tesseract executable.
    #[arg(long, env = "TESSERACT_CMD")]
    tesseract: Option<PathBuf>,

    /// Path to the pdftoppm executable.
    #[arg(long, env = "PDFTOPPM_CMD")]
    pdftoppm: Option<PathBuf>,

    /// Do not package multiple workbooks into a zip archive.
    #[arg(long)]
    no_archive: bool,

    /// Print the batch summary as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn parse_options(args: &ExtractArgs) -> Result<ExtractOptions> {
    let mut options = match &args.config {
        Some(path) => ExtractOptions::from_json_file(path)
            .with_context(|| format!("failed to load config '{}'", path.display()))?,
        None => ExtractOptions::default(),
    };

    if let Some(value) = args.confidence {
        options.confidence_threshold = value;
    }
    if let Some(value) = args.row_height {
        options.row_height_threshold = value;
    }
    if let Some(value) = args.word_spacing {
        options.word_spacing_threshold = value;
    }
    if let Some(value) = args.column_break {
        options.column_break_threshold = value;
    }
    if let Some(value) = args.strategy.as_deref() {
        options.strategy = GroupingStrategy::from_str(value)
            .map_err(|error| anyhow!("invalid strategy: {error}"))
            .context("failed to parse --strategy")?;
    }
    if args.merge_pages {
        options.page_output = PageOutput::Merged;
    }
    if let Some(value) = args.dpi {
        options.dpi = value;
    }
    if args.no_preprocess {
        options.preprocess = false;
    }
    if let Some(value) = &args.language {
        options.language.clone_from(value);
    }

    options.pages = args
        .pages
        .as_deref()
        .map(PageSelection::from_str)
        .transpose()
        .map_err(|error| anyhow!("invalid page selection: {error}"))
        .context("failed to parse --pages")?;

    options.validate().context("invalid extraction options")?;
    Ok(options)
}

fn print_report(report: &BatchReport, verbose: bool) {
    for item in &report.items {
        let marker = if item.succeeded() { "ok" } else { "no result" };
        println!("{}: {marker}: {}", item.name, item.message);
        if verbose {
            for page in &item.results {
                match page.page {
                    Some(number) => println!("  - page {number}: {}", page.result.message()),
                    None => println!("  - {}", page.result.message()),
                }
            }
        }
    }
}

fn write_outputs(report: BatchReport, args: &ExtractArgs) -> Result<Vec<PathBuf>> {
    if report.succeeded_count() == 0 {
        return Ok(Vec::new());
    }

    fs::create_dir_all(&args.output).with_context(|| {
        format!("failed to create output directory '{}'", args.output.display())
    })?;

    let mut written = Vec::new();
    if !args.no_archive {
        let archive = report
            .write_archive_to(&args.output, &chrono::Local::now())
            .context("failed to write zip archive")?;
        written.extend(archive);
    }
    written.extend(
        report
            .persist(&args.output)
            .context("failed to write workbooks")?,
    );
    Ok(written)
}

fn run_extract(args: &ExtractArgs) -> Result<BatchStatus> {
    let options = parse_options(args)?;

    let ocr = TesseractCli::locate(args.tesseract.as_deref(), &options.language);
    let rasterizer = Pdftoppm::locate(args.pdftoppm.as_deref());
    let pipeline = Pipeline::new(&ocr, &rasterizer);

    let report = run_batch_paths(&pipeline, &args.inputs, &options);
    let status = report.status;

    if args.json {
        let summary = serde_json::to_string_pretty(&report.summary())
            .context("failed to serialize batch summary")?;
        println!("{summary}");
    } else {
        print_report(&report, args.verbose);
    }

    for path in write_outputs(report, args)? {
        eprintln!("wrote {}", path.display());
    }
    Ok(status)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let Commands::Extract(args) = &cli.command;

    let default_filter = if args.verbose {
        "scan2sheet=info"
    } else {
        "scan2sheet=warn"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    match run_extract(args) {
        Ok(BatchStatus::NoSuccess) => ExitCode::from(2),
        Ok(BatchStatus::AllSucceeded | BatchStatus::PartialSuccess) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error:#}");
            ExitCode::from(1)
        }
    }
}
