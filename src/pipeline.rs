use image::DynamicImage;
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::artifact::Artifact;
use crate::error::ExtractError;
use crate::model::Grid;
use crate::ocr::{CANDIDATE_CONFIGS, OcrConfig, OcrEngine};
use crate::options::{ExtractOptions, PageOutput};
use crate::pdf_raster::{PageImage, Rasterizer};
use crate::preprocess::{ContrastPreprocessor, Preprocessor};
use crate::row_layout::layout_grid;
use crate::token_extract::TokenExtractor;
use crate::warning::{ExtractWarning, WarningCode};
use crate::xlsx_out::{assemble, assemble_sheets};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    NoTextDetected,
    NoRowsFormed,
    AssemblyFailed,
    CollaboratorFailed,
    MalformedInput,
}

impl FailureKind {
    /// Bucket for an error raised outside assembly.
    #[must_use]
    pub fn of(error: &ExtractError) -> Self {
        match error {
            ExtractError::Image(_)
            | ExtractError::PdfLoad(_)
            | ExtractError::NoPagesSelected
            | ExtractError::InvalidPageSelection(_) => Self::MalformedInput,
            ExtractError::Xlsx(_) | ExtractError::Archive(_) => Self::AssemblyFailed,
            _ => Self::CollaboratorFailed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl ItemFailure {
    #[must_use]
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionReport {
    pub token_count: usize,
    pub run_count: usize,
    pub row_count: usize,
    pub column_count: u16,
    pub ocr_config: Option<String>,
    pub score: f64,
    pub warnings: Vec<ExtractWarning>,
}

/// Outcome of one image or page: an artifact with a summary, or the reason
/// there is none.
#[derive(Debug)]
pub enum ProcessingResult {
    Extracted {
        artifact: Artifact,
        summary: String,
        report: ExtractionReport,
    },
    NoResult(ItemFailure),
}

impl ProcessingResult {
    #[must_use]
    pub fn is_extracted(&self) -> bool {
        matches!(self, Self::Extracted { .. })
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Extracted { summary, .. } => summary,
            Self::NoResult(failure) => &failure.message,
        }
    }

    #[must_use]
    pub fn artifact(&self) -> Option<&Artifact> {
        match self {
            Self::Extracted { artifact, .. } => Some(artifact),
            Self::NoResult(_) => None,
        }
    }

    #[must_use]
    pub fn report(&self) -> Option<&ExtractionReport> {
        match self {
            Self::Extracted { report, .. } => Some(report),
            Self::NoResult(_) => None,
        }
    }
}

/// A grid ready for assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct PageLayout {
    pub grid: Grid,
    pub report: ExtractionReport,
}

#[derive(Debug)]
pub struct PageResult {
    /// `None` for single images and merged PDF workbooks.
    pub page: Option<u32>,
    pub result: ProcessingResult,
}

#[derive(Debug)]
pub struct DocumentOutcome {
    pub results: Vec<PageResult>,
    pub message: String,
}

impl DocumentOutcome {
    fn failed(failure: ItemFailure) -> Self {
        Self {
            message: failure.message.clone(),
            results: vec![PageResult {
                page: None,
                result: ProcessingResult::NoResult(failure),
            }],
        }
    }

    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.results.iter().any(|page| page.result.is_extracted())
    }
}

fn write_layout(layout: PageLayout) -> ProcessingResult {
    match assemble(&layout.grid) {
        Ok(Some(artifact)) => ProcessingResult::Extracted {
            artifact,
            summary: summary_for(&layout.report),
            report: layout.report,
        },
        Ok(None) => ProcessingResult::NoResult(ItemFailure::new(
            FailureKind::NoRowsFormed,
            "No rows could be formed from the recognized text",
        )),
        Err(error) => ProcessingResult::NoResult(ItemFailure::new(
            FailureKind::AssemblyFailed,
            format!("Error creating spreadsheet: {error}"),
        )),
    }
}

fn low_confidence_warning(grid: &Grid) -> Option<ExtractWarning> {
    let muted = grid
        .rows
        .iter()
        .flat_map(|row| row.cells.iter())
        .filter(|cell| cell.style.muted)
        .collect::<Vec<_>>();
    let lowest = muted
        .iter()
        .map(|cell| cell.run.confidence)
        .reduce(f32::min)?;
    Some(
        ExtractWarning::new(
            WarningCode::LowConfidence,
            format!("{} text run(s) have low OCR confidence", muted.len()),
        )
        .with_confidence(lowest),
    )
}

fn summary_for(report: &ExtractionReport) -> String {
    format!("Successfully extracted {} text elements", report.token_count)
}

/// One configured run of the layout reconstruction: collaborators are fixed
/// at construction, thresholds arrive with each call.
pub struct Pipeline<'a> {
    ocr: &'a dyn OcrEngine,
    rasterizer: &'a dyn Rasterizer,
    preprocessor: &'a dyn Preprocessor,
    configs: &'a [OcrConfig],
}

impl<'a> Pipeline<'a> {
    #[must_use]
    pub fn new(ocr: &'a dyn OcrEngine, rasterizer: &'a dyn Rasterizer) -> Self {
        Self {
            ocr,
            rasterizer,
            preprocessor: &ContrastPreprocessor,
            configs: &CANDIDATE_CONFIGS,
        }
    }

    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: &'a dyn Preprocessor) -> Self {
        self.preprocessor = preprocessor;
        self
    }

    #[must_use]
    pub fn with_configs(mut self, configs: &'a [OcrConfig]) -> Self {
        self.configs = configs;
        self
    }

    /// Extraction and layout for one image, without writing anything.
    pub fn layout_page(
        &self,
        image: &DynamicImage,
        options: &ExtractOptions,
    ) -> Result<PageLayout, ItemFailure> {
        let prepared;
        let image = if options.preprocess {
            prepared = self.preprocessor.prepare(image);
            &prepared
        } else {
            image
        };

        let extraction = TokenExtractor::new(self.ocr, self.configs)
            .extract(image, options.confidence_threshold)
            .map_err(|error| {
                ItemFailure::new(
                    FailureKind::of(&error),
                    format!("Error extracting text: {error}"),
                )
            })?;

        if extraction.tokens.is_empty() {
            return Err(ItemFailure::new(
                FailureKind::NoTextDetected,
                "No text found in image",
            ));
        }

        let token_count = extraction.tokens.len();
        let grid = layout_grid(extraction.tokens, options);
        if grid.is_empty() {
            return Err(ItemFailure::new(
                FailureKind::NoRowsFormed,
                "No rows could be formed from the recognized text",
            ));
        }

        let mut warnings = extraction.warnings;
        warnings.extend(low_confidence_warning(&grid));

        let report = ExtractionReport {
            token_count,
            run_count: grid.run_count(),
            row_count: grid.rows.len(),
            column_count: grid.column_count(),
            ocr_config: extraction.config.map(|config| config.to_string()),
            score: extraction.score,
            warnings,
        };
        Ok(PageLayout { grid, report })
    }

    pub fn process_image(&self, image: &DynamicImage, options: &ExtractOptions) -> ProcessingResult {
        match self.layout_page(image, options) {
            Ok(layout) => write_layout(layout),
            Err(failure) => ProcessingResult::NoResult(failure),
        }
    }

    /// Like [`Self::layout_page`], with every warning tagged with the page
    /// number.
    fn layout_pdf_page(
        &self,
        page: &PageImage,
        options: &ExtractOptions,
    ) -> Result<PageLayout, ItemFailure> {
        let mut layout = self.layout_page(&page.image, options)?;
        layout.report.warnings = std::mem::take(&mut layout.report.warnings)
            .into_iter()
            .map(|warning| warning.with_page(page.page_number))
            .collect();
        Ok(layout)
    }

    /// Decodes image bytes first; undecodable input is a malformed-input
    /// failure rather than an error.
    pub fn process_image_bytes(&self, bytes: &[u8], options: &ExtractOptions) -> ProcessingResult {
        match image::load_from_memory(bytes) {
            Ok(image) => self.process_image(&image, options),
            Err(error) => ProcessingResult::NoResult(ItemFailure::new(
                FailureKind::MalformedInput,
                format!("Error processing image: {error}"),
            )),
        }
    }

    pub fn process_pdf(&self, pdf: &[u8], options: &ExtractOptions) -> DocumentOutcome {
        let pages = match self
            .rasterizer
            .rasterize(pdf, options.dpi, options.pages.as_ref())
        {
            Ok(pages) => pages,
            Err(error) => {
                warn!("pdf rasterization failed: {error}");
                return DocumentOutcome::failed(ItemFailure::new(
                    FailureKind::of(&error),
                    format!("Error processing PDF: {error}"),
                ));
            }
        };

        let page_count = pages.len();
        let results = match options.page_output {
            PageOutput::PerPage => self.pages_to_workbooks(&pages, options),
            PageOutput::Merged => self.pages_to_merged_workbook(&pages, options),
        };

        info!("pdf: {page_count} page(s) processed");
        DocumentOutcome {
            results,
            message: format!("Successfully processed {page_count} pages"),
        }
    }

    fn pages_to_workbooks(&self, pages: &[PageImage], options: &ExtractOptions) -> Vec<PageResult> {
        pages
            .par_iter()
            .map(|page| PageResult {
                page: Some(page.page_number),
                result: match self.layout_pdf_page(page, options) {
                    Ok(layout) => write_layout(layout),
                    Err(failure) => ProcessingResult::NoResult(failure),
                },
            })
            .collect()
    }

    fn pages_to_merged_workbook(
        &self,
        pages: &[PageImage],
        options: &ExtractOptions,
    ) -> Vec<PageResult> {
        let layouts = pages
            .par_iter()
            .map(|page| (page.page_number, self.layout_pdf_page(page, options)))
            .collect::<Vec<_>>();

        let mut results = Vec::new();
        let mut sheets = Vec::new();
        let mut reports = Vec::new();
        for (page_number, layout) in &layouts {
            match layout {
                Ok(layout) => {
                    sheets.push((format!("Page {page_number}"), &layout.grid));
                    reports.push(&layout.report);
                }
                Err(failure) => results.push(PageResult {
                    page: Some(*page_number),
                    result: ProcessingResult::NoResult(failure.clone()),
                }),
            }
        }

        if sheets.is_empty() {
            return results;
        }

        let merged = ExtractionReport {
            token_count: reports.iter().map(|report| report.token_count).sum(),
            run_count: reports.iter().map(|report| report.run_count).sum(),
            row_count: reports.iter().map(|report| report.row_count).sum(),
            column_count: reports
                .iter()
                .map(|report| report.column_count)
                .max()
                .unwrap_or(0),
            ocr_config: None,
            score: reports.iter().map(|report| report.score).sum(),
            warnings: reports
                .iter()
                .flat_map(|report| report.warnings.iter().cloned())
                .collect(),
        };

        let result = match assemble_sheets(&sheets) {
            Ok(Some(artifact)) => ProcessingResult::Extracted {
                artifact,
                summary: format!(
                    "Successfully extracted {} text elements from {} pages",
                    merged.token_count,
                    sheets.len()
                ),
                report: merged,
            },
            Ok(None) => ProcessingResult::NoResult(ItemFailure::new(
                FailureKind::NoRowsFormed,
                "No rows could be formed from the recognized text",
            )),
            Err(error) => ProcessingResult::NoResult(ItemFailure::new(
                FailureKind::AssemblyFailed,
                format!("Error creating spreadsheet: {error}"),
            )),
        };

        results.insert(0, PageResult { page: None, result });
        results
    }
}
