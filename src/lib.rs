mod artifact;
mod batch;
mod error;
mod model;
mod ocr;
mod options;
mod pdf_raster;
mod pipeline;
mod preprocess;
mod row_layout;
mod spacing;
mod style;
mod text_clean;
mod token_extract;
mod warning;
mod xlsx_out;

pub use artifact::{Artifact, archive_file_name, artifact_file_name, write_archive};
pub use batch::{
    BatchReport, BatchStatus, BatchSummary, InputDocument, InputKind, ItemOutcome, ItemSummary,
    ResultSummary, process_batch, run_batch, run_batch_paths,
};
pub use error::ExtractError;
pub use model::{BoundingBox, Grid, GridRow, PlacedRun, Positioned, Row, TextRun, Token};
pub use ocr::{CANDIDATE_CONFIGS, OcrConfig, OcrEngine, RawWord, TesseractCli, parse_tesseract_tsv};
pub use options::{ExtractOptions, GroupingStrategy, PageOutput, PageSelection};
pub use pdf_raster::{PageImage, Pdftoppm, Rasterizer, pdf_page_count};
pub use pipeline::{
    DocumentOutcome, ExtractionReport, FailureKind, ItemFailure, PageLayout, PageResult, Pipeline,
    ProcessingResult,
};
pub use preprocess::{ContrastPreprocessor, Passthrough, Preprocessor};
pub use row_layout::{assign_columns, cluster_rows, layout_grid};
pub use spacing::group_row;
pub use style::{BULLET_GLYPHS, CellStyle, StyleTag, cell_style, classify};
pub use text_clean::clean_ocr_text;
pub use token_extract::{Extraction, TokenExtractor, configuration_score};
pub use warning::{ExtractWarning, WarningCode as ExtractWarningCode};
pub use xlsx_out::{
    COLUMN_PADDING, DEFAULT_SHEET_NAME, MAX_COLUMN_WIDTH, MIN_COLUMN_WIDTH, assemble,
    assemble_sheets, assemble_to_buffer, column_width,
};
