use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),

    #[error("failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error),

    #[error("failed to parse OCR output: {0}")]
    Tsv(#[from] csv::Error),

    #[error("spreadsheet write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("archive write error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("invalid configuration file: {0}")]
    Config(#[from] serde_json::Error),

    #[error("OCR engine failed: {0}")]
    Ocr(String),

    #[error("PDF rasterization failed: {0}")]
    Rasterize(String),

    #[error("invalid page selection: {0}")]
    InvalidPageSelection(String),

    #[error("invalid option: {0}")]
    InvalidOption(String),

    #[error("no pages available after applying selection")]
    NoPagesSelected,
}
