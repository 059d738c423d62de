//! OCR capability seam.
//!
//! The pipeline only needs "given an image and a configuration, return the
//! recognized words with boxes and confidences". [`OcrEngine`] is that
//! contract; [`TesseractCli`] fulfils it by shelling out to the `tesseract`
//! binary and parsing its TSV report.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;

use csv::ReaderBuilder;
use image::{DynamicImage, ImageFormat};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::ExtractError;

/// One recognition pass setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcrConfig {
    pub page_segmentation_mode: u8,
    pub preserve_interword_spaces: bool,
}

impl OcrConfig {
    #[must_use]
    pub const fn new(page_segmentation_mode: u8, preserve_interword_spaces: bool) -> Self {
        Self {
            page_segmentation_mode,
            preserve_interword_spaces,
        }
    }

    /// Command-line arguments understood by tesseract.
    #[must_use]
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["--psm".to_string(), self.page_segmentation_mode.to_string()];
        if self.preserve_interword_spaces {
            args.push("-c".to_string());
            args.push("preserve_interword_spaces=1".to_string());
        }
        args
    }
}

impl fmt::Display for OcrConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_args().join(" "))
    }
}

/// Tried in this order; ties in score keep the earlier entry.
pub const CANDIDATE_CONFIGS: [OcrConfig; 4] = [
    OcrConfig::new(6, true),
    OcrConfig::new(4, true),
    OcrConfig::new(3, false),
    OcrConfig::new(11, false),
];

/// A word as reported by the engine, before any filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawWord {
    pub text: String,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
    /// -1 means the engine did not measure it.
    pub confidence: i32,
}

pub trait OcrEngine: Sync {
    fn recognize(
        &self,
        image: &DynamicImage,
        config: &OcrConfig,
    ) -> Result<Vec<RawWord>, ExtractError>;
}

const TESSERACT_WORD_LEVEL: u8 = 5;

#[derive(Debug, Deserialize)]
struct TsvRecord {
    level: u8,
    left: i64,
    top: i64,
    width: i64,
    height: i64,
    conf: f32,
    #[serde(default)]
    text: Option<String>,
}

fn clamp_coordinate(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

/// Parses the `tsv` report tesseract writes (header row plus one row per
/// page/block/paragraph/line/word). Only word rows are returned.
pub fn parse_tesseract_tsv(tsv: &str) -> Result<Vec<RawWord>, ExtractError> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_reader(tsv.as_bytes());

    let mut words = Vec::new();
    for record in reader.deserialize::<TsvRecord>() {
        let record = record?;
        if record.level != TESSERACT_WORD_LEVEL {
            continue;
        }

        #[allow(clippy::cast_possible_truncation)]
        let confidence = if record.conf < 0.0 {
            -1
        } else {
            record.conf.round().min(100.0) as i32
        };

        words.push(RawWord {
            text: record.text.unwrap_or_default(),
            left: clamp_coordinate(record.left),
            top: clamp_coordinate(record.top),
            width: clamp_coordinate(record.width),
            height: clamp_coordinate(record.height),
            confidence,
        });
    }

    Ok(words)
}

/// Runs the installed `tesseract` executable once per recognition pass.
#[derive(Debug, Clone)]
pub struct TesseractCli {
    program: PathBuf,
    language: String,
}

impl TesseractCli {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, language: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            language: language.into(),
        }
    }

    /// Resolves the executable once: explicit path, then `PATH` lookup, then
    /// the bare name (so a missing binary surfaces as a per-item failure).
    #[must_use]
    pub fn locate(explicit: Option<&Path>, language: &str) -> Self {
        let program = match explicit {
            Some(path) => path.to_path_buf(),
            None => which::which("tesseract").unwrap_or_else(|_| {
                warn!("tesseract not found on PATH - install tesseract-ocr for OCR support");
                PathBuf::from("tesseract")
            }),
        };
        debug!("using tesseract at {}", program.display());
        Self::new(program, language)
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl OcrEngine for TesseractCli {
    fn recognize(
        &self,
        image: &DynamicImage,
        config: &OcrConfig,
    ) -> Result<Vec<RawWord>, ExtractError> {
        let input = tempfile::Builder::new()
            .prefix("scan2sheet-")
            .suffix(".png")
            .tempfile()?;
        image.save_with_format(input.path(), ImageFormat::Png)?;

        let output = Command::new(&self.program)
            .arg(input.path())
            .arg("stdout")
            .arg("-l")
            .arg(&self.language)
            .args(config.to_args())
            .arg("tsv")
            .output()
            .map_err(|error| {
                ExtractError::Ocr(format!(
                    "failed to run {}: {error}",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Ocr(format!(
                "tesseract exited with {} ({config}): {}",
                output.status,
                stderr.trim()
            )));
        }

        parse_tesseract_tsv(&String::from_utf8_lossy(&output.stdout))
    }
}
