use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::artifact::{Artifact, archive_file_name, artifact_file_name, write_archive};
use crate::error::ExtractError;
use crate::ocr::OcrEngine;
use crate::options::ExtractOptions;
use crate::pdf_raster::Rasterizer;
use crate::pipeline::{
    ExtractionReport, FailureKind, ItemFailure, PageResult, Pipeline, ProcessingResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InputKind {
    Image,
    Pdf,
}

impl InputKind {
    /// `.pdf` extension (any case) or a `%PDF` header; everything else is
    /// treated as an image.
    #[must_use]
    pub fn detect(name: &str, bytes: &[u8]) -> Self {
        let pdf_extension = Path::new(name)
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| extension.eq_ignore_ascii_case("pdf"));
        if pdf_extension || bytes.starts_with(b"%PDF") {
            Self::Pdf
        } else {
            Self::Image
        }
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.display().to_string(), |name| name.to_string_lossy().into_owned())
}

/// A named input held in memory.
#[derive(Debug, Clone)]
pub struct InputDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl InputDocument {
    #[must_use]
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ExtractError> {
        let bytes = fs::read(path)?;
        Ok(Self {
            name: display_name(path),
            bytes,
        })
    }

    #[must_use]
    pub fn kind(&self) -> InputKind {
        InputKind::detect(&self.name, &self.bytes)
    }
}

#[derive(Debug)]
pub struct ItemOutcome {
    pub name: String,
    pub kind: InputKind,
    pub message: String,
    pub results: Vec<PageResult>,
}

impl ItemOutcome {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.results.iter().any(|page| page.result.is_extracted())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    AllSucceeded,
    PartialSuccess,
    NoSuccess,
}

#[derive(Debug)]
pub struct BatchReport {
    pub items: Vec<ItemOutcome>,
    pub status: BatchStatus,
}

#[derive(Debug, Serialize)]
pub struct ResultSummary<'a> {
    pub page: Option<u32>,
    pub extracted: bool,
    pub message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<&'a ExtractionReport>,
}

#[derive(Debug, Serialize)]
pub struct ItemSummary<'a> {
    pub name: &'a str,
    pub kind: InputKind,
    pub succeeded: bool,
    pub message: &'a str,
    pub results: Vec<ResultSummary<'a>>,
}

/// JSON view of a [`BatchReport`].
#[derive(Debug, Serialize)]
pub struct BatchSummary<'a> {
    pub status: BatchStatus,
    pub succeeded: usize,
    pub total: usize,
    pub items: Vec<ItemSummary<'a>>,
}

fn batch_status(items: &[ItemOutcome]) -> BatchStatus {
    let succeeded = items.iter().filter(|item| item.succeeded()).count();
    if succeeded == 0 {
        BatchStatus::NoSuccess
    } else if succeeded == items.len() {
        BatchStatus::AllSucceeded
    } else {
        BatchStatus::PartialSuccess
    }
}

fn unique_name(seen: &mut HashSet<String>, name: String, position: usize) -> String {
    if seen.insert(name.clone()) {
        return name;
    }
    let prefixed = format!("{position}_{name}");
    if seen.insert(prefixed.clone()) {
        return prefixed;
    }
    let (stem, extension) = prefixed
        .rsplit_once('.')
        .map_or((prefixed.as_str(), ""), |(stem, extension)| (stem, extension));
    let mut counter = 2_usize;
    loop {
        let candidate = if extension.is_empty() {
            format!("{stem}_{counter}")
        } else {
            format!("{stem}_{counter}.{extension}")
        };
        if seen.insert(candidate.clone()) {
            return candidate;
        }
        counter += 1;
    }
}

impl BatchReport {
    #[must_use]
    pub fn succeeded_count(&self) -> usize {
        self.items.iter().filter(|item| item.succeeded()).count()
    }

    /// Every artifact with its output file name, in input and page order.
    /// Names repeated across inputs get the item's 1-based position as a
    /// prefix, then a counter before the extension while still taken.
    #[must_use]
    pub fn named_artifacts(&self) -> Vec<(String, &Artifact)> {
        let mut seen = HashSet::new();
        let mut named = Vec::new();
        for (index, item) in self.items.iter().enumerate() {
            for page in &item.results {
                let Some(artifact) = page.result.artifact() else {
                    continue;
                };
                let name = artifact_file_name(&item.name, page.page);
                let name = unique_name(&mut seen, name, index + 1);
                named.push((name, artifact));
            }
        }
        named
    }

    #[must_use]
    pub fn summary(&self) -> BatchSummary<'_> {
        let mut files = self.named_artifacts().into_iter().map(|(name, _)| name);
        let items = self
            .items
            .iter()
            .map(|item| ItemSummary {
                name: &item.name,
                kind: item.kind,
                succeeded: item.succeeded(),
                message: &item.message,
                results: item
                    .results
                    .iter()
                    .map(|page| match &page.result {
                        ProcessingResult::Extracted {
                            summary, report, ..
                        } => ResultSummary {
                            page: page.page,
                            extracted: true,
                            message: summary,
                            failure: None,
                            file: files.next(),
                            report: Some(report),
                        },
                        ProcessingResult::NoResult(failure) => ResultSummary {
                            page: page.page,
                            extracted: false,
                            message: &failure.message,
                            failure: Some(failure.kind),
                            file: None,
                            report: None,
                        },
                    })
                    .collect(),
            })
            .collect();

        BatchSummary {
            status: self.status,
            succeeded: self.succeeded_count(),
            total: self.items.len(),
            items,
        }
    }

    /// Packages all artifacts into `ocr_results_<timestamp>.zip` inside
    /// `out_dir`. Returns `None` when the batch produced fewer than two
    /// artifacts.
    pub fn write_archive_to<Tz>(
        &self,
        out_dir: &Path,
        now: &DateTime<Tz>,
    ) -> Result<Option<PathBuf>, ExtractError>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        let artifacts = self.named_artifacts();
        if artifacts.len() < 2 {
            return Ok(None);
        }

        let path = out_dir.join(archive_file_name(now));
        let file = BufWriter::new(File::create(&path)?);
        write_archive(file, &artifacts)?.flush()?;
        info!("archived {} workbook(s) into {}", artifacts.len(), path.display());
        Ok(Some(path))
    }

    /// Moves every artifact into `out_dir` under its output file name.
    pub fn persist(self, out_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
        let names = self
            .named_artifacts()
            .into_iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        let artifacts = self
            .items
            .into_iter()
            .flat_map(|item| item.results)
            .filter_map(|page| match page.result {
                ProcessingResult::Extracted { artifact, .. } => Some(artifact),
                ProcessingResult::NoResult(_) => None,
            });

        names
            .into_iter()
            .zip(artifacts)
            .map(|(name, artifact)| artifact.persist(&out_dir.join(name)))
            .collect()
    }
}

fn process_item(pipeline: &Pipeline<'_>, input: &InputDocument, options: &ExtractOptions) -> ItemOutcome {
    let kind = input.kind();
    let (results, message) = match kind {
        InputKind::Image => {
            let result = pipeline.process_image_bytes(&input.bytes, options);
            let message = result.message().to_string();
            (vec![PageResult { page: None, result }], message)
        }
        InputKind::Pdf => {
            let outcome = pipeline.process_pdf(&input.bytes, options);
            (outcome.results, outcome.message)
        }
    };

    let outcome = ItemOutcome {
        name: input.name.clone(),
        kind,
        message,
        results,
    };
    if outcome.succeeded() {
        info!("{}: {}", outcome.name, outcome.message);
    } else {
        warn!("{}: no result: {}", outcome.name, outcome.message);
    }
    outcome
}

/// Runs every input through `pipeline`. A failing input only affects its own
/// outcome; outcomes keep input order.
pub fn run_batch(
    pipeline: &Pipeline<'_>,
    inputs: &[InputDocument],
    options: &ExtractOptions,
) -> BatchReport {
    let items = inputs
        .par_iter()
        .map(|input| process_item(pipeline, input, options))
        .collect::<Vec<_>>();
    let status = batch_status(&items);
    BatchReport { items, status }
}

fn unreadable_item(path: &Path, error: &ExtractError) -> ItemOutcome {
    let name = display_name(path);
    let failure = ItemFailure::new(
        FailureKind::MalformedInput,
        format!("Error reading input: {error}"),
    );
    warn!("{name}: no result: {}", failure.message);
    ItemOutcome {
        kind: InputKind::detect(&name, &[]),
        message: failure.message.clone(),
        results: vec![PageResult {
            page: None,
            result: ProcessingResult::NoResult(failure),
        }],
        name,
    }
}

/// Reads and processes every path. A path that cannot be read becomes a
/// malformed-input outcome in its own position.
pub fn run_batch_paths<P>(
    pipeline: &Pipeline<'_>,
    paths: &[P],
    options: &ExtractOptions,
) -> BatchReport
where
    P: AsRef<Path> + Sync,
{
    let items = paths
        .par_iter()
        .map(|path| {
            let path = path.as_ref();
            match InputDocument::from_path(path) {
                Ok(input) => process_item(pipeline, &input, options),
                Err(error) => unreadable_item(path, &error),
            }
        })
        .collect::<Vec<_>>();
    let status = batch_status(&items);
    BatchReport { items, status }
}

pub fn process_batch(
    inputs: &[InputDocument],
    ocr: &dyn OcrEngine,
    rasterizer: &dyn Rasterizer,
    options: &ExtractOptions,
) -> BatchReport {
    run_batch(&Pipeline::new(ocr, rasterizer), inputs, options)
}

#[cfg(test)]
mod tests {
    use super::{BatchStatus, InputKind, ItemOutcome, batch_status};
    use crate::pipeline::{FailureKind, ItemFailure, PageResult, ProcessingResult};

    fn failed_item(name: &str) -> ItemOutcome {
        ItemOutcome {
            name: name.to_string(),
            kind: InputKind::Image,
            message: "No text found in image".to_string(),
            results: vec![PageResult {
                page: None,
                result: ProcessingResult::NoResult(ItemFailure::new(
                    FailureKind::NoTextDetected,
                    "No text found in image",
                )),
            }],
        }
    }

    #[test]
    fn detects_pdf_by_extension_or_magic() {
        assert_eq!(InputKind::detect("scan.PDF", b""), InputKind::Pdf);
        assert_eq!(InputKind::detect("upload", b"%PDF-1.7\n"), InputKind::Pdf);
        assert_eq!(InputKind::detect("photo.jpg", b"\xFF\xD8\xFF"), InputKind::Image);
    }

    #[test]
    fn empty_or_failed_batches_have_no_success() {
        assert_eq!(batch_status(&[]), BatchStatus::NoSuccess);
        assert_eq!(
            batch_status(&[failed_item("a.png"), failed_item("b.png")]),
            BatchStatus::NoSuccess
        );
    }
}
