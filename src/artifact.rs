use std::fs;
use std::io::{Seek, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tempfile::TempPath;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::error::ExtractError;

/// A produced workbook living in a temporary file. The file is removed when
/// the handle is dropped unless it was persisted first.
#[derive(Debug)]
pub struct Artifact {
    path: TempPath,
}

impl Artifact {
    pub(crate) fn from_temp_path(path: TempPath) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>, ExtractError> {
        Ok(fs::read(&self.path)?)
    }

    /// Moves the artifact to `destination`, copying when a rename is not
    /// possible (for example across filesystems).
    pub fn persist(self, destination: &Path) -> Result<PathBuf, ExtractError> {
        match self.path.persist(destination) {
            Ok(()) => Ok(destination.to_path_buf()),
            Err(error) => {
                fs::copy(&error.path, destination)?;
                Ok(destination.to_path_buf())
            }
        }
    }
}

/// `ocr_results_<YYYYmmdd_HHMMSS>.zip`
#[must_use]
pub fn archive_file_name<Tz>(now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    format!("ocr_results_{}.zip", now.format("%Y%m%d_%H%M%S"))
}

/// Packages named artifacts into one zip archive.
pub fn write_archive<W>(writer: W, entries: &[(String, &Artifact)]) -> Result<W, ExtractError>
where
    W: Write + Seek,
{
    let mut zip = ZipWriter::new(writer);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, artifact) in entries {
        zip.start_file(name.as_str(), options)?;
        zip.write_all(&artifact.read_bytes()?)?;
    }

    Ok(zip.finish()?)
}

/// Output file name for one artifact of an input.
#[must_use]
pub fn artifact_file_name(input_name: &str, page: Option<u32>) -> String {
    let stem = Path::new(input_name)
        .file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .unwrap_or("document");
    match page {
        Some(page) => format!("{stem}_page_{page}_extracted.xlsx"),
        None => format!("{stem}_extracted.xlsx"),
    }
}
