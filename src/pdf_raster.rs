//! PDF-to-image seam. Only scanned content is handled, so every page goes
//! through a raster image and OCR; embedded vector text is never read.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use image::DynamicImage;
use lopdf::Document;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::options::PageSelection;

#[derive(Debug, Clone)]
pub struct PageImage {
    /// 1-based page number in the source document.
    pub page_number: u32,
    pub image: DynamicImage,
}

pub trait Rasterizer: Sync {
    /// Renders the selected pages (all when `pages` is `None`) in page order.
    fn rasterize(
        &self,
        pdf: &[u8],
        dpi: u32,
        pages: Option<&PageSelection>,
    ) -> Result<Vec<PageImage>, ExtractError>;
}

/// Parses the document and returns its page count. Unreadable bytes surface
/// as [`ExtractError::PdfLoad`].
pub fn pdf_page_count(pdf: &[u8]) -> Result<u32, ExtractError> {
    let document = Document::load_mem(pdf)?;
    Ok(u32::try_from(document.get_pages().len()).unwrap_or(u32::MAX))
}

/// Page numbers to render, in order.
pub(crate) fn selected_pages(
    page_count: u32,
    selection: Option<&PageSelection>,
) -> Result<Vec<u32>, ExtractError> {
    let pages = (1..=page_count)
        .filter(|page| selection.is_none_or(|selection| selection.contains(*page)))
        .collect::<Vec<_>>();
    if pages.is_empty() {
        return Err(ExtractError::NoPagesSelected);
    }
    Ok(pages)
}

/// Renders pages with poppler's `pdftoppm`.
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    program: PathBuf,
}

impl Pdftoppm {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[must_use]
    pub fn locate(explicit: Option<&Path>) -> Self {
        let program = match explicit {
            Some(path) => path.to_path_buf(),
            None => which::which("pdftoppm").unwrap_or_else(|_| {
                warn!("pdftoppm not found on PATH - install poppler-utils for PDF support");
                PathBuf::from("pdftoppm")
            }),
        };
        debug!("using pdftoppm at {}", program.display());
        Self::new(program)
    }

    fn render_page(
        &self,
        pdf_path: &Path,
        out_dir: &Path,
        page: u32,
        dpi: u32,
    ) -> Result<DynamicImage, ExtractError> {
        let prefix = out_dir.join(format!("page-{page}"));
        let page_arg = page.to_string();
        let output = Command::new(&self.program)
            .arg("-png")
            .arg("-r")
            .arg(dpi.to_string())
            .args(["-f", page_arg.as_str(), "-l", page_arg.as_str()])
            .arg("-singlefile")
            .arg(pdf_path)
            .arg(&prefix)
            .output()
            .map_err(|error| {
                ExtractError::Rasterize(format!(
                    "failed to run {}: {error}",
                    self.program.display()
                ))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractError::Rasterize(format!(
                "pdftoppm failed on page {page}: {}",
                stderr.trim()
            )));
        }

        let png_path = prefix.with_extension("png");
        if !png_path.exists() {
            return Err(ExtractError::Rasterize(format!(
                "pdftoppm produced no image for page {page}"
            )));
        }
        Ok(image::open(&png_path)?)
    }
}

impl Rasterizer for Pdftoppm {
    fn rasterize(
        &self,
        pdf: &[u8],
        dpi: u32,
        pages: Option<&PageSelection>,
    ) -> Result<Vec<PageImage>, ExtractError> {
        let page_count = pdf_page_count(pdf)?;
        let pages = selected_pages(page_count, pages)?;

        // removed on every exit path when `work_dir` drops
        let work_dir = tempfile::tempdir()?;
        let pdf_path = work_dir.path().join("input.pdf");
        fs::write(&pdf_path, pdf)?;

        let mut images = Vec::with_capacity(pages.len());
        for page_number in pages {
            let image = self.render_page(&pdf_path, work_dir.path(), page_number, dpi)?;
            images.push(PageImage { page_number, image });
        }

        debug!("rasterized {} of {page_count} page(s) at {dpi} dpi", images.len());
        Ok(images)
    }
}
