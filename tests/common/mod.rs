#![allow(dead_code)]

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use scan2sheet::{ExtractError, OcrConfig, OcrEngine, PageImage, PageSelection, RawWord, Rasterizer};

pub fn word(text: &str, confidence: i32, left: u32, top: u32, width: u32, height: u32) -> RawWord {
    RawWord {
        text: text.to_string(),
        left,
        top,
        width,
        height,
        confidence,
    }
}

/// Two rows: "INVOICE #1234" on top, "Date:" and "2024-01-01" far enough
/// apart to land in separate columns.
pub fn invoice_words() -> Vec<RawWord> {
    vec![
        word("INVOICE", 95, 10, 10, 80, 20),
        word("#1234", 90, 100, 10, 50, 20),
        word("Date:", 80, 10, 40, 40, 15),
        word("2024-01-01", 85, 200, 40, 90, 15),
    ]
}

/// OCR engine driven by a closure over the image and configuration.
pub struct ScriptedEngine<F>(pub F);

impl<F> OcrEngine for ScriptedEngine<F>
where
    F: Fn(&DynamicImage, &OcrConfig) -> Result<Vec<RawWord>, ExtractError> + Sync,
{
    fn recognize(
        &self,
        image: &DynamicImage,
        config: &OcrConfig,
    ) -> Result<Vec<RawWord>, ExtractError> {
        (self.0)(image, config)
    }
}

pub fn uniform_engine(
    words: Vec<RawWord>,
) -> ScriptedEngine<impl Fn(&DynamicImage, &OcrConfig) -> Result<Vec<RawWord>, ExtractError> + Sync> {
    ScriptedEngine(
        move |_: &DynamicImage, _: &OcrConfig| -> Result<Vec<RawWord>, ExtractError> {
            Ok(words.clone())
        },
    )
}

pub fn failing_engine()
-> ScriptedEngine<impl Fn(&DynamicImage, &OcrConfig) -> Result<Vec<RawWord>, ExtractError> + Sync> {
    ScriptedEngine(|_: &DynamicImage, _: &OcrConfig| -> Result<Vec<RawWord>, ExtractError> {
        Err(ExtractError::Ocr("tesseract exited with status 1".to_string()))
    })
}

/// Page number encoded in the rendered image width.
pub fn page_width(page_number: u32) -> u32 {
    100 + page_number
}

pub fn page_of(image: &DynamicImage) -> u32 {
    image.width() - 100
}

/// Renders `count` blank pages; honours the page selection.
pub struct BlankPages {
    pub count: u32,
}

impl Rasterizer for BlankPages {
    fn rasterize(
        &self,
        _pdf: &[u8],
        _dpi: u32,
        pages: Option<&PageSelection>,
    ) -> Result<Vec<PageImage>, ExtractError> {
        let images = (1..=self.count)
            .filter(|page| pages.is_none_or(|selection| selection.contains(*page)))
            .map(|page_number| PageImage {
                page_number,
                image: DynamicImage::new_rgb8(page_width(page_number), 60),
            })
            .collect::<Vec<_>>();
        if images.is_empty() {
            return Err(ExtractError::NoPagesSelected);
        }
        Ok(images)
    }
}

pub struct BrokenRasterizer;

impl Rasterizer for BrokenRasterizer {
    fn rasterize(
        &self,
        _pdf: &[u8],
        _dpi: u32,
        _pages: Option<&PageSelection>,
    ) -> Result<Vec<PageImage>, ExtractError> {
        Err(ExtractError::Rasterize("failed to run pdftoppm".to_string()))
    }
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    DynamicImage::new_rgb8(width, height)
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("PNG fixture should encode");
    bytes
}

pub fn create_test_pdf(pages: &[Vec<&str>]) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut page_ids = Vec::new();

    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TL", vec![16.into()]),
            Operation::new("Td", vec![50.into(), 780.into()]),
        ];

        for (index, line) in lines.iter().enumerate() {
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
            if index + 1 < lines.len() {
                operations.push(Operation::new("T*", vec![]));
            }
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        page_ids.push(page_id);
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => page_ids.iter().map(|id| (*id).into()).collect::<Vec<_>>(),
            "Count" => i64::try_from(page_ids.len())?,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)?;
    Ok(bytes)
}
