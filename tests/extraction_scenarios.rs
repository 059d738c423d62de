mod common;

use std::path::Path;

use calamine::{Data, Range, Reader, Xlsx, open_workbook};
use image::DynamicImage;
use pretty_assertions::assert_eq;
use scan2sheet::{
    ExtractError, ExtractOptions, ExtractWarningCode, FailureKind, GroupingStrategy, OcrConfig,
    Passthrough, Pipeline, ProcessingResult, RawWord, StyleTag, Token, layout_grid,
};

use common::{BlankPages, ScriptedEngine, failing_engine, invoice_words, uniform_engine, word};

fn read_sheet(path: &Path, sheet: &str) -> Range<Data> {
    let mut workbook: Xlsx<_> = open_workbook(path).expect("workbook should open");
    workbook
        .worksheet_range(sheet)
        .expect("worksheet should be readable")
}

fn text_at(range: &Range<Data>, row: u32, column: u32) -> Option<String> {
    match range.get_value((row, column)) {
        Some(Data::String(text)) => Some(text.clone()),
        _ => None,
    }
}

fn token(text: &str, confidence: u8, left: u32, top: u32, width: u32, height: u32) -> Token {
    Token {
        text: text.to_string(),
        bbox: scan2sheet::BoundingBox::new(left, top, width, height),
        confidence,
    }
}

fn image() -> DynamicImage {
    DynamicImage::new_rgb8(320, 80)
}

#[test]
fn invoice_tokens_form_header_row_and_merged_date_row() {
    let tokens = vec![
        token("INVOICE", 95, 10, 10, 80, 20),
        token("#1234", 90, 100, 10, 50, 20),
        token("Date:", 80, 10, 40, 40, 15),
        token("2024-01-01", 85, 60, 40, 90, 15),
    ];

    let grid = layout_grid(tokens, &ExtractOptions::default());

    assert_eq!(grid.rows.len(), 2);
    let header = &grid.rows[0].cells;
    assert_eq!(header.len(), 1);
    assert_eq!(header[0].run.text, "INVOICE #1234");
    assert_eq!(header[0].column, 1);
    assert_eq!(header[0].style.tag, StyleTag::Header);

    // gap of 10 px stays under the word-spacing threshold
    let date = &grid.rows[1].cells;
    assert_eq!(date.len(), 1);
    assert_eq!(date[0].run.text, "Date: 2024-01-01");
    assert_eq!(date[0].style.tag, StyleTag::Body);
}

#[test]
fn wide_gap_opens_second_column() {
    let tokens = vec![
        token("Date:", 80, 10, 40, 40, 15),
        token("2024-01-01", 85, 200, 40, 90, 15),
    ];

    let grid = layout_grid(tokens, &ExtractOptions::default());

    assert_eq!(grid.rows.len(), 1);
    let columns = grid.rows[0]
        .cells
        .iter()
        .map(|cell| (cell.run.text.as_str(), cell.column))
        .collect::<Vec<_>>();
    assert_eq!(columns, vec![("Date:", 1), ("2024-01-01", 2)]);
    assert!(grid.rows[0].cells[1].run.column_break);
}

#[test]
fn empty_token_sequence_yields_empty_grid() {
    let grid = layout_grid(Vec::new(), &ExtractOptions::default());
    assert!(grid.is_empty());
    assert!(
        scan2sheet::assemble(&grid)
            .expect("assembly should not fail")
            .is_none()
    );
}

#[test]
fn invoice_image_round_trips_through_workbook() {
    let engine = uniform_engine(invoice_words());
    let rasterizer = BlankPages { count: 1 };
    let pipeline = Pipeline::new(&engine, &rasterizer);

    let (artifact, summary, report) =
        match pipeline.process_image(&image(), &ExtractOptions::default()) {
            ProcessingResult::Extracted {
                artifact,
                summary,
                report,
            } => (artifact, summary, report),
            ProcessingResult::NoResult(failure) => panic!("expected an artifact, got {failure:?}"),
        };

    assert_eq!(summary, "Successfully extracted 4 text elements");
    assert_eq!(report.token_count, 4);
    assert_eq!(report.row_count, 2);
    assert_eq!(report.column_count, 2);
    assert_eq!(
        report.ocr_config.as_deref(),
        Some("--psm 6 -c preserve_interword_spaces=1")
    );

    let range = read_sheet(artifact.path(), "OCR_Results");
    assert_eq!(text_at(&range, 0, 0).as_deref(), Some("INVOICE #1234"));
    assert_eq!(text_at(&range, 1, 0).as_deref(), Some("Date:"));
    assert_eq!(text_at(&range, 1, 1).as_deref(), Some("2024-01-01"));
    assert_eq!(text_at(&range, 0, 1), None);
}

#[test]
fn simple_column_gap_strategy_gives_each_run_its_own_column() {
    let engine = uniform_engine(invoice_words());
    let rasterizer = BlankPages { count: 1 };
    let pipeline = Pipeline::new(&engine, &rasterizer);
    let options = ExtractOptions {
        strategy: GroupingStrategy::SimpleColumnGap,
        ..ExtractOptions::default()
    };

    let layout = pipeline
        .layout_page(&image(), &options)
        .expect("layout should succeed");

    let rows = layout
        .grid
        .rows
        .iter()
        .map(|row| {
            row.cells
                .iter()
                .map(|cell| (cell.run.text.clone(), cell.column))
                .collect::<Vec<_>>()
        })
        .collect::<Vec<_>>();
    assert_eq!(
        rows,
        vec![
            vec![("INVOICE #1234".to_string(), 1)],
            vec![("Date:".to_string(), 1), ("2024-01-01".to_string(), 2)],
        ]
    );
}

#[test]
fn no_words_reports_no_text() {
    let engine = uniform_engine(Vec::new());
    let rasterizer = BlankPages { count: 1 };
    let pipeline = Pipeline::new(&engine, &rasterizer);

    match pipeline.process_image(&image(), &ExtractOptions::default()) {
        ProcessingResult::NoResult(failure) => {
            assert_eq!(failure.kind, FailureKind::NoTextDetected);
            assert_eq!(failure.message, "No text found in image");
        }
        other => panic!("expected no result, got {other:?}"),
    }
}

#[test]
fn words_below_threshold_report_no_text() {
    let words = vec![
        word("FAINT", 10, 10, 10, 60, 20),
        word("smudge", -1, 90, 10, 60, 20),
    ];
    let engine = uniform_engine(words);
    let rasterizer = BlankPages { count: 1 };
    let pipeline = Pipeline::new(&engine, &rasterizer);

    let result = pipeline.process_image(&image(), &ExtractOptions::default());
    assert!(!result.is_extracted());
    assert_eq!(result.message(), "No text found in image");
}

#[test]
fn failing_engine_is_a_collaborator_failure() {
    let engine = failing_engine();
    let rasterizer = BlankPages { count: 1 };
    let pipeline = Pipeline::new(&engine, &rasterizer);

    match pipeline.process_image(&image(), &ExtractOptions::default()) {
        ProcessingResult::NoResult(failure) => {
            assert_eq!(failure.kind, FailureKind::CollaboratorFailed);
            assert!(failure.message.starts_with("Error extracting text"));
        }
        other => panic!("expected no result, got {other:?}"),
    }
}

#[test]
fn undecodable_bytes_are_malformed_input() {
    let engine = uniform_engine(invoice_words());
    let rasterizer = BlankPages { count: 1 };
    let pipeline = Pipeline::new(&engine, &rasterizer);

    let result = pipeline.process_image_bytes(b"definitely not an image", &ExtractOptions::default());
    match result {
        ProcessingResult::NoResult(failure) => {
            assert_eq!(failure.kind, FailureKind::MalformedInput);
        }
        other => panic!("expected no result, got {other:?}"),
    }
}

/// Only page segmentation mode 4 sees the whole invoice.
fn by_mode(_image: &DynamicImage, config: &OcrConfig) -> Result<Vec<RawWord>, ExtractError> {
    let mut words = invoice_words();
    if config.page_segmentation_mode != 4 {
        words.truncate(2);
    }
    Ok(words)
}

#[test]
fn best_scoring_configuration_wins_deterministically() {
    let engine = ScriptedEngine(by_mode);
    let rasterizer = BlankPages { count: 1 };
    let pipeline = Pipeline::new(&engine, &rasterizer);
    let options = ExtractOptions::default();

    let first = pipeline
        .layout_page(&image(), &options)
        .expect("layout should succeed");
    let second = pipeline
        .layout_page(&image(), &options)
        .expect("layout should succeed");

    assert_eq!(
        first.report.ocr_config.as_deref(),
        Some("--psm 4 -c preserve_interword_spaces=1")
    );
    assert_eq!(first.report.token_count, 4);
    assert_eq!(first, second);
}

#[test]
fn equal_scores_keep_the_earliest_configuration() {
    let engine = ScriptedEngine(
        |_: &DynamicImage, config: &OcrConfig| -> Result<Vec<RawWord>, ExtractError> {
            let mut words = invoice_words();
            if !matches!(config.page_segmentation_mode, 3 | 11) {
                words.truncate(1);
            }
            Ok(words)
        },
    );
    let rasterizer = BlankPages { count: 1 };
    let pipeline = Pipeline::new(&engine, &rasterizer);

    let layout = pipeline
        .layout_page(&image(), &ExtractOptions::default())
        .expect("layout should succeed");
    assert_eq!(layout.report.ocr_config.as_deref(), Some("--psm 3"));
}

#[test]
fn low_confidence_runs_are_flagged() {
    let words = vec![
        word("NOTES", 45, 10, 10, 60, 20),
        word("Total due", 92, 10, 50, 90, 20),
    ];
    let engine = uniform_engine(words);
    let rasterizer = BlankPages { count: 1 };
    let pipeline = Pipeline::new(&engine, &rasterizer);

    let layout = pipeline
        .layout_page(&image(), &ExtractOptions::default())
        .expect("layout should succeed");

    let notes = &layout.grid.rows[0].cells[0];
    assert_eq!(notes.style.tag, StyleTag::LowConfidence);
    assert!(notes.style.muted);
    assert!(
        layout
            .report
            .warnings
            .iter()
            .any(|warning| warning.code == ExtractWarningCode::LowConfidence)
    );
}

#[test]
fn custom_configuration_list_and_preprocessor_are_used() {
    let engine = ScriptedEngine(by_mode);
    let rasterizer = BlankPages { count: 1 };
    let only_sparse = [OcrConfig::new(11, false)];
    let pipeline = Pipeline::new(&engine, &rasterizer)
        .with_configs(&only_sparse)
        .with_preprocessor(&Passthrough);

    let layout = pipeline
        .layout_page(&image(), &ExtractOptions::default())
        .expect("layout should succeed");
    assert_eq!(layout.report.ocr_config.as_deref(), Some("--psm 11"));
    assert_eq!(layout.report.token_count, 2);
}
