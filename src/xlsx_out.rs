use std::collections::BTreeMap;

use rust_xlsxwriter::{Color, Format, FormatAlign, Workbook};
use tracing::debug;

use crate::artifact::Artifact;
use crate::error::ExtractError;
use crate::model::Grid;
use crate::style::{CellStyle, StyleTag};

pub const DEFAULT_SHEET_NAME: &str = "OCR_Results";

pub const COLUMN_PADDING: usize = 2;
pub const MIN_COLUMN_WIDTH: usize = 10;
pub const MAX_COLUMN_WIDTH: usize = 50;

const HEADER_FONT_COLOR: u32 = 0x1F_4E79;
const HEADER_FILL_COLOR: u32 = 0xD9_E1F2;
const MUTED_FONT_COLOR: u32 = 0x80_8080;

/// Text and style of one output cell, keyed by 0-based (row, column).
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SheetCell {
    pub text: String,
    pub style: CellStyle,
}

pub(crate) type SheetCells = BTreeMap<(u32, u16), SheetCell>;

/// One spreadsheet row per grid row; runs that share a column in the same row
/// are joined with a space and keep the first run's style.
pub(crate) fn sheet_cells(grid: &Grid) -> SheetCells {
    let mut cells = SheetCells::new();
    for (row_index, row) in grid.rows.iter().enumerate() {
        let row_index = u32::try_from(row_index).unwrap_or(u32::MAX);
        for placed in &row.cells {
            let key = (row_index, placed.column.saturating_sub(1));
            cells
                .entry(key)
                .and_modify(|cell: &mut SheetCell| {
                    cell.text.push(' ');
                    cell.text.push_str(&placed.run.text);
                })
                .or_insert_with(|| SheetCell {
                    text: placed.run.text.clone(),
                    style: placed.style,
                });
        }
    }
    cells
}

/// `clamp(longest text + padding, min, max)`.
#[must_use]
pub fn column_width(max_chars: usize) -> u16 {
    let width = max_chars
        .saturating_add(COLUMN_PADDING)
        .clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH);
    u16::try_from(width).unwrap_or(u16::MAX)
}

/// Width per 0-based column, covering every column up to the rightmost
/// written one.
pub(crate) fn column_widths(cells: &SheetCells) -> Vec<u16> {
    let Some(last_column) = cells.keys().map(|(_, column)| *column).max() else {
        return Vec::new();
    };

    let mut longest = vec![0_usize; usize::from(last_column) + 1];
    for ((_, column), cell) in cells {
        let slot = &mut longest[usize::from(*column)];
        *slot = (*slot).max(cell.text.chars().count());
    }
    longest.into_iter().map(column_width).collect()
}

fn cell_format(style: CellStyle) -> Format {
    let mut format = Format::new().set_text_wrap().set_align(FormatAlign::Top);

    format = match style.tag {
        StyleTag::Header => format
            .set_bold()
            .set_font_size(12)
            .set_font_color(Color::RGB(HEADER_FONT_COLOR))
            .set_background_color(Color::RGB(HEADER_FILL_COLOR)),
        StyleTag::Bullet | StyleTag::Numbered => format.set_indent(1),
        StyleTag::LongBody => format.set_font_size(10),
        StyleTag::LowConfidence | StyleTag::Body => format,
    };

    if style.muted {
        format = format
            .set_italic()
            .set_font_color(Color::RGB(MUTED_FONT_COLOR));
    }
    format
}

fn write_sheet(workbook: &mut Workbook, name: &str, grid: &Grid) -> Result<(), ExtractError> {
    let cells = sheet_cells(grid);
    let widths = column_widths(&cells);

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(name)?;

    for ((row, column), cell) in &cells {
        worksheet.write_string_with_format(*row, *column, cell.text.as_str(), &cell_format(cell.style))?;
    }

    for (column, width) in widths.into_iter().enumerate() {
        let column = u16::try_from(column).unwrap_or(u16::MAX);
        worksheet.set_column_width(column, width)?;
    }

    debug!("sheet '{name}': {} cells", cells.len());
    Ok(())
}

fn build_workbook(sheets: &[(String, &Grid)]) -> Result<Option<Workbook>, ExtractError> {
    let mut workbook = Workbook::new();
    let mut written = 0_usize;
    for (name, grid) in sheets {
        if grid.is_empty() {
            continue;
        }
        write_sheet(&mut workbook, name, grid)?;
        written += 1;
    }

    if written == 0 {
        return Ok(None);
    }
    Ok(Some(workbook))
}

/// Writes named grids as worksheets of one workbook in a temporary file.
/// Empty grids are skipped; `Ok(None)` means nothing was left to write.
pub fn assemble_sheets(sheets: &[(String, &Grid)]) -> Result<Option<Artifact>, ExtractError> {
    let Some(mut workbook) = build_workbook(sheets)? else {
        return Ok(None);
    };

    let temp_path = tempfile::Builder::new()
        .prefix("scan2sheet-")
        .suffix(".xlsx")
        .tempfile()?
        .into_temp_path();
    workbook.save(&temp_path)?;

    Ok(Some(Artifact::from_temp_path(temp_path)))
}

/// Single-sheet workbook for one page.
pub fn assemble(grid: &Grid) -> Result<Option<Artifact>, ExtractError> {
    assemble_sheets(&[(DEFAULT_SHEET_NAME.to_string(), grid)])
}

/// In-memory variant of [`assemble`].
pub fn assemble_to_buffer(grid: &Grid) -> Result<Option<Vec<u8>>, ExtractError> {
    let Some(mut workbook) = build_workbook(&[(DEFAULT_SHEET_NAME.to_string(), grid)])? else {
        return Ok(None);
    };
    Ok(Some(workbook.save_to_buffer()?))
}
