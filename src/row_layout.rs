use tracing::debug;

use crate::model::{BoundingBox, Grid, GridRow, PlacedRun, Positioned, Row, TextRun, Token};
use crate::options::{ExtractOptions, GroupingStrategy};
use crate::spacing::group_row;
use crate::style::cell_style;

/// Clusters elements into rows by their top coordinate.
///
/// An element joins the open row while its top is within
/// `row_height_threshold` of the first element's top; the reference never
/// moves, so drift is bounded by one threshold. Rows come out ordered by
/// reference top and each row is sorted by left coordinate.
#[must_use]
pub fn cluster_rows<T: Positioned>(mut elements: Vec<T>, row_height_threshold: u32) -> Vec<Row<T>> {
    elements.sort_by_key(|element| element.bbox().left);
    elements.sort_by_key(|element| element.bbox().top);

    let mut rows = Vec::new();
    let mut open: Option<Row<T>> = None;

    for element in elements {
        let top = element.bbox().top;
        match open.as_mut() {
            Some(row) if top.abs_diff(row.reference_top) <= row_height_threshold => {
                row.elements.push(element);
            }
            _ => {
                if let Some(row) = open.take() {
                    rows.push(close_row(row));
                }
                open = Some(Row {
                    reference_top: top,
                    elements: vec![element],
                });
            }
        }
    }

    if let Some(row) = open {
        rows.push(close_row(row));
    }

    rows
}

fn close_row<T: Positioned>(mut row: Row<T>) -> Row<T> {
    row.elements.sort_by_key(|element| element.bbox().left);
    row
}

/// Left-to-right column counter for one row, starting at 1. A gap of at
/// least `column_break_threshold` opens the next column. Indices are local to
/// the row and not aligned across rows.
#[must_use]
pub fn assign_columns(runs: &mut [TextRun], column_break_threshold: u32) -> Vec<u16> {
    let mut columns = Vec::with_capacity(runs.len());
    let mut column = 1_u16;
    let mut previous_box: Option<BoundingBox> = None;

    for run in runs.iter_mut() {
        if let Some(previous) = previous_box {
            let gap = previous.gap_to(&run.bbox);
            if gap >= i64::from(column_break_threshold) {
                column = column.saturating_add(1);
                run.column_break = true;
            }
        }
        previous_box = Some(run.bbox);
        columns.push(column);
    }

    columns
}

fn sequential_columns(runs: &mut [TextRun]) -> Vec<u16> {
    let mut columns = Vec::with_capacity(runs.len());
    for (index, run) in runs.iter_mut().enumerate() {
        run.column_break = index > 0;
        columns.push(u16::try_from(index + 1).unwrap_or(u16::MAX));
    }
    columns
}

/// Row clustering, spacing grouping, column assignment and styling for one
/// page's tokens.
#[must_use]
pub fn layout_grid(tokens: Vec<Token>, options: &ExtractOptions) -> Grid {
    let rows = cluster_rows(tokens, options.row_height_threshold);

    let mut grid_rows = Vec::with_capacity(rows.len());
    for row in rows {
        let (runs, columns) = match options.strategy {
            GroupingStrategy::WordSpacing => {
                let mut runs = group_row(&row.elements, options.word_spacing_threshold);
                let columns = assign_columns(&mut runs, options.column_break_threshold);
                (runs, columns)
            }
            GroupingStrategy::SimpleColumnGap => {
                // gap < break merges, gap >= break splits into the next column
                let merge_threshold = options.column_break_threshold.saturating_sub(1);
                let mut runs = group_row(&row.elements, merge_threshold);
                let columns = sequential_columns(&mut runs);
                (runs, columns)
            }
        };

        if runs.is_empty() {
            continue;
        }

        let cells = runs
            .into_iter()
            .zip(columns)
            .map(|(run, column)| PlacedRun {
                style: cell_style(&run, options.strategy),
                run,
                column,
            })
            .collect::<Vec<_>>();

        grid_rows.push(GridRow {
            reference_top: row.reference_top,
            cells,
        });
    }

    let grid = Grid { rows: grid_rows };
    debug!(
        "layout: {} rows, {} runs, {} columns ({})",
        grid.rows.len(),
        grid.run_count(),
        grid.column_count(),
        options.strategy
    );
    grid
}
