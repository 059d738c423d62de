use crate::model::{BoundingBox, Token, TextRun};

/// Merges one group of tokens. Blank texts are skipped; a group with no text
/// left produces no run.
pub(crate) fn merge_tokens(group: &[Token]) -> Option<TextRun> {
    let first = group.first()?;

    let text = group
        .iter()
        .map(|token| token.text.trim())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if text.is_empty() {
        return None;
    }

    let bbox = group
        .iter()
        .skip(1)
        .fold(first.bbox, |acc: BoundingBox, token| acc.union(&token.bbox));

    #[allow(clippy::cast_precision_loss)]
    let confidence = group
        .iter()
        .map(|token| f32::from(token.confidence))
        .sum::<f32>()
        / group.len() as f32;

    Some(TextRun {
        text,
        bbox,
        confidence,
        token_count: group.len(),
        column_break: false,
    })
}

/// Walks one row (already sorted left to right) and closes a group whenever
/// the gap to the previous token exceeds `word_spacing_threshold`.
#[must_use]
pub fn group_row(row: &[Token], word_spacing_threshold: u32) -> Vec<TextRun> {
    let mut runs = Vec::new();
    let mut open: Vec<Token> = Vec::new();

    for token in row {
        if let Some(previous) = open.last() {
            if previous.bbox.gap_to(&token.bbox) > i64::from(word_spacing_threshold) {
                runs.extend(merge_tokens(&open));
                open.clear();
            }
        }
        open.push(token.clone());
    }

    runs.extend(merge_tokens(&open));
    runs
}
