use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupingStrategy {
    /// One threshold: runs split wherever the gap reaches the column-break
    /// threshold, and each run takes the next column.
    SimpleColumnGap,
    /// Merge by word spacing, then open a new column only on column breaks.
    #[default]
    WordSpacing,
}

impl FromStr for GroupingStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "simple-column-gap" | "simple" => Ok(Self::SimpleColumnGap),
            "word-spacing" | "spacing" => Ok(Self::WordSpacing),
            other => Err(format!(
                "unknown grouping strategy '{other}', expected simple-column-gap or word-spacing"
            )),
        }
    }
}

impl fmt::Display for GroupingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SimpleColumnGap => f.write_str("simple-column-gap"),
            Self::WordSpacing => f.write_str("word-spacing"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PageOutput {
    /// One workbook per PDF page.
    #[default]
    PerPage,
    /// One workbook per PDF, one worksheet per page.
    Merged,
}

/// Inclusive, 1-based page ranges. Ranges are kept as written, so a
/// selection like `1-4294967295` costs two integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSelection {
    ranges: Vec<(u32, u32)>,
}

impl PageSelection {
    #[must_use]
    pub fn contains(&self, page: u32) -> bool {
        self.ranges
            .iter()
            .any(|&(start, end)| (start..=end).contains(&page))
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

fn parse_page(value: &str, what: &str) -> Result<u32, String> {
    let page: u32 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid {what}: '{value}'"))?;
    if page == 0 {
        return Err("pages are 1-based".to_string());
    }
    Ok(page)
}

impl FromStr for PageSelection {
    type Err = String;

    fn from_str(spec: &str) -> Result<Self, Self::Err> {
        let mut ranges = Vec::new();
        for token in spec.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            if let Some((start, end)) = token.split_once('-') {
                let start = parse_page(start, "page range start")?;
                let end = parse_page(end, "page range end")?;
                if end < start {
                    return Err(format!(
                        "invalid range '{token}': end is smaller than start"
                    ));
                }
                ranges.push((start, end));
            } else {
                let page = parse_page(token, "page number")?;
                ranges.push((page, page));
            }
        }

        if ranges.is_empty() {
            return Err("page selection cannot be empty".to_string());
        }

        Ok(Self { ranges })
    }
}

/// Thresholds and switches for one processing call. Built once and passed by
/// reference; nothing in the pipeline mutates it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "snake_case")]
pub struct ExtractOptions {
    pub confidence_threshold: i32,
    pub row_height_threshold: u32,
    pub word_spacing_threshold: u32,
    pub column_break_threshold: u32,
    pub strategy: GroupingStrategy,
    pub page_output: PageOutput,
    #[serde(skip)]
    pub pages: Option<PageSelection>,
    pub dpi: u32,
    pub preprocess: bool,
    pub language: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: 25,
            row_height_threshold: 20,
            word_spacing_threshold: 30,
            column_break_threshold: 80,
            strategy: GroupingStrategy::WordSpacing,
            page_output: PageOutput::PerPage,
            pages: None,
            dpi: 300,
            preprocess: true,
            language: "eng".to_string(),
        }
    }
}

impl ExtractOptions {
    pub fn from_json_file(path: &Path) -> Result<Self, ExtractError> {
        let raw = std::fs::read_to_string(path)?;
        let options: Self = serde_json::from_str(&raw)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), ExtractError> {
        if !(0..=100).contains(&self.confidence_threshold) {
            return Err(ExtractError::InvalidOption(format!(
                "confidence_threshold must be within 0..=100, got {}",
                self.confidence_threshold
            )));
        }
        if self.column_break_threshold == 0 {
            return Err(ExtractError::InvalidOption(
                "column_break_threshold must be at least 1".to_string(),
            ));
        }
        if !(72..=1200).contains(&self.dpi) {
            return Err(ExtractError::InvalidOption(format!(
                "dpi must be within 72..=1200, got {}",
                self.dpi
            )));
        }
        if self.language.trim().is_empty() {
            return Err(ExtractError::InvalidOption(
                "language cannot be empty".to_string(),
            ));
        }
        if self.pages.as_ref().is_some_and(PageSelection::is_empty) {
            return Err(ExtractError::InvalidPageSelection(
                "page selection cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ExtractOptions, GroupingStrategy, PageOutput, PageSelection};
    use std::str::FromStr;
    use std::time::{Duration, Instant};

    #[test]
    fn parse_page_selection_range_and_single() {
        let selection = PageSelection::from_str("1-3,5").expect("selection should parse");
        assert!(selection.contains(1));
        assert!(selection.contains(3));
        assert!(selection.contains(5));
        assert!(!selection.contains(4));
        assert!(!selection.contains(6));
    }

    #[test]
    fn huge_range_is_not_expanded() {
        let started = Instant::now();
        let selection =
            PageSelection::from_str("1-4294967295").expect("full range should parse");
        assert!(selection.contains(1));
        assert!(selection.contains(u32::MAX));
        assert!(!selection.contains(0));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn reject_invalid_page_selection() {
        let err = PageSelection::from_str("3-1").expect_err("invalid range should fail");
        assert!(err.contains("invalid range"));
        assert!(PageSelection::from_str("0").is_err());
    }

    #[test]
    fn parses_strategy_names() {
        assert_eq!(
            "simple-column-gap".parse::<GroupingStrategy>(),
            Ok(GroupingStrategy::SimpleColumnGap)
        );
        assert_eq!(
            "Word-Spacing".parse::<GroupingStrategy>(),
            Ok(GroupingStrategy::WordSpacing)
        );
        assert!("columns".parse::<GroupingStrategy>().is_err());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let options: ExtractOptions = serde_json::from_str(
            r#"{"confidence_threshold": 40, "strategy": "simple-column-gap", "page_output": "merged"}"#,
        )
        .expect("config should parse");
        assert_eq!(options.confidence_threshold, 40);
        assert_eq!(options.strategy, GroupingStrategy::SimpleColumnGap);
        assert_eq!(options.page_output, PageOutput::Merged);
        assert_eq!(options.row_height_threshold, 20);
        assert_eq!(options.dpi, 300);
    }

    #[test]
    fn misspelled_config_key_is_rejected() {
        let err = serde_json::from_str::<ExtractOptions>(r#"{"row_heigth_threshold": 12}"#)
            .expect_err("unknown key should fail");
        assert!(err.to_string().contains("row_heigth_threshold"));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let bad_confidence = ExtractOptions {
            confidence_threshold: 101,
            ..ExtractOptions::default()
        };
        assert!(bad_confidence.validate().is_err());

        let bad_break = ExtractOptions {
            column_break_threshold: 0,
            ..ExtractOptions::default()
        };
        assert!(bad_break.validate().is_err());

        assert!(ExtractOptions::default().validate().is_ok());
    }
}
