use std::sync::LazyLock;

use regex::Regex;

use crate::model::TextRun;
use crate::options::GroupingStrategy;

pub const BULLET_GLYPHS: [char; 5] = ['•', '-', '*', '○', '▪'];

const HEADER_MIN_CHARS: usize = 3;
const SIMPLE_HEADER_MAX_CHARS: usize = 50;
const HEADER_MIN_CONFIDENCE: f32 = 70.0;
const LONG_BODY_CHARS: usize = 50;
pub(crate) const LOW_CONFIDENCE: f32 = 50.0;

static NUMBERED_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.").expect("hardcoded numbered-list regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleTag {
    Header,
    Bullet,
    Numbered,
    LongBody,
    LowConfidence,
    Body,
}

/// Tag plus the low-confidence overlay, which stacks on top of
/// Header/Bullet/Numbered/LongBody instead of replacing them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellStyle {
    pub tag: StyleTag,
    pub muted: bool,
}

/// At least one cased character and no lower-case ones.
fn is_upper_case(text: &str) -> bool {
    text.chars().any(char::is_uppercase) && !text.chars().any(char::is_lowercase)
}

fn is_header(run: &TextRun, strategy: GroupingStrategy) -> bool {
    let length = run.char_len();
    let length_ok = match strategy {
        GroupingStrategy::WordSpacing => length > HEADER_MIN_CHARS,
        GroupingStrategy::SimpleColumnGap => length < SIMPLE_HEADER_MAX_CHARS,
    };
    is_upper_case(&run.text) && length_ok && run.confidence > HEADER_MIN_CONFIDENCE
}

/// First matching rule wins: Header, Bullet, Numbered, LongBody,
/// LowConfidence, Body.
#[must_use]
pub fn classify(run: &TextRun, strategy: GroupingStrategy) -> StyleTag {
    if is_header(run, strategy) {
        StyleTag::Header
    } else if run.text.starts_with(BULLET_GLYPHS) {
        StyleTag::Bullet
    } else if NUMBERED_PREFIX.is_match(&run.text) {
        StyleTag::Numbered
    } else if run.char_len() > LONG_BODY_CHARS {
        StyleTag::LongBody
    } else if run.confidence < LOW_CONFIDENCE {
        StyleTag::LowConfidence
    } else {
        StyleTag::Body
    }
}

#[must_use]
pub fn cell_style(run: &TextRun, strategy: GroupingStrategy) -> CellStyle {
    CellStyle {
        tag: classify(run, strategy),
        muted: run.confidence < LOW_CONFIDENCE,
    }
}
