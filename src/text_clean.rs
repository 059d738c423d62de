use std::sync::LazyLock;

use regex::Regex;

/// Common OCR misreads. Applied until no pattern matches so the output is a
/// fixed point even when a deletion brings two characters together.
const GLYPH_SUBSTITUTIONS: &[(&str, &str)] = &[
    ("°", "•"),
    ("¢", "•"),
    ("{f", "•"),
    ("|", "I"),
    ("@", ""),
    ("¥", "Y"),
    ("£", "E"),
    ("€", "E"),
    ("§", "S"),
];

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[^\w\s.,!?:;\-()\[\]{}'"•#$%&*+=<>/\\|`~°¢¥£€§@]"#)
        .expect("hardcoded safelist regex is valid")
});

static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("hardcoded whitespace regex is valid"));

pub(crate) const MIN_CLEANED_CHARS: usize = 2;

fn substitute_glyphs(text: &str) -> String {
    let mut current = text.to_string();
    loop {
        let mut next = current.clone();
        for (from, to) in GLYPH_SUBSTITUTIONS {
            next = next.replace(from, to);
        }
        if next == current {
            return current;
        }
        current = next;
    }
}

/// Normalizes a raw OCR word. Returns `None` when fewer than two characters
/// survive.
#[must_use]
pub fn clean_ocr_text(raw: &str) -> Option<String> {
    let safe = UNSAFE_CHARS.replace_all(raw, "");
    let substituted = substitute_glyphs(&safe);
    let collapsed = WHITESPACE_RUN.replace_all(substituted.trim(), " ");
    let cleaned = collapsed.trim();

    if cleaned.chars().count() < MIN_CLEANED_CHARS {
        return None;
    }
    Some(cleaned.to_string())
}
