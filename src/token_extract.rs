use image::DynamicImage;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::error::ExtractError;
use crate::model::{BoundingBox, Token};
use crate::ocr::{OcrConfig, OcrEngine, RawWord};
use crate::text_clean::clean_ocr_text;
use crate::warning::{ExtractWarning, WarningCode};

const COUNT_WEIGHT: f64 = 0.4;
const CONFIDENCE_WEIGHT: f64 = 0.3;
const LENGTH_WEIGHT: f64 = 0.3;

/// Tokens from the winning configuration plus what it took to pick them.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub tokens: Vec<Token>,
    pub config: Option<OcrConfig>,
    pub score: f64,
    pub warnings: Vec<ExtractWarning>,
}

fn normalized_confidence(raw: i32) -> u8 {
    u8::try_from(raw.clamp(0, 100)).unwrap_or(0)
}

/// Applies the confidence/emptiness filters and the cleaning step. The same
/// function runs for every configuration so scores stay comparable.
pub(crate) fn filter_words(words: &[RawWord], confidence_threshold: i32) -> Vec<Token> {
    words
        .iter()
        .filter_map(|word| {
            let trimmed = word.text.trim();
            if trimmed.is_empty() {
                return None;
            }

            let confidence = normalized_confidence(word.confidence);
            if i32::from(confidence) < confidence_threshold {
                return None;
            }

            let text = clean_ocr_text(trimmed)?;
            Some(Token {
                text,
                bbox: BoundingBox::new(word.left, word.top, word.width, word.height),
                confidence,
            })
        })
        .collect()
}

/// `0.4 * count + 0.3 * mean confidence + 0.3 * total characters`.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn configuration_score(tokens: &[Token]) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }

    let count = tokens.len() as f64;
    let mean_confidence =
        tokens.iter().map(|token| f64::from(token.confidence)).sum::<f64>() / count;
    let total_chars = tokens
        .iter()
        .map(|token| token.text.chars().count())
        .sum::<usize>() as f64;

    COUNT_WEIGHT * count + CONFIDENCE_WEIGHT * mean_confidence + LENGTH_WEIGHT * total_chars
}

/// Strictly-greater comparison keeps the first of equally scored candidates.
fn choose_best(candidates: Vec<(OcrConfig, Vec<Token>)>) -> Option<(OcrConfig, Vec<Token>, f64)> {
    let mut best: Option<(OcrConfig, Vec<Token>, f64)> = None;
    for (config, tokens) in candidates {
        if tokens.is_empty() {
            continue;
        }
        let score = configuration_score(&tokens);
        debug!("ocr config '{config}': {} tokens, score {score:.2}", tokens.len());
        if best.as_ref().is_none_or(|(_, _, best_score)| score > *best_score) {
            best = Some((config, tokens, score));
        }
    }
    best
}

pub struct TokenExtractor<'a> {
    engine: &'a dyn OcrEngine,
    configs: &'a [OcrConfig],
}

impl<'a> TokenExtractor<'a> {
    #[must_use]
    pub fn new(engine: &'a dyn OcrEngine, configs: &'a [OcrConfig]) -> Self {
        Self { engine, configs }
    }

    /// Runs every configuration and keeps the best-scoring token set.
    ///
    /// Zero tokens across all configurations is an empty extraction, not an
    /// error. An error is returned only when every configuration failed.
    pub fn extract(
        &self,
        image: &DynamicImage,
        confidence_threshold: i32,
    ) -> Result<Extraction, ExtractError> {
        let attempts = self
            .configs
            .par_iter()
            .map(|config| (*config, self.engine.recognize(image, config)))
            .collect::<Vec<_>>();

        let mut warnings = Vec::new();
        let mut candidates = Vec::new();
        let mut last_error = None;
        let mut raw_word_count = 0_usize;

        for (config, attempt) in attempts {
            match attempt {
                Ok(words) => {
                    raw_word_count += words.iter().filter(|w| !w.text.trim().is_empty()).count();
                    candidates.push((config, filter_words(&words, confidence_threshold)));
                }
                Err(error) => {
                    warn!("ocr config '{config}' failed: {error}");
                    warnings.push(ExtractWarning::new(
                        WarningCode::ConfigurationFailed,
                        format!("OCR configuration '{config}' failed: {error}"),
                    ));
                    last_error = Some(error);
                }
            }
        }

        if candidates.is_empty() {
            if let Some(error) = last_error {
                return Err(error);
            }
        }

        let Some((config, tokens, score)) = choose_best(candidates) else {
            if raw_word_count > 0 {
                warnings.push(ExtractWarning::new(
                    WarningCode::TokensDiscarded,
                    format!(
                        "{raw_word_count} recognized word(s) were dropped by the confidence or cleaning filters"
                    ),
                ));
            }
            return Ok(Extraction {
                tokens: Vec::new(),
                config: None,
                score: 0.0,
                warnings,
            });
        };

        Ok(Extraction {
            tokens,
            config: Some(config),
            score,
            warnings,
        })
    }
}
