//! Lexical extraction of product facts from free listing text.
//!
//! Every field is best-effort: a field that cannot be found is `None`, it never
//! fails the listing at this stage.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use tracing::trace;

use crate::common::error::Result;
use crate::config::{KeywordEntry, PipelineConfig};
use crate::domain::{Grade, ScrapedPrice, Species, Unit};

const AMOUNT: &str = r"(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?)";
const WEIGHT_NUMBER: &str = r"(\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:[.,]\d+)?)";
const WEIGHT_UNIT: &str = r"(grams|gram|g|ounces|ounce|oz)";

// No leading word boundary: "2x50g" and "Tin100g" carry a weight. The number
// must still not continue a longer number.
static WEIGHT_AFTER_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)(?:^|[^\d.,]){WEIGHT_NUMBER}\s*{WEIGHT_UNIT}\b")).unwrap()
});

static WEIGHT_BEFORE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\b{WEIGHT_UNIT}\s*{WEIGHT_NUMBER}\b")).unwrap()
});

static PRICE_PREFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)(?:US\$|\$|\bUSD)\s*{AMOUNT}")).unwrap());

static PRICE_SUFFIXED: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?i)\b{AMOUNT}\s*(?:USD|dollars?)\b")).unwrap());

static BARE_AMOUNT: Lazy<Regex> = Lazy::new(|| Regex::new(AMOUNT).unwrap());

static THOUSANDS_GROUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(?:,\d{3})+(?:\.\d+)?$").unwrap());

/// A weight mention as written: the number and the raw unit token.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeightCandidate {
    pub value: f64,
    pub unit: String,
}

/// Raw field candidates pulled from one listing's text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldCandidates {
    pub species: Option<Species>,
    pub grade: Option<Grade>,
    pub weight: Option<WeightCandidate>,
    pub price_usd: Option<f64>,
    pub is_accessory: bool,
}

/// Case-insensitive keyword matcher over a closed vocabulary.
///
/// The earliest match in the text wins; when two keywords start at the same
/// position the one with more words (then more characters) wins, so
/// "Gold Reserve" beats "Gold".
#[derive(Debug, Clone)]
pub struct Vocabulary<T> {
    pattern: Option<Regex>,
    lookup: HashMap<String, T>,
}

impl<T: Copy> Vocabulary<T> {
    pub fn new(entries: &[KeywordEntry<T>]) -> Result<Self> {
        let mut lookup = HashMap::new();
        let mut keywords: Vec<Vec<&str>> = Vec::new();

        for entry in entries {
            let words: Vec<&str> = entry.keyword.split_whitespace().collect();
            if words.is_empty() {
                continue;
            }
            let key = words.join(" ").to_lowercase();
            if !lookup.contains_key(&key) {
                lookup.insert(key, entry.value);
                keywords.push(words);
            }
        }

        keywords.sort_by(|a, b| {
            b.len()
                .cmp(&a.len())
                .then_with(|| b.concat().len().cmp(&a.concat().len()))
        });

        let pattern = if keywords.is_empty() {
            None
        } else {
            let alternatives: Vec<String> = keywords
                .iter()
                .map(|words| {
                    words
                        .iter()
                        .map(|w| regex::escape(w))
                        .collect::<Vec<_>>()
                        .join(r"\s+")
                })
                .collect();
            Some(Regex::new(&format!(
                r"(?i)\b(?:{})\b",
                alternatives.join("|")
            ))?)
        };

        Ok(Self { pattern, lookup })
    }

    pub fn find(&self, text: &str) -> Option<T> {
        let m = self.pattern.as_ref()?.find(text)?;
        let key = m
            .as_str()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        self.lookup.get(&key).copied()
    }
}

/// Pulls [`FieldCandidates`] out of listing text using the configured vocabularies.
#[derive(Debug, Clone)]
pub struct Extractor {
    species: Vocabulary<Species>,
    grades: Vocabulary<Grade>,
    accessory_keywords: Vec<String>,
}

impl Extractor {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        Ok(Self {
            species: Vocabulary::new(&config.species_keywords)?,
            grades: Vocabulary::new(&config.grade_keywords)?,
            accessory_keywords: config
                .accessory_keywords
                .iter()
                .map(|k| collapse_whitespace(k).to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        })
    }

    pub fn extract(&self, raw_text: &str) -> FieldCandidates {
        let candidates = FieldCandidates {
            species: self.species.find(raw_text),
            grade: self.grades.find(raw_text),
            weight: extract_weight(raw_text),
            price_usd: extract_price(raw_text),
            is_accessory: self.is_accessory(raw_text),
        };
        trace!(?candidates, "extracted candidates");
        candidates
    }

    pub fn is_accessory(&self, raw_text: &str) -> bool {
        let text = collapse_whitespace(raw_text).to_lowercase();
        self.accessory_keywords
            .iter()
            .any(|keyword| text.contains(keyword.as_str()))
    }
}

/// Find the weight mention to use. Mentions of both forms ("50 g" and
/// "g 50") are taken in text order; the first grams mention wins and ounces
/// are used only when no grams mention exists. A unit-then-number match that
/// reuses the unit of a number-then-unit match is ignored.
pub fn extract_weight(text: &str) -> Option<WeightCandidate> {
    let mut mentions: Vec<(usize, WeightCandidate)> = Vec::new();
    let mut spans = Vec::new();

    for c in WEIGHT_AFTER_NUMBER.captures_iter(text) {
        let (Some(number), Some(unit)) = (c.get(1), c.get(2)) else {
            continue;
        };
        spans.push(number.start()..unit.end());
        if let Some(found) = weight_candidate(number.as_str(), unit.as_str()) {
            mentions.push((number.start(), found));
        }
    }

    for c in WEIGHT_BEFORE_NUMBER.captures_iter(text) {
        let (Some(unit), Some(number)) = (c.get(1), c.get(2)) else {
            continue;
        };
        if spans.iter().any(|span| span.contains(&unit.start())) {
            continue;
        }
        if let Some(found) = weight_candidate(number.as_str(), unit.as_str()) {
            mentions.push((unit.start(), found));
        }
    }

    mentions.sort_by_key(|(start, _)| *start);
    prefer_grams(mentions.into_iter().map(|(_, found)| found).collect())
}

fn weight_candidate(number: &str, unit: &str) -> Option<WeightCandidate> {
    Some(WeightCandidate {
        value: parse_weight_number(number)?,
        unit: unit.to_string(),
    })
}

fn prefer_grams(candidates: Vec<WeightCandidate>) -> Option<WeightCandidate> {
    let grams = candidates
        .iter()
        .position(|c| Unit::from_token(&c.unit) == Some(Unit::Grams));
    match grams {
        Some(idx) => candidates.into_iter().nth(idx),
        None => candidates.into_iter().next(),
    }
}

/// "1,76" is a decimal comma; "1,000" and "1,250.5" use thousands separators.
fn parse_weight_number(number: &str) -> Option<f64> {
    let cleaned = if THOUSANDS_GROUP.is_match(number) {
        number.replace(',', "")
    } else {
        number.replace(',', ".")
    };
    cleaned.parse().ok()
}

/// First currency-marked amount in the text, either "$250" / "USD 250" or
/// "250 USD" / "250 dollars". Zero or unparseable amounts count as not found.
pub fn extract_price(text: &str) -> Option<f64> {
    let prefixed = PRICE_PREFIXED
        .captures(text)
        .and_then(|c| Some((c.get(0)?.start(), c.get(1)?.as_str())));
    let suffixed = PRICE_SUFFIXED
        .captures(text)
        .and_then(|c| Some((c.get(0)?.start(), c.get(1)?.as_str())));

    let amount = match (prefixed, suffixed) {
        (Some(p), Some(s)) => {
            if s.0 < p.0 {
                s.1
            } else {
                p.1
            }
        }
        (Some(p), None) => p.1,
        (None, Some(s)) => s.1,
        (None, None) => return None,
    };
    parse_amount(amount)
}

/// Resolve a price captured by the fetch stage. Text is read with the same
/// currency rules as listing text, falling back to the first bare amount.
pub fn parse_scraped_price(price: &ScrapedPrice) -> Option<f64> {
    match price {
        ScrapedPrice::Amount(value) => positive(*value),
        ScrapedPrice::Text(text) => extract_price(text).or_else(|| {
            let m = BARE_AMOUNT.find(text)?;
            parse_amount(m.as_str())
        }),
    }
}

fn parse_amount(amount: &str) -> Option<f64> {
    amount.replace(',', "").parse::<f64>().ok().and_then(positive)
}

fn positive(value: f64) -> Option<f64> {
    (value.is_finite() && value > 0.0).then_some(value)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
