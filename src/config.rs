use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::common::constants::{
    BULK_MIN_GRAMS, DEFAULT_ACCESSORY_KEYWORDS, FOR_2_MAX_GRAMS, FOR_2_MIN_GRAMS, FOR_4_MAX_GRAMS,
    FOR_4_MIN_GRAMS, GRAMS_PER_OUNCE, SPECIALS_MAX_GRAMS, SPECIALS_MIN_GRAMS,
};
use crate::common::error::{DigestError, Result};
use crate::domain::{BucketName, Grade, Species};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub sites: Vec<SiteConfig>,
}

/// Everything the extraction pipeline needs, passed in explicitly so tests can
/// swap vocabularies and ranges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_grams_per_ounce")]
    pub grams_per_ounce: f64,
    #[serde(default = "default_buckets")]
    pub buckets: Vec<BucketRange>,
    #[serde(default = "default_species_keywords")]
    pub species_keywords: Vec<KeywordEntry<Species>>,
    #[serde(default = "default_grade_keywords")]
    pub grade_keywords: Vec<KeywordEntry<Grade>>,
    #[serde(default = "default_accessory_keywords")]
    pub accessory_keywords: Vec<String>,
}

/// A named gram range. `max_grams = None` means unbounded above.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketRange {
    pub name: BucketName,
    pub min_grams: f64,
    #[serde(default)]
    pub max_grams: Option<f64>,
}

impl BucketRange {
    pub fn new(name: BucketName, min_grams: f64, max_grams: Option<f64>) -> Self {
        Self {
            name,
            min_grams,
            max_grams,
        }
    }

    /// Inclusive at both ends.
    pub fn contains(&self, grams: f64) -> bool {
        grams >= self.min_grams && self.max_grams.map_or(true, |max| grams <= max)
    }
}

/// A keyword (possibly multi-word) that resolves to a vocabulary value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordEntry<T> {
    pub keyword: String,
    pub value: T,
}

impl<T> KeywordEntry<T> {
    pub fn new(keyword: impl Into<String>, value: T) -> Self {
        Self {
            keyword: keyword.into(),
            value,
        }
    }
}

/// A vendor site for the fetch stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    /// Product page URLs, fetched in this order
    pub urls: Vec<String>,
    #[serde(default)]
    pub title_selector: Option<String>,
    #[serde(default)]
    pub price_selector: Option<String>,
    /// Product description area; `main` or `article` when unset
    #[serde(default)]
    pub description_selector: Option<String>,
    /// Size or variant elements searched for the weight before the page text
    #[serde(default)]
    pub weight_selector: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            grams_per_ounce: default_grams_per_ounce(),
            buckets: default_buckets(),
            species_keywords: default_species_keywords(),
            grade_keywords: default_grade_keywords(),
            accessory_keywords: default_accessory_keywords(),
        }
    }
}

impl PipelineConfig {
    /// Check the invariants the pipeline relies on: a usable conversion factor
    /// and non-overlapping, well-formed buckets.
    pub fn validate(&self) -> Result<()> {
        if !self.grams_per_ounce.is_finite() || self.grams_per_ounce <= 0.0 {
            return Err(DigestError::Config(format!(
                "grams_per_ounce must be a positive number, got {}",
                self.grams_per_ounce
            )));
        }

        if self.species_keywords.is_empty() {
            return Err(DigestError::Config(
                "species_keywords must not be empty".to_string(),
            ));
        }

        let blank_keyword = self
            .species_keywords
            .iter()
            .map(|e| e.keyword.as_str())
            .chain(self.grade_keywords.iter().map(|e| e.keyword.as_str()))
            .chain(self.accessory_keywords.iter().map(String::as_str))
            .any(|k| k.trim().is_empty());
        if blank_keyword {
            return Err(DigestError::Config("keywords must not be blank".to_string()));
        }

        let mut seen = HashSet::new();
        for bucket in &self.buckets {
            if !seen.insert(bucket.name) {
                return Err(DigestError::Config(format!(
                    "bucket '{}' is defined more than once",
                    bucket.name
                )));
            }
            if !bucket.min_grams.is_finite() || bucket.min_grams < 0.0 {
                return Err(DigestError::Config(format!(
                    "bucket '{}' has an invalid lower bound {}",
                    bucket.name, bucket.min_grams
                )));
            }
            if let Some(max) = bucket.max_grams {
                if !max.is_finite() || max < bucket.min_grams {
                    return Err(DigestError::Config(format!(
                        "bucket '{}' has upper bound {} below lower bound {}",
                        bucket.name, max, bucket.min_grams
                    )));
                }
            }
        }

        let sorted = self.sorted_buckets();
        for pair in sorted.windows(2) {
            let (lower, upper) = (&pair[0], &pair[1]);
            let overlaps = match lower.max_grams {
                Some(max) => upper.min_grams <= max,
                None => true,
            };
            if overlaps {
                return Err(DigestError::Config(format!(
                    "buckets '{}' and '{}' overlap",
                    lower.name, upper.name
                )));
            }
        }

        Ok(())
    }

    /// Buckets in ascending gram-range order.
    pub fn sorted_buckets(&self) -> Vec<BucketRange> {
        let mut buckets = self.buckets.clone();
        buckets.sort_by(|a, b| a.min_grams.total_cmp(&b.min_grams));
        buckets
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            DigestError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        let config: Config = toml::from_str(&content)?;
        config.pipeline.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise fall back to the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }
}

fn default_grams_per_ounce() -> f64 {
    GRAMS_PER_OUNCE
}

fn default_buckets() -> Vec<BucketRange> {
    vec![
        BucketRange::new(BucketName::For2, FOR_2_MIN_GRAMS, Some(FOR_2_MAX_GRAMS)),
        BucketRange::new(BucketName::For4, FOR_4_MIN_GRAMS, Some(FOR_4_MAX_GRAMS)),
        BucketRange::new(
            BucketName::Specials,
            SPECIALS_MIN_GRAMS,
            Some(SPECIALS_MAX_GRAMS),
        ),
        BucketRange::new(BucketName::Bulk, BULK_MIN_GRAMS, None),
    ]
}

fn default_species_keywords() -> Vec<KeywordEntry<Species>> {
    use Species::*;
    vec![
        KeywordEntry::new("beluga hybrid", Beluga),
        KeywordEntry::new("beluga", Beluga),
        KeywordEntry::new("huso huso", Beluga),
        KeywordEntry::new("kaluga hybrid", Kaluga),
        KeywordEntry::new("kaluga", Kaluga),
        KeywordEntry::new("huso dauricus", Kaluga),
        KeywordEntry::new("amur", Amur),
        KeywordEntry::new("osetra", Osetra),
        KeywordEntry::new("ossetra", Osetra),
        KeywordEntry::new("oscietra", Osetra),
        KeywordEntry::new("gueldenstaedtii", Osetra),
        KeywordEntry::new("sevruga", Sevruga),
        KeywordEntry::new("siberian", Siberian),
        KeywordEntry::new("baerii", Siberian),
        KeywordEntry::new("white sturgeon", WhiteSturgeon),
        KeywordEntry::new("transmontanus", WhiteSturgeon),
        KeywordEntry::new("sterlet", Sterlet),
        KeywordEntry::new("hackleback", Hackleback),
        KeywordEntry::new("shovelnose", Hackleback),
    ]
}

fn default_grade_keywords() -> Vec<KeywordEntry<Grade>> {
    use Grade::*;
    vec![
        KeywordEntry::new("imperial", Imperial),
        KeywordEntry::new("royal", Royal),
        KeywordEntry::new("gold reserve", GoldReserve),
        KeywordEntry::new("gold", Gold),
        KeywordEntry::new("reserve", Reserve),
        KeywordEntry::new("estate", Estate),
        KeywordEntry::new("classic", Classic),
        KeywordEntry::new("select", Select),
        KeywordEntry::new("supreme", Supreme),
        KeywordEntry::new("premier", Premier),
    ]
}

fn default_accessory_keywords() -> Vec<String> {
    DEFAULT_ACCESSORY_KEYWORDS
        .iter()
        .map(|k| k.to_string())
        .collect()
}
