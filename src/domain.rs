//! Domain data shapes shared across the pipeline stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Sturgeon species recognised by the extractor.
///
/// An unrecognised species is represented as `None` wherever a species is
/// optional; a validated [`ProductRecord`] always carries one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Species {
    Beluga,
    Kaluga,
    Amur,
    Osetra,
    Sevruga,
    Siberian,
    #[serde(rename = "White Sturgeon")]
    WhiteSturgeon,
    Sterlet,
    Hackleback,
}

impl Species {
    pub const ALL: [Species; 9] = [
        Species::Beluga,
        Species::Kaluga,
        Species::Amur,
        Species::Osetra,
        Species::Sevruga,
        Species::Siberian,
        Species::WhiteSturgeon,
        Species::Sterlet,
        Species::Hackleback,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            Species::Beluga => "Beluga",
            Species::Kaluga => "Kaluga",
            Species::Amur => "Amur",
            Species::Osetra => "Osetra",
            Species::Sevruga => "Sevruga",
            Species::Siberian => "Siberian",
            Species::WhiteSturgeon => "White Sturgeon",
            Species::Sterlet => "Sterlet",
            Species::Hackleback => "Hackleback",
        }
    }

    pub fn scientific_name(&self) -> &'static str {
        match self {
            Species::Beluga => "Huso huso",
            Species::Kaluga => "Huso dauricus × Acipenser schrenckii",
            Species::Amur => "Acipenser schrenckii",
            Species::Osetra => "Acipenser gueldenstaedtii",
            Species::Sevruga => "Acipenser stellatus",
            Species::Siberian => "Acipenser baerii",
            Species::WhiteSturgeon => "Acipenser transmontanus",
            Species::Sterlet => "Acipenser ruthenus",
            Species::Hackleback => "Scaphirhynchus platorynchus",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Vendor grade labels. Grade is informational and never required.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Grade {
    Imperial,
    Royal,
    #[serde(rename = "Gold Reserve")]
    GoldReserve,
    Gold,
    Reserve,
    Estate,
    Classic,
    Select,
    Supreme,
    Premier,
}

impl Grade {
    pub fn display_name(&self) -> &'static str {
        match self {
            Grade::Imperial => "Imperial",
            Grade::Royal => "Royal",
            Grade::GoldReserve => "Gold Reserve",
            Grade::Gold => "Gold",
            Grade::Reserve => "Reserve",
            Grade::Estate => "Estate",
            Grade::Classic => "Classic",
            Grade::Select => "Select",
            Grade::Supreme => "Supreme",
            Grade::Premier => "Premier",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Weight units the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    Grams,
    Ounces,
}

impl Unit {
    /// Map a unit token as written in listing text. Unknown tokens yield `None`.
    pub fn from_token(token: &str) -> Option<Unit> {
        match token.trim().to_ascii_lowercase().as_str() {
            "g" | "gram" | "grams" => Some(Unit::Grams),
            "oz" | "ounce" | "ounces" => Some(Unit::Ounces),
            _ => None,
        }
    }
}

/// Named size buckets, ordered by ascending gram range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BucketName {
    #[serde(rename = "For 2")]
    For2,
    #[serde(rename = "For 4")]
    For4,
    Specials,
    Bulk,
}

impl BucketName {
    pub fn display_name(&self) -> &'static str {
        match self {
            BucketName::For2 => "For 2",
            BucketName::For4 => "For 4",
            BucketName::Specials => "Specials",
            BucketName::Bulk => "Bulk",
        }
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Price as captured by the fetch stage: either the text of a price element
/// ("$1,250.00") or an already numeric amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScrapedPrice {
    Amount(f64),
    Text(String),
}

/// One scraped product page, as delivered to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawListing {
    /// Title and description text
    pub text: String,
    /// Product title on its own, when the fetch stage found one
    #[serde(default)]
    pub title: Option<String>,
    pub source_url: String,
    #[serde(default)]
    pub scraped_price: Option<ScrapedPrice>,
    #[serde(default = "Utc::now")]
    pub scraped_at: DateTime<Utc>,
    /// Vendor or site name, when the fetch stage knows it
    #[serde(default)]
    pub vendor: Option<String>,
    /// Text of a dedicated size or variant element; searched for the weight
    /// before the listing text
    #[serde(default)]
    pub scraped_weight: Option<String>,
}

impl RawListing {
    pub fn new(text: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            title: None,
            source_url: source_url.into(),
            scraped_price: None,
            scraped_at: Utc::now(),
            vendor: None,
            scraped_weight: None,
        }
    }

    pub fn with_price(mut self, price: ScrapedPrice) -> Self {
        self.scraped_price = Some(price);
        self
    }

    pub fn with_vendor(mut self, vendor: impl Into<String>) -> Self {
        self.vendor = Some(vendor.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_weight_text(mut self, weight: impl Into<String>) -> Self {
        self.scraped_weight = Some(weight.into());
        self
    }
}

/// A validated product extracted from a listing.
///
/// Fields are private so that a record can only be built through validation,
/// and price-per-gram is always derived from the current price and weight.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductRecord {
    species: Species,
    grade: Option<Grade>,
    size_grams: f64,
    price_usd: f64,
    source_url: String,
    vendor: Option<String>,
    title: Option<String>,
    is_accessory: bool,
}

impl ProductRecord {
    pub(crate) fn new(
        species: Species,
        grade: Option<Grade>,
        size_grams: f64,
        price_usd: f64,
        source_url: String,
        vendor: Option<String>,
    ) -> Self {
        Self {
            species,
            grade,
            size_grams,
            price_usd,
            source_url,
            vendor,
            title: None,
            is_accessory: false,
        }
    }

    pub(crate) fn with_title(mut self, title: Option<String>) -> Self {
        self.title = title;
        self
    }

    pub fn species(&self) -> Species {
        self.species
    }

    pub fn grade(&self) -> Option<Grade> {
        self.grade
    }

    pub fn size_grams(&self) -> f64 {
        self.size_grams
    }

    pub fn price_usd(&self) -> f64 {
        self.price_usd
    }

    pub fn price_per_gram(&self) -> f64 {
        self.price_usd / self.size_grams
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn vendor(&self) -> Option<&str> {
        self.vendor.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn is_accessory(&self) -> bool {
        self.is_accessory
    }
}

/// The output shape handed to the digest renderer for one product.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedSelection {
    pub species: Species,
    pub scientific_name: String,
    pub grade: Option<Grade>,
    pub size_grams: f64,
    pub price_usd: f64,
    pub price_per_gram: f64,
    pub source_url: String,
    pub vendor: Option<String>,
    pub title: Option<String>,
}

impl From<&ProductRecord> for RankedSelection {
    fn from(record: &ProductRecord) -> Self {
        Self {
            species: record.species(),
            scientific_name: record.species().scientific_name().to_string(),
            grade: record.grade(),
            size_grams: record.size_grams(),
            price_usd: record.price_usd(),
            price_per_gram: record.price_per_gram(),
            source_url: record.source_url().to_string(),
            vendor: record.vendor.clone(),
            title: record.title.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::constants::FLOAT_TOLERANCE;

    #[test]
    fn test_unit_tokens() {
        assert_eq!(Unit::from_token("g"), Some(Unit::Grams));
        assert_eq!(Unit::from_token("Grams"), Some(Unit::Grams));
        assert_eq!(Unit::from_token("OZ"), Some(Unit::Ounces));
        assert_eq!(Unit::from_token("ounce"), Some(Unit::Ounces));
        assert_eq!(Unit::from_token("kg"), None);
        assert_eq!(Unit::from_token("lb"), None);
    }

    #[test]
    fn test_price_per_gram_is_derived() {
        let record = ProductRecord::new(
            Species::Kaluga,
            None,
            100.0,
            180.0,
            "https://example.com/c".to_string(),
            None,
        );
        assert!((record.price_per_gram() - 1.8).abs() < FLOAT_TOLERANCE);
        assert!(!record.is_accessory());
    }

    #[test]
    fn test_bucket_names_serialize_as_display_names() {
        let json = serde_json::to_string(&BucketName::For2).unwrap();
        assert_eq!(json, "\"For 2\"");
        let species = serde_json::to_string(&Species::WhiteSturgeon).unwrap();
        assert_eq!(species, "\"White Sturgeon\"");
    }

    #[test]
    fn test_raw_listing_accepts_numeric_or_text_price() {
        let listing: RawListing = serde_json::from_value(serde_json::json!({
            "text": "Osetra 50g",
            "source_url": "https://example.com/a",
            "scraped_price": 95.5
        }))
        .unwrap();
        assert_eq!(listing.scraped_price, Some(ScrapedPrice::Amount(95.5)));

        let listing: RawListing = serde_json::from_value(serde_json::json!({
            "text": "Osetra 50g",
            "source_url": "https://example.com/a",
            "scraped_price": "$95.50"
        }))
        .unwrap();
        assert_eq!(listing.scraped_price, Some(ScrapedPrice::Text("$95.50".to_string())));
    }
}
