// Extraction pipeline: extract -> normalize -> validate -> bucket -> rank

pub mod bucket;
pub mod extract;
pub mod normalize;
pub mod rank;
pub mod validate;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, info_span, warn};

use crate::common::error::{DigestError, Result};
use crate::config::PipelineConfig;
use crate::domain::{BucketName, ProductRecord, RankedSelection, RawListing};
use crate::metrics::PipelineMetrics;

use bucket::Bucketer;
use extract::{extract_weight, parse_scraped_price, Extractor, FieldCandidates};
use normalize::UnitNormalizer;
use rank::{rank_buckets, select_cheapest};
use validate::{validate, RejectionReason};

/// Counts for one run, for logging and the digest footer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total: usize,
    pub accepted: usize,
    pub unbucketed: usize,
    pub rejected: BTreeMap<RejectionReason, usize>,
}

/// Result of a run: the cheapest pick per bucket plus every bucketed record in
/// ranked order. Buckets without records are absent from both maps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DigestReport {
    pub selections: BTreeMap<BucketName, RankedSelection>,
    pub buckets: BTreeMap<BucketName, Vec<RankedSelection>>,
    pub stats: RunStats,
}

/// The configured extraction pipeline. Pure and synchronous; one instance can
/// be reused across runs.
#[derive(Debug, Clone)]
pub struct Pipeline {
    extractor: Extractor,
    normalizer: UnitNormalizer,
    bucketer: Bucketer,
}

impl Pipeline {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            extractor: Extractor::new(config)?,
            normalizer: UnitNormalizer::new(config.grams_per_ounce),
            bucketer: Bucketer::new(config)?,
        })
    }

    pub fn bucketer(&self) -> &Bucketer {
        &self.bucketer
    }

    pub fn extract(&self, text: &str) -> FieldCandidates {
        self.extractor.extract(text)
    }

    /// Turn one listing into a validated record or the reason it was dropped.
    ///
    /// A weight found in the listing's dedicated weight text takes precedence
    /// over one found in the listing text.
    pub fn process_listing(&self, listing: &RawListing) -> std::result::Result<ProductRecord, RejectionReason> {
        let candidates = self.extractor.extract(&listing.text);
        let weight = listing
            .scraped_weight
            .as_deref()
            .and_then(extract_weight)
            .or_else(|| candidates.weight.clone());
        let grams = weight
            .as_ref()
            .and_then(|w| self.normalizer.normalize(w.value, &w.unit));
        let scraped_price = listing.scraped_price.as_ref().and_then(parse_scraped_price);

        validate(&candidates, grams, scraped_price, listing)
    }

    /// Run the whole pipeline over an ordered batch. Input order decides ties.
    pub fn run(&self, listings: &[RawListing]) -> DigestReport {
        let span = info_span!("digest_run", listings = listings.len());
        let _enter = span.enter();
        let started = Instant::now();

        let mut stats = RunStats {
            total: listings.len(),
            ..RunStats::default()
        };
        let mut assigned: Vec<(BucketName, ProductRecord)> = Vec::new();

        for (index, listing) in listings.iter().enumerate() {
            match self.process_listing(listing) {
                Ok(record) => {
                    stats.accepted += 1;
                    PipelineMetrics::record_listing_accepted();
                    match self.bucketer.assign(&record) {
                        Some(bucket) => {
                            debug!(index, url = %listing.source_url, bucket = %bucket, "listing accepted");
                            assigned.push((bucket, record));
                        }
                        None => {
                            stats.unbucketed += 1;
                            PipelineMetrics::record_unbucketed();
                            debug!(
                                index,
                                url = %listing.source_url,
                                grams = record.size_grams(),
                                "listing outside every bucket"
                            );
                        }
                    }
                }
                Err(reason) => {
                    *stats.rejected.entry(reason).or_default() += 1;
                    PipelineMetrics::record_listing_rejected(reason);
                    debug!(index, url = %listing.source_url, reason = reason.code(), "listing rejected");
                }
            }
        }

        let selections: BTreeMap<BucketName, RankedSelection> =
            select_cheapest(assigned.iter().map(|(bucket, record)| (*bucket, record)))
                .into_iter()
                .map(|(bucket, record)| (bucket, RankedSelection::from(record)))
                .collect();

        let buckets: BTreeMap<BucketName, Vec<RankedSelection>> =
            rank_buckets(assigned.iter().map(|(bucket, record)| (*bucket, record)))
                .into_iter()
                .map(|(bucket, records)| {
                    (
                        bucket,
                        records.into_iter().map(RankedSelection::from).collect(),
                    )
                })
                .collect();

        for (bucket, pick) in &selections {
            info!(
                bucket = %bucket,
                species = %pick.species,
                price_per_gram = pick.price_per_gram,
                url = %pick.source_url,
                "bucket selection"
            );
        }

        let rejected: usize = stats.rejected.values().sum();
        info!(
            total = stats.total,
            accepted = stats.accepted,
            rejected,
            unbucketed = stats.unbucketed,
            selections = selections.len(),
            "digest run complete"
        );
        PipelineMetrics::record_run(
            listings.len(),
            selections.len(),
            started.elapsed().as_secs_f64(),
        );

        DigestReport {
            selections,
            buckets,
            stats,
        }
    }
}

/// Read an ordered listing batch from JSON.
///
/// The top level must be an array; anything else is a malformed batch. An
/// individual element that does not describe a listing is logged and skipped.
pub fn listings_from_json(json: &str) -> Result<Vec<RawListing>> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let items = match value {
        serde_json::Value::Array(items) => items,
        other => {
            return Err(DigestError::InvalidInput(format!(
                "expected a JSON array of listings, got {}",
                json_kind(&other)
            )))
        }
    };

    let mut listings = Vec::with_capacity(items.len());
    for (index, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<RawListing>(item) {
            Ok(listing) => listings.push(listing),
            Err(e) => warn!(index, "skipping malformed listing: {}", e),
        }
    }
    Ok(listings)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
