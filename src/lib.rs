pub mod common;
pub mod config;
pub mod domain;
pub mod fetch;
pub mod logging;
pub mod metrics;
pub mod pipeline;

pub use common::error::{DigestError, Result};
pub use config::{Config, PipelineConfig};
pub use domain::{BucketName, ProductRecord, RankedSelection, RawListing, ScrapedPrice, Species};
pub use pipeline::{listings_from_json, DigestReport, Pipeline, RunStats};
