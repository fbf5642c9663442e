use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{ProductRecord, RawListing};
use crate::pipeline::extract::FieldCandidates;

/// Why a listing was dropped. Rejections are data-quality outcomes, not
/// operational errors.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    #[error("listing is an accessory or gift set")]
    IsAccessory,
    #[error("no recognised sturgeon species")]
    MissingSpecies,
    #[error("weight missing, unconvertible or not positive")]
    MissingOrInvalidWeight,
    #[error("price missing or not positive")]
    MissingOrInvalidPrice,
}

impl RejectionReason {
    /// Checks in the order they are applied.
    pub const ALL: [RejectionReason; 4] = [
        RejectionReason::IsAccessory,
        RejectionReason::MissingSpecies,
        RejectionReason::MissingOrInvalidWeight,
        RejectionReason::MissingOrInvalidPrice,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::IsAccessory => "is_accessory",
            RejectionReason::MissingSpecies => "missing_species",
            RejectionReason::MissingOrInvalidWeight => "missing_or_invalid_weight",
            RejectionReason::MissingOrInvalidPrice => "missing_or_invalid_price",
        }
    }
}

/// Build a [`ProductRecord`] from extracted candidates or report the first
/// failing check: accessory, then species, then weight, then price.
///
/// `normalized_grams` is the candidate weight after unit conversion; `price_usd`
/// overrides the text price when the fetch stage captured one. Provenance
/// (URL, vendor, title) is copied from `listing`.
pub fn validate(
    candidates: &FieldCandidates,
    normalized_grams: Option<f64>,
    price_usd: Option<f64>,
    listing: &RawListing,
) -> Result<ProductRecord, RejectionReason> {
    if candidates.is_accessory {
        return Err(RejectionReason::IsAccessory);
    }

    let species = candidates.species.ok_or(RejectionReason::MissingSpecies)?;

    let size_grams = normalized_grams
        .filter(|g| g.is_finite() && *g > 0.0)
        .ok_or(RejectionReason::MissingOrInvalidWeight)?;

    let price_usd = price_usd
        .or(candidates.price_usd)
        .filter(|p| p.is_finite() && *p > 0.0)
        .ok_or(RejectionReason::MissingOrInvalidPrice)?;

    Ok(ProductRecord::new(
        species,
        candidates.grade,
        size_grams,
        price_usd,
        listing.source_url.clone(),
        listing.vendor.clone(),
    )
    .with_title(listing.title.clone()))
}
