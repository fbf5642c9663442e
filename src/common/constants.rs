//! Fixed values shared across the pipeline and its configuration defaults.

/// Grams per avoirdupois ounce. Used as the default conversion factor.
pub const GRAMS_PER_OUNCE: f64 = 28.3495;

/// Tolerance used when comparing derived floating-point values in tests and checks.
pub const FLOAT_TOLERANCE: f64 = 1e-9;

// Default size bucket bounds, in grams (inclusive)
pub const FOR_2_MIN_GRAMS: f64 = 30.0;
pub const FOR_2_MAX_GRAMS: f64 = 50.0;
pub const FOR_4_MIN_GRAMS: f64 = 90.0;
pub const FOR_4_MAX_GRAMS: f64 = 110.0;
pub const SPECIALS_MIN_GRAMS: f64 = 125.0;
pub const SPECIALS_MAX_GRAMS: f64 = 250.0;
pub const BULK_MIN_GRAMS: f64 = 500.0;

/// Keywords that mark a listing as an accessory or gift set rather than caviar.
pub const DEFAULT_ACCESSORY_KEYWORDS: &[&str] = &[
    "spoon",
    "gift set",
    "gift box",
    "gift card",
    "server",
    "mother of pearl",
    "accessory",
    "accessories",
    "opener",
];

// Environment variable names
pub const LOG_DIR_ENV: &str = "CAVIAR_LOG_DIR";
pub const METRICS_ADDR_ENV: &str = "CAVIAR_METRICS_ADDR";

pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_CONFIG_PATH: &str = "caviar.toml";
