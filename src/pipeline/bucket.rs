use crate::common::error::Result;
use crate::config::{BucketRange, PipelineConfig};
use crate::domain::{BucketName, ProductRecord};

/// Assigns records to the first configured gram range that contains them.
#[derive(Debug, Clone)]
pub struct Bucketer {
    /// Ascending by lower bound, non-overlapping
    ranges: Vec<BucketRange>,
}

impl Bucketer {
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ranges: config.sorted_buckets(),
        })
    }

    pub fn ranges(&self) -> &[BucketRange] {
        &self.ranges
    }

    /// `None` when the weight falls between or below all ranges.
    pub fn assign(&self, record: &ProductRecord) -> Option<BucketName> {
        self.assign_grams(record.size_grams())
    }

    pub fn assign_grams(&self, grams: f64) -> Option<BucketName> {
        self.ranges
            .iter()
            .find(|range| range.contains(grams))
            .map(|range| range.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucketer() -> Bucketer {
        Bucketer::new(&PipelineConfig::default()).unwrap()
    }

    #[test]
    fn test_inclusive_boundaries() {
        let b = bucketer();
        assert_eq!(b.assign_grams(30.0), Some(BucketName::For2));
        assert_eq!(b.assign_grams(50.0), Some(BucketName::For2));
        assert_eq!(b.assign_grams(90.0), Some(BucketName::For4));
        assert_eq!(b.assign_grams(110.0), Some(BucketName::For4));
        assert_eq!(b.assign_grams(125.0), Some(BucketName::Specials));
        assert_eq!(b.assign_grams(250.0), Some(BucketName::Specials));
        assert_eq!(b.assign_grams(500.0), Some(BucketName::Bulk));
        assert_eq!(b.assign_grams(1_000_000.0), Some(BucketName::Bulk));
    }

    #[test]
    fn test_gaps_are_unassigned() {
        let b = bucketer();
        assert_eq!(b.assign_grams(50.01), None);
        assert_eq!(b.assign_grams(29.99), None);
        assert_eq!(b.assign_grams(115.0), None);
        assert_eq!(b.assign_grams(499.0), None);
    }

    #[test]
    fn test_ounce_tin_lands_in_for_2() {
        // 1.76 oz ~ 49.9 g
        assert_eq!(
            bucketer().assign_grams(1.76 * 28.3495),
            Some(BucketName::For2)
        );
    }

    #[test]
    fn test_ranges_sorted_ascending() {
        let mut config = PipelineConfig::default();
        config.buckets.reverse();
        let b = Bucketer::new(&config).unwrap();
        let names: Vec<BucketName> = b.ranges().iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                BucketName::For2,
                BucketName::For4,
                BucketName::Specials,
                BucketName::Bulk
            ]
        );
    }

    #[test]
    fn test_alternate_ranges() {
        let config = PipelineConfig {
            buckets: vec![BucketRange::new(BucketName::Bulk, 250.0, None)],
            ..PipelineConfig::default()
        };
        let b = Bucketer::new(&config).unwrap();
        assert_eq!(b.assign_grams(100.0), None);
        assert_eq!(b.assign_grams(250.0), Some(BucketName::Bulk));
    }
}
