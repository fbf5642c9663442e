use std::collections::BTreeMap;

use crate::domain::{BucketName, ProductRecord};

/// Cheapest record per bucket by price-per-gram.
///
/// Only a strictly lower price-per-gram replaces the current pick, so on ties
/// the record seen first in `assigned` wins. Buckets with no records are absent.
pub fn select_cheapest<'a, I>(assigned: I) -> BTreeMap<BucketName, &'a ProductRecord>
where
    I: IntoIterator<Item = (BucketName, &'a ProductRecord)>,
{
    let mut best: BTreeMap<BucketName, &'a ProductRecord> = BTreeMap::new();
    for (bucket, record) in assigned {
        match best.get(&bucket) {
            Some(current) if record.price_per_gram() >= current.price_per_gram() => {}
            _ => {
                best.insert(bucket, record);
            }
        }
    }
    best
}

/// Every record grouped by bucket, each group ordered by ascending
/// price-per-gram. The sort is stable so ties keep input order.
pub fn rank_buckets<'a, I>(assigned: I) -> BTreeMap<BucketName, Vec<&'a ProductRecord>>
where
    I: IntoIterator<Item = (BucketName, &'a ProductRecord)>,
{
    let mut groups: BTreeMap<BucketName, Vec<&'a ProductRecord>> = BTreeMap::new();
    for (bucket, record) in assigned {
        groups.entry(bucket).or_default().push(record);
    }
    for records in groups.values_mut() {
        records.sort_by(|a, b| a.price_per_gram().total_cmp(&b.price_per_gram()));
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Species;

    fn record(url: &str, grams: f64, price: f64) -> ProductRecord {
        ProductRecord::new(Species::Osetra, None, grams, price, url.to_string(), None)
    }

    #[test]
    fn test_selects_minimum_price_per_gram() {
        let a = record("a", 100.0, 250.0);
        let c = record("c", 100.0, 180.0);
        let picks = select_cheapest(vec![(BucketName::For4, &a), (BucketName::For4, &c)]);
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[&BucketName::For4].source_url(), "c");
    }

    #[test]
    fn test_tie_keeps_earliest() {
        let records: Vec<ProductRecord> = (0..10)
            .map(|i| {
                if i == 3 || i == 7 {
                    record(&format!("r{i}"), 500.0, 1000.0)
                } else {
                    record(&format!("r{i}"), 500.0, 1500.0 + i as f64)
                }
            })
            .collect();
        let picks = select_cheapest(records.iter().map(|r| (BucketName::Bulk, r)));
        assert_eq!(picks[&BucketName::Bulk].source_url(), "r3");
    }

    #[test]
    fn test_empty_buckets_absent() {
        let a = record("a", 40.0, 100.0);
        let picks = select_cheapest(vec![(BucketName::For2, &a)]);
        assert!(picks.contains_key(&BucketName::For2));
        assert!(!picks.contains_key(&BucketName::For4));
        assert!(!picks.contains_key(&BucketName::Specials));
        assert!(!picks.contains_key(&BucketName::Bulk));

        let none = select_cheapest(Vec::<(BucketName, &ProductRecord)>::new());
        assert!(none.is_empty());
    }

    #[test]
    fn test_rank_buckets_is_stable() {
        let a = record("a", 50.0, 100.0);
        let b = record("b", 30.0, 30.0);
        let c = record("c", 40.0, 80.0);
        let ranked = rank_buckets(vec![
            (BucketName::For2, &a),
            (BucketName::For2, &b),
            (BucketName::For2, &c),
        ]);
        let urls: Vec<&str> = ranked[&BucketName::For2]
            .iter()
            .map(|r| r.source_url())
            .collect();
        assert_eq!(urls, vec!["b", "a", "c"]);
    }
}
