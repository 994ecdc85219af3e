//! Dataset fingerprinting
//!
//! A fingerprint selects the cache namespace for a dataset. Large datasets are
//! sampled with a fixed seed so the fingerprint stays reproducible across runs.

use rand::rngs::StdRng;
use rand::SeedableRng;
use sha2::{Digest, Sha256};

use crate::dataset::Dataset;
use crate::error::Result;

/// Datasets with more rows than this are sampled down to exactly this many.
pub const SAMPLE_THRESHOLD: usize = 10_000;

/// Seed for the sampling RNG
pub const SAMPLE_SEED: u64 = 42;

/// Stable SHA-256 (hex) over the canonical CSV of the dataset or its sample.
///
/// An empty dataset yields an empty fingerprint.
pub fn fingerprint(dataset: &Dataset) -> Result<String> {
    if dataset.is_empty() {
        return Ok(String::new());
    }

    let canonical = canonical_csv(dataset)?;
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Canonical CSV of the dataset, or of its seeded sample above
/// [`SAMPLE_THRESHOLD`] rows. This is what gets hashed and what the agent sees.
pub fn canonical_csv(dataset: &Dataset) -> Result<String> {
    if dataset.row_count() <= SAMPLE_THRESHOLD {
        return dataset.to_csv();
    }
    // StdRng output is only stable within a rand release line.
    let mut rng = StdRng::seed_from_u64(SAMPLE_SEED);
    let picked = rand::seq::index::sample(&mut rng, dataset.row_count(), SAMPLE_THRESHOLD);
    dataset.rows_to_csv(picked.into_iter().map(|i| &dataset.rows[i]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn people() -> Dataset {
        Dataset::from_delimited("name,age\nAlice,25\nBob,30\nCharlie,35\n", b',').unwrap()
    }

    fn numbered(n: usize) -> Dataset {
        Dataset::new(
            vec!["id".to_string()],
            (0..n).map(|i| vec![i.to_string()]).collect(),
        )
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let ds = people();
        let first = fingerprint(&ds).unwrap();
        assert_eq!(first, fingerprint(&ds).unwrap());
        assert_eq!(first.len(), 64);
    }

    #[test]
    fn test_fingerprint_differs_on_content() {
        let mut other = people();
        other.rows[2][0] = "Charlotte".to_string();
        assert_ne!(fingerprint(&people()).unwrap(), fingerprint(&other).unwrap());
    }

    #[test]
    fn test_fingerprint_is_order_sensitive() {
        let mut swapped = people();
        swapped.rows.swap(0, 1);
        assert_ne!(fingerprint(&people()).unwrap(), fingerprint(&swapped).unwrap());
    }

    #[test]
    fn test_empty_dataset_has_empty_fingerprint() {
        let ds = Dataset::new(vec!["name".to_string()], Vec::new());
        assert_eq!(fingerprint(&ds).unwrap(), "");
        assert_eq!(fingerprint(&Dataset::default()).unwrap(), "");
    }

    #[test]
    fn test_large_dataset_is_sampled_reproducibly() {
        let ds = numbered(SAMPLE_THRESHOLD + 500);
        let a = fingerprint(&ds).unwrap();
        let b = fingerprint(&ds.clone()).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, fingerprint(&numbered(SAMPLE_THRESHOLD)).unwrap());
    }

    #[test]
    fn test_canonical_csv_caps_at_sample_size() {
        let small = people();
        assert_eq!(canonical_csv(&small).unwrap(), small.to_csv().unwrap());

        let large = numbered(SAMPLE_THRESHOLD + 500);
        let csv = canonical_csv(&large).unwrap();
        // header plus the sampled rows
        assert_eq!(csv.lines().count(), SAMPLE_THRESHOLD + 1);
    }
}
