//! Sensor readings and the numeric predicates applied to them

use std::time::{SystemTime, UNIX_EPOCH};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::{HeatgridError, HeatgridResult, Rank};

/// A temperature-like sensor reading
pub type Reading = i32;

/// Inclusive bounds for generated readings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadingRange {
    pub min: Reading,
    pub max: Reading,
}

impl ReadingRange {
    pub fn new(min: Reading, max: Reading) -> HeatgridResult<Self> {
        if min > max {
            return Err(HeatgridError::InvalidConfig(format!(
                "reading range [{}, {}] is empty",
                min, max
            )));
        }
        Ok(ReadingRange { min, max })
    }

    #[inline]
    pub fn contains(&self, reading: Reading) -> bool {
        (self.min..=self.max).contains(&reading)
    }
}

impl Default for ReadingRange {
    fn default() -> Self {
        ReadingRange { min: 50, max: 120 }
    }
}

/// Two readings match when they differ by at most `tolerance` (inclusive)
#[inline]
pub fn within_tolerance(a: Reading, b: Reading, tolerance: Reading) -> bool {
    (a as i64 - b as i64).abs() <= tolerance as i64
}

/// Count the readings that match `local` within `tolerance`
pub fn count_matches<I>(local: Reading, readings: I, tolerance: Reading) -> usize
where
    I: IntoIterator<Item = Reading>,
{
    readings
        .into_iter()
        .filter(|r| within_tolerance(local, *r, tolerance))
        .count()
}

/// Quorum is met when at least `quorum` neighbours match (inclusive)
#[inline]
pub fn meets_quorum(matches: usize, quorum: usize) -> bool {
    matches >= quorum
}

/// How reading generators are seeded
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeedPolicy {
    /// Reproducible: the same (rank, iteration) always yields the same reading
    Fixed(u64),
    /// Mixes the current wall-clock second into the seed
    WallClock,
}

impl Default for SeedPolicy {
    fn default() -> Self {
        SeedPolicy::WallClock
    }
}

/// Pseudo-random reading source seeded by (rank, iteration)
#[derive(Clone, Copy, Debug)]
pub struct ReadingGenerator {
    policy: SeedPolicy,
    range: ReadingRange,
}

impl ReadingGenerator {
    pub fn new(policy: SeedPolicy, range: ReadingRange) -> Self {
        ReadingGenerator { policy, range }
    }

    pub fn range(&self) -> ReadingRange {
        self.range
    }

    fn seed(&self, rank: Rank, iteration: u64) -> u64 {
        let base = match self.policy {
            SeedPolicy::Fixed(seed) => seed,
            SeedPolicy::WallClock => SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        base ^ ((rank.0 as u64) << 40) ^ iteration
    }

    /// Reading for `rank` at `iteration`, always inside the configured range
    pub fn reading(&self, rank: Rank, iteration: u64) -> Reading {
        let mut rng = StdRng::seed_from_u64(self.seed(rank, iteration));
        rng.gen_range(self.range.min..=self.range.max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tolerance_boundary() {
        assert!(within_tolerance(95, 90, 5));
        assert!(within_tolerance(90, 95, 5));
        assert!(!within_tolerance(95, 89, 5));
        assert!(!within_tolerance(89, 95, 5));
    }

    #[test]
    fn test_quorum_threshold() {
        assert!(meets_quorum(2, 2));
        assert!(meets_quorum(4, 2));
        assert!(!meets_quorum(1, 2));
        assert!(!meets_quorum(0, 2));
    }

    #[test]
    fn test_count_matches() {
        assert_eq!(count_matches(95, [93, 60, 100, 101], 5), 2);
        assert_eq!(count_matches(95, Vec::<Reading>::new(), 5), 0);
    }

    #[test]
    fn test_empty_range_rejected() {
        assert!(ReadingRange::new(10, 5).is_err());
        assert!(ReadingRange::new(5, 5).is_ok());
    }

    #[test]
    fn test_fixed_seed_is_reproducible() {
        let gen = ReadingGenerator::new(SeedPolicy::Fixed(42), ReadingRange::default());
        assert_eq!(gen.reading(Rank(3), 7), gen.reading(Rank(3), 7));
        let distinct: std::collections::HashSet<_> =
            (0..50).map(|i| gen.reading(Rank(3), i)).collect();
        assert!(distinct.len() > 1);
    }

    proptest! {
        #[test]
        fn prop_match_within_five(a in -1000i32..1000, d in -5i32..=5) {
            prop_assert!(within_tolerance(a, a + d, 5));
        }

        #[test]
        fn prop_no_match_at_six(a in -1000i32..1000, negative in any::<bool>()) {
            let b = if negative { a - 6 } else { a + 6 };
            prop_assert!(!within_tolerance(a, b, 5));
        }

        #[test]
        fn prop_readings_stay_in_range(seed in any::<u64>(), rank in 1u32..64, iteration in 0u64..10_000) {
            let range = ReadingRange::default();
            let gen = ReadingGenerator::new(SeedPolicy::Fixed(seed), range);
            prop_assert!(range.contains(gen.reading(Rank(rank), iteration)));
        }
    }
}
