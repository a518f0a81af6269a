use rand::Rng;
use rand::distributions::{Distribution, WeightedIndex};

use super::error::{ModelError, SimResult};

/// Something that yields one outcome per call from an injected random source.
pub trait Sampler {
    type Output;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Self::Output;
}

/// Discrete distribution over `T`, drawn proportionally to weight.
#[derive(Debug, Clone)]
pub struct WeightedOutcomeSet<T> {
    outcomes: Vec<T>,
    weights: Vec<f64>,
    index: WeightedIndex<f64>,
}

impl<T> WeightedOutcomeSet<T> {
    pub fn new<I>(pairs: I) -> SimResult<Self>
    where
        I: IntoIterator<Item = (T, f64)>,
    {
        let (outcomes, weights): (Vec<T>, Vec<f64>) = pairs.into_iter().unzip();
        if outcomes.is_empty() {
            return Err(ModelError::InvalidDistribution(
                "outcome list is empty".to_string(),
            ));
        }
        if let Some(bad) = weights.iter().find(|w| !w.is_finite() || **w < 0.0) {
            return Err(ModelError::InvalidDistribution(format!(
                "weight {bad} is not a finite non-negative number"
            )));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(ModelError::InvalidDistribution(
                "total weight is zero".to_string(),
            ));
        }

        let index = WeightedIndex::new(&weights)
            .map_err(|e| ModelError::InvalidDistribution(e.to_string()))?;
        Ok(Self {
            outcomes,
            weights,
            index,
        })
    }

    pub fn outcomes(&self) -> &[T] {
        &self.outcomes
    }

    /// Configured probability of the outcome at `idx`.
    pub fn probability(&self, idx: usize) -> f64 {
        let total: f64 = self.weights.iter().sum();
        self.weights.get(idx).map_or(0.0, |w| w / total)
    }
}

impl<T: Clone> Sampler for WeightedOutcomeSet<T> {
    type Output = T;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> T {
        self.outcomes[self.index.sample(rng)].clone()
    }
}

/// One band of the annual-return model: growth factor `1 + k / scale` for an
/// integer `k` drawn uniformly from `low..=high`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReturnBucket {
    pub label: &'static str,
    pub low: i32,
    pub high: i32,
    pub scale: f64,
}

impl ReturnBucket {
    pub fn min_factor(&self) -> f64 {
        1.0 + self.low as f64 / self.scale
    }

    pub fn max_factor(&self) -> f64 {
        1.0 + self.high as f64 / self.scale
    }

    pub fn contains(&self, factor: f64) -> bool {
        const EPS: f64 = 1e-9;
        factor >= self.min_factor() - EPS && factor <= self.max_factor() + EPS
    }

    fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        1.0 + rng.gen_range(self.low..=self.high) as f64 / self.scale
    }
}

pub const RETURN_BUCKETS: [(ReturnBucket, f64); 5] = [
    (
        ReturnBucket {
            label: "high_negative",
            low: -20,
            high: -8,
            scale: 1000.0,
        },
        5.0,
    ),
    (
        ReturnBucket {
            label: "low_negative",
            low: -7,
            high: -1,
            scale: 1000.0,
        },
        25.0,
    ),
    (
        ReturnBucket {
            label: "low_positive",
            low: 0,
            high: 4,
            scale: 100.0,
        },
        40.0,
    ),
    (
        ReturnBucket {
            label: "medium_positive",
            low: 5,
            high: 9,
            scale: 100.0,
        },
        25.0,
    ),
    (
        ReturnBucket {
            label: "high_positive",
            low: 10,
            high: 20,
            scale: 100.0,
        },
        5.0,
    ),
];

/// Two-stage annual growth factor: pick a bucket by weight, then re-roll a
/// value inside that bucket on every call.
#[derive(Debug, Clone)]
pub struct AnnualReturnSampler {
    buckets: WeightedOutcomeSet<ReturnBucket>,
}

impl AnnualReturnSampler {
    pub fn new() -> SimResult<Self> {
        Self::with_buckets(RETURN_BUCKETS)
    }

    pub fn with_buckets<I>(buckets: I) -> SimResult<Self>
    where
        I: IntoIterator<Item = (ReturnBucket, f64)>,
    {
        let buckets = WeightedOutcomeSet::new(buckets)?;
        if let Some(bad) = buckets.outcomes().iter().find(|b| b.low > b.high) {
            return Err(ModelError::InvalidDistribution(format!(
                "bucket {} has low {} above high {}",
                bad.label, bad.low, bad.high
            )));
        }
        Ok(Self { buckets })
    }

    pub fn buckets(&self) -> &[ReturnBucket] {
        self.buckets.outcomes()
    }

    pub fn bucket_probability(&self, idx: usize) -> f64 {
        self.buckets.probability(idx)
    }

    /// Index of the bucket whose range holds `factor`.
    pub fn bucket_of(&self, factor: f64) -> Option<usize> {
        self.buckets().iter().position(|b| b.contains(factor))
    }
}

impl Sampler for AnnualReturnSampler {
    type Output = f64;

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let bucket = self.buckets.sample(rng);
        bucket.draw(rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg64Mcg;

    #[test]
    fn rejects_empty_outcome_list() {
        let err = WeightedOutcomeSet::<u8>::new(Vec::new()).expect_err("must reject empty set");
        assert!(matches!(err, ModelError::InvalidDistribution(_)));
    }

    #[test]
    fn rejects_zero_total_weight() {
        let err = WeightedOutcomeSet::new(vec![("a", 0.0), ("b", 0.0)])
            .expect_err("must reject zero weight");
        assert!(matches!(err, ModelError::InvalidDistribution(_)));
    }

    #[test]
    fn rejects_negative_and_nan_weights() {
        assert!(WeightedOutcomeSet::new(vec![("a", 1.0), ("b", -0.5)]).is_err());
        assert!(WeightedOutcomeSet::new(vec![("a", f64::NAN)]).is_err());
    }

    #[test]
    fn zero_weight_outcome_is_never_drawn() {
        let set = WeightedOutcomeSet::new(vec![("never", 0.0), ("always", 3.0)])
            .expect("valid set");
        let mut rng = Pcg64Mcg::seed_from_u64(5);
        for _ in 0..10_000 {
            assert_eq!(set.sample(&mut rng), "always");
        }
    }

    #[test]
    fn weighted_sampling_converges_to_configured_frequencies() {
        let set = WeightedOutcomeSet::new(vec![(0usize, 1.0), (1, 2.0), (2, 7.0)])
            .expect("valid set");
        let mut rng = Pcg64Mcg::seed_from_u64(17);
        let draws = 200_000;
        let mut counts = [0u32; 3];
        for _ in 0..draws {
            counts[set.sample(&mut rng)] += 1;
        }
        for (idx, count) in counts.iter().enumerate() {
            let observed = *count as f64 / draws as f64;
            assert!(
                (observed - set.probability(idx)).abs() < 0.01,
                "outcome {idx}: observed {observed}, expected {}",
                set.probability(idx)
            );
        }
    }

    #[test]
    fn annual_factors_fall_inside_configured_ranges() {
        let sampler = AnnualReturnSampler::new().expect("standard buckets");
        let mut rng = Pcg64Mcg::seed_from_u64(99);
        for _ in 0..50_000 {
            let factor = sampler.sample(&mut rng);
            assert!(
                sampler.bucket_of(factor).is_some(),
                "factor {factor} outside every bucket"
            );
            assert!((0.980 - 1e-9..=1.200 + 1e-9).contains(&factor));
            let per_mille = factor * 1000.0;
            assert!(
                (per_mille - per_mille.round()).abs() < 1e-6,
                "factor {factor} is not on a 1/1000 grid"
            );
        }
    }

    #[test]
    fn annual_bucket_frequencies_match_weights() {
        let sampler = AnnualReturnSampler::new().expect("standard buckets");
        let mut rng = Pcg64Mcg::seed_from_u64(2024);
        let draws = 100_000;
        let mut counts = [0u32; 5];
        for _ in 0..draws {
            let factor = sampler.sample(&mut rng);
            let idx = sampler.bucket_of(factor).expect("factor in a bucket");
            counts[idx] += 1;
        }
        let expected = [0.05, 0.25, 0.40, 0.25, 0.05];
        for (idx, count) in counts.iter().enumerate() {
            assert!((sampler.bucket_probability(idx) - expected[idx]).abs() < 1e-12);
            let observed = *count as f64 / draws as f64;
            assert!(
                (observed - expected[idx]).abs() <= 0.02,
                "bucket {idx}: observed {observed}, expected {}",
                expected[idx]
            );
        }
    }

    #[test]
    fn bucket_value_is_rerolled_on_every_draw() {
        let only_high = [(RETURN_BUCKETS[4].0, 1.0)];
        let sampler = AnnualReturnSampler::with_buckets(only_high).expect("single bucket");
        let mut rng = Pcg64Mcg::seed_from_u64(3);
        let mut seen = std::collections::BTreeSet::new();
        for _ in 0..2_000 {
            seen.insert((sampler.sample(&mut rng) * 100.0).round() as i64);
        }
        assert_eq!(seen.len(), 11, "expected every step of 1.10..=1.20, got {seen:?}");
    }

    #[test]
    fn rejects_inverted_bucket() {
        let inverted = ReturnBucket {
            label: "inverted",
            low: 5,
            high: 1,
            scale: 100.0,
        };
        let err = AnnualReturnSampler::with_buckets([(inverted, 1.0)])
            .expect_err("must reject inverted bucket");
        assert!(matches!(err, ModelError::InvalidDistribution(_)));
    }
}
