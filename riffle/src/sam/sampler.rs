use std::fmt;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

/// Keeps an approximate fraction of a stream of items.
///
/// Each item is kept independently with probability `fraction_to_keep`,
/// drawn from a seeded generator so a given seed always keeps the same
/// items.
pub struct FractionalSampler {
    fraction_to_keep: f64,
    rng: StdRng,
}

impl fmt::Debug for FractionalSampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FractionalSampler")
            .field("fraction_to_keep", &self.fraction_to_keep)
            .finish_non_exhaustive()
    }
}

impl FractionalSampler {
    pub fn new(fraction_to_keep: f64, seed: u64) -> Result<Self> {
        if !(0.0..=1.0).contains(&fraction_to_keep) {
            return Err(Error::InvalidArgument(format!(
                "sampling fraction must be in [0.0, 1.0], got {fraction_to_keep}"
            )));
        }
        Ok(Self {
            fraction_to_keep,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Decides whether to keep the next item.
    pub fn keep(&mut self) -> bool {
        self.rng.gen::<f64>() <= self.fraction_to_keep
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_out_of_range_fraction() {
        assert!(matches!(
            FractionalSampler::new(-0.1, 0).unwrap_err(),
            Error::InvalidArgument(_)
        ));
        assert!(matches!(
            FractionalSampler::new(1.5, 0).unwrap_err(),
            Error::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_keep_all() {
        let mut sampler = FractionalSampler::new(1.0, 42).unwrap();
        assert!((0..1000).all(|_| sampler.keep()));
    }

    #[test]
    fn test_deterministic_for_seed() {
        let mut a = FractionalSampler::new(0.5, 7).unwrap();
        let mut b = FractionalSampler::new(0.5, 7).unwrap();
        let draws_a: Vec<bool> = (0..100).map(|_| a.keep()).collect();
        let draws_b: Vec<bool> = (0..100).map(|_| b.keep()).collect();
        assert_eq!(draws_a, draws_b);
    }

    #[test]
    fn test_approximate_rate() {
        let mut sampler = FractionalSampler::new(0.5, 42).unwrap();
        let kept = (0..10_000).filter(|_| sampler.keep()).count();
        assert!((4_500..=5_500).contains(&kept), "kept {kept} of 10000");
    }
}
