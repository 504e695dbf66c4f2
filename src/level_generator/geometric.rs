//! Geometric level generator.

use rand::{Rng, SeedableRng, rngs::SmallRng};
use thiserror::Error;

use crate::level_generator::LevelGenerator;

#[derive(Error, Debug, PartialEq, Eq)]
/// Errors that can occur when creating a [`Geometric`] level generator.
#[expect(
    clippy::module_name_repetitions,
    reason = "Using 'Error' would be too generic and may cause confusion."
)]
#[non_exhaustive]
pub enum GeometricError {
    /// The maximum number of levels must be non-zero.
    #[error("max must be non-zero.")]
    ZeroMax,
    /// The probability `$p$` must be in the range `$(0, 1)$`.
    #[error("p must be in (0, 1).")]
    InvalidProbability,
}

/// A level generator using a geometric distribution.
///
/// This distribution assumes that if a node is present at some level `$n$`,
/// then the probability that it is present at level `$n+1$` is some constant
/// `$p \in (0, 1)$`. Heights are drawn by repeated trials: starting at 1, the
/// height is incremented while a trial with probability `$p$` succeeds,
/// truncated at the maximum number of levels allowed.
#[derive(Debug)]
pub struct Geometric {
    /// The maximum height that may be generated.
    total: usize,
    /// The probability that a node is present in the next level.
    p: f64,
    /// The random number generator.
    rng: SmallRng,
}

impl Geometric {
    /// Create a new geometric level generator with `total` number of levels,
    /// and `p` as the probability that a given node is present in the next
    /// level.
    ///
    /// The generator is seeded once from the thread-local random source.
    ///
    /// # Errors
    ///
    /// `total` must be greater or equal to 1, and `p` must be strictly
    /// between 0 and 1.
    #[inline]
    pub fn new(total: usize, p: f64) -> Result<Self, GeometricError> {
        if total == 0 {
            return Err(GeometricError::ZeroMax);
        }
        if !(0.0 < p && p < 1.0) {
            return Err(GeometricError::InvalidProbability);
        }
        Ok(Geometric {
            total,
            p,
            rng: SmallRng::from_rng(&mut rand::rng()),
        })
    }

    /// Create a new geometric level generator with a fixed seed, producing a
    /// reproducible sequence of heights.
    ///
    /// # Errors
    ///
    /// `total` must be greater or equal to 1, and `p` must be strictly
    /// between 0 and 1.
    #[inline]
    pub fn with_seed(total: usize, p: f64, seed: u64) -> Result<Self, GeometricError> {
        if total == 0 {
            return Err(GeometricError::ZeroMax);
        }
        if !(0.0 < p && p < 1.0) {
            return Err(GeometricError::InvalidProbability);
        }
        Ok(Geometric {
            total,
            p,
            rng: SmallRng::seed_from_u64(seed),
        })
    }
}

impl LevelGenerator for Geometric {
    #[inline]
    fn total(&self) -> usize {
        self.total
    }

    #[inline]
    fn height(&mut self) -> usize {
        let mut h = 1;
        while h < self.total && self.rng.random::<f64>() < self.p {
            h += 1;
        }
        h
    }

    #[inline]
    fn fork(&self) -> Box<dyn LevelGenerator + Send> {
        Box::new(Geometric {
            total: self.total,
            p: self.p,
            rng: SmallRng::from_rng(&mut rand::rng()),
        })
    }
}
