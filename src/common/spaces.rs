use std::sync::{LazyLock, Mutex, MutexGuard};

use dyn_clone::DynClone;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::ConfigurationError;

/// Generator used when sampling from spaces. Scenario and traffic
/// draws never touch this; they use the environment's own rng.
pub static SHARED_RNG: LazyLock<Mutex<StdRng>> =
    LazyLock::new(|| Mutex::new(StdRng::seed_from_u64(1234)));

pub fn seed_spaces_rng(seed: u64) {
    *shared_rng() = StdRng::seed_from_u64(seed);
}

pub(crate) fn shared_rng() -> MutexGuard<'static, StdRng> {
    // a panic while sampling leaves the rng usable
    SHARED_RNG.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Defines a space in which an action, observation, or other may exist
pub trait Space<T: Clone>: DynClone {
    /// tests whether the sample is contained within the space
    fn contains(&self, sample: &T) -> bool;

    /// randomly samples from the space
    fn sample(&mut self) -> T;

    /// returns a template value carrying the shape of the space
    fn shape(&self) -> T;
}

dyn_clone::clone_trait_object!(<T> Space<T> where T: Clone);

/// A space on `usize` where samples are drawn uniformly from `[0, n)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrete {
    n: usize,
}

impl From<usize> for Discrete {
    fn from(value: usize) -> Self {
        Self { n: value }
    }
}

impl Discrete {
    pub fn n(&self) -> usize {
        self.n
    }
}

impl Space<usize> for Discrete {
    fn contains(&self, sample: &usize) -> bool {
        *sample < self.n
    }

    fn sample(&mut self) -> usize {
        shared_rng().gen_range(0..self.n)
    }

    fn shape(&self) -> usize {
        self.n
    }
}

/// An axis-aligned box of `f32` values, bounded per dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxSpace {
    low: Vec<f32>,
    high: Vec<f32>,
}

impl BoxSpace {
    pub fn new(low: Vec<f32>, high: Vec<f32>) -> Result<Self, ConfigurationError> {
        if low.len() != high.len() {
            return Err(ConfigurationError::InvalidShape(format!(
                "box bounds have {} lows and {} highs",
                low.len(),
                high.len()
            )));
        }
        if low.iter().zip(high.iter()).any(|(l, h)| l > h) {
            return Err(ConfigurationError::InvalidShape(
                "box low bound exceeds high bound".to_string(),
            ));
        }

        Ok(Self { low, high })
    }

    /// Unbounded box of `dims` dimensions.
    pub fn unbounded(dims: usize) -> Self {
        Self {
            low: vec![f32::MIN; dims],
            high: vec![f32::MAX; dims],
        }
    }

    pub fn low(&self) -> &[f32] {
        &self.low
    }

    pub fn high(&self) -> &[f32] {
        &self.high
    }

    pub fn dims(&self) -> usize {
        self.low.len()
    }
}

impl Space<Vec<f32>> for BoxSpace {
    fn contains(&self, sample: &Vec<f32>) -> bool {
        if sample.len() != self.low.len() {
            return false;
        }

        sample
            .iter()
            .zip(self.low.iter())
            .zip(self.high.iter())
            .all(|((&s, &l), &h)| l <= s && s <= h)
    }

    fn sample(&mut self) -> Vec<f32> {
        let mut rng = shared_rng();
        self.low
            .iter()
            .zip(self.high.iter())
            .map(|(&l, &h)| {
                // keep draws finite for unbounded dimensions
                let (l, h) = (l.max(-1e6), h.min(1e6));
                if l < h {
                    rng.gen_range(l..=h)
                } else {
                    l
                }
            })
            .collect()
    }

    fn shape(&self) -> Vec<f32> {
        self.low.clone()
    }
}
