//! Reproducible scenario and traffic draws.
//!
//! Every function takes the generator explicitly; nothing here touches
//! process-wide random state.

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use sha2::{Digest, Sha256};

use crate::{env::base::SeedValue, error::ConfigurationError};

use super::catalog::{ScenarioCatalog, ScenarioDescriptor, TrafficDensity};

const LOW_TRAFFIC: (usize, usize) = (1, 5);
const HIGH_TRAFFIC: (usize, usize) = (10, 20);
const RANDOM_TRAFFIC: (usize, usize) = (1, 20);

/// Picks a scenario name uniformly from the catalog.
///
/// Integer-like seeds reseed `rng` first, so the same seed and catalog
/// ordering always give the same name. Any other seed is reported and
/// ignored.
pub fn choose_scenario(
    catalog: &ScenarioCatalog,
    seed: Option<&SeedValue>,
    rng: &mut StdRng,
) -> Result<String, ConfigurationError> {
    match seed.map(|s| (s, s.as_u64())) {
        Some((_, Some(seed))) => *rng = StdRng::seed_from_u64(seed),
        Some((raw, None)) => {
            tracing::warn!(seed = ?raw, "seed is not an integer, choosing an unseeded scenario")
        }
        None => {}
    }

    catalog
        .names()
        .choose(rng)
        .map(|name| name.to_string())
        .ok_or(ConfigurationError::EmptyCatalog)
}

/// Stable 64-bit seed derived from a scenario name.
pub fn name_seed(name: &str) -> u64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);

    u64::from_be_bytes(bytes)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrafficPlan {
    pub vehicles: usize,
    /// Seed the traffic generator was built from, if any.
    pub effective_seed: Option<u64>,
}

/// Decides how many traffic vehicles a scenario gets.
///
/// Unless traffic is fully random, the seed comes from the scenario name so
/// a named scenario always gets the same population. The draw uses its own
/// generator, returned for the spawn-point shuffle that follows. `rng` is
/// only advanced when there is no seed to build that generator from, so a
/// seeded traffic draw never pins the next scenario choice.
pub fn traffic_count(
    descriptor: &ScenarioDescriptor,
    random_traffic: bool,
    explicit_seed: Option<u64>,
    rng: &mut StdRng,
) -> (TrafficPlan, StdRng) {
    let effective_seed = if random_traffic {
        explicit_seed
    } else {
        Some(name_seed(&descriptor.name))
    };

    let mut traffic_rng = match effective_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::seed_from_u64(rng.gen()),
    };

    let range = if random_traffic {
        Some(RANDOM_TRAFFIC)
    } else {
        match descriptor.traffic_density {
            TrafficDensity::None => None,
            TrafficDensity::Low => Some(LOW_TRAFFIC),
            TrafficDensity::High => Some(HIGH_TRAFFIC),
        }
    };

    let vehicles = range
        .map(|(low, high)| traffic_rng.gen_range(low..=high))
        .unwrap_or(0);

    let plan = TrafficPlan {
        vehicles,
        effective_seed,
    };

    (plan, traffic_rng)
}
