//! Deterministic generator derivation.
//!
//! Every generator handed to a model is derived from the engine seed and
//! the coordinates of the call (tick time, level ordinal, agent ordinal),
//! never from the worker that happens to run it. Sequential and parallel
//! runs therefore draw identical numbers.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use strata_core::TimeStamp;

/// Marks the natural-action stream of a level apart from agent streams.
const NATURAL_STREAM: u64 = u64::MAX;

/// SplitMix64 finalizer.
fn splitmix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn mix(seed: u64, time: TimeStamp, level: usize, stream: u64) -> u64 {
    let mut h = splitmix(seed);
    h = splitmix(h ^ time.identifier() as u64);
    h = splitmix(h ^ level as u64);
    splitmix(h ^ stream)
}

/// Generator for the decision of the `agent`-th participant at `level`.
pub fn agent_rng(seed: u64, time: TimeStamp, level: usize, agent: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(mix(seed, time, level, agent as u64))
}

/// Generator for the environment's natural action at `level`.
pub fn natural_rng(seed: u64, time: TimeStamp, level: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(mix(seed, time, level, NATURAL_STREAM))
}
