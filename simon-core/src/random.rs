//! Noise-seeded random draws

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::hal::{NoiseSource, RandomSource};
use crate::types::NUM_SYMBOLS;

/// Random source reseeded from analog noise on every draw
///
/// Two conversions are taken and their low bytes packed into a 16-bit seed,
/// so successive draws never share generator state.
pub struct NoiseRandom<N> {
    noise: N,
}

impl<N> NoiseRandom<N>
where
    N: NoiseSource,
{
    pub fn new(noise: N) -> Self {
        Self { noise }
    }

    /// Seed assembled from two noise samples
    pub fn seed(&mut self) -> u16 {
        let high = self.noise.sample() & 0xFF;
        let low = self.noise.sample() & 0xFF;
        (high << 8) | low
    }
}

impl<N> RandomSource for NoiseRandom<N>
where
    N: NoiseSource,
{
    fn next_draw(&mut self) -> u8 {
        let seed = self.seed();
        let mut rng = SmallRng::seed_from_u64(seed as u64);
        let draw = rng.gen_range(1..=NUM_SYMBOLS as u8);
        trace!("draw {} from seed {}", draw, seed);
        draw
    }
}
