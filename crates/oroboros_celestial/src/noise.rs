//! # Seeds and Noise
//!
//! Every random decision in the universe is derived from one `UniverseSeed`
//! and integer coordinates. Nothing here reads the clock or the OS.
//!
//! The simplex field is only used to bias system type selection, so nearby
//! systems tend to share a type and the map shows regions instead of static.

use std::f64::consts::FRAC_1_SQRT_2;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::tables::NoiseSettings;

/// Global seed of a universe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UniverseSeed(u64);

impl UniverseSeed {
    /// Creates a new universe seed.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives an independent sub-seed for `purpose`.
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }

    /// Hashes signed integer coordinates into a sub-seed.
    ///
    /// Order matters: `(1, 2)` and `(2, 1)` give different seeds.
    #[must_use]
    pub fn mix(self, values: &[i32]) -> Self {
        values.iter().fold(self, |seed, &v| {
            // Sign-extend so negative and positive coordinates stay distinct.
            seed.derive(i64::from(v) as u64).derive(0x9e37_79b9_7f4a_7c15)
        })
    }
}

impl Default for UniverseSeed {
    fn default() -> Self {
        Self(0xDEAD_BEEF_CAFE_BABE)
    }
}

/// Skew from cell space to the simplex lattice, `(sqrt(3) - 1) / 2`.
const SKEW: f64 = 0.366_025_403_784_438_6;
/// Unskew back to cell space, `(3 - sqrt(3)) / 6`.
const UNSKEW: f64 = 0.211_324_865_405_187_1;
/// Normalizes a single octave to roughly `[-1, 1]`.
const OCTAVE_SCALE: f64 = 70.0;

/// Eight compass gradients; the diagonals are unit length too.
const GRADIENTS: [(f64, f64); 8] = [
    (1.0, 0.0),
    (-1.0, 0.0),
    (0.0, 1.0),
    (0.0, -1.0),
    (FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    (-FRAC_1_SQRT_2, FRAC_1_SQRT_2),
    (FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
    (-FRAC_1_SQRT_2, -FRAC_1_SQRT_2),
];

/// Octaved 2D simplex field sampled at star-map cells.
///
/// The lattice hash is a 256-entry permutation shuffled by a `ChaCha8Rng`
/// seeded from the universe seed, so the field is reproducible and
/// independent of every other random stream.
pub struct NoiseField {
    perm: [u8; 256],
    settings: NoiseSettings,
}

impl NoiseField {
    /// Builds the field for `seed` with the given octave settings.
    #[must_use]
    pub fn new(seed: UniverseSeed, settings: NoiseSettings) -> Self {
        let mut perm = [0u8; 256];
        for (slot, value) in perm.iter_mut().zip(0..=u8::MAX) {
            *slot = value;
        }
        perm.shuffle(&mut ChaCha8Rng::seed_from_u64(seed.value()));
        Self { perm, settings }
    }

    /// Octave settings in use.
    #[must_use]
    pub const fn settings(&self) -> &NoiseSettings {
        &self.settings
    }

    /// Field value at cell `(x, y)`, in `[-1, 1]`.
    #[must_use]
    pub fn value_at(&self, x: i32, y: i32) -> f64 {
        let NoiseSettings { frequency, octaves, persistence, lacunarity } = self.settings;
        let (mut total, mut norm) = (0.0, 0.0);
        let (mut amplitude, mut scale) = (1.0, frequency);

        for _ in 0..octaves.max(1) {
            total += amplitude * self.simplex(f64::from(x) * scale, f64::from(y) * scale);
            norm += amplitude;
            amplitude *= persistence;
            scale *= lacunarity;
        }

        if norm > 0.0 {
            (total / norm).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    fn hash(&self, i: i64, j: i64) -> usize {
        // Masking keeps the index in 0..256 for negative lattice points.
        let row = usize::from(self.perm[(j & 0xff) as usize]);
        usize::from(self.perm[(row + (i & 0xff) as usize) & 0xff])
    }

    /// One simplex octave.
    fn simplex(&self, x: f64, y: f64) -> f64 {
        let skewed = (x + y) * SKEW;
        let i = (x + skewed).floor() as i64;
        let j = (y + skewed).floor() as i64;
        let origin = (i + j) as f64 * UNSKEW;
        let (dx, dy) = (x - (i as f64 - origin), y - (j as f64 - origin));

        let middle = if dx > dy { (1, 0) } else { (0, 1) };
        let corners = [(0, 0), middle, (1, 1)];

        corners
            .iter()
            .map(|&(ci, cj)| {
                let offset = (ci + cj) as f64 * UNSKEW;
                let cx = dx - f64::from(ci) + offset;
                let cy = dy - f64::from(cj) + offset;
                let falloff = 0.5 - cx * cx - cy * cy;
                if falloff <= 0.0 {
                    return 0.0;
                }
                let corner = self.hash(i + i64::from(ci), j + i64::from(cj));
                let (gx, gy) = GRADIENTS[corner % GRADIENTS.len()];
                falloff.powi(4) * (gx * cx + gy * cy)
            })
            .sum::<f64>()
            * OCTAVE_SCALE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(octaves: u32) -> NoiseSettings {
        NoiseSettings { frequency: 1.0 / 32.0, octaves, persistence: 0.5, lacunarity: 2.0 }
    }

    #[test]
    fn test_field_determinism() {
        let a = NoiseField::new(UniverseSeed::new(42), settings(3));
        let b = NoiseField::new(UniverseSeed::new(42), settings(3));
        let c = NoiseField::new(UniverseSeed::new(43), settings(3));
        let mut differs = false;
        for i in -100..100 {
            let (x, y) = (i * 7, i * -3 + 11);
            assert_eq!(a.value_at(x, y).to_bits(), b.value_at(x, y).to_bits());
            differs |= a.value_at(x, y) != c.value_at(x, y);
        }
        assert!(differs);
    }

    #[test]
    fn test_field_range_and_coherence() {
        let field = NoiseField::new(UniverseSeed::new(7), settings(4));
        let mut spread = (f64::MAX, f64::MIN);
        for i in -2_000..2_000 {
            let v = field.value_at(i, i / 3);
            assert!((-1.0..=1.0).contains(&v), "{v} out of range");
            spread = (spread.0.min(v), spread.1.max(v));
        }
        assert!(spread.1 - spread.0 > 0.2, "field is flat: {spread:?}");

        // Neighbouring cells sit close together at this frequency.
        let single = NoiseField::new(UniverseSeed::new(7), settings(1));
        assert!((single.value_at(100, 100) - single.value_at(101, 100)).abs() < 0.25);
    }

    #[test]
    fn test_mix_is_order_sensitive() {
        let seed = UniverseSeed::new(42);
        assert_eq!(seed.mix(&[1, 2]), seed.mix(&[1, 2]));
        assert_ne!(seed.mix(&[1, 2]), seed.mix(&[2, 1]));
        assert_ne!(seed.mix(&[-1]), seed.mix(&[1]));
        assert_ne!(seed.derive(1), seed.derive(2));
    }
}
