use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// A 2D heightfield of elevations in metres, row-major.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeightField {
    /// Row-major elevation values in metres.
    pub data: Vec<f32>,
    pub width: usize,
    pub height: usize,
}

impl HeightField {
    /// Create a new HeightField filled with the given value.
    pub fn new(width: usize, height: usize, fill: f32) -> Self {
        Self { data: vec![fill; width * height], width, height }
    }

    /// Create a flat (zero-elevation) HeightField.
    pub fn flat(width: usize, height: usize) -> Self {
        Self::new(width, height, 0.0)
    }

    /// Random rough terrain tilted down towards the south edge, so most
    /// flow leaves through the bottom row after joining up along the way.
    ///
    /// White noise is box-smoothed `passes` times before the tilt is added;
    /// the same seed always gives the same field.
    pub fn random(width: usize, height: usize, seed: u64) -> Self {
        const PASSES: usize = 3;
        const RELIEF_M: f32 = 100.0;
        const TILT_M_PER_ROW: f32 = 2.0;

        let mut rng = StdRng::seed_from_u64(seed);
        let mut hf = Self::flat(width, height);
        for v in &mut hf.data {
            *v = rng.gen_range(0.0..RELIEF_M);
        }
        for _ in 0..PASSES {
            hf = hf.box_smoothed();
        }
        for r in 0..height {
            let tilt = (height - r) as f32 * TILT_M_PER_ROW;
            for c in 0..width {
                hf.data[r * width + c] += tilt;
            }
        }
        hf
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.data[row * self.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: f32) {
        self.data[row * self.width + col] = val;
    }

    /// 3×3 mean, clipped at the edges.
    fn box_smoothed(&self) -> Self {
        let mut out = Self::flat(self.width, self.height);
        for r in 0..self.height {
            for c in 0..self.width {
                let mut sum = 0.0f32;
                let mut n = 0u32;
                for rr in r.saturating_sub(1)..(r + 2).min(self.height) {
                    for cc in c.saturating_sub(1)..(c + 2).min(self.width) {
                        sum += self.get(rr, cc);
                        n += 1;
                    }
                }
                out.set(r, c, sum / n as f32);
            }
        }
        out
    }

    pub fn min_elevation(&self) -> f32 {
        self.data.iter().cloned().fold(f32::INFINITY, f32::min)
    }

    pub fn max_elevation(&self) -> f32 {
        self.data.iter().cloned().fold(f32::NEG_INFINITY, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_is_deterministic_per_seed() {
        let a = HeightField::random(16, 12, 7);
        let b = HeightField::random(16, 12, 7);
        let c = HeightField::random(16, 12, 8);
        assert_eq!(a.data, b.data);
        assert_ne!(a.data, c.data);
    }

    #[test]
    fn random_relief_is_bounded() {
        let hf = HeightField::random(20, 10, 1);
        assert!(hf.min_elevation() >= 0.0);
        // Noise stays under 100 m, tilt adds at most 2 m per row.
        assert!(hf.max_elevation() <= 100.0 + 2.0 * 10.0);
    }

    #[test]
    fn set_then_get() {
        let mut hf = HeightField::flat(4, 3);
        hf.set(2, 3, 12.5);
        assert_eq!(hf.get(2, 3), 12.5);
        assert_eq!(hf.data[11], 12.5);
    }
}
