use rand::Rng;
use serde::{Deserialize, Serialize};

use super::mutate_value;

/// Minimum alpha a freshly generated color can have
const MIN_ALPHA: f64 = 0.2;

/// Fill color of a polygon, each channel normalized to 0.0-1.0
///
/// Channels stay inside [0, 1]: random colors are drawn from that range and
/// mutation clamps its results back into it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f64,
    pub g: f64,
    pub b: f64,
    pub a: f64,
}

impl Color {
    pub fn new(r: f64, g: f64, b: f64, a: f64) -> Self {
        Self { r, g, b, a }
    }

    /// Create a random color
    ///
    /// RGB are uniform. Alpha is the product of two uniform draws with a floor
    /// of 0.2, so shapes are mostly translucent but never invisible.
    pub fn random(rng: &mut impl Rng) -> Self {
        let r = rng.gen::<f64>();
        let g = rng.gen::<f64>();
        let b = rng.gen::<f64>();
        let a = (rng.gen::<f64>() * rng.gen::<f64>()).max(MIN_ALPHA);
        Self { r, g, b, a }
    }

    /// Return a mutated copy, every channel nudged by up to `amount`
    pub fn mutate(&self, amount: f64, rng: &mut impl Rng) -> Self {
        Self {
            r: mutate_value(self.r, amount, rng),
            g: mutate_value(self.g, amount, rng),
            b: mutate_value(self.b, amount, rng),
            a: mutate_value(self.a, amount, rng),
        }
    }

    /// The RGB channels scaled to the 0-255 pixel domain
    pub fn rgb8(&self) -> [f64; 3] {
        [self.r * 255.0, self.g * 255.0, self.b * 255.0]
    }

    /// Alpha clamped to [0, 1] for compositing
    pub fn opacity(&self) -> f64 {
        self.a.clamp(0.0, 1.0)
    }
}
