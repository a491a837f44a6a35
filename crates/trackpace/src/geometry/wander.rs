//! Open random path with a smoothly drifting heading.

use noise::{NoiseFn, Perlin};
use rand::Rng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};

/// Random walk in local meters with momentum.
///
/// Heading changes come from low-frequency Perlin noise, so turns are
/// gradual, plus a small Normal perturbation per step. The walker turns
/// back toward the origin once it strays past `radius_m`.
pub struct Wander {
    perlin: Perlin,
    wobble: Normal<f64>,
    rng: StdRng,
    spacing_m: f64,
    radius_m: f64,
    x: f64,
    y: f64,
    /// Radians clockwise from north.
    heading: f64,
    steps: u64,
}

impl Wander {
    /// Noise samples per step; smaller means longer sweeping curves.
    const FREQUENCY: f64 = 0.03;
    /// Largest heading change Perlin noise contributes per step.
    const MAX_TURN_RAD: f64 = 0.3;
    const WOBBLE_STD_RAD: f64 = 0.04;

    pub fn new(
        start: (f64, f64),
        heading: f64,
        spacing_m: f64,
        radius_m: f64,
        mut rng: StdRng,
    ) -> Self {
        let perlin = Perlin::new(rng.r#gen());
        Self {
            perlin,
            wobble: Normal::new(0.0, Self::WOBBLE_STD_RAD).expect("wobble std dev is positive"),
            rng,
            spacing_m,
            radius_m,
            x: start.0,
            y: start.1,
            heading,
            steps: 0,
        }
    }

    pub fn position(&self) -> (f64, f64) {
        (self.x, self.y)
    }

    /// Advances one step and returns the new local position.
    pub fn step(&mut self) -> (f64, f64) {
        self.steps += 1;
        let t = self.steps as f64 * Self::FREQUENCY;
        self.heading += self.perlin.get([t, 0.5]) * Self::MAX_TURN_RAD;
        self.heading += self.wobble.sample(&mut self.rng);

        let step = self.spacing_m * self.rng.gen_range(0.8..1.2);
        let next_x = self.x + step * self.heading.sin();
        let next_y = self.y + step * self.heading.cos();

        if next_x.hypot(next_y) > self.radius_m {
            // Turn back toward the origin, not exactly head-on.
            let home = (-self.x).atan2(-self.y);
            self.heading = home + self.rng.gen_range(-0.5..0.5);
            self.x += step * self.heading.sin();
            self.y += step * self.heading.cos();
        } else {
            self.x = next_x;
            self.y = next_y;
        }

        (self.x, self.y)
    }
}
