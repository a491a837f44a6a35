//! Lateral lane choice on the closed loop.

use noise::{NoiseFn, Perlin};
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

/// Lateral position of the runner relative to the measured line.
///
/// Each lap picks a main lane and a bend strategy. Within a lap the
/// preferred lane is nudged every so often, low-frequency Perlin noise adds
/// unconscious drift, and bends pull the runner toward the infield. The
/// actual offset follows the target at a limited lateral rate.
pub struct LaneDrift {
    perlin: Perlin,
    rng: StdRng,
    lap: Option<u64>,
    main_lane: f64,
    bend_bias: f64,
    preferred: f64,
    next_nudge_at: f64,
    offset: f64,
}

impl LaneDrift {
    /// Offsets are clamped to this many meters either side of the line.
    pub const MAX_OFFSET_M: f64 = 3.5;
    /// Main lanes are drawn from `-3.0..=3.0` in half-meter steps.
    const MAIN_LANE_STEPS: i32 = 6;
    const BEND_BIASES: [f64; 4] = [-1.2, -0.8, -0.5, -0.3];
    const NUDGE_RANGE_M: f64 = 1.0;
    /// Meters run between nudges of the preferred lane.
    const NUDGE_EVERY_M: (f64, f64) = (40.0, 100.0);
    const DRIFT_FREQUENCY: f64 = 0.05;
    const DRIFT_AMPLITUDE_M: f64 = 0.4;
    /// Lateral meters per meter run.
    const CHANGE_RATE: f64 = 0.1;

    pub fn new(mut rng: StdRng) -> Self {
        let perlin = Perlin::new(rng.r#gen());
        Self {
            perlin,
            rng,
            lap: None,
            main_lane: 0.0,
            bend_bias: 0.0,
            preferred: 0.0,
            next_nudge_at: 0.0,
            offset: 0.0,
        }
    }

    /// Advances to `distance` and returns the lateral offset there.
    ///
    /// Calls must come with non-decreasing distances; `step_m` is the
    /// distance run since the previous call.
    pub fn offset_at(
        &mut self,
        distance: f64,
        lap_length: f64,
        in_bend: bool,
        step_m: f64,
    ) -> f64 {
        let lap = (distance / lap_length).floor() as u64;
        if self.lap.is_none_or(|current| lap > current) {
            self.lap = Some(lap);
            self.main_lane =
                self.rng.gen_range(-Self::MAIN_LANE_STEPS..=Self::MAIN_LANE_STEPS) as f64 * 0.5;
            self.bend_bias = Self::BEND_BIASES.choose(&mut self.rng).copied().unwrap_or(0.0);
            self.preferred = self.main_lane;
        }

        if distance >= self.next_nudge_at {
            let nudge = self.rng.gen_range(-Self::NUDGE_RANGE_M..=Self::NUDGE_RANGE_M);
            self.preferred = self.main_lane + nudge;
            let (lo, hi) = Self::NUDGE_EVERY_M;
            self.next_nudge_at = distance + self.rng.gen_range(lo..hi);
        }

        let drift =
            self.perlin.get([distance * Self::DRIFT_FREQUENCY, 0.5]) * Self::DRIFT_AMPLITUDE_M;
        let bend = if in_bend { self.bend_bias } else { 0.0 };
        let target = self.preferred + drift + bend;

        let max_move = Self::CHANGE_RATE * step_m;
        self.offset += (target - self.offset).clamp(-max_move, max_move);
        self.offset = self.offset.clamp(-Self::MAX_OFFSET_M, Self::MAX_OFFSET_M);
        self.offset
    }
}
