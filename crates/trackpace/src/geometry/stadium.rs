//! Stadium-shaped running track.

/// Two straights joined by two semicircular bends.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackLayout {
    pub straight_length_m: f64,
    pub bend_radius_m: f64,
}

impl TrackLayout {
    /// Standard 400 m athletics track, measured along lane 1.
    pub const STANDARD: TrackLayout = TrackLayout {
        straight_length_m: 84.39,
        bend_radius_m: 36.5,
    };

    pub fn bend_length(&self) -> f64 {
        std::f64::consts::PI * self.bend_radius_m
    }

    pub fn perimeter(&self) -> f64 {
        2.0 * self.straight_length_m + 2.0 * self.bend_length()
    }

    /// Uniformly scales the layout so one lap measures `lap_length_m`.
    pub fn scaled_to(&self, lap_length_m: f64) -> TrackLayout {
        let k = lap_length_m / self.perimeter();
        TrackLayout {
            straight_length_m: self.straight_length_m * k,
            bend_radius_m: self.bend_radius_m * k,
        }
    }

    /// Local (x, y) position in meters after running `distance` meters,
    /// centered on the infield. Wraps around laps.
    pub fn position_at(&self, distance: f64) -> (f64, f64) {
        self.position_in_lane(distance, 0.0)
    }

    /// Like [`TrackLayout::position_at`], displaced `lane_offset_m` meters
    /// outward from the measured line. Negative values move to the infield.
    ///
    /// Distance is still measured along the measured line, so an outer lane
    /// covers slightly more ground per meter on the bends.
    pub fn position_in_lane(&self, distance: f64, lane_offset_m: f64) -> (f64, f64) {
        let s = self.straight_length_m;
        let r = self.bend_radius_m;
        let lane_r = r + lane_offset_m;
        let bend = self.bend_length();
        let d = distance.rem_euclid(self.perimeter());

        if d <= s {
            (s / 2.0 - d, -lane_r)
        } else if d <= s + bend {
            let angle = (d - s) / r;
            (-s / 2.0 - lane_r * angle.sin(), -lane_r * angle.cos())
        } else if d <= 2.0 * s + bend {
            (-s / 2.0 + (d - s - bend), lane_r)
        } else {
            let angle = (d - 2.0 * s - bend) / r;
            (s / 2.0 + lane_r * angle.sin(), lane_r * angle.cos())
        }
    }

    pub fn is_in_bend(&self, distance: f64) -> bool {
        let s = self.straight_length_m;
        let bend = self.bend_length();
        let d = distance.rem_euclid(self.perimeter());
        (s < d && d <= s + bend) || d > 2.0 * s + bend
    }
}
