//! Idealized path geometry.
//!
//! Produces noise-free [`Waypoint`]s along either a closed stadium loop or
//! an open random path:
//! - [`GeometryModel::walk`]: unbounded lazy waypoint stream
//! - [`GeometryModel::waypoints`]: finite path whose great-circle length
//!   equals the requested distance

mod lanes;
mod stadium;
mod wander;

pub use lanes::LaneDrift;
pub use stadium::TrackLayout;
pub use wander::Wander;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{PathConfig, PathShape, TrackConfig};
use crate::error::GeometryError;
use crate::frame::{self, LatLon, LocalFrame};

/// An idealized, noise-free point on the planned path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub latitude: f64,
    pub longitude: f64,
    pub sequence_index: usize,
}

impl Waypoint {
    pub fn position(&self) -> LatLon {
        LatLon::new(self.latitude, self.longitude)
    }
}

/// Path layout for one session.
#[derive(Debug, Clone)]
pub struct GeometryModel {
    shape: PathShape,
    layout: TrackLayout,
    frame: LocalFrame,
    rotation_deg: f64,
    /// Center displacement in local meters.
    offset: (f64, f64),
    spacing_m: f64,
    wander_radius_m: f64,
    lanes_enabled: bool,
    walk_seed: u64,
    lane_seed: u64,
}

impl GeometryModel {
    /// Builds the geometry for a session.
    ///
    /// The direction of the center offset, lane choices and all random-path
    /// choices are drawn from `seed`, so the same seed yields the same path.
    /// A center outside every configured geo-fence is rejected.
    pub fn new(
        path: &PathConfig,
        track: &TrackConfig,
        spacing_m: f64,
        seed: u64,
    ) -> Result<Self, GeometryError> {
        let lap = path.lap_length_meters;
        if !lap.is_finite() || lap <= 0.0 {
            return Err(GeometryError::InvalidLapLength(lap));
        }
        if !spacing_m.is_finite() || spacing_m <= 0.0 {
            return Err(GeometryError::InvalidSpacing(spacing_m));
        }
        if !path.center_is_fenced() {
            return Err(GeometryError::OutsideGeoFence {
                lat: path.center.lat,
                lon: path.center.lon,
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let bearing = rng.gen_range(0.0..std::f64::consts::TAU);
        let offset = (
            track.center_offset_meters * bearing.sin(),
            track.center_offset_meters * bearing.cos(),
        );

        Ok(Self {
            shape: path.shape,
            layout: TrackLayout::STANDARD.scaled_to(lap),
            frame: LocalFrame::new(path.center),
            rotation_deg: path.base_rotation_degrees + track.rotation_offset_degrees,
            offset,
            spacing_m,
            wander_radius_m: path.wander_radius_meters.max(spacing_m * 4.0),
            lanes_enabled: track.lane_drift_enabled,
            walk_seed: rng.r#gen(),
            lane_seed: rng.r#gen(),
        })
    }

    pub fn shape(&self) -> PathShape {
        self.shape
    }

    pub fn spacing(&self) -> f64 {
        self.spacing_m
    }

    /// Perimeter of one loop in track mode.
    pub fn lap_length(&self) -> f64 {
        self.layout.perimeter()
    }

    /// Unbounded stream of waypoints, starting at the path origin.
    ///
    /// Each call restarts from the beginning with identical output.
    pub fn walk(&self) -> Walk {
        let cursor = match self.shape {
            PathShape::Track => Cursor::Track {
                distance: 0.0,
                lanes: self
                    .lanes_enabled
                    .then(|| Box::new(LaneDrift::new(StdRng::seed_from_u64(self.lane_seed)))),
            },
            PathShape::Random => {
                let rng = StdRng::seed_from_u64(self.walk_seed);
                let heading = (90.0 - self.rotation_deg).to_radians();
                Cursor::Wander {
                    walker: Box::new(Wander::new(
                        (0.0, 0.0),
                        heading,
                        self.spacing_m,
                        self.wander_radius_m,
                        rng,
                    )),
                    started: false,
                }
            }
        };
        Walk {
            model: self.clone(),
            cursor,
            next_index: 0,
        }
    }

    /// Finite waypoint sequence whose great-circle length equals `target_m`.
    ///
    /// The last waypoint is interpolated on its segment. Targets shorter
    /// than one spacing give a direct two-point path.
    pub fn waypoints(&self, target_m: f64) -> Result<Vec<Waypoint>, GeometryError> {
        if !target_m.is_finite() || target_m <= 0.0 {
            return Err(GeometryError::InvalidDistance(target_m));
        }

        let mut walk = self.walk();
        let Some(first) = walk.next() else {
            return Ok(Vec::new());
        };
        let mut path = vec![first];
        let mut covered = 0.0;

        for next in walk {
            let prev = path[path.len() - 1];
            let seg = prev.position().distance_to(&next.position());
            if covered + seg >= target_m {
                let t = if seg > 0.0 { (target_m - covered) / seg } else { 1.0 };
                let end = prev.position().lerp(&next.position(), t);
                path.push(Waypoint {
                    latitude: end.lat,
                    longitude: end.lon,
                    sequence_index: next.sequence_index,
                });
                break;
            }
            covered += seg;
            path.push(next);
        }

        Ok(path)
    }

    fn project(&self, x: f64, y: f64) -> LatLon {
        let (x, y) = frame::rotate(x, y, self.rotation_deg);
        self.translate(x, y)
    }

    fn translate(&self, x: f64, y: f64) -> LatLon {
        self.frame.to_lat_lon(x + self.offset.0, y + self.offset.1)
    }
}

enum Cursor {
    Track {
        distance: f64,
        lanes: Option<Box<LaneDrift>>,
    },
    Wander { walker: Box<Wander>, started: bool },
}

/// Lazy waypoint stream returned by [`GeometryModel::walk`].
pub struct Walk {
    model: GeometryModel,
    cursor: Cursor,
    next_index: usize,
}

impl Iterator for Walk {
    type Item = Waypoint;

    fn next(&mut self) -> Option<Waypoint> {
        let pos = match &mut self.cursor {
            Cursor::Track { distance, lanes } => {
                let d = *distance;
                let layout = self.model.layout;
                let lateral = match lanes {
                    Some(lanes) => {
                        let step = if d > 0.0 { self.model.spacing_m } else { 0.0 };
                        lanes.offset_at(d, layout.perimeter(), layout.is_in_bend(d), step)
                    }
                    None => 0.0,
                };
                let (x, y) = layout.position_in_lane(d, lateral);
                *distance += self.model.spacing_m;
                self.model.project(x, y)
            }
            Cursor::Wander { walker, started } => {
                let (x, y) = if *started {
                    walker.step()
                } else {
                    *started = true;
                    walker.position()
                };
                // Already in world orientation, only the center moves.
                self.model.translate(x, y)
            }
        };

        let waypoint = Waypoint {
            latitude: pos.lat,
            longitude: pos.lon,
            sequence_index: self.next_index,
        };
        self.next_index += 1;
        Some(waypoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeoFence;

    fn model(shape: PathShape, track: &TrackConfig, seed: u64) -> GeometryModel {
        let path = PathConfig {
            shape,
            ..Default::default()
        };
        GeometryModel::new(&path, track, 2.5, seed).unwrap()
    }

    fn path_length(points: &[Waypoint]) -> f64 {
        points
            .windows(2)
            .map(|w| w[0].position().distance_to(&w[1].position()))
            .sum()
    }

    #[test]
    fn test_track_waypoints_cover_target() {
        let m = model(PathShape::Track, &TrackConfig::deterministic(), 1);
        let points = m.waypoints(1234.0).unwrap();
        assert!((path_length(&points) - 1234.0).abs() < 0.01);

        for (i, p) in points.iter().enumerate() {
            assert_eq!(p.sequence_index, i);
        }
    }

    #[test]
    fn test_random_waypoints_cover_target() {
        let m = model(PathShape::Random, &TrackConfig::deterministic(), 9);
        let points = m.waypoints(3000.0).unwrap();
        assert!((path_length(&points) - 3000.0).abs() < 0.01);
    }

    #[test]
    fn test_track_stays_on_loop() {
        let m = model(PathShape::Track, &TrackConfig::deterministic(), 1);
        let center = PathConfig::default().center;
        for p in m.waypoints(1200.0).unwrap() {
            // Farthest point of a 400 m stadium is ~79 m from the center
            assert!(center.distance_to(&p.position()) < 80.0);
        }
    }

    #[test]
    fn test_lane_drift_stays_near_loop() {
        let lanes = TrackConfig {
            noise_enabled: false,
            ..Default::default()
        };
        let drifting = model(PathShape::Track, &lanes, 4);
        let plain = model(PathShape::Track, &TrackConfig::deterministic(), 4);
        let center = PathConfig::default().center;

        let a: Vec<_> = drifting.walk().take(1600).collect();
        let b: Vec<_> = plain.walk().take(1600).collect();
        let mut moved = 0;
        for (p, q) in a.iter().zip(&b) {
            let lateral = p.position().distance_to(&q.position());
            assert!(lateral <= LaneDrift::MAX_OFFSET_M + 0.05, "lateral {lateral}");
            assert!(center.distance_to(&p.position()) < 84.0);
            if lateral > 0.5 {
                moved += 1;
            }
        }
        assert!(moved > 0);
        assert_eq!(a[0], b[0]);
    }

    #[test]
    fn test_center_outside_geo_fence_rejected() {
        let elsewhere = GeoFence::new("elsewhere", 31.19141, 31.193705, 121.594352, 121.596808);
        let stadium = GeoFence::new("stadium", 31.318217, 31.31997, 121.392548, 121.393845);
        let mut path = PathConfig {
            geo_fences: vec![elsewhere],
            ..Default::default()
        };
        let track = TrackConfig::deterministic();
        assert!(matches!(
            GeometryModel::new(&path, &track, 2.5, 0),
            Err(GeometryError::OutsideGeoFence { .. })
        ));

        path.geo_fences.push(stadium);
        assert!(GeometryModel::new(&path, &track, 2.5, 0).is_ok());
    }

    #[test]
    fn test_short_target_gives_two_points() {
        let m = model(PathShape::Track, &TrackConfig::deterministic(), 1);
        let points = m.waypoints(1.0).unwrap();
        assert_eq!(points.len(), 2);
        assert!((path_length(&points) - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_rejects_bad_distance() {
        let m = model(PathShape::Track, &TrackConfig::deterministic(), 1);
        assert_eq!(m.waypoints(0.0), Err(GeometryError::InvalidDistance(0.0)));
        assert!(m.waypoints(f64::NAN).is_err());
    }

    #[test]
    fn test_rejects_bad_lap_and_spacing() {
        let track = TrackConfig::deterministic();
        let path = PathConfig {
            lap_length_meters: -5.0,
            ..Default::default()
        };
        assert!(matches!(
            GeometryModel::new(&path, &track, 2.5, 0),
            Err(GeometryError::InvalidLapLength(_))
        ));
        assert!(matches!(
            GeometryModel::new(&PathConfig::default(), &track, 0.0, 0),
            Err(GeometryError::InvalidSpacing(_))
        ));
    }

    #[test]
    fn test_walk_restarts_identically() {
        let m = model(PathShape::Random, &TrackConfig::default(), 5);
        let a: Vec<_> = m.walk().take(200).collect();
        let b: Vec<_> = m.walk().take(200).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_offsets_move_the_path() {
        let plain = TrackConfig::deterministic();
        let shifted = TrackConfig {
            center_offset_meters: 5.0,
            rotation_offset_degrees: 3.0,
            ..TrackConfig::deterministic()
        };
        let a = model(PathShape::Track, &plain, 1).walk().next().unwrap();
        let b = model(PathShape::Track, &shifted, 1).walk().next().unwrap();
        assert!(a.position().distance_to(&b.position()) > 1.0);
    }
}
