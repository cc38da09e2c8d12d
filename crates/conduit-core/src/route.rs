//! Linear waypoint routes.
//!
//! A [`Route`] is the path a mover follows through a network: an ordered list
//! of world-space waypoints traversed at a constant rate of `time_per_unit`
//! ticks per unit of distance. The route answers two questions:
//!
//! - how long the whole trip takes ([`Route::duration`]), and
//! - where the mover is after a given amount of progress ([`Route::position_at`]).
//!
//! Both are pure functions of the route and their arguments, so a mover's
//! position can be recomputed at any time from `now - start`.

use crate::clock::Ticks;
use crate::geometry::Vec3;
use serde::{Deserialize, Serialize};

/// A stored route that breaks the waypoint invariant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteError {
    #[error("route has no waypoints")]
    NoWaypoints,
}

/// An ordered waypoint path traversed at constant speed.
///
/// Stored routes carry only their waypoints and rate; the length is
/// recomputed on load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RouteData", into = "RouteData")]
pub struct Route {
    /// Waypoints in travel order. Never empty.
    waypoints: Vec<Vec3>,
    /// Ticks needed to travel one unit of distance.
    time_per_unit: Ticks,
    /// Sum of distances between consecutive waypoints.
    length: f64,
}

#[derive(Serialize, Deserialize)]
struct RouteData {
    waypoints: Vec<Vec3>,
    time_per_unit: Ticks,
}

impl TryFrom<RouteData> for Route {
    type Error = RouteError;

    fn try_from(data: RouteData) -> Result<Self, Self::Error> {
        let mut points = data.waypoints.into_iter();
        let start = points.next().ok_or(RouteError::NoWaypoints)?;
        Ok(Route::through(start, points, data.time_per_unit))
    }
}

impl From<Route> for RouteData {
    fn from(route: Route) -> Self {
        RouteData {
            waypoints: route.waypoints,
            time_per_unit: route.time_per_unit,
        }
    }
}

impl Route {
    /// Start a route at `start`. A single-waypoint route has zero length.
    pub fn new(start: Vec3, time_per_unit: Ticks) -> Self {
        Self {
            waypoints: vec![start],
            time_per_unit,
            length: 0.0,
        }
    }

    /// Build a route through `start` followed by every point in `rest`.
    pub fn through(start: Vec3, rest: impl IntoIterator<Item = Vec3>, time_per_unit: Ticks) -> Self {
        let mut route = Self::new(start, time_per_unit);
        for point in rest {
            route.push_point(point);
        }
        route
    }

    /// Append a waypoint. Only meaningful before a mover starts travelling.
    pub fn push_point(&mut self, point: Vec3) {
        if let Some(last) = self.waypoints.last() {
            self.length += last.distance(&point);
        }
        self.waypoints.push(point);
    }

    pub fn waypoints(&self) -> &[Vec3] {
        &self.waypoints
    }

    pub fn time_per_unit(&self) -> Ticks {
        self.time_per_unit
    }

    pub fn length(&self) -> f64 {
        self.length
    }

    pub fn start(&self) -> Vec3 {
        self.waypoints.first().copied().unwrap_or_default()
    }

    pub fn end(&self) -> Vec3 {
        self.waypoints.last().copied().unwrap_or_default()
    }

    /// Total travel time: `round(length * time_per_unit)`.
    pub fn duration(&self) -> Ticks {
        (self.length * self.time_per_unit as f64).round() as Ticks
    }

    /// Where a mover is after `progress` ticks of travel.
    ///
    /// Clamps to the first waypoint at zero progress and to the last waypoint
    /// at or beyond [`duration`](Self::duration). In between, the segment the
    /// mover is on is found by accumulating arrival times and the position is
    /// linearly interpolated within it.
    pub fn position_at(&self, progress: Ticks) -> Vec3 {
        if progress == 0 {
            return self.start();
        }
        if progress >= self.duration() {
            return self.end();
        }

        let rate = self.time_per_unit as f64;
        let progress = progress as f64;
        let mut travelled = 0.0;
        for pair in self.waypoints.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            let segment = from.distance(&to);
            let arrival_at_start = travelled * rate;
            let arrival_at_end = (travelled + segment) * rate;
            if arrival_at_end > progress {
                let span = arrival_at_end - arrival_at_start;
                if span <= 0.0 {
                    return to;
                }
                let t = (progress - arrival_at_start) / span;
                return from.lerp(&to, t);
            }
            travelled += segment;
        }

        // Rounding in `duration` can leave `progress` just past the last
        // cumulative arrival time.
        self.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(x: f64, y: f64, z: f64) -> Vec3 {
        Vec3::new(x, y, z)
    }

    #[test]
    fn single_point_route() {
        let route = Route::new(v(0.0, 0.0, 0.0), 1000);
        assert_eq!(route.duration(), 0);
        assert_eq!(route.position_at(0), v(0.0, 0.0, 0.0));
        assert_eq!(route.position_at(1000), v(0.0, 0.0, 0.0));
    }

    #[test]
    fn two_point_route() {
        let route = Route::through(v(0.0, 0.0, 0.0), [v(3.0, 0.0, 0.0)], 1000);
        assert_eq!(route.duration(), 3000);
        assert_eq!(route.position_at(0), v(0.0, 0.0, 0.0));
        assert_eq!(route.position_at(1000), v(1.0, 0.0, 0.0));
        assert_eq!(route.position_at(1500), v(1.5, 0.0, 0.0));
        assert_eq!(route.position_at(3000), v(3.0, 0.0, 0.0));
        assert_eq!(route.position_at(5000), v(3.0, 0.0, 0.0));
    }

    #[test]
    fn three_point_route() {
        let route = Route::through(
            v(0.0, 0.0, 0.0),
            [v(3.0, 0.0, 0.0), v(3.0, 2.0, 0.0)],
            1000,
        );
        assert_eq!(route.duration(), 5000);
        assert_eq!(route.position_at(0), v(0.0, 0.0, 0.0));
        assert_eq!(route.position_at(1000), v(1.0, 0.0, 0.0));
        assert_eq!(route.position_at(1500), v(1.5, 0.0, 0.0));
        assert_eq!(route.position_at(3000), v(3.0, 0.0, 0.0));
        assert_eq!(route.position_at(4500), v(3.0, 1.5, 0.0));
        assert_eq!(route.position_at(5000), v(3.0, 2.0, 0.0));
        assert_eq!(route.position_at(7000), v(3.0, 2.0, 0.0));
    }

    #[test]
    fn duration_rounds_to_nearest_tick() {
        // Diagonal of a unit square: sqrt(2) * 10 = 14.14..
        let route = Route::through(v(0.0, 0.0, 0.0), [v(1.0, 1.0, 0.0)], 10);
        assert_eq!(route.duration(), 14);
        // 0.25 * 2 = 0.5 rounds up.
        let half = Route::through(v(0.0, 0.0, 0.0), [v(0.25, 0.0, 0.0)], 2);
        assert_eq!(half.duration(), 1);
    }

    #[test]
    fn zero_length_segments_are_skipped() {
        let route = Route::through(
            v(0.0, 0.0, 0.0),
            [v(0.0, 0.0, 0.0), v(2.0, 0.0, 0.0), v(2.0, 0.0, 0.0)],
            100,
        );
        assert_eq!(route.duration(), 200);
        assert_eq!(route.position_at(50), v(0.5, 0.0, 0.0));
        assert_eq!(route.position_at(150), v(1.5, 0.0, 0.0));
    }

    #[test]
    fn repeated_single_point_route() {
        let route = Route::through(v(4.0, 1.0, 2.0), [v(4.0, 1.0, 2.0)], 100);
        assert_eq!(route.duration(), 0);
        assert_eq!(route.position_at(10), v(4.0, 1.0, 2.0));
    }

    #[test]
    fn length_accumulates_on_push() {
        let mut route = Route::new(v(0.0, 0.0, 0.0), 1);
        route.push_point(v(0.0, 3.0, 0.0));
        route.push_point(v(0.0, 3.0, 4.0));
        assert_eq!(route.length(), 7.0);
        assert_eq!(route.waypoints().len(), 3);
        assert_eq!(route.end(), v(0.0, 3.0, 4.0));
    }

    #[test]
    fn stored_route_without_waypoints_is_rejected() {
        let bytes = bitcode::serialize(&RouteData {
            waypoints: Vec::new(),
            time_per_unit: 10,
        })
        .unwrap();
        assert!(bitcode::deserialize::<Route>(&bytes).is_err());
    }

    #[test]
    fn stored_route_recomputes_length() {
        let route = Route::through(v(0.0, 0.0, 0.0), [v(3.0, 4.0, 0.0)], 10);
        let bytes = bitcode::serialize(&route).unwrap();
        let restored: Route = bitcode::deserialize(&bytes).unwrap();
        assert_eq!(restored.length(), 5.0);
        assert_eq!(restored.duration(), 50);
        assert_eq!(restored, route);
    }

    #[test]
    fn position_is_pure() {
        let route = Route::through(v(0.0, 0.0, 0.0), [v(3.0, 0.0, 0.0)], 1000);
        let first = route.position_at(1200);
        let second = route.position_at(1200);
        assert_eq!(first, second);
    }
}
