//! Great-circle routines on a spherical Earth.
//!
//! Interpolation follows the [geo] crate's haversine intermediate
//! algorithm, reshaped to also report along-path distance.
//!
//! [geo](https://github.com/georust/geo/blob/eb0cd98f3ccfa226631af23d94d66d214ea66488/geo/src/algorithm/haversine_intermediate.rs)

use geo::{
    algorithm::{HaversineBearing, HaversineDestination, HaversineDistance},
    geometry::{Coord, Point},
};
use hgt::C;

/// Mean Earth radius in meters, the one geo's haversine algorithms
/// use.
pub const EARTH_RADIUS_M: C = 6_371_008.8;

/// Below this angular distance (radians) two points are treated as
/// coincident.
const COINCIDENT_RAD: C = 1e-12;

/// Returns the great-circle distance, in meters, from `a` to `b`.
pub fn haversine_distance(a: Coord<C>, b: Coord<C>) -> C {
    Point::from(a).haversine_distance(&Point::from(b))
}

/// Returns the initial bearing, in degrees clockwise from north in
/// `[0, 360)`, from `a` toward `b`.
///
/// Coincident or non-finite input yields 0.
pub fn bearing(a: Coord<C>, b: Coord<C>) -> C {
    let deg = Point::from(a)
        .haversine_bearing(Point::from(b))
        .rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative input.
    if !deg.is_finite() || deg >= 360.0 {
        0.0
    } else {
        deg
    }
}

/// Returns the point reached by traveling `distance_m` from `origin`
/// on initial bearing `bearing_deg` (the direct geodesic problem).
///
/// Longitude is normalized to `[-180, 180]`.
pub fn destination(origin: Coord<C>, bearing_deg: C, distance_m: C) -> Coord<C> {
    let mut dest: Coord<C> = Point::from(origin)
        .haversine_destination(bearing_deg, distance_m)
        .into();
    if dest.x > 180.0 {
        dest.x -= 360.0;
    } else if dest.x < -180.0 {
        dest.x += 360.0;
    }
    dest
}

/// Returns the number of equal segments needed to walk `distance_m`
/// in steps no longer than `max_step_m`, never fewer than two.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn segment_count(distance_m: C, max_step_m: C) -> usize {
    let segments = (distance_m / max_step_m).ceil();
    if segments.is_finite() && segments > 2.0 {
        segments as usize
    } else {
        2
    }
}

/// The great circle route between two points.
#[derive(Debug, Clone, Copy)]
pub struct GreatCircle {
    start: Coord<C>,
    params: Params,
}

impl GreatCircle {
    pub fn new(start: Coord<C>, end: Coord<C>) -> Self {
        Self {
            start,
            params: Params::new(start, end),
        }
    }

    /// Route length in meters.
    pub fn distance_m(&self) -> C {
        self.params.d * EARTH_RADIUS_M
    }

    /// Returns the point `fraction` of the way along the route.
    pub fn point_at(&self, fraction: C) -> Coord<C> {
        if self.params.d < COINCIDENT_RAD {
            return self.start;
        }
        self.params.point(fraction)
    }

    /// Returns an iterator over `segments + 1` evenly spaced
    /// `(distance_m, point)` pairs, both endpoints included.
    pub fn steps(&self, segments: usize) -> GreatCircleIter {
        GreatCircleIter {
            route: *self,
            segments,
            next: 0,
        }
    }
}

/// Iterator returned by [`GreatCircle::steps`].
#[derive(Debug, Clone)]
pub struct GreatCircleIter {
    route: GreatCircle,
    segments: usize,
    next: usize,
}

impl Iterator for GreatCircleIter {
    type Item = (C, Coord<C>);

    #[allow(clippy::cast_precision_loss)]
    fn next(&mut self) -> Option<Self::Item> {
        if self.next > self.segments {
            return None;
        }
        let fraction = if self.segments == 0 {
            0.0
        } else {
            self.next as C / self.segments as C
        };
        self.next += 1;
        Some((
            fraction * self.route.distance_m(),
            self.route.point_at(fraction),
        ))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.len();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for GreatCircleIter {
    fn len(&self) -> usize {
        (self.segments + 1).saturating_sub(self.next)
    }
}

/// Angular distance plus the unit vectors of both endpoints.
#[allow(clippy::many_single_char_names)]
#[derive(Debug, Clone, Copy)]
struct Params {
    d: C,
    n: C,
    o: C,
    p: C,
    q: C,
    r: C,
    s: C,
}

impl Params {
    fn new(start: Coord<C>, end: Coord<C>) -> Self {
        let (lat1, lon1) = (start.y.to_radians(), start.x.to_radians());
        let (lat2, lon2) = (end.y.to_radians(), end.x.to_radians());
        let (lat1_sin, lat1_cos) = lat1.sin_cos();
        let (lat2_sin, lat2_cos) = lat2.sin_cos();
        let (lon1_sin, lon1_cos) = lon1.sin_cos();
        let (lon2_sin, lon2_cos) = lon2.sin_cos();

        Self {
            d: haversine_distance(start, end) / EARTH_RADIUS_M,
            n: lat1_cos * lon1_cos,
            o: lat2_cos * lon2_cos,
            p: lat1_cos * lon1_sin,
            q: lat2_cos * lon2_sin,
            r: lat1_sin,
            s: lat2_sin,
        }
    }

    fn point(&self, f: C) -> Coord<C> {
        let Self {
            d,
            n,
            o,
            p,
            q,
            r,
            s,
        } = *self;

        let a = ((1.0 - f) * d).sin() / d.sin();
        let b = (f * d).sin() / d.sin();

        let x = a * n + b * o;
        let y = a * p + b * q;
        let z = a * r + b * s;

        Coord {
            x: y.atan2(x).to_degrees(),
            y: z.atan2(x.hypot(y)).to_degrees(),
        }
    }
}
