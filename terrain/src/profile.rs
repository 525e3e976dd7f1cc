use crate::{
    math::{segment_count, GreatCircle},
    TerrainError, TileStore,
};
use geo::geometry::Coord;
use hgt::C;
use log::debug;

/// Default spacing (m) between profile samples.
pub const DEFAULT_STEP_M: C = 30.0;

/// Ground elevation at some distance along a path.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfileSample {
    /// Distance from the start of the path in meters.
    pub distance_m: C,

    /// Absolute ground elevation in meters, `None` where there is no
    /// terrain data.
    pub elevation_m: Option<C>,
}

/// Terrain along the great circle route between two points.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    /// Total distance from `start` to `end` in meters.
    pub distance_m: C,

    /// Location of each step along the route, endpoints included.
    pub great_circle: Vec<Coord<C>>,

    /// Ground elevation at each step along the route.
    pub samples: Vec<ProfileSample>,
}

impl Profile {
    pub fn builder() -> ProfileBuilder {
        ProfileBuilder {
            start: None,
            max_step_m: DEFAULT_STEP_M,
            end: None,
        }
    }

    /// Samples `tiles` from `start` to `end` in at least two equal
    /// steps no longer than `max_step_m`.
    pub fn new(start: Coord<C>, max_step_m: C, end: Coord<C>, tiles: &TileStore) -> Self {
        let max_step_m = if max_step_m.is_finite() && max_step_m > 0.0 {
            max_step_m
        } else {
            DEFAULT_STEP_M
        };
        let now = std::time::Instant::now();
        let route = GreatCircle::new(start, end);
        let distance_m = route.distance_m();
        let steps = route.steps(segment_count(distance_m, max_step_m));

        let mut great_circle = Vec::with_capacity(steps.len());
        let mut samples = Vec::with_capacity(steps.len());
        for (distance_m, coord) in steps {
            great_circle.push(coord);
            samples.push(ProfileSample {
                distance_m,
                elevation_m: tiles.elevation(coord),
            });
        }

        debug!(
            "profile; len: {}, distance: {distance_m:.1} m, exec: {:?}",
            samples.len(),
            now.elapsed()
        );

        Self {
            distance_m,
            great_circle,
            samples,
        }
    }

    /// Number of samples, endpoints included.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }
}

pub struct ProfileBuilder {
    /// Start point of the path (required).
    start: Option<Coord<C>>,

    /// Maximum distance between samples (meters, defaults to 30).
    max_step_m: C,

    /// End point of the path (required).
    end: Option<Coord<C>>,
}

impl ProfileBuilder {
    /// Start point of the path (required).
    #[must_use]
    pub fn start(mut self, coord: Coord<C>) -> Self {
        self.start = Some(coord);
        self
    }

    /// Maximum distance between samples (meters, defaults to 30).
    #[must_use]
    pub fn max_step(mut self, meters: C) -> Self {
        self.max_step_m = meters;
        self
    }

    /// End point of the path (required).
    #[must_use]
    pub fn end(mut self, coord: Coord<C>) -> Self {
        self.end = Some(coord);
        self
    }

    pub fn build(&self, tiles: &TileStore) -> Result<Profile, TerrainError> {
        let start = self.start.ok_or(TerrainError::Builder("start"))?;
        let end = self.end.ok_or(TerrainError::Builder("end"))?;
        Ok(Profile::new(start, self.max_step_m, end, tiles))
    }
}
