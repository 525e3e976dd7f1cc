//! Incremental radial coverage tracing around a transmitter.

use crate::{link::LinkBudget, MarginClass, Node, PropagationConfig, PropahError, Receiver, Transmitter};
use geo::geometry::Coord;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use terrain::{
    hgt::C,
    math::{bearing, destination, haversine_distance},
    ProfileSample, TileStore,
};

/// Smallest allowed trace radius in meters.
pub const MIN_RADIUS_M: C = 1000.0;

/// Largest allowed trace radius in meters.
pub const MAX_RADIUS_M: C = 20_000.0;

/// Finest allowed radial step in meters.
pub const MIN_STEP_M: C = 10.0;

/// Coverage trace geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoverageOptions {
    /// Outer radius (m), clamped to `MIN_RADIUS_M..=MAX_RADIUS_M`.
    pub radius_m: C,

    /// Number of equal azimuth sectors, sector 0 pointing north.
    pub sectors: usize,

    /// Radial spacing (m) between samples, clamped to
    /// `MIN_STEP_M..=radius_m`.
    pub step_m: C,

    /// Half-width (m) of the window around a correspondent node in
    /// which its receiver replaces the default.
    pub window_half_m: C,

    /// Consecutive non-positive samples after which a sector stops.
    pub stop_after: u32,
}

impl Default for CoverageOptions {
    fn default() -> Self {
        Self {
            radius_m: MAX_RADIUS_M,
            sectors: 360,
            step_m: 100.0,
            window_half_m: 50.0,
            stop_after: 10,
        }
    }
}

/// One traced point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CoverageSample {
    /// Distance from the origin in meters.
    pub distance_m: C,
    pub position: Coord<C>,
    /// Ground elevation, `None` without terrain data.
    pub ground_m: Option<C>,
    pub margin_db: C,
}

impl CoverageSample {
    pub fn class(&self) -> MarginClass {
        match self.ground_m {
            None => MarginClass::NoData,
            Some(_) => MarginClass::from_margin(self.margin_db),
        }
    }
}

/// Receiver substituted near a correspondent node.
#[derive(Debug, Clone, PartialEq)]
pub struct RayOverride {
    pub window: RangeInclusive<C>,
    pub receiver: Receiver,
}

#[derive(Debug, Clone)]
struct Sector {
    azimuth_deg: C,
    samples: Vec<CoverageSample>,
    terrain: Vec<ProfileSample>,
    stopped: bool,
    bad_run: u32,
    ray_override: Option<RayOverride>,
}

impl Sector {
    fn receiver_at(&self, distance_m: C, default: &Receiver) -> Receiver {
        match &self.ray_override {
            Some(o) if o.window.contains(&distance_m) => o.receiver,
            _ => *default,
        }
    }
}

/// Maps a bearing to the nearest of `sectors` equal sectors. Ties go
/// clockwise.
pub fn sector_index(bearing_deg: C, sectors: usize) -> usize {
    let sectors = sectors.max(1);
    if !bearing_deg.is_finite() {
        return 0;
    }
    let width = 360.0 / sectors as C;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index = (bearing_deg.rem_euclid(360.0) / width).round() as usize;
    index % sectors
}

/// Resumable ray-trace state around one transmitter.
///
/// Each [`extend`](Self::extend) only grows the traced radius.
/// Dropping the session cancels it.
#[derive(Debug, Clone)]
pub struct CoverageSession {
    origin: Coord<C>,
    tx: Transmitter,
    tx_alt_m: C,
    rx: Receiver,
    config: PropagationConfig,
    step_m: C,
    stop_after: u32,
    rings: u32,
    max_rings: u32,
    sectors: Vec<Sector>,
}

struct Tracer<'a> {
    origin: Coord<C>,
    tx: &'a Transmitter,
    tx_alt_m: C,
    rx: &'a Receiver,
    config: &'a PropagationConfig,
    step_m: C,
    stop_after: u32,
}

impl Tracer<'_> {
    /// Appends rings `rings` to `sector`, returning the number of new
    /// samples.
    fn advance(&self, tiles: &TileStore, sector: &mut Sector, rings: RangeInclusive<u32>) -> usize {
        let mut added = 0;
        for ring in rings {
            if sector.stopped {
                break;
            }
            let distance_m = C::from(ring) * self.step_m;
            let position = destination(self.origin, sector.azimuth_deg, distance_m);
            let ground_m = tiles.elevation(position);
            let rx = sector.receiver_at(distance_m, self.rx);
            let budget = LinkBudget::evaluate(
                self.tx,
                self.tx_alt_m,
                &rx,
                ground_m.unwrap_or(0.0) + rx.height_m,
                distance_m,
                &sector.terrain,
                self.config,
            );

            sector.terrain.push(ProfileSample {
                distance_m,
                elevation_m: ground_m,
            });
            sector.samples.push(CoverageSample {
                distance_m,
                position,
                ground_m,
                margin_db: budget.margin_db,
            });
            added += 1;

            if budget.margin_db <= 0.0 {
                sector.bad_run += 1;
                sector.stopped = sector.bad_run >= self.stop_after;
            } else {
                sector.bad_run = 0;
            }
        }
        added
    }
}

impl CoverageSession {
    pub fn builder() -> CoverageSessionBuilder {
        CoverageSessionBuilder {
            origin: None,
            correspondents: Vec::new(),
            options: CoverageOptions::default(),
            config: PropagationConfig::default(),
        }
    }

    /// Traces every live sector out to `target_m` rounded up to the
    /// next step, capped at the radius. Returns the number of new
    /// samples.
    pub fn extend(&mut self, tiles: &TileStore, target_m: C) -> usize {
        if !(target_m > 0.0) {
            return 0;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let rings = ((target_m / self.step_m).ceil().min(C::from(self.max_rings))) as u32;
        if rings <= self.rings {
            return 0;
        }

        let now = std::time::Instant::now();
        let tracer = Tracer {
            origin: self.origin,
            tx: &self.tx,
            tx_alt_m: self.tx_alt_m,
            rx: &self.rx,
            config: &self.config,
            step_m: self.step_m,
            stop_after: self.stop_after,
        };
        let first = self.rings + 1;
        let added: usize = self
            .sectors
            .par_iter_mut()
            .map(|sector| tracer.advance(tiles, sector, first..=rings))
            .sum();
        self.rings = rings;

        debug!(
            "extend; to: {:.0} m, samples: {added}, stopped: {}/{}, exec: {:?}",
            self.last_distance(),
            self.stopped_count(),
            self.sectors.len(),
            now.elapsed()
        );
        added
    }

    /// Outer edge (m) of the traced area.
    pub fn last_distance(&self) -> C {
        C::from(self.rings) * self.step_m
    }

    /// Radial spacing (m) between samples.
    pub fn step(&self) -> C {
        self.step_m
    }

    /// Outer radius (m) the trace will stop at.
    pub fn radius(&self) -> C {
        C::from(self.max_rings) * self.step_m
    }

    pub fn origin(&self) -> Coord<C> {
        self.origin
    }

    pub fn sector_count(&self) -> usize {
        self.sectors.len()
    }

    pub fn azimuth(&self, sector: usize) -> Option<C> {
        self.sectors.get(sector).map(|s| s.azimuth_deg)
    }

    /// All samples traced so far in `sector`, nearest first.
    pub fn sector(&self, sector: usize) -> Option<&[CoverageSample]> {
        self.sectors.get(sector).map(|s| s.samples.as_slice())
    }

    pub fn is_stopped(&self, sector: usize) -> bool {
        self.sectors.get(sector).map_or(false, |s| s.stopped)
    }

    pub fn stopped_count(&self) -> usize {
        self.sectors.iter().filter(|s| s.stopped).count()
    }

    /// Correspondent override of `sector`, if any.
    pub fn ray_override(&self, sector: usize) -> Option<&RayOverride> {
        self.sectors.get(sector).and_then(|s| s.ray_override.as_ref())
    }

    /// Per sector, the samples with `from_m < distance <= to_m`.
    pub fn ring(&self, from_m: C, to_m: C) -> impl Iterator<Item = (usize, &[CoverageSample])> + '_ {
        self.sectors.iter().enumerate().map(move |(i, s)| {
            let lo = s.samples.partition_point(|x| x.distance_m <= from_m);
            let hi = s.samples.partition_point(|x| x.distance_m <= to_m).max(lo);
            (i, &s.samples[lo..hi])
        })
    }

    /// The full radius is traced or every sector has stopped.
    pub fn is_complete(&self) -> bool {
        self.rings >= self.max_rings || self.sectors.iter().all(|s| s.stopped)
    }

    /// Ends the session, releasing its state.
    pub fn cancel(self) {
        debug!(
            "cancel; at: {:.0} m, samples: {}",
            self.last_distance(),
            self.sectors.iter().map(|s| s.samples.len()).sum::<usize>()
        );
    }
}

pub struct CoverageSessionBuilder {
    /// Transmitting node (required).
    origin: Option<Node>,

    /// Nodes whose receivers override the default on their sector.
    correspondents: Vec<Node>,

    options: CoverageOptions,

    config: PropagationConfig,
}

impl CoverageSessionBuilder {
    /// Transmitting node (required).
    #[must_use]
    pub fn origin(mut self, node: &Node) -> Self {
        self.origin = Some(node.clone());
        self
    }

    /// Known nodes to preview real links to. A later node replaces an
    /// earlier one on the same sector.
    #[must_use]
    pub fn correspondents(mut self, nodes: &[Node]) -> Self {
        self.correspondents = nodes.to_vec();
        self
    }

    #[must_use]
    pub fn options(mut self, options: CoverageOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn config(mut self, config: PropagationConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self, tiles: &TileStore) -> Result<CoverageSession, PropahError> {
        let node = self.origin.ok_or(PropahError::Builder("origin"))?;
        let radio = node.radio.normalized();
        let rx = radio.receiver();
        let opts = self.options;

        let radius_m = if opts.radius_m.is_finite() {
            opts.radius_m.clamp(MIN_RADIUS_M, MAX_RADIUS_M)
        } else {
            MAX_RADIUS_M
        };
        let step_m = if opts.step_m.is_finite() && opts.step_m > 0.0 {
            opts.step_m.clamp(MIN_STEP_M, radius_m)
        } else {
            CoverageOptions::default().step_m
        };
        let window_half_m = if opts.window_half_m.is_finite() {
            opts.window_half_m.max(0.0)
        } else {
            CoverageOptions::default().window_half_m
        };
        let sector_count = opts.sectors.max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let max_rings = (radius_m / step_m).floor() as u32;

        let mut sectors: Vec<Sector> = (0..sector_count)
            .map(|i| Sector {
                azimuth_deg: i as C * 360.0 / sector_count as C,
                samples: Vec::new(),
                terrain: Vec::new(),
                stopped: false,
                bad_run: 0,
                ray_override: None,
            })
            .collect();

        for peer in &self.correspondents {
            let distance_m = haversine_distance(node.position, peer.position);
            if !(distance_m > 0.0) {
                continue;
            }
            let index = sector_index(bearing(node.position, peer.position), sector_count);
            sectors[index].ray_override = Some(RayOverride {
                window: (distance_m - window_half_m).max(0.0)..=distance_m + window_half_m,
                receiver: peer.radio.receiver_or(&rx),
            });
        }

        Ok(CoverageSession {
            origin: node.position,
            tx: radio.transmitter(),
            tx_alt_m: node.ground_m(tiles) + radio.tx_height_m,
            rx,
            config: self.config,
            step_m,
            stop_after: opts.stop_after.max(1),
            rings: 0,
            max_rings,
            sectors,
        })
    }
}
