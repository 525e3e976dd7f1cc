use crate::{HgtError, C};
use geo::geometry::Coord;
use std::{fmt, str::FromStr};

/// Coordinates on the north and east edges of the world are
/// pulled inward so they resolve to an existing cell.
const EDGE_NUDGE: C = 1e-6;

/// Identifies a 1°×1° tile by its south-west corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellKey {
    /// Latitude of the southern edge, in whole degrees.
    lat: i16,
    /// Longitude of the western edge, in whole degrees.
    lon: i16,
}

impl CellKey {
    /// Returns the key for the cell whose south-west corner is
    /// `(lat, lon)`, or `None` if that corner is not on the globe.
    pub fn new(lat: i16, lon: i16) -> Option<Self> {
        if (-90..90).contains(&lat) && (-180..180).contains(&lon) {
            Some(Self { lat, lon })
        } else {
            None
        }
    }

    /// Returns the key of the cell containing `coord`.
    ///
    /// Exactly 90° north and 180° east are nudged inward by a
    /// micro-degree. Non-finite or off-globe coordinates have no cell.
    pub fn from_coord(Coord { x, y }: Coord<C>) -> Option<Self> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        if !(-90.0..=90.0).contains(&y) || !(-180.0..=180.0).contains(&x) {
            return None;
        }
        let lat = if y >= 90.0 { 90.0 - EDGE_NUDGE } else { y };
        let lon = if x >= 180.0 { 180.0 - EDGE_NUDGE } else { x };
        #[allow(clippy::cast_possible_truncation)]
        Self::new(lat.floor() as i16, lon.floor() as i16)
    }

    /// Parses a tile key out of an archive entry path such as
    /// `srtm/n59e030.HGT`.
    pub fn from_file_name(path: &str) -> Result<Self, HgtError> {
        let mk_err = || HgtError::Name(path.to_owned());
        let base = path.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or(path);
        let stem = match base
            .len()
            .checked_sub(4)
            .filter(|&idx| base.is_char_boundary(idx))
            .map(|idx| base.split_at(idx))
        {
            Some((stem, ext)) if ext.eq_ignore_ascii_case(".hgt") => stem,
            _ => return Err(mk_err()),
        };
        stem.parse().map_err(|_| mk_err())
    }

    /// Latitude of the southern edge.
    pub fn lat(&self) -> i16 {
        self.lat
    }

    /// Longitude of the western edge.
    pub fn lon(&self) -> i16 {
        self.lon
    }

    /// Returns the south-west corner as a coordinate.
    pub fn sw_corner(&self) -> Coord<C> {
        Coord {
            x: C::from(self.lon),
            y: C::from(self.lat),
        }
    }

    /// Returns true if `coord` lies within this cell, edges included.
    pub fn contains(&self, Coord { x, y }: Coord<C>) -> bool {
        let (s, w) = (C::from(self.lat), C::from(self.lon));
        (s..=s + 1.0).contains(&y) && (w..=w + 1.0).contains(&x)
    }
}

impl FromStr for CellKey {
    type Err = HgtError;

    /// Parses a bare key such as `N59E030` (case-insensitive).
    fn from_str(name: &str) -> Result<Self, HgtError> {
        let mk_err = || HgtError::Name(name.to_owned());
        if name.len() != 7 || !name.is_ascii() {
            return Err(mk_err());
        }
        let digits = |s: &str| -> Result<i16, HgtError> {
            if s.bytes().all(|b| b.is_ascii_digit()) {
                s.parse::<i16>().map_err(|_| mk_err())
            } else {
                Err(mk_err())
            }
        };
        let lat_sign = match &name[0..1] {
            "N" | "n" => 1,
            "S" | "s" => -1,
            _ => return Err(mk_err()),
        };
        let lat = lat_sign * digits(&name[1..3])?;
        let lon_sign = match &name[3..4] {
            "E" | "e" => 1,
            "W" | "w" => -1,
            _ => return Err(mk_err()),
        };
        let lon = lon_sign * digits(&name[4..7])?;
        Self::new(lat, lon).ok_or_else(mk_err)
    }
}

impl fmt::Display for CellKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n_s = if self.lat < 0 { 'S' } else { 'N' };
        let e_w = if self.lon < 0 { 'W' } else { 'E' };
        let (lat, lon) = (self.lat.abs(), self.lon.abs());
        write!(f, "{n_s}{lat:02}{e_w}{lon:03}")
    }
}
