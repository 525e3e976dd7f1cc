//! SRTM/NASADEM elevation (`.hgt`) tiles.
//!
//! A tile is a square, row-major grid of signed 16-bit elevation
//! samples covering one degree of latitude and longitude. Row 0 is
//! the northern edge and column 0 the western edge; edge rows and
//! columns are shared with the neighboring tiles.
//!
//! # References
//!
//! 1. [30-Meter SRTM Tile Downloader](https://dwtkns.com/srtm30m)
//! 1. [Archive Team](http://fileformats.archiveteam.org/index.php?title=HGT&oldid=17250)
//! 1. [SRTM Collection User Guide](https://lpdaac.usgs.gov/documents/179/SRTM_User_Guide_V3.pdf)

mod error;
mod key;

pub use crate::{error::HgtError, key::CellKey};
use byteorder::{BigEndian as BE, ByteOrder, LittleEndian as LE};
use geo::geometry::Coord;
use std::{mem::size_of, ops::RangeInclusive};

/// Base floating point type used for all coordinates and calculations.
pub type C = f64;

/// Raw sample value meaning "elevation unknown".
pub const NODATA: i16 = i16::MIN;

const ARCSEC_PER_DEG: C = 3600.0;

/// Upper bound on samples inspected when guessing byte order.
const PROBE_COUNT: usize = 1000;

/// Prime stride between probes so they don't alias with the row
/// length.
const PROBE_STRIDE: usize = 977;

/// Elevations (m) we expect to find on Earth's surface.
const PLAUSIBLE_ELEVATION: RangeInclusive<i32> = -500..=9000;

/// Byte order the tile's samples were decoded with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    /// Standard SRTM byte order.
    Big,
    /// Byte-swapped tiles produced by some conversion tools.
    Little,
}

#[derive(Debug, Clone)]
pub struct Tile {
    /// The 1°×1° cell this tile covers.
    key: CellKey,

    /// Number of rows (and columns) in this tile.
    size: usize,

    /// Byte order detected while decoding.
    endianness: Endianness,

    /// Lowest and highest valid sample, if any.
    range: Option<(i16, i16)>,

    /// Elevation samples, north to south, west to east.
    samples: Box<[i16]>,
}

impl Tile {
    /// Decodes a tile from the raw contents of an `.hgt` file.
    ///
    /// Samples are decoded big-endian unless a strided probe of the
    /// result looks like byte-swapped data, in which case the whole
    /// tile is decoded again little-endian. A trailing odd byte is
    /// ignored.
    pub fn parse(key: CellKey, raw: &[u8]) -> Result<Self, HgtError> {
        let len = raw.len() / size_of::<i16>();
        let size = grid_size(len).ok_or(HgtError::Len(raw.len()))?;
        let raw = &raw[..len * size_of::<i16>()];

        let mut samples = vec![0; len];
        BE::read_i16_into(raw, &mut samples);
        let endianness = if looks_byte_swapped(&samples) {
            LE::read_i16_into(raw, &mut samples);
            Endianness::Little
        } else {
            Endianness::Big
        };

        Ok(Self::with_samples(key, size, endianness, samples))
    }

    /// Returns a tile built from already decoded samples.
    pub fn from_samples(key: CellKey, samples: Vec<i16>) -> Result<Self, HgtError> {
        let size =
            grid_size(samples.len()).ok_or(HgtError::Len(samples.len() * size_of::<i16>()))?;
        Ok(Self::with_samples(key, size, Endianness::Big, samples))
    }

    pub fn key(&self) -> CellKey {
        self.key
    }

    /// Returns the number of rows (and columns), typically 1201 or
    /// 3601.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns the number of samples in this tile.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Returns this tile's resolution in arcseconds per sample.
    #[allow(clippy::cast_precision_loss)]
    pub fn resolution(&self) -> C {
        ARCSEC_PER_DEG / (self.size - 1) as C
    }

    /// Returns the lowest valid elevation sample in this tile.
    pub fn min_elevation(&self) -> Option<i16> {
        self.range.map(|(min, _)| min)
    }

    /// Returns the highest valid elevation sample in this tile.
    pub fn max_elevation(&self) -> Option<i16> {
        self.range.map(|(_, max)| max)
    }

    /// Returns the raw sample at (`col`, `row`), or `None` if it is
    /// out of range or holds [`NODATA`].
    pub fn sample(&self, col: usize, row: usize) -> Option<i16> {
        if col >= self.size || row >= self.size {
            return None;
        }
        match self.samples[row * self.size + col] {
            NODATA => None,
            sample => Some(sample),
        }
    }

    /// Returns the bilinearly interpolated elevation at `coord`.
    ///
    /// A missing corner falls back to its neighbor along the same
    /// axis. Returns `None` if `coord` is outside this tile or every
    /// contributing corner is missing.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn elevation(&self, coord: Coord<C>) -> Option<C> {
        if !self.key.contains(coord) {
            return None;
        }
        let sw = self.key.sw_corner();
        let last = self.size - 1;

        // Fractional grid position from the north-west corner.
        let u = (coord.x - sw.x) * last as C;
        let v = (1.0 - (coord.y - sw.y)) * last as C;

        let col0 = (u.floor() as usize).min(last);
        let row0 = (v.floor() as usize).min(last);
        let col1 = (col0 + 1).min(last);
        let row1 = (row0 + 1).min(last);
        let fx = u - col0 as C;
        let fy = v - row0 as C;

        let corner = |col, row| self.sample(col, row).map(C::from);
        let north = lerp(corner(col0, row0), corner(col1, row0), fx);
        let south = lerp(corner(col0, row1), corner(col1, row1), fx);
        lerp(north, south, fy)
    }
}

/// Private API
impl Tile {
    fn with_samples(key: CellKey, size: usize, endianness: Endianness, samples: Vec<i16>) -> Self {
        let range = samples
            .iter()
            .copied()
            .filter(|&sample| sample != NODATA)
            .fold(None, |range, sample| match range {
                None => Some((sample, sample)),
                Some((min, max)) => Some((sample.min(min), sample.max(max))),
            });
        Self {
            key,
            size,
            endianness,
            range,
            samples: samples.into_boxed_slice(),
        }
    }
}

/// Returns the side length of a square grid of `len` samples.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn grid_size(len: usize) -> Option<usize> {
    let size = (len as C).sqrt().round() as usize;
    (size >= 2 && size * size == len).then_some(size)
}

/// Returns true if more than 30% of probed samples are implausible.
fn looks_byte_swapped(samples: &[i16]) -> bool {
    let probes = samples.len().min(PROBE_COUNT);
    let implausible = (0..probes)
        .map(|i| samples[(i * PROBE_STRIDE) % samples.len()])
        .filter(|&sample| is_implausible(sample))
        .count();
    implausible * 10 > probes * 3
}

/// Out of range, or a large multiple of 256 which is what a small
/// value looks like with its bytes swapped.
fn is_implausible(sample: i16) -> bool {
    let sample = i32::from(sample);
    let magnitude = sample.abs();
    !PLAUSIBLE_ELEVATION.contains(&sample) || (magnitude >= 1024 && magnitude % 256 == 0)
}

fn lerp(a: Option<C>, b: Option<C>, t: C) -> Option<C> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a + (b - a) * t),
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (None, None) => None,
    }
}
