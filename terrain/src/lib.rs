//! Terrain elevation lookup, profiling, and line of sight over
//! SRTM/NASADEM height tiles.

mod error;
mod los;
pub mod math;
mod profile;
mod store;

pub use crate::{
    error::TerrainError,
    los::{line_of_sight, LOS_CLEARANCE_M, LOS_STEP_M},
    profile::{Profile, ProfileBuilder, ProfileSample, DEFAULT_STEP_M},
    store::{LoadReport, TileStore},
};
pub use geo;
pub use hgt;

#[cfg(test)]
pub(crate) mod fixtures {
    use hgt::{CellKey, Tile};
    use std::io::{Cursor, Write};
    use zip::{write::FileOptions, CompressionMethod, ZipWriter};

    const SIZE: usize = 1201;

    /// A 3-arcsecond tile of constant elevation.
    pub fn flat_tile(name: &str, elevation: i16) -> Tile {
        tile_with(name, elevation, &[])
    }

    /// A 3-arcsecond tile of constant elevation with individual
    /// `(col, row, elevation)` samples overridden.
    pub fn tile_with(name: &str, elevation: i16, overrides: &[(usize, usize, i16)]) -> Tile {
        let key: CellKey = name.parse().unwrap();
        let mut samples = vec![elevation; SIZE * SIZE];
        for &(col, row, sample) in overrides {
            samples[row * SIZE + col] = sample;
        }
        Tile::from_samples(key, samples).unwrap()
    }

    /// Big-endian `.hgt` file contents.
    pub fn hgt_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_be_bytes()).collect()
    }

    /// An uncompressed zip archive holding `entries`.
    pub fn zip_archive(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, contents) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}
