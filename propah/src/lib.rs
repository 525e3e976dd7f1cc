//! # Radio Frequency Propogation
//!
//! `propah` provides terrain-aware link budgets and coverage tracing.

mod config;
pub mod coverage;
pub mod diffraction;
mod error;
pub mod link;
mod margin;
mod radio;

pub use {
    crate::{
        config::PropagationConfig,
        coverage::{CoverageOptions, CoverageSample, CoverageSession, CoverageSessionBuilder},
        error::PropahError,
        link::{evaluate_link, residual_one_way, usable_links, LinkBudget, LinkReport, UsableLink},
        margin::MarginClass,
        radio::{Node, Radio, Receiver, Transmitter},
    },
    geo, terrain,
};

#[cfg(test)]
pub(crate) mod fixtures {
    use terrain::hgt::{CellKey, Tile};

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
}
