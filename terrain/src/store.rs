//! In-memory elevation tile store.

use crate::TerrainError;
use geo::geometry::Coord;
use hgt::{CellKey, Endianness, HgtError, Tile, C};
use log::{debug, warn};
use std::{
    collections::HashMap,
    io::{Cursor, Read},
    path::Path,
    time::Instant,
};
use zip::ZipArchive;

/// Outcome of a successful (re)load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Tiles now held by the store.
    pub loaded: usize,

    /// Height files that were unreadable, misnamed, or not a square
    /// grid.
    pub skipped: usize,
}

/// Owns every loaded tile, keyed by cell.
///
/// Loading takes `&mut self` and replaces the contents wholesale,
/// lookups take `&self`; the borrow checker provides the
/// single-writer/many-reader discipline, so a store shared with
/// worker threads can't be reloaded while they query it.
#[derive(Debug, Default)]
pub struct TileStore {
    tiles: HashMap<CellKey, Tile>,
}

impl TileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the store's contents with the `.hgt` entries of a zip
    /// archive.
    ///
    /// Bad entries are logged and skipped. If the archive itself can't
    /// be opened the store is left untouched; if it holds no height
    /// files at all the store ends up empty and
    /// [`TerrainError::NoTiles`] is returned.
    pub fn load_archive(&mut self, raw: &[u8]) -> Result<LoadReport, TerrainError> {
        self.load_zip(raw, "archive")
    }

    /// Reads the zip archive at `path`, see [`TileStore::load_archive`].
    pub fn load_archive_file<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadReport, TerrainError> {
        let raw = std::fs::read(&path)?;
        self.load_zip(&raw, &path.as_ref().display().to_string())
    }

    /// Replaces the store's contents with every `.hgt` file in
    /// `tile_dir`.
    pub fn load_dir<P: AsRef<Path>>(&mut self, tile_dir: P) -> Result<LoadReport, TerrainError> {
        let now = Instant::now();
        let mut tiles = HashMap::new();
        let mut report = LoadReport::default();
        let mut height_files = 0;

        for entry in std::fs::read_dir(&tile_dir)? {
            let path = entry?.path();
            let is_hgt = path
                .extension()
                .and_then(std::ffi::OsStr::to_str)
                .map_or(false, |ext| ext.eq_ignore_ascii_case("hgt"));
            if !is_hgt {
                continue;
            }
            height_files += 1;
            let name = path.to_string_lossy().into_owned();
            match std::fs::read(&path) {
                Ok(raw) => insert_decoded(&mut tiles, &mut report, &name, &raw),
                Err(e) => {
                    debug!("skipping {name}: {e}");
                    report.skipped += 1;
                }
            }
        }

        self.replace(tiles, report, height_files, now)
            .ok_or_else(|| TerrainError::NoTiles(tile_dir.as_ref().display().to_string()))
    }

    /// Returns the elevation (m) at `coord`, or `None` if nothing is
    /// known there.
    ///
    /// `coord.y` is latitude and `coord.x` longitude, in degrees.
    pub fn elevation(&self, coord: Coord<C>) -> Option<C> {
        if self.tiles.is_empty() {
            return None;
        }
        let key = CellKey::from_coord(coord)?;
        self.tiles.get(&key)?.elevation(coord)
    }

    /// Returns the tile covering `key`, if loaded.
    pub fn tile(&self, key: CellKey) -> Option<&Tile> {
        self.tiles.get(&key)
    }

    /// Returns the keys of all loaded tiles, in no particular order.
    pub fn keys(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.tiles.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }
}

impl FromIterator<Tile> for TileStore {
    fn from_iter<I: IntoIterator<Item = Tile>>(iter: I) -> Self {
        Self {
            tiles: iter.into_iter().map(|tile| (tile.key(), tile)).collect(),
        }
    }
}

/// Private API.
impl TileStore {
    fn load_zip(&mut self, raw: &[u8], source: &str) -> Result<LoadReport, TerrainError> {
        debug!("loading tiles from {source}");
        let now = Instant::now();
        let mut archive = ZipArchive::new(Cursor::new(raw))?;
        let mut tiles = HashMap::new();
        let mut report = LoadReport::default();
        let mut height_files = 0;

        for idx in 0..archive.len() {
            let mut entry = match archive.by_index(idx) {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("skipping archive entry {idx}: {e}");
                    report.skipped += 1;
                    continue;
                }
            };
            let name = entry.name().to_owned();
            if !entry.is_file() || !name.to_ascii_lowercase().ends_with(".hgt") {
                continue;
            }
            height_files += 1;
            let mut raw = Vec::new();
            match entry.read_to_end(&mut raw) {
                Ok(_) => insert_decoded(&mut tiles, &mut report, &name, &raw),
                Err(e) => {
                    debug!("skipping {name}: {e}");
                    report.skipped += 1;
                }
            }
        }

        self.replace(tiles, report, height_files, now)
            .ok_or_else(|| TerrainError::NoTiles(source.to_owned()))
    }

    /// Swaps in freshly decoded tiles. Returns `None` when the source
    /// had no height files.
    fn replace(
        &mut self,
        tiles: HashMap<CellKey, Tile>,
        mut report: LoadReport,
        height_files: usize,
        started: Instant,
    ) -> Option<LoadReport> {
        self.tiles = tiles;
        report.loaded = self.tiles.len();
        debug!(
            "tile store; loaded: {}, skipped: {}, exec: {:?}",
            report.loaded,
            report.skipped,
            started.elapsed()
        );
        (height_files > 0).then_some(report)
    }
}

fn insert_decoded(
    tiles: &mut HashMap<CellKey, Tile>,
    report: &mut LoadReport,
    name: &str,
    raw: &[u8],
) {
    match decode(name, raw) {
        Ok(tile) => {
            log_tile(name, &tile);
            tiles.insert(tile.key(), tile);
        }
        Err(e) => {
            debug!("skipping {name}: {e}");
            report.skipped += 1;
        }
    }
}

fn decode(name: &str, raw: &[u8]) -> Result<Tile, HgtError> {
    let key = CellKey::from_file_name(name)?;
    Tile::parse(key, raw)
}

fn log_tile(name: &str, tile: &Tile) {
    if tile.endianness() == Endianness::Little {
        warn!("{name}: little-endian samples detected");
    }
    let key = tile.key();
    let (lat, lon) = (key.lat(), key.lon());
    debug!(
        "{key} ({size}x{size}), lat {lat}..{}, lon {lon}..{}, elevation {:?}..{:?}",
        lat + 1,
        lon + 1,
        tile.min_elevation(),
        tile.max_elevation(),
        size = tile.size(),
    );
}

#[cfg(test)]
mod tests {
    use super::{Coord, LoadReport, TileStore};
    use crate::{fixtures, TerrainError};
    use hgt::{CellKey, Endianness};

    const SIZE: usize = 1201;

    #[test]
    fn test_load_uniform_tile() {
        let archive = fixtures::zip_archive(&[("N59E030.hgt", vec![0; SIZE * SIZE * 2])]);
        let mut store = TileStore::new();
        let report = store.load_archive(&archive).unwrap();
        assert_eq!(
            report,
            LoadReport {
                loaded: 1,
                skipped: 0
            }
        );
        assert_eq!(store.elevation(Coord { x: 30.5, y: 59.5 }), Some(0.0));
        assert_eq!(store.elevation(Coord { x: 30.5, y: 61.0 }), None);
    }

    #[test]
    fn test_empty_store_has_no_data() {
        let store = TileStore::new();
        assert!(store.is_empty());
        assert_eq!(store.elevation(Coord { x: 30.5, y: 59.5 }), None);
    }

    #[test]
    fn test_bad_entries_are_skipped() {
        let archive = fixtures::zip_archive(&[
            ("tiles/n59e030.HGT", fixtures::hgt_bytes(&vec![42; SIZE * SIZE])),
            ("tiles/N60E030.hgt", vec![0; 1000]),
            ("tiles/bogus.hgt", vec![0; 8]),
            ("README.txt", b"not a tile".to_vec()),
        ]);
        let mut store = TileStore::new();
        let report = store.load_archive(&archive).unwrap();
        assert_eq!(
            report,
            LoadReport {
                loaded: 1,
                skipped: 2
            }
        );
        assert_eq!(store.elevation(Coord { x: 30.1, y: 59.9 }), Some(42.0));
        assert_eq!(store.elevation(Coord { x: 30.1, y: 60.1 }), None);
    }

    #[test]
    fn test_reload_replaces_contents() {
        let mut store = TileStore::new();
        store
            .load_archive(&fixtures::zip_archive(&[(
                "N59E030.hgt",
                fixtures::hgt_bytes(&[10; 9]),
            )]))
            .unwrap();
        store
            .load_archive(&fixtures::zip_archive(&[(
                "S01W072.hgt",
                fixtures::hgt_bytes(&[20; 9]),
            )]))
            .unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.elevation(Coord { x: 30.5, y: 59.5 }), None);
        assert_eq!(store.elevation(Coord { x: -71.5, y: -0.5 }), Some(20.0));
        assert!(store.tile(CellKey::new(-1, -72).unwrap()).is_some());
        assert_eq!(store.keys().collect::<Vec<_>>(), [CellKey::new(-1, -72).unwrap()]);
    }

    #[test]
    fn test_archive_without_height_files() {
        let mut store = TileStore::new();
        store
            .load_archive(&fixtures::zip_archive(&[(
                "N59E030.hgt",
                fixtures::hgt_bytes(&[10; 9]),
            )]))
            .unwrap();
        let err = store
            .load_archive(&fixtures::zip_archive(&[("README.txt", vec![1, 2, 3])]))
            .unwrap_err();
        assert!(matches!(err, TerrainError::NoTiles(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_archive_leaves_store_untouched() {
        let mut store = TileStore::new();
        store
            .load_archive(&fixtures::zip_archive(&[(
                "N59E030.hgt",
                fixtures::hgt_bytes(&[10; 9]),
            )]))
            .unwrap();
        let err = store.load_archive(b"definitely not a zip").unwrap_err();
        assert!(matches!(err, TerrainError::Zip(_)));
        assert_eq!(store.elevation(Coord { x: 30.5, y: 59.5 }), Some(10.0));
    }

    #[test]
    fn test_little_endian_entry() {
        let samples: Vec<i16> = (0..SIZE * SIZE).map(|i| 150 + (i % 50) as i16).collect();
        let raw: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut store = TileStore::new();
        store
            .load_archive(&fixtures::zip_archive(&[("N59E030.hgt", raw)]))
            .unwrap();
        let tile = store.tile(CellKey::new(59, 30).unwrap()).unwrap();
        assert_eq!(tile.endianness(), Endianness::Little);
        let elevation = store.elevation(Coord { x: 30.5, y: 59.5 }).unwrap();
        assert!((150.0..200.0).contains(&elevation));
    }

    #[test]
    fn test_world_edges_stay_in_range() {
        let store: TileStore = ["N89E179", "S90W180", "N89W180", "S90E179"]
            .iter()
            .map(|name| fixtures::flat_tile(name, 5))
            .collect();
        for (lat, lon) in [(90.0, 180.0), (-90.0, -180.0), (90.0, -180.0), (-90.0, 180.0)] {
            assert_eq!(store.elevation(Coord { x: lon, y: lat }), Some(5.0));
        }
        for i in 0..=20 {
            let lat = -90.0 + 9.0 * f64::from(i);
            let lon = -180.0 + 18.0 * f64::from(i);
            // Only needs to not panic; most cells are absent.
            let _ = store.elevation(Coord { x: lon, y: lat });
        }
    }

    #[test]
    fn test_load_dir() {
        let dir = std::env::temp_dir().join(format!("terrain-load-dir-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("N59E030.hgt"), fixtures::hgt_bytes(&[7; 9])).unwrap();
        std::fs::write(dir.join("notes.txt"), b"hello").unwrap();
        let mut store = TileStore::new();
        let report = store.load_dir(&dir).unwrap();
        std::fs::remove_dir_all(&dir).unwrap();
        assert_eq!(report.loaded, 1);
        assert_eq!(store.elevation(Coord { x: 30.5, y: 59.5 }), Some(7.0));
    }
}
