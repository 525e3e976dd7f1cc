use crate::{
    math::{segment_count, GreatCircle},
    TileStore,
};
use geo::geometry::Coord;
use hgt::C;

/// Spacing (m) between terrain samples when checking line of sight.
pub const LOS_STEP_M: C = 30.0;

/// Terrain must rise this far (m) above the sight line to block it.
pub const LOS_CLEARANCE_M: C = 2.0;

/// Returns true if the straight line between antennas `height_a_m`
/// above ground at `a` and `height_b_m` above ground at `b` clears
/// the terrain.
///
/// Earth curvature and Fresnel clearance are ignored. Unknown ground
/// counts as 0 m at the endpoints and as unobstructed in between.
pub fn line_of_sight(
    tiles: &TileStore,
    a: Coord<C>,
    height_a_m: C,
    b: Coord<C>,
    height_b_m: C,
) -> bool {
    let route = GreatCircle::new(a, b);
    let distance_m = route.distance_m();
    if !(distance_m > 0.0) {
        return true;
    }

    let start_alt_m = tiles.elevation(a).unwrap_or(0.0) + finite_or_zero(height_a_m);
    let end_alt_m = tiles.elevation(b).unwrap_or(0.0) + finite_or_zero(height_b_m);

    let segments = segment_count(distance_m, LOS_STEP_M);
    route
        .steps(segments)
        .skip(1)
        .take(segments - 1)
        .all(|(step_m, coord)| match tiles.elevation(coord) {
            None => true,
            Some(ground_m) => {
                let sight_m = start_alt_m + (end_alt_m - start_alt_m) * (step_m / distance_m);
                ground_m <= sight_m + LOS_CLEARANCE_M
            }
        })
}

fn finite_or_zero(meters: C) -> C {
    if meters.is_finite() {
        meters
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::line_of_sight;
    use crate::{fixtures, TileStore};
    use geo::geometry::Coord;

    // Meridian through grid point (row 600, col 600) of N59E030.
    const SOUTH: Coord = Coord { x: 30.5, y: 59.4 };
    const NORTH: Coord = Coord { x: 30.5, y: 59.6 };

    #[test]
    fn test_flat_terrain_is_visible() {
        let tiles: TileStore = [fixtures::flat_tile("N59E030", 100)].into_iter().collect();
        assert!(line_of_sight(&tiles, SOUTH, 2.0, NORTH, 2.0));
        assert!(line_of_sight(
            &tiles,
            Coord { x: 30.01, y: 59.01 },
            2.0,
            Coord { x: 30.99, y: 59.99 },
            2.0
        ));
    }

    #[test]
    fn test_single_obstruction_blocks() {
        let tiles: TileStore = [fixtures::tile_with("N59E030", 100, &[(600, 600, 1000)])]
            .into_iter()
            .collect();
        assert!(!line_of_sight(&tiles, SOUTH, 10.0, NORTH, 10.0));
        // Passing well east of the obstruction.
        assert!(line_of_sight(
            &tiles,
            Coord { x: 30.6, y: 59.4 },
            10.0,
            Coord { x: 30.6, y: 59.6 },
            10.0
        ));
        // Masts tall enough to clear it.
        assert!(line_of_sight(&tiles, SOUTH, 1000.0, NORTH, 1000.0));
    }

    #[test]
    fn test_clearance_margin() {
        // Ground 1 m above a line 0 m above ground at both ends stays
        // within the clearance margin.
        let tiles: TileStore = [fixtures::tile_with("N59E030", 100, &[(600, 600, 101)])]
            .into_iter()
            .collect();
        assert!(line_of_sight(&tiles, SOUTH, 0.0, NORTH, 0.0));
        let tiles: TileStore = [fixtures::tile_with("N59E030", 100, &[(600, 600, 103)])]
            .into_iter()
            .collect();
        assert!(!line_of_sight(&tiles, SOUTH, 0.0, NORTH, 0.0));
    }

    #[test]
    fn test_degenerate_inputs() {
        let tiles = TileStore::new();
        assert!(line_of_sight(&tiles, SOUTH, 1.0, SOUTH, 1.0));
        assert!(line_of_sight(&tiles, SOUTH, f64::NAN, NORTH, 1.0));
        let nan = Coord {
            x: f64::NAN,
            y: 59.5,
        };
        assert!(line_of_sight(&tiles, nan, 1.0, NORTH, 1.0));
    }

    #[test]
    fn test_missing_terrain_is_optimistic() {
        // N59E031 is absent, the path crosses it with unknown ground.
        let tiles: TileStore = [
            fixtures::flat_tile("N59E030", 100),
            fixtures::flat_tile("N59E032", 100),
        ]
        .into_iter()
        .collect();
        assert!(line_of_sight(
            &tiles,
            Coord { x: 30.99, y: 59.5 },
            1.0,
            Coord { x: 32.01, y: 59.5 },
            1.0
        ));
    }
}
