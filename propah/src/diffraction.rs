//! Knife-edge diffraction over terrain profiles.

use crate::PropagationConfig;
use terrain::{hgt::C, ProfileSample};

/// Speed of light in m/s
const SPEED_OF_LIGHT: C = 299_792_458.0;

/// Returns wavelength (m) for a frequency in MHz.
pub fn freq_to_wavelen(freq_mhz: C) -> C {
    SPEED_OF_LIGHT / (freq_mhz * 1e6)
}

/// Apparent rise (m) of the Earth's surface between two points
/// `d1_m` and `d2_m` from the ends of a path.
pub fn earth_bulge(d1_m: C, d2_m: C, effective_radius_m: C) -> C {
    d1_m * d2_m / (2.0 * effective_radius_m)
}

/// Fresnel-Kirchhoff diffraction parameter `v` of an obstruction
/// `h_m` above the direct path.
///
/// Returns negative infinity when the obstruction is not strictly
/// between the path ends.
pub fn diffraction_parameter(h_m: C, d1_m: C, d2_m: C, wavelen_m: C) -> C {
    if d1_m <= 0.0 || d2_m <= 0.0 {
        return C::NEG_INFINITY;
    }
    h_m * (2.0 / wavelen_m * (d1_m + d2_m) / (d1_m * d2_m)).sqrt()
}

/// Single knife-edge loss (dB) approximation for `v > -0.78`.
pub fn knife_edge_loss(v: C) -> C {
    let x = v - 0.1;
    6.9 + 20.0 * ((x * x + 1.0).sqrt() + x).log10()
}

/// Antenna or edge position in a path's vertical plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Endpoint {
    /// Distance along the path in meters.
    pub distance_m: C,

    /// Absolute height in meters.
    pub height_m: C,
}

/// Deygout multiple knife-edge diffraction loss (dB) between `start`
/// and `end`.
///
/// `profile` must be sorted by distance. Only samples strictly
/// between the endpoints are considered, and samples without terrain
/// never obstruct. The result is finite and non-negative.
pub fn deygout_loss(
    profile: &[ProfileSample],
    start: Endpoint,
    end: Endpoint,
    freq_mhz: C,
    config: &PropagationConfig,
) -> C {
    let cascade = Cascade {
        profile,
        wavelen_m: freq_to_wavelen(freq_mhz),
        effective_radius_m: config.effective_earth_radius_m(),
        config,
    };
    let loss = cascade.loss(start, end, 0);
    if loss.is_finite() && loss > 0.0 {
        loss
    } else {
        0.0
    }
}

struct Cascade<'a> {
    profile: &'a [ProfileSample],
    wavelen_m: C,
    effective_radius_m: C,
    config: &'a PropagationConfig,
}

impl Cascade<'_> {
    fn loss(&self, start: Endpoint, end: Endpoint, depth: u32) -> C {
        if depth > self.config.deygout_max_depth {
            return 0.0;
        }
        if !(end.distance_m - start.distance_m > self.config.deygout_min_span_m) {
            return 0.0;
        }
        let Some((edge, v)) = self.dominant_edge(start, end) else {
            return 0.0;
        };
        if v <= self.config.deygout_v_cutoff {
            return 0.0;
        }
        knife_edge_loss(v) + self.loss(start, edge, depth + 1) + self.loss(edge, end, depth + 1)
    }

    /// Interior obstruction with the greatest diffraction parameter.
    fn dominant_edge(&self, start: Endpoint, end: Endpoint) -> Option<(Endpoint, C)> {
        let lo = self
            .profile
            .partition_point(|s| s.distance_m <= start.distance_m);
        let hi = self
            .profile
            .partition_point(|s| s.distance_m < end.distance_m);
        let span_m = end.distance_m - start.distance_m;

        let mut best: Option<(Endpoint, C)> = None;
        for sample in self.profile.get(lo..hi)? {
            let Some(ground_m) = sample.elevation_m else {
                continue;
            };
            let d1_m = sample.distance_m - start.distance_m;
            let d2_m = end.distance_m - sample.distance_m;
            let line_m = start.height_m + (end.height_m - start.height_m) * d1_m / span_m;
            let h_m = ground_m + earth_bulge(d1_m, d2_m, self.effective_radius_m) - line_m;
            let v = diffraction_parameter(h_m, d1_m, d2_m, self.wavelen_m);
            if best.map_or(true, |(_, best_v)| v > best_v) {
                let edge = Endpoint {
                    distance_m: sample.distance_m,
                    height_m: ground_m,
                };
                best = Some((edge, v));
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const FREQ_MHZ: C = 433.0;

    /// Ground at 0 m every 100 m from 0 to 1000 m, with overrides.
    fn profile(overrides: &[(usize, Option<C>)]) -> Vec<ProfileSample> {
        let mut samples: Vec<ProfileSample> = (0..=10)
            .map(|i| ProfileSample {
                distance_m: i as C * 100.0,
                elevation_m: Some(0.0),
            })
            .collect();
        for &(i, elevation_m) in overrides {
            samples[i].elevation_m = elevation_m;
        }
        samples
    }

    fn ends(height_m: C) -> (Endpoint, Endpoint) {
        (
            Endpoint {
                distance_m: 0.0,
                height_m,
            },
            Endpoint {
                distance_m: 1000.0,
                height_m,
            },
        )
    }

    #[test]
    fn test_wavelength() {
        assert_relative_eq!(freq_to_wavelen(433.0), 0.692_361, epsilon = 1e-6);
    }

    #[test]
    fn test_knife_edge_loss() {
        assert_relative_eq!(knife_edge_loss(0.0), 6.03, epsilon = 0.01);
        assert!(knife_edge_loss(1.0) > knife_edge_loss(0.0));
    }

    #[test]
    fn test_clear_path_has_no_loss() {
        let (start, end) = ends(10.0);
        let config = PropagationConfig::default();
        assert_eq!(deygout_loss(&profile(&[]), start, end, FREQ_MHZ, &config), 0.0);
        assert_eq!(deygout_loss(&[], start, end, FREQ_MHZ, &config), 0.0);
    }

    #[test]
    fn test_single_edge() {
        let config = PropagationConfig::default();
        let (start, end) = ends(10.0);
        let loss = deygout_loss(&profile(&[(5, Some(20.0))]), start, end, FREQ_MHZ, &config);

        let bulge = earth_bulge(500.0, 500.0, config.effective_earth_radius_m());
        let v = diffraction_parameter(20.0 + bulge - 10.0, 500.0, 500.0, freq_to_wavelen(FREQ_MHZ));
        assert_relative_eq!(loss, knife_edge_loss(v), max_relative = 1e-12);
        assert_relative_eq!(loss, 14.41, epsilon = 0.05);
    }

    #[test]
    fn test_secondary_edges() {
        let config = PropagationConfig::default();
        let (start, end) = ends(10.0);
        let samples = profile(&[(3, Some(25.0)), (7, Some(25.0))]);
        let cascade = deygout_loss(&samples, start, end, FREQ_MHZ, &config);

        let shallow = PropagationConfig {
            deygout_max_depth: 0,
            ..PropagationConfig::default()
        };
        let main_only = deygout_loss(&samples, start, end, FREQ_MHZ, &shallow);
        assert!(main_only > 0.0);
        assert!(cascade > main_only);
    }

    #[test]
    fn test_missing_terrain_never_obstructs() {
        let config = PropagationConfig::default();
        let (start, end) = ends(10.0);
        let loss = deygout_loss(&profile(&[(5, None)]), start, end, FREQ_MHZ, &config);
        assert_eq!(loss, 0.0);
    }

    #[test]
    fn test_short_span() {
        let config = PropagationConfig::default();
        let samples = [ProfileSample {
            distance_m: 2.0,
            elevation_m: Some(100.0),
        }];
        let start = Endpoint {
            distance_m: 0.0,
            height_m: 0.0,
        };
        let end = Endpoint {
            distance_m: 5.0,
            height_m: 0.0,
        };
        assert_eq!(deygout_loss(&samples, start, end, FREQ_MHZ, &config), 0.0);
    }
}
