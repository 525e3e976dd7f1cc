use crate::PropahError;
use serde::{Deserialize, Serialize};
use terrain::{hgt::C, math::EARTH_RADIUS_M};

/// Tunable constants of the propagation model.
///
/// Every field has a default, so a config file only needs to name the
/// values it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PropagationConfig {
    /// Safety margin (dB) a link must hold above receiver sensitivity.
    pub design_margin_db: C,

    /// Effective Earth radius multiplier for atmospheric refraction.
    pub k_factor: C,

    /// Distance (m) beyond which environmental excess loss applies.
    pub excess_break_m: C,

    /// Both antennas below this height (m) count as near-ground.
    pub near_ground_height_m: C,

    /// Path-loss exponent for near-ground links.
    pub near_ground_exponent: C,

    /// Path-loss exponent for everything else; 2.0 adds no excess.
    pub free_space_exponent: C,

    /// Obstructions with a diffraction parameter at or below this are
    /// ignored.
    pub deygout_v_cutoff: C,

    /// Path segments this short (m) or shorter contribute no
    /// diffraction loss.
    pub deygout_min_span_m: C,

    /// Maximum recursion depth of the Deygout cascade.
    pub deygout_max_depth: u32,
}

impl Default for PropagationConfig {
    fn default() -> Self {
        Self {
            design_margin_db: 12.0,
            k_factor: 4.0 / 3.0,
            excess_break_m: 1000.0,
            near_ground_height_m: 10.0,
            near_ground_exponent: 3.3,
            free_space_exponent: 2.0,
            deygout_v_cutoff: -0.78,
            deygout_min_span_m: 5.0,
            deygout_max_depth: 20,
        }
    }
}

impl PropagationConfig {
    /// Parses a JSON config, filling missing fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, PropahError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Earth radius (m) scaled by the k-factor.
    pub fn effective_earth_radius_m(&self) -> C {
        EARTH_RADIUS_M * self.k_factor
    }

    /// Path-loss exponent for antennas at the given heights above
    /// ground.
    pub fn path_loss_exponent(&self, tx_height_m: C, rx_height_m: C) -> C {
        if tx_height_m < self.near_ground_height_m && rx_height_m < self.near_ground_height_m {
            self.near_ground_exponent
        } else {
            self.free_space_exponent
        }
    }
}
