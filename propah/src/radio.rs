use geo::geometry::Coord;
use serde::{Deserialize, Serialize};
use terrain::{hgt::C, TileStore};

/// Radio parameters of a node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Radio {
    /// Carrier frequency in MHz.
    pub freq_mhz: C,
    pub tx_power_dbm: C,
    pub tx_gain_dbi: C,
    pub rx_gain_dbi: C,
    pub rx_sensitivity_dbm: C,

    /// Transmit antenna height above ground (m).
    pub tx_height_m: C,

    /// Receive antenna height above ground (m).
    pub rx_height_m: C,
}

impl Default for Radio {
    fn default() -> Self {
        Self {
            freq_mhz: 433.0,
            tx_power_dbm: 14.0,
            tx_gain_dbi: 0.0,
            rx_gain_dbi: 0.0,
            rx_sensitivity_dbm: -123.0,
            tx_height_m: 1.5,
            rx_height_m: 1.5,
        }
    }
}

impl Radio {
    /// Sets the carrier frequency from a value in Hz.
    #[must_use]
    pub fn with_freq_hz(mut self, freq_hz: C) -> Self {
        self.freq_mhz = freq_hz / 1e6;
        self
    }

    /// Replaces non-finite fields with their defaults. Frequency must
    /// also be positive and antenna heights non-negative.
    #[must_use]
    pub fn normalized(self) -> Self {
        let d = Self::default();
        let finite = |v: C, dflt: C| if v.is_finite() { v } else { dflt };
        let height = |v: C, dflt: C| if v.is_finite() && v >= 0.0 { v } else { dflt };
        Self {
            freq_mhz: if self.freq_mhz.is_finite() && self.freq_mhz > 0.0 {
                self.freq_mhz
            } else {
                d.freq_mhz
            },
            tx_power_dbm: finite(self.tx_power_dbm, d.tx_power_dbm),
            tx_gain_dbi: finite(self.tx_gain_dbi, d.tx_gain_dbi),
            rx_gain_dbi: finite(self.rx_gain_dbi, d.rx_gain_dbi),
            rx_sensitivity_dbm: finite(self.rx_sensitivity_dbm, d.rx_sensitivity_dbm),
            tx_height_m: height(self.tx_height_m, d.tx_height_m),
            rx_height_m: height(self.rx_height_m, d.rx_height_m),
        }
    }

    pub fn transmitter(&self) -> Transmitter {
        Transmitter {
            freq_mhz: self.freq_mhz,
            power_dbm: self.tx_power_dbm,
            gain_dbi: self.tx_gain_dbi,
            height_m: self.tx_height_m,
        }
    }

    pub fn receiver(&self) -> Receiver {
        Receiver {
            gain_dbi: self.rx_gain_dbi,
            sensitivity_dbm: self.rx_sensitivity_dbm,
            height_m: self.rx_height_m,
        }
    }

    /// Receiver built from this radio's fields, taking each unusable one
    /// from `fallback` instead of from the defaults.
    pub fn receiver_or(&self, fallback: &Receiver) -> Receiver {
        let finite = |v: C, dflt: C| if v.is_finite() { v } else { dflt };
        Receiver {
            gain_dbi: finite(self.rx_gain_dbi, fallback.gain_dbi),
            sensitivity_dbm: finite(self.rx_sensitivity_dbm, fallback.sensitivity_dbm),
            height_m: if self.rx_height_m.is_finite() && self.rx_height_m >= 0.0 {
                self.rx_height_m
            } else {
                fallback.height_m
            },
        }
    }
}

/// Transmitting side of a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transmitter {
    pub freq_mhz: C,
    pub power_dbm: C,
    pub gain_dbi: C,
    /// Antenna height above ground (m).
    pub height_m: C,
}

/// Receiving side of a link.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Receiver {
    pub gain_dbi: C,
    pub sensitivity_dbm: C,
    /// Antenna height above ground (m).
    pub height_m: C,
}

/// A deployed radio at a fixed location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub position: Coord<C>,

    /// Known ground elevation at `position` (m). Looked up from tiles
    /// when absent.
    #[serde(default)]
    pub elevation_m: Option<C>,

    #[serde(default)]
    pub radio: Radio,
}

impl Node {
    pub fn new(position: Coord<C>, radio: Radio) -> Self {
        Self {
            position,
            elevation_m: None,
            radio: radio.normalized(),
        }
    }

    #[must_use]
    pub fn with_elevation(mut self, meters: C) -> Self {
        self.elevation_m = Some(meters);
        self
    }

    /// Ground elevation under the node, 0 when unknown.
    pub fn ground_m(&self, tiles: &TileStore) -> C {
        self.elevation_m
            .filter(|m| m.is_finite())
            .or_else(|| tiles.elevation(self.position))
            .unwrap_or(0.0)
    }
}
