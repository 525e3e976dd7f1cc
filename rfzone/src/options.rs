use anyhow::{anyhow, bail, Error as AnyError};
use clap::{Args, Parser, Subcommand, ValueEnum};
use geo::geometry::Coord;
use propah::Radio;
use std::{path::PathBuf, str::FromStr};

/// Terrain-aware radio link and coverage estimates.
#[derive(Parser, Debug, Clone)]
pub struct Cli {
    /// Zip archive or directory of .hgt elevation tiles.
    #[arg(short, long)]
    pub tiles: PathBuf,

    /// JSON file overriding propagation model constants.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Print ground elevation at a point.
    Elevation {
        /// Location "lat,lon".
        #[arg(long, allow_hyphen_values = true)]
        at: LatLon,
    },

    /// Print the terrain profile between two points.
    Profile {
        /// Start "lat,lon".
        #[arg(long, allow_hyphen_values = true)]
        start: LatLon,

        /// Destination "lat,lon".
        #[arg(long, allow_hyphen_values = true)]
        dest: LatLon,

        /// Maximum path incremental step size, in meters.
        #[arg(short, long, default_value_t = 30.0)]
        max_step: f64,

        #[arg(short, long, value_enum, default_value_t = ProfileFormat::Csv)]
        format: ProfileFormat,
    },

    /// Check line of sight between two antennas.
    Los {
        /// Start "lat,lon,alt", where 'alt' is meters above ground.
        #[arg(long, allow_hyphen_values = true)]
        start: LatLonAlt,

        /// Destination "lat,lon,alt", where 'alt' is meters above ground.
        #[arg(long, allow_hyphen_values = true)]
        dest: LatLonAlt,
    },

    /// Print link margins in both directions between two nodes.
    Link {
        /// First node "lat,lon".
        #[arg(long, allow_hyphen_values = true)]
        a: LatLon,

        /// Second node "lat,lon".
        #[arg(long, allow_hyphen_values = true)]
        b: LatLon,

        #[command(flatten)]
        radio: RadioArgs,
    },

    /// Trace radial coverage around a transmitter.
    Coverage {
        /// Transmitter "lat,lon".
        #[arg(long, allow_hyphen_values = true)]
        origin: LatLon,

        /// Coverage radius in meters (1000 to 20000).
        #[arg(short, long, default_value_t = 20_000.0)]
        radius: f64,

        /// Known node "lat,lon[,rx_height[,rx_gain[,sensitivity]]]"
        /// whose receiver is previewed on its bearing (repeatable).
        /// Omitted or empty fields take the --rx-* values.
        #[arg(long, allow_hyphen_values = true)]
        peer: Vec<Peer>,

        #[arg(short, long, value_enum, default_value_t = Format::Csv)]
        format: Format,

        #[command(flatten)]
        radio: RadioArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Csv,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ProfileFormat {
    Csv,
    Json,
    /// Plot to terminal.
    Plot,
}

/// Radio parameters shared by every node on the command line.
#[derive(Args, Debug, Clone, Copy)]
pub struct RadioArgs {
    /// Carrier frequency in Hz.
    #[arg(long, default_value_t = 433e6)]
    pub frequency: f64,

    /// Transmit power in dBm.
    #[arg(long, default_value_t = 14.0)]
    pub tx_power: f64,

    /// Transmit antenna gain in dBi.
    #[arg(long, default_value_t = 0.0)]
    pub tx_gain: f64,

    /// Receive antenna gain in dBi.
    #[arg(long, default_value_t = 0.0)]
    pub rx_gain: f64,

    /// Receiver sensitivity in dBm.
    #[arg(long, default_value_t = -123.0, allow_hyphen_values = true)]
    pub sensitivity: f64,

    /// Transmit antenna height above ground in meters.
    #[arg(long, default_value_t = 1.5)]
    pub tx_height: f64,

    /// Receive antenna height above ground in meters.
    #[arg(long, default_value_t = 1.5)]
    pub rx_height: f64,
}

impl From<RadioArgs> for Radio {
    fn from(args: RadioArgs) -> Self {
        Radio {
            freq_mhz: 0.0,
            tx_power_dbm: args.tx_power,
            tx_gain_dbi: args.tx_gain,
            rx_gain_dbi: args.rx_gain,
            rx_sensitivity_dbm: args.sensitivity,
            tx_height_m: args.tx_height,
            rx_height_m: args.rx_height,
        }
        .with_freq_hz(args.frequency)
        .normalized()
    }
}

#[derive(Clone, Debug, Copy)]
pub struct LatLon(pub Coord<f64>);

impl FromStr for LatLon {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (lat_str, lon_str) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("not a valid lat,lon"))?;
        let lat = f64::from_str(lat_str.trim())?;
        let lon = f64::from_str(lon_str.trim())?;
        Ok(Self(Coord { y: lat, x: lon }))
    }
}

/// A correspondent node and its own receiver settings.
#[derive(Clone, Debug, Copy, PartialEq)]
pub struct Peer {
    pub position: Coord<f64>,
    pub rx_height: Option<f64>,
    pub rx_gain: Option<f64>,
    pub sensitivity: Option<f64>,
}

impl Peer {
    /// `radio` with this peer's receiver fields swapped in.
    pub fn radio(&self, radio: Radio) -> Radio {
        Radio {
            rx_height_m: self.rx_height.unwrap_or(radio.rx_height_m),
            rx_gain_dbi: self.rx_gain.unwrap_or(radio.rx_gain_dbi),
            rx_sensitivity_dbm: self.sensitivity.unwrap_or(radio.rx_sensitivity_dbm),
            ..radio
        }
    }
}

impl FromStr for Peer {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let mut fields = s.splitn(3, ',');
        let (Some(lat_str), Some(lon_str)) = (fields.next(), fields.next()) else {
            bail!("not a valid lat,lon[,rx_height[,rx_gain[,sensitivity]]]");
        };
        let LatLon(position) = format!("{lat_str},{lon_str}").parse()?;
        let mut rest = fields.next().unwrap_or_default().split(',').map(str::trim);
        let mut next = || -> Result<Option<f64>, AnyError> {
            match rest.next() {
                None | Some("") => Ok(None),
                Some(v) => Ok(Some(f64::from_str(v)?)),
            }
        };
        let peer = Self {
            position,
            rx_height: next()?,
            rx_gain: next()?,
            sensitivity: next()?,
        };
        if rest.next().is_some() {
            bail!("too many fields in peer {s:?}");
        }
        Ok(peer)
    }
}

#[derive(Clone, Debug, Copy)]
pub struct LatLonAlt(pub Coord<f64>, pub f64);

impl FromStr for LatLonAlt {
    type Err = AnyError;
    fn from_str(s: &str) -> Result<Self, AnyError> {
        let (lat_lon_str, alt_str) = s
            .rsplit_once(',')
            .ok_or_else(|| anyhow!("not a valid lat,lon,alt"))?;
        let LatLon(coord) = lat_lon_str.parse()?;
        let alt = f64::from_str(alt_str.trim())?;
        Ok(Self(coord, alt))
    }
}
