mod options;

use anyhow::{bail, Error as AnyError};
use clap::Parser;
use log::{debug, info};
use options::{Cli, Command as CliCmd, Format, LatLon, LatLonAlt, ProfileFormat};
use propah::{
    evaluate_link, CoverageOptions, CoverageSample, CoverageSession, MarginClass, Node,
    PropagationConfig, Radio,
};
use serde::Serialize;
use std::{io::Write, path::Path};
use terrain::{line_of_sight, Profile, TileStore};
use textplots::{Chart, Plot, Shape};

fn main() -> Result<(), AnyError> {
    let Cli { tiles, config, cmd } = Cli::parse();

    env_logger::init();

    let tiles = load_tiles(&tiles)?;
    let config = match config {
        Some(path) => PropagationConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => PropagationConfig::default(),
    };

    match cmd {
        CliCmd::Elevation { at: LatLon(at) } => match tiles.elevation(at) {
            Some(elevation) => println!("{elevation:.1}"),
            None => println!("no data"),
        },
        CliCmd::Profile {
            start: LatLon(start),
            dest: LatLon(dest),
            max_step,
            format,
        } => {
            let profile = Profile::builder()
                .start(start)
                .max_step(max_step)
                .end(dest)
                .build(&tiles)?;
            match format {
                ProfileFormat::Csv => print_profile_csv(&profile)?,
                ProfileFormat::Json => print_profile_json(&profile)?,
                ProfileFormat::Plot => plot_ascii(&profile),
            }
        }
        CliCmd::Los {
            start: LatLonAlt(start, start_alt),
            dest: LatLonAlt(dest, dest_alt),
        } => {
            let visible = line_of_sight(&tiles, start, start_alt, dest, dest_alt);
            println!("{}", if visible { "visible" } else { "blocked" });
        }
        CliCmd::Link {
            a: LatLon(a),
            b: LatLon(b),
            radio,
        } => {
            let radio = Radio::from(radio);
            let a = Node::new(a, radio);
            let b = Node::new(b, radio);
            let report = evaluate_link(&tiles, &a, &b, &config);
            println!(
                "forward: {:.1} dB, reverse: {:.1} dB, usable: {}",
                report.forward_db,
                report.reverse_db,
                report.is_usable()
            );
        }
        CliCmd::Coverage {
            origin: LatLon(origin),
            radius,
            peer,
            format,
            radio,
        } => {
            let radio = Radio::from(radio);
            let peers: Vec<Node> = peer
                .into_iter()
                // Left unnormalized so bad fields fall back to the origin's
                // receiver, not to the defaults.
                .map(|peer| Node {
                    position: peer.position,
                    elevation_m: None,
                    radio: peer.radio(radio),
                })
                .collect();
            let mut session = CoverageSession::builder()
                .origin(&Node::new(origin, radio))
                .correspondents(&peers)
                .options(CoverageOptions {
                    radius_m: radius,
                    ..CoverageOptions::default()
                })
                .config(config)
                .build(&tiles)?;
            // Ring by ring, the way an animated renderer drives it.
            while !session.is_complete() {
                let target = session.last_distance() + session.step();
                session.extend(&tiles, target);
            }
            match format {
                Format::Csv => print_coverage_csv(&session)?,
                Format::Json => print_coverage_json(&session)?,
            }
            session.cancel();
        }
    }
    Ok(())
}

fn load_tiles(path: &Path) -> Result<TileStore, AnyError> {
    let mut tiles = TileStore::new();
    let report = if path.is_dir() {
        tiles.load_dir(path)?
    } else if path.is_file() {
        tiles.load_archive_file(path)?
    } else {
        bail!("{} is neither a tile archive nor a directory", path.display());
    };
    info!(
        "loaded {} tiles, skipped {} from {}",
        report.loaded,
        report.skipped,
        path.display()
    );
    let mut keys: Vec<String> = tiles.keys().map(|key| key.to_string()).collect();
    keys.sort_unstable();
    debug!("cells: {}", keys.join(" "));
    Ok(tiles)
}

/// # Example with gnuplot
///
/// ```sh
/// rfzone --tiles=tiles.zip profile --start=59.4,30.5 --dest=59.6,30.5 | tr ',' ' ' > /tmp/plot && gnuplot -p -e "plot '/tmp/plot' using 1:4 with lines"
/// ```
fn print_profile_csv(profile: &Profile) -> Result<(), AnyError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "Distance,Longitude,Latitude,Elevation")?;
    for (sample, point) in profile.samples.iter().zip(profile.great_circle.iter()) {
        let distance = sample.distance_m;
        let longitude = point.x;
        let latitude = point.y;
        let elevation = sample.elevation_m.map(|e| e.to_string()).unwrap_or_default();
        writeln!(stdout, "{distance},{longitude},{latitude},{elevation}")?;
    }
    Ok(())
}

fn print_profile_json(profile: &Profile) -> Result<(), AnyError> {
    #[derive(Serialize)]
    struct JsonEntry {
        distance: f64,
        location: [f64; 2],
        elevation: Option<f64>,
    }

    let reshaped: Vec<JsonEntry> = profile
        .samples
        .iter()
        .zip(profile.great_circle.iter())
        .map(|(sample, point)| JsonEntry {
            distance: sample.distance_m,
            location: [point.x, point.y],
            elevation: sample.elevation_m,
        })
        .collect();
    let json = serde_json::to_string(&reshaped)?;
    println!("{json}");
    Ok(())
}

fn plot_ascii(profile: &Profile) {
    #[allow(clippy::cast_possible_truncation)]
    let plot_data: Vec<(f32, f32)> = profile
        .samples
        .iter()
        .filter_map(|s| Some((s.distance_m as f32, s.elevation_m? as f32)))
        .collect();
    #[allow(clippy::cast_possible_truncation)]
    Chart::new(300, 150, 0.0, profile.distance_m as f32)
        .lineplot(&Shape::Lines(&plot_data))
        .display();
}

fn print_coverage_csv(session: &CoverageSession) -> Result<(), AnyError> {
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "Sector,Azimuth,Distance,Longitude,Latitude,Elevation,Margin,Class")?;
    for sector in 0..session.sector_count() {
        let azimuth = session.azimuth(sector).unwrap_or_default();
        for sample in session.sector(sector).unwrap_or_default() {
            let CoverageSample {
                distance_m,
                position,
                ground_m,
                margin_db,
            } = sample;
            let elevation = ground_m.map(|e| e.to_string()).unwrap_or_default();
            let class = class_name(sample.class());
            writeln!(
                stdout,
                "{sector},{azimuth},{distance_m},{},{},{elevation},{margin_db:.2},{class}",
                position.x, position.y
            )?;
        }
    }
    Ok(())
}

fn print_coverage_json(session: &CoverageSession) -> Result<(), AnyError> {
    #[derive(Serialize)]
    struct JsonSector<'a> {
        sector: usize,
        azimuth: f64,
        stopped: bool,
        samples: Vec<JsonSample<'a>>,
    }

    #[derive(Serialize)]
    struct JsonSample<'a> {
        #[serde(flatten)]
        sample: &'a CoverageSample,
        class: MarginClass,
    }

    let sectors: Vec<JsonSector> = (0..session.sector_count())
        .map(|sector| JsonSector {
            sector,
            azimuth: session.azimuth(sector).unwrap_or_default(),
            stopped: session.is_stopped(sector),
            samples: session
                .sector(sector)
                .unwrap_or_default()
                .iter()
                .map(|sample| JsonSample {
                    sample,
                    class: sample.class(),
                })
                .collect(),
        })
        .collect();
    let json = serde_json::to_string(&sectors)?;
    println!("{json}");
    Ok(())
}

fn class_name(class: MarginClass) -> &'static str {
    match class {
        MarginClass::NoData => "no_data",
        MarginClass::Blocked => "blocked",
        MarginClass::Marginal => "marginal",
        MarginClass::Good => "good",
        MarginClass::Strong => "strong",
    }
}
