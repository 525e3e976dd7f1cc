//! Point-to-point link budgets between nodes.

use crate::{
    diffraction::{deygout_loss, Endpoint},
    Node, PropagationConfig, Receiver, Transmitter,
};
use log::debug;
use rayon::prelude::*;
use terrain::{hgt::C, Profile, ProfileSample, TileStore, DEFAULT_STEP_M};

/// Free-space path loss constant for km and MHz.
pub const FSPL_CONST_DB: C = 32.45;

/// Free-space path loss (dB). Distance is floored at 1 m and
/// frequency at 1 MHz.
pub fn free_space_loss(distance_m: C, freq_mhz: C) -> C {
    let distance_km = distance_m.max(1.0) / 1000.0;
    FSPL_CONST_DB + 20.0 * distance_km.log10() + 20.0 * freq_mhz.max(1.0).log10()
}

/// Environmental excess loss (dB) beyond the break distance for
/// antennas at the given heights above ground.
pub fn excess_loss(distance_m: C, tx_height_m: C, rx_height_m: C, config: &PropagationConfig) -> C {
    let exponent = config.path_loss_exponent(tx_height_m, rx_height_m);
    if !(distance_m > config.excess_break_m) || exponent <= 2.0 {
        return 0.0;
    }
    10.0 * (exponent - 2.0) * (distance_m / config.excess_break_m).log10()
}

/// Loss terms and resulting margin of one link direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkBudget {
    pub free_space_db: C,
    pub diffraction_db: C,
    pub excess_db: C,
    pub rx_power_dbm: C,
    /// Received power over sensitivity, less the design margin.
    pub margin_db: C,
}

impl LinkBudget {
    /// Evaluates a link over `distance_m`.
    ///
    /// `tx_alt_m` and `rx_alt_m` are absolute antenna heights.
    /// `profile` holds the terrain between them, the transmitter at
    /// distance 0.
    pub fn evaluate(
        tx: &Transmitter,
        tx_alt_m: C,
        rx: &Receiver,
        rx_alt_m: C,
        distance_m: C,
        profile: &[ProfileSample],
        config: &PropagationConfig,
    ) -> Self {
        let free_space_db = free_space_loss(distance_m, tx.freq_mhz);
        let diffraction_db = deygout_loss(
            profile,
            Endpoint {
                distance_m: 0.0,
                height_m: tx_alt_m,
            },
            Endpoint {
                distance_m,
                height_m: rx_alt_m,
            },
            tx.freq_mhz,
            config,
        );
        let excess_db = excess_loss(distance_m, tx.height_m, rx.height_m, config);
        let rx_power_dbm =
            tx.power_dbm + tx.gain_dbi + rx.gain_dbi - (free_space_db + diffraction_db + excess_db);
        Self {
            free_space_db,
            diffraction_db,
            excess_db,
            rx_power_dbm,
            margin_db: rx_power_dbm - rx.sensitivity_dbm - config.design_margin_db,
        }
    }
}

/// Link budget from `a` transmitting to `b` receiving over terrain.
///
/// Returns `None` when the nodes are not a positive distance apart.
pub fn link_budget(
    tiles: &TileStore,
    a: &Node,
    b: &Node,
    config: &PropagationConfig,
) -> Option<LinkBudget> {
    let profile = Profile::new(a.position, DEFAULT_STEP_M, b.position, tiles);
    if !(profile.distance_m > 0.0) {
        return None;
    }
    let tx = a.radio.normalized().transmitter();
    let rx = b.radio.normalized().receiver();
    Some(LinkBudget::evaluate(
        &tx,
        a.ground_m(tiles) + tx.height_m,
        &rx,
        b.ground_m(tiles) + rx.height_m,
        profile.distance_m,
        &profile.samples,
        config,
    ))
}

/// Margin (dB) of `a` transmitting to `b`, negative infinity for a
/// degenerate link.
pub fn residual_one_way(tiles: &TileStore, a: &Node, b: &Node, config: &PropagationConfig) -> C {
    link_budget(tiles, a, b, config).map_or(C::NEG_INFINITY, |budget| budget.margin_db)
}

/// Margins in both directions between two nodes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkReport {
    pub forward_db: C,
    pub reverse_db: C,
}

impl LinkReport {
    /// Both directions close with a finite, non-negative margin.
    pub fn is_usable(&self) -> bool {
        [self.forward_db, self.reverse_db]
            .iter()
            .all(|m| m.is_finite() && *m >= 0.0)
    }
}

pub fn evaluate_link(tiles: &TileStore, a: &Node, b: &Node, config: &PropagationConfig) -> LinkReport {
    LinkReport {
        forward_db: residual_one_way(tiles, a, b, config),
        reverse_db: residual_one_way(tiles, b, a, config),
    }
}

/// A usable pair of nodes, by index.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsableLink {
    pub a: usize,
    pub b: usize,
    pub report: LinkReport,
}

/// Every pair of `nodes` whose link is usable in both directions.
pub fn usable_links(tiles: &TileStore, nodes: &[Node], config: &PropagationConfig) -> Vec<UsableLink> {
    let now = std::time::Instant::now();
    let pairs: Vec<(usize, usize)> = (0..nodes.len())
        .flat_map(|a| (a + 1..nodes.len()).map(move |b| (a, b)))
        .collect();
    let links: Vec<UsableLink> = pairs
        .par_iter()
        .filter_map(|&(a, b)| {
            let report = evaluate_link(tiles, &nodes[a], &nodes[b], config);
            report.is_usable().then_some(UsableLink { a, b, report })
        })
        .collect();
    debug!(
        "links; nodes: {}, pairs: {}, usable: {}, exec: {:?}",
        nodes.len(),
        pairs.len(),
        links.len(),
        now.elapsed()
    );
    links
}
