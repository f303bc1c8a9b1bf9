//! Economic production limits.
//!
//! Once per report step producers are checked against their minimum-rate and
//! maximum-ratio limits. Violations shut or stop whole wells, or close the
//! worst offending connection.

use crate::error::{WellError, WellResult};
use crate::logger::DeferredLogger;
use crate::well::Wells;
use crate::well_state::WellState;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use wf_fluids::Phase;

/// Quantity the limits are evaluated on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityLimit {
    #[default]
    Rate,
    /// Evaluate against potentials; currently treated as rate with a warning
    Potential,
}

fn yes() -> bool {
    true
}

/// Economic limits of one producer. Rates are surface rates [m³/s].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconLimits {
    #[serde(default)]
    pub min_oil_rate: Option<f64>,
    #[serde(default)]
    pub min_gas_rate: Option<f64>,
    #[serde(default)]
    pub min_liquid_rate: Option<f64>,
    #[serde(default)]
    pub min_reservoir_fluid_rate: Option<f64>,
    #[serde(default)]
    pub max_water_cut: Option<f64>,
    #[serde(default)]
    pub max_gas_oil_ratio: Option<f64>,
    #[serde(default)]
    pub max_water_gas_ratio: Option<f64>,
    #[serde(default)]
    pub max_gas_liquid_ratio: Option<f64>,
    #[serde(default)]
    pub quantity_limit: QuantityLimit,
    #[serde(default)]
    pub end_run: bool,
    #[serde(default)]
    pub follow_on_well: Option<String>,
    /// Shut the well (close it to the reservoir) rather than stop it at surface
    #[serde(default = "yes")]
    pub automatic_shut_in: bool,
}

impl Default for EconLimits {
    fn default() -> Self {
        Self {
            min_oil_rate: None,
            min_gas_rate: None,
            min_liquid_rate: None,
            min_reservoir_fluid_rate: None,
            max_water_cut: None,
            max_gas_oil_ratio: None,
            max_water_gas_ratio: None,
            max_gas_liquid_ratio: None,
            quantity_limit: QuantityLimit::Rate,
            end_run: false,
            follow_on_well: None,
            automatic_shut_in: true,
        }
    }
}

impl EconLimits {
    pub fn on_any_rate_limit(&self) -> bool {
        self.min_oil_rate.is_some()
            || self.min_gas_rate.is_some()
            || self.min_liquid_rate.is_some()
            || self.min_reservoir_fluid_rate.is_some()
    }

    pub fn on_any_ratio_limit(&self) -> bool {
        self.max_water_cut.is_some()
            || self.max_gas_oil_ratio.is_some()
            || self.max_water_gas_ratio.is_some()
            || self.max_gas_liquid_ratio.is_some()
    }

    pub fn on_any_effective_limit(&self) -> bool {
        self.on_any_rate_limit() || self.on_any_ratio_limit()
    }
}

/// Economic limits per well, each taking effect from a report step onwards.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EconSchedule {
    limits: BTreeMap<String, BTreeMap<usize, EconLimits>>,
}

impl EconSchedule {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, well: impl Into<String>, from_step: usize, limits: EconLimits) {
        self.limits
            .entry(well.into())
            .or_default()
            .insert(from_step, limits);
    }

    pub fn with(mut self, well: impl Into<String>, from_step: usize, limits: EconLimits) -> Self {
        self.set(well, from_step, limits);
        self
    }

    /// Limits in effect for `well` at `step`.
    pub fn limits_at(&self, well: &str, step: usize) -> Option<&EconLimits> {
        self.limits
            .get(well)?
            .range(..=step)
            .next_back()
            .map(|(_, l)| l)
    }
}

/// Wells and connections closed by economic limits.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EconLimitedList {
    shut: BTreeSet<String>,
    stopped: BTreeSet<String>,
    closed_connections: BTreeMap<String, Vec<usize>>,
}

impl EconLimitedList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_shut_well(&mut self, well: &str) {
        self.shut.insert(well.to_owned());
    }

    pub fn add_stopped_well(&mut self, well: &str) {
        self.stopped.insert(well.to_owned());
    }

    /// Record the cell of a closed connection.
    pub fn add_closed_connection(&mut self, well: &str, cell: usize) {
        let cells = self.closed_connections.entry(well.to_owned()).or_default();
        if !cells.contains(&cell) {
            cells.push(cell);
        }
    }

    pub fn well_shut(&self, well: &str) -> bool {
        self.shut.contains(well)
    }

    pub fn well_stopped(&self, well: &str) -> bool {
        self.stopped.contains(well)
    }

    pub fn closed_connections(&self, well: &str) -> &[usize] {
        self.closed_connections
            .get(well)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn shut_wells(&self) -> impl Iterator<Item = &str> {
        self.shut.iter().map(String::as_str)
    }

    pub fn stopped_wells(&self) -> impl Iterator<Item = &str> {
        self.stopped.iter().map(String::as_str)
    }
}

/// Worst offending connection for a violated ratio limit.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RatioViolation {
    /// No other open connection remains in the well
    pub last_connection: bool,
    /// Position within the well's open connections
    pub worst_offending_connection: usize,
    /// Offending value divided by the limit
    pub violation_extent: f64,
}

fn ratio(num: f64, den: f64) -> f64 {
    if den.abs() != 0.0 { num / den } else { 0.0 }
}

/// Whether any minimum-rate limit is violated by the well rates.
pub fn check_rate_limits(
    limits: &EconLimits,
    rates: &[f64; 3],
    logger: &mut DeferredLogger,
) -> bool {
    let oil = rates[Phase::Oil.index()];
    let gas = rates[Phase::Gas.index()];
    let water = rates[Phase::Water.index()];
    if limits.min_oil_rate.is_some_and(|min| oil.abs() < min) {
        return true;
    }
    if limits.min_gas_rate.is_some_and(|min| gas.abs() < min) {
        return true;
    }
    if limits.min_liquid_rate.is_some_and(|min| (oil + water).abs() < min) {
        return true;
    }
    if limits.min_reservoir_fluid_rate.is_some() {
        logger.warning(
            "NOT_SUPPORTING_MIN_RESERVOIR_FLUID_RATE",
            "Minimum reservoir fluid production rate limit is not supported yet",
        );
    }
    false
}

/// Water cuts `water / (oil + water)` per connection, zero without liquid.
pub fn connection_water_cuts(conn_rates: &[[f64; 3]]) -> Vec<f64> {
    conn_rates
        .iter()
        .map(|q| {
            let water = q[Phase::Water.index()];
            ratio(water, q[Phase::Oil.index()] + water)
        })
        .collect()
}

/// Check the well water cut and locate the worst connection.
///
/// `conn_rates` are the rates of the well's open connections. Ties between
/// connections keep the first one found. A violation without any connection
/// of positive water cut (cross flow) cannot be acted on and is logged.
pub fn check_max_water_cut(
    limit: f64,
    well_rates: &[f64; 3],
    conn_rates: &[[f64; 3]],
    logger: &mut DeferredLogger,
) -> Option<RatioViolation> {
    let water = well_rates[Phase::Water.index()];
    let water_cut = ratio(water, well_rates[Phase::Oil.index()] + water);
    if water_cut <= limit || water_cut.is_nan() {
        return None;
    }
    let cuts = connection_water_cuts(conn_rates);
    if cuts.len() == 1 {
        return Some(RatioViolation {
            last_connection: true,
            worst_offending_connection: 0,
            violation_extent: cuts[0] / limit,
        });
    }
    let mut worst = None;
    let mut max_cut = 0.0;
    for (k, cut) in cuts.iter().enumerate() {
        if *cut > max_cut {
            worst = Some(k);
            max_cut = *cut;
        }
    }
    let Some(k) = worst else {
        logger.warning(
            "WATER_CUT_WITHOUT_OFFENDING_CONNECTION",
            format!(
                "water cut {water_cut:.4} exceeds the limit {limit} but no open connection \
                 has a positive water cut"
            ),
        );
        return None;
    };
    Some(RatioViolation {
        last_connection: false,
        worst_offending_connection: k,
        violation_extent: max_cut / limit,
    })
}

/// Check all ratio limits; among violated limits the largest extent wins.
pub fn check_ratio_limits(
    limits: &EconLimits,
    well_rates: &[f64; 3],
    conn_rates: &[[f64; 3]],
    logger: &mut DeferredLogger,
) -> Option<RatioViolation> {
    let mut worst: Option<RatioViolation> = None;
    if let Some(limit) = limits.max_water_cut {
        if let Some(v) = check_max_water_cut(limit, well_rates, conn_rates, logger) {
            if worst.is_none_or(|w| v.violation_extent > w.violation_extent) {
                worst = Some(v);
            }
        }
    }
    if limits.max_gas_oil_ratio.is_some() {
        logger.warning(
            "NOT_SUPPORTING_MAX_GOR",
            "the support for max Gas-Oil ratio is not implemented yet!",
        );
    }
    if limits.max_water_gas_ratio.is_some() {
        logger.warning(
            "NOT_SUPPORTING_MAX_WGR",
            "the support for max Water-Gas ratio is not implemented yet!",
        );
    }
    if limits.max_gas_liquid_ratio.is_some() {
        logger.warning(
            "NOT_SUPPORTING_MAX_GLR",
            "the support for max Gas-Liquid ratio is not implemented yet!",
        );
    }
    worst
}

/// Evaluate economic limits for all producers and record closures in `list`.
///
/// Wells already shut or stopped are skipped, as are connections already
/// closed.
pub fn update_list_econ_limited(
    wells: &Wells,
    state: &WellState,
    schedule: &EconSchedule,
    step: usize,
    list: &mut EconLimitedList,
    logger: &mut DeferredLogger,
) -> WellResult<()> {
    if state.num_wells() != wells.len() {
        return Err(WellError::logic(format!(
            "well state holds {} wells but the model has {}",
            state.num_wells(),
            wells.len()
        )));
    }
    for (w, well) in wells.iter().enumerate() {
        if !well.well_type.is_producer() {
            continue;
        }
        if list.well_shut(&well.name) || list.well_stopped(&well.name) {
            continue;
        }
        let Some(limits) = schedule.limits_at(&well.name, step) else {
            continue;
        };
        if !limits.on_any_effective_limit() {
            continue;
        }
        if limits.quantity_limit == QuantityLimit::Potential {
            logger.warning(
                "NOT_SUPPORTING_POTN",
                format!(
                    "POTN limit for well {} is not supported for the moment. \
                     All the limits will be evaluated based on RATE.",
                    well.name
                ),
            );
        }

        let rates = state.rates(w);
        if limits.on_any_rate_limit() && check_rate_limits(limits, &rates, logger) {
            if limits.end_run {
                logger.warning(
                    "NOT_SUPPORTING_ENDRUN",
                    format!(
                        "ending run after well closed due to economic limits is not supported yet, \
                         the program will keep running after {} is closed",
                        well.name
                    ),
                );
            }
            if limits.follow_on_well.is_some() {
                logger.warning(
                    "NOT_SUPPORTING_FOLLOWONWELL",
                    "opening following on well after well closed is not supported yet",
                );
            }
            if limits.automatic_shut_in {
                list.add_shut_well(&well.name);
                logger.info(format!(
                    "well {} will be shut in due to economic limit",
                    well.name
                ));
            } else {
                list.add_stopped_well(&well.name);
                logger.info(format!(
                    "well {} will be stopped due to economic limit",
                    well.name
                ));
            }
            continue;
        }

        if !limits.on_any_ratio_limit() {
            continue;
        }
        let closed = list.closed_connections(&well.name);
        let open: Vec<(usize, usize)> = wells
            .connection_range(w)
            .enumerate()
            .filter(|(k, _)| !closed.contains(&well.connections[*k].cell))
            .collect();
        let conn_rates: Vec<[f64; 3]> = open.iter().map(|(_, perf)| state.perf_rates(*perf)).collect();
        let Some(violation) = check_ratio_limits(limits, &rates, &conn_rates, logger) else {
            continue;
        };
        let (k, _) = open[violation.worst_offending_connection];
        let cell = well.connections[k].cell;
        list.add_closed_connection(&well.name, cell);
        logger.info(format!(
            "Connection {k} for well {} will be closed due to economic limit",
            well.name
        ));
        if violation.last_connection {
            list.add_shut_well(&well.name);
            logger.info(format!(
                "{} will be shut due to the last connection closed",
                well.name
            ));
        }
    }
    Ok(())
}
