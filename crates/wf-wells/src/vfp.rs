//! Vertical flow performance (lift curve) tables.
//!
//! A table relates bottom-hole pressure at its datum depth to tubing-head
//! pressure, artificial lift quantity and the well's surface rates.

use crate::error::{WellError, WellResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;
use wf_core::{WellEval, ensure_finite};
use wf_fluids::{NUM_PHASES, Phase};

/// Lift-curve relation used by THP controls.
///
/// Rates are surface rates ordered water, oil, gas.
pub trait VfpTable: Send + Sync + Debug {
    fn table_id(&self) -> u32;

    /// Depth at which the table's BHP applies [m]
    fn datum_depth(&self) -> f64;

    /// BHP at the datum depth, differentiable in the rates.
    fn bhp(&self, rates: &[WellEval; NUM_PHASES], thp: f64, alq: f64) -> WellResult<WellEval>;

    /// THP giving the datum-depth BHP `bhp`.
    fn thp(&self, rates: &[f64; NUM_PHASES], bhp: f64, alq: f64) -> WellResult<f64>;
}

/// Rate quantity a table is tabulated against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowRateKind {
    Oil,
    Liquid,
    Gas,
}

impl FlowRateKind {
    fn flow(self, rates: &[WellEval; NUM_PHASES]) -> WellEval {
        let q = match self {
            FlowRateKind::Oil => rates[Phase::Oil.index()],
            FlowRateKind::Liquid => rates[Phase::Oil.index()] + rates[Phase::Water.index()],
            FlowRateKind::Gas => rates[Phase::Gas.index()],
        };
        q.abs()
    }
}

/// Table bilinear in flow rate and THP; the lift quantity is not tabulated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BilinearVfpTable {
    pub id: u32,
    pub datum_depth: f64,
    pub flow_kind: FlowRateKind,
    /// Flow axis, strictly increasing [m³/s]
    pub flow: Vec<f64>,
    /// THP axis, strictly increasing [Pa]
    pub thp: Vec<f64>,
    /// `bhp[flow_index][thp_index]` [Pa]
    pub bhp: Vec<Vec<f64>>,
}

/// Lower bracket index and weight; weights outside [0, 1] extrapolate.
fn locate(axis: &[f64], x: f64) -> (usize, f64) {
    if axis.len() < 2 {
        return (0, 0.0);
    }
    let i = axis
        .partition_point(|v| *v <= x)
        .saturating_sub(1)
        .min(axis.len() - 2);
    (i, (x - axis[i]) / (axis[i + 1] - axis[i]))
}

fn strictly_increasing(axis: &[f64]) -> bool {
    axis.windows(2).all(|w| w[0] < w[1])
}

impl BilinearVfpTable {
    pub fn new(
        id: u32,
        datum_depth: f64,
        flow_kind: FlowRateKind,
        flow: Vec<f64>,
        thp: Vec<f64>,
        bhp: Vec<Vec<f64>>,
    ) -> WellResult<Self> {
        let table = Self {
            id,
            datum_depth,
            flow_kind,
            flow,
            thp,
            bhp,
        };
        table.validate()?;
        Ok(table)
    }

    pub fn validate(&self) -> WellResult<()> {
        if self.flow.is_empty() || self.thp.is_empty() {
            return Err(WellError::invalid(format!("VFP table {} has an empty axis", self.id)));
        }
        if !strictly_increasing(&self.flow) || !strictly_increasing(&self.thp) {
            return Err(WellError::invalid(format!(
                "VFP table {} axes must be strictly increasing",
                self.id
            )));
        }
        if self.bhp.len() != self.flow.len() || self.bhp.iter().any(|r| r.len() != self.thp.len())
        {
            return Err(WellError::invalid(format!(
                "VFP table {} BHP grid does not match its axes",
                self.id
            )));
        }
        if self.bhp.iter().any(|r| !strictly_increasing(r)) {
            return Err(WellError::invalid(format!(
                "VFP table {} BHP must increase with THP",
                self.id
            )));
        }
        Ok(())
    }

    /// BHP at every THP node for the given flow.
    fn bhp_column(&self, flow: f64) -> Vec<f64> {
        let (i, t) = locate(&self.flow, flow);
        (0..self.thp.len())
            .map(|j| {
                let lo = self.bhp[i][j];
                let hi = self.bhp.get(i + 1).map_or(lo, |r| r[j]);
                lo + (hi - lo) * t
            })
            .collect()
    }
}

impl VfpTable for BilinearVfpTable {
    fn table_id(&self) -> u32 {
        self.id
    }

    fn datum_depth(&self) -> f64 {
        self.datum_depth
    }

    fn bhp(&self, rates: &[WellEval; NUM_PHASES], thp: f64, _alq: f64) -> WellResult<WellEval> {
        let flow = self.flow_kind.flow(rates);
        let (j, s) = locate(&self.thp, thp);
        let at_thp = |row: &Vec<f64>| {
            let lo = row[j];
            let hi = row.get(j + 1).copied().unwrap_or(lo);
            lo + (hi - lo) * s
        };
        let (i, _) = locate(&self.flow, flow.value());
        let b0 = at_thp(&self.bhp[i]);
        let bhp = match (self.flow.get(i + 1), self.bhp.get(i + 1)) {
            (Some(f1), Some(row)) => {
                let t = (flow - self.flow[i]) / (f1 - self.flow[i]);
                t * (at_thp(row) - b0) + b0
            }
            _ => WellEval::constant(b0),
        };
        if !bhp.is_finite() {
            return Err(WellError::numerical(format!(
                "VFP table {} produced a non-finite BHP",
                self.id
            )));
        }
        Ok(bhp)
    }

    fn thp(&self, rates: &[f64; NUM_PHASES], bhp: f64, _alq: f64) -> WellResult<f64> {
        let rates = rates.map(WellEval::constant);
        let flow = self.flow_kind.flow(&rates).value();
        let column = self.bhp_column(flow);
        if !strictly_increasing(&column) {
            return Err(WellError::numerical(format!(
                "VFP table {} cannot be inverted at flow {flow}",
                self.id
            )));
        }
        let (j, s) = locate(&column, bhp);
        let thp = match self.thp.get(j + 1) {
            Some(t1) => self.thp[j] + (t1 - self.thp[j]) * s,
            None => self.thp[j],
        };
        Ok(ensure_finite(thp, "tubing head pressure")?)
    }
}

/// Lift-curve tables keyed by table id.
#[derive(Clone, Debug, Default)]
pub struct VfpProperties {
    tables: BTreeMap<u32, Arc<dyn VfpTable>>,
}

impl VfpProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: Arc<dyn VfpTable>) {
        self.tables.insert(table.table_id(), table);
    }

    pub fn with_table(mut self, table: Arc<dyn VfpTable>) -> Self {
        self.insert(table);
        self
    }

    pub fn get(&self, id: u32) -> WellResult<&dyn VfpTable> {
        self.tables
            .get(&id)
            .map(|t| t.as_ref())
            .ok_or_else(|| WellError::logic(format!("VFP table {id} not found")))
    }

    pub fn contains(&self, id: u32) -> bool {
        self.tables.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

/// Pressure difference between the well's reference depth and a table's
/// datum depth for a fluid column of density `rho`.
pub fn hydrostatic_correction(ref_depth: f64, datum_depth: f64, rho: f64, gravity: f64) -> f64 {
    (ref_depth - datum_depth) * rho * gravity
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::well_state::XVAR_WELL as XVAR_SLOT;

    fn table() -> BilinearVfpTable {
        // bhp = 1e5 * flow + thp + 50e5 on the nodes
        let flow = vec![0.0, 10.0, 20.0];
        let thp = vec![10e5, 30e5];
        let bhp = flow
            .iter()
            .map(|f| thp.iter().map(|t| 1e5 * f + t + 50e5).collect())
            .collect();
        BilinearVfpTable::new(7, 1000.0, FlowRateKind::Liquid, flow, thp, bhp).unwrap()
    }

    #[test]
    fn bilinear_on_plane_is_exact() {
        let t = table();
        let q = [WellEval::constant(-2.0), WellEval::constant(-3.0), WellEval::constant(-9.0)];
        let bhp = t.bhp(&q, 20e5, 0.0).unwrap();
        assert!((bhp.value() - (5e5 + 20e5 + 50e5)).abs() < 1e-6);
    }

    #[test]
    fn bhp_derivative_follows_rate() {
        let t = table();
        let oil = WellEval::well_variable(-5.0, XVAR_SLOT);
        let q = [WellEval::constant(0.0), oil, WellEval::constant(0.0)];
        let bhp = t.bhp(&q, 10e5, 0.0).unwrap();
        // |q| decreases as q increases for producers
        assert!((bhp.well_derivative(XVAR_SLOT) + 1e5).abs() < 1e-6);
    }

    #[test]
    fn thp_inverts_bhp() {
        let t = table();
        let rates = [-1.0, -14.0, 0.0];
        let q = rates.map(WellEval::constant);
        let bhp = t.bhp(&q, 25e5, 0.0).unwrap().value();
        let thp = t.thp(&rates, bhp, 0.0).unwrap();
        assert!((thp - 25e5).abs() < 1e-3);
    }

    #[test]
    fn extrapolates_beyond_axes() {
        let t = table();
        let q = [WellEval::constant(0.0), WellEval::constant(30.0), WellEval::constant(0.0)];
        let bhp = t.bhp(&q, 40e5, 0.0).unwrap();
        assert!((bhp.value() - (30e5 + 40e5 + 50e5)).abs() < 1e-3);
    }

    #[test]
    fn rejects_bad_axes() {
        let err = BilinearVfpTable::new(
            1,
            0.0,
            FlowRateKind::Oil,
            vec![1.0, 1.0],
            vec![1.0],
            vec![vec![1.0], vec![2.0]],
        );
        assert!(err.is_err());
    }

    #[test]
    fn missing_table_is_logic_error() {
        let props = VfpProperties::new().with_table(Arc::new(table()));
        assert!(props.get(7).is_ok());
        assert!(matches!(props.get(3), Err(WellError::Logic { .. })));
    }
}
