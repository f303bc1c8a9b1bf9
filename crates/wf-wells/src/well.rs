//! Well topology: connections to reservoir cells and static well data.

use crate::controls::WellControls;
use crate::error::{WellError, WellResult};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use wf_fluids::{NUM_PHASES, Phase, PhaseUsage};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WellType {
    Injector,
    Producer,
}

impl WellType {
    pub fn is_injector(self) -> bool {
        self == WellType::Injector
    }

    pub fn is_producer(self) -> bool {
        self == WellType::Producer
    }
}

fn unit_efficiency() -> f64 {
    1.0
}

/// Perforation linking a well to one reservoir cell.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub cell: usize,
    /// Connection transmissibility factor (well index) [m³]
    pub transmissibility: f64,
    /// Connection depth [m]
    pub depth: f64,
    /// Static efficiency multiplier of this connection
    #[serde(default = "unit_efficiency")]
    pub efficiency: f64,
}

impl Connection {
    pub fn new(cell: usize, transmissibility: f64, depth: f64) -> Self {
        Self {
            cell,
            transmissibility,
            depth,
            efficiency: 1.0,
        }
    }
}

/// Static description of one well.
///
/// Connections are ordered from the top of the well bore downwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Well {
    pub name: String,
    pub well_type: WellType,
    /// Depth at which the bottom-hole pressure is reported [m]
    pub ref_depth: f64,
    pub connections: Vec<Connection>,
    /// Injected composition; for producers the fallback mix when no flow exists
    pub comp_frac: [f64; NUM_PHASES],
    pub controls: WellControls,
    /// Whether reverse flow through connections is permitted
    #[serde(default)]
    pub allow_cross_flow: bool,
}

impl Well {
    pub fn producer(name: impl Into<String>, ref_depth: f64, controls: WellControls) -> Self {
        Self {
            name: name.into(),
            well_type: WellType::Producer,
            ref_depth,
            connections: Vec::new(),
            comp_frac: [0.0; NUM_PHASES],
            controls,
            allow_cross_flow: true,
        }
    }

    pub fn injector(
        name: impl Into<String>,
        ref_depth: f64,
        injected: Phase,
        controls: WellControls,
    ) -> Self {
        let mut comp_frac = [0.0; NUM_PHASES];
        comp_frac[injected.index()] = 1.0;
        Self {
            name: name.into(),
            well_type: WellType::Injector,
            ref_depth,
            connections: Vec::new(),
            comp_frac,
            controls,
            allow_cross_flow: true,
        }
    }

    pub fn with_connection(mut self, connection: Connection) -> Self {
        self.connections.push(connection);
        self
    }

    pub fn with_cross_flow(mut self, allow: bool) -> Self {
        self.allow_cross_flow = allow;
        self
    }

    pub fn with_comp_frac(mut self, comp_frac: [f64; NUM_PHASES]) -> Self {
        self.comp_frac = comp_frac;
        self
    }

    fn validate(&mut self, usage: PhaseUsage, num_cells: usize) -> WellResult<()> {
        if self.connections.is_empty() {
            return Err(WellError::invalid(format!(
                "well {} has no connections",
                self.name
            )));
        }
        for c in &self.connections {
            if c.cell >= num_cells {
                return Err(WellError::invalid(format!(
                    "well {} connects to cell {} but the grid has {num_cells} cells",
                    self.name, c.cell
                )));
            }
            if !(c.transmissibility.is_finite() && c.transmissibility >= 0.0) {
                return Err(WellError::invalid(format!(
                    "well {} has a negative connection transmissibility",
                    self.name
                )));
            }
        }
        for phase in Phase::ALL {
            if !usage.is_active(phase) {
                self.comp_frac[phase.index()] = 0.0;
            }
        }
        let total: f64 = self.comp_frac.iter().sum();
        if total <= 0.0 {
            if self.well_type.is_injector() {
                return Err(WellError::invalid(format!(
                    "injector {} has no active injected phase",
                    self.name
                )));
            }
            // Producers default to an even mix over the active phases
            let share = 1.0 / usage.num_phases() as f64;
            for phase in usage.active_phases() {
                self.comp_frac[phase.index()] = share;
            }
        } else {
            for f in &mut self.comp_frac {
                *f /= total;
            }
        }
        Ok(())
    }
}

/// All wells of the model, with connections flattened into one index space.
#[derive(Clone, Debug)]
pub struct Wells {
    wells: Vec<Well>,
    conn_pos: Vec<usize>,
}

impl Wells {
    /// Validate wells against the active phases and grid size.
    ///
    /// The oil phase must be active; the well equations use it as the
    /// closing fraction.
    pub fn new(mut wells: Vec<Well>, usage: PhaseUsage, num_cells: usize) -> WellResult<Self> {
        if !usage.is_active(Phase::Oil) {
            return Err(WellError::invalid("the well model requires an active oil phase"));
        }
        let mut conn_pos = Vec::with_capacity(wells.len() + 1);
        conn_pos.push(0);
        for (i, well) in wells.iter_mut().enumerate() {
            well.validate(usage, num_cells)?;
            conn_pos.push(conn_pos[i] + well.connections.len());
        }
        for (i, w) in wells.iter().enumerate() {
            if wells[..i].iter().any(|o| o.name == w.name) {
                return Err(WellError::invalid(format!("duplicate well name {}", w.name)));
            }
        }
        Ok(Self { wells, conn_pos })
    }

    pub fn len(&self) -> usize {
        self.wells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wells.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Well> {
        self.wells.iter()
    }

    pub fn as_slice(&self) -> &[Well] {
        &self.wells
    }

    pub fn get(&self, w: usize) -> WellResult<&Well> {
        self.wells
            .get(w)
            .ok_or_else(|| WellError::logic(format!("well index {w} out of range")))
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.wells.iter().position(|w| w.name == name)
    }

    /// Global connection indices of well `w`.
    pub fn connection_range(&self, w: usize) -> Range<usize> {
        self.conn_pos[w]..self.conn_pos[w + 1]
    }

    pub fn num_connections(&self) -> usize {
        self.conn_pos[self.wells.len()]
    }

    pub fn controls_mut(&mut self, w: usize) -> WellResult<&mut WellControls> {
        self.wells
            .get_mut(w)
            .map(|well| &mut well.controls)
            .ok_or_else(|| WellError::logic(format!("well index {w} out of range")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controls::Control;
    use wf_core::bar;

    fn bhp_controls() -> WellControls {
        WellControls::new(vec![Control::bhp(bar(100.0))]).unwrap()
    }

    #[test]
    fn connection_ranges_are_contiguous() {
        let p1 = Well::producer("P1", 1000.0, bhp_controls())
            .with_connection(Connection::new(0, 1e-12, 1000.0))
            .with_connection(Connection::new(1, 1e-12, 1010.0));
        let p2 = Well::producer("P2", 1000.0, bhp_controls())
            .with_connection(Connection::new(2, 1e-12, 1000.0));
        let wells = Wells::new(vec![p1, p2], PhaseUsage::three_phase(), 3).unwrap();
        assert_eq!(wells.connection_range(0), 0..2);
        assert_eq!(wells.connection_range(1), 2..3);
        assert_eq!(wells.num_connections(), 3);
        assert_eq!(wells.index_of("P2"), Some(1));
    }

    #[test]
    fn producer_mix_defaults_to_active_phases() {
        let p = Well::producer("P", 0.0, bhp_controls()).with_connection(Connection::new(0, 1.0, 0.0));
        let wells = Wells::new(vec![p], PhaseUsage::oil_water(), 1).unwrap();
        assert_eq!(wells.as_slice()[0].comp_frac, [0.5, 0.5, 0.0]);
    }

    #[test]
    fn rejects_bad_topology() {
        let no_conn = Well::producer("P", 0.0, bhp_controls());
        assert!(Wells::new(vec![no_conn], PhaseUsage::three_phase(), 1).is_err());

        let outside = Well::producer("P", 0.0, bhp_controls()).with_connection(Connection::new(5, 1.0, 0.0));
        assert!(Wells::new(vec![outside], PhaseUsage::three_phase(), 2).is_err());

        let gas_inj = Well::injector("I", 0.0, Phase::Gas, bhp_controls())
            .with_connection(Connection::new(0, 1.0, 0.0));
        assert!(Wells::new(vec![gas_inj], PhaseUsage::oil_water(), 1).is_err());

        let a = Well::producer("P", 0.0, bhp_controls()).with_connection(Connection::new(0, 1.0, 0.0));
        assert!(Wells::new(vec![a.clone(), a], PhaseUsage::three_phase(), 1).is_err());
    }

    #[test]
    fn oil_phase_required() {
        let w = Well::injector("I", 0.0, Phase::Water, bhp_controls())
            .with_connection(Connection::new(0, 1.0, 0.0));
        let usage = PhaseUsage::new(true, false, true).unwrap();
        assert!(Wells::new(vec![w], usage, 1).is_err());
    }
}
