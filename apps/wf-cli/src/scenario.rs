//! YAML scenario: a reservoir snapshot plus the wells that drain it.
//!
//! Pressures are given in bar and rate targets in m³/day; everything is
//! converted to SI before it reaches the well model.

use crate::error::{CliError, CliResult};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use uom::si::pressure::pascal;
use uom::si::time::second;
use uom::si::volume_rate::cubic_meter_per_second;
use wf_core::{bar, days, sm3_per_day};
use wf_fluids::{
    BlackOilPvt, CellState, NUM_PHASES, Phase, PhaseUsage, PvtModel, PvtRateConverter, RegionPvt,
};
use wf_wells::{
    BilinearVfpTable, Connection, Control, EconLimits, EconSchedule, GroupMember, NoGroupControl,
    StandardWells, VfpProperties, VoidageReplacementGroup, Well, WellCollection, WellControls,
    WellModelConfig, WellType, Wells,
};

fn yes() -> bool {
    true
}

fn one() -> f64 {
    1.0
}

fn default_temperature() -> f64 {
    350.0
}

fn default_dt_days() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    pub phases: PhasesDef,
    /// Reservoir temperature [K]
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// One entry per PVT region; empty means a single default region
    #[serde(default)]
    pub pvt: Vec<RegionPvt>,
    pub cells: Vec<CellDef>,
    pub wells: Vec<WellDef>,
    #[serde(default)]
    pub vfp_tables: Vec<BilinearVfpTable>,
    #[serde(default)]
    pub econ: Vec<EconDef>,
    #[serde(default)]
    pub group: Option<GroupDef>,
    #[serde(default)]
    pub config: WellModelConfig,
    #[serde(default = "default_dt_days")]
    pub dt_days: f64,
}

#[derive(Debug, Deserialize)]
pub struct PhasesDef {
    #[serde(default)]
    pub water: bool,
    #[serde(default = "yes")]
    pub oil: bool,
    #[serde(default)]
    pub gas: bool,
}

#[derive(Debug, Deserialize)]
pub struct CellDef {
    pub pressure_bar: f64,
    /// Phase mobilities (water, oil, gas) [1/(Pa·s)]
    pub mobility: [f64; NUM_PHASES],
    #[serde(default)]
    pub region: usize,
}

#[derive(Debug, Deserialize)]
pub struct WellDef {
    pub name: String,
    #[serde(rename = "type")]
    pub well_type: WellType,
    pub ref_depth: f64,
    #[serde(default)]
    pub injection_phase: Option<Phase>,
    #[serde(default = "yes")]
    pub allow_cross_flow: bool,
    pub connections: Vec<Connection>,
    pub controls: Vec<ControlDef>,
    #[serde(default)]
    pub initial_control: usize,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlDef {
    Bhp {
        bar: f64,
    },
    Thp {
        bar: f64,
        vfp_table: u32,
        #[serde(default)]
        alq: f64,
    },
    SurfaceRate {
        m3_per_day: f64,
        distr: [f64; NUM_PHASES],
    },
    ReservoirRate {
        m3_per_day: f64,
        distr: [f64; NUM_PHASES],
    },
}

impl ControlDef {
    pub fn to_control(&self) -> Control {
        match *self {
            ControlDef::Bhp { bar: p } => Control::bhp(bar(p)),
            ControlDef::Thp {
                bar: p,
                vfp_table,
                alq,
            } => Control::thp(bar(p), vfp_table, alq),
            ControlDef::SurfaceRate { m3_per_day, distr } => {
                Control::surface_rate(sm3_per_day(m3_per_day), distr)
            }
            ControlDef::ReservoirRate { m3_per_day, distr } => {
                Control::reservoir_rate(sm3_per_day(m3_per_day), distr)
            }
        }
    }
}

/// Economic limits of one well from a report step onwards.
#[derive(Debug, Deserialize)]
pub struct EconDef {
    pub well: String,
    #[serde(default)]
    pub from_step: usize,
    #[serde(flatten)]
    pub limits: EconLimits,
}

#[derive(Debug, Deserialize)]
pub struct GroupDef {
    pub name: String,
    pub replacement_fraction: f64,
    pub injection_phase: Phase,
    #[serde(default = "one")]
    pub efficiency: f64,
    pub members: Vec<MemberDef>,
}

#[derive(Debug, Deserialize)]
pub struct MemberDef {
    pub well: String,
    /// Control index the group takes over
    #[serde(default)]
    pub group_control: Option<usize>,
    #[serde(default = "one")]
    pub efficiency: f64,
    #[serde(default = "one")]
    pub guide_rate: f64,
}

/// Everything needed to drive the well model for one step.
pub struct Simulation {
    pub cells: Vec<CellState>,
    pub model: StandardWells,
    pub groups: Box<dyn WellCollection>,
    pub econ: EconSchedule,
    /// Time step [s]
    pub dt: f64,
}

impl Scenario {
    pub fn load(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| CliError::ScenarioRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> CliResult<Self> {
        serde_yaml::from_str(content).map_err(|e| CliError::ScenarioParse(e.to_string()))
    }

    pub fn usage(&self) -> CliResult<PhaseUsage> {
        Ok(PhaseUsage::new(
            self.phases.water,
            self.phases.oil,
            self.phases.gas,
        )?)
    }

    pub fn build(&self) -> CliResult<Simulation> {
        let usage = self.usage()?;
        let regions = if self.pvt.is_empty() {
            vec![RegionPvt::default()]
        } else {
            self.pvt.clone()
        };
        let pvt: Arc<dyn PvtModel> = Arc::new(BlackOilPvt::new(regions)?);

        let cells = self
            .cells
            .iter()
            .map(|c| {
                CellState::from_pvt(
                    pvt.as_ref(),
                    usage,
                    bar(c.pressure_bar).get::<pascal>(),
                    self.temperature,
                    c.mobility,
                    c.region,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let wells = self
            .wells
            .iter()
            .map(|def| self.build_well(def))
            .collect::<CliResult<Vec<_>>>()?;
        let wells = Wells::new(wells, usage, cells.len())?;

        let mut vfp = VfpProperties::new();
        for t in &self.vfp_tables {
            let table = BilinearVfpTable::new(
                t.id,
                t.datum_depth,
                t.flow_kind,
                t.flow.clone(),
                t.thp.clone(),
                t.bhp.clone(),
            )?;
            vfp.insert(Arc::new(table));
        }

        let mut econ = EconSchedule::new();
        for def in &self.econ {
            if wells.index_of(&def.well).is_none() {
                return Err(CliError::Invalid(format!(
                    "economic limits for unknown well {}",
                    def.well
                )));
            }
            econ.set(def.well.clone(), def.from_step, def.limits.clone());
        }

        let groups: Box<dyn WellCollection> = match &self.group {
            Some(g) => Box::new(self.build_group(g, &wells)?),
            None => Box::new(NoGroupControl),
        };

        let mut model = StandardWells::new(wells, usage, pvt.clone(), vfp, self.config.clone())?;
        if self.group.is_some() {
            let pressures = self.region_pressures(pvt.num_regions());
            let converter = PvtRateConverter::new(pvt, usage, pressures, self.temperature)?;
            model = model.with_rate_converter(Arc::new(converter));
        }

        Ok(Simulation {
            cells,
            model,
            groups,
            econ,
            dt: days(self.dt_days).get::<second>(),
        })
    }

    fn build_well(&self, def: &WellDef) -> CliResult<Well> {
        let controls = def.controls.iter().map(ControlDef::to_control).collect();
        let controls = WellControls::with_initial(controls, def.initial_control)?;
        let well = match def.well_type {
            WellType::Producer => Well::producer(def.name.clone(), def.ref_depth, controls),
            WellType::Injector => {
                let phase = def.injection_phase.ok_or_else(|| {
                    CliError::Invalid(format!("injector {} needs an injection_phase", def.name))
                })?;
                Well::injector(def.name.clone(), def.ref_depth, phase, controls)
            }
        };
        Ok(def
            .connections
            .iter()
            .cloned()
            .fold(well, Well::with_connection)
            .with_cross_flow(def.allow_cross_flow))
    }

    fn build_group(&self, def: &GroupDef, wells: &Wells) -> CliResult<VoidageReplacementGroup> {
        let mut group =
            VoidageReplacementGroup::new(def.name.clone(), def.replacement_fraction, def.injection_phase)
                .with_efficiency(def.efficiency);
        for m in &def.members {
            let index = wells.index_of(&m.well).ok_or_else(|| {
                CliError::Invalid(format!("group {} lists unknown well {}", def.name, m.well))
            })?;
            let well = wells.get(index)?;
            let mut member = GroupMember::new(m.well.clone(), index, well.well_type)
                .with_guide_rate(m.guide_rate);
            member.efficiency = m.efficiency;
            if let Some(control) = m.group_control {
                well.controls.get(control)?;
                member = member.with_group_control(control);
            }
            group = group.with_member(member);
        }
        Ok(group)
    }

    /// Average cell pressure per PVT region [Pa]; regions without cells
    /// fall back to the field average.
    fn region_pressures(&self, num_regions: usize) -> Vec<f64> {
        let mut sum = vec![0.0; num_regions];
        let mut count = vec![0usize; num_regions];
        for c in &self.cells {
            if c.region < num_regions {
                sum[c.region] += c.pressure_bar;
                count[c.region] += 1;
            }
        }
        let field = self.cells.iter().map(|c| c.pressure_bar).sum::<f64>()
            / self.cells.len().max(1) as f64;
        (0..num_regions)
            .map(|r| {
                let avg = if count[r] > 0 {
                    sum[r] / count[r] as f64
                } else {
                    field
                };
                bar(avg).get::<pascal>()
            })
            .collect()
    }
}

/// Convert an SI rate [m³/s] to m³/day for display.
pub fn per_day(rate: f64) -> f64 {
    use uom::si::volume_rate::cubic_meter_per_hour;
    wf_core::VolumeRate::new::<cubic_meter_per_second>(rate).get::<cubic_meter_per_hour>() * 24.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_WELLS: &str = r#"
phases: { water: true, oil: true }
cells:
  - { pressure_bar: 200, mobility: [500, 1000, 0] }
  - { pressure_bar: 210, mobility: [500, 1000, 0] }
wells:
  - name: P1
    type: producer
    ref_depth: 2000
    connections:
      - { cell: 0, transmissibility: 1.0e-12, depth: 2000 }
    controls:
      - { type: surface_rate, m3_per_day: -100, distr: [0, 1, 0] }
      - { type: bhp, bar: 100 }
  - name: I1
    type: injector
    injection_phase: water
    ref_depth: 2000
    connections:
      - { cell: 1, transmissibility: 1.0e-12, depth: 2000 }
    controls:
      - { type: bhp, bar: 300 }
      - { type: surface_rate, m3_per_day: 1, distr: [1, 0, 0] }
econ:
  - { well: P1, min_oil_rate: 1.0e-4 }
group:
  name: FIELD
  replacement_fraction: 1.0
  injection_phase: water
  members:
    - { well: P1 }
    - { well: I1, group_control: 1 }
"#;

    #[test]
    fn parses_and_builds_two_well_scenario() {
        let scenario = Scenario::parse(TWO_WELLS).unwrap();
        assert_eq!(scenario.wells.len(), 2);
        assert_eq!(scenario.dt_days, 1.0);

        let sim = scenario.build().unwrap();
        assert_eq!(sim.cells.len(), 2);
        assert_eq!(sim.model.num_wells(), 2);
        assert_eq!(sim.dt, 86_400.0);
        assert!(sim.groups.group_control_active());
        assert!(sim.econ.limits_at("P1", 0).is_some());

        // -100 m³/day is stored in m³/s
        let target = sim.model.wells().get(0).unwrap().controls.get(0).unwrap().target;
        assert!((target + 100.0 / 86_400.0).abs() < 1e-15);
        assert!((per_day(target) + 100.0).abs() < 1e-9);
    }

    #[test]
    fn bundled_scenario_builds() {
        let scenario = Scenario::parse(include_str!("../scenarios/two_wells.yaml")).unwrap();
        let sim = scenario.build().unwrap();
        assert_eq!(sim.model.wells().num_connections(), 3);
        assert_eq!(sim.model.config().max_local_iterations, 20);
        // The later entry takes over from step 3
        let limits = sim.econ.limits_at("PROD1", 3).unwrap();
        assert_eq!(limits.min_oil_rate, Some(1.0e-4));
        assert_eq!(sim.econ.limits_at("PROD1", 2).unwrap().min_oil_rate, None);
    }

    #[test]
    fn injector_without_phase_rejected() {
        let yaml = TWO_WELLS.replace("    injection_phase: water\n", "");
        let scenario = Scenario::parse(&yaml).unwrap();
        assert!(matches!(scenario.build(), Err(CliError::Invalid(_))));
    }

    #[test]
    fn unknown_fields_rejected() {
        let yaml = format!("{TWO_WELLS}bogus: 1\n");
        assert!(matches!(
            Scenario::parse(&yaml),
            Err(CliError::ScenarioParse(_))
        ));
    }

    #[test]
    fn rates_round_trip_through_days() {
        let rate = wf_core::sm3_per_day(300.0).get::<cubic_meter_per_second>();
        assert!((rate - 300.0 / 86_400.0).abs() < 1e-15);
        assert!((per_day(rate) - 300.0).abs() < 1e-9);
        assert!((per_day(-1.0) + 86_400.0).abs() < 1e-6);
    }
}
