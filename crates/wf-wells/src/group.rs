//! Group control collaborators.
//!
//! The well model never owns the group tree. It reads individual-control
//! flags and efficiency factors, pushes voidage information and receives
//! updated per-well targets back.

use crate::well::WellType;
use serde::{Deserialize, Serialize};
use wf_fluids::{NUM_PHASES, Phase};

/// New target for one control of one well.
#[derive(Clone, Debug, PartialEq)]
pub struct TargetUpdate {
    pub well: String,
    pub control: usize,
    pub target: f64,
}

/// Group hierarchy as seen from the well model.
///
/// Per-well arrays passed in are indexed by the model's well index; rate
/// arrays use a stride of [`NUM_PHASES`].
pub trait WellCollection {
    /// Whether any group constraint is in effect.
    fn group_control_active(&self) -> bool;

    /// Whether voidage replacement targets must be refreshed each iteration.
    fn has_voidage_replacement(&self) -> bool;

    /// Index of the group-assigned control in the well's control list.
    fn group_control_index(&self, well: &str) -> Option<usize>;

    fn is_individual_control(&self, well: &str) -> bool;

    fn set_individual_control(&mut self, well: &str, individual: bool);

    /// Product of the efficiency factors from the well up to the top group.
    fn accumulated_efficiency_factor(&self, well: &str) -> f64;

    /// Push producer voidage rates and per-well voidage coefficients.
    fn apply_vrep_group_controls(&mut self, voidage: &[f64], conversion: &[[f64; NUM_PHASES]]);

    /// Distribute group targets over the wells under group control.
    fn update_well_targets(&mut self, well_rates: &[f64]) -> Vec<TargetUpdate>;

    /// Whether the wells under group control meet the group target.
    fn group_target_converged(&self, well_rates: &[f64]) -> bool;
}

/// Collection without any group constraints.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoGroupControl;

impl WellCollection for NoGroupControl {
    fn group_control_active(&self) -> bool {
        false
    }

    fn has_voidage_replacement(&self) -> bool {
        false
    }

    fn group_control_index(&self, _well: &str) -> Option<usize> {
        None
    }

    fn is_individual_control(&self, _well: &str) -> bool {
        true
    }

    fn set_individual_control(&mut self, _well: &str, _individual: bool) {}

    fn accumulated_efficiency_factor(&self, _well: &str) -> f64 {
        1.0
    }

    fn apply_vrep_group_controls(&mut self, _voidage: &[f64], _conversion: &[[f64; NUM_PHASES]]) {}

    fn update_well_targets(&mut self, _well_rates: &[f64]) -> Vec<TargetUpdate> {
        Vec::new()
    }

    fn group_target_converged(&self, _well_rates: &[f64]) -> bool {
        true
    }
}

fn unit() -> f64 {
    1.0
}

/// Well belonging to a voidage replacement group.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupMember {
    pub well: String,
    /// Model well index
    pub index: usize,
    pub well_type: WellType,
    /// Control taken over by the group; `None` keeps the well individual
    #[serde(default)]
    pub group_control: Option<usize>,
    #[serde(default = "unit")]
    pub efficiency: f64,
    /// Share of the group injection target relative to the other injectors
    #[serde(default = "unit")]
    pub guide_rate: f64,
    #[serde(skip, default = "individual_default")]
    individual: bool,
}

fn individual_default() -> bool {
    true
}

impl GroupMember {
    pub fn new(well: impl Into<String>, index: usize, well_type: WellType) -> Self {
        Self {
            well: well.into(),
            index,
            well_type,
            group_control: None,
            efficiency: 1.0,
            guide_rate: 1.0,
            individual: true,
        }
    }

    pub fn with_group_control(mut self, control: usize) -> Self {
        self.group_control = Some(control);
        self
    }

    pub fn with_guide_rate(mut self, guide_rate: f64) -> Self {
        self.guide_rate = guide_rate;
        self
    }
}

/// Single group whose injectors replace a fraction of the produced voidage.
#[derive(Clone, Debug)]
pub struct VoidageReplacementGroup {
    pub name: String,
    pub replacement_fraction: f64,
    pub efficiency: f64,
    pub injection_phase: Phase,
    /// Relative tolerance on the injected voidage
    pub tolerance: f64,
    members: Vec<GroupMember>,
    reservoir_target: f64,
    conversion: Vec<[f64; NUM_PHASES]>,
}

impl VoidageReplacementGroup {
    pub fn new(name: impl Into<String>, replacement_fraction: f64, injection_phase: Phase) -> Self {
        Self {
            name: name.into(),
            replacement_fraction,
            efficiency: 1.0,
            injection_phase,
            tolerance: 1e-3,
            members: Vec::new(),
            reservoir_target: 0.0,
            conversion: Vec::new(),
        }
    }

    pub fn with_member(mut self, member: GroupMember) -> Self {
        self.members.push(member);
        self
    }

    pub fn with_efficiency(mut self, efficiency: f64) -> Self {
        self.efficiency = efficiency;
        self
    }

    pub fn members(&self) -> &[GroupMember] {
        &self.members
    }

    /// Reservoir voidage the group's injectors must inject.
    pub fn reservoir_target(&self) -> f64 {
        self.reservoir_target
    }

    fn member(&self, well: &str) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.well == well)
    }

    fn group_injectors(&self) -> impl Iterator<Item = &GroupMember> {
        self.members.iter().filter(|m| {
            m.well_type.is_injector() && m.group_control.is_some() && !m.individual
        })
    }

    fn coefficient(&self, index: usize) -> f64 {
        self.conversion
            .get(index)
            .map_or(0.0, |c| c[self.injection_phase.index()])
    }
}

impl WellCollection for VoidageReplacementGroup {
    fn group_control_active(&self) -> bool {
        true
    }

    fn has_voidage_replacement(&self) -> bool {
        true
    }

    fn group_control_index(&self, well: &str) -> Option<usize> {
        self.member(well).and_then(|m| m.group_control)
    }

    fn is_individual_control(&self, well: &str) -> bool {
        self.member(well).is_none_or(|m| m.individual)
    }

    fn set_individual_control(&mut self, well: &str, individual: bool) {
        if let Some(m) = self.members.iter_mut().find(|m| m.well == well) {
            m.individual = individual;
        }
    }

    fn accumulated_efficiency_factor(&self, well: &str) -> f64 {
        self.member(well)
            .map_or(1.0, |m| m.efficiency * self.efficiency)
    }

    fn apply_vrep_group_controls(&mut self, voidage: &[f64], conversion: &[[f64; NUM_PHASES]]) {
        let produced: f64 = self
            .members
            .iter()
            .filter(|m| m.well_type.is_producer())
            .map(|m| voidage.get(m.index).copied().unwrap_or(0.0) * m.efficiency)
            .sum();
        self.reservoir_target = self.replacement_fraction * produced * self.efficiency;
        self.conversion = conversion.to_vec();
        for m in &mut self.members {
            if m.well_type.is_injector() && m.group_control.is_some() {
                m.individual = false;
            }
        }
    }

    fn update_well_targets(&mut self, _well_rates: &[f64]) -> Vec<TargetUpdate> {
        let total_guide: f64 = self.group_injectors().map(|m| m.guide_rate).sum();
        if total_guide <= 0.0 {
            return Vec::new();
        }
        let mut updates = Vec::new();
        for m in self.group_injectors() {
            let Some(control) = m.group_control else {
                continue;
            };
            let coeff = self.coefficient(m.index);
            if coeff <= 0.0 {
                continue;
            }
            let share = self.reservoir_target * m.guide_rate / total_guide;
            updates.push(TargetUpdate {
                well: m.well.clone(),
                control,
                target: share / (coeff * m.efficiency * self.efficiency),
            });
        }
        updates
    }

    fn group_target_converged(&self, well_rates: &[f64]) -> bool {
        let p = self.injection_phase.index();
        let mut any = false;
        let mut injected = 0.0;
        for m in self.group_injectors() {
            any = true;
            let rate = well_rates
                .get(m.index * NUM_PHASES + p)
                .copied()
                .unwrap_or(0.0);
            injected += rate * self.coefficient(m.index) * m.efficiency * self.efficiency;
        }
        if !any {
            return true;
        }
        let scale = self.reservoir_target.abs().max(1e-12);
        (injected - self.reservoir_target).abs() <= self.tolerance * scale
    }
}
