//! Data-driven plan definitions.
//!
//! A [`Plan`] is the phase table the [`PhaseController`] walks. `phase`
//! indexes [`Plan::phases`] and `sub_phase` indexes the steps inside that
//! phase. Each [`Step`] is one uniformly-dispatched handler; the numeric
//! thresholds a growth strategy tunes live here as data, not in the engine.
//!
//! Two plans ship built in: [`Plan::agriculture`] and
//! [`Plan::agriculture_rush`]. Either can be replaced wholesale from YAML.
//!
//! [`PhaseController`]: crate::phase::PhaseController

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tycoon_types::PriceMultiplier;

/// The six locations the built-in plans expand to.
pub const DEFAULT_LOCATIONS: [&str; 6] = [
    "Aevum",
    "Chongqing",
    "Sector-12",
    "New Tokyo",
    "Ishima",
    "Volhaven",
];

/// Capacity added by one storage level.
pub const STORAGE_LEVEL_CAPACITY: f64 = 100.0;

const AGRICULTURE: &str = "Agriculture";
const ADVERT: &str = "AdVert";
const REAL_ESTATE: &str = "Real Estate";

/// A plan that cannot be run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    /// The plan has no phases.
    #[error("plan {plan} has no phases")]
    Empty {
        /// Plan name.
        plan: String,
    },

    /// A phase has no steps.
    #[error("phase {phase} of plan {plan} has no steps")]
    EmptyPhase {
        /// Plan name.
        plan: String,
        /// Phase name.
        phase: String,
    },

    /// The final step would advance past the end of the plan.
    #[error("plan {plan} must end in a maintenance or manual step, not {last}")]
    NoSteadyState {
        /// Plan name.
        plan: String,
        /// Kind of the final step.
        last: &'static str,
    },
}

/// A complete growth strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Plan name, used in logs.
    pub name: String,
    /// Locations every per-location step covers.
    #[serde(default = "default_locations")]
    pub locations: Vec<String>,
    /// Ordered phases.
    pub phases: Vec<PhaseDef>,
    /// Price controller settings; `None` disables pricing.
    #[serde(default)]
    pub pricing: Option<PricingConfig>,
}

/// One named stage of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseDef {
    /// Phase name, used in logs.
    pub name: String,
    /// Ordered steps.
    pub steps: Vec<Step>,
}

/// Which products the price controller manages, and from when.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Division whose products are priced.
    pub division: String,
    /// Product names.
    pub products: Vec<String>,
    /// First phase in which pricing runs.
    #[serde(default)]
    pub from_phase: u32,
}

/// How a materials step buys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStrategy {
    /// Buy each shortfall in one bulk purchase.
    #[default]
    Bulk,
    /// Set a per-cycle buy rate that closes the shortfall over
    /// `ticks_to_fill` cycles.
    Rate {
        /// Cycles over which to spread the purchase.
        ticks_to_fill: u32,
    },
}

/// When a milestone offer is good enough to accept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptRule {
    /// Accept once the offer exceeds `amount`.
    AtLeast {
        /// Offer must be strictly above this.
        amount: f64,
    },
    /// Track the peak offer and accept once it starts falling.
    PeakDrop {
        /// Never accept below this amount.
        floor: f64,
        /// Accept once the offer falls below `peak × drop_ratio`.
        drop_ratio: f64,
        /// Also accept once this resource has run down.
        #[serde(default)]
        depleted_resource: Option<DepletedResource>,
    },
}

/// A resource whose exhaustion triggers a [`AcceptRule::PeakDrop`] gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepletedResource {
    /// Division holding the resource.
    pub division: String,
    /// Resource name.
    pub resource: String,
    /// Total across all locations below which the resource counts as gone.
    pub below: f64,
}

/// One step of a phase, tagged by `kind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    /// Open a division if it does not exist.
    CreateDivision {
        /// Division name.
        division: String,
        /// Industry.
        industry: String,
    },
    /// Buy a one-time unlock if absent.
    Unlock {
        /// Unlock name.
        capability: String,
    },
    /// Expand to every plan location not yet present.
    ExpandLocations {
        /// Division name.
        division: String,
    },
    /// Buy storage in every location lacking it.
    EnsureStorage {
        /// Division name.
        division: String,
    },
    /// Grow storage in every location to `capacity`.
    ResizeStorage {
        /// Division name.
        division: String,
        /// Target capacity.
        capacity: f64,
        /// Most levels bought in one attempt; unlimited when absent.
        #[serde(default)]
        max_levels_per_tick: Option<u32>,
    },
    /// Grow staffing in every location to `size`.
    ResizeStaffing {
        /// Division name.
        division: String,
        /// Target positions.
        size: u32,
    },
    /// Hire until every role count is met.
    StaffRoles {
        /// Division name.
        division: String,
        /// Target staff per role.
        roles: BTreeMap<String, u32>,
    },
    /// Turn on automatic supply everywhere.
    EnableSupply {
        /// Division name.
        division: String,
    },
    /// Sell each product at `MAX @ MP` everywhere.
    EnableSales {
        /// Division name.
        division: String,
        /// Products to sell.
        products: Vec<String>,
    },
    /// Level entity-wide capabilities to their targets.
    LevelCapabilities {
        /// Target level per capability.
        targets: BTreeMap<String, u32>,
    },
    /// Level a division-scoped capability to a target.
    LevelDivision {
        /// Division name.
        division: String,
        /// Capability name.
        capability: String,
        /// Target level.
        target: u32,
    },
    /// Top up resources to fixed per-location targets, once.
    Materials {
        /// Completion flag set when all targets are met.
        flag: String,
        /// Division name.
        division: String,
        /// Target stock per resource, applied to every location.
        targets: BTreeMap<String, f64>,
        /// Purchase mode.
        #[serde(default)]
        mode: PurchaseStrategy,
    },
    /// Fill every location's storage with one resource, once.
    FillStorage {
        /// Completion flag set when storage is full.
        flag: String,
        /// Division name.
        division: String,
        /// Resource to stockpile.
        resource: String,
        /// Storage volume of one unit.
        unit_size: f64,
    },
    /// Set an explicit sell policy everywhere.
    SetSales {
        /// Division name.
        division: String,
        /// Products.
        products: Vec<String>,
        /// Amount expression; `0` stops selling.
        amount: String,
        /// Ask price.
        #[serde(default)]
        price: PriceMultiplier,
    },
    /// Wait for a number of production cycles to start.
    WaitCycles {
        /// Cycle starts to wait for.
        count: u32,
    },
    /// Wait for a division to accumulate research.
    WaitResearch {
        /// Division name.
        division: String,
        /// Research points required.
        points: f64,
    },
    /// Milestone gate.
    Milestone {
        /// Round this gate accepts (1-based).
        round: u32,
        /// Acceptance rule.
        accept: AcceptRule,
    },
    /// Operator-driven stage; never advances on its own.
    Manual {
        /// What the operator is expected to do.
        note: String,
    },
    /// Steady-state upkeep; never advances.
    Maintenance {
        /// Capability to level with surplus funds.
        capability: String,
        /// Funds above which to level.
        surplus_threshold: f64,
    },
}

impl Step {
    /// Short name of the step kind for logs and reports.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CreateDivision { .. } => "create_division",
            Self::Unlock { .. } => "unlock",
            Self::ExpandLocations { .. } => "expand_locations",
            Self::EnsureStorage { .. } => "ensure_storage",
            Self::ResizeStorage { .. } => "resize_storage",
            Self::ResizeStaffing { .. } => "resize_staffing",
            Self::StaffRoles { .. } => "staff_roles",
            Self::EnableSupply { .. } => "enable_supply",
            Self::EnableSales { .. } => "enable_sales",
            Self::LevelCapabilities { .. } => "level_capabilities",
            Self::LevelDivision { .. } => "level_division",
            Self::Materials { .. } => "materials",
            Self::FillStorage { .. } => "fill_storage",
            Self::SetSales { .. } => "set_sales",
            Self::WaitCycles { .. } => "wait_cycles",
            Self::WaitResearch { .. } => "wait_research",
            Self::Milestone { .. } => "milestone",
            Self::Manual { .. } => "manual",
            Self::Maintenance { .. } => "maintenance",
        }
    }
}

impl Plan {
    /// The step at a position, or `None` past the end of the plan.
    pub fn step_at(&self, phase: u32, sub_phase: u32) -> Option<&Step> {
        let phase = self.phases.get(usize::try_from(phase).ok()?)?;
        phase.steps.get(usize::try_from(sub_phase).ok()?)
    }

    /// Number of steps in a phase, or `None` if the phase does not exist.
    pub fn phase_len(&self, phase: u32) -> Option<usize> {
        self.phases
            .get(usize::try_from(phase).ok()?)
            .map(|p| p.steps.len())
    }

    /// Name of a phase.
    pub fn phase_name(&self, phase: u32) -> Option<&str> {
        self.phases
            .get(usize::try_from(phase).ok()?)
            .map(|p| p.name.as_str())
    }

    /// Check that the plan can be walked forever.
    ///
    /// Every phase needs at least one step, and the last step must be one
    /// that never advances, so the controller can never run off the end.
    pub fn validate(&self) -> Result<(), PlanError> {
        let Some(last_phase) = self.phases.last() else {
            return Err(PlanError::Empty {
                plan: self.name.clone(),
            });
        };
        if let Some(empty) = self.phases.iter().find(|p| p.steps.is_empty()) {
            return Err(PlanError::EmptyPhase {
                plan: self.name.clone(),
                phase: empty.name.clone(),
            });
        }
        match last_phase.steps.last() {
            Some(Step::Maintenance { .. } | Step::Manual { .. }) => Ok(()),
            Some(step) => Err(PlanError::NoSteadyState {
                plan: self.name.clone(),
                last: step.label(),
            }),
            None => Err(PlanError::EmptyPhase {
                plan: self.name.clone(),
                phase: last_phase.name.clone(),
            }),
        }
    }

    /// Look up a built-in plan by name.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "agriculture" => Some(Self::agriculture()),
            "agriculture-rush" => Some(Self::agriculture_rush()),
            _ => None,
        }
    }

    /// Seven-phase agriculture build-out with two fixed milestone gates.
    pub fn agriculture() -> Self {
        let division = AGRICULTURE.to_owned();
        let phases = vec![
            phase("division", vec![create_agriculture()]),
            phase(
                "smart-supply",
                vec![Step::Unlock {
                    capability: "Smart Supply".to_owned(),
                }],
            ),
            phase(
                "expansion",
                vec![
                    Step::ExpandLocations {
                        division: division.clone(),
                    },
                    Step::ResizeStaffing {
                        division: division.clone(),
                        size: 3,
                    },
                    Step::EnsureStorage {
                        division: division.clone(),
                    },
                    Step::ResizeStorage {
                        division: division.clone(),
                        capacity: 300.0,
                        max_levels_per_tick: None,
                    },
                    Step::StaffRoles {
                        division: division.clone(),
                        roles: roles(&[("Operations", 1), ("Engineer", 1), ("Business", 1)]),
                    },
                    Step::EnableSupply {
                        division: division.clone(),
                    },
                    Step::EnableSales {
                        division: division.clone(),
                        products: products(),
                    },
                    Step::LevelDivision {
                        division: division.clone(),
                        capability: ADVERT.to_owned(),
                        target: 1,
                    },
                ],
            ),
            phase(
                "first-growth",
                vec![
                    employee_upgrades(),
                    Step::Materials {
                        flag: "materials_round_one".to_owned(),
                        division: division.clone(),
                        targets: targets(&[
                            ("Hardware", 125.0),
                            ("AI Cores", 75.0),
                            (REAL_ESTATE, 25_000.0),
                        ]),
                        mode: PurchaseStrategy::Bulk,
                    },
                    Step::Milestone {
                        round: 1,
                        accept: AcceptRule::AtLeast { amount: 1.4e11 },
                    },
                ],
            ),
            phase(
                "scale-up",
                vec![
                    Step::ResizeStaffing {
                        division: division.clone(),
                        size: 9,
                    },
                    full_office(&division),
                    Step::LevelCapabilities {
                        targets: roles(&[("Smart Factories", 5), ("Smart Storage", 5)]),
                    },
                    Step::ResizeStorage {
                        division: division.clone(),
                        capacity: 1_000.0,
                        max_levels_per_tick: Some(7),
                    },
                    Step::Materials {
                        flag: "materials_round_two".to_owned(),
                        division: division.clone(),
                        targets: targets(&[
                            ("Hardware", 1_400.0),
                            ("Robots", 48.0),
                            ("AI Cores", 1_260.0),
                            (REAL_ESTATE, 73_200.0),
                        ]),
                        mode: PurchaseStrategy::Bulk,
                    },
                    Step::Milestone {
                        round: 2,
                        accept: AcceptRule::AtLeast { amount: 5e12 },
                    },
                    Step::ResizeStorage {
                        division: division.clone(),
                        capacity: 3_800.0,
                        max_levels_per_tick: Some(9),
                    },
                    Step::Materials {
                        flag: "materials_round_three".to_owned(),
                        division: division.clone(),
                        targets: targets(&[
                            ("Hardware", 9_300.0),
                            ("Robots", 726.0),
                            ("AI Cores", 6_270.0),
                            (REAL_ESTATE, 230_400.0),
                        ]),
                        mode: PurchaseStrategy::Bulk,
                    },
                ],
            ),
            phase(
                "products",
                vec![Step::Manual {
                    note: "create the product division, then advance to phase 6".to_owned(),
                }],
            ),
            phase("maintenance", vec![wilson_upkeep()]),
        ];

        Self {
            name: "agriculture".to_owned(),
            locations: default_locations(),
            phases,
            pricing: Some(PricingConfig {
                division,
                products: products(),
                from_phase: 2,
            }),
        }
    }

    /// Agriculture variant that stockpiles real estate to inflate the first
    /// milestone offer, sells it off, and accepts once the offer peaks.
    pub fn agriculture_rush() -> Self {
        let division = AGRICULTURE.to_owned();
        let real_estate = vec![REAL_ESTATE.to_owned()];
        let phases = vec![
            phase("division", vec![create_agriculture()]),
            phase(
                "stockpile",
                vec![
                    Step::ExpandLocations {
                        division: division.clone(),
                    },
                    Step::EnsureStorage {
                        division: division.clone(),
                    },
                    Step::ResizeStorage {
                        division: division.clone(),
                        capacity: 300.0,
                        max_levels_per_tick: None,
                    },
                    Step::StaffRoles {
                        division: division.clone(),
                        roles: roles(&[("Business", 3)]),
                    },
                    Step::LevelDivision {
                        division: division.clone(),
                        capability: ADVERT.to_owned(),
                        target: 10,
                    },
                    Step::FillStorage {
                        flag: "real_estate_stockpile".to_owned(),
                        division: division.clone(),
                        resource: REAL_ESTATE.to_owned(),
                        unit_size: 0.005,
                    },
                    Step::WaitCycles { count: 10 },
                    Step::SetSales {
                        division: division.clone(),
                        products: real_estate.clone(),
                        amount: "MAX".to_owned(),
                        price: PriceMultiplier::MARKET,
                    },
                    Step::Milestone {
                        round: 1,
                        accept: AcceptRule::PeakDrop {
                            floor: 100e9,
                            drop_ratio: 0.95,
                            depleted_resource: Some(DepletedResource {
                                division: division.clone(),
                                resource: REAL_ESTATE.to_owned(),
                                below: 100.0,
                            }),
                        },
                    },
                    Step::SetSales {
                        division: division.clone(),
                        products: real_estate,
                        amount: "0".to_owned(),
                        price: PriceMultiplier::MARKET,
                    },
                ],
            ),
            phase(
                "first-growth",
                vec![
                    Step::Unlock {
                        capability: "Smart Supply".to_owned(),
                    },
                    Step::EnableSupply {
                        division: division.clone(),
                    },
                    Step::EnableSales {
                        division: division.clone(),
                        products: products(),
                    },
                    employee_upgrades(),
                    Step::Materials {
                        flag: "materials_round_one".to_owned(),
                        division: division.clone(),
                        targets: targets(&[
                            ("Hardware", 125.0),
                            ("AI Cores", 75.0),
                            (REAL_ESTATE, 25_000.0),
                        ]),
                        mode: PurchaseStrategy::Bulk,
                    },
                    Step::WaitResearch {
                        division: division.clone(),
                        points: 55.0,
                    },
                ],
            ),
            phase(
                "scale-up",
                vec![
                    Step::ResizeStaffing {
                        division: division.clone(),
                        size: 9,
                    },
                    full_office(&division),
                    Step::LevelCapabilities {
                        targets: roles(&[("Smart Factories", 5), ("Smart Storage", 5)]),
                    },
                    Step::ResizeStorage {
                        division: division.clone(),
                        capacity: 1_000.0,
                        max_levels_per_tick: Some(7),
                    },
                    Step::Materials {
                        flag: "materials_round_two".to_owned(),
                        division: division.clone(),
                        targets: targets(&[
                            ("Hardware", 1_400.0),
                            ("Robots", 48.0),
                            ("AI Cores", 1_260.0),
                            (REAL_ESTATE, 73_200.0),
                        ]),
                        mode: PurchaseStrategy::Rate { ticks_to_fill: 10 },
                    },
                    Step::Milestone {
                        round: 2,
                        accept: AcceptRule::AtLeast { amount: 5e12 },
                    },
                ],
            ),
            phase("maintenance", vec![wilson_upkeep()]),
        ];

        Self {
            name: "agriculture-rush".to_owned(),
            locations: default_locations(),
            phases,
            pricing: Some(PricingConfig {
                division,
                products: products(),
                from_phase: 2,
            }),
        }
    }
}

fn default_locations() -> Vec<String> {
    DEFAULT_LOCATIONS.iter().map(|&l| l.to_owned()).collect()
}

fn phase(name: &str, steps: Vec<Step>) -> PhaseDef {
    PhaseDef {
        name: name.to_owned(),
        steps,
    }
}

fn products() -> Vec<String> {
    vec!["Plants".to_owned(), "Food".to_owned()]
}

fn roles(entries: &[(&str, u32)]) -> BTreeMap<String, u32> {
    entries.iter().map(|&(k, v)| (k.to_owned(), v)).collect()
}

fn targets(entries: &[(&str, f64)]) -> BTreeMap<String, f64> {
    entries.iter().map(|&(k, v)| (k.to_owned(), v)).collect()
}

fn create_agriculture() -> Step {
    Step::CreateDivision {
        division: AGRICULTURE.to_owned(),
        industry: AGRICULTURE.to_owned(),
    }
}

fn employee_upgrades() -> Step {
    Step::LevelCapabilities {
        targets: roles(&[
            ("FocusWires", 2),
            ("Neural Accelerators", 2),
            ("Speech Processor Implants", 2),
            ("Nuoptimal Nootropic Injector Implants", 2),
            ("Smart Factories", 2),
        ]),
    }
}

fn full_office(division: &str) -> Step {
    Step::StaffRoles {
        division: division.to_owned(),
        roles: roles(&[
            ("Operations", 2),
            ("Engineer", 2),
            ("Business", 1),
            ("Management", 2),
            ("Research & Development", 2),
        ]),
    }
}

fn wilson_upkeep() -> Step {
    Step::Maintenance {
        capability: "Wilson Analytics".to_owned(),
        surplus_threshold: 3e12,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn agriculture_has_seven_phases_ending_in_maintenance() {
        let plan = Plan::agriculture();
        assert_eq!(plan.phases.len(), 7);
        let last = plan.phases.last().unwrap();
        assert!(matches!(last.steps.as_slice(), [Step::Maintenance { .. }]));
        assert_eq!(plan.pricing.as_ref().unwrap().from_phase, 2);
    }

    #[test]
    fn step_lookup_is_bounds_checked() {
        let plan = Plan::agriculture();
        assert_eq!(plan.step_at(0, 0).unwrap().label(), "create_division");
        assert!(plan.step_at(0, 1).is_none());
        assert!(plan.step_at(99, 0).is_none());
        assert_eq!(plan.phase_len(3), Some(3));
    }

    #[test]
    fn builtin_plans_validate() {
        assert!(Plan::agriculture().validate().is_ok());
        assert!(Plan::agriculture_rush().validate().is_ok());
    }

    #[test]
    fn plan_without_steady_state_is_rejected() {
        let mut plan = Plan::agriculture();
        plan.phases.truncate(2);
        assert!(matches!(
            plan.validate(),
            Err(PlanError::NoSteadyState { last: "unlock", .. })
        ));

        plan.phases.truncate(1);
        plan.phases.push(phase("hollow", Vec::new()));
        assert!(matches!(plan.validate(), Err(PlanError::EmptyPhase { .. })));

        plan.phases.clear();
        assert!(matches!(plan.validate(), Err(PlanError::Empty { .. })));
    }

    #[test]
    fn builtin_lookup_by_name() {
        assert!(Plan::builtin("agriculture-rush").is_some());
        assert!(Plan::builtin("tobacco").is_none());
    }

    #[test]
    fn plan_parses_from_yaml() {
        let yaml = r#"
name: tiny
locations: [Aevum]
phases:
  - name: start
    steps:
      - kind: unlock
        capability: Smart Supply
      - kind: materials
        flag: stock
        division: Agri
        targets: { Hardware: 125 }
        mode: { rate: { ticks_to_fill: 10 } }
      - kind: milestone
        round: 1
        accept: { at_least: { amount: 1.4e11 } }
"#;
        let plan: Plan = serde_yml::from_str(yaml).unwrap();
        assert_eq!(plan.locations, vec!["Aevum".to_owned()]);
        assert!(plan.pricing.is_none());
        let step = plan.step_at(0, 1).unwrap();
        assert!(matches!(
            step,
            Step::Materials {
                mode: PurchaseStrategy::Rate { ticks_to_fill: 10 },
                ..
            }
        ));
    }
}
