//! In-process collaborators for tests.
//!
//! [`ScriptedCollaborator`] is a tiny simulator of the controlled entity: it
//! serves its current [`Snapshot`], prices actions from a programmable cost
//! table, applies successful actions to the snapshot (deducting their cost
//! from funds), and records every cost query and attempt so tests can
//! assert on exactly what the engine did.
//!
//! [`ScriptedGang`] does the same for the gang surface.

use std::collections::{BTreeMap, VecDeque};

use tycoon_types::{
    Action, ActionResponse, DivisionView, GangAction, GangView, LocationView, MemberView,
    PurchaseMode, SellPolicy, Snapshot, StaffingView, StorageView,
};

use super::{Collaborator, CollaboratorError, GangSurface};
use crate::plan::STORAGE_LEVEL_CAPACITY;

/// Capacity of freshly purchased storage.
pub const INITIAL_STORAGE_CAPACITY: f64 = 100.0;

/// Staffing positions at a freshly expanded location.
pub const INITIAL_STAFFING_SIZE: u32 = 3;

/// A programmable stand-in for the controlled entity.
#[derive(Debug, Clone, Default)]
pub struct ScriptedCollaborator {
    /// The entity's current state. Mutated by successful attempts.
    pub snapshot: Snapshot,
    /// Cost of any action kind without an entry in `costs`.
    pub default_cost: f64,
    /// Cost per action kind, keyed by [`Action::label`].
    pub costs: BTreeMap<String, f64>,
    /// Cost per unit of a bulk resource purchase.
    pub unit_cost: f64,
    /// Largest number of units a single bulk purchase delivers.
    pub purchase_cap: Option<f64>,
    /// Responses returned, in order, instead of applying attempts.
    pub queued_responses: VecDeque<ActionResponse>,
    /// When set, every call fails with [`CollaboratorError::Unavailable`].
    pub unavailable: bool,
    /// Every action passed to `attempt`, in order.
    pub attempts: Vec<Action>,
    /// Every action passed to `action_cost`, in order.
    pub cost_queries: Vec<Action>,
    /// Number of snapshots served.
    pub snapshots_served: u64,
}

impl ScriptedCollaborator {
    /// A collaborator serving `snapshot` with every action free.
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            ..Self::default()
        }
    }

    /// Set the cost of one action kind.
    #[must_use]
    pub fn with_cost(mut self, label: &str, cost: f64) -> Self {
        self.costs.insert(label.to_owned(), cost);
        self
    }

    /// Set the per-unit cost of bulk purchases.
    #[must_use]
    pub const fn with_unit_cost(mut self, unit_cost: f64) -> Self {
        self.unit_cost = unit_cost;
        self
    }

    /// Cap the units a single bulk purchase delivers.
    #[must_use]
    pub const fn with_purchase_cap(mut self, cap: f64) -> Self {
        self.purchase_cap = Some(cap);
        self
    }

    /// Attempts of a given kind.
    pub fn attempts_of(&self, label: &str) -> Vec<&Action> {
        self.attempts.iter().filter(|a| a.label() == label).collect()
    }

    /// Price an action from the cost table.
    pub fn cost_of(&self, action: &Action) -> f64 {
        match action {
            Action::PurchaseResource {
                quantity,
                mode: PurchaseMode::Bulk,
                ..
            } if self.unit_cost > 0.0 => quantity * self.unit_cost,
            _ => self
                .costs
                .get(action.label())
                .copied()
                .unwrap_or(self.default_cost),
        }
    }

    fn check_available(&self) -> Result<(), CollaboratorError> {
        if self.unavailable {
            Err(CollaboratorError::unavailable("scripted collaborator offline"))
        } else {
            Ok(())
        }
    }

    fn location_mut(&mut self, division: &str, location: &str) -> Option<&mut LocationView> {
        self.snapshot
            .divisions
            .get_mut(division)
            .and_then(|d| d.locations.get_mut(location))
    }

    /// Apply an action to the snapshot as the real entity would.
    fn apply(&mut self, action: &Action) -> ActionResponse {
        let cost = self.cost_of(action);
        if cost > self.snapshot.funds {
            return rejected("insufficient funds");
        }

        let response = self.apply_effect(action);

        let spent = match &response {
            ActionResponse::Purchased { units } if self.unit_cost > 0.0 => units * self.unit_cost,
            r if r.succeeded() => cost,
            _ => 0.0,
        };
        self.snapshot.funds -= spent;
        response
    }

    #[allow(clippy::too_many_lines)]
    fn apply_effect(&mut self, action: &Action) -> ActionResponse {
        let purchase_cap = self.purchase_cap;
        match action {
            Action::CreateDivision { division, industry } => {
                if self.snapshot.divisions.contains_key(division) {
                    return rejected("division exists");
                }
                self.snapshot.divisions.insert(
                    division.clone(),
                    DivisionView {
                        industry: industry.clone(),
                        ..DivisionView::default()
                    },
                );
                ActionResponse::Applied
            }
            Action::Unlock { name } => {
                if self.snapshot.unlocks.insert(name.clone()) {
                    ActionResponse::Applied
                } else {
                    rejected("already unlocked")
                }
            }
            Action::ExpandLocation { division, location } => {
                let Some(div) = self.snapshot.divisions.get_mut(division) else {
                    return rejected("no such division");
                };
                if div.locations.contains_key(location) {
                    return rejected("already expanded");
                }
                div.locations.insert(
                    location.clone(),
                    LocationView {
                        staffing: StaffingView {
                            size: INITIAL_STAFFING_SIZE,
                            ..StaffingView::default()
                        },
                        ..LocationView::default()
                    },
                );
                ActionResponse::Applied
            }
            Action::PurchaseStorage { division, location } => {
                let Some(loc) = self.location_mut(division, location) else {
                    return rejected("no such location");
                };
                if loc.storage.is_some() {
                    return rejected("storage exists");
                }
                loc.storage = Some(StorageView {
                    capacity: INITIAL_STORAGE_CAPACITY,
                    used: 0.0,
                });
                ActionResponse::Applied
            }
            Action::ResizeStorage {
                division,
                location,
                levels,
            } => {
                let Some(storage) = self
                    .location_mut(division, location)
                    .and_then(|l| l.storage.as_mut())
                else {
                    return rejected("no storage");
                };
                storage.capacity += f64::from(*levels) * STORAGE_LEVEL_CAPACITY;
                ActionResponse::Applied
            }
            Action::ResizeStaffing {
                division,
                location,
                increase,
            } => {
                let Some(loc) = self.location_mut(division, location) else {
                    return rejected("no such location");
                };
                loc.staffing.size = loc.staffing.size.saturating_add(*increase);
                ActionResponse::Applied
            }
            Action::HireStaff {
                division,
                location,
                role,
            } => {
                let Some(loc) = self.location_mut(division, location) else {
                    return rejected("no such location");
                };
                if loc.staffing.vacancies() == 0 {
                    return rejected("no vacancies");
                }
                loc.staffing.employees = loc.staffing.employees.saturating_add(1);
                if let Some(role) = role {
                    let count = loc.staffing.roles.entry(role.clone()).or_insert(0);
                    *count = count.saturating_add(1);
                }
                ActionResponse::Applied
            }
            Action::AssignRoles {
                division,
                location,
                role,
                count,
            } => {
                let Some(loc) = self.location_mut(division, location) else {
                    return rejected("no such location");
                };
                loc.staffing.roles.insert(role.clone(), *count);
                ActionResponse::Applied
            }
            Action::ConfigureSupply {
                division,
                location,
                enabled,
            } => {
                let Some(loc) = self.location_mut(division, location) else {
                    return rejected("no such location");
                };
                loc.supply_enabled = *enabled;
                ActionResponse::Applied
            }
            Action::PurchaseResource {
                division,
                location,
                resource,
                quantity,
                mode,
            } => {
                let Some(loc) = self.location_mut(division, location) else {
                    return rejected("no such location");
                };
                let entry = loc.resources.entry(resource.clone()).or_default();
                match mode {
                    PurchaseMode::Bulk => {
                        let units = purchase_cap.map_or(*quantity, |cap| quantity.min(cap));
                        entry.stored += units;
                        ActionResponse::Purchased { units }
                    }
                    PurchaseMode::Rate => {
                        entry.buy_rate = *quantity;
                        ActionResponse::Applied
                    }
                }
            }
            Action::SetSellPolicy {
                division,
                location,
                resource,
                amount,
                price,
            } => {
                let Some(loc) = self.location_mut(division, location) else {
                    return rejected("no such location");
                };
                loc.resources.entry(resource.clone()).or_default().sell_policy =
                    Some(SellPolicy {
                        amount: amount.clone(),
                        price: (*price).into(),
                    });
                ActionResponse::Applied
            }
            Action::AcceptOffer { round } => match self.snapshot.offer {
                Some(offer) if offer.round == *round => {
                    self.snapshot.funds += offer.amount;
                    self.snapshot.offer = None;
                    ActionResponse::Applied
                }
                _ => rejected("no matching offer"),
            },
            Action::LevelCapability { name } => {
                let level = self
                    .snapshot
                    .capability_levels
                    .entry(name.clone())
                    .or_insert(0);
                *level = level.saturating_add(1);
                ActionResponse::Applied
            }
            Action::LevelDivisionCapability { division, name } => {
                let Some(div) = self.snapshot.divisions.get_mut(division) else {
                    return rejected("no such division");
                };
                let level = div.capability_levels.entry(name.clone()).or_insert(0);
                *level = level.saturating_add(1);
                ActionResponse::Applied
            }
        }
    }
}

fn rejected(reason: &str) -> ActionResponse {
    ActionResponse::Rejected {
        reason: reason.to_owned(),
    }
}

impl Collaborator for ScriptedCollaborator {
    async fn snapshot(&mut self) -> Result<Snapshot, CollaboratorError> {
        self.check_available()?;
        self.snapshots_served = self.snapshots_served.saturating_add(1);
        Ok(self.snapshot.clone())
    }

    async fn action_cost(&mut self, action: &Action) -> Result<f64, CollaboratorError> {
        self.check_available()?;
        self.cost_queries.push(action.clone());
        Ok(self.cost_of(action))
    }

    async fn attempt(&mut self, action: &Action) -> Result<ActionResponse, CollaboratorError> {
        self.check_available()?;
        self.attempts.push(action.clone());
        if let Some(response) = self.queued_responses.pop_front() {
            return Ok(response);
        }
        Ok(self.apply(action))
    }
}

/// A programmable stand-in for a gang.
#[derive(Debug, Clone, Default)]
pub struct ScriptedGang {
    /// The gang's current state. Mutated by successful attempts.
    pub view: GangView,
    /// Recruits still available; `can_recruit` turns off at zero.
    pub recruit_slots: u32,
    /// When set, every call fails with [`CollaboratorError::Unavailable`].
    pub unavailable: bool,
    /// Every action attempted, in order.
    pub attempts: Vec<GangAction>,
}

impl ScriptedGang {
    /// A gang serving `view`.
    pub fn new(view: GangView) -> Self {
        Self {
            view,
            ..Self::default()
        }
    }

    fn apply(&mut self, action: &GangAction) -> bool {
        match action {
            GangAction::Recruit { name } => {
                if self.recruit_slots == 0 {
                    return false;
                }
                self.recruit_slots = self.recruit_slots.saturating_sub(1);
                self.view.members.push(MemberView {
                    name: name.clone(),
                    task: "Unassigned".to_owned(),
                    ..MemberView::default()
                });
                true
            }
            GangAction::Ascend { member } => self.member_mut(member).is_some_and(|m| {
                m.ascension = None;
                true
            }),
            GangAction::PurchaseEquipment { member, equipment } => {
                let Some(cost) = self.view.equipment_costs.get(equipment).copied() else {
                    return false;
                };
                if cost > self.view.money {
                    return false;
                }
                let bought = self
                    .member_mut(member)
                    .is_some_and(|m| m.equipment.insert(equipment.clone()));
                if bought {
                    self.view.money -= cost;
                }
                bought
            }
            GangAction::SetTask { member, task } => self.member_mut(member).is_some_and(|m| {
                m.task.clone_from(task);
                true
            }),
            GangAction::SetWarfare { engaged } => {
                self.view.warfare_engaged = *engaged;
                true
            }
        }
    }

    fn member_mut(&mut self, name: &str) -> Option<&mut MemberView> {
        self.view.members.iter_mut().find(|m| m.name == name)
    }
}

impl GangSurface for ScriptedGang {
    async fn gang(&mut self) -> Result<GangView, CollaboratorError> {
        if self.unavailable {
            return Err(CollaboratorError::unavailable("scripted gang offline"));
        }
        let mut view = self.view.clone();
        view.can_recruit = self.recruit_slots > 0;
        Ok(view)
    }

    async fn attempt_gang(&mut self, action: &GangAction) -> Result<bool, CollaboratorError> {
        if self.unavailable {
            return Err(CollaboratorError::unavailable("scripted gang offline"));
        }
        self.attempts.push(action.clone());
        Ok(self.apply(action))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn one_location() -> Snapshot {
        let mut sim = ScriptedCollaborator::new(Snapshot {
            funds: 1_000.0,
            ..Snapshot::default()
        });
        sim.apply(&Action::CreateDivision {
            division: "Agri".to_owned(),
            industry: "Agriculture".to_owned(),
        });
        sim.apply(&Action::ExpandLocation {
            division: "Agri".to_owned(),
            location: "Aevum".to_owned(),
        });
        sim.snapshot
    }

    #[tokio::test]
    async fn successful_attempt_deducts_cost() {
        let mut sim = ScriptedCollaborator::new(one_location()).with_cost("unlock", 400.0);
        let action = Action::Unlock {
            name: "Smart Supply".to_owned(),
        };
        let response = sim.attempt(&action).await.unwrap();
        assert_eq!(response, ActionResponse::Applied);
        assert!((sim.snapshot.funds - 600.0).abs() < 1e-9);
        assert!(sim.snapshot.has_unlock("Smart Supply"));

        let again = sim.attempt(&action).await.unwrap();
        assert!(matches!(again, ActionResponse::Rejected { .. }));
        assert!((sim.snapshot.funds - 600.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn purchase_cap_limits_units() {
        let mut sim = ScriptedCollaborator::new(one_location()).with_purchase_cap(10.0);
        let response = sim
            .attempt(&Action::PurchaseResource {
                division: "Agri".to_owned(),
                location: "Aevum".to_owned(),
                resource: "Hardware".to_owned(),
                quantity: 25.0,
                mode: PurchaseMode::Bulk,
            })
            .await
            .unwrap();
        assert_eq!(response, ActionResponse::Purchased { units: 10.0 });
        let stored = sim.snapshot.location("Agri", "Aevum").unwrap().stored("Hardware");
        assert!((stored - 10.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn offline_collaborator_errors() {
        let mut sim = ScriptedCollaborator::default();
        sim.unavailable = true;
        assert!(matches!(
            sim.snapshot().await,
            Err(CollaboratorError::Unavailable { .. })
        ));
    }

    #[tokio::test]
    async fn gang_recruit_consumes_slots() {
        let mut gang = ScriptedGang::new(GangView::default());
        gang.recruit_slots = 1;
        assert!(gang.gang().await.unwrap().can_recruit);
        let ok = gang
            .attempt_gang(&GangAction::Recruit {
                name: "Ghost".to_owned(),
            })
            .await
            .unwrap();
        assert!(ok);
        assert!(!gang.gang().await.unwrap().can_recruit);
        assert_eq!(gang.view.members.len(), 1);
    }
}
