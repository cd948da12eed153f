//! Step handlers.
//!
//! [`run_step`] dispatches a [`Step`] to its handler. Every handler has the
//! same contract: look at the tick's snapshot and the progress record, make
//! at most the purchases needed for progress this tick, and report an
//! [`Outcome`]. A blocked attempt ends the handler with [`Outcome::Hold`];
//! the same handler runs again next tick against a fresh snapshot and picks
//! up wherever the entity actually is.
//!
//! Handlers only touch the progress record to set completion flags, record
//! accepted milestones, and keep their own waiting counters.

use std::collections::BTreeMap;

use tracing::{debug, info};
use tycoon_types::{
    Action, CycleState, DivisionView, LocationView, PriceMultiplier, ProgressState, SellPolicy,
    Snapshot,
};

use crate::balancer::{self, TargetStock};
use crate::collaborator::Collaborator;
use crate::error::EngineError;
use crate::executor::{Attempt, GatedExecutor};
use crate::phase::Outcome;
use crate::plan::{AcceptRule, Plan, PurchaseStrategy, STORAGE_LEVEL_CAPACITY, Step};

/// Run one step for one tick.
///
/// # Errors
///
/// Returns [`EngineError::Collaborator`] if the collaborator fails and
/// [`EngineError::Invariant`] if the snapshot lacks something an earlier
/// step guaranteed.
pub async fn run_step<C: Collaborator>(
    step: &Step,
    plan: &Plan,
    snapshot: &Snapshot,
    progress: &mut ProgressState,
    exec: &mut GatedExecutor<'_, C>,
) -> Result<Outcome, EngineError> {
    match step {
        Step::CreateDivision { division, industry } => {
            create_division(snapshot, exec, division, industry).await
        }
        Step::Unlock { capability } => unlock(snapshot, exec, capability).await,
        Step::ExpandLocations { division } => expand_locations(plan, snapshot, exec, division).await,
        Step::EnsureStorage { division } => ensure_storage(plan, snapshot, exec, division).await,
        Step::ResizeStorage {
            division,
            capacity,
            max_levels_per_tick,
        } => {
            resize_storage(plan, snapshot, exec, division, *capacity, *max_levels_per_tick).await
        }
        Step::ResizeStaffing { division, size } => {
            resize_staffing(plan, snapshot, exec, division, *size).await
        }
        Step::StaffRoles { division, roles } => {
            staff_roles(plan, snapshot, exec, division, roles).await
        }
        Step::EnableSupply { division } => enable_supply(plan, snapshot, exec, division).await,
        Step::EnableSales { division, products } => {
            enable_sales(plan, snapshot, exec, division, products).await
        }
        Step::LevelCapabilities { targets } => level_capabilities(snapshot, exec, targets).await,
        Step::LevelDivision {
            division,
            capability,
            target,
        } => level_division(snapshot, exec, division, capability, *target).await,
        Step::Materials {
            flag,
            division,
            targets,
            mode,
        } => {
            let tuples = balancer::expand_targets(targets, &plan.locations);
            stock_up(snapshot, progress, exec, flag, division, &tuples, *mode).await
        }
        Step::FillStorage {
            flag,
            division,
            resource,
            unit_size,
        } => fill_storage(plan, snapshot, progress, exec, flag, division, resource, *unit_size).await,
        Step::SetSales {
            division,
            products,
            amount,
            price,
        } => set_sales(plan, snapshot, exec, division, products, amount, *price).await,
        Step::WaitCycles { count } => Ok(wait_cycles(snapshot, progress, *count)),
        Step::WaitResearch { division, points } => {
            let div = find_division(snapshot, division)?;
            if div.research_points >= *points {
                Ok(Outcome::Advance)
            } else {
                Ok(Outcome::wait(format!(
                    "research {:.0}/{points:.0} in {division}",
                    div.research_points
                )))
            }
        }
        Step::Milestone { round, accept } => milestone(snapshot, progress, exec, *round, accept).await,
        Step::Manual { note } => Ok(Outcome::wait(note.clone())),
        Step::Maintenance {
            capability,
            surplus_threshold,
        } => maintenance(snapshot, exec, capability, *surplus_threshold).await,
    }
}

/// Attempt an action; `Some(hold)` if it was blocked.
async fn try_action<C: Collaborator>(
    exec: &mut GatedExecutor<'_, C>,
    action: &Action,
) -> Result<Option<Outcome>, EngineError> {
    match exec.attempt(action).await? {
        Attempt::Done(_) => Ok(None),
        Attempt::Blocked(reason) => Ok(Some(Outcome::hold(format!(
            "{} blocked: {reason}",
            action.label()
        )))),
    }
}

fn find_division<'s>(snapshot: &'s Snapshot, name: &str) -> Result<&'s DivisionView, EngineError> {
    snapshot
        .division(name)
        .ok_or_else(|| EngineError::invariant(format!("division {name} does not exist")))
}

fn find_location<'s>(
    division: &'s DivisionView,
    division_name: &str,
    location: &str,
) -> Result<&'s LocationView, EngineError> {
    division.locations.get(location).ok_or_else(|| {
        EngineError::invariant(format!("{division_name} has not expanded to {location}"))
    })
}

/// Every plan location of a division, in plan order.
fn plan_locations<'s>(
    plan: &'s Plan,
    snapshot: &'s Snapshot,
    division: &str,
) -> Result<Vec<(&'s str, &'s LocationView)>, EngineError> {
    let div = find_division(snapshot, division)?;
    plan.locations
        .iter()
        .map(|name| Ok((name.as_str(), find_location(div, division, name)?)))
        .collect()
}

async fn create_division<C: Collaborator>(
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    division: &str,
    industry: &str,
) -> Result<Outcome, EngineError> {
    if snapshot.division(division).is_none() {
        let action = Action::CreateDivision {
            division: division.to_owned(),
            industry: industry.to_owned(),
        };
        if let Some(hold) = try_action(exec, &action).await? {
            return Ok(hold);
        }
        info!(division, industry, "division created");
    }
    Ok(Outcome::Advance)
}

async fn unlock<C: Collaborator>(
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    capability: &str,
) -> Result<Outcome, EngineError> {
    if !snapshot.has_unlock(capability) {
        let action = Action::Unlock {
            name: capability.to_owned(),
        };
        if let Some(hold) = try_action(exec, &action).await? {
            return Ok(hold);
        }
        info!(capability, "unlocked");
    }
    Ok(Outcome::Advance)
}

async fn expand_locations<C: Collaborator>(
    plan: &Plan,
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    division: &str,
) -> Result<Outcome, EngineError> {
    let div = find_division(snapshot, division)?;
    for location in &plan.locations {
        if div.locations.contains_key(location) {
            continue;
        }
        let action = Action::ExpandLocation {
            division: division.to_owned(),
            location: location.clone(),
        };
        if let Some(hold) = try_action(exec, &action).await? {
            return Ok(hold);
        }
        info!(division, location = %location, "expanded");
    }
    Ok(Outcome::Advance)
}

async fn ensure_storage<C: Collaborator>(
    plan: &Plan,
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    division: &str,
) -> Result<Outcome, EngineError> {
    for (location, view) in plan_locations(plan, snapshot, division)? {
        if view.storage.is_some() {
            continue;
        }
        let action = Action::PurchaseStorage {
            division: division.to_owned(),
            location: location.to_owned(),
        };
        if let Some(hold) = try_action(exec, &action).await? {
            return Ok(hold);
        }
    }
    Ok(Outcome::Advance)
}

/// Whole storage levels needed to cover `shortfall` capacity.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn levels_needed(shortfall: f64) -> u32 {
    let levels = (shortfall / STORAGE_LEVEL_CAPACITY).ceil();
    if levels.is_nan() || levels <= 0.0 {
        0
    } else if levels >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        levels as u32
    }
}

async fn resize_storage<C: Collaborator>(
    plan: &Plan,
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    division: &str,
    capacity: f64,
    max_levels_per_tick: Option<u32>,
) -> Result<Outcome, EngineError> {
    let mut still_growing = false;
    for (location, view) in plan_locations(plan, snapshot, division)? {
        let storage = view.storage.ok_or_else(|| {
            EngineError::invariant(format!("{division}/{location} has no storage to resize"))
        })?;
        let needed = levels_needed(capacity - storage.capacity);
        if needed == 0 {
            continue;
        }
        let levels = max_levels_per_tick.map_or(needed, |max| needed.min(max.max(1)));
        let action = Action::ResizeStorage {
            division: division.to_owned(),
            location: location.to_owned(),
            levels,
        };
        if let Some(hold) = try_action(exec, &action).await? {
            return Ok(hold);
        }
        debug!(division, location, levels, needed, "storage resized");
        still_growing |= levels < needed;
    }

    if still_growing {
        Ok(Outcome::hold(format!("storage growing toward {capacity:.0}")))
    } else {
        Ok(Outcome::Advance)
    }
}

async fn resize_staffing<C: Collaborator>(
    plan: &Plan,
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    division: &str,
    size: u32,
) -> Result<Outcome, EngineError> {
    for (location, view) in plan_locations(plan, snapshot, division)? {
        if view.staffing.size >= size {
            continue;
        }
        let action = Action::ResizeStaffing {
            division: division.to_owned(),
            location: location.to_owned(),
            increase: size.saturating_sub(view.staffing.size),
        };
        if let Some(hold) = try_action(exec, &action).await? {
            return Ok(hold);
        }
    }
    Ok(Outcome::Advance)
}

async fn staff_roles<C: Collaborator>(
    plan: &Plan,
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    division: &str,
    roles: &BTreeMap<String, u32>,
) -> Result<Outcome, EngineError> {
    let wanted = roles.values().fold(0_u32, |acc, &n| acc.saturating_add(n));
    for (location, view) in plan_locations(plan, snapshot, division)? {
        let mut employees = view.staffing.employees;
        while employees < wanted {
            let action = Action::HireStaff {
                division: division.to_owned(),
                location: location.to_owned(),
                role: None,
            };
            if let Some(hold) = try_action(exec, &action).await? {
                return Ok(hold);
            }
            employees = employees.saturating_add(1);
        }

        for (role, &count) in roles {
            if view.staffing.role_count(role) == count {
                continue;
            }
            let action = Action::AssignRoles {
                division: division.to_owned(),
                location: location.to_owned(),
                role: role.clone(),
                count,
            };
            if let Some(hold) = try_action(exec, &action).await? {
                return Ok(hold);
            }
        }
    }
    Ok(Outcome::Advance)
}

async fn enable_supply<C: Collaborator>(
    plan: &Plan,
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    division: &str,
) -> Result<Outcome, EngineError> {
    for (location, view) in plan_locations(plan, snapshot, division)? {
        if view.supply_enabled {
            continue;
        }
        let action = Action::ConfigureSupply {
            division: division.to_owned(),
            location: location.to_owned(),
            enabled: true,
        };
        if let Some(hold) = try_action(exec, &action).await? {
            return Ok(hold);
        }
    }
    Ok(Outcome::Advance)
}

/// Start selling each product at market price, leaving any active policy
/// alone so the price controller's adjustments survive.
async fn enable_sales<C: Collaborator>(
    plan: &Plan,
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    division: &str,
    products: &[String],
) -> Result<Outcome, EngineError> {
    for (location, view) in plan_locations(plan, snapshot, division)? {
        for product in products {
            let selling = view
                .resource(product)
                .and_then(|r| r.sell_policy.as_ref())
                .is_some_and(SellPolicy::is_active);
            if selling {
                continue;
            }
            let action = Action::SetSellPolicy {
                division: division.to_owned(),
                location: location.to_owned(),
                resource: product.clone(),
                amount: "MAX".to_owned(),
                price: PriceMultiplier::MARKET,
            };
            if let Some(hold) = try_action(exec, &action).await? {
                return Ok(hold);
            }
        }
    }
    Ok(Outcome::Advance)
}

async fn set_sales<C: Collaborator>(
    plan: &Plan,
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    division: &str,
    products: &[String],
    amount: &str,
    price: PriceMultiplier,
) -> Result<Outcome, EngineError> {
    let policy = SellPolicy {
        amount: amount.to_owned(),
        price: price.into(),
    };
    for (location, view) in plan_locations(plan, snapshot, division)? {
        for product in products {
            let current = view.resource(product).and_then(|r| r.sell_policy.as_ref());
            if current == Some(&policy) {
                continue;
            }
            let action = Action::SetSellPolicy {
                division: division.to_owned(),
                location: location.to_owned(),
                resource: product.clone(),
                amount: amount.to_owned(),
                price,
            };
            if let Some(hold) = try_action(exec, &action).await? {
                return Ok(hold);
            }
        }
    }
    Ok(Outcome::Advance)
}

async fn level_capabilities<C: Collaborator>(
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    targets: &BTreeMap<String, u32>,
) -> Result<Outcome, EngineError> {
    for (name, &target) in targets {
        for _ in snapshot.capability_level(name)..target {
            let action = Action::LevelCapability { name: name.clone() };
            if let Some(hold) = try_action(exec, &action).await? {
                return Ok(hold);
            }
        }
    }
    Ok(Outcome::Advance)
}

async fn level_division<C: Collaborator>(
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    division: &str,
    capability: &str,
    target: u32,
) -> Result<Outcome, EngineError> {
    let div = find_division(snapshot, division)?;
    for _ in div.capability_level(capability)..target {
        let action = Action::LevelDivisionCapability {
            division: division.to_owned(),
            name: capability.to_owned(),
        };
        if let Some(hold) = try_action(exec, &action).await? {
            return Ok(hold);
        }
    }
    Ok(Outcome::Advance)
}

/// Balance toward `tuples` and set `flag` the tick they are all met.
async fn stock_up<C: Collaborator>(
    snapshot: &Snapshot,
    progress: &mut ProgressState,
    exec: &mut GatedExecutor<'_, C>,
    flag: &str,
    division: &str,
    tuples: &[TargetStock],
    mode: PurchaseStrategy,
) -> Result<Outcome, EngineError> {
    if progress.is_complete(flag) {
        return Ok(Outcome::Advance);
    }

    let report = balancer::balance(exec, snapshot, division, tuples, mode).await?;
    if report.satisfied() {
        progress.mark_complete(flag);
        info!(flag, division, "materials complete");
        Ok(Outcome::Advance)
    } else {
        let reason = if report.outstanding.is_empty() {
            format!("{} buy rates still running", report.live_rates)
        } else if report.all_purchased {
            format!("{} of {} targets short", report.outstanding.len(), tuples.len())
        } else {
            format!(
                "{} of {} targets short, purchases starved",
                report.outstanding.len(),
                tuples.len()
            )
        };
        Ok(Outcome::hold(reason))
    }
}

#[allow(clippy::too_many_arguments)]
async fn fill_storage<C: Collaborator>(
    plan: &Plan,
    snapshot: &Snapshot,
    progress: &mut ProgressState,
    exec: &mut GatedExecutor<'_, C>,
    flag: &str,
    division: &str,
    resource: &str,
    unit_size: f64,
) -> Result<Outcome, EngineError> {
    if progress.is_complete(flag) {
        return Ok(Outcome::Advance);
    }
    if unit_size <= 0.0 {
        return Err(EngineError::invariant(format!(
            "fill_storage {flag} has non-positive unit size {unit_size}"
        )));
    }

    let mut tuples = Vec::with_capacity(plan.locations.len());
    for (location, view) in plan_locations(plan, snapshot, division)? {
        let storage = view.storage.ok_or_else(|| {
            EngineError::invariant(format!("{division}/{location} has no storage to fill"))
        })?;
        let room = (storage.free() / unit_size).floor();
        tuples.push(TargetStock {
            resource: resource.to_owned(),
            location: location.to_owned(),
            target_qty: view.stored(resource) + room,
        });
    }
    stock_up(
        snapshot,
        progress,
        exec,
        flag,
        division,
        &tuples,
        PurchaseStrategy::Bulk,
    )
    .await
}

/// Count transitions into [`CycleState::Start`].
fn wait_cycles(snapshot: &Snapshot, progress: &mut ProgressState, count: u32) -> Outcome {
    let current = snapshot.cycle_state;
    let entered_start = current == CycleState::Start
        && progress
            .last_cycle_state
            .is_some_and(|previous| previous != CycleState::Start);
    if entered_start {
        progress.cycles_waited = progress.cycles_waited.saturating_add(1);
    }
    progress.last_cycle_state = Some(current);

    if progress.cycles_waited >= count {
        Outcome::Advance
    } else {
        Outcome::wait(format!("cycle {}/{count}", progress.cycles_waited))
    }
}

async fn milestone<C: Collaborator>(
    snapshot: &Snapshot,
    progress: &mut ProgressState,
    exec: &mut GatedExecutor<'_, C>,
    round: u32,
    accept: &AcceptRule,
) -> Result<Outcome, EngineError> {
    if progress.investment_round >= round {
        return Ok(Outcome::Advance);
    }
    let Some(offer) = snapshot.offer else {
        return Ok(Outcome::wait(format!("no offer for round {round}")));
    };
    if offer.round > round {
        // Accepted before the record was written.
        info!(round, offered_round = offer.round, "milestone already accepted");
        progress.record_milestone(round);
        return Ok(Outcome::Advance);
    }
    if offer.round < round {
        return Err(EngineError::invariant(format!(
            "offer is for round {} but round {} is recorded as accepted",
            offer.round, progress.investment_round
        )));
    }

    let acceptable = match accept {
        AcceptRule::AtLeast { amount } => offer.amount > *amount,
        AcceptRule::PeakDrop {
            floor,
            drop_ratio,
            depleted_resource,
        } => {
            progress.peak_offer = progress.peak_offer.max(offer.amount);
            let dropped = offer.amount < progress.peak_offer * drop_ratio;
            let depleted = depleted_resource.as_ref().is_some_and(|d| {
                let total = snapshot
                    .division(&d.division)
                    .map_or(0.0, |div| {
                        div.locations.values().map(|l| l.stored(&d.resource)).sum()
                    });
                total < d.below
            });
            offer.amount >= *floor && (dropped || depleted)
        }
    };
    if !acceptable {
        debug!(round, offer = offer.amount, peak = progress.peak_offer, "offer not accepted");
        return Ok(Outcome::wait(format!(
            "offer {:.0} for round {round} below threshold",
            offer.amount
        )));
    }

    if let Some(hold) = try_action(exec, &Action::AcceptOffer { round }).await? {
        return Ok(hold);
    }
    progress.record_milestone(round);
    info!(round, amount = offer.amount, "milestone offer accepted");
    Ok(Outcome::Advance)
}

async fn maintenance<C: Collaborator>(
    snapshot: &Snapshot,
    exec: &mut GatedExecutor<'_, C>,
    capability: &str,
    surplus_threshold: f64,
) -> Result<Outcome, EngineError> {
    if snapshot.funds > surplus_threshold {
        let action = Action::LevelCapability {
            name: capability.to_owned(),
        };
        match exec.attempt(&action).await? {
            Attempt::Done(_) => info!(capability, funds = snapshot.funds, "surplus spent on upkeep"),
            Attempt::Blocked(reason) => debug!(capability, %reason, "upkeep blocked"),
        }
    }
    Ok(Outcome::hold("steady state"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use tycoon_types::{MilestoneOffer, StaffingView, StorageView};

    use super::*;
    use crate::collaborator::scripted::ScriptedCollaborator;
    use crate::plan::{DepletedResource, PhaseDef};

    const DIV: &str = "Agri";

    fn plan(locations: &[&str]) -> Plan {
        Plan {
            name: "test".to_owned(),
            locations: locations.iter().map(|&l| l.to_owned()).collect(),
            phases: vec![PhaseDef {
                name: "only".to_owned(),
                steps: vec![Step::Manual {
                    note: "end".to_owned(),
                }],
            }],
            pricing: None,
        }
    }

    fn with_locations(funds: f64, locations: &[&str]) -> Snapshot {
        let mut division = DivisionView {
            industry: "Agriculture".to_owned(),
            ..DivisionView::default()
        };
        for &name in locations {
            division.locations.insert(
                name.to_owned(),
                LocationView {
                    staffing: StaffingView {
                        size: 3,
                        ..StaffingView::default()
                    },
                    storage: Some(StorageView {
                        capacity: 100.0,
                        used: 0.0,
                    }),
                    ..LocationView::default()
                },
            );
        }
        Snapshot {
            funds,
            divisions: BTreeMap::from([(DIV.to_owned(), division)]),
            ..Snapshot::default()
        }
    }

    async fn run(
        sim: &mut ScriptedCollaborator,
        plan: &Plan,
        step: &Step,
        progress: &mut ProgressState,
    ) -> Outcome {
        let snapshot = sim.snapshot.clone();
        let mut exec = GatedExecutor::new(sim, snapshot.funds, 1.0);
        run_step(step, plan, &snapshot, progress, &mut exec)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn expansion_stops_at_first_blocked_location() {
        let mut sim = ScriptedCollaborator::new(with_locations(150.0, &[]))
            .with_cost("expand_location", 100.0);
        let plan = plan(&["Aevum", "Ishima"]);
        let step = Step::ExpandLocations {
            division: DIV.to_owned(),
        };
        let mut progress = ProgressState::new();

        let outcome = run(&mut sim, &plan, &step, &mut progress).await;
        assert!(matches!(outcome, Outcome::Hold { .. }));
        assert_eq!(sim.attempts_of("expand_location").len(), 1);

        sim.snapshot.funds = 1_000.0;
        let outcome = run(&mut sim, &plan, &step, &mut progress).await;
        assert_eq!(outcome, Outcome::Advance);
        assert_eq!(sim.attempts_of("expand_location").len(), 2);
    }

    #[tokio::test]
    async fn storage_grows_in_capped_batches() {
        let mut sim = ScriptedCollaborator::new(with_locations(1e9, &["Aevum"]));
        let plan = plan(&["Aevum"]);
        let step = Step::ResizeStorage {
            division: DIV.to_owned(),
            capacity: 1_000.0,
            max_levels_per_tick: Some(7),
        };
        let mut progress = ProgressState::new();

        let outcome = run(&mut sim, &plan, &step, &mut progress).await;
        assert!(matches!(outcome, Outcome::Hold { .. }));
        assert!(matches!(
            sim.attempts_of("resize_storage")[0],
            Action::ResizeStorage { levels: 7, .. }
        ));

        let outcome = run(&mut sim, &plan, &step, &mut progress).await;
        assert_eq!(outcome, Outcome::Advance);
        let capacity = sim.snapshot.location(DIV, "Aevum").unwrap().storage.unwrap().capacity;
        assert!((capacity - 1_000.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn roles_are_hired_then_assigned() {
        let mut sim = ScriptedCollaborator::new(with_locations(1e9, &["Aevum"]));
        let plan = plan(&["Aevum"]);
        let step = Step::StaffRoles {
            division: DIV.to_owned(),
            roles: BTreeMap::from([("Operations".to_owned(), 1), ("Business".to_owned(), 2)]),
        };
        let mut progress = ProgressState::new();

        let outcome = run(&mut sim, &plan, &step, &mut progress).await;
        assert_eq!(outcome, Outcome::Advance);
        assert_eq!(sim.attempts_of("hire_staff").len(), 3);
        let staffing = &sim.snapshot.location(DIV, "Aevum").unwrap().staffing;
        assert_eq!(staffing.employees, 3);
        assert_eq!(staffing.role_count("Business"), 2);
    }

    #[tokio::test]
    async fn materials_flag_ratchets() {
        let mut sim = ScriptedCollaborator::new(with_locations(1e9, &["Aevum"]));
        let plan = plan(&["Aevum"]);
        let step = Step::Materials {
            flag: "stock".to_owned(),
            division: DIV.to_owned(),
            targets: BTreeMap::from([("Hardware".to_owned(), 125.0)]),
            mode: PurchaseStrategy::Bulk,
        };
        let mut progress = ProgressState::new();

        let outcome = run(&mut sim, &plan, &step, &mut progress).await;
        assert_eq!(outcome, Outcome::Advance);
        assert!(progress.is_complete("stock"));

        // Stock consumed afterwards does not trigger another purchase.
        sim.snapshot
            .divisions
            .get_mut(DIV)
            .unwrap()
            .locations
            .get_mut("Aevum")
            .unwrap()
            .resources
            .get_mut("Hardware")
            .unwrap()
            .stored = 0.0;
        let outcome = run(&mut sim, &plan, &step, &mut progress).await;
        assert_eq!(outcome, Outcome::Advance);
        assert_eq!(sim.attempts_of("purchase_resource").len(), 1);
    }

    #[tokio::test]
    async fn fill_storage_buys_free_volume() {
        let mut sim = ScriptedCollaborator::new(with_locations(1e9, &["Aevum"]));
        let plan = plan(&["Aevum"]);
        let step = Step::FillStorage {
            flag: "stockpile".to_owned(),
            division: DIV.to_owned(),
            resource: "Real Estate".to_owned(),
            unit_size: 0.005,
        };
        let mut progress = ProgressState::new();

        let outcome = run(&mut sim, &plan, &step, &mut progress).await;
        assert_eq!(outcome, Outcome::Advance);
        let Action::PurchaseResource { quantity, .. } = sim.attempts_of("purchase_resource")[0]
        else {
            panic!("expected a purchase");
        };
        assert!((quantity - 20_000.0).abs() < 1e-6);
        assert!(progress.is_complete("stockpile"));
    }

    #[tokio::test]
    async fn offer_below_threshold_waits() {
        let mut snapshot = with_locations(1e6, &["Aevum"]);
        snapshot.offer = Some(MilestoneOffer {
            amount: 1.0e11,
            round: 1,
        });
        let mut sim = ScriptedCollaborator::new(snapshot);
        let step = Step::Milestone {
            round: 1,
            accept: AcceptRule::AtLeast { amount: 1.4e11 },
        };
        let mut progress = ProgressState::new();

        let outcome = run(&mut sim, &plan(&["Aevum"]), &step, &mut progress).await;
        assert!(matches!(outcome, Outcome::WaitExternal { .. }));
        assert_eq!(progress.investment_round, 0);
        assert!(sim.attempts.is_empty());
    }

    #[tokio::test]
    async fn offer_equal_to_threshold_waits() {
        let mut snapshot = with_locations(1e6, &["Aevum"]);
        snapshot.offer = Some(MilestoneOffer {
            amount: 1.4e11,
            round: 1,
        });
        let mut sim = ScriptedCollaborator::new(snapshot);
        let step = Step::Milestone {
            round: 1,
            accept: AcceptRule::AtLeast { amount: 1.4e11 },
        };
        let mut progress = ProgressState::new();

        let outcome = run(&mut sim, &plan(&["Aevum"]), &step, &mut progress).await;
        assert!(matches!(outcome, Outcome::WaitExternal { .. }));
        assert_eq!(progress.investment_round, 0);
        assert!(sim.attempts.is_empty());
    }

    #[tokio::test]
    async fn offer_above_threshold_is_accepted() {
        let mut snapshot = with_locations(1e6, &["Aevum"]);
        snapshot.offer = Some(MilestoneOffer {
            amount: 1.5e11,
            round: 1,
        });
        let mut sim = ScriptedCollaborator::new(snapshot);
        let step = Step::Milestone {
            round: 1,
            accept: AcceptRule::AtLeast { amount: 1.4e11 },
        };
        let mut progress = ProgressState::new();

        let outcome = run(&mut sim, &plan(&["Aevum"]), &step, &mut progress).await;
        assert_eq!(outcome, Outcome::Advance);
        assert_eq!(progress.investment_round, 1);
        assert!(sim.snapshot.funds > 1.5e11);
    }

    #[tokio::test]
    async fn peak_drop_accepts_after_offer_falls() {
        let mut snapshot = with_locations(1e6, &["Aevum"]);
        snapshot.offer = Some(MilestoneOffer {
            amount: 200e9,
            round: 1,
        });
        let mut sim = ScriptedCollaborator::new(snapshot);
        let step = Step::Milestone {
            round: 1,
            accept: AcceptRule::PeakDrop {
                floor: 100e9,
                drop_ratio: 0.95,
                depleted_resource: Some(DepletedResource {
                    division: DIV.to_owned(),
                    resource: "Real Estate".to_owned(),
                    below: -1.0,
                }),
            },
        };
        let plan = plan(&["Aevum"]);
        let mut progress = ProgressState::new();

        let outcome = run(&mut sim, &plan, &step, &mut progress).await;
        assert!(matches!(outcome, Outcome::WaitExternal { .. }));
        assert!((progress.peak_offer - 200e9).abs() < 1.0);

        sim.snapshot.offer = Some(MilestoneOffer {
            amount: 180e9,
            round: 1,
        });
        let outcome = run(&mut sim, &plan, &step, &mut progress).await;
        assert_eq!(outcome, Outcome::Advance);
        assert_eq!(progress.investment_round, 1);
    }

    #[tokio::test]
    async fn later_round_offer_means_already_accepted() {
        let mut snapshot = with_locations(1e6, &["Aevum"]);
        snapshot.offer = Some(MilestoneOffer {
            amount: 1.0,
            round: 2,
        });
        let mut sim = ScriptedCollaborator::new(snapshot);
        let step = Step::Milestone {
            round: 1,
            accept: AcceptRule::AtLeast { amount: 1.4e11 },
        };
        let mut progress = ProgressState::new();

        let outcome = run(&mut sim, &plan(&["Aevum"]), &step, &mut progress).await;
        assert_eq!(outcome, Outcome::Advance);
        assert_eq!(progress.investment_round, 1);
        assert!(sim.attempts.is_empty());
    }

    #[test]
    fn cycles_count_only_transitions_into_start() {
        let mut progress = ProgressState::new();
        let mut snapshot = Snapshot::default();
        let states = [
            CycleState::Start,
            CycleState::Start,
            CycleState::Purchase,
            CycleState::Start,
            CycleState::Sale,
            CycleState::Start,
        ];
        let mut outcome = Outcome::hold("unset");
        for state in states {
            snapshot.cycle_state = state;
            outcome = wait_cycles(&snapshot, &mut progress, 2);
        }
        assert_eq!(progress.cycles_waited, 2);
        assert_eq!(outcome, Outcome::Advance);
    }

    #[tokio::test]
    async fn maintenance_never_advances() {
        let mut sim = ScriptedCollaborator::new(with_locations(5e12, &["Aevum"]));
        let step = Step::Maintenance {
            capability: "Wilson Analytics".to_owned(),
            surplus_threshold: 3e12,
        };
        let mut progress = ProgressState::new();

        let outcome = run(&mut sim, &plan(&["Aevum"]), &step, &mut progress).await;
        assert!(matches!(outcome, Outcome::Hold { .. }));
        assert_eq!(sim.snapshot.capability_level("Wilson Analytics"), 1);
    }

    #[tokio::test]
    async fn missing_division_is_an_invariant_violation() {
        let mut sim = ScriptedCollaborator::new(Snapshot::default());
        let snapshot = sim.snapshot.clone();
        let mut exec = GatedExecutor::new(&mut sim, 0.0, 1.0);
        let mut progress = ProgressState::new();
        let result = run_step(
            &Step::EnsureStorage {
                division: DIV.to_owned(),
            },
            &plan(&["Aevum"]),
            &snapshot,
            &mut progress,
            &mut exec,
        )
        .await;
        assert!(matches!(result, Err(EngineError::Invariant { .. })));
    }
}
