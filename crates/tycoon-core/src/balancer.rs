//! Deficit balancer.
//!
//! Given target stock levels per `(resource, location)` and the tick's
//! snapshot, the balancer works out which tuples are short and tops each one
//! up through the [`GatedExecutor`]. It supports the two purchase modes the
//! entity offers:
//!
//! - **Bulk**: buy the whole shortfall now. A tuple counts as met this tick
//!   once `current + units bought >= target`.
//! - **Rate**: set a per-cycle buy rate of `shortfall / ticks_to_fill`.
//!   Nothing arrives within the tick, so only the snapshot's stock counts;
//!   once every tuple is met, all buy rates are set back to zero.
//!
//! A deficit set is satisfied only when every tuple is met in the same tick
//! and, in rate mode, no met tuple is left with a buy rate still running.

use serde::Serialize;
use tracing::debug;
use tycoon_types::{Action, PurchaseMode, Snapshot};

use crate::collaborator::Collaborator;
use crate::error::EngineError;
use crate::executor::{Attempt, GatedExecutor};
use crate::plan::PurchaseStrategy;

/// Buy rates closer than this are treated as equal.
const RATE_EPSILON: f64 = 1e-9;

/// A target stock level for one resource at one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetStock {
    /// Resource name.
    pub resource: String,
    /// Location name.
    pub location: String,
    /// Units wanted on hand.
    pub target_qty: f64,
}

/// The gap between target and current stock for one tuple.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeficitRequest {
    /// Resource name.
    pub resource: String,
    /// Location name.
    pub location: String,
    /// Units wanted on hand.
    pub target_qty: f64,
    /// Units on hand.
    pub current_qty: f64,
}

impl DeficitRequest {
    /// Units still missing; never negative.
    pub const fn shortfall(&self) -> f64 {
        (self.target_qty - self.current_qty).max(0.0)
    }

    /// Whether the target is met.
    pub const fn is_met(&self) -> bool {
        self.current_qty >= self.target_qty
    }
}

/// What one balancing pass achieved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BalanceReport {
    /// Tuples still short after this pass.
    pub outstanding: Vec<DeficitRequest>,
    /// Whether every attempted purchase delivered something.
    pub all_purchased: bool,
    /// Purchases attempted.
    pub attempted: usize,
    /// Met tuples whose buy rate could not be set back to zero.
    pub live_rates: usize,
}

impl BalanceReport {
    /// Whether every tuple is met this tick with nothing left buying.
    pub const fn satisfied(&self) -> bool {
        self.outstanding.is_empty() && self.live_rates == 0
    }
}

/// Expand per-resource targets across locations.
pub fn expand_targets<'a>(
    targets: impl IntoIterator<Item = (&'a String, &'a f64)>,
    locations: &[String],
) -> Vec<TargetStock> {
    let targets: Vec<(&String, &f64)> = targets.into_iter().collect();
    locations
        .iter()
        .flat_map(|location| {
            targets.iter().map(move |&(resource, &target_qty)| TargetStock {
                resource: resource.clone(),
                location: location.clone(),
                target_qty,
            })
        })
        .collect()
}

/// Compare every target against the snapshot.
///
/// Returns one [`DeficitRequest`] per target, met or not.
///
/// # Errors
///
/// Returns [`EngineError::Invariant`] if a target names a location the
/// division does not have: materials steps only run after expansion, so a
/// missing location means the plan or the record is wrong.
pub fn compute_deficits(
    snapshot: &Snapshot,
    division: &str,
    targets: &[TargetStock],
) -> Result<Vec<DeficitRequest>, EngineError> {
    targets
        .iter()
        .map(|t| {
            let location = snapshot.location(division, &t.location).ok_or_else(|| {
                EngineError::invariant(format!(
                    "materials target for {division}/{} but the location does not exist",
                    t.location
                ))
            })?;
            Ok(DeficitRequest {
                resource: t.resource.clone(),
                location: t.location.clone(),
                target_qty: t.target_qty,
                current_qty: location.stored(&t.resource),
            })
        })
        .collect()
}

/// Run one balancing pass.
///
/// # Errors
///
/// Returns [`EngineError`] if a target location is missing or the
/// collaborator fails. Budget shortfalls are reported through
/// [`BalanceReport::all_purchased`], not as errors.
pub async fn balance<C: Collaborator>(
    exec: &mut GatedExecutor<'_, C>,
    snapshot: &Snapshot,
    division: &str,
    targets: &[TargetStock],
    strategy: PurchaseStrategy,
) -> Result<BalanceReport, EngineError> {
    let deficits = compute_deficits(snapshot, division, targets)?;
    match strategy {
        PurchaseStrategy::Bulk => balance_bulk(exec, division, deficits).await,
        PurchaseStrategy::Rate { ticks_to_fill } => {
            balance_rate(exec, snapshot, division, deficits, ticks_to_fill).await
        }
    }
}

async fn balance_bulk<C: Collaborator>(
    exec: &mut GatedExecutor<'_, C>,
    division: &str,
    deficits: Vec<DeficitRequest>,
) -> Result<BalanceReport, EngineError> {
    let mut report = BalanceReport {
        all_purchased: true,
        ..BalanceReport::default()
    };

    for mut deficit in deficits {
        if deficit.is_met() {
            continue;
        }
        let quantity = deficit.shortfall();
        let action = purchase(division, &deficit, quantity, PurchaseMode::Bulk);
        report.attempted = report.attempted.saturating_add(1);

        let attempt = exec.attempt(&action).await?;
        let units = attempt.units();
        debug!(
            location = %deficit.location,
            resource = %deficit.resource,
            requested = quantity,
            units,
            "bulk top-up"
        );
        if units <= 0.0 {
            report.all_purchased = false;
        }
        deficit.current_qty += units;
        if !deficit.is_met() {
            report.outstanding.push(deficit);
        }
    }
    Ok(report)
}

async fn balance_rate<C: Collaborator>(
    exec: &mut GatedExecutor<'_, C>,
    snapshot: &Snapshot,
    division: &str,
    deficits: Vec<DeficitRequest>,
    ticks_to_fill: u32,
) -> Result<BalanceReport, EngineError> {
    let ticks = f64::from(ticks_to_fill.max(1));
    let outstanding: Vec<DeficitRequest> =
        deficits.iter().filter(|d| !d.is_met()).cloned().collect();
    let mut report = BalanceReport {
        outstanding,
        all_purchased: true,
        attempted: 0,
        live_rates: 0,
    };

    for deficit in &deficits {
        // Met tuples stop buying so they do not overshoot.
        let desired = if deficit.is_met() {
            0.0
        } else {
            deficit.shortfall() / ticks
        };
        let current_rate = snapshot
            .location(division, &deficit.location)
            .and_then(|l| l.resource(&deficit.resource))
            .map_or(0.0, |r| r.buy_rate);
        if (current_rate - desired).abs() < RATE_EPSILON {
            continue;
        }

        let action = purchase(division, deficit, desired, PurchaseMode::Rate);
        report.attempted = report.attempted.saturating_add(1);
        if let Attempt::Blocked(reason) = exec.attempt(&action).await? {
            debug!(
                location = %deficit.location,
                resource = %deficit.resource,
                %reason,
                "buy rate blocked"
            );
            report.all_purchased = false;
            if deficit.is_met() {
                report.live_rates = report.live_rates.saturating_add(1);
            }
        }
    }
    Ok(report)
}

fn purchase(division: &str, deficit: &DeficitRequest, quantity: f64, mode: PurchaseMode) -> Action {
    Action::PurchaseResource {
        division: division.to_owned(),
        location: deficit.location.clone(),
        resource: deficit.resource.clone(),
        quantity,
        mode,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use tycoon_types::{ActionResponse, DivisionView, LocationView, ResourceView};

    use super::*;
    use crate::collaborator::scripted::ScriptedCollaborator;

    fn snapshot_with(stock: &[(&str, &str, f64)]) -> Snapshot {
        let mut division = DivisionView::default();
        for &(location, resource, stored) in stock {
            division
                .locations
                .entry(location.to_owned())
                .or_insert_with(LocationView::default)
                .resources
                .insert(
                    resource.to_owned(),
                    ResourceView {
                        stored,
                        ..ResourceView::default()
                    },
                );
        }
        Snapshot {
            funds: 1e9,
            divisions: BTreeMap::from([("Agri".to_owned(), division)]),
            ..Snapshot::default()
        }
    }

    fn target(location: &str, resource: &str, qty: f64) -> TargetStock {
        TargetStock {
            resource: resource.to_owned(),
            location: location.to_owned(),
            target_qty: qty,
        }
    }

    #[test]
    fn expand_targets_covers_every_location() {
        let targets = BTreeMap::from([("Hardware".to_owned(), 125.0), ("AI Cores".to_owned(), 75.0)]);
        let locations = vec!["Aevum".to_owned(), "Ishima".to_owned()];
        let expanded = expand_targets(&targets, &locations);
        assert_eq!(expanded.len(), 4);
        assert!(expanded.iter().any(|t| t.location == "Ishima" && t.resource == "Hardware"));
    }

    #[test]
    fn missing_location_is_an_invariant_violation() {
        let snap = snapshot_with(&[("Aevum", "Hardware", 0.0)]);
        let result = compute_deficits(&snap, "Agri", &[target("Volhaven", "Hardware", 1.0)]);
        assert!(matches!(result, Err(EngineError::Invariant { .. })));
    }

    #[tokio::test]
    async fn bulk_requests_exact_shortfall() {
        let snap = snapshot_with(&[("Aevum", "Hardware", 100.0)]);
        let mut sim = ScriptedCollaborator::new(snap.clone());
        let mut exec = GatedExecutor::new(&mut sim, snap.funds, 1.0);

        let report = balance(
            &mut exec,
            &snap,
            "Agri",
            &[target("Aevum", "Hardware", 125.0)],
            PurchaseStrategy::Bulk,
        )
        .await
        .unwrap();

        assert!(report.satisfied());
        assert!(report.all_purchased);
        match sim.attempts.as_slice() {
            [Action::PurchaseResource { quantity, .. }] => {
                assert!((quantity - 25.0).abs() < 1e-9);
            }
            other => panic!("unexpected attempts: {other:?}"),
        }
    }

    #[tokio::test]
    async fn zero_unit_purchase_keeps_set_unsatisfied() {
        let snap = snapshot_with(&[("Aevum", "Hardware", 100.0), ("Aevum", "AI Cores", 75.0)]);
        let mut sim = ScriptedCollaborator::new(snap.clone());
        sim.queued_responses
            .push_back(ActionResponse::Purchased { units: 0.0 });
        let mut exec = GatedExecutor::new(&mut sim, snap.funds, 1.0);

        let report = balance(
            &mut exec,
            &snap,
            "Agri",
            &[target("Aevum", "Hardware", 125.0), target("Aevum", "AI Cores", 75.0)],
            PurchaseStrategy::Bulk,
        )
        .await
        .unwrap();

        assert!(!report.satisfied());
        assert!(!report.all_purchased);
        assert_eq!(report.outstanding.len(), 1);
        assert_eq!(report.attempted, 1);
    }

    #[tokio::test]
    async fn blocked_tuple_does_not_stop_others() {
        let snap = snapshot_with(&[("Aevum", "Hardware", 0.0), ("Ishima", "Hardware", 0.0)]);
        let mut sim = ScriptedCollaborator::new(snap.clone()).with_unit_cost(1.0);
        // Enough for one location only.
        let mut exec = GatedExecutor::new(&mut sim, 150.0, 1.0);

        let report = balance(
            &mut exec,
            &snap,
            "Agri",
            &[target("Aevum", "Hardware", 100.0), target("Ishima", "Hardware", 100.0)],
            PurchaseStrategy::Bulk,
        )
        .await
        .unwrap();

        assert_eq!(report.attempted, 2);
        assert_eq!(report.outstanding.len(), 1);
        assert_eq!(report.outstanding[0].location, "Ishima");
        assert_eq!(sim.attempts.len(), 1);
    }

    #[tokio::test]
    async fn rate_mode_spreads_shortfall_and_never_satisfies_early() {
        let snap = snapshot_with(&[("Aevum", "Hardware", 25.0)]);
        let mut sim = ScriptedCollaborator::new(snap.clone());
        let mut exec = GatedExecutor::new(&mut sim, snap.funds, 1.0);

        let report = balance(
            &mut exec,
            &snap,
            "Agri",
            &[target("Aevum", "Hardware", 125.0)],
            PurchaseStrategy::Rate { ticks_to_fill: 10 },
        )
        .await
        .unwrap();

        assert!(!report.satisfied());
        match sim.attempts.as_slice() {
            [Action::PurchaseResource { quantity, mode, .. }] => {
                assert_eq!(*mode, PurchaseMode::Rate);
                assert!((quantity - 10.0).abs() < 1e-9);
            }
            other => panic!("unexpected attempts: {other:?}"),
        }
    }

    #[tokio::test]
    async fn rate_mode_zeroes_rates_once_met() {
        let mut snap = snapshot_with(&[("Aevum", "Hardware", 130.0)]);
        snap.divisions
            .get_mut("Agri")
            .unwrap()
            .locations
            .get_mut("Aevum")
            .unwrap()
            .resources
            .get_mut("Hardware")
            .unwrap()
            .buy_rate = 10.0;
        let mut sim = ScriptedCollaborator::new(snap.clone());
        let mut exec = GatedExecutor::new(&mut sim, snap.funds, 1.0);

        let report = balance(
            &mut exec,
            &snap,
            "Agri",
            &[target("Aevum", "Hardware", 125.0)],
            PurchaseStrategy::Rate { ticks_to_fill: 10 },
        )
        .await
        .unwrap();

        assert!(report.satisfied());
        match sim.attempts.as_slice() {
            [Action::PurchaseResource { quantity, .. }] => assert!(quantity.abs() < 1e-9),
            other => panic!("unexpected attempts: {other:?}"),
        }
    }

    #[tokio::test]
    async fn refused_rate_reset_keeps_set_unsatisfied() {
        let mut snap = snapshot_with(&[("Aevum", "Hardware", 130.0)]);
        snap.divisions
            .get_mut("Agri")
            .unwrap()
            .locations
            .get_mut("Aevum")
            .unwrap()
            .resources
            .get_mut("Hardware")
            .unwrap()
            .buy_rate = 5.0;
        let mut sim = ScriptedCollaborator::new(snap.clone());
        sim.queued_responses.push_back(ActionResponse::Rejected {
            reason: "market closed".to_owned(),
        });
        let mut exec = GatedExecutor::new(&mut sim, snap.funds, 1.0);

        let report = balance(
            &mut exec,
            &snap,
            "Agri",
            &[target("Aevum", "Hardware", 125.0)],
            PurchaseStrategy::Rate { ticks_to_fill: 10 },
        )
        .await
        .unwrap();

        assert!(report.outstanding.is_empty());
        assert_eq!(report.live_rates, 1);
        assert!(!report.satisfied());
        let rate = sim
            .snapshot
            .location("Agri", "Aevum")
            .and_then(|l| l.resource("Hardware"))
            .unwrap()
            .buy_rate;
        assert!((rate - 5.0).abs() < 1e-9);
    }
}
