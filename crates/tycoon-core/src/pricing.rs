//! Price feedback controller.
//!
//! Once production is running, every product's ask price is re-derived each
//! cycle from two ratios read off the snapshot:
//!
//! - `fill = stored / storage capacity`
//! - `sales_ratio = actual sell rate / production rate` (0 with no production)
//!
//! The first matching [`PriceRule`] wins, in declaration order, so congestion
//! relief always beats profit-seeking nudges. The controller keeps no state
//! between ticks: the "current" price is whatever the snapshot says, so a
//! failed or skipped push simply gets re-decided next cycle.

use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info};
use tycoon_types::{Action, CycleState, ObservedPrice, PriceMultiplier, ProgressState, Snapshot};

use crate::collaborator::{Collaborator, CollaboratorError};
use crate::executor::{Attempt, GatedExecutor};
use crate::plan::PricingConfig;

/// Fill fraction above which congestion relief kicks in.
const CONGESTION_FILL: f64 = 0.10;

/// Lowest multiplier congestion relief will set.
const CONGESTION_FLOOR: f64 = 0.4;

/// The ordered pricing rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceRule {
    /// `fill > 0.10`: `max(0.4, 1 - 2 × fill)`.
    Congestion,
    /// `stored > 2 × production` and `sales_ratio < 0.95`: `0.90`.
    Backlog,
    /// `stored < 0.1 × production` and `0.99 <= sales_ratio <= 1.01`: `1.02`.
    SellThrough,
    /// `stored < production` and `sales > 1.05 × production`: `1.05`.
    Overselling,
    /// `0.95 <= sales_ratio < 0.99` and `stored < 2 × production`: `1.01`.
    SweetSpot,
    /// `sales_ratio < 0.90` and `stored > 0`: `0.85`.
    Underselling,
    /// Nothing matched: plain market price.
    Market,
}

/// The snapshot figures a price decision depends on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceInputs {
    /// Units on hand.
    pub stored: f64,
    /// Storage capacity at the location.
    pub capacity: f64,
    /// Units produced per cycle.
    pub production: f64,
    /// Units actually sold per cycle.
    pub actual_sales: f64,
}

impl PriceInputs {
    /// Share of storage this product occupies.
    pub fn fill(&self) -> f64 {
        if self.capacity > 0.0 {
            self.stored / self.capacity
        } else {
            0.0
        }
    }

    /// Sales as a share of production.
    pub fn sales_ratio(&self) -> f64 {
        if self.production > 0.0 {
            self.actual_sales / self.production
        } else {
            0.0
        }
    }
}

/// Pick the first matching rule and the multiplier it sets.
pub fn decide(inputs: &PriceInputs) -> (PriceRule, PriceMultiplier) {
    let fill = inputs.fill();
    let ratio = inputs.sales_ratio();
    let stored = inputs.stored;
    let production = inputs.production;

    if fill > CONGESTION_FILL {
        let factor = (1.0 - 2.0 * fill).max(CONGESTION_FLOOR);
        (PriceRule::Congestion, PriceMultiplier::from_factor(factor))
    } else if stored > 2.0 * production && ratio < 0.95 {
        (PriceRule::Backlog, hundredths(90))
    } else if stored < 0.1 * production && (0.99..=1.01).contains(&ratio) {
        (PriceRule::SellThrough, hundredths(102))
    } else if stored < production && inputs.actual_sales > 1.05 * production {
        (PriceRule::Overselling, hundredths(105))
    } else if (0.95..0.99).contains(&ratio) && stored < 2.0 * production {
        (PriceRule::SweetSpot, hundredths(101))
    } else if ratio < 0.90 && stored > 0.0 {
        (PriceRule::Underselling, hundredths(85))
    } else {
        (PriceRule::Market, PriceMultiplier::MARKET)
    }
}

fn hundredths(value: i64) -> PriceMultiplier {
    PriceMultiplier::new(Decimal::new(value, 2))
}

/// A price the controller wants to push.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceChange {
    /// Division name.
    pub division: String,
    /// Location name.
    pub location: String,
    /// Product name.
    pub resource: String,
    /// Price currently set.
    pub from: ObservedPrice,
    /// Price to set.
    pub to: PriceMultiplier,
    /// Rule that produced `to`.
    pub rule: PriceRule,
}

/// Whether the controller should run this tick.
pub fn pricing_open(config: &PricingConfig, progress: &ProgressState, snapshot: &Snapshot) -> bool {
    progress.phase >= config.from_phase && snapshot.cycle_state == CycleState::Start
}

/// Decide the price changes a snapshot calls for.
///
/// Only products that are being sold, have nonzero production, and sit in
/// a location with storage are considered. A change is emitted only when
/// the decided price differs from the one the snapshot reports; a price that
/// is not a multiplier always differs.
pub fn plan_adjustments(snapshot: &Snapshot, config: &PricingConfig) -> Vec<PriceChange> {
    let Some(division) = snapshot.division(&config.division) else {
        return Vec::new();
    };

    let mut changes = Vec::new();
    for (location_name, location) in &division.locations {
        let Some(storage) = location.storage else {
            continue;
        };
        for product in &config.products {
            let Some(resource) = location.resource(product) else {
                continue;
            };
            let Some(policy) = resource.sell_policy.as_ref().filter(|p| p.is_active()) else {
                continue;
            };
            if resource.production_rate <= 0.0 {
                continue;
            }

            let inputs = PriceInputs {
                stored: resource.stored,
                capacity: storage.capacity,
                production: resource.production_rate,
                actual_sales: resource.actual_sell_rate,
            };
            let (rule, to) = decide(&inputs);
            if !policy.price.is(to) {
                changes.push(PriceChange {
                    division: config.division.clone(),
                    location: location_name.clone(),
                    resource: product.clone(),
                    from: policy.price.clone(),
                    to,
                    rule,
                });
            }
        }
    }
    changes
}

/// Push price changes, returning those that took effect.
///
/// # Errors
///
/// Returns [`CollaboratorError`] if the collaborator fails; blocked pushes
/// are skipped and re-decided next cycle.
pub async fn apply_adjustments<C: Collaborator>(
    exec: &mut GatedExecutor<'_, C>,
    changes: Vec<PriceChange>,
) -> Result<Vec<PriceChange>, CollaboratorError> {
    let mut applied = Vec::with_capacity(changes.len());
    for change in changes {
        let action = Action::SetSellPolicy {
            division: change.division.clone(),
            location: change.location.clone(),
            resource: change.resource.clone(),
            amount: "MAX".to_owned(),
            price: change.to,
        };
        match exec.attempt(&action).await? {
            Attempt::Done(_) => {
                info!(
                    location = %change.location,
                    resource = %change.resource,
                    from = %change.from,
                    to = %change.to,
                    rule = ?change.rule,
                    "price adjusted"
                );
                applied.push(change);
            }
            Attempt::Blocked(reason) => {
                debug!(
                    location = %change.location,
                    resource = %change.resource,
                    %reason,
                    "price push blocked"
                );
            }
        }
    }
    Ok(applied)
}

/// Run the controller for one tick if it is open.
///
/// # Errors
///
/// Returns [`CollaboratorError`] if the collaborator fails.
pub async fn run_pricing<C: Collaborator>(
    exec: &mut GatedExecutor<'_, C>,
    snapshot: &Snapshot,
    progress: &ProgressState,
    config: &PricingConfig,
) -> Result<Vec<PriceChange>, CollaboratorError> {
    if !pricing_open(config, progress, snapshot) {
        return Ok(Vec::new());
    }
    let changes = plan_adjustments(snapshot, config);
    apply_adjustments(exec, changes).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal_macros::dec;
    use tycoon_types::{DivisionView, LocationView, ResourceView, SellPolicy, StorageView};

    use super::*;
    use crate::collaborator::scripted::ScriptedCollaborator;

    fn inputs(stored: f64, capacity: f64, production: f64, sales: f64) -> PriceInputs {
        PriceInputs {
            stored,
            capacity,
            production,
            actual_sales: sales,
        }
    }

    #[test]
    fn congestion_beats_sweet_spot() {
        // fill 0.5, sales ratio 0.97
        let (rule, price) = decide(&inputs(50.0, 100.0, 10.0, 9.7));
        assert_eq!(rule, PriceRule::Congestion);
        assert_eq!(price.value(), dec!(0.4));
    }

    #[test]
    fn congestion_scales_with_fill() {
        let (rule, price) = decide(&inputs(15.0, 100.0, 100.0, 100.0));
        assert_eq!(rule, PriceRule::Congestion);
        assert_eq!(price.value(), dec!(0.70));
    }

    #[test]
    fn backlog_cuts_to_ninety() {
        let (rule, price) = decide(&inputs(25.0, 1_000.0, 10.0, 5.0));
        assert_eq!(rule, PriceRule::Backlog);
        assert_eq!(price.value(), dec!(0.90));
    }

    #[test]
    fn sell_through_bounds_are_inclusive() {
        let (rule, price) = decide(&inputs(0.5, 1_000.0, 10.0, 9.9));
        assert_eq!(rule, PriceRule::SellThrough);
        assert_eq!(price.value(), dec!(1.02));
        let (rule, _) = decide(&inputs(0.5, 1_000.0, 10.0, 10.1));
        assert_eq!(rule, PriceRule::SellThrough);
    }

    #[test]
    fn overselling_raises_price() {
        let (rule, price) = decide(&inputs(5.0, 1_000.0, 10.0, 11.0));
        assert_eq!(rule, PriceRule::Overselling);
        assert_eq!(price.value(), dec!(1.05));
    }

    #[test]
    fn sweet_spot_nudges_up() {
        let (rule, price) = decide(&inputs(5.0, 1_000.0, 10.0, 9.7));
        assert_eq!(rule, PriceRule::SweetSpot);
        assert_eq!(price.value(), dec!(1.01));
    }

    #[test]
    fn underselling_cuts_price() {
        let (rule, price) = decide(&inputs(5.0, 1_000.0, 10.0, 8.0));
        assert_eq!(rule, PriceRule::Underselling);
        assert_eq!(price.value(), dec!(0.85));
    }

    #[test]
    fn balanced_falls_back_to_market() {
        let (rule, price) = decide(&inputs(5.0, 1_000.0, 10.0, 10.0));
        assert_eq!(rule, PriceRule::Market);
        assert!(price.is_market());
    }

    fn priced_snapshot(price: PriceMultiplier, cycle: CycleState) -> Snapshot {
        let location = LocationView {
            storage: Some(StorageView {
                capacity: 100.0,
                used: 15.0,
            }),
            resources: BTreeMap::from([
                (
                    "Plants".to_owned(),
                    ResourceView {
                        stored: 15.0,
                        production_rate: 10.0,
                        actual_sell_rate: 10.0,
                        sell_policy: Some(SellPolicy::max_at(price)),
                        ..ResourceView::default()
                    },
                ),
                (
                    "Food".to_owned(),
                    ResourceView {
                        stored: 40.0,
                        production_rate: 0.0,
                        sell_policy: Some(SellPolicy::max_at(PriceMultiplier::MARKET)),
                        ..ResourceView::default()
                    },
                ),
            ]),
            ..LocationView::default()
        };
        Snapshot {
            funds: 1e6,
            cycle_state: cycle,
            divisions: BTreeMap::from([(
                "Agri".to_owned(),
                DivisionView {
                    locations: BTreeMap::from([("Aevum".to_owned(), location)]),
                    ..DivisionView::default()
                },
            )]),
            ..Snapshot::default()
        }
    }

    fn config() -> PricingConfig {
        PricingConfig {
            division: "Agri".to_owned(),
            products: vec!["Plants".to_owned(), "Food".to_owned()],
            from_phase: 2,
        }
    }

    #[test]
    fn only_changed_prices_are_planned() {
        let snap = priced_snapshot(PriceMultiplier::MARKET, CycleState::Start);
        let changes = plan_adjustments(&snap, &config());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].resource, "Plants");
        assert_eq!(changes[0].to.to_string(), "MP*0.70");

        let settled = priced_snapshot(PriceMultiplier::from_factor(0.7), CycleState::Start);
        assert!(plan_adjustments(&settled, &config()).is_empty());
    }

    #[test]
    fn hand_set_price_is_overwritten() {
        let mut snap = priced_snapshot(PriceMultiplier::MARKET, CycleState::Start);
        let plants = snap
            .divisions
            .get_mut("Agri")
            .and_then(|d| d.locations.get_mut("Aevum"))
            .and_then(|l| l.resources.get_mut("Plants"))
            .unwrap();
        plants.sell_policy = Some(SellPolicy {
            amount: "MAX".to_owned(),
            price: ObservedPrice::Other("1200".to_owned()),
        });

        let changes = plan_adjustments(&snap, &config());
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].from, ObservedPrice::Other("1200".to_owned()));
        assert_eq!(changes[0].to.to_string(), "MP*0.70");
    }

    #[tokio::test]
    async fn pricing_waits_for_cycle_start_and_phase() {
        let mut progress = ProgressState::new();
        progress.phase = 2;

        let mid_cycle = priced_snapshot(PriceMultiplier::MARKET, CycleState::Production);
        let mut sim = ScriptedCollaborator::new(mid_cycle.clone());
        let mut exec = GatedExecutor::new(&mut sim, mid_cycle.funds, 1.0);
        let applied = run_pricing(&mut exec, &mid_cycle, &progress, &config())
            .await
            .unwrap();
        assert!(applied.is_empty());

        let early = ProgressState::new();
        let start = priced_snapshot(PriceMultiplier::MARKET, CycleState::Start);
        assert!(!pricing_open(&config(), &early, &start));

        let mut sim = ScriptedCollaborator::new(start.clone());
        let mut exec = GatedExecutor::new(&mut sim, start.funds, 1.0);
        let applied = run_pricing(&mut exec, &start, &progress, &config())
            .await
            .unwrap();
        assert_eq!(applied.len(), 1);
        assert_eq!(sim.attempts_of("set_sell_policy").len(), 1);
    }
}
