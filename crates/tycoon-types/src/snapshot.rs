//! Per-tick, read-only view of the controlled entity.
//!
//! A [`Snapshot`] is fetched once at the start of every tick and threaded
//! through every decision made in that tick. The engine never caches a
//! snapshot across ticks.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::price::{ObservedPrice, PriceMultiplier};

/// The entity's coarse processing cycle.
///
/// Pricing is only re-evaluated when the cycle reads [`CycleState::Start`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleState {
    /// Beginning of a cycle.
    #[default]
    Start,
    /// Resources are being bought.
    Purchase,
    /// Resources are being produced.
    Production,
    /// Resources are being moved between locations.
    Export,
    /// Resources are being sold.
    Sale,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Start => "START",
            Self::Purchase => "PURCHASE",
            Self::Production => "PRODUCTION",
            Self::Export => "EXPORT",
            Self::Sale => "SALE",
        };
        f.write_str(label)
    }
}

/// Point-in-time view of everything the engine needs to decide on.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    /// Currency available to spend.
    pub funds: f64,
    /// Current processing cycle.
    pub cycle_state: CycleState,
    /// Divisions by name.
    pub divisions: BTreeMap<String, DivisionView>,
    /// One-time unlocks already purchased.
    pub unlocks: BTreeSet<String>,
    /// Entity-wide capability levels.
    pub capability_levels: BTreeMap<String, u32>,
    /// The outstanding milestone offer, if any.
    pub offer: Option<MilestoneOffer>,
}

impl Snapshot {
    /// Look up a division by name.
    pub fn division(&self, name: &str) -> Option<&DivisionView> {
        self.divisions.get(name)
    }

    /// Look up a location within a division.
    pub fn location(&self, division: &str, location: &str) -> Option<&LocationView> {
        self.division(division)
            .and_then(|d| d.locations.get(location))
    }

    /// Whether a one-time unlock has been purchased.
    pub fn has_unlock(&self, name: &str) -> bool {
        self.unlocks.contains(name)
    }

    /// Current level of an entity-wide capability. Unknown capabilities are
    /// level zero.
    pub fn capability_level(&self, name: &str) -> u32 {
        self.capability_levels.get(name).copied().unwrap_or(0)
    }
}

/// A line of business.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DivisionView {
    /// Industry the division operates in.
    pub industry: String,
    /// Locations the division has expanded to, by name.
    pub locations: BTreeMap<String, LocationView>,
    /// Per-division capability levels (advertising and similar).
    pub capability_levels: BTreeMap<String, u32>,
    /// Research points accumulated.
    pub research_points: f64,
}

impl DivisionView {
    /// Current level of a division-scoped capability.
    pub fn capability_level(&self, name: &str) -> u32 {
        self.capability_levels.get(name).copied().unwrap_or(0)
    }
}

/// A site within a division.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationView {
    /// Staffing at this location.
    pub staffing: StaffingView,
    /// Storage at this location; `None` until purchased.
    pub storage: Option<StorageView>,
    /// Resources held at this location, by name.
    pub resources: BTreeMap<String, ResourceView>,
    /// Whether automatic input supply is turned on.
    pub supply_enabled: bool,
}

impl LocationView {
    /// Look up a resource by name.
    pub fn resource(&self, name: &str) -> Option<&ResourceView> {
        self.resources.get(name)
    }

    /// Units of a resource on hand. Unknown resources hold zero.
    pub fn stored(&self, name: &str) -> f64 {
        self.resource(name).map_or(0.0, |r| r.stored)
    }
}

/// Headcount and role assignment at a location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaffingView {
    /// Positions available.
    pub size: u32,
    /// Staff currently employed.
    pub employees: u32,
    /// Staff per role.
    pub roles: BTreeMap<String, u32>,
}

impl StaffingView {
    /// Staff assigned to a role.
    pub fn role_count(&self, role: &str) -> u32 {
        self.roles.get(role).copied().unwrap_or(0)
    }

    /// Open positions not yet filled.
    pub const fn vacancies(&self) -> u32 {
        self.size.saturating_sub(self.employees)
    }
}

/// Capacity and usage of a location's storage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageView {
    /// Total capacity.
    pub capacity: f64,
    /// Capacity in use.
    pub used: f64,
}

impl StorageView {
    /// Fraction of capacity in use. Zero when capacity is zero.
    pub fn fill_fraction(&self) -> f64 {
        if self.capacity > 0.0 {
            self.used / self.capacity
        } else {
            0.0
        }
    }

    /// Capacity still free.
    pub const fn free(&self) -> f64 {
        (self.capacity - self.used).max(0.0)
    }
}

/// A stock of one resource at one location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceView {
    /// Units on hand.
    pub stored: f64,
    /// Units produced per cycle.
    pub production_rate: f64,
    /// Units actually sold per cycle.
    pub actual_sell_rate: f64,
    /// Units bought per cycle at the configured rate.
    pub buy_rate: f64,
    /// Active sell policy, if any.
    pub sell_policy: Option<SellPolicy>,
}

/// How much of a resource to sell and at what price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellPolicy {
    /// Amount expression (`MAX`, a number, or `0` for "not selling").
    pub amount: String,
    /// Ask price.
    pub price: ObservedPrice,
}

impl SellPolicy {
    /// Sell everything at the given price.
    pub fn max_at(price: PriceMultiplier) -> Self {
        Self {
            amount: "MAX".to_owned(),
            price: price.into(),
        }
    }

    /// Whether the policy actually sells anything.
    pub fn is_active(&self) -> bool {
        let amount = self.amount.trim();
        !amount.is_empty() && amount != "0"
    }
}

/// A standing external offer at a milestone.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MilestoneOffer {
    /// Offered amount.
    pub amount: f64,
    /// Milestone round the offer belongs to (1-based).
    pub round: u32,
}
