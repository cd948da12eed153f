//! The vocabulary of mutating actions the engine can attempt.
//!
//! Every change the engine makes to the controlled entity is one [`Action`].
//! Actions are priced by the collaborator before being attempted, and the
//! collaborator answers each attempt with an [`ActionResponse`].

use serde::{Deserialize, Serialize};

use crate::price::PriceMultiplier;

/// How a resource purchase is carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseMode {
    /// Buy the whole quantity in one transaction.
    #[default]
    Bulk,
    /// Set a standing per-cycle buy rate of `quantity` units.
    Rate,
}

/// A single mutating operation on the controlled entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Open a new division.
    CreateDivision {
        /// Division name.
        division: String,
        /// Industry it operates in.
        industry: String,
    },
    /// Buy a one-time unlock.
    Unlock {
        /// Unlock name.
        name: String,
    },
    /// Expand a division to a new location.
    ExpandLocation {
        /// Division name.
        division: String,
        /// Location name.
        location: String,
    },
    /// Buy storage at a location.
    PurchaseStorage {
        /// Division name.
        division: String,
        /// Location name.
        location: String,
    },
    /// Grow storage at a location by some number of levels.
    ResizeStorage {
        /// Division name.
        division: String,
        /// Location name.
        location: String,
        /// Levels to add.
        levels: u32,
    },
    /// Grow staffing capacity at a location.
    ResizeStaffing {
        /// Division name.
        division: String,
        /// Location name.
        location: String,
        /// Positions to add.
        increase: u32,
    },
    /// Hire one staff member, optionally straight into a role.
    HireStaff {
        /// Division name.
        division: String,
        /// Location name.
        location: String,
        /// Role to hire into.
        role: Option<String>,
    },
    /// Set the number of staff in a role.
    AssignRoles {
        /// Division name.
        division: String,
        /// Location name.
        location: String,
        /// Role name.
        role: String,
        /// Staff to place in the role.
        count: u32,
    },
    /// Toggle automatic input supply.
    ConfigureSupply {
        /// Division name.
        division: String,
        /// Location name.
        location: String,
        /// Desired state.
        enabled: bool,
    },
    /// Buy a resource.
    PurchaseResource {
        /// Division name.
        division: String,
        /// Location name.
        location: String,
        /// Resource name.
        resource: String,
        /// Units (bulk) or units per cycle (rate).
        quantity: f64,
        /// Purchase mode.
        mode: PurchaseMode,
    },
    /// Set how a resource is sold.
    SetSellPolicy {
        /// Division name.
        division: String,
        /// Location name.
        location: String,
        /// Resource name.
        resource: String,
        /// Amount expression.
        amount: String,
        /// Ask price.
        price: PriceMultiplier,
    },
    /// Accept the standing milestone offer.
    AcceptOffer {
        /// Round being accepted.
        round: u32,
    },
    /// Raise an entity-wide capability by one level.
    LevelCapability {
        /// Capability name.
        name: String,
    },
    /// Raise a division-scoped capability by one level.
    LevelDivisionCapability {
        /// Division name.
        division: String,
        /// Capability name.
        name: String,
    },
}

impl Action {
    /// Short, stable name of the action kind for logs.
    pub const fn label(&self) -> &'static str {
        match self {
            Self::CreateDivision { .. } => "create_division",
            Self::Unlock { .. } => "unlock",
            Self::ExpandLocation { .. } => "expand_location",
            Self::PurchaseStorage { .. } => "purchase_storage",
            Self::ResizeStorage { .. } => "resize_storage",
            Self::ResizeStaffing { .. } => "resize_staffing",
            Self::HireStaff { .. } => "hire_staff",
            Self::AssignRoles { .. } => "assign_roles",
            Self::ConfigureSupply { .. } => "configure_supply",
            Self::PurchaseResource { .. } => "purchase_resource",
            Self::SetSellPolicy { .. } => "set_sell_policy",
            Self::AcceptOffer { .. } => "accept_offer",
            Self::LevelCapability { .. } => "level_capability",
            Self::LevelDivisionCapability { .. } => "level_division_capability",
        }
    }
}

/// The collaborator's answer to an attempted action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ActionResponse {
    /// The action took effect.
    Applied,
    /// A purchase went through for this many units (may be zero).
    Purchased {
        /// Units actually bought.
        units: f64,
    },
    /// The entity refused the action.
    Rejected {
        /// Reason given by the entity.
        reason: String,
    },
}

impl ActionResponse {
    /// Whether the action had any effect.
    pub const fn succeeded(&self) -> bool {
        match self {
            Self::Applied => true,
            Self::Purchased { units } => *units > 0.0,
            Self::Rejected { .. } => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn action_is_internally_tagged() {
        let action = Action::PurchaseResource {
            division: "Agri".to_owned(),
            location: "Aevum".to_owned(),
            resource: "Hardware".to_owned(),
            quantity: 25.0,
            mode: PurchaseMode::Bulk,
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["kind"], "purchase_resource");
        assert_eq!(value["mode"], "bulk");
        assert_eq!(action.label(), "purchase_resource");
    }

    #[test]
    fn sell_policy_carries_price_string() {
        let action = Action::SetSellPolicy {
            division: "Agri".to_owned(),
            location: "Aevum".to_owned(),
            resource: "Plants".to_owned(),
            amount: "MAX".to_owned(),
            price: PriceMultiplier::from_factor(0.7),
        };
        let value = serde_json::to_value(&action).unwrap();
        assert_eq!(value["price"], "MP*0.70");
    }

    #[test]
    fn zero_unit_purchase_is_not_success() {
        assert!(!ActionResponse::Purchased { units: 0.0 }.succeeded());
        assert!(ActionResponse::Purchased { units: 3.0 }.succeeded());
        assert!(ActionResponse::Applied.succeeded());
        let rejected: ActionResponse =
            serde_json::from_str(r#"{"status":"rejected","reason":"no funds"}"#).unwrap();
        assert!(!rejected.succeeded());
    }
}
