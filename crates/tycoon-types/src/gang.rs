//! Views and actions for the gang steady-state controller.
//!
//! Unlike the corporation, a gang has no phase table: every tick re-derives
//! all decisions from a fresh [`GangView`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Point-in-time view of a gang.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GangView {
    /// Faction the gang belongs to.
    pub faction: String,
    /// Share of territory held, `0.0..=1.0`.
    pub territory: f64,
    /// Respect accumulated.
    pub respect: f64,
    /// Current wanted level.
    pub wanted_level: f64,
    /// Whether territory clashes are engaged.
    pub warfare_engaged: bool,
    /// Whether another member can be recruited right now.
    pub can_recruit: bool,
    /// Money available for equipment.
    pub money: f64,
    /// Current members.
    pub members: Vec<MemberView>,
    /// Rival gangs.
    pub rivals: Vec<RivalView>,
    /// Equipment catalogue: name to current cost.
    pub equipment_costs: BTreeMap<String, f64>,
}

impl GangView {
    /// Wanted level as a percentage of respect. Zero when respect is zero.
    pub fn wanted_penalty(&self) -> f64 {
        if self.respect > 0.0 {
            self.wanted_level / self.respect * 100.0
        } else {
            0.0
        }
    }
}

/// A single gang member.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemberView {
    /// Member name.
    pub name: String,
    /// Task currently assigned.
    pub task: String,
    /// Strength.
    pub str: f64,
    /// Defense.
    pub def: f64,
    /// Dexterity.
    pub dex: f64,
    /// Agility.
    pub agi: f64,
    /// Charisma.
    pub cha: f64,
    /// Equipment and augmentations owned.
    pub equipment: BTreeSet<String>,
    /// Multipliers ascending now would grant; `None` if ascension is unavailable.
    pub ascension: Option<AscensionView>,
}

impl MemberView {
    /// Mean of the four combat stats.
    pub const fn average_combat(&self) -> f64 {
        (self.str + self.def + self.dex + self.agi) / 4.0
    }
}

/// Stat multipliers an ascension would apply.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AscensionView {
    /// Strength multiplier.
    pub str: f64,
    /// Defense multiplier.
    pub def: f64,
    /// Dexterity multiplier.
    pub dex: f64,
    /// Agility multiplier.
    pub agi: f64,
    /// Charisma multiplier.
    pub cha: f64,
}

impl AscensionView {
    /// Largest of the five multipliers.
    pub fn best(&self) -> f64 {
        [self.str, self.def, self.dex, self.agi, self.cha]
            .into_iter()
            .fold(0.0, f64::max)
    }
}

/// A rival gang.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RivalView {
    /// Rival name.
    pub name: String,
    /// Share of territory the rival holds.
    pub territory: f64,
    /// Chance of winning a clash against this rival.
    pub win_chance: f64,
}

/// A mutating gang operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GangAction {
    /// Recruit a new member.
    Recruit {
        /// Name for the recruit.
        name: String,
    },
    /// Ascend a member.
    Ascend {
        /// Member name.
        member: String,
    },
    /// Buy a piece of equipment for a member.
    PurchaseEquipment {
        /// Member name.
        member: String,
        /// Equipment name.
        equipment: String,
    },
    /// Assign a member to a task.
    SetTask {
        /// Member name.
        member: String,
        /// Task name.
        task: String,
    },
    /// Engage or disengage territory clashes.
    SetWarfare {
        /// Desired state.
        engaged: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wanted_penalty_is_a_percentage() {
        let gang = GangView {
            respect: 200.0,
            wanted_level: 3.0,
            ..GangView::default()
        };
        assert!((gang.wanted_penalty() - 1.5).abs() < 1e-9);
        assert!(GangView::default().wanted_penalty().abs() < f64::EPSILON);
    }

    #[test]
    fn average_combat_ignores_charisma() {
        let member = MemberView {
            str: 100.0,
            def: 200.0,
            dex: 300.0,
            agi: 400.0,
            cha: 9000.0,
            ..MemberView::default()
        };
        assert!((member.average_combat() - 250.0).abs() < 1e-9);
    }

    #[test]
    fn best_multiplier_picks_largest() {
        let asc = AscensionView {
            str: 1.2,
            cha: 2.4,
            ..AscensionView::default()
        };
        assert!((asc.best() - 2.4).abs() < 1e-9);
    }
}
