//! Gang steady-state controller.
//!
//! A gang has no phase table and nothing to persist. Every tick re-reads the
//! gang and runs the same five passes in order:
//!
//! 1. Recruit while recruitment is open.
//! 2. Ascend members whose ascension would multiply a stat enough.
//! 3. Buy missing equipment while money comfortably covers it.
//! 4. Assign tasks by priority, pushing only changes.
//! 5. Engage or disengage territory clashes.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tycoon_types::{GangAction, GangView};

use crate::collaborator::{CollaboratorError, GangSurface};

/// Recruit names, used in order before falling back to `Member{n}`.
pub const MEMBER_NAMES: [&str; 28] = [
    "Ghost", "Shadow", "Viper", "Reaper", "Blade", "Spike", "Rex", "Phoenix", "Raven", "Wolf",
    "Cobra", "Havoc", "Zero", "Ace", "Duke", "Hammer", "Steel", "Bullet", "Venom", "Razor",
    "Storm", "Knight", "Titan", "Frost", "Blaze", "Talon", "Fang", "Claw",
];

/// Name for the member recruited at `index`.
pub fn member_name(index: usize) -> String {
    MEMBER_NAMES
        .get(index)
        .map_or_else(|| format!("Member{index}"), |&name| name.to_owned())
}

/// Task names the controller assigns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GangTasks {
    /// Stat training.
    pub training: String,
    /// Lowers the wanted level.
    pub wanted_reduction: String,
    /// Earns respect for more recruits.
    pub respect: String,
    /// Builds power for clashes.
    pub warfare: String,
    /// Earns money.
    pub income: String,
}

impl Default for GangTasks {
    fn default() -> Self {
        Self {
            training: "Train Combat".to_owned(),
            wanted_reduction: "Vigilante Justice".to_owned(),
            respect: "Terrorism".to_owned(),
            warfare: "Territory Warfare".to_owned(),
            income: "Traffick Illegal Arms".to_owned(),
        }
    }
}

/// Gang controller tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GangSettings {
    /// Most members a gang can have.
    pub member_cap: usize,
    /// Ascend once any multiplier reaches this.
    pub ascension_threshold: f64,
    /// Engage clashes once the worst win chance reaches this.
    pub clash_threshold: f64,
    /// Wanted penalty percentage above which trained members reduce it.
    pub wanted_penalty_threshold: f64,
    /// Average combat stat below which members train.
    pub training_threshold: f64,
    /// Average combat stat below which a full gang keeps training.
    pub warfare_threshold: f64,
    /// How many of the strongest members fight for territory.
    pub warfare_members: usize,
    /// Territory share treated as full control.
    pub full_territory: f64,
    /// Money must exceed `cost × equipment_margin` to buy equipment.
    pub equipment_margin: f64,
    /// Equipment never bought.
    pub equipment_skip: BTreeSet<String>,
    /// Task names.
    pub tasks: GangTasks,
}

impl Default for GangSettings {
    fn default() -> Self {
        Self {
            member_cap: 12,
            ascension_threshold: 2.0,
            clash_threshold: 0.95,
            wanted_penalty_threshold: 1.0,
            training_threshold: 100.0,
            warfare_threshold: 300.0,
            warfare_members: 6,
            full_territory: 0.999,
            equipment_margin: 2.0,
            equipment_skip: BTreeSet::new(),
            tasks: GangTasks::default(),
        }
    }
}

/// What one gang tick did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GangReport {
    /// Members recruited.
    pub recruited: Vec<String>,
    /// Members ascended.
    pub ascended: Vec<String>,
    /// Equipment pieces bought.
    pub purchases: usize,
    /// Task assignments pushed.
    pub task_changes: usize,
    /// New clash setting, if it changed.
    pub warfare: Option<bool>,
}

/// The task each member should be on, in member order.
pub fn plan_tasks(view: &GangView, settings: &GangSettings) -> Vec<(String, String)> {
    let tasks = &settings.tasks;
    let full_territory = view.territory >= settings.full_territory;
    let high_wanted = view.wanted_penalty() > settings.wanted_penalty_threshold;
    let at_cap = view.members.len() >= settings.member_cap;

    let mut ranked: Vec<_> = view.members.iter().collect();
    ranked.sort_by(|a, b| b.average_combat().total_cmp(&a.average_combat()));
    let warriors: BTreeSet<&str> = ranked
        .iter()
        .take(settings.warfare_members)
        .map(|m| m.name.as_str())
        .collect();

    view.members
        .iter()
        .map(|member| {
            let combat = member.average_combat();
            let task = if full_territory {
                &tasks.income
            } else if high_wanted && combat >= settings.training_threshold {
                &tasks.wanted_reduction
            } else if combat < settings.training_threshold {
                &tasks.training
            } else if !at_cap {
                &tasks.respect
            } else if combat < settings.warfare_threshold {
                &tasks.training
            } else if warriors.contains(member.name.as_str()) {
                &tasks.warfare
            } else {
                &tasks.income
            };
            (member.name.clone(), task.clone())
        })
        .collect()
}

/// Whether territory clashes should be engaged.
///
/// Rivals without territory are ignored; with none left the worst win
/// chance counts as certain.
pub fn should_engage(view: &GangView, settings: &GangSettings) -> bool {
    if view.territory >= settings.full_territory {
        return false;
    }
    let worst = view
        .rivals
        .iter()
        .filter(|r| r.territory > 0.0)
        .map(|r| r.win_chance)
        .fold(1.0, f64::min);
    worst >= settings.clash_threshold
}

/// Run one gang tick.
///
/// # Errors
///
/// Returns [`CollaboratorError`] if the gang surface fails; the tick is
/// abandoned and the next one starts from a fresh view.
pub async fn run_gang_tick<G: GangSurface>(
    gang: &mut G,
    settings: &GangSettings,
) -> Result<GangReport, CollaboratorError> {
    let mut report = GangReport::default();

    for _ in 0..settings.member_cap {
        let view = gang.gang().await?;
        if !view.can_recruit || view.members.len() >= settings.member_cap {
            break;
        }
        let name = member_name(view.members.len());
        if !gang.attempt_gang(&GangAction::Recruit { name: name.clone() }).await? {
            break;
        }
        info!(member = %name, "recruited");
        report.recruited.push(name);
    }

    let view = gang.gang().await?;
    for member in &view.members {
        let Some(ascension) = member.ascension else {
            continue;
        };
        if ascension.best() < settings.ascension_threshold {
            continue;
        }
        let action = GangAction::Ascend {
            member: member.name.clone(),
        };
        if gang.attempt_gang(&action).await? {
            info!(member = %member.name, multiplier = ascension.best(), "ascended");
            report.ascended.push(member.name.clone());
        }
    }

    let mut money = view.money;
    for member in &view.members {
        for (equipment, &cost) in &view.equipment_costs {
            if settings.equipment_skip.contains(equipment) || member.equipment.contains(equipment) {
                continue;
            }
            if money <= cost * settings.equipment_margin {
                continue;
            }
            let action = GangAction::PurchaseEquipment {
                member: member.name.clone(),
                equipment: equipment.clone(),
            };
            if gang.attempt_gang(&action).await? {
                debug!(member = %member.name, equipment = %equipment, cost, "equipment bought");
                money -= cost;
                report.purchases = report.purchases.saturating_add(1);
            }
        }
    }

    let view = gang.gang().await?;
    for (name, task) in plan_tasks(&view, settings) {
        let current = view.members.iter().find(|m| m.name == name).map(|m| m.task.as_str());
        if current == Some(task.as_str()) {
            continue;
        }
        let action = GangAction::SetTask {
            member: name.clone(),
            task: task.clone(),
        };
        if gang.attempt_gang(&action).await? {
            info!(member = %name, from = current.unwrap_or(""), to = %task, "task assigned");
            report.task_changes = report.task_changes.saturating_add(1);
        }
    }

    let engage = should_engage(&view, settings);
    if engage != view.warfare_engaged
        && gang
            .attempt_gang(&GangAction::SetWarfare { engaged: engage })
            .await?
    {
        info!(engaged = engage, territory = view.territory, "territory clashes toggled");
        report.warfare = Some(engage);
    }

    Ok(report)
}
