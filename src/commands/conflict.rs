//! Conflict Resolver
//!
//! Several rules can target the same actuator in one tick. The resolver keeps
//! exactly one command per device according to the configured strategy.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use super::command::DeviceCommand;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    First,
    #[default]
    Last,
    Priority,
    Merge,
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConflictStrategy::First => "first",
            ConflictStrategy::Last => "last",
            ConflictStrategy::Priority => "priority",
            ConflictStrategy::Merge => "merge",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ConflictStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" => Ok(ConflictStrategy::First),
            "last" => Ok(ConflictStrategy::Last),
            "priority" => Ok(ConflictStrategy::Priority),
            "merge" => Ok(ConflictStrategy::Merge),
            other => Err(format!("unknown conflict strategy: {}", other)),
        }
    }
}

/// What happened on one contested device
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConflictInfo {
    pub device_id: String,
    pub strategy: ConflictStrategy,
    /// Every contender, in creation order
    pub contenders: Vec<u64>,
    pub winner: u64,
    pub dropped: Vec<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ConflictResolution {
    pub commands: Vec<DeviceCommand>,
    pub conflicts: Vec<ConflictInfo>,
}

pub struct ConflictResolver {
    strategy: ConflictStrategy,
    priorities: HashMap<String, i64>,
}

impl ConflictResolver {
    pub fn new(strategy: ConflictStrategy) -> Self {
        Self {
            strategy,
            priorities: HashMap::new(),
        }
    }

    /// Rule id to priority; higher wins under the `priority` strategy
    pub fn with_priorities(mut self, priorities: HashMap<String, i64>) -> Self {
        self.priorities = priorities;
        self
    }

    pub fn strategy(&self) -> ConflictStrategy {
        self.strategy
    }

    pub fn set_strategy(&mut self, strategy: ConflictStrategy) {
        info!("Conflict strategy set to {}", strategy);
        self.strategy = strategy;
    }

    pub fn set_priority(&mut self, rule_id: impl Into<String>, priority: i64) {
        self.priorities.insert(rule_id.into(), priority);
    }

    /// Devices targeted by more than one command, in first-appearance order
    pub fn detect_conflicts(&self, commands: &[DeviceCommand]) -> Vec<String> {
        group_by_device(commands.iter())
            .into_iter()
            .filter(|(_, group)| group.len() > 1)
            .map(|(device_id, _)| device_id)
            .collect()
    }

    pub fn resolve(&self, commands: Vec<DeviceCommand>) -> ConflictResolution {
        let mut resolution = ConflictResolution::default();

        for (device_id, mut group) in group_by_device(commands.into_iter()) {
            if group.len() == 1 {
                resolution.commands.extend(group);
                continue;
            }

            group.sort_by(|a, b| {
                a.created_at
                    .cmp(&b.created_at)
                    .then(a.command_id.cmp(&b.command_id))
            });
            let contenders: Vec<u64> = group.iter().map(|c| c.command_id).collect();

            let winner = match self.strategy {
                ConflictStrategy::First => group.swap_remove(0),
                ConflictStrategy::Last => group.swap_remove(group.len() - 1),
                ConflictStrategy::Priority => {
                    let idx = self.highest_priority(&group);
                    group.swap_remove(idx)
                }
                ConflictStrategy::Merge => merge(group),
            };

            let dropped: Vec<u64> = contenders
                .iter()
                .copied()
                .filter(|id| *id != winner.command_id)
                .collect();
            debug!(
                "Conflict on '{}' resolved by {}: kept {}, dropped {:?}",
                device_id, self.strategy, winner.command_id, dropped
            );
            resolution.conflicts.push(ConflictInfo {
                device_id,
                strategy: self.strategy,
                contenders,
                winner: winner.command_id,
                dropped,
            });
            resolution.commands.push(winner);
        }

        resolution
    }

    /// Index of the highest-priority command; ties go to the earliest
    fn highest_priority(&self, group: &[DeviceCommand]) -> usize {
        let mut best = 0;
        let mut best_priority = i64::MIN;
        for (idx, command) in group.iter().enumerate() {
            let priority = command
                .rule_id
                .as_ref()
                .and_then(|id| self.priorities.get(id))
                .copied()
                .unwrap_or(0);
            if priority > best_priority {
                best = idx;
                best_priority = priority;
            }
        }
        best
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self::new(ConflictStrategy::default())
    }
}

/// Earliest command keeps its identity; later parameters overwrite in order
fn merge(group: Vec<DeviceCommand>) -> DeviceCommand {
    let mut iter = group.into_iter();
    // callers only merge groups of two or more
    let mut base = match iter.next() {
        Some(c) => c,
        None => unreachable!("merge called on an empty group"),
    };
    for later in iter {
        base.parameters.extend(later.parameters);
    }
    base
}

fn group_by_device<C, I>(commands: I) -> Vec<(String, Vec<C>)>
where
    C: std::borrow::Borrow<DeviceCommand>,
    I: Iterator<Item = C>,
{
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<(String, Vec<C>)> = Vec::new();
    for command in commands {
        let device_id = command.borrow().device_id.clone();
        match index.get(&device_id) {
            Some(&i) => groups[i].1.push(command),
            None => {
                index.insert(device_id.clone(), groups.len());
                groups.push((device_id, vec![command]));
            }
        }
    }
    groups
}
