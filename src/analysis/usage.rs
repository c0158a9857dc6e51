//! Classification of action names into private and shared, with a
//! deterministic synchronization role for every process that uses them.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::model::Specification;

/// How a process takes part in an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncRole {
    /// Only this process uses the action; no synchronization.
    Private,
    /// Offering side of a two-party handshake.
    Sender,
    /// Accepting side of a two-party handshake.
    Receiver,
    /// One of three or more parties meeting at a barrier.
    Participant,
}

/// The processes that label at least one transition with `action`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionUsage {
    pub action: String,
    pub processes: BTreeSet<String>,
}

impl ActionUsage {
    pub fn is_shared(&self) -> bool {
        self.processes.len() >= 2
    }

    pub fn party_count(&self) -> usize {
        self.processes.len()
    }

    /// The lexicographically smallest process name, for shared actions only.
    /// This is a tie-break for mapping a symmetric rendezvous onto an
    /// asymmetric channel; it carries no meaning in the model.
    pub fn sender(&self) -> Option<&str> {
        if self.is_shared() {
            self.processes.first().map(String::as_str)
        } else {
            None
        }
    }

    /// Role of `process`, or `None` if it does not use this action.
    pub fn role_of(&self, process: &str) -> Option<SyncRole> {
        if !self.processes.contains(process) {
            return None;
        }
        Some(match self.party_count() {
            1 => SyncRole::Private,
            2 if self.sender() == Some(process) => SyncRole::Sender,
            2 => SyncRole::Receiver,
            _ => SyncRole::Participant,
        })
    }
}

/// Usage of every action in a specification, keyed and iterated by action name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionUsageMap {
    usages: BTreeMap<String, ActionUsage>,
}

impl ActionUsageMap {
    /// Record, for every action, the set of processes with a transition
    /// labelled by it. An action used by two or more processes is shared.
    pub fn analyze(spec: &Specification) -> Self {
        let mut usages: BTreeMap<String, ActionUsage> = BTreeMap::new();
        for process in spec.processes() {
            for t in &process.transitions {
                usages
                    .entry(t.action.clone())
                    .or_insert_with(|| ActionUsage {
                        action: t.action.clone(),
                        processes: BTreeSet::new(),
                    })
                    .processes
                    .insert(process.name.clone());
            }
        }
        Self { usages }
    }

    pub fn get(&self, action: &str) -> Option<&ActionUsage> {
        self.usages.get(action)
    }

    pub fn is_shared(&self, action: &str) -> bool {
        self.get(action).is_some_and(ActionUsage::is_shared)
    }

    pub fn role(&self, action: &str, process: &str) -> Option<SyncRole> {
        self.get(action).and_then(|u| u.role_of(process))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionUsage> {
        self.usages.values()
    }

    /// Shared actions in name order.
    pub fn shared(&self) -> impl Iterator<Item = &ActionUsage> {
        self.iter().filter(|u| u.is_shared())
    }
}
