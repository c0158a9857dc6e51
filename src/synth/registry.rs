//! Per-request table of synchronization points, one per shared action.

use std::collections::BTreeMap;

use crate::analysis::ActionUsageMap;

use super::names::NameAllocator;

/// The Go construct that realizes one shared action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPoint {
    /// Unbuffered channel between exactly two processes.
    Channel {
        ident: String,
        sender: String,
        receiver: String,
    },
    /// Reusable barrier for three or more processes.
    Barrier { ident: String, parties: Vec<String> },
}

impl SyncPoint {
    pub fn ident(&self) -> &str {
        match self {
            SyncPoint::Channel { ident, .. } | SyncPoint::Barrier { ident, .. } => ident,
        }
    }
}

/// Synchronization points for a single synthesis run. Built from the action
/// usage of one specification and never shared between runs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelRegistry {
    points: BTreeMap<String, SyncPoint>,
}

impl ChannelRegistry {
    /// Register every shared action, allocating identifiers in action-name order.
    pub fn build(usage: &ActionUsageMap, names: &mut NameAllocator) -> Self {
        let mut points = BTreeMap::new();
        for u in usage.shared() {
            let parties: Vec<String> = u.processes.iter().cloned().collect();
            let point = if let [sender, receiver] = parties.as_slice() {
                SyncPoint::Channel {
                    ident: names.allocate("ch_", &u.action),
                    sender: sender.clone(),
                    receiver: receiver.clone(),
                }
            } else {
                SyncPoint::Barrier {
                    ident: names.allocate("bar_", &u.action),
                    parties,
                }
            };
            points.insert(u.action.clone(), point);
        }
        Self { points }
    }

    pub fn get(&self, action: &str) -> Option<&SyncPoint> {
        self.points.get(action)
    }

    /// `(action, point)` pairs sorted by action name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SyncPoint)> {
        self.points.iter().map(|(a, p)| (a.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn has_barriers(&self) -> bool {
        self.points
            .values()
            .any(|p| matches!(p, SyncPoint::Barrier { .. }))
    }
}
