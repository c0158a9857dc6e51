//! Per-process transition tables.
//!
//! Planning decides, for every state of every process, which synchronization
//! construct the generated program uses. Emission only renders these tables,
//! so the decisions can be checked without looking at program text.

use serde::Deserialize;
use tracing::debug;

use crate::analysis::{ActionUsageMap, StateGraph, SyncRole};
use crate::model::{ProcessDefinition, Transition};

use super::registry::{ChannelRegistry, SyncPoint};

/// Selection rule for a choice point whose candidates are all private.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChoicePolicy {
    /// Always take the first declared transition. The other candidates are
    /// never taken and are emitted as comments only.
    #[default]
    First,
    /// Cycle through all candidates in declaration order, one per visit.
    Rotate,
}

/// A transition with its target state already qualified by process name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub action: String,
    /// Source state, unqualified.
    pub from: String,
    /// Destination state, unqualified. Used in trace lines.
    pub to: String,
    /// Destination state as it appears in the generated `switch`.
    pub target: String,
}

/// The blocking operation performed for a shared action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rendezvous {
    /// `ch <- struct{}{}`
    Offer { channel: String },
    /// `<-ch`
    Accept { channel: String },
    /// Arrive at an N-party barrier, then wait for its release.
    Barrier { barrier: String },
}

/// A shared transition and the operation that blocks on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncEdge {
    pub edge: Edge,
    /// Offer or accept on a channel, or arrive at a barrier.
    pub rendezvous: Rendezvous,
}

/// What a process does when it is in one state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// No outgoing transitions, or the reserved terminal state.
    Terminal,
    /// One private transition: advance without synchronizing.
    Local(Edge),
    /// One shared transition: block on its rendezvous, then advance.
    Sync(SyncEdge),
    /// At least one shared candidate: a blocking `select` with one case per
    /// shared candidate and one always-ready case per private candidate.
    Select {
        shared: Vec<SyncEdge>,
        private: Vec<Edge>,
    },
    /// Several candidates, none shared.
    PrivateChoice {
        candidates: Vec<Edge>,
        policy: ChoicePolicy,
        /// Index of the rotation counter, for [`ChoicePolicy::Rotate`].
        counter: Option<usize>,
    },
}

impl Step {
    /// Whether this step receives from the always-ready channel.
    pub fn uses_always_ready(&self) -> bool {
        matches!(self, Step::Select { private, .. } if !private.is_empty())
    }
}

/// One row of a process's transition table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePlan {
    /// State name as written in the input.
    pub state: String,
    /// `<process>_<state>`, the value of the generated `state` variable.
    pub qualified: String,
    pub step: Step,
}

/// Everything needed to emit one process function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessPlan {
    /// Process name as written in the input.
    pub process: String,
    /// Unique Go identifier of the process function.
    pub func_name: String,
    /// Qualified initial state.
    pub initial: String,
    /// Sorted by state name.
    pub states: Vec<StatePlan>,
    /// Number of rotation counters the function declares.
    pub counters: usize,
}

impl ProcessPlan {
    /// Look up a state by its unqualified name.
    pub fn state(&self, state: &str) -> Option<&StatePlan> {
        self.states.iter().find(|s| s.state == state)
    }
}

/// Qualify a process-local state name so it cannot collide across processes.
pub fn qualify(process: &str, state: &str) -> String {
    format!("{process}_{state}")
}

/// Build the transition table for one process.
pub fn plan_process(
    def: &ProcessDefinition,
    usage: &ActionUsageMap,
    registry: &ChannelRegistry,
    policy: ChoicePolicy,
    func_name: String,
) -> ProcessPlan {
    let graph = StateGraph::build(def);
    let mut counters = 0;

    let states = graph
        .states()
        .iter()
        .map(|state| {
            let step = if graph.is_terminal(state) {
                Step::Terminal
            } else {
                plan_state(
                    &def.name,
                    graph.outgoing(state),
                    usage,
                    registry,
                    policy,
                    &mut counters,
                )
            };
            StatePlan {
                state: state.clone(),
                qualified: qualify(&def.name, state),
                step,
            }
        })
        .collect::<Vec<_>>();

    debug!(
        process = graph.process(),
        states = states.len(),
        counters,
        "planned process"
    );
    ProcessPlan {
        process: graph.process().to_string(),
        func_name,
        initial: qualify(&def.name, graph.initial()),
        states,
        counters,
    }
}

fn plan_state(
    process: &str,
    outgoing: &[Transition],
    usage: &ActionUsageMap,
    registry: &ChannelRegistry,
    policy: ChoicePolicy,
    counters: &mut usize,
) -> Step {
    let mut shared = Vec::new();
    let mut private = Vec::new();
    for t in outgoing {
        let edge = Edge {
            action: t.action.clone(),
            from: t.from.clone(),
            to: t.to.clone(),
            target: qualify(process, &t.to),
        };
        match rendezvous_for(process, &t.action, usage, registry) {
            Some(rendezvous) => shared.push(SyncEdge { edge, rendezvous }),
            None => private.push(edge),
        }
    }

    match (shared.len(), private.len()) {
        (0, 1) => Step::Local(private.remove(0)),
        (1, 0) => Step::Sync(shared.remove(0)),
        (0, _) => {
            let counter = match policy {
                ChoicePolicy::Rotate => {
                    let idx = *counters;
                    *counters += 1;
                    Some(idx)
                }
                ChoicePolicy::First => None,
            };
            Step::PrivateChoice {
                candidates: private,
                policy,
                counter,
            }
        }
        _ => Step::Select { shared, private },
    }
}

fn rendezvous_for(
    process: &str,
    action: &str,
    usage: &ActionUsageMap,
    registry: &ChannelRegistry,
) -> Option<Rendezvous> {
    let point = registry.get(action)?;
    let role = usage.role(action, process)?;
    Some(match (point, role) {
        (SyncPoint::Barrier { ident, .. }, _) => Rendezvous::Barrier {
            barrier: ident.clone(),
        },
        (SyncPoint::Channel { ident, .. }, SyncRole::Sender) => Rendezvous::Offer {
            channel: ident.clone(),
        },
        (SyncPoint::Channel { ident, .. }, _) => Rendezvous::Accept {
            channel: ident.clone(),
        },
    })
}
