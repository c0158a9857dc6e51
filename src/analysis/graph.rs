use std::collections::{BTreeMap, BTreeSet};

use crate::model::{ProcessDefinition, Transition};

/// Reserved state name that always ends a process.
pub const TERMINAL_STATE: &str = "STOP";

/// Per-process adjacency: each state's outgoing transitions in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateGraph {
    process: String,
    initial: String,
    states: BTreeSet<String>,
    outgoing: BTreeMap<String, Vec<Transition>>,
}

impl StateGraph {
    /// Index `process` by source state.
    ///
    /// The initial state is always part of the graph, even when no
    /// transition mentions it, and so is every transition target. Transitions
    /// keep their declaration order within each source state.
    pub fn build(process: &ProcessDefinition) -> Self {
        let mut states = BTreeSet::new();
        let mut outgoing: BTreeMap<String, Vec<Transition>> = BTreeMap::new();

        states.insert(process.initial_state.clone());
        for t in &process.transitions {
            states.insert(t.from.clone());
            states.insert(t.to.clone());
            outgoing.entry(t.from.clone()).or_default().push(t.clone());
        }

        Self {
            process: process.name.clone(),
            initial: process.initial_state.clone(),
            states,
            outgoing,
        }
    }

    /// Name of the indexed process.
    pub fn process(&self) -> &str {
        &self.process
    }

    pub fn initial(&self) -> &str {
        &self.initial
    }

    /// Every state mentioned by the process, sorted.
    pub fn states(&self) -> &BTreeSet<String> {
        &self.states
    }

    /// Transitions leaving `state`, empty for unknown states.
    pub fn outgoing(&self, state: &str) -> &[Transition] {
        self.outgoing.get(state).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `STOP`, or any state with no outgoing transitions.
    pub fn is_terminal(&self, state: &str) -> bool {
        state == TERMINAL_STATE || self.outgoing(state).is_empty()
    }
}
