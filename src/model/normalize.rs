//! Canonicalization of the flat `(process, from, to, action)` encoding.

use std::collections::{BTreeSet, HashSet};

use tracing::debug;

use crate::error::SynthError;

use super::spec::{FlatTransition, ProcessDefinition, Specification, Transition};

/// Group flat rows by process (first-appearance order) and infer each initial state.
pub fn normalize_flat(rows: &[FlatTransition]) -> Result<Specification, SynthError> {
    if rows.is_empty() {
        return Err(SynthError::EmptySpecification);
    }

    let mut groups: Vec<(String, Vec<Transition>)> = Vec::new();
    for row in rows {
        let transition = Transition::new(&row.from, &row.to, &row.action);
        match groups.iter_mut().find(|(name, _)| *name == row.process) {
            Some((_, transitions)) => transitions.push(transition),
            None => groups.push((row.process.clone(), vec![transition])),
        }
    }

    let processes = groups
        .into_iter()
        .map(|(name, transitions)| {
            let initial_state = infer_initial_state(&name, &transitions);
            debug!(process = %name, initial = %initial_state, transitions = transitions.len(), "normalized process");
            ProcessDefinition {
                name,
                initial_state,
                transitions,
            }
        })
        .collect();

    Specification::new(processes)
}

/// Pick an initial state for a process whose input did not declare one.
///
/// In order: the first state that is a source but never a destination; a state
/// named after the process, `<name>0` or `0`; the source of the first
/// transition. A process without transitions starts in a state named after
/// itself.
pub fn infer_initial_state(name: &str, transitions: &[Transition]) -> String {
    let destinations: HashSet<&str> = transitions.iter().map(|t| t.to.as_str()).collect();
    if let Some(t) = transitions
        .iter()
        .find(|t| !destinations.contains(t.from.as_str()))
    {
        return t.from.clone();
    }

    let states: BTreeSet<&str> = transitions
        .iter()
        .flat_map(|t| [t.from.as_str(), t.to.as_str()])
        .collect();
    let numbered = format!("{name}0");
    for candidate in [name, numbered.as_str(), "0"] {
        if states.contains(candidate) {
            return candidate.to_string();
        }
    }

    transitions
        .first()
        .map(|t| t.from.clone())
        .unwrap_or_else(|| name.to_string())
}
