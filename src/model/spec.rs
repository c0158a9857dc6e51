use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SynthError;

use super::normalize::{infer_initial_state, normalize_flat};

/// A labeled transition inside a single process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Transition {
    #[serde(alias = "from_state", alias = "fromState")]
    pub from: String,
    #[serde(alias = "to_state", alias = "toState")]
    pub to: String,
    pub action: String,
}

impl Transition {
    pub fn new(from: impl Into<String>, to: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            action: action.into(),
        }
    }
}

/// A named finite-state process with an explicit initial state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessDefinition {
    pub name: String,
    pub initial_state: String,
    pub transitions: Vec<Transition>,
}

/// A canonical, non-empty set of processes with unique names, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Specification {
    processes: Vec<ProcessDefinition>,
}

impl Specification {
    /// Build a specification, rejecting an empty process list and duplicate names.
    pub fn new(processes: Vec<ProcessDefinition>) -> Result<Self, SynthError> {
        if processes.is_empty() {
            return Err(SynthError::EmptySpecification);
        }
        let mut seen = std::collections::BTreeSet::new();
        for p in &processes {
            if !seen.insert(p.name.as_str()) {
                return Err(SynthError::DuplicateProcess(p.name.clone()));
            }
        }
        Ok(Self { processes })
    }

    pub fn processes(&self) -> &[ProcessDefinition] {
        &self.processes
    }

    pub fn process(&self, name: &str) -> Option<&ProcessDefinition> {
        self.processes.iter().find(|p| p.name == name)
    }

    /// Flatten back into `(process, from, to, action)` tuples.
    pub fn to_flat(&self) -> Vec<FlatTransition> {
        self.processes
            .iter()
            .flat_map(|p| {
                p.transitions.iter().map(|t| FlatTransition {
                    process: p.name.clone(),
                    from: t.from.clone(),
                    to: t.to.clone(),
                    action: t.action.clone(),
                })
            })
            .collect()
    }
}

/// One row of the flat input encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlatTransition {
    #[serde(alias = "processName", alias = "process_name")]
    pub process: String,
    #[serde(alias = "from_state", alias = "fromState")]
    pub from: String,
    #[serde(alias = "to_state", alias = "toState")]
    pub to: String,
    pub action: String,
}

impl FlatTransition {
    pub fn new(
        process: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self {
            process: process.into(),
            from: from.into(),
            to: to.into(),
            action: action.into(),
        }
    }
}

/// Structured input: the initial state may be omitted and is then inferred.
#[derive(Debug, Clone, Deserialize)]
struct ProcessInput {
    name: String,
    #[serde(default, alias = "initialState", alias = "initial")]
    initial_state: Option<String>,
    #[serde(default)]
    transitions: Vec<Transition>,
}

#[derive(Debug, Clone, Deserialize)]
struct StructuredInput {
    processes: Vec<ProcessInput>,
}

/// Parse a JSON document in either the structured or the flat encoding.
pub fn parse_input(text: &str) -> Result<Specification, SynthError> {
    let value: Value = serde_json::from_str(text)?;
    from_value(value)
}

/// Classify an already-parsed JSON value and build a specification from it.
pub fn from_value(value: Value) -> Result<Specification, SynthError> {
    if value.is_array() {
        let rows: Vec<FlatTransition> = serde_json::from_value(value)?;
        return normalize_flat(&rows);
    }
    let Some(map) = value.as_object() else {
        return Err(SynthError::UnrecognizedInput(format!(
            "expected an array or an object, got {}",
            json_kind(&value)
        )));
    };
    if !map.get("processes").is_some_and(Value::is_array) {
        return Err(SynthError::UnrecognizedInput(
            "object without a `processes` array".into(),
        ));
    }
    let input: StructuredInput = serde_json::from_value(value)?;
    from_structured(input)
}

fn from_structured(input: StructuredInput) -> Result<Specification, SynthError> {
    let processes = input
        .processes
        .into_iter()
        .map(|p| {
            let initial_state = match p.initial_state {
                Some(s) => s,
                None => infer_initial_state(&p.name, &p.transitions),
            };
            ProcessDefinition {
                name: p.name,
                initial_state,
                transitions: p.transitions,
            }
        })
        .collect();
    Specification::new(processes)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_structured_input() {
        let json = r#"{
            "processes": [
                {"name": "SWITCH", "initial_state": "S0", "transitions": [
                    {"from": "S0", "to": "S1", "action": "on"},
                    {"from": "S1", "to": "S0", "action": "off"}
                ]}
            ]
        }"#;
        let spec = parse_input(json).unwrap();
        assert_eq!(spec.processes().len(), 1);
        let p = &spec.processes()[0];
        assert_eq!(p.name, "SWITCH");
        assert_eq!(p.initial_state, "S0");
        assert_eq!(p.transitions[1], Transition::new("S1", "S0", "off"));
    }

    #[test]
    fn parses_camel_case_aliases() {
        let json = r#"{"processes": [{"name": "P", "initialState": "A", "transitions": [
            {"fromState": "A", "toState": "B", "action": "x"}
        ]}]}"#;
        let spec = parse_input(json).unwrap();
        assert_eq!(spec.processes()[0].transitions[0].from, "A");
        assert_eq!(spec.processes()[0].initial_state, "A");
    }

    #[test]
    fn structured_input_infers_missing_initial_state() {
        let json = r#"{"processes": [{"name": "P", "transitions": [
            {"from": "B", "to": "C", "action": "y"},
            {"from": "A", "to": "B", "action": "x"}
        ]}]}"#;
        let spec = parse_input(json).unwrap();
        assert_eq!(spec.processes()[0].initial_state, "A");
    }

    #[test]
    fn parses_flat_input() {
        let json = r#"[
            {"process": "P", "from": "A", "to": "B", "action": "x"},
            {"processName": "Q", "from_state": "C", "to_state": "D", "action": "x"}
        ]"#;
        let spec = parse_input(json).unwrap();
        let names: Vec<_> = spec.processes().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["P", "Q"]);
    }

    #[test]
    fn empty_process_list_is_rejected() {
        let err = parse_input(r#"{"processes": []}"#).unwrap_err();
        assert!(matches!(err, SynthError::EmptySpecification));

        let err = parse_input("[]").unwrap_err();
        assert!(matches!(err, SynthError::EmptySpecification));
    }

    #[test]
    fn unrecognized_shapes_are_rejected() {
        let err = parse_input(r#"{"procs": []}"#).unwrap_err();
        assert!(matches!(err, SynthError::UnrecognizedInput(_)));

        let err = parse_input(r#""SWITCH""#).unwrap_err();
        assert!(matches!(err, SynthError::UnrecognizedInput(_)));

        let err = parse_input(r#"{"processes": 3}"#).unwrap_err();
        assert!(matches!(err, SynthError::UnrecognizedInput(_)));
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = parse_input("{not json").unwrap_err();
        assert!(matches!(err, SynthError::InvalidJson(_)));
    }

    #[test]
    fn duplicate_process_names_are_rejected() {
        let p = ProcessDefinition {
            name: "P".into(),
            initial_state: "A".into(),
            transitions: vec![],
        };
        let err = Specification::new(vec![p.clone(), p]).unwrap_err();
        assert!(matches!(err, SynthError::DuplicateProcess(name) if name == "P"));
    }
}
