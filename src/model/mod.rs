mod normalize;
mod spec;

pub use normalize::{infer_initial_state, normalize_flat};
pub use spec::{
    FlatTransition, ProcessDefinition, Specification, Transition, from_value, parse_input,
};
