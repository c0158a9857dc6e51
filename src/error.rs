use std::time::Duration;

use thiserror::Error;

use crate::anthropic::AnthropicError;

/// Input-shape failures. Synthesis aborts on any of these and produces no text.
#[derive(Debug, Error)]
pub enum SynthError {
    #[error("empty specification: at least one process is required")]
    EmptySpecification,

    #[error("unrecognized input shape: {0}")]
    UnrecognizedInput(String),

    #[error("duplicate process name: {0}")]
    DuplicateProcess(String),

    #[error("invalid JSON input: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("failed to render program text")]
    Render(#[from] std::fmt::Error),
}

/// Failures talking to the LTSA verification engine.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("verification timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("verification dependency not found: {0}")]
    MissingDependency(String),

    #[error("operation {operation} requires {field}")]
    MissingArgument {
        operation: &'static str,
        field: &'static str,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures of the execution harness itself. A program that times out or exits
/// non-zero is not an error; it is reported through `ExecutionResult`.
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("runtime image not available: {0}")]
    MissingImage(String),

    #[error("runtime dependency not found: {0}")]
    MissingDependency(String),

    #[error("local backend cannot enforce {0}; set allow_degraded to run without it")]
    DegradedNotAllowed(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum RepairError {
    #[error("failed to read specification {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error(transparent)]
    Anthropic(#[from] AnthropicError),

    #[error("model reply contained no specification text")]
    EmptyReply,
}

/// Crate-level error used at the CLI boundary.
#[derive(Debug, Error)]
pub enum LtsError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Synthesis error: {0}")]
    Synth(#[from] SynthError),

    #[error("Verification error: {0}")]
    Verify(#[from] VerifyError),

    #[error("Harness error: {0}")]
    Harness(#[from] HarnessError),

    #[error("Repair error: {0}")]
    Repair(#[from] RepairError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}
