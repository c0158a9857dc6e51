//! Command-line interface for ltsgen.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::synth::ChoicePolicy;
use crate::verifier::Operation;

/// Synthesize concurrent Go programs from labelled transition systems.
#[derive(Debug, Parser)]
#[command(name = "ltsgen", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to the configuration file.
    #[arg(long, global = true, default_value = crate::config::DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Log at debug level.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Always take the first private alternative.
    First,
    /// Cycle through private alternatives on each visit.
    Rotate,
}

impl From<PolicyArg> for ChoicePolicy {
    fn from(arg: PolicyArg) -> Self {
        match arg {
            PolicyArg::First => ChoicePolicy::First,
            PolicyArg::Rotate => ChoicePolicy::Rotate,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OperationArg {
    Parse,
    Compile,
    Compose,
    Safety,
    Progress,
    Ltl,
}

impl From<OperationArg> for Operation {
    fn from(arg: OperationArg) -> Self {
        match arg {
            OperationArg::Parse => Operation::Parse,
            OperationArg::Compile => Operation::Compile,
            OperationArg::Compose => Operation::Compose,
            OperationArg::Safety => Operation::CheckSafety,
            OperationArg::Progress => Operation::CheckProgress,
            OperationArg::Ltl => Operation::CheckLtl,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate Go source from a JSON transition system.
    Synth {
        /// JSON input: flat transition list or structured processes.
        input: PathBuf,

        /// Write the program here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Choice policy for states with only private alternatives.
        #[arg(long)]
        policy: Option<PolicyArg>,
    },

    /// Generate a program and execute it in the harness.
    Run {
        input: PathBuf,

        #[arg(long)]
        policy: Option<PolicyArg>,

        /// Wall-clock limit in seconds.
        #[arg(long)]
        timeout: Option<u64>,

        /// Run with `go` on the host instead of a container.
        #[arg(long, default_value_t = false)]
        local: bool,
    },

    /// Run an LTSA operation on an FSP file.
    Verify {
        file: PathBuf,

        operation: OperationArg,

        /// Composite process to check.
        #[arg(long, short)]
        process: Option<String>,

        /// Assertion name for `ltl`.
        #[arg(long)]
        property: Option<String>,
    },

    /// Ask the model to fix an FSP file until its safety check passes.
    Repair {
        file: PathBuf,

        #[arg(long, short)]
        process: Option<String>,

        #[arg(long)]
        attempts: Option<u32>,

        /// Write the repaired specification here.
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Check that java and the LTSA jar are available.
    Health,
}
