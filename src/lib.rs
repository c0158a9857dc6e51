//! ltsgen: synthesize concurrent Go programs from labelled transition systems,
//! verify FSP models with LTSA and repair them with a generative model.

pub mod analysis;
pub mod anthropic;
pub mod cli;
pub mod config;
pub mod error;
pub mod harness;
pub mod model;
pub mod repair;
pub mod synth;
pub mod ui;
pub mod verifier;
