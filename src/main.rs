use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ltsgen::anthropic::AnthropicClient;
use ltsgen::cli::{Cli, Command};
use ltsgen::config::{HarnessBackend, LtsgenConfig};
use ltsgen::error::LtsError;
use ltsgen::harness::{ExecutionRequest, Harness};
use ltsgen::repair::repair_file;
use ltsgen::synth::synthesize_json;
use ltsgen::ui::TaskProgress;
use ltsgen::verifier::{LtsaVerifier, Verify, VerifyRequest};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    let mut config = LtsgenConfig::load_from(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?;

    match cli.command {
        Command::Synth {
            input,
            output,
            policy,
        } => {
            let policy = policy.map_or(config.synth.choice_policy, Into::into);
            let text = std::fs::read_to_string(&input).map_err(LtsError::from)?;
            let program = synthesize_json(&text, policy).map_err(LtsError::from)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, &program.source).map_err(LtsError::from)?;
                    eprintln!("wrote {}", path.display());
                }
                None => print!("{}", program.source),
            }
        }
        Command::Run {
            input,
            policy,
            timeout,
            local,
        } => {
            let policy = policy.map_or(config.synth.choice_policy, Into::into);
            let text = std::fs::read_to_string(&input).map_err(LtsError::from)?;
            let progress = TaskProgress::start(&format!("synthesizing {}", input.display()));
            let program = match synthesize_json(&text, policy) {
                Ok(program) => program,
                Err(e) => {
                    progress.fail("synthesis failed");
                    return Err(LtsError::from(e).into());
                }
            };
            if local {
                // Asking for the local backend on the command line is the opt-in.
                config.harness.backend = HarnessBackend::Local;
                config.harness.allow_degraded = true;
            }
            progress.update(&format!("running {}", input.display()));
            let harness = Harness::new(config.harness);
            let req = ExecutionRequest {
                timeout_secs: timeout,
                ..ExecutionRequest::new(program.source)
            };
            match harness.execute(&req).await {
                Ok(result) => progress.print_execution(&result),
                Err(e) => {
                    progress.fail("harness error");
                    return Err(LtsError::from(e).into());
                }
            }
        }
        Command::Verify {
            file,
            operation,
            process,
            property,
        } => {
            let content = std::fs::read_to_string(&file).map_err(LtsError::from)?;
            let mut req = VerifyRequest::new(content, operation.into());
            req.process = process;
            req.property = property;

            let progress = TaskProgress::start(&format!("verifying {}", file.display()));
            let verifier = LtsaVerifier::from_config(&config.verifier);
            match verifier.verify(&req).await {
                Ok(resp) => progress.print_verify(&resp),
                Err(e) => {
                    progress.fail("verification could not run");
                    return Err(LtsError::from(e).into());
                }
            }
        }
        Command::Repair {
            file,
            process,
            attempts,
            output,
        } => {
            if config.api_key.is_empty() {
                bail!("repair needs an API key: set ANTHROPIC_API_KEY or api_key in the config file");
            }
            if let Some(n) = attempts {
                config.repair.max_attempts = n;
            }
            let client = AnthropicClient::new(config.api_key.clone())?;
            let verifier = LtsaVerifier::from_config(&config.verifier);

            let progress = TaskProgress::start(&format!("repairing {}", file.display()));
            let report = match repair_file(&file, process.as_deref(), &verifier, &client, &config.repair).await {
                Ok(report) => report,
                Err(e) => {
                    progress.fail("repair aborted");
                    return Err(LtsError::from(e).into());
                }
            };
            progress.print_repair(&report);

            match (&report.final_spec, output) {
                (Some(spec), Some(path)) if report.repaired => {
                    std::fs::write(&path, spec).map_err(LtsError::from)?;
                    eprintln!("wrote {}", path.display());
                }
                (Some(spec), None) if report.repaired => println!("{spec}"),
                _ => {}
            }
            if !report.repaired && !report.initially_valid {
                std::process::exit(1);
            }
        }
        Command::Health => {
            let progress = TaskProgress::start("checking verifier");
            let report = LtsaVerifier::from_config(&config.verifier).health().await;
            progress.print_health(&report);
            if !report.healthy {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
