//! Client for the LTSA command-line analyser (`java -jar ltsp.jar`).
//!
//! Each request stages the FSP text in a temporary `.lts` file, runs one
//! analyser command under a timeout and returns its captured output. The
//! staged file is removed when the request finishes, whatever the outcome.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{info, warn};

use crate::config::VerifierConfig;
use crate::error::VerifyError;

pub const DEFAULT_PROCESS: &str = "DEFAULT";

/// Analyser operations, matching LTSA's Build and Check menus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Parse,
    Compile,
    Compose,
    CheckSafety,
    CheckProgress,
    CheckLtl,
}

impl Operation {
    pub fn name(self) -> &'static str {
        match self {
            Operation::Parse => "parse",
            Operation::Compile => "compile",
            Operation::Compose => "compose",
            Operation::CheckSafety => "safety",
            Operation::CheckProgress => "progress",
            Operation::CheckLtl => "ltl",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyRequest {
    /// FSP source text.
    pub content: String,
    pub operation: Operation,
    /// Composite process name; `DEFAULT` when omitted.
    #[serde(default)]
    pub process: Option<String>,
    /// Assertion name, required by [`Operation::CheckLtl`].
    #[serde(default)]
    pub property: Option<String>,
}

impl VerifyRequest {
    pub fn new(content: impl Into<String>, operation: Operation) -> Self {
        Self {
            content: content.into(),
            operation,
            process: None,
            property: None,
        }
    }

    pub fn with_process(mut self, process: impl Into<String>) -> Self {
        self.process = Some(process.into());
        self
    }

    pub fn with_property(mut self, property: impl Into<String>) -> Self {
        self.property = Some(property.into());
        self
    }

    /// Analyser arguments that follow the staged file path.
    pub fn args(&self) -> Result<Vec<String>, VerifyError> {
        let process = self.process.as_deref().unwrap_or(DEFAULT_PROCESS);
        let args: Vec<&str> = match self.operation {
            Operation::Parse => vec!["-b", "parse"],
            Operation::Compile => vec!["-b", "compile", "-p", process],
            Operation::Compose => vec!["-b", "compose", "-p", process],
            Operation::CheckSafety => vec!["-c", "safety", "-p", process],
            Operation::CheckProgress => vec!["-c", "progress", "-p", process],
            Operation::CheckLtl => {
                let property =
                    self.property
                        .as_deref()
                        .ok_or(VerifyError::MissingArgument {
                            operation: "ltl",
                            field: "property",
                        })?;
                vec!["-c", "ltl_property", "-p", process, "-l", property]
            }
        };
        Ok(args.into_iter().map(String::from).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub success: bool,
    pub output: String,
    /// Captured stderr, or `None` when the analyser wrote nothing to it.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub jar_exists: bool,
    pub jar_path: PathBuf,
    pub java_available: bool,
}

/// Anything that can answer a verification request.
pub trait Verify {
    fn verify(
        &self,
        req: &VerifyRequest,
    ) -> impl Future<Output = Result<VerifyResponse, VerifyError>> + Send;
}

/// Runs `java -jar ltsp.jar <file> <args>` on a staged copy of the request
/// content, bounded by a timeout.
pub struct LtsaVerifier {
    java_bin: String,
    jar_path: PathBuf,
    timeout: Duration,
}

impl LtsaVerifier {
    pub fn new(java_bin: impl Into<String>, jar_path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            java_bin: java_bin.into(),
            jar_path: jar_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &VerifierConfig) -> Self {
        Self::new(
            config.java_bin.clone(),
            config.jar_path.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Report whether the jar exists and `java -version` runs.
    pub async fn health(&self) -> HealthReport {
        let jar_exists = self.jar_path.exists();
        let java_available = tokio::time::timeout(
            Duration::from_secs(5),
            Command::new(&self.java_bin)
                .arg("-version")
                .stdout(Stdio::null())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .status(),
        )
        .await
        .is_ok_and(|status| status.is_ok());

        HealthReport {
            healthy: jar_exists && java_available,
            jar_exists,
            jar_path: self.jar_path.clone(),
            java_available,
        }
    }
}

impl Verify for LtsaVerifier {
    async fn verify(&self, req: &VerifyRequest) -> Result<VerifyResponse, VerifyError> {
        let args = req.args()?;
        if !self.jar_path.exists() {
            return Err(VerifyError::MissingDependency(format!(
                "ltsp.jar not found at {}",
                self.jar_path.display()
            )));
        }

        let staged = tempfile::Builder::new()
            .prefix("ltsgen-")
            .suffix(".lts")
            .tempfile()?;
        tokio::fs::write(staged.path(), &req.content).await?;

        let mut cmd = Command::new(&self.java_bin);
        cmd.arg("-jar")
            .arg(&self.jar_path)
            .arg(staged.path())
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        info!(
            operation = req.operation.name(),
            process = req.process.as_deref().unwrap_or(DEFAULT_PROCESS),
            "running LTSA: {} -jar {} {} {}",
            self.java_bin,
            self.jar_path.display(),
            staged.path().display(),
            args.join(" ")
        );

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                warn!(timeout_secs = self.timeout.as_secs(), "LTSA command timed out");
                return Err(VerifyError::Timeout(self.timeout));
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(VerifyError::MissingDependency(format!(
                    "{} not found",
                    self.java_bin
                )));
            }
            Ok(result) => result?,
        };

        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        Ok(VerifyResponse {
            success: output.status.success(),
            output: String::from_utf8_lossy(&output.stdout).into_owned(),
            error: (!stderr.is_empty()).then_some(stderr),
        })
    }
}
