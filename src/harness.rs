//! Execution harness for generated Go programs.
//!
//! Generated programs contain no timeout logic of their own, so every run is
//! bounded here: a wall-clock limit, a cap on captured output, and, with the
//! container backend, no network plus memory and CPU ceilings. The local
//! backend cannot enforce the ceilings and refuses to run unless degraded mode
//! is allowed.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{HarnessBackend, HarnessConfig};
use crate::error::HarnessError;

const SOURCE_FILE: &str = "main.go";

/// A program to run, with optional per-request overrides of the configured limits.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub program: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub memory_mb: Option<u64>,
    #[serde(default)]
    pub cpus: Option<f64>,
}

impl ExecutionRequest {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Default::default()
        }
    }
}

/// Outcome of a run. Timeouts and non-zero exits are reported here, not as errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    pub duration_ms: u64,
}

struct RunOutput {
    stdout: String,
    stderr: String,
    status: Option<ExitStatus>,
    timed_out: bool,
    duration: Duration,
}

impl RunOutput {
    fn into_result(self) -> ExecutionResult {
        ExecutionResult {
            success: !self.timed_out && self.status.is_some_and(|s| s.success()),
            stdout: self.stdout,
            stderr: self.stderr,
            exit_code: self.status.and_then(|s| s.code()),
            timed_out: self.timed_out,
            duration_ms: u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Builds and runs generated programs with the configured backend and limits.
pub struct Harness {
    config: HarnessConfig,
}

impl Harness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    /// Stage `req.program` in a fresh temporary directory, then build and run it.
    ///
    /// Errors are reserved for failures to run at all: a missing toolchain or
    /// image, a refused degraded run, or I/O. A program that fails to build,
    /// exits non-zero or times out still yields an [`ExecutionResult`].
    pub async fn execute(&self, req: &ExecutionRequest) -> Result<ExecutionResult, HarnessError> {
        let timeout = Duration::from_secs(req.timeout_secs.unwrap_or(self.config.timeout_secs));
        let workdir = tempfile::Builder::new().prefix("ltsgen-run-").tempdir()?;
        tokio::fs::write(workdir.path().join(SOURCE_FILE), &req.program).await?;

        let result = match self.config.backend {
            HarnessBackend::Container => self.run_container(req, workdir.path(), timeout).await?,
            HarnessBackend::Local => self.run_local(req, workdir.path(), timeout).await?,
        };
        info!(
            success = result.success,
            timed_out = result.timed_out,
            exit_code = ?result.exit_code,
            duration_ms = result.duration_ms,
            "program run finished"
        );
        Ok(result)
    }

    async fn run_container(
        &self,
        req: &ExecutionRequest,
        workdir: &Path,
        timeout: Duration,
    ) -> Result<ExecutionResult, HarnessError> {
        let name = format!("ltsgen-{}", Uuid::new_v4());
        let memory = req.memory_mb.unwrap_or(self.config.memory_mb);
        let cpus = req.cpus.unwrap_or(self.config.cpus);

        let mut cmd = Command::new(&self.config.docker_bin);
        cmd.args(["run", "--rm", "--pull", "never", "--network", "none"])
            .args(["--name", &name])
            .arg(format!("--memory={memory}m"))
            .arg(format!("--cpus={cpus}"))
            .arg("-v")
            .arg(format!("{}:/app:ro", workdir.display()))
            .args(["-w", "/app", "-e", "GOCACHE=/tmp/gocache"])
            .arg(&self.config.image)
            .args([
                "sh",
                "-c",
                "go build -o /tmp/prog main.go && exec /tmp/prog",
            ]);

        debug!(container = %name, image = %self.config.image, memory_mb = memory, cpus, "starting container");
        let out = self
            .run_limited(cmd, timeout, Some(&name))
            .await
            .map_err(|e| missing_or_io(e, &self.config.docker_bin))?;

        if out.status.and_then(|s| s.code()) == Some(125)
            && (out.stderr.contains("No such image") || out.stderr.contains("Unable to find image"))
        {
            return Err(HarnessError::MissingImage(self.config.image.clone()));
        }
        Ok(out.into_result())
    }

    async fn run_local(
        &self,
        req: &ExecutionRequest,
        workdir: &Path,
        timeout: Duration,
    ) -> Result<ExecutionResult, HarnessError> {
        if !self.config.allow_degraded {
            return Err(HarnessError::DegradedNotAllowed("memory and CPU limits"));
        }
        if req.memory_mb.is_some() || req.cpus.is_some() {
            warn!("local backend ignores memory and CPU overrides");
        }

        let binary = workdir.join("prog");
        let mut build = Command::new(&self.config.go_bin);
        build
            .arg("build")
            .arg("-o")
            .arg(&binary)
            .arg(SOURCE_FILE)
            .current_dir(workdir);
        let built = self
            .run_limited(build, Duration::from_secs(self.config.build_timeout_secs), None)
            .await
            .map_err(|e| missing_or_io(e, &self.config.go_bin))?;
        if built.timed_out || !built.status.is_some_and(|s| s.success()) {
            warn!("go build failed");
            return Ok(built.into_result());
        }

        let mut run = Command::new(&binary);
        run.current_dir(workdir);
        Ok(self.run_limited(run, timeout, None).await?.into_result())
    }

    /// Spawn `cmd`, capture capped output and kill it when `timeout` expires.
    async fn run_limited(
        &self,
        mut cmd: Command,
        timeout: Duration,
        container: Option<&str>,
    ) -> std::io::Result<RunOutput> {
        let cap = self.config.max_output_bytes;
        let start = Instant::now();
        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = tokio::spawn(read_capped(child.stdout.take(), cap));
        let stderr = tokio::spawn(read_capped(child.stderr.take(), cap));

        let (status, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => (Some(status?), false),
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "run timed out, killing");
                if let Some(name) = container {
                    let _ = Command::new(&self.config.docker_bin)
                        .args(["kill", name])
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status()
                        .await;
                }
                let _ = child.kill().await;
                (None, true)
            }
        };

        let stdout = stdout.await.map_err(std::io::Error::other)??;
        let stderr = stderr.await.map_err(std::io::Error::other)??;
        Ok(RunOutput {
            stdout,
            stderr,
            status,
            timed_out,
            duration: start.elapsed(),
        })
    }
}

fn missing_or_io(e: std::io::Error, program: &str) -> HarnessError {
    if e.kind() == std::io::ErrorKind::NotFound {
        HarnessError::MissingDependency(format!("{program} not found"))
    } else {
        HarnessError::Io(e)
    }
}

/// Read a stream to the end, keeping at most `cap` bytes. The rest is drained
/// so the writer never blocks on a full pipe.
async fn read_capped<R: AsyncRead + Unpin>(reader: Option<R>, cap: u64) -> std::io::Result<String> {
    let Some(mut reader) = reader else {
        return Ok(String::new());
    };
    let cap = usize::try_from(cap).unwrap_or(usize::MAX);
    let mut kept = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        let room = cap.saturating_sub(kept.len());
        kept.extend_from_slice(&buf[..n.min(room)]);
    }
    Ok(String::from_utf8_lossy(&kept).into_owned())
}
