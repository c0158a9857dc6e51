//! ltsgen configuration loaded from `ltsgen.toml`.
//!
//! Every section and field has a default, so a missing file or a partial file
//! is valid. `ANTHROPIC_API_KEY` and `LTSP_JAR` take precedence over the file.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::LtsError;
use crate::synth::ChoicePolicy;

pub const DEFAULT_CONFIG_FILE: &str = "ltsgen.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LtsgenConfig {
    /// Anthropic API key used by the repair loop.
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub synth: SynthConfig,

    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub harness: HarnessConfig,

    #[serde(default)]
    pub repair: RepairConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SynthConfig {
    #[serde(default)]
    pub choice_policy: ChoicePolicy,
}

/// Settings for invoking the LTSA command-line analyser.
#[derive(Debug, Clone, Deserialize)]
pub struct VerifierConfig {
    #[serde(default = "default_java_bin")]
    pub java_bin: String,

    #[serde(default = "default_jar_path")]
    pub jar_path: PathBuf,

    #[serde(default = "default_verify_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_java_bin() -> String {
    "java".to_string()
}

fn default_jar_path() -> PathBuf {
    PathBuf::from("ltsp.jar")
}

fn default_verify_timeout_secs() -> u64 {
    30
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            java_bin: default_java_bin(),
            jar_path: default_jar_path(),
            timeout_secs: default_verify_timeout_secs(),
        }
    }
}

/// Where generated programs run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarnessBackend {
    /// `docker run` with no network and memory / CPU ceilings.
    #[default]
    Container,
    /// `go build` and run on the host. Cannot enforce memory or CPU limits.
    Local,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub backend: HarnessBackend,

    #[serde(default = "default_docker_bin")]
    pub docker_bin: String,

    #[serde(default = "default_image")]
    pub image: String,

    #[serde(default = "default_go_bin")]
    pub go_bin: String,

    #[serde(default = "default_run_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_build_timeout_secs")]
    pub build_timeout_secs: u64,

    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,

    #[serde(default = "default_cpus")]
    pub cpus: f64,

    /// Per-stream cap on captured output.
    #[serde(default = "default_max_output_bytes")]
    pub max_output_bytes: u64,

    /// Allow the local backend even though it cannot enforce memory and CPU limits.
    #[serde(default)]
    pub allow_degraded: bool,
}

fn default_docker_bin() -> String {
    "docker".to_string()
}

fn default_image() -> String {
    "golang:1.22-alpine".to_string()
}

fn default_go_bin() -> String {
    "go".to_string()
}

fn default_run_timeout_secs() -> u64 {
    10
}

fn default_build_timeout_secs() -> u64 {
    120
}

fn default_memory_mb() -> u64 {
    256
}

fn default_cpus() -> f64 {
    1.0
}

fn default_max_output_bytes() -> u64 {
    1024 * 1024
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            backend: HarnessBackend::default(),
            docker_bin: default_docker_bin(),
            image: default_image(),
            go_bin: default_go_bin(),
            timeout_secs: default_run_timeout_secs(),
            build_timeout_secs: default_build_timeout_secs(),
            memory_mb: default_memory_mb(),
            cpus: default_cpus(),
            max_output_bytes: default_max_output_bytes(),
            allow_degraded: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepairConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Base delay for exponential backoff after a rate-limited model call.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_max_tokens() -> u32 {
    4096
}

fn default_base_delay_ms() -> u64 {
    1000
}

impl Default for RepairConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

impl LtsgenConfig {
    /// Load `path`, or defaults if it does not exist, then apply environment
    /// overrides and check the result.
    pub fn load_from(path: &Path) -> Result<Self, LtsError> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            toml::from_str::<LtsgenConfig>(&contents)?
        } else {
            Self::default()
        };
        let config = config.with_env_overrides(
            std::env::var("ANTHROPIC_API_KEY").ok(),
            std::env::var("LTSP_JAR").ok(),
        );
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make every run fail or hang.
    pub fn validate(&self) -> Result<(), LtsError> {
        if self.verifier.timeout_secs == 0 {
            return Err(LtsError::Config("verifier.timeout_secs must be at least 1".into()));
        }
        if self.harness.timeout_secs == 0 || self.harness.build_timeout_secs == 0 {
            return Err(LtsError::Config("harness timeouts must be at least 1 second".into()));
        }
        if self.harness.cpus.is_nan() || self.harness.cpus <= 0.0 {
            return Err(LtsError::Config(format!(
                "harness.cpus must be positive, got {}",
                self.harness.cpus
            )));
        }
        if self.harness.memory_mb == 0 || self.harness.max_output_bytes == 0 {
            return Err(LtsError::Config(
                "harness.memory_mb and harness.max_output_bytes must be non-zero".into(),
            ));
        }
        if self.repair.max_attempts == 0 {
            return Err(LtsError::Config("repair.max_attempts must be at least 1".into()));
        }
        Ok(())
    }

    /// Environment values win over the file when present and non-empty.
    fn with_env_overrides(mut self, api_key: Option<String>, jar: Option<String>) -> Self {
        if let Some(key) = api_key
            && !key.is_empty()
        {
            self.api_key = key;
        }
        if let Some(jar) = jar
            && !jar.is_empty()
        {
            self.verifier.jar_path = PathBuf::from(jar);
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_values() {
        let config = LtsgenConfig::default();
        assert_eq!(config.synth.choice_policy, ChoicePolicy::First);
        assert_eq!(config.verifier.timeout_secs, 30);
        assert_eq!(config.verifier.java_bin, "java");
        assert_eq!(config.harness.backend, HarnessBackend::Container);
        assert_eq!(config.harness.memory_mb, 256);
        assert!(!config.harness.allow_degraded);
        assert_eq!(config.repair.max_attempts, 3);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            api_key = "sk-test-123"

            [synth]
            choice_policy = "rotate"

            [harness]
            backend = "local"
            allow_degraded = true
        "#;
        let config: LtsgenConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.api_key, "sk-test-123");
        assert_eq!(config.synth.choice_policy, ChoicePolicy::Rotate);
        assert_eq!(config.harness.backend, HarnessBackend::Local);
        assert!(config.harness.allow_degraded);
        assert_eq!(config.harness.timeout_secs, 10);
        assert_eq!(config.verifier.timeout_secs, 30);
    }

    #[test]
    fn load_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = LtsgenConfig::load_from(&dir.path().join("ltsgen.toml")).unwrap();
        assert_eq!(config.repair.max_attempts, 3);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ltsgen.toml");
        std::fs::write(&path, "[repair]\nmax_attempts = 7\n").unwrap();
        let config = LtsgenConfig::load_from(&path).unwrap();
        assert_eq!(config.repair.max_attempts, 7);
    }

    #[test]
    fn load_rejects_malformed_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ltsgen.toml");
        std::fs::write(&path, "[harness\nbackend = 1\n").unwrap();
        let err = LtsgenConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, LtsError::Toml(_)));
    }

    #[test]
    fn load_rejects_zero_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ltsgen.toml");
        std::fs::write(&path, "[repair]\nmax_attempts = 0\n").unwrap();
        let err = LtsgenConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, LtsError::Config(ref m) if m.contains("max_attempts")));
    }

    #[test]
    fn validate_rejects_bad_harness_limits() {
        let mut config = LtsgenConfig::default();
        assert!(config.validate().is_ok());

        config.harness.cpus = 0.0;
        assert!(matches!(config.validate(), Err(LtsError::Config(_))));

        config.harness.cpus = 1.0;
        config.harness.timeout_secs = 0;
        assert!(matches!(config.validate(), Err(LtsError::Config(_))));
    }

    #[test]
    fn env_overrides_take_precedence() {
        let config = LtsgenConfig {
            api_key: "from-file".into(),
            ..Default::default()
        }
        .with_env_overrides(Some("from-env".into()), Some("/opt/ltsp.jar".into()));
        assert_eq!(config.api_key, "from-env");
        assert_eq!(config.verifier.jar_path, PathBuf::from("/opt/ltsp.jar"));

        let config = LtsgenConfig {
            api_key: "from-file".into(),
            ..Default::default()
        }
        .with_env_overrides(Some(String::new()), None);
        assert_eq!(config.api_key, "from-file");
    }
}
