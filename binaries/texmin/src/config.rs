//! texmin configuration.
//!
//! Configuration is read from an optional TOML file and then overridden by
//! command-line arguments.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use texmin_minimizer::MinimizerConfig;
use texmin_oracle::{Launcher, ProcessOracleConfig};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TexminConfig {
    /// How candidates are compiled.
    pub oracle: OracleConfig,

    /// Search limits and behaviour.
    pub search: SearchConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Compiler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    /// Compiler executable.
    pub program: String,

    /// Arguments passed before the output directory and file name.
    pub args: Vec<String>,

    /// Per-compilation timeout in seconds.
    pub timeout_secs: u64,

    /// Root directory for candidate artifacts.
    pub work_dir: PathBuf,

    /// Keep every candidate directory after compiling it.
    pub keep_artifacts: bool,

    /// Run the compiler in this container image instead of on the host.
    pub docker_image: Option<String>,

    /// Docker executable used when `docker_image` is set.
    pub docker: String,
}

impl Default for OracleConfig {
    fn default() -> Self {
        let process = ProcessOracleConfig::default();
        Self {
            program: process.program,
            args: process.args,
            timeout_secs: process.timeout.as_secs(),
            work_dir: process.work_dir,
            keep_artifacts: process.keep_artifacts,
            docker_image: None,
            docker: "docker".to_string(),
        }
    }
}

impl OracleConfig {
    /// Returns the compile timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn launcher(&self) -> Launcher {
        match self.docker_image {
            Some(ref image) => Launcher::Docker {
                docker: self.docker.clone(),
                image: image.clone(),
            },
            None => Launcher::Local,
        }
    }
}

/// Search limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of search passes.
    pub max_passes: usize,

    /// Maximum number of compilations, unlimited when absent.
    pub max_oracle_calls: Option<usize>,

    /// Re-compile the final document before reporting it.
    pub verify_final: bool,

    /// Step into `\newcommand`-style definitions.
    pub descend_definitions: bool,

    /// Environment holding the document body.
    pub body_environment: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let defaults = MinimizerConfig::default();
        Self {
            max_passes: defaults.max_passes,
            max_oracle_calls: defaults.max_oracle_calls,
            verify_final: defaults.verify_final,
            descend_definitions: defaults.descend_definitions,
            body_environment: defaults.body_environment,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    pub level: String,

    /// Log format (pretty, json, compact).
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl TexminConfig {
    /// Loads configuration from a file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Merges CLI arguments into the configuration.
    pub fn merge_cli_args(&mut self, args: &super::CliArgs) {
        if let Some(ref program) = args.compiler {
            self.oracle.program = program.clone();
        }

        if let Some(ref image) = args.docker_image {
            self.oracle.docker_image = Some(image.clone());
        }

        if let Some(secs) = args.timeout_secs {
            self.oracle.timeout_secs = secs;
        }

        if let Some(ref dir) = args.work_dir {
            self.oracle.work_dir = dir.clone();
        }

        if args.keep_artifacts {
            self.oracle.keep_artifacts = true;
        }

        if let Some(max) = args.max_oracle_calls {
            self.search.max_oracle_calls = Some(max);
        }

        if args.no_definitions {
            self.search.descend_definitions = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            anyhow::bail!("Invalid log level: {}", self.logging.level);
        }

        let valid_formats = ["pretty", "json", "compact"];
        if !valid_formats.contains(&self.logging.format.to_lowercase().as_str()) {
            anyhow::bail!("Invalid log format: {}", self.logging.format);
        }

        if self.oracle.program.trim().is_empty() {
            anyhow::bail!("Compiler program must not be empty");
        }

        if self.oracle.timeout_secs == 0 {
            anyhow::bail!("Compile timeout must be at least one second");
        }

        if self.search.max_passes == 0 {
            anyhow::bail!("max_passes must be positive");
        }

        if self.search.max_oracle_calls == Some(0) {
            anyhow::bail!("max_oracle_calls must be positive when set");
        }

        if self.search.body_environment.trim().is_empty() {
            anyhow::bail!("Body environment name must not be empty");
        }

        Ok(())
    }

    /// Oracle configuration for the process oracle.
    pub fn process_oracle_config(&self) -> ProcessOracleConfig {
        ProcessOracleConfig::default()
            .with_program(self.oracle.program.clone())
            .with_args(self.oracle.args.clone())
            .with_timeout(self.oracle.timeout())
            .with_work_dir(self.oracle.work_dir.clone())
            .with_keep_artifacts(self.oracle.keep_artifacts)
            .with_launcher(self.oracle.launcher())
    }

    /// Search configuration for the driver.
    pub fn minimizer_config(&self) -> MinimizerConfig {
        let mut config = MinimizerConfig::new()
            .with_max_passes(self.search.max_passes)
            .with_verify_final(self.search.verify_final)
            .with_descend_definitions(self.search.descend_definitions)
            .with_body_environment(self.search.body_environment.clone());
        config.max_oracle_calls = self.search.max_oracle_calls;
        config
    }
}
