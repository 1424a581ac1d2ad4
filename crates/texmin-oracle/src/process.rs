//! Oracle that runs a TeX compiler as a subprocess.
//!
//! Each call writes the candidate to its own artifact directory
//! `<work_dir>/<run_id>/<artifact>/candidate.tex`, runs the compiler there
//! (directly or inside a container) and reads the signature from the
//! resulting `candidate.log`.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use texmin_oracle::{Launcher, ProcessOracle, ProcessOracleConfig};
//!
//! let oracle = ProcessOracle::new(
//!     ProcessOracleConfig::default()
//!         .with_timeout(Duration::from_secs(30))
//!         .with_launcher(Launcher::docker("texlive/texlive:latest")),
//! );
//! ```

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use crate::context::RunContext;
use crate::error::{OracleError, Result};
use crate::signature::{extract_signature, OracleResult};
use crate::traits::CompilerOracle;

/// File name of the candidate inside its artifact directory.
pub const CANDIDATE_FILE: &str = "candidate.tex";

/// File name of the log the compiler leaves next to the candidate.
pub const LOG_FILE: &str = "candidate.log";

/// Mount point of the artifact directory inside a container.
const CONTAINER_WORK_DIR: &str = "/work";

/// How the compiler is started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Launcher {
    /// Run the compiler on the host.
    Local,
    /// Run the compiler in a throwaway container.
    Docker { docker: String, image: String },
}

impl Launcher {
    /// Docker launcher using the `docker` binary from `PATH`.
    pub fn docker(image: impl Into<String>) -> Self {
        Launcher::Docker {
            docker: "docker".to_string(),
            image: image.into(),
        }
    }
}

/// Configuration for [`ProcessOracle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOracleConfig {
    /// Compiler executable.
    pub program: String,
    /// Arguments placed before the output directory and file name.
    pub args: Vec<String>,
    /// Limit for a single compilation.
    pub timeout: Duration,
    /// Root of all artifact directories.
    pub work_dir: PathBuf,
    /// Keep artifact directories after each call.
    pub keep_artifacts: bool,
    pub launcher: Launcher,
}

impl Default for ProcessOracleConfig {
    fn default() -> Self {
        Self {
            program: "pdflatex".to_string(),
            args: vec!["-interaction=nonstopmode".to_string()],
            timeout: Duration::from_secs(60),
            work_dir: PathBuf::from("texmin-artifacts"),
            keep_artifacts: false,
            launcher: Launcher::Local,
        }
    }
}

impl ProcessOracleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the compiler executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    /// Replace the compiler arguments.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Set the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the artifact root directory.
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    /// Keep or remove artifact directories.
    pub fn with_keep_artifacts(mut self, keep: bool) -> Self {
        self.keep_artifacts = keep;
        self
    }

    /// Set how the compiler is started.
    pub fn with_launcher(mut self, launcher: Launcher) -> Self {
        self.launcher = launcher;
        self
    }
}

/// Compiles candidates with an external TeX toolchain.
#[derive(Debug, Clone)]
pub struct ProcessOracle {
    config: ProcessOracleConfig,
}

impl ProcessOracle {
    pub fn new(config: ProcessOracleConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProcessOracleConfig {
        &self.config
    }

    /// Directory holding all artifacts of one run.
    pub fn run_dir(&self, ctx: &RunContext) -> PathBuf {
        self.config.work_dir.join(ctx.run_id().to_string())
    }

    /// Name of the container compiling `artifact`, when one is used.
    pub fn container_name(&self, ctx: &RunContext, artifact: &str) -> Option<String> {
        match self.config.launcher {
            Launcher::Local => None,
            Launcher::Docker { .. } => Some(format!("texmin-{}-{}", ctx.run_id(), artifact)),
        }
    }

    /// Build the command compiling the candidate in `dir`.
    async fn build_command(&self, dir: &Path, container: Option<&str>) -> Result<Command> {
        let mut cmd = match &self.config.launcher {
            Launcher::Local => {
                let mut cmd = Command::new(&self.config.program);
                cmd.args(&self.config.args);
                cmd.arg("-output-directory=.");
                cmd.arg(CANDIDATE_FILE);
                cmd.current_dir(dir);
                cmd
            }
            Launcher::Docker { docker, image } => {
                let host_dir = tokio::fs::canonicalize(dir).await?;
                let mut cmd = Command::new(docker);
                cmd.arg("run").arg("--rm");
                if let Some(name) = container {
                    cmd.arg("--name").arg(name);
                }
                cmd.arg("-v");
                cmd.arg(format!("{}:{}", host_dir.display(), CONTAINER_WORK_DIR));
                cmd.arg("-w").arg(CONTAINER_WORK_DIR);
                cmd.arg(image);
                cmd.arg(&self.config.program);
                cmd.args(&self.config.args);
                cmd.arg(format!("-output-directory={}", CONTAINER_WORK_DIR));
                cmd.arg(CANDIDATE_FILE);
                cmd
            }
        };

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        Ok(cmd)
    }

    /// Command force-removing a named container. Killing the `docker`
    /// client leaves the container running in the daemon.
    fn removal_command(&self, container: &str) -> Option<Command> {
        let Launcher::Docker { docker, .. } = &self.config.launcher else {
            return None;
        };
        let mut cmd = Command::new(docker);
        cmd.arg("rm").arg("-f").arg(container);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());
        Some(cmd)
    }

    async fn remove_container(&self, container: &str) {
        let Some(mut cmd) = self.removal_command(container) else {
            return;
        };
        match cmd.status().await {
            Ok(status) if status.success() => debug!(container, "Removed timed out container"),
            Ok(status) => warn!(container, code = status.code().unwrap_or(-1), "Failed to remove container"),
            Err(e) => warn!(container, error = %e, "Failed to run container removal"),
        }
    }

    fn launched_program(&self) -> &str {
        match &self.config.launcher {
            Launcher::Local => &self.config.program,
            Launcher::Docker { docker, .. } => docker,
        }
    }

    /// Run the compiler in `dir` and read the resulting log.
    async fn compile(&self, dir: &Path, container: Option<&str>) -> Result<OracleResult> {
        let mut cmd = self.build_command(dir, container).await?;
        trace!(command = ?cmd, "Running compiler");

        let mut child = cmd.spawn().map_err(|source| OracleError::Spawn {
            program: self.launched_program().to_string(),
            source,
        })?;

        // The compiler is chatty; drain both pipes so it never blocks on a full one.
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(drain(stdout, "stdout"));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(drain(stderr, "stderr"));
        }

        match timeout(self.config.timeout, child.wait()).await {
            Ok(status) => {
                let status = status?;
                debug!(code = status.code().unwrap_or(-1), "Compiler exited");
            }
            Err(_) => {
                warn!(timeout = ?self.config.timeout, "Compiler timed out");
                let _ = child.kill().await;
                if let Some(name) = container {
                    self.remove_container(name).await;
                }
                return Ok(OracleResult::timed_out());
            }
        }

        read_log(&dir.join(LOG_FILE)).await
    }
}

async fn drain<R>(reader: R, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        trace!(stream, "{}", line);
    }
}

async fn read_log(path: &Path) -> Result<OracleResult> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(OracleResult::new(extract_signature(&String::from_utf8_lossy(&bytes)))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Compiler left no log");
            Ok(OracleResult::missing())
        }
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl CompilerOracle for ProcessOracle {
    fn name(&self) -> &str {
        match self.config.launcher {
            Launcher::Local => "process",
            Launcher::Docker { .. } => "docker",
        }
    }

    async fn evaluate(&self, ctx: &mut RunContext, candidate: &str, label: &str) -> Result<OracleResult> {
        let artifact = ctx.next_artifact(label);
        let dir = self.run_dir(ctx).join(&artifact);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(CANDIDATE_FILE), candidate).await?;

        let container = self.container_name(ctx, &artifact);
        let outcome = self.compile(&dir, container.as_deref()).await;

        if !self.config.keep_artifacts {
            if let Err(e) = tokio::fs::remove_dir_all(&dir).await {
                debug!(dir = %dir.display(), error = %e, "Failed to remove artifact directory");
            }
        }

        let result = outcome?;
        trace!(%artifact, signature = %result.signature, "Evaluated candidate");
        Ok(result)
    }

    fn description(&self) -> &str {
        "Compiles candidates with an external TeX toolchain"
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::signature::Signature;

    fn shell_oracle(work_dir: &Path, script: &str) -> ProcessOracle {
        ProcessOracle::new(oracle_config(work_dir, script).with_timeout(Duration::from_secs(10)))
    }

    #[tokio::test]
    async fn test_signature_read_from_log() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = shell_oracle(
            dir.path(),
            r#"grep -q badcmd "$1" && printf 'x\n! Undefined control sequence.\nl.1\n' > candidate.log || printf 'ok\n' > candidate.log"#,
        );
        let mut ctx = RunContext::new();

        let failing = oracle.evaluate(&mut ctx, "\\badcmd", "0").await.unwrap();
        assert_eq!(failing.signature, Signature::diagnostic("! Undefined control sequence."));
        assert!(failing.produced_diagnostic);

        let clean = oracle.evaluate(&mut ctx, "fine", "1").await.unwrap();
        assert_eq!(clean.signature, Signature::Clean);
    }

    #[tokio::test]
    async fn test_missing_log_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = shell_oracle(dir.path(), "true");
        let result = oracle.evaluate(&mut RunContext::new(), "x", "blank").await.unwrap();
        assert!(!result.produced_diagnostic);
    }

    #[tokio::test]
    async fn test_timeout_is_a_signature() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = ProcessOracle::new(
            oracle_config(dir.path(), "sleep 5").with_timeout(Duration::from_millis(100)),
        );
        let result = oracle.evaluate(&mut RunContext::new(), "x", "0").await.unwrap();
        assert_eq!(result.signature, Signature::TimedOut);
    }

    #[tokio::test]
    async fn test_artifacts_removed_unless_kept() {
        let dir = tempfile::tempdir().unwrap();
        let script = "printf '! Emergency stop.\\n' > candidate.log";
        let mut ctx = RunContext::new();

        let oracle = shell_oracle(dir.path(), script);
        oracle.evaluate(&mut ctx, "x", "0").await.unwrap();
        let run_dir = oracle.run_dir(&ctx);
        assert_eq!(std::fs::read_dir(&run_dir).unwrap().count(), 0);

        let keeping = ProcessOracle::new(oracle_config(dir.path(), script).with_keep_artifacts(true));
        keeping.evaluate(&mut ctx, "x", "P0..P3").await.unwrap();
        let kept = run_dir.join("g0-2-P0..P3");
        assert!(kept.join(CANDIDATE_FILE).exists());
        assert!(kept.join(LOG_FILE).exists());
    }

    #[tokio::test]
    async fn test_spawn_failure_names_program() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = ProcessOracle::new(
            ProcessOracleConfig::default()
                .with_program("texmin-no-such-compiler")
                .with_work_dir(dir.path()),
        );
        let err = oracle.evaluate(&mut RunContext::new(), "x", "0").await.unwrap_err();
        assert!(matches!(err, OracleError::Spawn { ref program, .. } if program == "texmin-no-such-compiler"));
    }

    fn args_of(cmd: &Command) -> Vec<String> {
        cmd.as_std()
            .get_args()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    #[tokio::test]
    async fn test_docker_containers_are_named_and_removable() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = ProcessOracle::new(
            ProcessOracleConfig::default()
                .with_work_dir(dir.path())
                .with_launcher(Launcher::docker("texlive/texlive:latest")),
        );
        let mut ctx = RunContext::new();
        let artifact = ctx.next_artifact("P0..P3");
        let name = oracle.container_name(&ctx, &artifact).unwrap();
        assert_eq!(name, format!("texmin-{}-g0-1-P0..P3", ctx.run_id()));

        let cmd = oracle.build_command(dir.path(), Some(&name)).await.unwrap();
        let args = args_of(&cmd);
        assert_eq!(&args[..4], ["run", "--rm", "--name", name.as_str()]);
        assert!(args.contains(&"texlive/texlive:latest".to_string()));

        let removal = oracle.removal_command(&name).unwrap();
        assert_eq!(removal.as_std().get_program(), "docker");
        assert_eq!(args_of(&removal), ["rm", "-f", name.as_str()]);
    }

    #[tokio::test]
    async fn test_local_compiler_has_no_container() {
        let dir = tempfile::tempdir().unwrap();
        let oracle = shell_oracle(dir.path(), "true");
        let mut ctx = RunContext::new();
        let artifact = ctx.next_artifact("0");
        assert_eq!(oracle.container_name(&ctx, &artifact), None);
        assert!(oracle.removal_command("texmin-x").is_none());

        let cmd = oracle.build_command(dir.path(), None).await.unwrap();
        assert!(!args_of(&cmd).contains(&"--name".to_string()));
    }

    // `sh -c script $0 $1`: $0 is the output directory flag, $1 the candidate.
    fn oracle_config(work_dir: &Path, script: &str) -> ProcessOracleConfig {
        ProcessOracleConfig::default()
            .with_program("sh")
            .with_args(["-c", script])
            .with_work_dir(work_dir)
    }
}
