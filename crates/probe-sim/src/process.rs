//! External miner processes.
//!
//! A [`MinerLauncher`] starts a miner for a [`MinerRole`] and hands back a
//! [`MinerHandle`] that exclusively owns it. Stopping a handle is
//! idempotent, and a miner that already exited is not an error.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::{Child, Command};

use crate::error::ProcessError;

/// Substituted with the thread count in a miner command line.
pub const THREADS_PLACEHOLDER: &str = "{threads}";

/// Stratum server the bundled miner connects to.
pub const DEFAULT_STRATUM: &str = "127.0.0.1:3333";

/// Payout user passed to the stratum server.
pub const DEFAULT_STRATUM_USER: &str = "15DG8HmCHU2Lzc7VpEEhY15iRMCBcje5DY.1234";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MinerRole {
    /// Low-intensity miner standing in for honest hash rate.
    Dedicated,
    /// High-intensity miner standing in for the attacker.
    Attack,
}

impl MinerRole {
    /// Log file the role's stdout and stderr go to.
    pub fn log_file_name(&self) -> &'static str {
        match self {
            Self::Dedicated => "dedicated_miner.log",
            Self::Attack => "attack_miner.log",
        }
    }
}

impl fmt::Display for MinerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dedicated => f.write_str("dedicated"),
            Self::Attack => f.write_str("attack"),
        }
    }
}

/// A running miner owned by the orchestrator.
#[async_trait]
pub trait MinerHandle: Send {
    fn role(&self) -> MinerRole;

    /// OS process id, while running.
    fn id(&self) -> Option<u32>;

    /// Terminate the miner and reap it. Calling again is a no-op.
    async fn stop(&mut self) -> Result<(), ProcessError>;
}

#[async_trait]
pub trait MinerLauncher: Send + Sync {
    async fn start(&self, role: MinerRole, threads: u32) -> Result<Box<dyn MinerHandle>, ProcessError>;
}

/// Launches a miner command line with output appended to a per-role log.
#[derive(Debug, Clone)]
pub struct CommandLauncher {
    template: Vec<String>,
    log_dir: PathBuf,
}

impl CommandLauncher {
    /// `command` is split on whitespace; each [`THREADS_PLACEHOLDER`] is
    /// replaced with the requested thread count at start.
    pub fn new(command: &str, log_dir: impl Into<PathBuf>) -> Result<Self, ProcessError> {
        let template: Vec<String> = command.split_whitespace().map(str::to_owned).collect();
        if template.is_empty() {
            return Err(ProcessError::EmptyCommand);
        }
        Ok(Self {
            template,
            log_dir: log_dir.into(),
        })
    }

    /// `ccminer` mining the `bcd` algorithm against `stratum`.
    pub fn ccminer(stratum: &str, user: &str, log_dir: impl Into<PathBuf>) -> Result<Self, ProcessError> {
        Self::new(&ccminer_command(stratum, user), log_dir)
    }

    /// Program and arguments for `threads`.
    pub fn render(&self, threads: u32) -> Vec<String> {
        let threads = threads.to_string();
        self.template
            .iter()
            .map(|part| part.replace(THREADS_PLACEHOLDER, &threads))
            .collect()
    }

    pub fn log_path(&self, role: MinerRole) -> PathBuf {
        self.log_dir.join(role.log_file_name())
    }
}

/// Default miner command line, with a `{threads}` placeholder.
pub fn ccminer_command(stratum: &str, user: &str) -> String {
    format!("ccminer -a bcd -o stratum+tcp://{stratum} -u {user} -p x -t {THREADS_PLACEHOLDER}")
}

fn open_log(path: &Path) -> Result<File, ProcessError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ProcessError::LogFile {
            path: path.to_path_buf(),
            source,
        })
}

#[async_trait]
impl MinerLauncher for CommandLauncher {
    async fn start(&self, role: MinerRole, threads: u32) -> Result<Box<dyn MinerHandle>, ProcessError> {
        let argv = self.render(threads);
        let (program, args) = argv.split_first().ok_or(ProcessError::EmptyCommand)?;

        let log_path = self.log_path(role);
        let stdout = open_log(&log_path)?;
        let stderr = stdout.try_clone().map_err(|source| ProcessError::LogFile {
            path: log_path.clone(),
            source,
        })?;

        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: program.clone(),
                source,
            })?;

        tracing::info!(%role, threads, pid = ?child.id(), log = %log_path.display(), "miner started");
        Ok(Box::new(ChildHandle {
            role,
            child: Some(child),
        }))
    }
}

/// Handle over a spawned child. Dropping it kills the child.
pub struct ChildHandle {
    role: MinerRole,
    child: Option<Child>,
}

#[async_trait]
impl MinerHandle for ChildHandle {
    fn role(&self) -> MinerRole {
        self.role
    }

    fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    async fn stop(&mut self) -> Result<(), ProcessError> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let pid = child.id();
        match child.try_wait() {
            Ok(Some(status)) => {
                tracing::debug!(role = %self.role, ?pid, %status, "miner already exited");
                return Ok(());
            }
            Ok(None) => {}
            Err(e) => tracing::debug!(role = %self.role, ?pid, "try_wait failed: {e}"),
        }
        match child.kill().await {
            Ok(()) => {
                tracing::info!(role = %self.role, ?pid, "miner stopped");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {
                tracing::debug!(role = %self.role, ?pid, "miner exited before kill");
                Ok(())
            }
            Err(e) => Err(ProcessError::Kill(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ccminer_command_line() {
        let launcher = CommandLauncher::ccminer(DEFAULT_STRATUM, DEFAULT_STRATUM_USER, "/tmp").unwrap();
        assert_eq!(
            launcher.render(4),
            vec![
                "ccminer",
                "-a",
                "bcd",
                "-o",
                "stratum+tcp://127.0.0.1:3333",
                "-u",
                DEFAULT_STRATUM_USER,
                "-p",
                "x",
                "-t",
                "4",
            ]
        );
    }

    #[test]
    fn placeholder_inside_argument() {
        let launcher = CommandLauncher::new("miner --threads={threads}", "/tmp").unwrap();
        assert_eq!(launcher.render(2), vec!["miner", "--threads=2"]);
    }

    #[test]
    fn empty_command_rejected() {
        assert!(matches!(
            CommandLauncher::new("   ", "/tmp"),
            Err(ProcessError::EmptyCommand)
        ));
    }

    #[test]
    fn log_paths_per_role() {
        let launcher = CommandLauncher::new("miner", "/var/log/probe").unwrap();
        assert_eq!(
            launcher.log_path(MinerRole::Attack),
            PathBuf::from("/var/log/probe/attack_miner.log")
        );
        assert_eq!(
            launcher.log_path(MinerRole::Dedicated),
            PathBuf::from("/var/log/probe/dedicated_miner.log")
        );
    }

    #[tokio::test]
    async fn missing_program_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = CommandLauncher::new("hashprobe-no-such-miner -t {threads}", dir.path()).unwrap();
        assert!(matches!(
            launcher.start(MinerRole::Dedicated, 1).await,
            Err(ProcessError::Spawn { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = CommandLauncher::new("sleep 30", dir.path()).unwrap();
        let mut handle = launcher.start(MinerRole::Attack, 1).await.unwrap();
        assert_eq!(handle.role(), MinerRole::Attack);
        assert!(handle.id().is_some());
        handle.stop().await.unwrap();
        assert!(handle.id().is_none());
        handle.stop().await.unwrap();
        assert!(dir.path().join("attack_miner.log").exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stop_after_exit_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let launcher = CommandLauncher::new("true", dir.path()).unwrap();
        let mut handle = launcher.start(MinerRole::Dedicated, 1).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        handle.stop().await.unwrap();
    }
}
