//! Child process handles for supervised services
//!
//! Each handle tracks one service process:
//! Running -> Exited(code) | Killed

use std::fmt;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use super::SupervisorError;

/// Where a service's stdout and stderr go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputMode {
    Inherit,
    Null,
    /// Appended to this file, created if missing
    File(PathBuf),
}

/// How to launch one service
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub name: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
    pub output: OutputMode,
    /// Whether the service reads the terminal; stdin is null otherwise
    pub interactive: bool,
}

impl ServiceSpec {
    pub fn new(name: impl Into<String>, program: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            output: OutputMode::Inherit,
            interactive: false,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn output(mut self, output: OutputMode) -> Self {
        self.output = output;
        self
    }

    pub fn interactive(mut self, interactive: bool) -> Self {
        self.interactive = interactive;
        self
    }

    /// Program and arguments as one line, for logs and reports
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn output_stdio(&self) -> std::io::Result<(Stdio, Stdio)> {
        match &self.output {
            OutputMode::Inherit => Ok((Stdio::inherit(), Stdio::inherit())),
            OutputMode::Null => Ok((Stdio::null(), Stdio::null())),
            OutputMode::File(path) => {
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                let err = file.try_clone()?;
                Ok((Stdio::from(file), Stdio::from(err)))
            }
        }
    }
}

/// Observed state of a service process
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessStatus {
    Running,
    /// Exited on its own with this code
    Exited(i32),
    /// Terminated by a signal
    Killed,
}

impl ProcessStatus {
    fn from_exit(status: ExitStatus) -> Self {
        match status.code() {
            Some(code) => ProcessStatus::Exited(code),
            None => ProcessStatus::Killed,
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ProcessStatus::Running)
    }
}

impl fmt::Display for ProcessStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessStatus::Running => write!(f, "running"),
            ProcessStatus::Exited(code) => write!(f, "exited({})", code),
            ProcessStatus::Killed => write!(f, "killed"),
        }
    }
}

/// How a [`ProcessHandle::terminate`] call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub status: ProcessStatus,
    /// SIGKILL was needed after the SIGTERM wait ran out
    pub forced: bool,
}

/// A running (or reaped) service process
pub struct ProcessHandle {
    pub name: String,
    pub command: String,
    pub pid: u32,
    child: Child,
    status: ProcessStatus,
}

impl ProcessHandle {
    /// Launch the service described by `spec`
    pub fn spawn(spec: &ServiceSpec) -> Result<Self, SupervisorError> {
        let spawn_error = |source: std::io::Error| SupervisorError::Spawn {
            name: spec.name.clone(),
            command: spec.command_line(),
            source,
        };

        let (stdout, stderr) = spec.output_stdio().map_err(spawn_error)?;
        let stdin = if spec.interactive {
            Stdio::inherit()
        } else {
            Stdio::null()
        };

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .envs(spec.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(stdin)
            .stdout(stdout)
            .stderr(stderr)
            .kill_on_drop(true);

        let child = command.spawn().map_err(spawn_error)?;
        let pid = child.id().unwrap_or(0);

        info!(service = %spec.name, pid, command = %spec.command_line(), "Service started");

        Ok(Self {
            name: spec.name.clone(),
            command: spec.command_line(),
            pid,
            child,
            status: ProcessStatus::Running,
        })
    }

    /// Last observed status, without checking the process
    pub fn status(&self) -> ProcessStatus {
        self.status
    }

    /// Check whether the process has exited, reaping it if so
    pub fn poll(&mut self) -> Result<ProcessStatus, SupervisorError> {
        if !self.status.is_running() {
            return Ok(self.status);
        }
        let exited = self.child.try_wait().map_err(|source| SupervisorError::Wait {
            name: self.name.clone(),
            source,
        })?;
        if let Some(exit) = exited {
            self.status = ProcessStatus::from_exit(exit);
            info!(service = %self.name, pid = self.pid, status = %self.status, "Service exited");
        }
        Ok(self.status)
    }

    /// Send a signal; a process that is already gone is not an error
    pub fn signal(&self, sig: Signal) -> Result<(), SupervisorError> {
        if !self.status.is_running() {
            return Ok(());
        }
        match signal::kill(Pid::from_raw(self.pid as i32), sig) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(source) => Err(SupervisorError::Signal {
                name: self.name.clone(),
                signal: sig,
                source,
            }),
        }
    }

    /// SIGTERM, wait up to `timeout`, then SIGKILL
    pub async fn terminate(&mut self, timeout: Duration) -> Result<Termination, SupervisorError> {
        if !self.poll()?.is_running() {
            return Ok(Termination {
                status: self.status,
                forced: false,
            });
        }

        debug!(service = %self.name, pid = self.pid, "Sending SIGTERM");
        self.signal(Signal::SIGTERM)?;

        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(exit)) => {
                self.status = ProcessStatus::from_exit(exit);
                info!(service = %self.name, pid = self.pid, status = %self.status, "Service stopped");
                Ok(Termination {
                    status: self.status,
                    forced: false,
                })
            }
            Ok(Err(source)) => Err(SupervisorError::Wait {
                name: self.name.clone(),
                source,
            }),
            Err(_) => {
                warn!(
                    service = %self.name,
                    pid = self.pid,
                    timeout_ms = timeout.as_millis() as u64,
                    "Service ignored SIGTERM, sending SIGKILL"
                );
                self.kill().await?;
                Ok(Termination {
                    status: self.status,
                    forced: true,
                })
            }
        }
    }

    /// SIGKILL and reap
    pub async fn kill(&mut self) -> Result<(), SupervisorError> {
        match self.child.kill().await {
            Ok(()) => {}
            // Already reaped
            Err(e) if e.kind() == std::io::ErrorKind::InvalidInput => {}
            Err(source) => {
                return Err(SupervisorError::Wait {
                    name: self.name.clone(),
                    source,
                })
            }
        }
        if self.status.is_running() {
            self.status = ProcessStatus::Killed;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_command_line() {
        let spec = ServiceSpec::new("server", "/usr/bin/chatvisor-server")
            .arg("--bind")
            .arg("127.0.0.1:8000");
        assert_eq!(spec.command_line(), "/usr/bin/chatvisor-server --bind 127.0.0.1:8000");
        assert!(!spec.interactive);
        assert_eq!(spec.output, OutputMode::Inherit);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(ProcessStatus::Running.to_string(), "running");
        assert_eq!(ProcessStatus::Exited(3).to_string(), "exited(3)");
        assert_eq!(ProcessStatus::Killed.to_string(), "killed");
    }

    #[tokio::test]
    async fn test_poll_sees_exit_code() {
        let spec = ServiceSpec::new("quick", "sh").arg("-c").arg("exit 3").output(OutputMode::Null);
        let mut handle = ProcessHandle::spawn(&spec).unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while handle.poll().unwrap().is_running() {
            assert!(Instant::now() < deadline, "process did not exit");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(handle.status(), ProcessStatus::Exited(3));
    }

    #[tokio::test]
    async fn test_terminate_running_process() {
        let spec = ServiceSpec::new("sleeper", "sleep").arg("30").output(OutputMode::Null);
        let mut handle = ProcessHandle::spawn(&spec).unwrap();
        assert!(handle.pid > 0);

        let termination = handle.terminate(Duration::from_secs(5)).await.unwrap();
        assert_eq!(termination.status, ProcessStatus::Killed);
        assert!(!termination.forced);

        // Terminating again is a no-op
        let again = handle.terminate(Duration::from_secs(5)).await.unwrap();
        assert_eq!(again.status, ProcessStatus::Killed);
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let spec = ServiceSpec::new("ghost", "/nonexistent/chatvisor-ghost");
        let err = ProcessHandle::spawn(&spec).err().unwrap();
        assert!(matches!(err, SupervisorError::Spawn { .. }));
        assert!(err.to_string().contains("ghost"));
    }
}
