//! Process Supervisor: runs the chat service and the chat client together
//!
//! # Lifecycle
//!
//! ```text
//! Starting ──spawn A, grace, spawn B──→ Running ──interrupt──→ Stopping → Stopped (exit 0)
//!     │                                    │
//!     └── A died during grace              └── A or B exited → terminate survivor
//!                  ↓                                              ↓
//!               Failed (exit 1)  ←────────────────────────────────┘
//! ```
//!
//! The supervisor only ever talks to its children through the process
//! lifecycle: spawn, poll, signal and wait.

pub mod process;

use std::future::Future;
use std::time::Duration;

use nix::sys::signal::Signal;
use thiserror::Error;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

pub use process::{OutputMode, ProcessHandle, ProcessStatus, ServiceSpec, Termination};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to start {name} ({command}): {source}")]
    Spawn {
        name: String,
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to send {signal:?} to {name}: {source}")]
    Signal {
        name: String,
        signal: Signal,
        #[source]
        source: nix::errno::Errno,
    },
    #[error("failed to wait for {name}: {source}")]
    Wait {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Timing knobs for the supervisor
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Head start service A gets before service B is launched
    pub grace_period: Duration,
    /// How often both services are checked
    pub poll_interval: Duration,
    /// How long a service gets to exit after SIGTERM before SIGKILL
    pub shutdown_timeout: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: Duration::from_secs(2),
            poll_interval: Duration::from_secs(1),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// Why supervision ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Shutdown was requested
    Stopped,
    /// A service exited on its own
    Failed { service: String, status: ProcessStatus },
}

/// Final state of one service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceReport {
    pub name: String,
    pub pid: u32,
    pub status: ProcessStatus,
    /// Needed SIGKILL
    pub forced: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorReport {
    pub outcome: Outcome,
    pub services: Vec<ServiceReport>,
}

impl SupervisorReport {
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            Outcome::Stopped => 0,
            Outcome::Failed { .. } => 1,
        }
    }

    pub fn service(&self, name: &str) -> Option<&ServiceReport> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Launches service A (the chat service) and service B (the chat client)
pub struct Supervisor {
    config: SupervisorConfig,
    service_a: ServiceSpec,
    service_b: ServiceSpec,
    state: SupervisorState,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig, service_a: ServiceSpec, service_b: ServiceSpec) -> Self {
        Self {
            config,
            service_a,
            service_b,
            state: SupervisorState::Starting,
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    fn transition(&mut self, state: SupervisorState) {
        info!(from = ?self.state, to = ?state, "Supervisor state change");
        self.state = state;
    }

    /// Run both services until one exits or `shutdown` resolves
    pub async fn run<F>(&mut self, shutdown: F) -> Result<SupervisorReport, SupervisorError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        self.state = SupervisorState::Starting;

        let mut a = ProcessHandle::spawn(&self.service_a)?;

        let interrupted = tokio::select! {
            biased;
            _ = &mut shutdown => true,
            _ = tokio::time::sleep(self.config.grace_period) => false,
        };
        if interrupted {
            info!("Interrupted during startup");
            return self.stop(&mut [&mut a]).await;
        }

        let status = match a.poll() {
            Ok(status) => status,
            Err(e) => return Err(self.abort(&mut [&mut a], e).await),
        };
        if !status.is_running() {
            error!(service = %a.name, %status, "Service exited during startup");
            self.transition(SupervisorState::Failed);
            return Ok(SupervisorReport {
                outcome: Outcome::Failed {
                    service: a.name.clone(),
                    status,
                },
                services: vec![report(&a, false)],
            });
        }

        let mut b = match ProcessHandle::spawn(&self.service_b) {
            Ok(b) => b,
            Err(e) => return Err(self.abort(&mut [&mut a], e).await),
        };

        self.transition(SupervisorState::Running);

        let mut ticker = tokio::time::interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    return self.stop(&mut [&mut a, &mut b]).await;
                }
                _ = ticker.tick() => {
                    match check_pair(&mut a, &mut b) {
                        Ok(None) => {}
                        Ok(Some(Exited::A(status))) => return self.fail_over(&mut a, &mut b, status).await,
                        Ok(Some(Exited::B(status))) => return self.fail_over(&mut b, &mut a, status).await,
                        Err(e) => return Err(self.abort(&mut [&mut a, &mut b], e).await),
                    }
                }
            }
        }
    }

    /// One service exited: terminate the survivor and report failure
    async fn fail_over(
        &mut self,
        dead: &mut ProcessHandle,
        survivor: &mut ProcessHandle,
        status: ProcessStatus,
    ) -> Result<SupervisorReport, SupervisorError> {
        error!(service = %dead.name, %status, "Service exited, stopping {}", survivor.name);
        let termination = survivor.terminate(self.config.shutdown_timeout).await?;
        self.transition(SupervisorState::Failed);
        Ok(SupervisorReport {
            outcome: Outcome::Failed {
                service: dead.name.clone(),
                status,
            },
            services: vec![report(dead, false), report(survivor, termination.forced)],
        })
    }

    /// Requested shutdown: SIGTERM everything, bounded wait, SIGKILL stragglers
    async fn stop(
        &mut self,
        handles: &mut [&mut ProcessHandle],
    ) -> Result<SupervisorReport, SupervisorError> {
        self.transition(SupervisorState::Stopping);

        // Signal everyone first so they shut down in parallel
        for handle in handles.iter() {
            if let Err(e) = handle.signal(Signal::SIGTERM) {
                warn!(service = %handle.name, error = %e, "Failed to send SIGTERM");
            }
        }

        let mut services = Vec::with_capacity(handles.len());
        for handle in handles.iter_mut() {
            let termination = handle.terminate(self.config.shutdown_timeout).await?;
            if termination.forced {
                warn!(service = %handle.name, "Service was force-killed");
            }
            services.push(report(handle, termination.forced));
        }

        self.transition(SupervisorState::Stopped);
        Ok(SupervisorReport {
            outcome: Outcome::Stopped,
            services,
        })
    }

    /// Best-effort teardown before returning an error
    async fn abort(
        &mut self,
        handles: &mut [&mut ProcessHandle],
        cause: SupervisorError,
    ) -> SupervisorError {
        error!(error = %cause, "Supervisor error, stopping services");
        for handle in handles.iter_mut() {
            if let Err(e) = handle.terminate(self.config.shutdown_timeout).await {
                warn!(service = %handle.name, error = %e, "Cleanup failed");
            }
        }
        self.transition(SupervisorState::Failed);
        cause
    }
}

enum Exited {
    A(ProcessStatus),
    B(ProcessStatus),
}

fn check_pair(
    a: &mut ProcessHandle,
    b: &mut ProcessHandle,
) -> Result<Option<Exited>, SupervisorError> {
    let status = a.poll()?;
    if !status.is_running() {
        return Ok(Some(Exited::A(status)));
    }
    let status = b.poll()?;
    if !status.is_running() {
        return Ok(Some(Exited::B(status)));
    }
    Ok(None)
}

fn report(handle: &ProcessHandle, forced: bool) -> ServiceReport {
    ServiceReport {
        name: handle.name.clone(),
        pid: handle.pid,
        status: handle.status(),
        forced,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SupervisorConfig::default();
        assert_eq!(config.grace_period, Duration::from_secs(2));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.shutdown_timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_exit_codes() {
        let stopped = SupervisorReport {
            outcome: Outcome::Stopped,
            services: vec![],
        };
        assert_eq!(stopped.exit_code(), 0);

        let failed = SupervisorReport {
            outcome: Outcome::Failed {
                service: "server".to_string(),
                status: ProcessStatus::Exited(1),
            },
            services: vec![],
        };
        assert_eq!(failed.exit_code(), 1);
    }
}
