//! Runs the controller on a background thread and stops it with a deadline.
//!
//! The controller itself never waits for an engine to exit. Hosts that want a hard
//! deadline do what the [`Supervisor`] does: `stop`, wait up to a grace period for the
//! run to finish, and escalate to `force_close` if it has not.

use crate::controller::Controller;
use crate::error::Error;
use crate::logging::{log, warn};
use crate::options::ProxyOptions;
use dpictl_internal::BACKOFF_DURATION;
use dpictl_internal::engine::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use wasm_safe_mutex::Mutex;

mod millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis: u64 = Deserialize::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// How long the supervisor waits before escalating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownPolicy {
    /// How long to wait for the run to finish after a stop, and again after a forced close.
    #[serde(with = "millis", rename = "grace_ms")]
    pub grace: Duration,
    /// How often to check whether the run has finished.
    #[serde(with = "millis", rename = "poll_interval_ms")]
    pub poll_interval: Duration,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        ShutdownPolicy {
            grace: Duration::from_secs(5),
            poll_interval: BACKOFF_DURATION,
        }
    }
}

/// The service status a host would show.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceStatus {
    /// A run has been launched and has not finished.
    Connected,
    /// Nothing is running, or the last run exited with code 0.
    Disconnected,
    /// The last run exited with a nonzero code or an error.
    Failed,
}

/// How a [`Supervisor::shutdown`] went.
#[derive(Debug)]
pub enum StopOutcome {
    /// Nothing was launched.
    NotLaunched,
    /// The run had already finished on its own.
    Finished(Result<i32, Error>),
    /// The run finished within the grace period after a stop.
    Graceful(Result<i32, Error>),
    /// The grace period expired and the socket was force-closed.
    ///
    /// Holds the run's result if it then finished within a second grace period. If it
    /// did not, the run thread has been detached.
    Forced(Option<Result<i32, Error>>),
}

type RunThread = JoinHandle<Result<i32, Error>>;

/// Launches runs of a controller and stops them on a deadline.
#[derive(Debug)]
pub struct Supervisor<E: Engine> {
    controller: Arc<Controller<E>>,
    policy: ShutdownPolicy,
    run: Mutex<Option<RunThread>>,
    status: Arc<Mutex<ServiceStatus>>,
}

fn join(thread: RunThread) -> Result<i32, Error> {
    thread
        .join()
        .unwrap_or_else(|_| Err(Error::EnginePanicked("run thread panicked".to_string())))
}

fn finish_status(result: &Result<i32, Error>) -> ServiceStatus {
    match result {
        Ok(0) => ServiceStatus::Disconnected,
        Ok(_) | Err(_) => ServiceStatus::Failed,
    }
}

impl<E: Engine> Supervisor<E> {
    /// Creates a supervisor for `controller` with nothing launched.
    pub fn new(controller: Arc<Controller<E>>, policy: ShutdownPolicy) -> Supervisor<E> {
        Supervisor {
            controller,
            policy,
            run: Mutex::new(None),
            status: Arc::new(Mutex::new(ServiceStatus::Disconnected)),
        }
    }

    /// The supervised controller.
    pub fn controller(&self) -> &Arc<Controller<E>> {
        &self.controller
    }

    /// The status of the most recent run.
    pub fn status(&self) -> ServiceStatus {
        self.status.with_sync(|status| *status)
    }

    /// Validates `options` and launches a run with them.
    pub fn launch_with(&self, options: &ProxyOptions) -> Result<(), Error> {
        let args = options.to_args()?;
        self.launch(args)
    }

    /// Starts the controller with `args` on a dedicated thread and returns immediately.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRunning`] if a run launched by this supervisor has not finished.
    /// Errors from the controller itself (including `AlreadyRunning` when another host
    /// is using the same controller) surface through [`shutdown`](Self::shutdown) and
    /// [`status`](Self::status) instead.
    pub fn launch(&self, args: Vec<Option<String>>) -> Result<(), Error> {
        self.run.with_mut_sync(|run| -> Result<(), Error> {
            if run.as_ref().is_some_and(|thread| !thread.is_finished()) {
                warn("proxy already launched");
                return Err(Error::AlreadyRunning);
            }
            if let Some(previous) = run.take() {
                // already finished; reap it so its result isn't lost silently
                let result = join(previous);
                log(&format!("reaped previous run: {:?}", result));
            }
            self.status
                .with_mut_sync(|status| *status = ServiceStatus::Connected);
            let controller = self.controller.clone();
            let status = self.status.clone();
            let spawned = std::thread::Builder::new()
                .name("dpictl::run".to_string())
                .spawn(move || {
                    let result = controller.start(&args);
                    match &result {
                        Ok(code) if *code != 0 => {
                            warn(&format!("proxy stopped with code {}", code))
                        }
                        Ok(_) => log("proxy stopped normally"),
                        Err(e) => warn(&format!("error in proxy execution: {}", e)),
                    }
                    let finished = finish_status(&result);
                    status.with_mut_sync(|status| *status = finished);
                    result
                });
            match spawned {
                Ok(thread) => {
                    *run = Some(thread);
                    log("proxy started");
                    Ok(())
                }
                Err(e) => {
                    self.status
                        .with_mut_sync(|status| *status = ServiceStatus::Failed);
                    Err(Error::Spawn(e))
                }
            }
        })
    }

    fn wait(&self, thread: &RunThread) -> bool {
        let deadline = Instant::now() + self.policy.grace;
        while !thread.is_finished() {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            std::thread::sleep(self.policy.poll_interval.min(deadline - now));
        }
        true
    }

    /// Stops the current run, escalating to a forced close if it overstays its grace period.
    pub fn shutdown(&self) -> StopOutcome {
        log("stopping proxy");
        let Some(thread) = self.run.with_mut_sync(|run| run.take()) else {
            log("proxy already disconnected");
            return StopOutcome::NotLaunched;
        };
        if thread.is_finished() {
            return StopOutcome::Finished(join(thread));
        }

        if let Err(e) = self.controller.stop() {
            warn(&format!("failed to stop proxy: {}", e));
        }
        let outcome = if self.wait(&thread) {
            StopOutcome::Graceful(join(thread))
        } else {
            warn("proxy did not finish in time, force closing");
            if let Err(e) = self.controller.force_close() {
                warn(&format!("failed to force close proxy: {}", e));
            }
            if self.wait(&thread) {
                StopOutcome::Forced(Some(join(thread)))
            } else {
                warn("proxy still running after force close, detaching its thread");
                StopOutcome::Forced(None)
            }
        };
        self.status
            .with_mut_sync(|status| *status = ServiceStatus::Disconnected);
        log("proxy stopped");
        outcome
    }
}
