//! The lifecycle controller.
//!
//! A [`Controller`] owns one engine and guarantees at most one run of it at a time.
//! `start` blocks its caller for the whole run; `stop` and `force_close` may be called
//! from any other thread while it does.
//!
//! # Locks
//!
//! All three operations serialize on the run-state lock. The engine's pool slot and
//! server handle each carry a narrower lock of their own. The controller only takes
//! those while already holding the run-state lock, and the engine takes them without
//! ever touching the run-state lock, so the order is always run-state first.

use crate::error::Error;
use crate::logging::{log, warn};
use crate::shutdown::{self, ShutdownMode};
use dpictl_internal::argv::ArgumentVector;
use dpictl_internal::engine::{Engine, EngineLink};
use dpictl_internal::handle::HandleStatus;
use std::panic::AssertUnwindSafe;
use wasm_safe_mutex::Mutex;

/// The controller's state as the host sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    /// No run is in progress.
    Idle,
    /// A run is in progress and has not been asked to stop.
    Running,
    /// The run was asked to stop, but the engine's entry point has not returned yet.
    ///
    /// `stop` reports [`Error::NotRunning`] and `start` reports
    /// [`Error::AlreadyRunning`] until it does. `force_close` still works.
    Unwinding,
}

#[derive(Debug, Default)]
struct RunState {
    /// Host-visible: a run is in progress and has not been stopped.
    running: bool,
    /// The engine's entry point is executing on some thread.
    in_flight: bool,
}

/// Starts, stops and force-closes one engine.
///
/// Construct one per engine and share it (usually in an `Arc`) with every thread that
/// needs to control it. Independent controllers share nothing.
#[derive(Debug)]
pub struct Controller<E: Engine> {
    engine: E,
    state: Mutex<RunState>,
    link: EngineLink,
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl<E: Engine> Controller<E> {
    /// Creates an idle controller for `engine`.
    pub fn new(engine: E) -> Controller<E> {
        Controller {
            engine,
            state: Mutex::new(RunState::default()),
            link: EngineLink::new(),
        }
    }

    /// The supervised engine.
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Runs the engine with `args`, blocking until it exits.
    ///
    /// `None` entries are passed through as empty argument slots. Returns the engine's
    /// exit code, whatever the reason it exited.
    ///
    /// # Errors
    ///
    /// * [`Error::AlreadyRunning`] if a run is in progress or still unwinding. The engine
    ///   is not invoked.
    /// * [`Error::InvalidArgument`] if `args` is empty or an argument contains a NUL byte.
    /// * [`Error::AllocationFailure`] if the argument vector could not be allocated.
    /// * [`Error::EnginePanicked`] if the engine panicked; the controller is Idle again.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use dpictl::Controller;
    /// use dpictl::engine::AcceptLoop;
    /// use std::sync::Arc;
    ///
    /// let controller = Arc::new(Controller::new(AcceptLoop::new()));
    /// let runner = controller.clone();
    /// let run = std::thread::spawn(move || runner.start(&[Some("--port"), Some("1080")]));
    /// // ... later, from any thread
    /// controller.stop().unwrap();
    /// let code = run.join().unwrap().unwrap();
    /// ```
    pub fn start<S: AsRef<str>>(&self, args: &[Option<S>]) -> Result<i32, Error> {
        let argv = self
            .state
            .with_mut_sync(|state| -> Result<ArgumentVector, Error> {
                if state.running || state.in_flight {
                    log("proxy already running");
                    return Err(Error::AlreadyRunning);
                }
                let argv = ArgumentVector::marshal(args).map_err(|e| {
                    warn(&e.to_string());
                    Error::from(e)
                })?;
                log(&format!("starting proxy with {} args", argv.len()));
                self.engine.reset_defaults();
                self.link.pool().withdraw();
                if self.link.server().close() {
                    warn("released a server socket left over from the previous run");
                }
                state.running = true;
                state.in_flight = true;
                Ok(argv)
            })?;

        let result =
            std::panic::catch_unwind(AssertUnwindSafe(|| self.engine.run(&argv, &self.link)));

        self.state.with_mut_sync(|state| {
            if result.is_err() {
                // a panicked engine never got to close what it published
                self.link.pool().withdraw();
                if self.link.server().close() {
                    log("closed server socket abandoned by panicked engine");
                }
            }
            state.running = false;
            state.in_flight = false;
        });
        drop(argv);

        match result {
            Ok(code) => {
                log(&format!("proxy return code {}", code));
                Ok(code)
            }
            Err(payload) => {
                let message = panic_message(&*payload);
                warn(&format!("engine panicked: {}", message));
                Err(Error::EnginePanicked(message))
            }
        }
    }

    /// Asks the running engine to exit, and returns without waiting for it.
    ///
    /// Sets the break flag if the engine has published its pool, then half-closes the
    /// server socket so a blocked accept wakes up. The socket is left for the engine to
    /// close. The in-flight `start` returns once the engine's loop has wound down.
    ///
    /// # Errors
    ///
    /// * [`Error::NotRunning`] if no run is in progress, including a run that was already
    ///   stopped and is still unwinding. Nothing changes.
    /// * [`Error::InvalidHandle`] if the engine has no valid socket to shut down. The
    ///   controller is marked Idle, since there is nothing left to signal.
    pub fn stop(&self) -> Result<(), Error> {
        log("send shutdown to proxy");
        self.state.with_mut_sync(|state| {
            if !state.running {
                log("proxy is not running");
                return Err(Error::NotRunning);
            }
            if !self.link.server().is_valid() {
                warn("invalid server handle");
                state.running = false;
                return Err(Error::InvalidHandle);
            }
            let teardown = shutdown::tear_down(&self.link, ShutdownMode::Graceful);
            if !teardown.reached_engine() {
                warn("stop could not signal the engine; it may keep running until force closed");
            }
            state.running = false;
            Ok(())
        })
    }

    /// Signals the engine and closes its socket immediately.
    ///
    /// Unlike [`stop`](Self::stop), this releases the socket itself instead of leaving it
    /// to the engine, and works whether or not a stop is already unwinding. Calling it
    /// when the socket is already gone is a successful no-op.
    pub fn force_close(&self) -> Result<(), Error> {
        self.state.with_mut_sync(|state| {
            log(&format!(
                "force closing server socket ({:?})",
                self.link.server().local_addr()
            ));
            if !self.link.server().is_valid() {
                log("server socket already closed or invalid");
                state.running = false;
                return Ok(());
            }
            let teardown = shutdown::tear_down(&self.link, ShutdownMode::Forced);
            if !teardown.reached_engine() {
                warn("server socket disappeared during force close");
            }
            state.running = false;
            Ok(())
        })
    }

    /// The current state, including whether a stopped run is still unwinding.
    pub fn state(&self) -> ControllerState {
        self.state.with_sync(|state| match (state.running, state.in_flight) {
            (true, _) => ControllerState::Running,
            (false, true) => ControllerState::Unwinding,
            (false, false) => ControllerState::Idle,
        })
    }

    /// Whether a run is in progress and has not been asked to stop.
    pub fn is_running(&self) -> bool {
        self.state() == ControllerState::Running
    }

    /// The state of the socket the engine published.
    pub fn server_status(&self) -> HandleStatus {
        self.link.server().status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct Counting {
        runs: AtomicUsize,
        resets: AtomicUsize,
    }

    impl Engine for Counting {
        fn run(&self, argv: &ArgumentVector, _link: &EngineLink) -> i32 {
            self.runs.fetch_add(1, Ordering::SeqCst);
            argv.len() as i32
        }

        fn reset_defaults(&self) {
            self.resets.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Panicking;

    impl Engine for Panicking {
        fn run(&self, _argv: &ArgumentVector, _link: &EngineLink) -> i32 {
            panic!("engine blew up");
        }
    }

    #[test]
    fn test_start_returns_exit_code() {
        let controller = Controller::new(Counting::default());
        assert_eq!(controller.start(&[Some("a"), None, Some("c")]).unwrap(), 3);
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(controller.engine().runs.load(Ordering::SeqCst), 1);
        assert_eq!(controller.engine().resets.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_empty_args_touch_nothing() {
        let controller = Controller::new(Counting::default());
        let args: [Option<&str>; 0] = [];
        assert!(matches!(
            controller.start(&args),
            Err(Error::InvalidArgument(_))
        ));
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(controller.engine().runs.load(Ordering::SeqCst), 0);
        assert_eq!(controller.engine().resets.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_sequential_runs_reset_each_time() {
        let controller = Controller::new(Counting::default());
        for _ in 0..3 {
            controller.start(&[Some("x")]).unwrap();
        }
        assert_eq!(controller.engine().runs.load(Ordering::SeqCst), 3);
        assert_eq!(controller.engine().resets.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_stop_while_idle() {
        let controller = Controller::new(Counting::default());
        assert!(matches!(controller.stop(), Err(Error::NotRunning)));
        assert_eq!(controller.state(), ControllerState::Idle);
    }

    #[test]
    fn test_force_close_while_idle_is_noop() {
        let controller = Controller::new(Counting::default());
        controller.force_close().unwrap();
        controller.force_close().unwrap();
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(controller.server_status(), HandleStatus::Invalid);
    }

    /// Publishes a listener, then panics before it can close it.
    struct PanicsWhileListening;

    impl Engine for PanicsWhileListening {
        fn run(&self, _argv: &ArgumentVector, link: &EngineLink) -> i32 {
            link.server().install(std::net::TcpListener::bind("127.0.0.1:0").unwrap());
            panic!("engine blew up while listening");
        }
    }

    #[test]
    fn test_engine_panic_releases_socket() {
        let controller = Controller::new(PanicsWhileListening);
        assert!(matches!(
            controller.start(&[Some("x")]),
            Err(Error::EnginePanicked(_))
        ));
        assert_eq!(controller.state(), ControllerState::Idle);
        assert_eq!(controller.server_status(), HandleStatus::Invalid);
    }

    #[test]
    fn test_start_discards_stale_socket() {
        let controller = Controller::new(Counting::default());
        let stale = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        controller.link.server().install(stale);
        controller.start(&[Some("x")]).unwrap();
        assert_eq!(controller.server_status(), HandleStatus::Invalid);
    }

    #[test]
    fn test_engine_panic_is_reported() {
        let controller = Arc::new(Controller::new(Panicking));
        let err = controller.start(&[Some("x")]).unwrap_err();
        match err {
            Error::EnginePanicked(message) => assert_eq!(message, "engine blew up"),
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(controller.state(), ControllerState::Idle);
        // still usable afterwards
        assert!(matches!(
            controller.start(&[Some("x")]),
            Err(Error::EnginePanicked(_))
        ));
    }
}
