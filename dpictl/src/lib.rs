//! dpictl controls the lifecycle of an embedded DPI-evasion proxy engine.
//!
//! The engine is a blocking, single-instance SOCKS proxy loop that lives inside the host
//! process. The host needs to start it on a worker thread, stop it from another thread,
//! and reclaim its listening socket when it refuses to stop. dpictl is the thin layer that
//! makes those three calls safe to race against each other.
//!
//! # Overview
//!
//! A [`Controller`] owns one [`Engine`](engine::Engine). It offers three operations:
//!
//! * [`start`](Controller::start) marshals the arguments, runs the engine and blocks until
//!   it returns. Only one run can be in progress at a time.
//! * [`stop`](Controller::stop) asks the engine to exit by setting its break flag and
//!   half-closing its socket, then returns without waiting.
//! * [`force_close`](Controller::force_close) signals the engine and releases its socket
//!   immediately. Calling it twice is harmless.
//!
//! Every failure is an [`Error`], and [`HostCode`] turns any result into the single
//! integer a foreign host expects.
//!
//! ```no_run
//! use dpictl::Controller;
//! use dpictl::engine::AcceptLoop;
//! use std::sync::Arc;
//!
//! let controller = Arc::new(Controller::new(AcceptLoop::new()));
//! let runner = controller.clone();
//! let args = [Some("ciadpi"), Some("--port"), Some("1080")];
//! let worker = std::thread::spawn(move || runner.start(&args));
//!
//! // ... once the proxy is serving
//! controller.stop().unwrap();
//! assert_eq!(worker.join().unwrap().unwrap(), 0);
//! ```
//!
//! # Supervising a run
//!
//! Hosts that want a deadline on shutdown can use a [`Supervisor`], which runs the
//! controller on its own thread and escalates from `stop` to `force_close` when the engine
//! overstays its [`ShutdownPolicy`].
//!
//! # Architecture
//!
//! ## Why threads?
//!
//! The engine is a blocking loop, so there is nothing to gain from an async runtime. The
//! controller uses plain threads and short locks, and never waits on the engine while
//! holding one.
//!
//! ## Engines
//!
//! The engine side of the boundary lives in `dpictl_internal` and is re-exported from
//! [`engine`]. It includes [`AcceptLoop`](engine::AcceptLoop), a minimal engine that binds
//! the address from its arguments and accepts until it is told to stop.
//!
//! # Feature Flags
//!
//! - `logwise` - Routes controller logging through the `logwise` framework instead of stderr.

mod logging;

pub mod controller;
pub mod error;
pub mod options;
mod shutdown;
pub mod supervisor;

pub use controller::{Controller, ControllerState};
pub use error::{Error, HostCode};
pub use options::{OptionsError, ProxyOptions};
pub use supervisor::{ServiceStatus, ShutdownPolicy, StopOutcome, Supervisor};

/// Re-exports of the types needed to implement or host an engine.
pub mod engine {
    pub use dpictl_internal::BACKOFF_DURATION;
    pub use dpictl_internal::accept_loop::AcceptLoop;
    pub use dpictl_internal::argv::{ArgumentVector, MarshalError};
    pub use dpictl_internal::engine::{Engine, EngineLink};
    pub use dpictl_internal::handle::{HandleStatus, ServerHandle};
    pub use dpictl_internal::pool::{EnginePool, PoolSlot};
}
