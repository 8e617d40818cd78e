//! Engine boundary for the dpictl lifecycle controller.
//!
//! This crate provides the types an engine and the controller share: the argument vector
//! handed to the engine's entry point, the [`Engine`](engine::Engine) trait itself, and the
//! [`EngineLink`](engine::EngineLink) through which a running engine publishes its listening
//! socket and its break flag.
//! It is not intended for direct use by hosts; they should depend on the `dpictl` crate instead.
//! Engine authors depend on this crate alone.

use std::time::Duration;

/// A reference engine that listens and accepts, and nothing else.
pub mod accept_loop;
/// The argument vector handed to an engine's entry point.
pub mod argv;
/// The engine trait and the link it publishes into.
pub mod engine;
/// The listening socket an engine publishes.
pub mod handle;
/// The engine's runtime pool and its break flag.
pub mod pool;

/// The default backoff duration for polling loops.
pub const BACKOFF_DURATION: Duration = Duration::from_millis(10);
