//! Two-tier teardown of a running engine.
//!
//! | Mode | Break flag | Socket | Who closes the handle |
//! |---|---|---|---|
//! | [`Graceful`](ShutdownMode::Graceful) | set if a pool is published | half-close | the engine, when its loop exits |
//! | [`Forced`](ShutdownMode::Forced) | set if a pool is published | half-close, then close | the controller, immediately |
//!
//! A half-close alone wakes the engine's accept and lets in-flight work drain while the
//! engine still owns the descriptor, so nothing can reuse it mid-teardown. The full
//! close is for callers that need the socket back now regardless of engine state.
//!
//! Callers hold the controller's run-state lock; the pool and handle locks taken here
//! are always acquired after it.

use crate::logging::{log, warn};
use dpictl_internal::engine::EngineLink;

/// Which teardown to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Signal and half-close; the engine finishes the job.
    Graceful,
    /// Signal, half-close and close right away.
    Forced,
}

/// What a teardown actually managed to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Teardown {
    /// A published pool had its break flag set.
    pub break_signaled: bool,
    /// The socket was shut down for reads and writes.
    pub half_closed: bool,
    /// The socket was released by this teardown.
    pub closed: bool,
}

impl Teardown {
    /// Whether anything at all was delivered to the engine.
    pub fn reached_engine(&self) -> bool {
        self.break_signaled || self.half_closed || self.closed
    }
}

/// Sets the break flag on the engine's pool, if it has published one.
///
/// An absent pool is normal: the engine may not have published it yet, in which case the
/// socket is the only coercion left.
pub(crate) fn signal_break(link: &EngineLink) -> bool {
    let signaled = link.pool().signal_break();
    if signaled {
        log("set pool break flag to stop event loop");
    } else {
        log("engine pool is not published, cannot set break flag");
    }
    signaled
}

pub(crate) fn tear_down(link: &EngineLink, mode: ShutdownMode) -> Teardown {
    let break_signaled = signal_break(link);
    let addr = link.server().local_addr();
    let half_closed = match link.server().half_close() {
        Ok(()) => {
            log(&format!("server socket shutdown ({:?})", addr));
            true
        }
        Err(e) => {
            warn(&format!("shutdown failed: {} ({:?})", e, e.kind()));
            false
        }
    };
    let closed = match mode {
        ShutdownMode::Graceful => false,
        ShutdownMode::Forced => {
            let closed = link.server().close();
            if closed {
                log(&format!("server socket force closed ({:?})", addr));
            } else {
                warn("server socket was closed before the forced close got to it");
            }
            closed
        }
    };
    Teardown {
        break_signaled,
        half_closed,
        closed,
    }
}
