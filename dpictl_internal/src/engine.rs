use crate::argv::ArgumentVector;
use crate::handle::ServerHandle;
use crate::pool::PoolSlot;
use std::sync::Arc;

/// A proxy engine that can be supervised by the controller.
///
/// The engine is a black box with a single blocking entry point. The controller never
/// interrupts it; it can only set the break flag on the pool the engine publishes, and
/// shut down or close the socket the engine publishes. A well-behaved engine:
///
/// * publishes its listening socket with [`ServerHandle::install`] and its pool with
///   [`PoolSlot::publish`] as soon as it has them,
/// * polls [`EnginePool::break_requested`](crate::pool::EnginePool::break_requested) and
///   treats an accept error on a half-closed socket as a request to exit,
/// * closes the handle with [`ServerHandle::close`] when its loop exits, which is a no-op
///   if the controller already closed it.
pub trait Engine: Send + Sync + 'static {
    /// Runs the engine until its loop exits, returning its exit code.
    ///
    /// This blocks the calling thread for the entire run.
    fn run(&self, argv: &ArgumentVector, link: &EngineLink) -> i32;

    /// Restores the engine's configuration to its default baseline.
    ///
    /// Called before every run so a run never sees configuration left over by the
    /// previous one.
    fn reset_defaults(&self) {}
}

impl<E: Engine> Engine for Arc<E> {
    fn run(&self, argv: &ArgumentVector, link: &EngineLink) -> i32 {
        (**self).run(argv, link)
    }

    fn reset_defaults(&self) {
        (**self).reset_defaults()
    }
}

/// What a running engine publishes for the controller to see.
#[derive(Debug, Default)]
pub struct EngineLink {
    server: ServerHandle,
    pool: PoolSlot,
}

impl EngineLink {
    pub fn new() -> EngineLink {
        EngineLink::default()
    }

    /// The engine's listening socket.
    pub fn server(&self) -> &ServerHandle {
        &self.server
    }

    /// The engine's pool, through which the break flag is delivered.
    pub fn pool(&self) -> &PoolSlot {
        &self.pool
    }
}
