use socket2::SockRef;
use std::net::{Shutdown, SocketAddr, TcpListener};
use wasm_safe_mutex::Mutex;

/// What can currently be said about a [`ServerHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleStatus {
    /// No socket is published, or it has been closed.
    Invalid,
    /// A socket is published and accepting.
    Open,
    /// A socket is published but reads and writes on it have been shut down.
    HalfClosed,
}

#[derive(Debug)]
struct Slot {
    listener: Option<TcpListener>,
    half_closed: bool,
}

/// The listening socket a running engine publishes.
///
/// The handle owns the socket. Closing it takes the socket out of the handle and drops
/// it, so whoever closes second finds nothing to close; both the controller's forced
/// close and the engine's own close on loop exit are safe in either order.
#[derive(Debug)]
pub struct ServerHandle {
    slot: Mutex<Slot>,
}

impl Default for ServerHandle {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_handle() -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::NotConnected, "server handle is invalid")
}

impl ServerHandle {
    /// Creates an invalid handle.
    pub fn new() -> ServerHandle {
        ServerHandle {
            slot: Mutex::new(Slot {
                listener: None,
                half_closed: false,
            }),
        }
    }

    /// Publishes `listener`. A listener published earlier is closed.
    pub fn install(&self, listener: TcpListener) {
        self.slot.with_mut_sync(|slot| {
            slot.listener = Some(listener);
            slot.half_closed = false;
        });
    }

    pub fn status(&self) -> HandleStatus {
        self.slot.with_sync(|slot| match (&slot.listener, slot.half_closed) {
            (None, _) => HandleStatus::Invalid,
            (Some(_), false) => HandleStatus::Open,
            (Some(_), true) => HandleStatus::HalfClosed,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.status() != HandleStatus::Invalid
    }

    /// The address the published socket is bound to.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.slot
            .with_sync(|slot| slot.listener.as_ref().and_then(|l| l.local_addr().ok()))
    }

    /// Shuts down reads and writes on the socket without releasing it.
    ///
    /// A blocked or polling accept on the socket observes an error afterwards. The
    /// descriptor stays owned by the handle until [`close`](Self::close).
    ///
    /// # Errors
    /// `NotConnected` when the handle is invalid, or whatever `shutdown(2)` reports.
    pub fn half_close(&self) -> std::io::Result<()> {
        self.slot.with_mut_sync(|slot| -> std::io::Result<()> {
            let listener = slot.listener.as_ref().ok_or_else(invalid_handle)?;
            SockRef::from(listener).shutdown(Shutdown::Both)?;
            slot.half_closed = true;
            Ok(())
        })
    }

    /// Releases the socket and invalidates the handle.
    ///
    /// Returns whether there was a socket to release. Calling this on an invalid
    /// handle does nothing.
    pub fn close(&self) -> bool {
        self.slot.with_mut_sync(|slot| {
            slot.half_closed = false;
            slot.listener.take().is_some()
        })
    }

    /// Runs `f` against the published socket, or returns `None` if the handle is invalid.
    ///
    /// The handle's lock is held while `f` runs, so `f` must not block. Engines use this
    /// for non-blocking accepts.
    pub fn with_listener<R>(&self, f: impl FnOnce(&TcpListener) -> R) -> Option<R> {
        self.slot.with_sync(|slot| slot.listener.as_ref().map(f))
    }
}
