use crate::BACKOFF_DURATION;
use crate::argv::ArgumentVector;
use crate::engine::{Engine, EngineLink};
use crate::handle::HandleStatus;
use crate::pool::EnginePool;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The loop exited because it was asked to.
pub const EXIT_OK: i32 = 0;
/// The arguments did not describe a listen address.
pub const EXIT_USAGE: i32 = 64; /* EX_USAGE */
/// Accepting failed for a reason other than shutdown.
pub const EXIT_IOERR: i32 = 74; /* EX_IOERR */
/// The listener could not be bound.
pub const EXIT_OSERR: i32 = 71; /* EX_OSERR */

const DEFAULT_IP: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);
const DEFAULT_PORT: u16 = 1080;

/// An engine that binds a listener, accepts connections and immediately drops them.
///
/// It understands `-i`/`--ip` and `-p`/`--port`; every other argument is ignored. It
/// exists so the controller can be driven against a real socket, and follows the
/// engine contract exactly: it publishes its handle and pool, polls the break flag
/// between non-blocking accepts, treats an accept error on a half-closed socket as an
/// orderly exit, and closes the handle itself on the way out.
#[derive(Debug, Default)]
pub struct AcceptLoop {
    accepted: AtomicUsize,
}

impl AcceptLoop {
    pub fn new() -> AcceptLoop {
        AcceptLoop::default()
    }

    /// How many connections this engine has accepted since its last reset.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::Relaxed)
    }
}

/// Reads the listen address out of `argv`.
pub fn listen_addr(argv: &ArgumentVector) -> Result<SocketAddr, String> {
    let mut ip = DEFAULT_IP;
    let mut port = DEFAULT_PORT;
    let mut args = argv.iter().flatten();
    while let Some(arg) = args.next() {
        match arg {
            "-i" | "--ip" => {
                let value = args.next().ok_or_else(|| format!("{arg} needs a value"))?;
                ip = value
                    .parse()
                    .map_err(|e| format!("invalid ip {value:?}: {e}"))?;
            }
            "-p" | "--port" => {
                let value = args.next().ok_or_else(|| format!("{arg} needs a value"))?;
                port = value
                    .parse()
                    .map_err(|e| format!("invalid port {value:?}: {e}"))?;
            }
            _ => {}
        }
    }
    Ok(SocketAddr::new(ip, port))
}

impl Engine for AcceptLoop {
    fn run(&self, argv: &ArgumentVector, link: &EngineLink) -> i32 {
        let addr = match listen_addr(argv) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("accept_loop: {}", e);
                return EXIT_USAGE;
            }
        };
        let listener = match TcpListener::bind(addr).and_then(|l| {
            l.set_nonblocking(true)?;
            Ok(l)
        }) {
            Ok(listener) => listener,
            Err(e) => {
                eprintln!("accept_loop: can't listen on {}: {}", addr, e);
                return EXIT_OSERR;
            }
        };
        let pool = Arc::new(EnginePool::new());
        link.server().install(listener);
        link.pool().publish(&pool);
        eprintln!("accept_loop: listening on {:?}", link.server().local_addr());

        let code = loop {
            if pool.break_requested() {
                break EXIT_OK;
            }
            match link.server().with_listener(|l| l.accept()) {
                // closed out from under us
                None => break EXIT_OK,
                Some(Ok((stream, _peer))) => {
                    self.accepted.fetch_add(1, Ordering::Relaxed);
                    drop(stream);
                }
                Some(Err(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(BACKOFF_DURATION);
                }
                Some(Err(e)) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Some(Err(e)) => {
                    if link.server().status() == HandleStatus::HalfClosed {
                        break EXIT_OK;
                    }
                    eprintln!("accept_loop: accept failed: {}", e);
                    break EXIT_IOERR;
                }
            }
        };

        link.pool().withdraw();
        if !link.server().close() {
            eprintln!("accept_loop: server handle was already closed");
        }
        code
    }

    fn reset_defaults(&self) {
        self.accepted.store(0, Ordering::Relaxed);
    }
}
