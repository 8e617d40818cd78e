use crate::options::OptionsError;
use dpictl_internal::argv::MarshalError;

/// Errors reported across the host boundary.
///
/// No operation panics or aborts on failure; each returns one of these, and the
/// controller is left Idle or unchanged. [`Error::code`] gives the stable integer a
/// host that only understands status codes should see.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The argument list was empty, or an argument cannot be passed to the engine.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[source] MarshalError),
    /// A run is already in progress.
    #[error("proxy already running")]
    AlreadyRunning,
    /// There is no run to stop.
    #[error("proxy is not running")]
    NotRunning,
    /// The argument vector could not be allocated.
    #[error("allocation error: {0}")]
    AllocationFailure(#[source] MarshalError),
    /// The server handle was invalid where a valid one was expected.
    #[error("invalid server handle")]
    InvalidHandle,
    /// The engine's entry point panicked instead of returning an exit code.
    #[error("engine panicked: {0}")]
    EnginePanicked(String),
    /// The proxy options did not validate.
    #[error("invalid options: {0}")]
    InvalidOptions(#[from] OptionsError),
    /// The run thread could not be spawned.
    #[error("failed to spawn run thread: {0}")]
    Spawn(#[from] std::io::Error),
}

impl From<MarshalError> for Error {
    fn from(e: MarshalError) -> Self {
        match e {
            MarshalError::Empty | MarshalError::InteriorNul { .. } => Error::InvalidArgument(e),
            MarshalError::Vector(_) | MarshalError::Duplicate { .. } => {
                Error::AllocationFailure(e)
            }
        }
    }
}

impl Error {
    /// The status code reported to the host for this error.
    ///
    /// Codes are negated errno values, so they never collide with a successful `0`.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) | Error::InvalidOptions(_) => -22, /* EINVAL */
            Error::AlreadyRunning => -16,                                /* EBUSY */
            Error::NotRunning => -3,                                     /* ESRCH */
            Error::AllocationFailure(_) => -12,                          /* ENOMEM */
            Error::InvalidHandle => -9,                                  /* EBADF */
            Error::EnginePanicked(_) => -5,                              /* EIO */
            Error::Spawn(_) => -11,                                      /* EAGAIN */
        }
    }
}

/// Collapses an operation's result into the single integer a host boundary returns.
///
/// `start` reports the engine's exit code, `stop` and `force_close` report `0`, and
/// every error reports [`Error::code`].
pub trait HostCode {
    fn host_code(self) -> i32;
}

impl HostCode for Result<i32, Error> {
    fn host_code(self) -> i32 {
        match self {
            Ok(code) => code,
            Err(e) => e.code(),
        }
    }
}

impl HostCode for Result<(), Error> {
    fn host_code(self) -> i32 {
        match self {
            Ok(()) => 0,
            Err(e) => e.code(),
        }
    }
}
