//! Proxy options a host hands to the supervisor.
//!
//! These are validated before anything is started, so a bad address never costs a run.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Why a set of [`ProxyOptions`] was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OptionsError {
    #[error("Invalid proxy IP address: {0}")]
    InvalidIp(String),
    #[error("Invalid proxy port: {0} (must be 1-65535)")]
    InvalidPort(u16),
}

/// Where the proxy listens, and whatever else the engine should be told.
///
/// Missing fields take their defaults when deserialized, so a host can persist only
/// what the user changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyOptions {
    /// Passed to the engine as `argv[0]`.
    pub program: String,
    /// Numeric listen address; host names are rejected.
    pub ip: String,
    pub port: u16,
    /// Further engine flags, passed through after the listen address untouched.
    pub extra_args: Vec<String>,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        ProxyOptions {
            program: "ciadpi".to_string(),
            ip: "127.0.0.1".to_string(),
            port: 1080,
            extra_args: Vec::new(),
        }
    }
}

impl ProxyOptions {
    /// Checks that `ip` is a numeric address and `port` is not zero.
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.ip.parse::<IpAddr>().is_err() {
            return Err(OptionsError::InvalidIp(self.ip.clone()));
        }
        if self.port == 0 {
            return Err(OptionsError::InvalidPort(self.port));
        }
        Ok(())
    }

    /// Renders the options as the argument list for
    /// [`Controller::start`](crate::Controller::start).
    ///
    /// ```
    /// use dpictl::options::ProxyOptions;
    ///
    /// let options = ProxyOptions {
    ///     port: 2080,
    ///     extra_args: vec!["--split".into(), "1+s".into()],
    ///     ..Default::default()
    /// };
    /// let args = options.to_args().unwrap();
    /// assert_eq!(args[3].as_deref(), Some("--port"));
    /// assert_eq!(args[4].as_deref(), Some("2080"));
    /// assert_eq!(args.len(), 7);
    /// ```
    pub fn to_args(&self) -> Result<Vec<Option<String>>, OptionsError> {
        self.validate()?;
        let mut args = vec![
            Some(self.program.clone()),
            Some("--ip".to_string()),
            Some(self.ip.clone()),
            Some("--port".to_string()),
            Some(self.port.to_string()),
        ];
        args.extend(self.extra_args.iter().cloned().map(Some));
        Ok(args)
    }
}
