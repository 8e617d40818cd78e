//! Parses the CLI's own flags, leaving the engine's arguments alone.

use dpictl::{ProxyOptions, ShutdownPolicy};
use std::time::Duration;

/// What the user asked for.
#[derive(Debug, PartialEq)]
pub enum Invocation {
    Help,
    Run(RunRequest),
}

/// How to run the proxy and when to stop it.
#[derive(Debug, PartialEq)]
pub struct RunRequest {
    /// The argument vector handed to the engine.
    pub args: Vec<Option<String>>,
    /// Stop after this long; `None` waits for a line on stdin.
    pub run_for: Option<Duration>,
    pub policy: ShutdownPolicy,
}

fn millis(flag: &str, value: Option<String>) -> Result<Duration, String> {
    let value = value.ok_or_else(|| format!("{flag} needs a value"))?;
    value
        .parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| format!("invalid value for {flag}: {value:?}: {e}"))
}

/// Parses everything after the executable name.
///
/// `--options JSON` builds the engine arguments from [`ProxyOptions`]; anything after
/// `--` is passed to the engine verbatim instead. With neither, the default options
/// are used.
pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Invocation, String> {
    let mut args = args.into_iter();
    let mut run_for = None;
    let mut policy = ShutdownPolicy::default();
    let mut options: Option<ProxyOptions> = None;
    let mut engine_args: Option<Vec<Option<String>>> = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-h" | "--help" | "help" => return Ok(Invocation::Help),
            "--run-ms" => run_for = Some(millis("--run-ms", args.next())?),
            "--grace-ms" => policy.grace = millis("--grace-ms", args.next())?,
            "--options" => {
                let json = args.next().ok_or("--options needs a value")?;
                let parsed = serde_json::from_str(&json)
                    .map_err(|e| format!("invalid --options: {e}"))?;
                options = Some(parsed);
            }
            "--" => {
                engine_args = Some(args.by_ref().map(Some).collect());
            }
            other => return Err(format!("unknown argument {other:?}")),
        }
    }

    let args = match (engine_args, options) {
        (Some(_), Some(_)) => return Err("use either --options or --, not both".to_string()),
        (Some(args), None) => args,
        (None, options) => options
            .unwrap_or_default()
            .to_args()
            .map_err(|e| e.to_string())?,
    };
    Ok(Invocation::Run(RunRequest {
        args,
        run_for,
        policy,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_strs(args: &[&str]) -> Result<Invocation, String> {
        parse(args.iter().map(|s| s.to_string()))
    }

    fn run(args: &[&str]) -> RunRequest {
        match parse_strs(args).unwrap() {
            Invocation::Run(request) => request,
            Invocation::Help => panic!("expected a run"),
        }
    }

    #[test]
    fn test_defaults() {
        let request = run(&[]);
        assert_eq!(request.args[0].as_deref(), Some("ciadpi"));
        assert_eq!(request.args[4].as_deref(), Some("1080"));
        assert_eq!(request.run_for, None);
        assert_eq!(request.policy, ShutdownPolicy::default());
    }

    #[test]
    fn test_engine_args_pass_through() {
        let request = run(&["--run-ms", "500", "--", "ciadpi", "--run-ms", "-p", "0"]);
        assert_eq!(request.run_for, Some(Duration::from_millis(500)));
        let args: Vec<_> = request.args.iter().map(|a| a.as_deref().unwrap()).collect();
        assert_eq!(args, ["ciadpi", "--run-ms", "-p", "0"]);
    }

    #[test]
    fn test_options_json() {
        let request = run(&["--grace-ms", "100", "--options", r#"{"port": 2080}"#]);
        assert_eq!(request.policy.grace, Duration::from_millis(100));
        assert_eq!(request.args[4].as_deref(), Some("2080"));
    }

    #[test]
    fn test_errors() {
        assert!(parse_strs(&["--run-ms"]).is_err());
        assert!(parse_strs(&["--grace-ms", "soon"]).is_err());
        assert!(parse_strs(&["--options", r#"{"ip": "example.com"}"#]).is_err());
        assert!(parse_strs(&["--options", "{}", "--", "ciadpi"]).is_err());
        assert!(parse_strs(&["--verbose"]).is_err());
    }

    #[test]
    fn test_help() {
        assert_eq!(parse_strs(&["--help"]), Ok(Invocation::Help));
        assert_eq!(parse_strs(&["--run-ms", "5", "help"]), Ok(Invocation::Help));
    }
}
