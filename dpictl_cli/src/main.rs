//! The main entry point for the `dpictl_cli` tool.
//!
//! This binary runs the reference accept-loop engine under a supervisor, so the
//! controller's start, stop and force-close paths can be exercised against a real
//! socket from a shell.
//!
//! # Architecture
//!
//! 1.  **Argument Parsing**: Reads the CLI's own flags and the engine's arguments.
//! 2.  **Launch**: Starts the engine on a supervised worker thread.
//! 3.  **Wait**: Sleeps for `--run-ms`, or until a line arrives on stdin.
//! 4.  **Shutdown**: Stops the engine, force-closing it if it outlives the grace period.

use dpictl::engine::AcceptLoop;
use dpictl::{Controller, HostCode, StopOutcome, Supervisor};
use invocation::{Invocation, RunRequest};
use std::sync::Arc;

mod invocation;

fn main() {
    match invocation::parse(std::env::args().skip(1)) {
        Ok(Invocation::Help) => help(),
        Ok(Invocation::Run(request)) => {
            let code = run(request);
            std::process::exit(code);
        }
        Err(e) => {
            eprintln!("{}", e);
            eprintln!();
            help();
            std::process::exit(2);
        }
    }
}

/// Runs the proxy once and returns the process exit code.
fn run(request: RunRequest) -> i32 {
    let supervisor = Supervisor::new(
        Arc::new(Controller::new(AcceptLoop::new())),
        request.policy,
    );
    if let Err(e) = supervisor.launch(request.args) {
        eprintln!("{}", e);
        return 1;
    }

    match request.run_for {
        Some(duration) => std::thread::sleep(duration),
        None => {
            eprintln!("Press Enter to stop the proxy");
            let mut line = String::new();
            if let Err(e) = std::io::stdin().read_line(&mut line) {
                eprintln!("could not read stdin: {}", e);
            }
        }
    }

    let outcome = supervisor.shutdown();
    let result = match outcome {
        StopOutcome::NotLaunched => Ok(0),
        StopOutcome::Finished(result) => {
            eprintln!("proxy exited on its own");
            result
        }
        StopOutcome::Graceful(result) => {
            eprintln!("proxy stopped");
            result
        }
        StopOutcome::Forced(Some(result)) => {
            eprintln!("proxy was force closed");
            result
        }
        StopOutcome::Forced(None) => {
            eprintln!("proxy did not exit after being force closed");
            return 1;
        }
    };
    if let Err(e) = &result {
        eprintln!("{}", e);
    }
    let code = result.host_code();
    println!("{}", code);
    if code == 0 { 0 } else { 1 }
}

fn help() {
    eprintln!("Runs the reference proxy engine under the dpictl controller");
    eprintln!();
    eprintln!("Usage: dpictl_cli [--run-ms MS] [--grace-ms MS] [--options JSON]");
    eprintln!("       dpictl_cli [--run-ms MS] [--grace-ms MS] -- ENGINE_ARGS...");
    eprintln!();
    eprintln!("  --run-ms MS      stop after MS milliseconds instead of waiting for Enter");
    eprintln!("  --grace-ms MS    wait after a stop before force closing (default 5000)");
    eprintln!("  --options JSON   proxy options, e.g. '{{\"ip\": \"127.0.0.1\", \"port\": 1080}}'");
    eprintln!("  -- ENGINE_ARGS   pass the engine's argv verbatim, starting with argv[0]");
}
