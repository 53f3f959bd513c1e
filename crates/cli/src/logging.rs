//! Logging setup for `srvdial`.
//!
//! Stdout carries the handed-off descriptor, so it is never written to.
//! Everything goes to stderr, which `ssh(1)` passes through to the terminal.
//! With `--log-file`, events are also written to a daily rolling file under
//! the user state directory (`~/.local/state/srvdial/srvdial.log` on Linux).

use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// The directory under the state directory where logs are stored.
const LOG_DIR_NAME: &str = "srvdial";

/// The base filename for the rolling log file.
const LOG_FILE_NAME: &str = "srvdial.log";

/// Resolver internals log every query at debug; keep them quiet.
const QUIET_DIRECTIVES: &[&str] = &["hickory_proto=warn", "hickory_resolver=warn"];

/// Install the tracing subscriber.
///
/// Returns the file writer's [`WorkerGuard`] when `log_file` is set. It must
/// be held until exit; dropping it flushes and closes the file.
pub fn init_logging(verbose: bool, log_file: bool) -> Option<WorkerGuard> {
    let directives = filter_directives(std::env::var("RUST_LOG").ok().as_deref(), verbose);
    let filter = EnvFilter::try_new(&directives).unwrap_or_else(|e| {
        eprintln!("warning: ignoring invalid RUST_LOG ({e})");
        EnvFilter::new(filter_directives(None, verbose))
    });

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .compact();

    let (file_layer, guard) = if log_file {
        let log_dir = log_directory();
        if let Err(e) = std::fs::create_dir_all(&log_dir) {
            eprintln!(
                "warning: could not create log directory {}: {e}",
                log_dir.display()
            );
        }

        let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_NAME);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
        let layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();

    guard
}

/// Build the filter string: `RUST_LOG` when set, otherwise `info` (or
/// `debug` with `-v`), with resolver chatter capped unless `RUST_LOG` names
/// it explicitly.
fn filter_directives(rust_log: Option<&str>, verbose: bool) -> String {
    let base = match rust_log.map(str::trim) {
        Some(env) if !env.is_empty() => env.to_string(),
        _ if verbose => "debug".to_string(),
        _ => "info".to_string(),
    };

    let mut directives = vec![base];
    for quiet in QUIET_DIRECTIVES {
        let (module, _) = quiet.split_once('=').unwrap_or((quiet, ""));
        if !directives[0].contains(module) {
            directives.push((*quiet).to_string());
        }
    }
    directives.join(",")
}

/// Resolve the log directory path.
///
/// `dirs::state_dir()` is `None` on macOS and Windows; fall back to
/// `~/.local/state/srvdial/` there.
fn log_directory() -> PathBuf {
    if let Some(state) = dirs::state_dir() {
        return state.join(LOG_DIR_NAME);
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".local").join("state").join(LOG_DIR_NAME);
    }
    PathBuf::from(".")
}
