mod logging;

use std::io;
use std::os::fd::AsRawFd;
use std::process::ExitCode;
use std::time::Duration;

use clap::{CommandFactory, Parser, ValueEnum};
use dial::{DialConfig, DialError, Dialer, SrvOrder, DEFAULT_PORT, DEFAULT_PROTO, DEFAULT_SERVICE};
use race::RaceConfig;
use tokio::net::TcpStream;
use tracing::{error, info};

const AFTER_LONG_HELP: &str = "\
srvdial looks up the SRV records of HOSTNAME (_ssh._tcp.HOSTNAME by default),
races connections to the targets in priority/weight order and hands the first
one that answers with an SSH banner to ssh(1) over standard output.

If the SRV lookup fails it connects to HOSTNAME:PORT directly instead.

Examples:

  ssh -o ProxyUseFdPass=yes -o ProxyCommand='srvdial %h %p' user@example.com

or in ~/.ssh/config:

  Host *.example.com
      ProxyUseFdPass yes
      ProxyCommand srvdial %h %p";

// ---------------------------------------------------------------------------
// CLI arguments
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "srvdial",
    version,
    about = "Connect to an SSH server through its DNS SRV records",
    after_long_help = AFTER_LONG_HELP
)]
struct Args {
    /// Domain to look up SRV records for; also the fallback host.
    #[arg(value_name = "HOSTNAME")]
    host: String,

    /// Port for the direct connection when the SRV lookup fails.
    #[arg(value_name = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// SRV service label.
    #[arg(long, default_value = DEFAULT_SERVICE)]
    service: String,

    /// SRV protocol label.
    #[arg(long, default_value = DEFAULT_PROTO)]
    proto: String,

    /// Delay before starting the next connection attempt.
    #[arg(long, default_value_t = 300)]
    stagger_ms: u64,

    /// Overall time limit for connecting.
    #[arg(long, default_value_t = 60)]
    timeout_secs: u64,

    /// How to order SRV targets that share a priority.
    #[arg(long, value_enum, default_value_t = OrderArg::Weighted)]
    order: OrderArg,

    /// Accept SRV targets without checking for an SSH banner.
    #[arg(long)]
    no_sniff: bool,

    /// Skip the SRV lookup and connect to HOSTNAME:PORT directly.
    #[arg(long)]
    no_srv: bool,

    /// Also write logs to a daily file under the user state directory.
    #[arg(long)]
    log_file: bool,

    /// Log at debug level (ignored when RUST_LOG is set).
    #[arg(short, long)]
    verbose: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum OrderArg {
    /// RFC 2782 weighted random order.
    Weighted,
    /// Resolver order.
    Listed,
}

impl From<OrderArg> for SrvOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Weighted => SrvOrder::Weighted,
            OrderArg::Listed => SrvOrder::Listed,
        }
    }
}

impl Args {
    fn dial_config(&self) -> DialConfig {
        DialConfig {
            service: self.service.clone(),
            proto: self.proto.clone(),
            race: RaceConfig::new(
                Duration::from_millis(self.stagger_ms),
                Duration::from_secs(self.timeout_secs),
            ),
            order: self.order.into(),
            sniff: !self.no_sniff,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Dial(#[from] DialError),

    #[error("could not detach socket from the runtime: {0}")]
    Detach(#[source] io::Error),

    #[error(transparent)]
    Handoff(#[from] common::Error),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

/// Parse arguments, printing usage to stderr on any failure.
///
/// Stdout is reserved for the descriptor, so even `--help` goes to stderr.
fn parse_args() -> Option<Args> {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            eprint!("{}", err.render());
            return None;
        }
    };

    if args.host.starts_with('-') {
        eprintln!("error: HOSTNAME must not start with '-': {}", args.host);
        eprintln!();
        eprint!("{}", Args::command().render_usage());
        eprintln!();
        return None;
    }
    Some(args)
}

#[tokio::main]
async fn main() -> ExitCode {
    let Some(args) = parse_args() else {
        return ExitCode::FAILURE;
    };

    let _log_guard = logging::init_logging(args.verbose, args.log_file);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(%e, "srvdial failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<(), CliError> {
    let dialer = Dialer::new(args.dial_config());

    let stream = if args.no_srv {
        dialer.dial_direct(&args.host, args.port).await?
    } else {
        dialer.dial(&args.host, args.port).await?
    };

    hand_to_stdout(stream)
}

/// Give the connected socket to the process on the other end of stdout.
fn hand_to_stdout(stream: TcpStream) -> Result<(), CliError> {
    let peer = stream
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_default();
    info!(%peer, "handing over connection");

    let stream = stream.into_std().map_err(CliError::Detach)?;
    let stdout = io::stdout();
    common::hand_off(stream, stdout.as_raw_fd())?;

    info!(%peer, "socket handed to stdout");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("srvdial").chain(argv.iter().copied()))
    }

    #[test]
    fn defaults_follow_dial_defaults() {
        let args = parse(&["example.com"]).unwrap();
        assert_eq!(args.host, "example.com");
        assert_eq!(args.port, 22);

        let config = args.dial_config();
        assert_eq!(config.service, "ssh");
        assert_eq!(config.proto, "tcp");
        assert_eq!(config.order, SrvOrder::Weighted);
        assert_eq!(config.race, RaceConfig::default());
        assert!(config.sniff);
    }

    #[test]
    fn flags_reach_dial_config() {
        let args = parse(&[
            "--service",
            "sftp",
            "--proto",
            "udp",
            "--stagger-ms",
            "50",
            "--timeout-secs",
            "5",
            "--order",
            "listed",
            "--no-sniff",
            "example.com",
            "2222",
        ])
        .unwrap();
        assert_eq!(args.port, 2222);

        let config = args.dial_config();
        assert_eq!(config.service, "sftp");
        assert_eq!(config.proto, "udp");
        assert_eq!(
            config.race,
            RaceConfig::new(Duration::from_millis(50), Duration::from_secs(5))
        );
        assert_eq!(config.order, SrvOrder::Listed);
        assert!(!config.sniff);
    }

    #[test]
    fn hostname_is_required() {
        assert!(parse(&[]).is_err());
    }

    #[test]
    fn port_must_be_numeric() {
        assert!(parse(&["example.com", "ssh"]).is_err());
        assert!(parse(&["example.com", "70000"]).is_err());
    }

    #[test]
    fn long_help_has_proxy_example() {
        let help = Args::command().render_long_help().to_string();
        assert!(help.contains("ProxyUseFdPass=yes"), "{help}");
        assert!(help.contains("srvdial %h %p"), "{help}");
    }

    #[test]
    fn command_definition_is_valid() {
        Args::command().debug_assert();
    }
}
