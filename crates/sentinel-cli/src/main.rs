//! sentinel-cli: run commands against the current master of a
//! sentinel-managed group.
//!
//! Asks sentinel where the master for `--master` lives, runs one command
//! on it and prints the reply. With `--watch` it keeps polling, borrowing
//! and returning a pooled connection each time, so failovers show up as
//! the address changing between lines.

mod format;

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use colored::Colorize;
use sentinel_client::{Client, ClientConfig, ClientError, Frame, Network, DEFAULT_POOL_SIZE};

/// Command-line client for sentinel-managed masters.
#[derive(Parser)]
#[command(name = "sentinel-cli", version, about)]
struct Args {
    /// Sentinel hostname.
    #[arg(short = 'H', long, env = "SENTINEL_HOST", default_value = "127.0.0.1")]
    host: String,

    /// Sentinel port.
    #[arg(short, long, env = "SENTINEL_PORT", default_value_t = 26379)]
    port: u16,

    /// Reach sentinel through a unix socket at this path instead of TCP.
    #[arg(short = 's', long, env = "SENTINEL_SOCKET")]
    socket: Option<String>,

    /// Name of the master group to talk to.
    #[arg(short, long, env = "SENTINEL_MASTER")]
    master: String,

    /// Idle connections kept per master.
    #[arg(long, env = "SENTINEL_POOL_SIZE", default_value_t = DEFAULT_POOL_SIZE)]
    pool_size: usize,

    /// Seconds to wait when dialing sentinel or a master.
    #[arg(long, env = "SENTINEL_DIAL_TIMEOUT", default_value_t = 5)]
    dial_timeout: u64,

    /// Keep running the command until interrupted.
    #[arg(short, long)]
    watch: bool,

    /// Milliseconds between polls in watch mode.
    #[arg(long, default_value_t = 1000)]
    interval_ms: u64,

    /// Command to run on the master. Defaults to PING.
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

impl Args {
    fn config(&self) -> ClientConfig {
        let (network, addr) = match &self.socket {
            Some(path) => (Network::Unix, path.clone()),
            None => (Network::Tcp, format!("{}:{}", self.host, self.port)),
        };
        ClientConfig::new(addr)
            .network(network)
            .pool_size(self.pool_size)
            .dial_timeout(Duration::from_secs(self.dial_timeout))
            .name(self.master.clone())
    }

    fn command(&self) -> Vec<String> {
        if self.command.is_empty() {
            vec!["PING".to_string()]
        } else {
            self.command.clone()
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sentinel_client=warn".into()),
        )
        .init();

    let args = Args::parse();

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("{}", format!("failed to create runtime: {e}").red());
            return ExitCode::FAILURE;
        }
    };

    rt.block_on(async {
        let config = args.config();
        let sentinel = config.sentinel_addr.clone();
        let client = match Client::connect(config).await {
            Ok(client) => client,
            Err(e) => {
                eprintln!("{}", format!("could not connect via sentinel {sentinel}: {e}").red());
                return ExitCode::FAILURE;
            }
        };

        let command = args.command();
        let code = if args.watch {
            watch(&client, &args.master, &command, Duration::from_millis(args.interval_ms)).await
        } else {
            match run_once(&client, &args.master, &command, false).await {
                Ok(reply) if failed(&reply) => ExitCode::FAILURE,
                Ok(_) => ExitCode::SUCCESS,
                Err(e) => {
                    eprintln!("{}", format!("error: {e}").red());
                    ExitCode::FAILURE
                }
            }
        };

        client.close().await;
        code
    })
}

/// Borrows a master connection, runs `command` and prints the reply.
///
/// The connection goes back to the pool unless the transport failed; an
/// error reply leaves the connection usable.
async fn run_once(
    client: &Client,
    master: &str,
    command: &[String],
    with_addr: bool,
) -> Result<Frame, ClientError> {
    let mut conn = client.get_master(master).await?;
    match conn.execute(command).await {
        Ok(reply) => {
            if with_addr {
                println!("{}", format::format_poll(master, conn.addr(), &reply));
            } else {
                println!("{}", format::format_response(&reply));
            }
            client.put_master(master, conn).await;
            Ok(reply)
        }
        Err(e) => {
            conn.close().await;
            Err(e.into())
        }
    }
}

/// An error reply is a failed run, like redis-cli.
fn failed(reply: &Frame) -> bool {
    reply.is_error()
}

/// Polls until ctrl-c. Operational errors are printed and the next poll
/// tries again; a sentinel error ends the loop since the client can no
/// longer follow failovers.
async fn watch(client: &Client, master: &str, command: &[String], every: Duration) -> ExitCode {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => return ExitCode::SUCCESS,
            _ = ticker.tick() => {}
        }
        match run_once(client, master, command, true).await {
            Ok(_) => {}
            Err(e) if e.is_sentinel_err() => {
                eprintln!("{}", format!("sentinel lost: {e}").red());
                return ExitCode::FAILURE;
            }
            Err(e) => eprintln!("{}", format!("{master}: {e}").yellow()),
        }
    }
}
