#![cfg_attr(
    not(test),
    warn(clippy::print_stdout, clippy::dbg_macro),
    deny(clippy::unwrap_used, clippy::expect_used)
)]

use std::{path::PathBuf, sync::Arc, time::Duration};

use rama::{
    error::{BoxError, OpaqueError},
    graceful,
    telemetry::tracing,
};

use clap::{Parser, Subcommand};
use parking_lot::Mutex;

pub mod cmd;
pub mod config;
pub mod driver;
pub mod utils;

#[cfg(target_family = "unix")]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

#[cfg(target_os = "windows")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// CLI arguments for configuring loadcycle behavior.
#[derive(Debug, Clone, Parser)]
#[command(name = "loadcycle")]
#[command(bin_name = "loadcycle")]
#[command(version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    cmds: CliCommands,

    /// debug logging as default instead of Info; use RUST_LOG env for more options
    #[arg(long, short = 'v', default_value_t = false, global = true)]
    pub verbose: bool,

    /// enable pretty logging (format for humans)
    #[arg(long, default_value_t = false, global = true)]
    pub pretty: bool,

    /// write the tracing output to the provided (log) file instead of stderr
    #[arg(long, short = 'o', global = true)]
    pub output: Option<PathBuf>,

    #[arg(long, value_name = "SECONDS", default_value_t = 1., global = true)]
    /// the graceful shutdown timeout (<= 0.0 = no timeout)
    pub graceful: f64,
}

#[derive(Debug, Clone, Subcommand)]
enum CliCommands {
    Run(self::cmd::run::RunCommand),
    Mock(self::cmd::mock::MockCommand),
}

/// A subcommand with its arguments validated.
enum Task {
    Run(config::DriverConfig),
    Mock(rama::net::socket::Interface, config::MockBehavior),
}

impl TryFrom<CliCommands> for Task {
    type Error = OpaqueError;

    fn try_from(cmds: CliCommands) -> Result<Self, Self::Error> {
        Ok(match cmds {
            CliCommands::Run(run_args) => Task::Run(run_args.try_into_driver_config()?),
            CliCommands::Mock(mock_args) => {
                let (bind, behavior) = mock_args.try_into_parts()?;
                Task::Mock(bind, behavior)
            }
        })
    }
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let args = Args::parse();

    utils::telemetry::init_tracing(utils::telemetry::TelemetryConfig {
        verbose: args.verbose,
        pretty: args.pretty,
        output: args.output.as_deref(),
    })?;

    let base_shutdown_signal = graceful::default_signal();
    if let Err(err) = run_with_args(base_shutdown_signal, args).await {
        eprintln!("🚩 exit with error: {err}");
        std::process::exit(1);
    }

    Ok(())
}

/// Run a loadcycle cmd with the given args,
/// until it is finished, failed or a shutdown is initiated.
///
/// Invalid arguments are reported before anything is started.
async fn run_with_args<F>(base_shutdown_signal: F, args: Args) -> Result<(), BoxError>
where
    F: Future<Output: Send + 'static> + Send + 'static,
{
    let task = Task::try_from(args.cmds)?;

    let graceful_timeout = (args.graceful > 0.).then(|| Duration::from_secs_f64(args.graceful));

    let fatal_error: Arc<Mutex<Option<OpaqueError>>> = Default::default();
    let (done_tx, done_rx) = tokio::sync::oneshot::channel::<()>();
    let graceful = graceful::Shutdown::new(new_shutdown_signal(done_rx, base_shutdown_signal));

    graceful.spawn_task_fn({
        let fatal_error = fatal_error.clone();
        async move |guard| {
            let result = match task {
                Task::Run(cfg) => self::cmd::run::exec(guard, cfg).await,
                Task::Mock(bind, behavior) => self::cmd::mock::exec(guard, bind, behavior).await,
            };
            if let Err(err) = result {
                tracing::error!("command exited with an error: {err}");
                *fatal_error.lock() = Some(err);
            }
            let _ = done_tx.send(());
        }
    });

    let delay = match graceful_timeout {
        Some(duration) => graceful.shutdown_with_limit(duration).await?,
        None => graceful.shutdown().await,
    };
    tracing::debug!("gracefully shutdown with a delay of: {delay:?}");

    match fatal_error.lock().take() {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

fn new_shutdown_signal(
    done_rx: tokio::sync::oneshot::Receiver<()>,
    base_shutdown_signal: impl Future<Output: Send + 'static> + Send + 'static,
) -> impl Future + Send + 'static {
    async move {
        tokio::select! {
            _ = base_shutdown_signal => {
                tracing::debug!("default signal triggered: init graceful shutdown");
            }
            _ = done_rx => {
                tracing::debug!("command is finished, return control");
            }
        }
    }
}
