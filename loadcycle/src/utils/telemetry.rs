use std::{io::IsTerminal as _, path::Path};

use rama::{
    error::{BoxError, ErrorContext as _, OpaqueError},
    telemetry::tracing::{
        self,
        metadata::LevelFilter,
        subscriber::{EnvFilter, fmt::writer::BoxMakeWriter},
    },
};

/// Logging related command line options.
#[derive(Debug, Clone, Copy)]
pub struct TelemetryConfig<'a> {
    pub verbose: bool,
    pub pretty: bool,
    pub output: Option<&'a Path>,
}

/// Configures structured logging with runtime control via `RUST_LOG` environment variable.
///
/// Defaults to INFO level, which already emits one line per request attempt.
/// Use `RUST_LOG=debug` or `RUST_LOG=trace` for troubleshooting.
pub fn init_tracing(cfg: TelemetryConfig<'_>) -> Result<(), BoxError> {
    let writer = make_writer(cfg.output)?;

    let subscriber = tracing::subscriber::fmt()
        .with_ansi(cfg.output.is_none() && std::io::stderr().is_terminal())
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(default_level(cfg.verbose).into())
                .from_env_lossy(),
        )
        .with_writer(writer);

    if cfg.pretty {
        subscriber.pretty().try_init()?;
    } else {
        subscriber.try_init()?;
    }

    tracing::debug!(output = ?cfg.output, "tracing is set up");
    Ok(())
}

fn default_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Log lines go to stderr unless a file is given, in which case they are appended to it.
fn make_writer(output: Option<&Path>) -> Result<BoxMakeWriter, OpaqueError> {
    let Some(path) = output else {
        return Ok(BoxMakeWriter::new(std::io::stderr));
    };

    let file = std::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .context("open log file")?;

    Ok(BoxMakeWriter::new(file))
}
