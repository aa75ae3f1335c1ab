//! Unified logging initialization for rateplan binaries
//!
//! Filter priority, highest first:
//! 1. CLI flags (`-v/-q`)
//! 2. `RUST_LOG` environment variable
//! 3. The filter passed by the binary

use anyhow::Result;
use clap_verbosity_flag::{LogLevel, Verbosity};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Resolve the filter directive that [`init_logging`] would install.
///
/// Split out so the priority order can be checked without touching the
/// global subscriber.
pub fn resolve_filter<L: LogLevel>(verbosity: &Verbosity<L>, default_filter: &str) -> String {
    if verbosity.is_present() {
        return match verbosity.log_level() {
            Some(level) => level.to_string().to_lowercase(),
            None => "off".to_string(),
        };
    }

    std::env::var("RUST_LOG")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| default_filter.to_string())
}

/// Initialize logging with the given verbosity and default filter.
///
/// ```no_run
/// use clap::Parser;
/// use clap_verbosity_flag::{Verbosity, WarnLevel};
/// use rateplan_common::logging;
///
/// #[derive(Parser)]
/// struct Args {
///     #[command(flatten)]
///     verbosity: Verbosity<WarnLevel>,
/// }
///
/// let args = Args::parse();
/// logging::init_logging(&args.verbosity, "rateplan_engine=info").unwrap();
/// ```
pub fn init_logging<L: LogLevel>(verbosity: &Verbosity<L>, default_filter: &str) -> Result<()> {
    let filter = EnvFilter::try_new(resolve_filter(verbosity, default_filter))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .try_init()?;

    Ok(())
}
