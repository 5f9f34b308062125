//! Command-line runner for harqsim.
//!
//! Runs downlink scheduling simulations over the reference PHY, prints the
//! built-in link tables, and measures BLER grids for calibration.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{cmd_calibrate, cmd_run, cmd_tables, CalibrateArgs, RunArgs, TableProfile};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging; `RUST_LOG` takes precedence when set
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a number of subframes and print a JSON summary
    Run(RunArgs),

    /// Print a built-in CQI/TBS table as JSON
    Tables {
        /// Which table to print
        #[arg(long, value_enum, default_value_t = TableProfile::Custom)]
        table: TableProfile,
    },

    /// Measure an AWGN BLER grid with the reference codec and modem
    Calibrate(CalibrateArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(log_filter(cli.verbose))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => cmd_run(args)?,
        Commands::Tables { table } => cmd_tables(table)?,
        Commands::Calibrate(args) => cmd_calibrate(args)?,
    }

    Ok(())
}

/// `RUST_LOG` if it parses, otherwise `debug` or `info` per `--verbose`.
fn log_filter(verbose: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)))
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "debug"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn verbose_selects_debug_fallback() {
        let quiet = EnvFilter::new(default_directive(false));
        let verbose = EnvFilter::new(default_directive(true));
        assert_eq!(quiet.max_level_hint(), Some(LevelFilter::INFO));
        assert_eq!(verbose.max_level_hint(), Some(LevelFilter::DEBUG));
    }

    #[test]
    fn cli_parses_global_verbose_flag() {
        let cli = Cli::try_parse_from(["harqsim", "tables", "-v"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Tables { .. }));
    }
}
