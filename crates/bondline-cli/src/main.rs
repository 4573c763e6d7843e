//! Bondline CLI
//!
//! Replays launch/trade scenarios and quotes trades against a curve.

use anyhow::Context;
use bondline_cli::{LogFormat, LoggingConfig, Scenario};
use bondline_core::prelude::*;
use bondline_curve::BondingCurve;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "bondline")]
#[command(version)]
#[command(about = "Bonding-curve token engine simulator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a scenario file
    Simulate {
        /// Scenario file path
        #[arg(short, long, env = "BONDLINE_SCENARIO", default_value = "scenario.toml")]
        scenario: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Quote a mint or burn against a curve
    Quote {
        /// Base price in base units per whole token
        #[arg(long, default_value = "1e15")]
        base_price: String,

        /// Curve coefficient
        #[arg(long, default_value = "1e8")]
        coefficient: String,

        /// Circulating supply in base units
        #[arg(long, default_value = "0")]
        supply: String,

        /// Currency in (mint) or tokens in (burn), base units
        #[arg(long)]
        amount: String,

        /// Quote a burn instead of a mint
        #[arg(long)]
        burn: bool,

        /// Quoting slices
        #[arg(long, default_value_t = QUOTE_STEPS)]
        steps: u32,
    },

    /// Version information
    Version,
}

fn init_logging(verbose: bool, logging: &LoggingConfig) {
    let fallback = if verbose { "debug" } else { logging.level.as_str() };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(env_filter);
    match logging.format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate { scenario, json } => {
            let scenario = Scenario::load(&scenario)?;
            init_logging(cli.verbose, &scenario.logging);

            tracing::info!(
                launches = scenario.launch.len(),
                steps = scenario.step.len(),
                "replaying scenario"
            );
            let report = bondline_cli::run(&scenario)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render());
            }
            if report.failed_steps() > 0 {
                tracing::warn!(failed = report.failed_steps(), "some steps were rejected");
            }
        }

        Commands::Quote {
            base_price,
            coefficient,
            supply,
            amount,
            burn,
            steps,
        } => {
            init_logging(cli.verbose, &LoggingConfig::default());

            let curve = BondingCurve::new(parse_amount(&base_price)?, parse_amount(&coefficient)?)?
                .with_steps(steps)?;
            let supply = parse_amount(&supply).context("supply")?;
            let amount = parse_amount(&amount).context("amount")?;

            println!("Spot price:      {}", format_units(curve.price_at(supply)?));
            if burn {
                let quote = curve.burn_quote(supply, amount)?;
                let exact = curve.integral(supply)? - curve.integral(supply - amount)?;
                println!("Gross proceeds:  {}", format_units(quote.gross_out));
                println!("Exact value:     {}", format_units(exact));
                println!("Average price:   {}", format_units(quote.effective_price));
                println!("Price after:     {}", format_units(quote.end_price));
            } else {
                let quote = curve.mint_quote(supply, amount)?;
                let supply_after = supply + quote.tokens_out;
                let exact = curve.integral(supply_after)? - curve.integral(supply)?;
                println!("Tokens out:      {}", format_units(quote.tokens_out));
                println!("Exact cost:      {}", format_units(exact));
                println!("Average price:   {}", format_units(quote.effective_price));
                println!("Price after:     {}", format_units(quote.end_price));
            }
        }

        Commands::Version => {
            println!("bondline v{}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Features:");
            println!("  - Quadratic bonding curve, {QUOTE_STEPS}-slice conservative quoting");
            println!("  - Reserve backing checks against the exact curve integral");
            println!("  - Pull-payment creator spread and protocol fee");
        }
    }

    Ok(())
}
