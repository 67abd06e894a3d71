use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use period_engine::{
    all_period_bounds, get_end, get_start, period_bounds, period_keys, CivilInstant, Instant,
};
use serde_json::json;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "periods", about = "DST-correct calendar period boundaries")]
#[command(version)]
struct Cli {
    /// IANA timezone for instants without an offset, and for the output
    #[arg(long, global = true, env = "PERIODS_TZ", default_value = "UTC")]
    tz: String,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, env = "PERIODS_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List period keys and labels in registry order
    Keys,

    /// Print the first instant of the period containing INSTANT
    Start {
        /// RFC 3339, civil time (interpreted in --tz), or epoch seconds
        instant: String,
        /// Period key: "10 minutes", hour, day, week, month
        period: String,
        /// Print JSON instead of a bare timestamp
        #[arg(long)]
        json: bool,
    },

    /// Print the first instant after the period containing INSTANT
    End {
        /// RFC 3339, civil time (interpreted in --tz), or epoch seconds
        instant: String,
        /// Period key: "10 minutes", hour, day, week, month
        period: String,
        /// Print JSON instead of a bare timestamp
        #[arg(long)]
        json: bool,
    },

    /// Print start and end of one period, or of every period, as JSON
    Bounds {
        /// RFC 3339, civil time (interpreted in --tz), or epoch seconds
        instant: String,
        /// Period key; all periods when omitted
        period: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);
    run(cli)
}

fn init_tracing(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Keys => {
            for key in period_keys() {
                println!("{}\t{}", key.as_str(), key.label());
            }
        }
        Commands::Start {
            instant,
            period,
            json,
        } => {
            let t = parse_instant(&instant, &cli.tz)?;
            let start = get_start(&t, &period)?;
            print_boundary(&period, &start, json)?;
        }
        Commands::End {
            instant,
            period,
            json,
        } => {
            let t = parse_instant(&instant, &cli.tz)?;
            let end = get_end(&t, &period)?;
            print_boundary(&period, &end, json)?;
        }
        Commands::Bounds { instant, period } => {
            let t = parse_instant(&instant, &cli.tz)?;
            let output = match period {
                Some(period) => serde_json::to_string_pretty(&period_bounds(&t, &period)?)?,
                None => serde_json::to_string_pretty(&all_period_bounds(&t))?,
            };
            println!("{output}");
        }
    }
    Ok(())
}

fn parse_instant(text: &str, tz: &str) -> Result<Instant> {
    let instant =
        Instant::parse(text, tz).with_context(|| format!("cannot read instant '{text}'"))?;
    debug!(%instant, tz, "parsed instant");
    Ok(instant)
}

fn print_boundary(period: &str, boundary: &Instant, as_json: bool) -> Result<()> {
    if as_json {
        let value = json!({
            "period": period,
            "timezone": boundary.timezone_name(),
            "instant": boundary.to_rfc3339(),
            "epoch": boundary.epoch(),
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        println!("{boundary}");
    }
    Ok(())
}
