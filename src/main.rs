use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use scrap_monitor::config::Config;
use scrap_monitor::dashboard::{Dashboard, RefreshReport, Selection};
use scrap_monitor::types::{format_usd, TimeWindow};

const DEFAULT_CONFIG_PATH: &str = "scrap-monitor.toml";

#[derive(Parser, Debug)]
#[command(name = "scrap-monitor", about = "Live manufacturing scrap monitoring dashboard")]
struct Cli {
    /// Path to configuration file (defaults are used when the default file is absent)
    #[arg(short, long)]
    config: Option<String>,

    /// Time window: 1h, 8h, 24h or 7d
    #[arg(short, long)]
    window: Option<String>,

    /// Machine to include; repeat for several
    #[arg(short, long = "machine")]
    machines: Vec<String>,

    /// Run a single refresh cycle and exit
    #[arg(long)]
    once: bool,

    /// Print each cycle as JSON instead of text
    #[arg(long)]
    json: bool,

    /// Validate config and exit
    #[arg(long)]
    check: bool,

    /// Print version and exit
    #[arg(short, long)]
    version: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("scrap-monitor {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = load_config(cli.config.as_deref())?;

    if cli.check {
        println!("Configuration is valid.");
        return Ok(());
    }

    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        site = %config.dashboard.site,
        "Starting scrap monitor"
    );

    if let Err(e) = run(&cli, config).await {
        error!(error = %e, "Dashboard terminated with error");
        return Err(e);
    }

    Ok(())
}

fn load_config(path: Option<&str>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => Config::load(DEFAULT_CONFIG_PATH),
        None => {
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(&config.dashboard.log_level)
        });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: &Cli, config: Config) -> Result<()> {
    let dashboard = Dashboard::from_config(&config)?;

    let window: TimeWindow = cli
        .window
        .as_deref()
        .unwrap_or(&config.dashboard.default_window)
        .parse()
        .context("Invalid time window")?;
    let selection = if cli.machines.is_empty() {
        dashboard.default_selection(config.dashboard.default_machine_count, window)
    } else {
        Selection::new(cli.machines.clone(), window)
    };

    // Cycles never overlap: a late tick waits for the previous cycle
    let mut ticker = tokio::time::interval(Duration::from_secs(config.dashboard.refresh_interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = dashboard.refresh(&selection).await?;
                render(&report, cli.json)?;
                if cli.once {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal, exiting");
                break;
            }
        }
    }

    Ok(())
}

fn render(report: &RefreshReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    println!(
        "=== {} | {} | machines: {} ===",
        report.refreshed_at.format("%Y-%m-%d %H:%M:%S UTC"),
        report.selection.window.label(),
        report.selection.machines.join(", ")
    );

    let Some(kpis) = &report.kpis else {
        println!(
            "Data unavailable: {}",
            report.source_error.as_deref().unwrap_or("no data")
        );
        return Ok(());
    };
    if report.stale {
        println!("(stale data: showing the last good snapshot)");
    }

    for alert in &report.alerts {
        println!("[{}] {}", alert.level, alert.message);
    }

    println!(
        "Scrap rate {:.2}% ({:+.2}) | Scrap cost {} ({}) | OEE impact {:.1}% ({:+.1}) | Avg downtime {:.0} min ({:+.0}) | Production {:.0} ({:+.0})",
        kpis.overall_scrap_rate.value,
        kpis.overall_scrap_rate.delta,
        format_usd(kpis.scrap_cost.value),
        format_usd(kpis.scrap_cost.delta),
        kpis.oee_impact.value,
        kpis.oee_impact.delta,
        kpis.avg_downtime_minutes.value,
        kpis.avg_downtime_minutes.delta,
        kpis.total_production.value,
        kpis.total_production.delta,
    );

    for m in &report.machines {
        println!(
            "  {:<8} produced {:>7} scrap {:>5} avg rate {:>5.2}%",
            m.machine_id, m.total_production, m.scrap_quantity, m.mean_scrap_rate
        );
    }

    let causes: Vec<String> = report
        .root_causes
        .iter()
        .map(|c| format!("{} {}", c.cause, c.count))
        .collect();
    println!("Root causes: {}", causes.join(", "));

    for s in &report.shifts {
        println!("  {:<26} {:>5.1}% [{:?}]", s.shift, s.scrap_rate, s.status);
    }

    Ok(())
}
