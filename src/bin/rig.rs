use anyhow::Context;
use clap::Parser;
use lidar_contrib::adapters::sink::{open_sink, OutputFormat};
use lidar_contrib::config::cli::{bring_up_rig, shut_down_rig, BusSource};
use lidar_contrib::config::toml_config::RigConfig;
use lidar_contrib::core::ranging::sample_round_robin;
use lidar_contrib::domain::model::Port;
use lidar_contrib::utils::error::{ErrorSeverity, LidarError};
use lidar_contrib::utils::{logger, validation::Validate};
use lidar_contrib::SessionReport;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "rig")]
#[command(about = "Sample every time-of-flight sensor on a robot rig described in TOML")]
struct Args {
    /// Path to the rig's TOML file
    #[arg(short, long, default_value = "rig.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Use in-memory sensors instead of the I2C bus
    #[arg(long)]
    simulate: bool,

    /// Override the bus port from the config
    #[arg(long)]
    port: Option<Port>,

    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    #[arg(long)]
    output: Option<PathBuf>,

    /// Cap the number of round-robin rounds
    #[arg(long)]
    rounds: Option<usize>,

    /// Show each sensor's plan without touching the bus
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match RigConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load rig file '{}': {}", args.config, e);
            eprintln!("Make sure the file exists and is valid TOML");
            std::process::exit(1);
        }
    };

    if let Some(port) = args.port {
        config.bus.port = port;
        config.bus.device = None;
    }
    if let Some(format) = args.format {
        config.output.format = format;
    }
    if let Some(output) = &args.output {
        config.output.path = Some(output.clone());
    }

    let level = config.logging.as_ref().and_then(|l| l.level.clone());
    if config.log_json() {
        let level = if args.verbose { Some("debug") } else { level.as_deref() };
        logger::init_json_logger(level);
    } else {
        let verbose = args.verbose || matches!(level.as_deref(), Some("debug") | Some("trace"));
        logger::init_cli_logger(verbose);
    }

    tracing::info!("Loaded rig '{}' from {}", config.rig.name, args.config);

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("{}", e.user_friendly_message());
        std::process::exit(1);
    }

    let rounds = args.rounds.unwrap_or_else(|| config.rounds());
    display_config_summary(&config, &args, rounds);

    if args.dry_run {
        tracing::info!("Dry run, leaving the bus alone");
        return perform_dry_run(&config);
    }

    match run(config, args.simulate, rounds).await {
        Ok(reports) => {
            tracing::info!("Rig sampling completed");
            for report in &reports {
                print_report(report);
            }
        }
        Err(e) => {
            let Some(lidar) = e.downcast_ref::<LidarError>() else {
                eprintln!("{:#}", e);
                std::process::exit(1);
            };

            tracing::error!(
                "Rig sampling failed: {} (Category: {:?}, Severity: {:?})",
                lidar.report(),
                lidar.category(),
                lidar.severity()
            );
            eprintln!("{}", lidar.user_friendly_message());
            eprintln!("Suggestion: {}", lidar.recovery_suggestion());

            let exit_code = match lidar.severity() {
                ErrorSeverity::Low => 0,
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

async fn run(config: RigConfig, simulate: bool, rounds: usize) -> anyhow::Result<Vec<SessionReport>> {
    let source = BusSource::new(config.bus.port, config.bus.device.clone(), simulate);
    tracing::info!("Using {}", source.describe());

    let specs = config.member_specs();
    let mut sink = open_sink(config.output.format, config.output.path.as_deref())?;
    let stop = Arc::new(AtomicBool::new(false));

    let worker_stop = Arc::clone(&stop);
    let mut worker = tokio::task::spawn_blocking(move || -> Result<Vec<SessionReport>, LidarError> {
        let mut members = match bring_up_rig(&source, &specs) {
            Ok(members) => members,
            Err(e) => {
                if let Err(finish_err) = sink.finish() {
                    tracing::warn!("Failed to finish output: {}", finish_err);
                }
                return Err(e);
            }
        };
        let result = sample_round_robin(&mut members, rounds, sink.as_mut(), &worker_stop);
        shut_down_rig(&mut members);

        for member in &members {
            if let Some(reason) = member.failure() {
                tracing::warn!("'{}' dropped out: {}", member.name, reason);
            }
        }
        result
    });

    let joined = tokio::select! {
        joined = &mut worker => joined,
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => tracing::info!("Interrupted, finishing the current round"),
                Err(e) => tracing::warn!("Cannot listen for Ctrl-C: {}", e),
            }
            stop.store(true, Ordering::Relaxed);
            worker.await
        }
    };

    let reports = joined.context("rig sampling task did not finish")??;
    Ok(reports)
}

fn display_config_summary(config: &RigConfig, args: &Args, rounds: usize) {
    println!("Rig Summary:");
    println!("  Rig: {}", config.rig.name);
    if !config.rig.description.is_empty() {
        println!("  Description: {}", config.rig.description);
    }
    match &config.bus.device {
        Some(device) => println!("  Bus: {}", device.display()),
        None => println!("  Bus: {} ({})", config.bus.port, config.bus.port.device_path()),
    }
    println!("  Sensors: {}", config.sensors.len());
    println!("  Rounds: {}", rounds);
    println!("  Format: {:?}", config.output.format);
    if let Some(path) = &config.output.path {
        println!("  Output: {}", path.display());
    }
    if args.simulate {
        println!("  SIMULATED BUS");
    }
    if args.dry_run {
        println!("  DRY RUN MODE ENABLED");
    }
}

fn perform_dry_run(config: &RigConfig) -> anyhow::Result<()> {
    println!("Sensor plans:");
    for sensor in &config.sensors {
        let plan = sensor.plan();
        let settings = serde_json::to_string(&plan.settings)
            .with_context(|| format!("cannot render settings for '{}'", sensor.name))?;
        println!(
            "  {} ({} at 0x{:02x}): {} samples every {} ms, timeout {} ms, settings {}",
            plan.name,
            sensor.kind,
            sensor.address,
            plan.samples,
            plan.period_ms,
            plan.timeout.as_millis(),
            settings
        );
    }
    Ok(())
}

fn print_report(report: &SessionReport) {
    let mm = |value: Option<u16>| value.map_or("-".to_string(), |v| format!("{} mm", v));
    let mean = report
        .mean_mm
        .map_or("-".to_string(), |v| format!("{:.1} mm", v));

    eprintln!(
        "{}: {} readings, {} timeouts, min {}, max {}, mean {}",
        report.name,
        report.count,
        report.timeouts,
        mm(report.min_mm),
        mm(report.max_mm),
        mean
    );
}
