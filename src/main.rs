use clap::Parser;
use lidar_contrib::adapters::sink::{open_sink, ChannelSink};
use lidar_contrib::config::cli::{build_sensor, BusSource};
use lidar_contrib::domain::model::Reading;
use lidar_contrib::utils::error::{ErrorSeverity, LidarError};
use lidar_contrib::utils::{logger, validation::Validate};
use lidar_contrib::{CliConfig, RangingEngine, SessionReport};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    if config.log_json {
        logger::init_json_logger(Some(if config.verbose { "debug" } else { "info" }));
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting lidar-contrib CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("{}", e.user_friendly_message());
        std::process::exit(1);
    }

    match run(config).await {
        Ok(report) => {
            tracing::info!("Sampling completed");
            print_summary(&report);
        }
        Err(e) => {
            tracing::error!(
                "Sampling failed: {} (Category: {:?}, Severity: {:?})",
                e.report(),
                e.category(),
                e.severity()
            );
            tracing::error!("Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("{}", e.user_friendly_message());
            eprintln!("Suggestion: {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
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

async fn run(config: CliConfig) -> Result<SessionReport, LidarError> {
    let source = BusSource::new(config.port, config.device.clone(), config.simulate);
    tracing::info!(
        "Using {} for {} at 0x{:02x}",
        source.describe(),
        config.sensor,
        config.address
    );

    source.attach_simulated(config.sensor, config.address);
    let sensor = build_sensor(&source, config.sensor, config.address)?;

    let mut sink = open_sink(config.format, config.output.as_deref())?;
    let plan = config.plan();
    let stop = Arc::new(AtomicBool::new(false));
    let (tx, mut rx) = mpsc::channel::<Reading>(64);

    let engine_stop = Arc::clone(&stop);
    let worker = tokio::task::spawn_blocking(move || {
        let mut engine = RangingEngine::new(sensor).with_stop_flag(engine_stop);
        let mut channel = ChannelSink::new(tx);
        engine.run(&plan, &mut channel)
    });

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    loop {
        tokio::select! {
            reading = rx.recv() => match reading {
                Some(reading) => sink.accept(&reading)?,
                None => break,
            },
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        tracing::info!("Interrupted, stopping after the current sample");
                        stop.store(true, Ordering::Relaxed);
                    }
                    Err(e) => tracing::warn!("Cannot listen for Ctrl-C: {}", e),
                }
            }
        }
    }
    sink.finish()?;

    worker
        .await
        .map_err(|e| LidarError::invalid_state(format!("sampling task failed: {}", e)))?
}

fn print_summary(report: &SessionReport) {
    let mm = |value: Option<u16>| value.map_or("-".to_string(), |v| format!("{} mm", v));

    eprintln!("Summary for {}:", report.name);
    eprintln!("  Readings: {}", report.count);
    eprintln!("  Timeouts: {}", report.timeouts);
    eprintln!("  Min: {}", mm(report.min_mm));
    eprintln!("  Max: {}", mm(report.max_mm));
    match report.mean_mm {
        Some(mean) => eprintln!("  Mean: {:.1} mm", mean),
        None => eprintln!("  Mean: -"),
    }
    eprintln!("  Elapsed: {:.2?}", report.elapsed);
    if report.stopped_early {
        eprintln!("  Stopped early on request");
    }
}
