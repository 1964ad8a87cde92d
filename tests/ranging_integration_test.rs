use lidar_contrib::adapters::sim::SimulatedBus;
use lidar_contrib::adapters::sink::{open_sink, MemorySink, OutputFormat};
use lidar_contrib::adapters::NoDelay;
use lidar_contrib::domain::model::{DistanceMode, SensorKind};
use lidar_contrib::{
    LidarError, RangeSensor, RangingEngine, SensorSettings, SessionPlan, Vl53l0x, Vl53l1x,
    Vl6180x,
};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tempfile::TempDir;

fn plan(samples: usize) -> SessionPlan {
    SessionPlan {
        name: "bench".to_string(),
        samples,
        period_ms: 100,
        timeout: Duration::from_millis(50),
        max_consecutive_timeouts: 2,
        settings: SensorSettings::default(),
    }
}

#[test]
fn test_vl53l1x_session_on_simulated_bus() {
    let sim = SimulatedBus::with_preset(SensorKind::Vl53l1x, 0x29);
    sim.script_ranges(SensorKind::Vl53l1x, 0x29, &[250, 1000]);
    let sensor = Vl53l1x::at_address(sim.clone(), NoDelay, 0x29).unwrap();

    let mut plan = plan(3);
    plan.settings.distance_mode = Some(DistanceMode::Short);
    plan.settings.timing_budget_us = Some(50_000);

    let mut engine = RangingEngine::new(sensor);
    let mut sink = MemorySink::default();
    let report = engine.run(&plan, &mut sink).unwrap();

    let ranges: Vec<u16> = sink.readings.iter().map(|r| r.range_mm).collect();
    assert_eq!(ranges, vec![250, 1000, 500]);
    assert!(sink.readings.iter().all(|r| r.sensor == "bench"));
    assert_eq!(report.count, 3);
    assert_eq!(report.min_mm, Some(250));
    assert_eq!(report.timeouts, 0);
    assert_eq!(engine.sensor_mut().distance_mode(), DistanceMode::Short);
}

#[test]
fn test_vl53l0x_session_on_simulated_bus() {
    let sim = SimulatedBus::with_preset(SensorKind::Vl53l0x, 0x29);
    sim.script_ranges(SensorKind::Vl53l0x, 0x29, &[120, 130]);
    let sensor = Vl53l0x::new(sim.clone()).unwrap();

    let mut plan = plan(2);
    plan.period_ms = 0;
    plan.settings.signal_rate_limit = Some(0.1);

    let mut engine = RangingEngine::new(sensor);
    let mut sink = MemorySink::default();
    let report = engine.run(&plan, &mut sink).unwrap();

    assert_eq!(report.count, 2);
    assert_eq!(report.mean_mm, Some(125.0));
    assert!(!report.stopped_early);
    assert!(sink.readings.iter().all(|r| r.kind == SensorKind::Vl53l0x));
}

#[test]
fn test_vl6180x_session_writes_csv() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("out").join("readings.csv");

    let sim = SimulatedBus::with_preset(SensorKind::Vl6180x, 0x29);
    sim.script_ranges(SensorKind::Vl6180x, 0x29, &[42, 43]);
    let sensor = Vl6180x::new(sim).unwrap();

    let mut sink = open_sink(OutputFormat::Csv, Some(&path)).unwrap();
    let mut engine = RangingEngine::new(sensor);
    engine.run(&plan(2), sink.as_mut()).unwrap();
    drop(sink);

    let content = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].contains("range_mm"));
    assert!(lines[1].contains(",bench,42"));
    assert!(lines[2].contains(",bench,43"));
}

#[test]
fn test_missing_device_fails_initialization() {
    let sim = SimulatedBus::new();
    let sensor = Vl6180x::new(sim).unwrap();
    let mut engine = RangingEngine::new(sensor);
    let mut sink = MemorySink::default();

    let err = engine.run(&plan(1), &mut sink).unwrap_err();
    assert!(matches!(err, LidarError::Bus { .. }), "unexpected error {:?}", err);
    assert!(sink.readings.is_empty());
}

#[test]
fn test_stop_flag_ends_session_before_sampling() {
    let sim = SimulatedBus::with_preset(SensorKind::Vl6180x, 0x29);
    let sensor = Vl6180x::new(sim).unwrap();
    let mut engine = RangingEngine::new(sensor);
    engine.stop_flag().store(true, Ordering::Relaxed);

    let mut sink = MemorySink::default();
    let report = engine.run(&plan(0), &mut sink).unwrap();
    assert!(report.stopped_early);
    assert_eq!(report.count, 0);
    assert_eq!(report.mean_mm, None);
}

#[test]
fn test_driver_moves_to_new_address() {
    let sim = SimulatedBus::with_preset(SensorKind::Vl53l0x, 0x29);
    let mut sensor = Vl53l0x::new(sim.clone()).unwrap();

    sensor.set_address(0x33).unwrap();
    assert_eq!(RangeSensor::address(&sensor), 0x33);
    assert!(sim.has_device(0x33));
    assert!(!sim.has_device(0x29));

    sensor.initialize().unwrap();
}
