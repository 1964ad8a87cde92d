use crate::core::sensor::{RangeSensor, SensorSettings};
use crate::domain::model::Reading;
use crate::domain::ports::ReadingSink;
use crate::utils::error::{LidarError, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// What one ranging session should do.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPlan {
    /// Label stamped on every reading.
    pub name: String,
    /// Readings to collect; 0 runs until the stop flag is raised.
    pub samples: usize,
    pub period_ms: u32,
    pub timeout: Duration,
    /// Consecutive sample timeouts tolerated before giving up; 0 never gives up.
    pub max_consecutive_timeouts: u32,
    pub settings: SensorSettings,
}

impl Default for SessionPlan {
    fn default() -> Self {
        Self {
            name: String::new(),
            samples: 10,
            period_ms: 50,
            timeout: Duration::from_millis(500),
            max_consecutive_timeouts: 3,
            settings: SensorSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub name: String,
    pub count: usize,
    pub min_mm: Option<u16>,
    pub max_mm: Option<u16>,
    pub mean_mm: Option<f64>,
    pub timeouts: usize,
    pub stopped_early: bool,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }
}

/// Running statistics over collected samples.
#[derive(Debug, Clone, Default)]
pub struct SessionStats {
    count: usize,
    sum: u64,
    min: Option<u16>,
    max: Option<u16>,
    timeouts: usize,
    consecutive_timeouts: u32,
}

impl SessionStats {
    pub fn record(&mut self, range_mm: u16) {
        self.count += 1;
        self.sum += u64::from(range_mm);
        self.min = Some(self.min.map_or(range_mm, |m| m.min(range_mm)));
        self.max = Some(self.max.map_or(range_mm, |m| m.max(range_mm)));
        self.consecutive_timeouts = 0;
    }

    /// Counts a timed-out sample and fails once `max_consecutive` is reached.
    pub fn record_timeout(&mut self, max_consecutive: u32) -> Result<()> {
        self.timeouts += 1;
        self.consecutive_timeouts += 1;
        if max_consecutive > 0 && self.consecutive_timeouts >= max_consecutive {
            return Err(LidarError::timeout("consecutive samples"));
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn report(&self, name: &str, stopped_early: bool, elapsed: Duration) -> SessionReport {
        SessionReport {
            name: name.to_string(),
            count: self.count,
            min_mm: self.min,
            max_mm: self.max,
            mean_mm: (self.count > 0).then(|| self.sum as f64 / self.count as f64),
            timeouts: self.timeouts,
            stopped_early,
            elapsed,
        }
    }
}

type ConfigureHook<S> = Box<dyn FnMut(&mut S) -> Result<()> + Send>;

/// Runs sampling sessions against one sensor: initialize, configure, start,
/// collect, stop.
pub struct RangingEngine<S: RangeSensor> {
    sensor: S,
    stop: Arc<AtomicBool>,
    configure: Option<ConfigureHook<S>>,
}

impl<S: RangeSensor> RangingEngine<S> {
    pub fn new(sensor: S) -> Self {
        Self {
            sensor,
            stop: Arc::new(AtomicBool::new(false)),
            configure: None,
        }
    }

    /// Shares a flag that ends collection early when set.
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = stop;
        self
    }

    /// Extra driver-specific setup, run after the plan's settings are applied.
    pub fn with_configure<F>(mut self, hook: F) -> Self
    where
        F: FnMut(&mut S) -> Result<()> + Send + 'static,
    {
        self.configure = Some(Box::new(hook));
        self
    }

    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn sensor_mut(&mut self) -> &mut S {
        &mut self.sensor
    }

    pub fn into_sensor(self) -> S {
        self.sensor
    }

    pub fn run(&mut self, plan: &SessionPlan, sink: &mut dyn ReadingSink) -> Result<SessionReport> {
        let started = Instant::now();
        tracing::info!(
            "Starting session '{}' on {} at 0x{:02x}",
            plan.name,
            self.sensor.kind(),
            self.sensor.address()
        );

        if let Err(e) = self.prepare(plan) {
            if let Err(finish_err) = sink.finish() {
                tracing::warn!("Failed to finish output: {}", finish_err);
            }
            return Err(e);
        }

        let collected = self.collect(plan, sink);

        let stopped = self.sensor.stop_continuous();
        if let Err(e) = &stopped {
            tracing::warn!("Failed to stop continuous ranging: {}", e);
        }
        let finished = sink.finish();

        let (stats, stopped_early) = collected?;
        stopped?;
        finished?;

        let report = stats.report(&plan.name, stopped_early, started.elapsed());
        tracing::info!(
            "Session '{}' collected {} readings ({} timeouts) in {:?}",
            plan.name,
            report.count,
            report.timeouts,
            report.elapsed
        );
        Ok(report)
    }

    fn prepare(&mut self, plan: &SessionPlan) -> Result<()> {
        self.sensor.set_timeout(plan.timeout);

        tracing::debug!("Initializing sensor...");
        self.sensor.initialize()?;

        tracing::debug!("Configuring sensor...");
        if !plan.settings.is_empty() {
            self.sensor.configure(&plan.settings)?;
        }
        if let Some(hook) = self.configure.as_mut() {
            hook(&mut self.sensor)?;
        }

        tracing::debug!("Starting continuous ranging every {} ms", plan.period_ms);
        self.sensor.start_continuous(plan.period_ms)
    }

    fn collect(&mut self, plan: &SessionPlan, sink: &mut dyn ReadingSink) -> Result<(SessionStats, bool)> {
        let mut stats = SessionStats::default();

        while plan.samples == 0 || stats.count() < plan.samples {
            if self.stop.load(Ordering::Relaxed) {
                tracing::info!("Stop requested after {} readings", stats.count());
                return Ok((stats, true));
            }

            match self.sensor.read_reading() {
                Ok(reading) => {
                    let reading = name_reading(reading, &plan.name);
                    stats.record(reading.range_mm);
                    sink.accept(&reading)?;
                }
                Err(LidarError::Timeout { waiting_for }) => {
                    // clear the sticky flag, the error already reported it
                    self.sensor.timeout_occurred();
                    tracing::warn!("Sample timed out waiting for {}", waiting_for);
                    stats.record_timeout(plan.max_consecutive_timeouts)?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((stats, false))
    }
}

fn name_reading(reading: Reading, name: &str) -> Reading {
    if name.is_empty() {
        reading
    } else {
        reading.named(name)
    }
}

/// One sensor taking part in round-robin sampling.
pub struct RigMember {
    pub name: String,
    pub sensor: Box<dyn RangeSensor>,
    pub max_consecutive_timeouts: u32,
    /// Readings this member takes before it sits out; 0 keeps it sampling.
    pub samples: usize,
    stats: SessionStats,
    failed: Option<String>,
}

impl RigMember {
    pub fn new(name: impl Into<String>, sensor: Box<dyn RangeSensor>) -> Self {
        Self {
            name: name.into(),
            sensor,
            max_consecutive_timeouts: 3,
            samples: 0,
            stats: SessionStats::default(),
            failed: None,
        }
    }

    fn is_done(&self) -> bool {
        self.samples > 0 && self.stats.count() >= self.samples
    }

    fn is_active(&self) -> bool {
        self.failed.is_none() && !self.is_done()
    }

    /// Why this member dropped out of sampling, if it did.
    pub fn failure(&self) -> Option<&str> {
        self.failed.as_deref()
    }
}

/// Takes one reading from each member in turn, for at most `rounds` rounds.
/// A member sits out once it has its `samples`. A member whose sensor fails
/// is dropped from later rounds; the others carry on.
pub fn sample_round_robin(
    members: &mut [RigMember],
    rounds: usize,
    sink: &mut dyn ReadingSink,
    stop: &AtomicBool,
) -> Result<Vec<SessionReport>> {
    let started = Instant::now();
    let mut stopped_early = false;

    'rounds: for round in 0..rounds {
        if !members.iter().any(RigMember::is_active) {
            break;
        }
        for member in members.iter_mut().filter(|m| m.is_active()) {
            if stop.load(Ordering::Relaxed) {
                tracing::info!("Stop requested during round {}", round + 1);
                stopped_early = true;
                break 'rounds;
            }

            let outcome = match member.sensor.read_reading() {
                Ok(reading) => {
                    member.stats.record(reading.range_mm);
                    sink.accept(&name_reading(reading, &member.name))
                }
                Err(LidarError::Timeout { .. }) => {
                    member.sensor.timeout_occurred();
                    member.stats.record_timeout(member.max_consecutive_timeouts)
                }
                Err(e) => Err(e),
            };

            if let Err(e) = outcome {
                match e {
                    LidarError::IoError(_)
                    | LidarError::CsvError(_)
                    | LidarError::SerializationError(_) => return Err(e),
                    _ => {
                        tracing::warn!("Dropping '{}' from the rig: {}", member.name, e);
                        member.failed = Some(e.to_string());
                    }
                }
            }
        }
    }

    sink.finish()?;

    let elapsed = started.elapsed();
    Ok(members
        .iter()
        .map(|m| m.stats.report(&m.name, stopped_early, elapsed))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sim::SimulatedBus;
    use crate::adapters::sink::MemorySink;
    use crate::core::vl6180x::Vl6180x;
    use crate::domain::model::{Scaling, SensorKind};
    use std::collections::VecDeque;

    #[derive(Default)]
    struct ScriptedSensor {
        samples: VecDeque<Result<u16>>,
        initialized: bool,
        started: bool,
        stopped: bool,
        fail_init: bool,
        fail_start: bool,
        timeout: Duration,
        occurred: bool,
    }

    impl ScriptedSensor {
        fn with_samples(samples: Vec<Result<u16>>) -> Self {
            Self {
                samples: samples.into(),
                ..Default::default()
            }
        }
    }

    impl RangeSensor for ScriptedSensor {
        fn kind(&self) -> SensorKind {
            SensorKind::Vl53l0x
        }

        fn address(&self) -> u8 {
            0x29
        }

        fn set_address(&mut self, _address: u8) -> Result<()> {
            Ok(())
        }

        fn initialize(&mut self) -> Result<()> {
            if self.fail_init {
                return Err(LidarError::NoSpadInfo);
            }
            self.initialized = true;
            Ok(())
        }

        fn configure(&mut self, settings: &SensorSettings) -> Result<()> {
            settings.check_supported(SensorKind::Vl53l0x)
        }

        fn start_continuous(&mut self, _period_ms: u32) -> Result<()> {
            if self.fail_start {
                return Err(LidarError::bus("nack on start"));
            }
            self.started = true;
            Ok(())
        }

        fn stop_continuous(&mut self) -> Result<()> {
            self.stopped = true;
            Ok(())
        }

        fn read_range_mm(&mut self) -> Result<u16> {
            let next = self
                .samples
                .pop_front()
                .unwrap_or_else(|| Err(LidarError::timeout("range data")));
            if matches!(next, Err(LidarError::Timeout { .. })) {
                self.occurred = true;
            }
            next
        }

        fn set_timeout(&mut self, timeout: Duration) {
            self.timeout = timeout;
        }

        fn timeout(&self) -> Duration {
            self.timeout
        }

        fn timeout_occurred(&mut self) -> bool {
            std::mem::take(&mut self.occurred)
        }
    }

    #[derive(Default)]
    struct FinishCounter {
        accepted: usize,
        finished: usize,
    }

    impl ReadingSink for FinishCounter {
        fn accept(&mut self, _reading: &Reading) -> Result<()> {
            self.accepted += 1;
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished += 1;
            Ok(())
        }
    }

    fn plan(samples: usize) -> SessionPlan {
        SessionPlan {
            name: "front".to_string(),
            samples,
            ..Default::default()
        }
    }

    #[test]
    fn test_run_collects_and_summarizes() {
        let sensor = ScriptedSensor::with_samples(vec![Ok(100), Ok(300), Ok(200)]);
        let mut engine = RangingEngine::new(sensor);
        let mut sink = MemorySink::default();

        let report = engine.run(&plan(3), &mut sink).unwrap();

        assert_eq!(report.count, 3);
        assert_eq!(report.min_mm, Some(100));
        assert_eq!(report.max_mm, Some(300));
        assert_eq!(report.mean_mm, Some(200.0));
        assert!(!report.stopped_early);
        assert_eq!(sink.readings.len(), 3);
        assert!(sink.readings.iter().all(|r| r.sensor == "front"));

        let sensor = engine.into_sensor();
        assert!(sensor.initialized && sensor.started && sensor.stopped);
        assert_eq!(sensor.timeout, Duration::from_millis(500));
    }

    #[test]
    fn test_single_timeouts_are_counted_and_skipped() {
        let sensor = ScriptedSensor::with_samples(vec![
            Ok(100),
            Err(LidarError::timeout("range data")),
            Ok(120),
        ]);
        let mut engine = RangingEngine::new(sensor);
        let mut sink = MemorySink::default();

        let report = engine.run(&plan(2), &mut sink).unwrap();
        assert_eq!(report.count, 2);
        assert_eq!(report.timeouts, 1);
    }

    #[test]
    fn test_consecutive_timeouts_abort_but_still_stop() {
        let sensor = ScriptedSensor::with_samples(vec![Ok(100)]);
        let mut engine = RangingEngine::new(sensor);
        let mut sink = MemorySink::default();

        let err = engine.run(&plan(5), &mut sink).unwrap_err();
        assert_eq!(err.to_string(), "Timed out waiting for consecutive samples");
        assert!(engine.into_sensor().stopped);
        assert_eq!(sink.readings.len(), 1);
    }

    #[test]
    fn test_other_errors_abort_immediately() {
        let sensor = ScriptedSensor::with_samples(vec![Err(LidarError::bus("nack"))]);
        let mut engine = RangingEngine::new(sensor);
        let mut sink = MemorySink::default();

        let err = engine.run(&plan(5), &mut sink).unwrap_err();
        assert!(matches!(err, LidarError::Bus { .. }));
        assert!(engine.into_sensor().stopped);
    }

    #[test]
    fn test_failed_initialization_never_starts() {
        let sensor = ScriptedSensor {
            fail_init: true,
            ..Default::default()
        };
        let mut engine = RangingEngine::new(sensor);
        let mut sink = FinishCounter::default();

        assert!(matches!(
            engine.run(&plan(1), &mut sink),
            Err(LidarError::NoSpadInfo)
        ));
        assert_eq!(sink.finished, 1);
        let sensor = engine.into_sensor();
        assert!(!sensor.started && !sensor.stopped);
    }

    #[test]
    fn test_failed_start_still_finishes_output() {
        let sensor = ScriptedSensor {
            fail_start: true,
            ..ScriptedSensor::with_samples(vec![Ok(1)])
        };
        let mut engine = RangingEngine::new(sensor);
        let mut sink = FinishCounter::default();

        let err = engine.run(&plan(1), &mut sink).unwrap_err();
        assert!(matches!(err, LidarError::Bus { .. }));
        assert_eq!(sink.accepted, 0);
        assert_eq!(sink.finished, 1);
        assert!(engine.into_sensor().initialized);
    }

    #[test]
    fn test_failed_configure_hook_finishes_output() {
        let sensor = ScriptedSensor::with_samples(vec![Ok(1)]);
        let mut engine = RangingEngine::new(sensor)
            .with_configure(|_sensor| Err(LidarError::invalid_state("not calibrated")));
        let mut sink = FinishCounter::default();

        let err = engine.run(&plan(1), &mut sink).unwrap_err();
        assert_eq!(err.code(), "invalid.state");
        assert_eq!(sink.finished, 1);
        assert!(!engine.into_sensor().started);
    }

    #[test]
    fn test_stop_flag_ends_unbounded_session() {
        let sensor = ScriptedSensor::with_samples((0..10).map(|_| Ok(1)).collect());
        let stop = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&stop);
        let mut engine = RangingEngine::new(sensor)
            .with_stop_flag(stop)
            .with_configure(move |_sensor| {
                flag.store(true, Ordering::Relaxed);
                Ok(())
            });
        let mut sink = MemorySink::default();

        let report = engine.run(&plan(0), &mut sink).unwrap();
        assert!(report.stopped_early);
        assert_eq!(report.count, 0);
    }

    #[test]
    fn test_unsupported_settings_fail_before_start() {
        let sensor = ScriptedSensor::with_samples(vec![Ok(1)]);
        let mut engine = RangingEngine::new(sensor);
        let mut sink = MemorySink::default();
        let mut plan = plan(1);
        plan.settings.scaling = Some(Scaling::Two);

        let err = engine.run(&plan, &mut sink).unwrap_err();
        assert_eq!(err.code(), "invalid.argument");
        assert!(!engine.into_sensor().started);
    }

    #[test]
    fn test_runs_against_simulated_vl6180x() {
        let sim = SimulatedBus::with_preset(SensorKind::Vl6180x, 0x29);
        sim.script_ranges(SensorKind::Vl6180x, 0x29, &[50, 60]);
        let sensor = Vl6180x::new(sim.clone()).unwrap();
        let mut engine = RangingEngine::new(sensor);
        let mut sink = MemorySink::default();
        let mut plan = plan(3);
        plan.settings.scaling = Some(Scaling::Two);

        let report = engine.run(&plan, &mut sink).unwrap();
        let ranges: Vec<u16> = sink.readings.iter().map(|r| r.range_mm).collect();
        assert_eq!(ranges, vec![100, 120, 200]);
        assert_eq!(report.max_mm, Some(200));
        assert_eq!(sim.register16(0x29, 0x096), Some(127));
    }

    #[test]
    fn test_round_robin_drops_failing_members() {
        let good = ScriptedSensor::with_samples(vec![Ok(10), Ok(20), Ok(30)]);
        let bad = ScriptedSensor::with_samples(vec![Ok(5), Err(LidarError::bus("nack"))]);
        let mut members = vec![
            RigMember::new("left", Box::new(good)),
            RigMember::new("right", Box::new(bad)),
        ];
        let mut sink = MemorySink::default();
        let stop = AtomicBool::new(false);

        let reports = sample_round_robin(&mut members, 3, &mut sink, &stop).unwrap();

        assert_eq!(reports[0].count, 3);
        assert_eq!(reports[1].count, 1);
        assert!(members[1].failure().unwrap().contains("nack"));
        assert_eq!(sink.readings.len(), 4);
        assert_eq!(sink.readings[1].sensor, "right");
    }

    #[test]
    fn test_round_robin_stops_each_member_at_its_samples() {
        let short = ScriptedSensor::with_samples((0..10).map(|_| Ok(10)).collect());
        let long = ScriptedSensor::with_samples((0..10).map(|_| Ok(20)).collect());
        let mut members = vec![
            RigMember::new("short", Box::new(short)),
            RigMember::new("long", Box::new(long)),
        ];
        members[0].samples = 2;
        members[1].samples = 4;
        let mut sink = MemorySink::default();
        let stop = AtomicBool::new(false);

        let reports = sample_round_robin(&mut members, 10, &mut sink, &stop).unwrap();

        assert_eq!(reports[0].count, 2);
        assert_eq!(reports[1].count, 4);
        assert!(!reports[1].stopped_early);
        let order: Vec<&str> = sink.readings.iter().map(|r| r.sensor.as_str()).collect();
        assert_eq!(order, vec!["short", "long", "short", "long", "long", "long"]);
    }

    #[test]
    fn test_report_serializes_elapsed_in_millis() {
        let mut stats = SessionStats::default();
        stats.record(10);
        let report = stats.report("x", false, Duration::from_millis(1500));
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["elapsed"], 1500);
        assert_eq!(json["mean_mm"], 10.0);
    }
}
