use crate::domain::model::{RangeStatus, Reading};
use crate::domain::ports::ReadingSink;
use crate::utils::error::{LidarError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

/// One human-readable line per reading.
pub struct TextSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> TextSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> ReadingSink for TextSink<W> {
    fn accept(&mut self, reading: &Reading) -> Result<()> {
        write!(
            self.out,
            "{} {:<10} {:>5} mm",
            reading.timestamp.format("%H:%M:%S%.3f"),
            reading.sensor,
            reading.range_mm
        )?;
        if let Some(ambient) = reading.ambient {
            write!(self.out, "  ambient={}", ambient)?;
        }
        if let Some(status) = reading.status {
            write!(self.out, "  status={:?}", status)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// One JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    out: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: Write + Send> ReadingSink for JsonLinesSink<W> {
    fn accept(&mut self, reading: &Reading) -> Result<()> {
        serde_json::to_writer(&mut self.out, reading)?;
        writeln!(self.out)?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    timestamp: String,
    sensor: &'a str,
    range_mm: u16,
    ambient: Option<u16>,
    status: Option<RangeStatus>,
}

pub struct CsvSink<W: Write + Send> {
    writer: csv::Writer<W>,
}

impl<W: Write + Send> CsvSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(out),
        }
    }
}

impl<W: Write + Send> ReadingSink for CsvSink<W> {
    fn accept(&mut self, reading: &Reading) -> Result<()> {
        self.writer.serialize(CsvRow {
            timestamp: reading.timestamp.to_rfc3339(),
            sensor: &reading.sensor,
            range_mm: reading.range_mm,
            ambient: reading.ambient,
            status: reading.status,
        })?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Keeps readings in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub readings: Vec<Reading>,
}

impl ReadingSink for MemorySink {
    fn accept(&mut self, reading: &Reading) -> Result<()> {
        self.readings.push(reading.clone());
        Ok(())
    }
}

/// Forwards readings to an async consumer. Must be driven from a blocking
/// thread, never from inside the runtime.
pub struct ChannelSink {
    tx: mpsc::Sender<Reading>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<Reading>) -> Self {
        Self { tx }
    }
}

impl ReadingSink for ChannelSink {
    fn accept(&mut self, reading: &Reading) -> Result<()> {
        self.tx
            .blocking_send(reading.clone())
            .map_err(|_| LidarError::invalid_state("reading receiver closed"))
    }
}

/// Builds a sink for `format`, writing to `path` or stdout.
pub fn open_sink(format: OutputFormat, path: Option<&Path>) -> Result<Box<dyn ReadingSink>> {
    let out: Box<dyn Write + Send> = match path {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            Box::new(BufWriter::new(File::create(path)?))
        }
        None => Box::new(std::io::stdout()),
    };

    Ok(match format {
        OutputFormat::Text => Box::new(TextSink::new(out)),
        OutputFormat::Json => Box::new(JsonLinesSink::new(out)),
        OutputFormat::Csv => Box::new(CsvSink::new(out)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::SensorKind;
    use tempfile::TempDir;

    fn sample() -> Reading {
        let mut reading = Reading::range(SensorKind::Vl53l1x, 734).named("front");
        reading.status = Some(RangeStatus::RangeValid);
        reading
    }

    #[test]
    fn test_csv_sink_writes_header_and_rows() {
        let mut sink = CsvSink::new(Vec::new());
        sink.accept(&sample()).unwrap();
        sink.finish().unwrap();

        let bytes = sink.writer.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("timestamp,sensor,range_mm,ambient,status")
        );
        let row = lines.next().unwrap();
        assert!(row.ends_with(",front,734,,range_valid"));
    }

    #[test]
    fn test_json_sink_writes_one_object_per_line() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.accept(&sample()).unwrap();
        sink.accept(&sample()).unwrap();

        let text = String::from_utf8(sink.out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let parsed: Reading = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed.range_mm, 734);
        assert_eq!(parsed.sensor, "front");
    }

    #[test]
    fn test_text_sink_includes_ambient() {
        let mut reading = Reading::range(SensorKind::Vl6180x, 42);
        reading.ambient = Some(291);
        let mut sink = TextSink::new(Vec::new());
        sink.accept(&reading).unwrap();

        let text = String::from_utf8(sink.out).unwrap();
        assert!(text.contains("42 mm"));
        assert!(text.contains("ambient=291"));
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_from_blocking_thread() {
        let (tx, mut rx) = mpsc::channel(4);
        let handle = tokio::task::spawn_blocking(move || {
            let mut sink = ChannelSink::new(tx);
            sink.accept(&sample())?;
            sink.accept(&sample())
        });

        assert_eq!(rx.recv().await.unwrap().range_mm, 734);
        assert_eq!(rx.recv().await.unwrap().sensor, "front");
        handle.await.unwrap().unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_channel_sink_reports_closed_receiver() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let mut sink = ChannelSink::new(tx);
        let err = sink.accept(&sample()).unwrap_err();
        assert_eq!(err.code(), "invalid.state");
    }

    #[test]
    fn test_open_sink_creates_parent_directories() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("readings.csv");

        let mut sink = open_sink(OutputFormat::Csv, Some(&path)).unwrap();
        sink.accept(&sample()).unwrap();
        sink.finish().unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("timestamp,sensor,range_mm,ambient,status"));
    }
}
