//! Optional per-fold metrics sink.
//!
//! Step functions write scalar series (losses, c-index) through a
//! [`MetricsSink`]. A fold only opens one when `log_data` is set, and holds it
//! in a [`SinkGuard`] so it is closed on every exit path.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::error::{Result, Stage, SurvfoldError};

/// Interval after which buffered scalars are pushed to disk.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(15);

/// File the default sink writes inside the fold directory.
pub const SCALARS_FILE: &str = "scalars.jsonl";

/// Destination for scalar training metrics.
pub trait MetricsSink {
    /// Record one value of the series `tag` at `step`.
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> anyhow::Result<()>;

    /// Push buffered records to their destination.
    fn flush(&mut self) -> anyhow::Result<()>;

    /// Flush and release the destination. Further writes are errors.
    fn close(&mut self) -> anyhow::Result<()>;
}

/// Opens a sink bound to a fold directory.
pub trait SinkFactory {
    fn open(&self, dir: &Path) -> anyhow::Result<Box<dyn MetricsSink>>;
}

/// One line of `scalars.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScalarRecord {
    pub tag: String,
    pub value: f64,
    pub step: usize,
    /// Seconds since the Unix epoch.
    pub wall_time: f64,
}

/// Newline-delimited JSON scalar writer with interval-based flushing.
pub struct JsonlSink {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
    flush_interval: Duration,
    last_flush: Instant,
}

impl JsonlSink {
    /// Open (append) `<dir>/scalars.jsonl`.
    pub fn create(dir: &Path, flush_interval: Duration) -> anyhow::Result<Self> {
        let path = dir.join(SCALARS_FILE);
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("open metrics sink {:?}", path))?;
        Ok(Self {
            path,
            writer: Some(BufWriter::new(file)),
            flush_interval,
            last_flush: Instant::now(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl MetricsSink for JsonlSink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> anyhow::Result<()> {
        let writer = self
            .writer
            .as_mut()
            .with_context(|| format!("metrics sink {:?} already closed", self.path))?;
        let record = ScalarRecord {
            tag: tag.to_string(),
            value,
            step,
            wall_time: Utc::now().timestamp_millis() as f64 / 1000.0,
        };
        serde_json::to_writer(&mut *writer, &record).context("serialize scalar record")?;
        writer.write_all(b"\n")?;

        if self.last_flush.elapsed() >= self.flush_interval {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer
                .flush()
                .with_context(|| format!("flush metrics sink {:?}", self.path))?;
        }
        self.last_flush = Instant::now();
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer
                .flush()
                .with_context(|| format!("close metrics sink {:?}", self.path))?;
        }
        Ok(())
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(path = ?self.path, error = %e, "metrics sink close failed on drop");
        }
    }
}

/// Factory for [`JsonlSink`].
#[derive(Debug, Clone)]
pub struct JsonlSinkFactory {
    pub flush_interval: Duration,
}

impl Default for JsonlSinkFactory {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
        }
    }
}

impl SinkFactory for JsonlSinkFactory {
    fn open(&self, dir: &Path) -> anyhow::Result<Box<dyn MetricsSink>> {
        Ok(Box::new(JsonlSink::create(dir, self.flush_interval)?))
    }
}

/// Scoped ownership of an optional sink.
///
/// The sink is closed by [`SinkGuard::release`] on the normal path, or by
/// `Drop` when the fold aborts early.
pub struct SinkGuard {
    sink: Option<Box<dyn MetricsSink>>,
}

impl SinkGuard {
    /// Open a sink through `factory` only when `enabled`.
    pub fn acquire(enabled: bool, factory: &dyn SinkFactory, dir: &Path) -> Result<Self> {
        if !enabled {
            return Ok(Self { sink: None });
        }
        let sink = factory
            .open(dir)
            .map_err(SurvfoldError::collaborator(Stage::OpenSink))?;
        debug!(dir = ?dir, "metrics sink opened");
        Ok(Self { sink: Some(sink) })
    }

    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    /// Borrow the sink for one step call.
    pub fn sink(&mut self) -> Option<&mut dyn MetricsSink> {
        self.sink.as_mut().map(|s| s.as_mut() as &mut dyn MetricsSink)
    }

    /// Close the sink, surfacing close errors.
    pub fn release(mut self) -> Result<()> {
        match self.sink.take() {
            Some(mut sink) => sink
                .close()
                .map_err(SurvfoldError::collaborator(Stage::CloseSink)),
            None => Ok(()),
        }
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.close() {
                warn!(error = %e, "metrics sink close failed during abort");
            }
        }
    }
}
