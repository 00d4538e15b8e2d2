use anyhow::Context;
use serde::{Deserialize, Serialize};

use std::collections::BTreeMap;
use std::fmt::{self, Debug};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

/// Metrics of one finished epoch, keyed by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EpochRecord {
    pub epoch: u32,
    pub metrics: BTreeMap<String, f32>,
}

impl EpochRecord {
    pub fn new(epoch: u32) -> Self {
        Self {
            epoch,
            metrics: BTreeMap::new(),
        }
    }

    pub fn insert<S: Into<String>>(&mut self, name: S, value: f32) {
        self.metrics.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.metrics.get(name).copied()
    }
}

impl fmt::Display for EpochRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, value) in &self.metrics {
            if !first {
                f.write_str(" - ")?;
            }
            write!(f, "{}: {:.4e}", name, value)?;
            first = false;
        }
        Ok(())
    }
}

/// Receives progress from the training loops at the end of every batch and epoch.
pub trait Logger: Debug {
    fn batch_loss(&mut self, epoch: u32, batch: u32, loss: f32);

    fn epoch(&mut self, record: &EpochRecord);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MockLogger;

impl Logger for MockLogger {
    fn batch_loss(&mut self, _epoch: u32, _batch: u32, _loss: f32) {}

    fn epoch(&mut self, _record: &EpochRecord) {}
}

/// Reports the progress of every batch and epoch through the `log` facade at info level.
#[derive(Debug, Clone)]
pub struct ProgressLogger {
    epochs: u32,
    steps: usize,
}

impl ProgressLogger {
    pub fn new(epochs: u32, steps: usize) -> Self {
        Self { epochs, steps }
    }
}

impl Logger for ProgressLogger {
    fn batch_loss(&mut self, epoch: u32, batch: u32, loss: f32) {
        log::info!(
            "Epoch {}/{} batch {}/{} loss {:e}",
            epoch + 1,
            self.epochs,
            batch + 1,
            self.steps,
            loss
        );
    }

    fn epoch(&mut self, record: &EpochRecord) {
        log::info!("Epoch {}/{} {}", record.epoch + 1, self.epochs, record);
    }
}

/// Every epoch's metrics, as one series per metric name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    metrics: BTreeMap<String, Vec<f32>>,
}

impl History {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn push(&mut self, record: &EpochRecord) {
        for (name, value) in &record.metrics {
            self.metrics.entry(name.clone()).or_default().push(*value);
        }
    }

    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.metrics.get(name).map(Vec::as_slice)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.metrics.keys().map(String::as_str)
    }

    /// Number of recorded epochs.
    pub fn len(&self) -> usize {
        self.metrics.values().map(Vec::len).max().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Writes the history as JSON, creating the parent directory if needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        }
        let file = File::create(path)
            .with_context(|| format!("Failed to create history file {}", path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open history file {}", path.display()))?;
        Ok(serde_json::from_reader(BufReader::new(file))?)
    }
}

impl Extend<EpochRecord> for History {
    fn extend<T: IntoIterator<Item = EpochRecord>>(&mut self, iter: T) {
        for record in iter {
            self.push(&record);
        }
    }
}
