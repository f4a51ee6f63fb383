//! Cross-validation summary artifacts (`summary*.csv`, `summary*.json`).

use std::fs;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use uuid::Uuid;

use crate::domain::error::{Result, SurvfoldError};
use crate::domain::result::BestResult;

/// Schema version written into summary JSON.
pub const SUMMARY_SCHEMA_VERSION: &str = "1.0";

/// How a fold's result was obtained.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FoldOutcome {
    Trained,
    /// Reused from an existing fold log.
    Reused,
}

/// One fold row of the summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FoldSummary {
    pub fold: usize,
    pub val_cindex: f64,
    pub best_epoch: usize,
    pub outcome: FoldOutcome,
}

impl FoldSummary {
    pub fn new(fold: usize, best: BestResult, outcome: FoldOutcome) -> Self {
        Self {
            fold,
            val_cindex: best.c_index,
            best_epoch: best.epoch,
            outcome,
        }
    }
}

/// Summary of a window of cross-validation folds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CvSummary {
    pub schema_version: String,
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub model_type: String,
    pub config_digest: String,
    /// Total folds in the scheme.
    pub k: usize,
    pub k_start: usize,
    pub k_end: usize,
    pub folds: Vec<FoldSummary>,
    pub mean_cindex: f64,
    /// Sample standard deviation; 0 with fewer than two folds.
    pub std_cindex: f64,
}

impl CvSummary {
    pub fn new(
        model_type: impl Into<String>,
        config_digest: impl Into<String>,
        k: usize,
        window: Range<usize>,
        folds: Vec<FoldSummary>,
    ) -> Self {
        let scores: Vec<f64> = folds.iter().map(|f| f.val_cindex).collect();
        let (mean_cindex, std_cindex) = mean_std(&scores);
        Self {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            model_type: model_type.into(),
            config_digest: config_digest.into(),
            k,
            k_start: window.start,
            k_end: window.end,
            folds,
            mean_cindex,
            std_cindex,
        }
    }

    /// Whether the window covers every fold of the scheme.
    pub fn is_complete(&self) -> bool {
        self.k_start == 0 && self.k_end == self.k
    }

    /// File stem: `summary` for the full scheme, `summary_partial_<s>_<e>` otherwise.
    pub fn file_stem(&self) -> String {
        if self.is_complete() {
            "summary".to_string()
        } else {
            format!("summary_partial_{}_{}", self.k_start, self.k_end)
        }
    }

    pub fn csv_path(&self, results_dir: &Path) -> PathBuf {
        results_dir.join(format!("{}.csv", self.file_stem()))
    }

    pub fn json_path(&self, results_dir: &Path) -> PathBuf {
        results_dir.join(format!("{}.json", self.file_stem()))
    }
}

fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, 0.0);
    }
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// Write `folds,val_cindex` rows.
pub fn write_summary_csv(path: &Path, summary: &CvSummary) -> Result<()> {
    let mut w = csv::Writer::from_path(path).map_err(SurvfoldError::csv(path))?;
    w.write_record(["folds", "val_cindex"])
        .map_err(SurvfoldError::csv(path))?;
    for fold in &summary.folds {
        w.write_record([fold.fold.to_string(), format!("{:.4}", fold.val_cindex)])
            .map_err(SurvfoldError::csv(path))?;
    }
    w.flush().map_err(SurvfoldError::filesystem(path))
}

/// Write the summary as pretty JSON, atomically (temp file + rename).
pub fn write_summary_json(path: &Path, summary: &CvSummary) -> Result<()> {
    let content = serde_json::to_string_pretty(summary)?;
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(SurvfoldError::filesystem(dir))?;

    let mut tmp = NamedTempFile::new_in(dir).map_err(SurvfoldError::filesystem(dir))?;
    tmp.write_all(content.as_bytes())
        .map_err(SurvfoldError::filesystem(tmp.path()))?;
    tmp.persist(path)
        .map_err(|e| SurvfoldError::filesystem(path)(e.error))?;
    Ok(())
}

/// Write both summary files into `results_dir`; returns `(csv, json)` paths.
pub fn write_summary(results_dir: &Path, summary: &CvSummary) -> Result<(PathBuf, PathBuf)> {
    let csv = summary.csv_path(results_dir);
    let json = summary.json_path(results_dir);
    write_summary_csv(&csv, summary)?;
    write_summary_json(&json, summary)?;
    Ok((csv, json))
}
