//! Cross-validation driver: runs a window of folds and writes the summary.

use std::ops::Range;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::backend::TrainingBackend;
use crate::domain::config::RunConfig;
use crate::domain::error::{Result, Stage, SurvfoldError};
use crate::fold_log::{read_last_result, LOG_FILE};
use crate::metrics::METRICS;
use crate::obs::{emit_cv_finished, emit_fold_skipped};
use crate::reporting::{write_summary, CvSummary, FoldOutcome, FoldSummary};
use crate::splits::SplitProvider;
use crate::trainer::FoldTrainer;

fn default_k() -> usize {
    5
}

/// Which folds of a k-fold scheme to run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CvOptions {
    #[serde(default = "default_k")]
    pub k: usize,
    /// First fold to run (default 0).
    #[serde(default)]
    pub k_start: Option<usize>,
    /// One past the last fold to run (default `k`).
    #[serde(default)]
    pub k_end: Option<usize>,
    /// Retrain folds that already have a logged result.
    #[serde(default)]
    pub overwrite: bool,
}

impl Default for CvOptions {
    fn default() -> Self {
        Self {
            k: default_k(),
            k_start: None,
            k_end: None,
            overwrite: false,
        }
    }
}

impl CvOptions {
    /// The half-open fold window, checked against `k`.
    pub fn folds(&self) -> Result<Range<usize>> {
        let start = self.k_start.unwrap_or(0);
        let end = self.k_end.unwrap_or(self.k);
        if self.k == 0 {
            return Err(SurvfoldError::InvalidConfig("k must be at least 1".to_string()));
        }
        if start >= end || end > self.k {
            return Err(SurvfoldError::InvalidConfig(format!(
                "fold window {start}..{end} is empty or outside 0..{}",
                self.k
            )));
        }
        Ok(start..end)
    }
}

/// Result already logged for `fold`, if any.
fn existing_result(config: &RunConfig, fold: usize) -> Result<Option<FoldSummary>> {
    let log = config.fold_dir(fold).join(LOG_FILE);
    Ok(read_last_result(&log)?.map(|best| FoldSummary::new(fold, best, FoldOutcome::Reused)))
}

/// Train every fold in the window and write the summary files.
///
/// Folds with a logged result are reused unless `overwrite` is set. The
/// first failing fold aborts the run.
pub fn run_cross_validation<B, P>(
    trainer: &mut FoldTrainer<B>,
    provider: &P,
    config: &RunConfig,
    options: &CvOptions,
) -> Result<CvSummary>
where
    B: TrainingBackend,
    P: SplitProvider + ?Sized,
{
    config.validate()?;
    let window = options.folds()?;
    std::fs::create_dir_all(&config.results_dir)
        .map_err(SurvfoldError::filesystem(&config.results_dir))?;

    let mut folds = Vec::with_capacity(window.len());
    for fold in window.clone() {
        if !options.overwrite {
            if let Some(done) = existing_result(config, fold)? {
                info!(fold, "Skipping fold with logged result");
                emit_fold_skipped(fold, done.val_cindex);
                folds.push(done);
                continue;
            }
        }

        let datasets = provider
            .load_fold(fold)
            .map_err(SurvfoldError::collaborator(Stage::LoadSplit))?;
        let (best, _report) = trainer.run_fold(&datasets, fold, config)?;
        folds.push(FoldSummary::new(fold, best, FoldOutcome::Trained));
    }

    let summary = CvSummary::new(
        config.model_type.clone(),
        config.digest()?,
        options.k,
        window,
        folds,
    );
    let (csv, json) = write_summary(&config.results_dir, &summary)?;
    info!(csv = ?csv, json = ?json, "summary written");
    emit_cv_finished(summary.folds.len(), summary.mean_cindex, summary.std_cindex);
    METRICS.flush();
    Ok(summary)
}

/// Rebuild the summary of a window from existing fold logs, without training.
///
/// Fails if any fold in the window has no logged result.
pub fn summarize_results(
    results_dir: &Path,
    model_type: &str,
    config_digest: &str,
    options: &CvOptions,
) -> Result<CvSummary> {
    let window = options.folds()?;
    let mut folds = Vec::with_capacity(window.len());
    for fold in window.clone() {
        let log = results_dir.join(fold.to_string()).join(LOG_FILE);
        let best = read_last_result(&log)?.ok_or_else(|| {
            SurvfoldError::InvalidConfig(format!("fold {fold} has no result in {:?}", log))
        })?;
        folds.push(FoldSummary::new(fold, best, FoldOutcome::Reused));
    }
    let summary = CvSummary::new(model_type, config_digest, options.k, window, folds);
    write_summary(results_dir, &summary)?;
    emit_cv_finished(summary.folds.len(), summary.mean_cindex, summary.std_cindex);
    Ok(summary)
}
