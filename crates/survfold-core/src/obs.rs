//! Lifecycle events for folds and cross-validation windows.
//!
//! Every event carries an `event` field (`fold.started`, `fold.finished`, ...)
//! so log processors can key on it regardless of the message text.

use tracing::info;

/// Keeps the `survfold.fold` span entered until dropped.
///
/// Events emitted while the guard lives inherit its `fold` and `model_type`
/// fields.
///
/// # Example
///
/// ```ignore
/// let _span = FoldSpan::enter(2, "mcat");
/// emit_epoch_completed(2, 0, 0.61);
/// // logs: survfold.fold{fold=2 model_type=mcat}: event=fold.epoch_completed ...
/// ```
pub struct FoldSpan {
    _span: tracing::span::EnteredSpan,
}

impl FoldSpan {
    /// Create and enter a span tagged with the fold number and model tag.
    pub fn enter(fold: usize, model_type: &str) -> Self {
        let span = tracing::info_span!("survfold.fold", fold = fold, model_type = %model_type);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: fold started with split sizes.
///
/// * `train_samples` - cases in the training split
/// * `val_samples` - cases in the validation split
///
/// # Example
///
/// ```ignore
/// emit_fold_started(0, 412, 103);
/// // logs: event=fold.started fold=0 train_samples=412 val_samples=103
/// ```
pub fn emit_fold_started(fold: usize, train_samples: usize, val_samples: usize) {
    info!(
        event = "fold.started",
        fold = fold,
        train_samples = train_samples,
        val_samples = val_samples,
    );
}

/// Emit event: one train/validate epoch finished.
pub fn emit_epoch_completed(fold: usize, epoch: usize, c_index: f64) {
    info!(event = "fold.epoch_completed", fold = fold, epoch = epoch, c_index = c_index);
}

/// Emit event: validation concordance improved on the running best.
pub fn emit_best_improved(fold: usize, epoch: usize, c_index: f64) {
    info!(event = "fold.best_improved", fold = fold, epoch = epoch, c_index = c_index);
}

/// Emit event: fold finished with its best result.
///
/// * `c_index` - best validation concordance over the epoch window
/// * `epoch` - epoch that produced it
/// * `duration_ms` - wall time of the whole fold, splits and sink included
pub fn emit_fold_finished(fold: usize, c_index: f64, epoch: usize, duration_ms: u64) {
    info!(
        event = "fold.finished",
        fold = fold,
        c_index = c_index,
        epoch = epoch,
        duration_ms = duration_ms,
    );
}

/// Emit event: fold skipped because a result was already logged.
pub fn emit_fold_skipped(fold: usize, c_index: f64) {
    info!(event = "fold.skipped", fold = fold, c_index = c_index);
}

/// Emit event: cross-validation window finished.
pub fn emit_cv_finished(folds: usize, mean_c_index: f64, std_c_index: f64) {
    info!(
        event = "cv.finished",
        folds = folds,
        mean_c_index = mean_c_index,
        std_c_index = std_c_index,
    );
}

/// Emit event: fold aborted (warning level).
///
/// # Example
///
/// ```ignore
/// emit_fold_failed(3, &SurvfoldError::UnsupportedModelType("amil".into()));
/// // logs: WARN event=fold.failed fold=3 error=unsupported model type: "amil"
/// ```
pub fn emit_fold_failed(fold: usize, error: &dyn std::fmt::Display) {
    tracing::warn!(event = "fold.failed", fold = fold, error = %error);
}
