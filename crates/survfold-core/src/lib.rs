//! survfold core library
//!
//! Orchestrates cross-validated training of multimodal survival models.
//! Numerics live behind [`TrainingBackend`]; this crate owns fold setup,
//! model-variant resolution, the epoch loop, best-result tracking and the
//! files each fold leaves behind.

pub mod backend;
pub mod cross_validation;
pub mod domain;
pub mod fold_log;
pub mod metrics;
pub mod obs;
pub mod reporting;
pub mod sink;
pub mod splits;
pub mod telemetry;
pub mod trainer;

pub use backend::{EpochContext, LoaderOptions, TrainingBackend};

pub use domain::{
    supported_tags, BestResult, Cohort, ConfigField, DataMode, Device, EdgeAgg, FoldDatasets,
    FoldReport, Fusion, GraphMixerArgs, LossKind, McatArgs, ModelKind, ModelSpec, MotcatArgs,
    OptimizerKind, PgbfArgs, Result, RunConfig, Sample, SplitSet, Stage, SurvfoldError,
    MODEL_REGISTRY,
};

pub use cross_validation::{run_cross_validation, summarize_results, CvOptions};
pub use fold_log::{append_fold_result, format_result_line, read_last_result, LOG_FILE};
pub use reporting::{write_summary, CvSummary, FoldOutcome, FoldSummary};
pub use sink::{
    JsonlSink, JsonlSinkFactory, MetricsSink, ScalarRecord, SinkFactory, SinkGuard,
    DEFAULT_FLUSH_INTERVAL, SCALARS_FILE,
};
pub use splits::{load_splits, save_splits, CsvSplitProvider, SplitProvider, SPLIT_COLUMNS};
pub use trainer::FoldTrainer;

pub use metrics::{Counter, Metrics, MetricsSnapshot, METRICS};
pub use obs::{
    emit_best_improved, emit_cv_finished, emit_epoch_completed, emit_fold_failed,
    emit_fold_finished, emit_fold_skipped, emit_fold_started, FoldSpan,
};
pub use telemetry::init_tracing;

/// survfold version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
