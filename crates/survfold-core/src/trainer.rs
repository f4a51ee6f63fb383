//! Single-fold training orchestration.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::backend::{EpochContext, LoaderOptions, TrainingBackend};
use crate::domain::config::{Device, RunConfig};
use crate::domain::dataset::FoldDatasets;
use crate::domain::error::{Result, Stage, SurvfoldError};
use crate::domain::model::ModelKind;
use crate::domain::result::{BestResult, FoldReport};
use crate::fold_log::{append_fold_result, LOG_FILE};
use crate::metrics::{Counter, METRICS};
use crate::obs::{
    emit_best_improved, emit_epoch_completed, emit_fold_failed, emit_fold_finished,
    emit_fold_started, FoldSpan,
};
use crate::sink::{JsonlSinkFactory, SinkFactory, SinkGuard};
use crate::splits::{save_splits, SPLIT_COLUMNS};

/// Runs cross-validation folds against a training backend.
///
/// The compute device is fixed when the trainer is built and reused by
/// every fold it runs.
pub struct FoldTrainer<B: TrainingBackend> {
    backend: B,
    device: Device,
    sink_factory: Box<dyn SinkFactory>,
}

impl<B: TrainingBackend> FoldTrainer<B> {
    /// Trainer writing metrics (when enabled) as JSONL scalars.
    pub fn new(backend: B, device: Device) -> Self {
        Self {
            backend,
            device,
            sink_factory: Box::new(JsonlSinkFactory::default()),
        }
    }

    /// Replace the factory used to open per-fold metrics sinks.
    pub fn with_sink_factory(mut self, factory: Box<dyn SinkFactory>) -> Self {
        self.sink_factory = factory;
        self
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Train one fold end-to-end and return its best validation result.
    ///
    /// Writes `results_dir/<fold>/`, `results_dir/splits_<fold>.csv` and
    /// appends one line to `results_dir/<fold>/log.txt`. The config is
    /// validated before anything touches the filesystem or the backend. Any
    /// failure aborts the fold; the metrics sink, if opened, is closed either way.
    pub fn run_fold(
        &mut self,
        datasets: &FoldDatasets,
        fold: usize,
        config: &RunConfig,
    ) -> Result<(BestResult, FoldReport)> {
        let _span = FoldSpan::enter(fold, &config.model_type);
        let result = self.run_fold_inner(datasets, fold, config);
        if let Err(e) = &result {
            emit_fold_failed(fold, e);
        }
        result
    }

    fn run_fold_inner(
        &mut self,
        datasets: &FoldDatasets,
        fold: usize,
        config: &RunConfig,
    ) -> Result<(BestResult, FoldReport)> {
        config.validate()?;
        let start = Instant::now();
        info!(fold, "Training fold");

        let writer_dir = config.fold_dir(fold);
        std::fs::create_dir_all(&writer_dir).map_err(SurvfoldError::filesystem(&writer_dir))?;

        let mut sink =
            SinkGuard::acquire(config.log_data, self.sink_factory.as_ref(), &writer_dir)?;

        save_splits(datasets, &SPLIT_COLUMNS, &config.splits_path(fold))?;
        emit_fold_started(fold, datasets.train.len(), datasets.val.len());

        let loss = self
            .backend
            .define_loss(config)
            .map_err(SurvfoldError::collaborator(Stage::DefineLoss))?;
        debug!(bag_loss = ?config.bag_loss, "loss ready");

        let kind = ModelKind::resolve(&config.model_type)?;
        let spec = kind.spec(config, datasets)?;
        let mut model = self
            .backend
            .build_model(&spec, self.device)
            .map_err(SurvfoldError::collaborator(Stage::BuildModel))?;
        debug!(model_type = %kind, device = %self.device, "model ready");

        let mut optimizer = self
            .backend
            .get_optim(&mut model, config)
            .map_err(SurvfoldError::collaborator(Stage::BuildOptimizer))?;
        debug!(opt = ?config.opt, lr = config.lr, "optimizer ready");

        let mut train_loader = self
            .backend
            .get_split_loader(&datasets.train, &LoaderOptions::train(config))
            .map_err(SurvfoldError::collaborator(Stage::BuildLoader))?;
        let mut val_loader = self
            .backend
            .get_split_loader(&datasets.val, &LoaderOptions::validation(config))
            .map_err(SurvfoldError::collaborator(Stage::BuildLoader))?;

        info!(model_type = %kind, mode = %config.mode, "running");

        let mut best = BestResult::default();
        for epoch in config.epochs() {
            let mut ctx = EpochContext {
                fold,
                epoch,
                config,
                sink: sink.sink(),
            };
            self.backend
                .train_epoch(&mut ctx, &mut train_loader, &mut model, &loss, &mut optimizer)
                .map_err(SurvfoldError::collaborator(Stage::TrainEpoch))?;

            let mut ctx = EpochContext {
                fold,
                epoch,
                config,
                sink: sink.sink(),
            };
            let c_index = self
                .backend
                .validate_epoch(&mut ctx, &mut val_loader, &mut model, &loss)
                .map_err(SurvfoldError::collaborator(Stage::ValidateEpoch))?;

            METRICS.inc(Counter::EpochsRun);
            emit_epoch_completed(fold, epoch, c_index);
            if !(0.0..=1.0).contains(&c_index) {
                warn!(epoch, c_index, "validation c-index outside [0, 1]");
            }

            if best.observe(epoch, c_index) {
                emit_best_improved(fold, epoch, c_index);
                if config.save_checkpoint {
                    let path = config.checkpoint_path(fold);
                    self.backend
                        .save_checkpoint(&model, &path)
                        .map_err(SurvfoldError::collaborator(Stage::SaveCheckpoint))?;
                    METRICS.inc(Counter::CheckpointsSaved);
                    debug!(path = ?path, "checkpoint saved");
                }
            }
        }

        sink.release()?;

        info!(fold, c_index = %format!("{:.4}", best.c_index), "summary of fold");
        append_fold_result(&writer_dir.join(LOG_FILE), &best)?;

        METRICS.inc(Counter::FoldsCompleted);
        emit_fold_finished(
            fold,
            best.c_index,
            best.epoch,
            start.elapsed().as_millis() as u64,
        );
        Ok((best, FoldReport::new(fold, best)))
    }
}
