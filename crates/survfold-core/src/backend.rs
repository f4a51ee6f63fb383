//! Collaborator interface between the fold trainer and a training framework.
//!
//! The trainer never touches tensors. Loss functions, model weights,
//! optimizer state and batching all live behind [`TrainingBackend`]; the
//! trainer only sequences the calls and keeps score.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::config::{DataMode, Device, RunConfig};
use crate::domain::dataset::SplitSet;
use crate::domain::model::ModelSpec;
use crate::sink::MetricsSink;

/// How a split is batched and sampled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoaderOptions {
    /// Shuffle (or weight-sample) between epochs.
    pub training: bool,
    /// Evaluation-only subset.
    pub testing: bool,
    /// Sample inversely to survival-bin frequency.
    pub weighted: bool,
    pub mode: DataMode,
    pub batch_size: usize,
}

impl LoaderOptions {
    /// Options for the train loader of a fold.
    pub fn train(config: &RunConfig) -> Self {
        Self {
            training: true,
            testing: false,
            weighted: config.weighted_sample,
            mode: config.mode,
            batch_size: config.batch_size,
        }
    }

    /// Options for the validation loader of a fold (no shuffling).
    pub fn validation(config: &RunConfig) -> Self {
        Self {
            training: false,
            testing: false,
            weighted: false,
            mode: config.mode,
            batch_size: config.batch_size,
        }
    }
}

/// Per-call context handed to the epoch step functions.
pub struct EpochContext<'a> {
    pub fold: usize,
    pub epoch: usize,
    pub config: &'a RunConfig,
    /// Present only when the fold was started with `log_data`.
    pub sink: Option<&'a mut dyn MetricsSink>,
}

impl EpochContext<'_> {
    /// Write a scalar if a sink is attached; a no-op otherwise.
    pub fn log_scalar(&mut self, tag: &str, value: f64) -> anyhow::Result<()> {
        match self.sink.as_mut() {
            Some(sink) => sink.add_scalar(tag, value, self.epoch),
            None => Ok(()),
        }
    }
}

/// Everything the fold trainer delegates to the training framework.
///
/// All methods are blocking. Errors are reported with `anyhow` and surface
/// from the trainer as collaborator failures, tagged with the stage.
pub trait TrainingBackend {
    type Loss;
    type Model;
    type Optimizer;
    type Loader;

    /// Build the survival loss named by the config.
    fn define_loss(&mut self, config: &RunConfig) -> anyhow::Result<Self::Loss>;

    /// Instantiate the variant described by `spec` on `device`.
    fn build_model(&mut self, spec: &ModelSpec, device: Device) -> anyhow::Result<Self::Model>;

    /// Bind an optimizer to the model's trainable parameters.
    fn get_optim(
        &mut self,
        model: &mut Self::Model,
        config: &RunConfig,
    ) -> anyhow::Result<Self::Optimizer>;

    fn get_split_loader(
        &mut self,
        split: &SplitSet,
        options: &LoaderOptions,
    ) -> anyhow::Result<Self::Loader>;

    /// One pass over the train loader, updating the model in place.
    fn train_epoch(
        &mut self,
        ctx: &mut EpochContext<'_>,
        loader: &mut Self::Loader,
        model: &mut Self::Model,
        loss: &Self::Loss,
        optimizer: &mut Self::Optimizer,
    ) -> anyhow::Result<()>;

    /// Evaluate on the validation loader and return its concordance index.
    fn validate_epoch(
        &mut self,
        ctx: &mut EpochContext<'_>,
        loader: &mut Self::Loader,
        model: &mut Self::Model,
        loss: &Self::Loss,
    ) -> anyhow::Result<f64>;

    /// Persist model weights. Only called when `save_checkpoint` is enabled.
    fn save_checkpoint(&mut self, model: &Self::Model, path: &Path) -> anyhow::Result<()>;
}
