//! Domain models for survfold.
//!
//! What a fold consumes and produces:
//! - `RunConfig`: Immutable options shared by every fold
//! - `FoldDatasets`: The train/validation split pair of one fold
//! - `ModelKind` / `ModelSpec`: Registered architectures and their constructor arguments
//! - `BestResult` / `FoldReport`: What a fold returns

pub mod config;
pub mod dataset;
pub mod error;
pub mod model;
pub mod result;

pub use config::{DataMode, Device, EdgeAgg, Fusion, LossKind, OptimizerKind, RunConfig};
pub use dataset::{Cohort, FoldDatasets, Sample, SplitSet};
pub use error::{Result, Stage, SurvfoldError};
pub use model::{
    supported_tags, ConfigField, GraphMixerArgs, McatArgs, ModelKind, ModelSpec, MotcatArgs,
    PgbfArgs, MODEL_REGISTRY,
};
pub use result::{BestResult, FoldReport};
