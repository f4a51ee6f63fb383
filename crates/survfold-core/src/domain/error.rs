//! Domain-level error taxonomy for survfold.

use std::fmt;
use std::path::PathBuf;

/// Collaborator boundary at which a backend call failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DefineLoss,
    BuildModel,
    BuildOptimizer,
    BuildLoader,
    TrainEpoch,
    ValidateEpoch,
    SaveCheckpoint,
    OpenSink,
    CloseSink,
    LoadSplit,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::DefineLoss => "define_loss",
            Stage::BuildModel => "build_model",
            Stage::BuildOptimizer => "get_optim",
            Stage::BuildLoader => "get_split_loader",
            Stage::TrainEpoch => "train_epoch",
            Stage::ValidateEpoch => "validate_epoch",
            Stage::SaveCheckpoint => "save_checkpoint",
            Stage::OpenSink => "open_sink",
            Stage::CloseSink => "close_sink",
            Stage::LoadSplit => "load_fold",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// survfold domain errors.
#[derive(Debug, thiserror::Error)]
pub enum SurvfoldError {
    #[error("unsupported model type: {0:?}")]
    UnsupportedModelType(String),

    #[error("model {model} requires config field {field}")]
    MissingConfigField {
        model: &'static str,
        field: &'static str,
    },

    #[error("invalid run config: {0}")]
    InvalidConfig(String),

    #[error("collaborator {stage} failed: {source}")]
    Collaborator {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },

    #[error("filesystem error at {path:?}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error at {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed fold log {path:?}: {line:?}")]
    MalformedLog { path: PathBuf, line: String },

    #[error("malformed splits file {path:?}: {reason}")]
    MalformedSplits { path: PathBuf, reason: String },

    #[error("split {split} references unknown sample {case_id}")]
    UnknownSample { split: String, case_id: String },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SurvfoldError {
    /// Wrap a collaborator failure with the stage it happened in.
    pub fn collaborator(stage: Stage) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| SurvfoldError::Collaborator { stage, source }
    }

    /// Wrap an io error with the path it concerns.
    pub fn filesystem(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| SurvfoldError::Filesystem { path, source }
    }

    /// Wrap a csv read/write error with the file it concerns.
    pub fn csv(path: impl Into<PathBuf>) -> impl FnOnce(csv::Error) -> Self {
        let path = path.into();
        move |source| SurvfoldError::Csv { path, source }
    }
}

/// Result type for survfold domain operations.
pub type Result<T> = std::result::Result<T, SurvfoldError>;
