//! Run configuration shared by every fold of a cross-validation run.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

use crate::domain::error::{Result, SurvfoldError};

/// Strategy used to combine modality embeddings before the classifier head.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Fusion {
    Concat,
    Bilinear,
}

/// Which inputs the data loaders hand to the model.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DataMode {
    Omic,
    Path,
    Pathomic,
    Cluster,
    Graph,
    #[default]
    Coattn,
}

impl DataMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataMode::Omic => "omic",
            DataMode::Path => "path",
            DataMode::Pathomic => "pathomic",
            DataMode::Cluster => "cluster",
            DataMode::Graph => "graph",
            DataMode::Coattn => "coattn",
        }
    }
}

impl fmt::Display for DataMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Edge aggregation used by the graph-mixer message passing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EdgeAgg {
    Spatial,
    Latent,
}

/// Survival loss selected for the fold.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LossKind {
    CeSurv,
    #[default]
    NllSurv,
    CoxSurv,
}

/// Optimizer family requested from the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

/// Compute device a fold's model is placed on.
///
/// Chosen once per process and handed to the trainer explicitly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    #[default]
    Cpu,
    Cuda(usize),
}

impl Device {
    /// First accelerator when one is available, otherwise the CPU.
    pub fn select(accelerator_available: bool) -> Self {
        if accelerator_available {
            Device::Cuda(0)
        } else {
            Device::Cpu
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda(idx) => write!(f, "cuda:{}", idx),
        }
    }
}

impl FromStr for Device {
    type Err = SurvfoldError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "cpu" => Ok(Device::Cpu),
            "cuda" => Ok(Device::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|idx| idx.parse().ok())
                .map(Device::Cuda)
                .ok_or_else(|| SurvfoldError::InvalidConfig(format!("unknown device {other:?}"))),
        }
    }
}

/// Accept `"None"` (and JSON null) as "no fusion".
fn fusion_or_none<'de, D>(deserializer: D) -> std::result::Result<Option<Fusion>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("None") => Ok(None),
        Some("concat") => Ok(Some(Fusion::Concat)),
        Some("bilinear") => Ok(Some(Fusion::Bilinear)),
        Some(other) => Err(serde::de::Error::unknown_variant(
            other,
            &["concat", "bilinear", "None"],
        )),
    }
}

fn default_drop_out() -> f64 {
    0.25
}

fn default_n_classes() -> usize {
    4
}

fn default_batch_size() -> usize {
    1
}

fn default_max_epochs() -> usize {
    20
}

fn default_lr() -> f64 {
    2e-4
}

fn default_reg() -> f64 {
    1e-5
}

fn default_gc() -> usize {
    32
}

/// Immutable options for a cross-validation run.
///
/// Every fold reads the same configuration; nothing in the trainer mutates it.
/// Unknown keys are rejected, so a misspelled option fails to load instead of
/// silently keeping its default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Root directory for fold outputs, split files and summaries.
    pub results_dir: PathBuf,

    /// Open a metrics sink inside each fold directory.
    #[serde(default)]
    pub log_data: bool,

    #[serde(default = "default_drop_out")]
    pub drop_out: f64,

    /// Number of discretised survival bins.
    #[serde(default = "default_n_classes")]
    pub n_classes: usize,

    #[serde(default, deserialize_with = "fusion_or_none")]
    pub fusion: Option<Fusion>,

    /// Model tag, resolved through the model registry when a fold starts.
    pub model_type: String,

    /// Per-modality omic feature group sizes.
    #[serde(default)]
    pub omic_sizes: Option<Vec<usize>>,

    #[serde(default)]
    pub ot_reg: Option<f64>,

    #[serde(default)]
    pub ot_tau: Option<f64>,

    #[serde(default)]
    pub ot_impl: Option<String>,

    #[serde(default)]
    pub num_gcn_layers: Option<usize>,

    #[serde(default)]
    pub edge_agg: Option<EdgeAgg>,

    #[serde(default)]
    pub resample: bool,

    /// Histology feature dimensionality fed to the graph-mixer.
    #[serde(default)]
    pub input_dim: Option<usize>,

    #[serde(default)]
    pub weighted_sample: bool,

    #[serde(default)]
    pub mode: DataMode,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default)]
    pub start_epoch: usize,

    #[serde(default = "default_max_epochs")]
    pub max_epochs: usize,

    #[serde(default)]
    pub bag_loss: LossKind,

    #[serde(default)]
    pub alpha_surv: f64,

    #[serde(default)]
    pub opt: OptimizerKind,

    #[serde(default = "default_lr")]
    pub lr: f64,

    #[serde(default = "default_reg")]
    pub reg: f64,

    /// Gradient accumulation steps.
    #[serde(default = "default_gc")]
    pub gc: usize,

    /// Persist a checkpoint whenever validation improves.
    #[serde(default)]
    pub save_checkpoint: bool,

    /// Variant-specific hyperparameters (read by `pgbf`), kept under their own key.
    #[serde(default)]
    pub model_args: BTreeMap<String, serde_json::Value>,
}

impl RunConfig {
    /// Config with defaults for everything except the output root and model tag.
    pub fn new(results_dir: impl Into<PathBuf>, model_type: impl Into<String>) -> Self {
        Self {
            results_dir: results_dir.into(),
            log_data: false,
            drop_out: default_drop_out(),
            n_classes: default_n_classes(),
            fusion: None,
            model_type: model_type.into(),
            omic_sizes: None,
            ot_reg: None,
            ot_tau: None,
            ot_impl: None,
            num_gcn_layers: None,
            edge_agg: None,
            resample: false,
            input_dim: None,
            weighted_sample: false,
            mode: DataMode::default(),
            batch_size: default_batch_size(),
            start_epoch: 0,
            max_epochs: default_max_epochs(),
            bag_loss: LossKind::default(),
            alpha_surv: 0.0,
            opt: OptimizerKind::default(),
            lr: default_lr(),
            reg: default_reg(),
            gc: default_gc(),
            save_checkpoint: false,
            model_args: BTreeMap::new(),
        }
    }

    /// Read and validate a JSON config file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(SurvfoldError::filesystem(path))?;
        let config: RunConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject option combinations no fold could run with.
    ///
    /// The model tag itself is resolved later, when the fold builds its model.
    pub fn validate(&self) -> Result<()> {
        if self.model_type.trim().is_empty() {
            return Err(SurvfoldError::InvalidConfig(
                "model_type must not be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(SurvfoldError::InvalidConfig(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.n_classes == 0 {
            return Err(SurvfoldError::InvalidConfig(
                "n_classes must be at least 1".to_string(),
            ));
        }
        if let Some(key) = self.model_args.keys().find(|k| k.trim().is_empty()) {
            return Err(SurvfoldError::InvalidConfig(format!(
                "model_args key {key:?} must not be blank"
            )));
        }
        if self.start_epoch > self.max_epochs {
            return Err(SurvfoldError::InvalidConfig(format!(
                "start_epoch {} is past max_epochs {}",
                self.start_epoch, self.max_epochs
            )));
        }
        let numeric = [
            ("drop_out", Some(self.drop_out)),
            ("alpha_surv", Some(self.alpha_surv)),
            ("lr", Some(self.lr)),
            ("reg", Some(self.reg)),
            ("ot_reg", self.ot_reg),
            ("ot_tau", self.ot_tau),
        ];
        for (name, value) in numeric {
            if let Some(v) = value {
                if !v.is_finite() {
                    return Err(SurvfoldError::InvalidConfig(format!(
                        "{name} must be finite, got {v}"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Epochs the fold loop visits.
    pub fn epochs(&self) -> Range<usize> {
        self.start_epoch..self.max_epochs
    }

    /// Per-fold output directory.
    pub fn fold_dir(&self, fold: usize) -> PathBuf {
        self.results_dir.join(fold.to_string())
    }

    /// CSV holding the sample identifiers of a fold's train/val splits.
    pub fn splits_path(&self, fold: usize) -> PathBuf {
        self.results_dir.join(format!("splits_{}.csv", fold))
    }

    /// Best-model checkpoint location for a fold.
    pub fn checkpoint_path(&self, fold: usize) -> PathBuf {
        self.results_dir.join(format!("s_{}_checkpoint.pt", fold))
    }

    /// SHA-256 hex digest of the config's canonical JSON form.
    pub fn digest(&self) -> Result<String> {
        // serde_json::Value objects are BTreeMap-backed, so keys come out sorted.
        let value = serde_json::to_value(self)?;
        let canonical = serde_json::to_string(&value)?;
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}
