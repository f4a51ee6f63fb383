//! Model variants and the tag registry that resolves them.
//!
//! A fold names its architecture with a string tag (`RunConfig::model_type`).
//! The tag is looked up in [`MODEL_REGISTRY`]; each entry lists the config
//! fields the variant needs and how to assemble its constructor arguments.
//! Adding a variant means adding a [`ModelKind`], a [`ModelSpec`] arm and a
//! registry entry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::config::{EdgeAgg, Fusion, RunConfig};
use crate::domain::dataset::FoldDatasets;
use crate::domain::error::{Result, SurvfoldError};

/// Closed set of supported survival architectures.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Multimodal co-attention transformer.
    Mcat,
    /// Optimal-transport co-attention.
    Motcat,
    /// Graph-based feature mixer.
    #[serde(rename = "graphmixer")]
    GraphMixer,
    /// Prototype-guided bilateral fusion.
    Pgbf,
}

impl ModelKind {
    pub fn tag(&self) -> &'static str {
        self.entry().tag
    }

    fn entry(&self) -> &'static ModelEntry {
        MODEL_REGISTRY
            .iter()
            .find(|e| e.kind == *self)
            .unwrap_or_else(|| unreachable!("every ModelKind has a registry entry"))
    }

    /// Look a tag up in the registry.
    pub fn resolve(tag: &str) -> Result<Self> {
        MODEL_REGISTRY
            .iter()
            .find(|e| e.tag == tag)
            .map(|e| e.kind)
            .ok_or_else(|| SurvfoldError::UnsupportedModelType(tag.to_string()))
    }

    /// Config fields this variant cannot be built without.
    pub fn required_fields(&self) -> &'static [ConfigField] {
        self.entry().required
    }

    /// Check required fields, then assemble the constructor arguments.
    pub fn spec(&self, config: &RunConfig, datasets: &FoldDatasets) -> Result<ModelSpec> {
        let entry = self.entry();
        for field in entry.required {
            if !field.is_set(config, datasets) {
                return Err(SurvfoldError::MissingConfigField {
                    model: entry.tag,
                    field: field.name(),
                });
            }
        }
        (entry.build)(config, datasets)
    }
}

impl FromStr for ModelKind {
    type Err = SurvfoldError;

    fn from_str(s: &str) -> Result<Self> {
        ModelKind::resolve(s)
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Optional inputs a variant may require.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    OmicSizes,
    OtReg,
    OtTau,
    OtImpl,
    NumGcnLayers,
    EdgeAgg,
    InputDim,
    /// Omic group sizes carried by the train split rather than the config.
    TrainOmicSizes,
}

impl ConfigField {
    pub fn name(&self) -> &'static str {
        match self {
            ConfigField::OmicSizes => "omic_sizes",
            ConfigField::OtReg => "ot_reg",
            ConfigField::OtTau => "ot_tau",
            ConfigField::OtImpl => "ot_impl",
            ConfigField::NumGcnLayers => "num_gcn_layers",
            ConfigField::EdgeAgg => "edge_agg",
            ConfigField::InputDim => "input_dim",
            ConfigField::TrainOmicSizes => "train.omic_sizes",
        }
    }

    fn is_set(&self, config: &RunConfig, datasets: &FoldDatasets) -> bool {
        match self {
            ConfigField::OmicSizes => config.omic_sizes.as_ref().is_some_and(|s| !s.is_empty()),
            ConfigField::OtReg => config.ot_reg.is_some(),
            ConfigField::OtTau => config.ot_tau.is_some(),
            ConfigField::OtImpl => config.ot_impl.as_deref().is_some_and(|s| !s.is_empty()),
            ConfigField::NumGcnLayers => config.num_gcn_layers.is_some(),
            ConfigField::EdgeAgg => config.edge_agg.is_some(),
            ConfigField::InputDim => config.input_dim.is_some(),
            ConfigField::TrainOmicSizes => !datasets.train.omic_sizes.is_empty(),
        }
    }
}

/// One registered variant.
pub struct ModelEntry {
    pub kind: ModelKind,
    pub tag: &'static str,
    pub required: &'static [ConfigField],
    build: fn(&RunConfig, &FoldDatasets) -> Result<ModelSpec>,
}

/// Tag -> (required fields, argument builder).
pub static MODEL_REGISTRY: [ModelEntry; 4] = [
    ModelEntry {
        kind: ModelKind::Mcat,
        tag: "mcat",
        required: &[ConfigField::OmicSizes],
        build: build_mcat,
    },
    ModelEntry {
        kind: ModelKind::Motcat,
        tag: "motcat",
        required: &[
            ConfigField::OtReg,
            ConfigField::OtTau,
            ConfigField::OtImpl,
            ConfigField::OmicSizes,
        ],
        build: build_motcat,
    },
    ModelEntry {
        kind: ModelKind::GraphMixer,
        tag: "graphmixer",
        required: &[
            ConfigField::NumGcnLayers,
            ConfigField::EdgeAgg,
            ConfigField::InputDim,
            ConfigField::TrainOmicSizes,
        ],
        build: build_graph_mixer,
    },
    ModelEntry {
        kind: ModelKind::Pgbf,
        tag: "pgbf",
        required: &[ConfigField::OmicSizes],
        build: build_pgbf,
    },
];

/// Every registered tag, in registry order.
pub fn supported_tags() -> Vec<&'static str> {
    MODEL_REGISTRY.iter().map(|e| e.tag).collect()
}

fn missing(model: &'static str, field: ConfigField) -> SurvfoldError {
    SurvfoldError::MissingConfigField {
        model,
        field: field.name(),
    }
}

fn omic_sizes(config: &RunConfig, model: &'static str) -> Result<Vec<usize>> {
    config
        .omic_sizes
        .clone()
        .ok_or_else(|| missing(model, ConfigField::OmicSizes))
}

fn build_mcat(config: &RunConfig, _datasets: &FoldDatasets) -> Result<ModelSpec> {
    Ok(ModelSpec::Mcat(McatArgs {
        fusion: config.fusion,
        omic_sizes: omic_sizes(config, "mcat")?,
        n_classes: config.n_classes,
    }))
}

fn build_motcat(config: &RunConfig, _datasets: &FoldDatasets) -> Result<ModelSpec> {
    Ok(ModelSpec::Motcat(MotcatArgs {
        ot_reg: config.ot_reg.ok_or_else(|| missing("motcat", ConfigField::OtReg))?,
        ot_tau: config.ot_tau.ok_or_else(|| missing("motcat", ConfigField::OtTau))?,
        ot_impl: config
            .ot_impl
            .clone()
            .ok_or_else(|| missing("motcat", ConfigField::OtImpl))?,
        fusion: config.fusion,
        omic_sizes: omic_sizes(config, "motcat")?,
        n_classes: config.n_classes,
    }))
}

fn build_graph_mixer(config: &RunConfig, datasets: &FoldDatasets) -> Result<ModelSpec> {
    Ok(ModelSpec::GraphMixer(GraphMixerArgs {
        num_layers: config
            .num_gcn_layers
            .ok_or_else(|| missing("graphmixer", ConfigField::NumGcnLayers))?,
        edge_agg: config
            .edge_agg
            .ok_or_else(|| missing("graphmixer", ConfigField::EdgeAgg))?,
        resample: config.resample,
        n_classes: config.n_classes,
        omic_sizes: datasets.train.omic_sizes.clone(),
        num_features: config
            .input_dim
            .ok_or_else(|| missing("graphmixer", ConfigField::InputDim))?,
    }))
}

fn build_pgbf(config: &RunConfig, _datasets: &FoldDatasets) -> Result<ModelSpec> {
    Ok(ModelSpec::Pgbf(PgbfArgs {
        omic_sizes: omic_sizes(config, "pgbf")?,
        config: Box::new(config.clone()),
    }))
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McatArgs {
    pub fusion: Option<Fusion>,
    pub omic_sizes: Vec<usize>,
    pub n_classes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MotcatArgs {
    pub ot_reg: f64,
    pub ot_tau: f64,
    pub ot_impl: String,
    pub fusion: Option<Fusion>,
    pub omic_sizes: Vec<usize>,
    pub n_classes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GraphMixerArgs {
    pub num_layers: usize,
    pub edge_agg: EdgeAgg,
    pub resample: bool,
    pub n_classes: usize,
    pub omic_sizes: Vec<usize>,
    pub num_features: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PgbfArgs {
    pub omic_sizes: Vec<usize>,
    /// The whole run config; the variant reads its own hyperparameters from it.
    pub config: Box<RunConfig>,
}

/// Validated constructor arguments for exactly one variant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "model_type", rename_all = "snake_case")]
pub enum ModelSpec {
    Mcat(McatArgs),
    Motcat(MotcatArgs),
    #[serde(rename = "graphmixer")]
    GraphMixer(GraphMixerArgs),
    Pgbf(PgbfArgs),
}

impl ModelSpec {
    pub fn kind(&self) -> ModelKind {
        match self {
            ModelSpec::Mcat(_) => ModelKind::Mcat,
            ModelSpec::Motcat(_) => ModelKind::Motcat,
            ModelSpec::GraphMixer(_) => ModelKind::GraphMixer,
            ModelSpec::Pgbf(_) => ModelKind::Pgbf,
        }
    }
}
