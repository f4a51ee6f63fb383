//! Shared fixtures: a scripted in-memory backend and a counting sink factory.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use survfold_core::{
    Device, EpochContext, FoldDatasets, LoaderOptions, MetricsSink, ModelSpec, RunConfig, Sample,
    SinkFactory, SplitSet, TrainingBackend,
};

/// Backend that records every call and replays a fixed score sequence.
#[derive(Default)]
pub struct ScriptedBackend {
    pub scores: VecDeque<f64>,
    pub calls: Vec<String>,
    pub specs: Vec<ModelSpec>,
    pub devices: Vec<Device>,
    pub loader_options: Vec<LoaderOptions>,
    pub checkpoints: Vec<(PathBuf, usize)>,
    /// Fail `validate_epoch` at this epoch.
    pub fail_validate_at: Option<usize>,
    pub fail_define_loss: bool,
}

impl ScriptedBackend {
    pub fn with_scores(scores: &[f64]) -> Self {
        Self {
            scores: scores.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn called(&self, name: &str) -> bool {
        self.calls.iter().any(|c| c == name)
    }

    pub fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|c| c.as_str() == name).count()
    }
}

/// Stand-in model: counts optimisation passes.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    pub train_passes: usize,
}

impl TrainingBackend for ScriptedBackend {
    type Loss = ();
    type Model = ScriptedModel;
    type Optimizer = ();
    type Loader = LoaderOptions;

    fn define_loss(&mut self, _config: &RunConfig) -> anyhow::Result<()> {
        self.calls.push("define_loss".to_string());
        if self.fail_define_loss {
            anyhow::bail!("unknown bag loss");
        }
        Ok(())
    }

    fn build_model(&mut self, spec: &ModelSpec, device: Device) -> anyhow::Result<ScriptedModel> {
        self.calls.push("build_model".to_string());
        self.specs.push(spec.clone());
        self.devices.push(device);
        Ok(ScriptedModel::default())
    }

    fn get_optim(&mut self, _model: &mut ScriptedModel, _config: &RunConfig) -> anyhow::Result<()> {
        self.calls.push("get_optim".to_string());
        Ok(())
    }

    fn get_split_loader(
        &mut self,
        _split: &SplitSet,
        options: &LoaderOptions,
    ) -> anyhow::Result<LoaderOptions> {
        self.calls.push("get_split_loader".to_string());
        self.loader_options.push(*options);
        Ok(*options)
    }

    fn train_epoch(
        &mut self,
        ctx: &mut EpochContext<'_>,
        _loader: &mut LoaderOptions,
        model: &mut ScriptedModel,
        _loss: &(),
        _optimizer: &mut (),
    ) -> anyhow::Result<()> {
        self.calls.push("train_epoch".to_string());
        model.train_passes += 1;
        ctx.log_scalar("train/loss", 1.0 / (ctx.epoch + 1) as f64)
    }

    fn validate_epoch(
        &mut self,
        ctx: &mut EpochContext<'_>,
        _loader: &mut LoaderOptions,
        _model: &mut ScriptedModel,
        _loss: &(),
    ) -> anyhow::Result<f64> {
        self.calls.push("validate_epoch".to_string());
        if self.fail_validate_at == Some(ctx.epoch) {
            anyhow::bail!("validation batch had no uncensored events");
        }
        let score = self
            .scores
            .pop_front()
            .ok_or_else(|| anyhow::anyhow!("score script exhausted"))?;
        ctx.log_scalar("val/c_index", score)?;
        Ok(score)
    }

    fn save_checkpoint(&mut self, model: &ScriptedModel, path: &Path) -> anyhow::Result<()> {
        self.calls.push("save_checkpoint".to_string());
        std::fs::write(path, model.train_passes.to_string())?;
        self.checkpoints.push((path.to_path_buf(), model.train_passes));
        Ok(())
    }
}

/// What a counting sink observed.
#[derive(Debug, Default)]
pub struct SinkLog {
    pub opened: usize,
    pub closed: usize,
    pub scalars: Vec<(String, f64, usize)>,
}

pub struct CountingSink(Rc<RefCell<SinkLog>>);

impl MetricsSink for CountingSink {
    fn add_scalar(&mut self, tag: &str, value: f64, step: usize) -> anyhow::Result<()> {
        self.0.borrow_mut().scalars.push((tag.to_string(), value, step));
        Ok(())
    }

    fn flush(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn close(&mut self) -> anyhow::Result<()> {
        self.0.borrow_mut().closed += 1;
        Ok(())
    }
}

pub struct CountingSinkFactory(pub Rc<RefCell<SinkLog>>);

impl SinkFactory for CountingSinkFactory {
    fn open(&self, _dir: &Path) -> anyhow::Result<Box<dyn MetricsSink>> {
        self.0.borrow_mut().opened += 1;
        Ok(Box::new(CountingSink(self.0.clone())))
    }
}

pub fn sample(id: &str, censored: bool) -> Sample {
    Sample {
        case_id: id.to_string(),
        label: 2,
        event_time: 30.0,
        censorship: censored,
        omics: vec![],
    }
}

/// Small fold: three train cases, two validation cases.
pub fn fold_datasets(omic_sizes: Vec<usize>) -> FoldDatasets {
    FoldDatasets::new(
        SplitSet::new(
            "train",
            omic_sizes.clone(),
            vec![sample("TCGA-A1", false), sample("TCGA-A2", true), sample("TCGA-A3", false)],
        ),
        SplitSet::new(
            "val",
            omic_sizes,
            vec![sample("TCGA-B1", false), sample("TCGA-B2", true)],
        ),
    )
}

/// `mcat` config rooted in `results_dir` with the given epoch window.
pub fn mcat_config(results_dir: &Path, start_epoch: usize, max_epochs: usize) -> RunConfig {
    let mut config = RunConfig::new(results_dir, "mcat");
    config.omic_sizes = Some(vec![89, 334, 534]);
    config.start_epoch = start_epoch;
    config.max_epochs = max_epochs;
    config
}
