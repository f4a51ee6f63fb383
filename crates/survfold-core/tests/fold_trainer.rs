//! End-to-end fold runs against a scripted backend.

mod common;

use std::cell::RefCell;
use std::fs;
use std::rc::Rc;

use common::{fold_datasets, mcat_config, CountingSinkFactory, ScriptedBackend, SinkLog};
use survfold_core::{
    BestResult, Device, EdgeAgg, FoldTrainer, ModelSpec, RunConfig, Stage, SurvfoldError,
    LOG_FILE, SCALARS_FILE,
};
use tempfile::TempDir;

fn trainer(scores: &[f64]) -> FoldTrainer<ScriptedBackend> {
    FoldTrainer::new(ScriptedBackend::with_scores(scores), Device::Cpu)
}

fn counting_trainer(
    scores: &[f64],
) -> (FoldTrainer<ScriptedBackend>, Rc<RefCell<SinkLog>>) {
    let log = Rc::new(RefCell::new(SinkLog::default()));
    let trainer = trainer(scores).with_sink_factory(Box::new(CountingSinkFactory(log.clone())));
    (trainer, log)
}

fn log_text(config: &RunConfig, fold: usize) -> String {
    fs::read_to_string(config.fold_dir(fold).join(LOG_FILE)).expect("read log.txt")
}

#[test]
fn peak_in_middle_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 0, 3);
    let mut trainer = trainer(&[0.5, 0.7, 0.65]);

    let (best, report) = trainer
        .run_fold(&fold_datasets(vec![89, 334, 534]), 0, &config)
        .expect("fold runs");

    assert_eq!(best, BestResult::new(0.7, 1));
    assert_eq!(report.fold, 0);
    assert_eq!(report.result, (0.7, 1));
    assert_eq!(log_text(&config, 0), "result: 0.7000, epoch: 1\n");
    assert!(config.fold_dir(0).is_dir());
    assert!(config.splits_path(0).is_file());
}

#[test]
fn strictly_increasing_scores_pick_last_epoch() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 0, 4);
    let mut trainer = trainer(&[0.51, 0.55, 0.6, 0.62]);

    let (best, _) = trainer
        .run_fold(&fold_datasets(vec![]), 1, &config)
        .expect("fold runs");

    assert_eq!(best, BestResult::new(0.62, 3));
}

#[test]
fn non_increasing_scores_keep_first_epoch() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 2, 5);
    let mut trainer = trainer(&[0.68, 0.6, 0.55]);

    let (best, _) = trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect("fold runs");

    assert_eq!(best, BestResult::new(0.68, 2));
}

#[test]
fn ties_do_not_move_best_epoch() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 1, 4);
    let mut trainer = trainer(&[0.6, 0.6, 0.6]);

    let (best, _) = trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect("fold runs");

    assert_eq!(best, BestResult::new(0.6, 1));
}

#[test]
fn empty_epoch_window_reports_initial_best() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 3, 3);
    let mut trainer = trainer(&[]);

    let (best, _) = trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect("fold runs");

    assert_eq!(best, BestResult::new(0.0, 0));
    assert_eq!(trainer.backend().count("train_epoch"), 0);
    assert_eq!(log_text(&config, 0), "result: 0.0000, epoch: 0\n");
}

#[test]
fn each_run_appends_exactly_one_log_line() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 0, 2);
    let mut trainer = trainer(&[0.6, 0.7, 0.8, 0.75]);
    let datasets = fold_datasets(vec![]);

    trainer.run_fold(&datasets, 4, &config).expect("first run");
    assert_eq!(log_text(&config, 4).lines().count(), 1);

    // Existing fold directory is reused.
    trainer.run_fold(&datasets, 4, &config).expect("second run");
    assert_eq!(
        log_text(&config, 4),
        "result: 0.7000, epoch: 1\nresult: 0.8000, epoch: 0\n"
    );
}

#[test]
fn backend_calls_follow_fold_sequence() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 0, 2);
    let mut trainer = trainer(&[0.6, 0.7]);

    trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect("fold runs");

    assert_eq!(
        trainer.backend().calls,
        vec![
            "define_loss",
            "build_model",
            "get_optim",
            "get_split_loader",
            "get_split_loader",
            "train_epoch",
            "validate_epoch",
            "train_epoch",
            "validate_epoch",
        ]
    );
}

#[test]
fn loaders_get_train_and_validation_options() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = mcat_config(dir.path(), 0, 1);
    config.weighted_sample = true;
    config.batch_size = 2;
    let mut trainer = trainer(&[0.6]);

    trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect("fold runs");

    let options = &trainer.backend().loader_options;
    assert_eq!(options.len(), 2);
    assert!(options[0].training && options[0].weighted);
    assert!(!options[1].training && !options[1].weighted);
    assert!(options.iter().all(|o| !o.testing && o.batch_size == 2));
}

#[test]
fn model_is_built_on_trainer_device() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 0, 1);
    let mut trainer = FoldTrainer::new(ScriptedBackend::with_scores(&[0.6]), Device::Cuda(1));

    trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect("fold runs");

    assert_eq!(trainer.backend().devices, vec![Device::Cuda(1)]);
    assert_eq!(trainer.device(), Device::Cuda(1));
}

#[test]
fn graph_mixer_takes_omic_sizes_from_train_split() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = RunConfig::new(dir.path(), "graphmixer");
    config.max_epochs = 1;
    config.num_gcn_layers = Some(4);
    config.edge_agg = Some(EdgeAgg::Spatial);
    config.input_dim = Some(1024);
    config.resample = true;
    let mut trainer = trainer(&[0.6]);

    trainer
        .run_fold(&fold_datasets(vec![82, 328, 513]), 0, &config)
        .expect("fold runs");

    match &trainer.backend().specs[..] {
        [ModelSpec::GraphMixer(args)] => {
            assert_eq!(args.omic_sizes, vec![82, 328, 513]);
            assert_eq!(args.edge_agg, EdgeAgg::Spatial);
            assert!(args.resample);
        }
        other => panic!("expected one graph mixer spec, got {other:?}"),
    }
}

#[test]
fn unsupported_model_type_fails_before_optimizer_and_loaders() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = mcat_config(dir.path(), 0, 3);
    config.model_type = "amil".to_string();
    config.log_data = true;
    let (mut trainer, sink_log) = counting_trainer(&[0.5, 0.6, 0.7]);

    let err = trainer
        .run_fold(&fold_datasets(vec![]), 2, &config)
        .expect_err("unknown tag");

    match err {
        SurvfoldError::UnsupportedModelType(tag) => assert_eq!(tag, "amil"),
        other => panic!("expected UnsupportedModelType, got {other:?}"),
    }
    let backend = trainer.backend();
    assert!(backend.called("define_loss"));
    assert!(!backend.called("build_model"));
    assert!(!backend.called("get_optim"));
    assert!(!backend.called("get_split_loader"));

    assert!(config.fold_dir(2).is_dir());
    assert!(config.splits_path(2).is_file());
    assert!(!config.fold_dir(2).join(LOG_FILE).exists());

    let sink_log = sink_log.borrow();
    assert_eq!(sink_log.opened, 1);
    assert_eq!(sink_log.closed, 1);
}

#[test]
fn missing_variant_field_fails_before_model_build() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = RunConfig::new(dir.path(), "motcat");
    config.omic_sizes = Some(vec![10, 20]);
    config.ot_reg = Some(0.1);
    config.ot_tau = Some(0.5);
    let mut trainer = trainer(&[0.6]);

    let err = trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect_err("ot_impl missing");

    assert!(matches!(
        err,
        SurvfoldError::MissingConfigField {
            model: "motcat",
            field: "ot_impl"
        }
    ));
    assert!(!trainer.backend().called("build_model"));
}

#[test]
fn invalid_config_is_rejected_before_any_side_effect() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = mcat_config(dir.path(), 0, 2);
    config.batch_size = 0;
    config.log_data = true;
    let (mut trainer, sink_log) = counting_trainer(&[0.6, 0.7]);

    let err = trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect_err("batch_size 0");

    assert!(matches!(err, SurvfoldError::InvalidConfig(_)));
    assert!(trainer.backend().calls.is_empty());
    assert!(!config.fold_dir(0).exists());
    assert!(!config.splits_path(0).exists());
    assert_eq!(sink_log.borrow().opened, 0);
}

#[test]
fn start_epoch_past_max_epochs_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 4, 2);
    let mut trainer = trainer(&[]);

    let err = trainer
        .run_fold(&fold_datasets(vec![]), 1, &config)
        .expect_err("empty window reversed");

    match err {
        SurvfoldError::InvalidConfig(msg) => assert!(msg.contains("start_epoch")),
        other => panic!("expected InvalidConfig, got {other:?}"),
    }
    assert!(!config.fold_dir(1).exists());
}

#[test]
fn sink_disabled_is_never_opened() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 0, 2);
    let (mut trainer, sink_log) = counting_trainer(&[0.6, 0.7]);

    trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect("fold runs");

    let sink_log = sink_log.borrow();
    assert_eq!(sink_log.opened, 0);
    assert_eq!(sink_log.closed, 0);
    assert!(sink_log.scalars.is_empty());
}

#[test]
fn sink_enabled_receives_scalars_and_is_closed_once() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = mcat_config(dir.path(), 0, 2);
    config.log_data = true;
    let (mut trainer, sink_log) = counting_trainer(&[0.6, 0.7]);

    trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect("fold runs");

    let sink_log = sink_log.borrow();
    assert_eq!(sink_log.opened, 1);
    assert_eq!(sink_log.closed, 1);
    let val: Vec<_> = sink_log
        .scalars
        .iter()
        .filter(|(tag, _, _)| tag == "val/c_index")
        .map(|(_, value, step)| (*value, *step))
        .collect();
    assert_eq!(val, vec![(0.6, 0), (0.7, 1)]);
}

#[test]
fn default_sink_writes_scalars_into_fold_dir() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = mcat_config(dir.path(), 0, 2);
    config.log_data = true;
    let mut trainer = trainer(&[0.6, 0.7]);

    trainer
        .run_fold(&fold_datasets(vec![]), 3, &config)
        .expect("fold runs");

    let raw = fs::read_to_string(config.fold_dir(3).join(SCALARS_FILE)).expect("scalars");
    assert_eq!(raw.lines().count(), 4);
    assert!(raw.contains("\"val/c_index\""));
}

#[test]
fn collaborator_failure_aborts_fold_and_closes_sink() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = mcat_config(dir.path(), 0, 3);
    config.log_data = true;
    let (mut trainer, sink_log) = counting_trainer(&[0.6, 0.7, 0.8]);
    trainer.backend_mut().fail_validate_at = Some(1);

    let err = trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect_err("validation fails");

    match err {
        SurvfoldError::Collaborator { stage, source } => {
            assert_eq!(stage, Stage::ValidateEpoch);
            assert!(source.to_string().contains("uncensored"));
        }
        other => panic!("expected Collaborator, got {other:?}"),
    }
    assert!(!config.fold_dir(0).join(LOG_FILE).exists());
    assert_eq!(sink_log.borrow().closed, 1);
}

#[test]
fn loss_failure_maps_to_define_loss_stage() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 0, 1);
    let mut trainer = trainer(&[0.6]);
    trainer.backend_mut().fail_define_loss = true;

    let err = trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect_err("loss fails");

    assert!(matches!(
        err,
        SurvfoldError::Collaborator {
            stage: Stage::DefineLoss,
            ..
        }
    ));
}

#[test]
fn checkpoints_saved_only_on_improvement_when_enabled() {
    let dir = TempDir::new().expect("tempdir");
    let mut config = mcat_config(dir.path(), 0, 4);
    config.save_checkpoint = true;
    let mut trainer = trainer(&[0.5, 0.7, 0.65, 0.7]);

    trainer
        .run_fold(&fold_datasets(vec![]), 1, &config)
        .expect("fold runs");

    let checkpoints = &trainer.backend().checkpoints;
    assert_eq!(checkpoints.len(), 2);
    assert!(checkpoints.iter().all(|(p, _)| *p == config.checkpoint_path(1)));
    // Last write wins: the model after its second optimisation pass.
    assert_eq!(checkpoints[1].1, 2);
    assert_eq!(
        fs::read_to_string(config.checkpoint_path(1)).expect("checkpoint"),
        "2"
    );
}

#[test]
fn no_checkpoints_by_default() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 0, 3);
    let mut trainer = trainer(&[0.5, 0.6, 0.7]);

    trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect("fold runs");

    assert!(!trainer.backend().called("save_checkpoint"));
    assert!(!config.checkpoint_path(0).exists());
}

#[test]
fn splits_file_lists_case_ids() {
    let dir = TempDir::new().expect("tempdir");
    let config = mcat_config(dir.path(), 0, 1);
    let mut trainer = trainer(&[0.6]);

    trainer
        .run_fold(&fold_datasets(vec![]), 0, &config)
        .expect("fold runs");

    assert_eq!(
        fs::read_to_string(config.splits_path(0)).expect("splits"),
        ",train,val\n0,TCGA-A1,TCGA-B1\n1,TCGA-A2,TCGA-B2\n2,TCGA-A3,\n"
    );
}
