//! Pipeline Integration Test
//!
//! Writes a small synthetic C-MAPSS variant to a temp directory and runs the
//! whole pipeline on it with a reduced model, then checks the outputs.

use std::fmt::Write as _;
use std::path::Path;

use turbofan_warning::config::PipelineConfig;
use turbofan_warning::dataset::{Dataset, Variant};
use turbofan_warning::model::{load_from_disk, ClassifierConfig};
use turbofan_warning::plots::{
    CONFUSION_MATRIX_FILE, PRECISION_RECALL_FILE, ROC_CURVE_FILE, THRESHOLD_COMPARISON_FILE, TRAINING_HISTORY_FILE,
};
use turbofan_warning::prep::{build_windows, label_heldout_units};
use turbofan_warning::{run, PipelineError};

/// One record line: a slow drift in a few sensors as failure approaches.
fn record_line(unit: u32, cycle: u32, rul: u32) -> String {
    let wear = (-f64::from(rul) / 25.0).exp();
    let mut line = format!("{unit} {cycle} -0.0007 0.0004 100.0");
    for s in 0..21 {
        let base = 500.0 + f64::from(s) * 10.0;
        let value = match s {
            1 | 2 | 6 | 10 => base + wear * 8.0 + f64::from((unit * 7 + cycle) % 5) * 0.05,
            4 | 5 => base,
            _ => base + f64::from((unit + cycle * 3) % 7) * 0.1,
        };
        write!(line, " {value:.4}").expect("write to string");
    }
    line.push_str("  ");
    line
}

/// Training units run to failure; held-out units stop `remaining` cycles early.
fn write_variant(dir: &Path, variant: Variant) {
    let mut train = String::new();
    for unit in 1..=10 {
        let life = 50 + unit * 4;
        for cycle in 1..=life {
            train.push_str(&record_line(unit, cycle, life - cycle));
            train.push('\n');
        }
    }

    let mut test = String::new();
    let mut rul = String::new();
    for unit in 1..=4_u32 {
        let life = 60 + unit * 5;
        let remaining = 5 + unit * 3;
        for cycle in 1..=(life - remaining) {
            test.push_str(&record_line(unit, cycle, life - cycle));
            test.push('\n');
        }
        rul.push_str(&format!("{remaining}\n"));
    }

    std::fs::write(dir.join(variant.train_file()), train).expect("write train");
    std::fs::write(dir.join(variant.test_file()), test).expect("write test");
    std::fs::write(dir.join(variant.rul_file()), rul).expect("write rul");
}

fn small_config(data_dir: &Path, output_dir: &Path) -> PipelineConfig {
    let mut config = PipelineConfig::default();
    config.data.data_dir = data_dir.to_path_buf();
    config.data.variant = Variant::Fd001;
    config.windowing.sequence_length = 10;
    config.model = ClassifierConfig { lstm1_units: 8, lstm2_units: 6, dense_units: 4, ..ClassifierConfig::default() };
    config.training.epochs = 3;
    config.training.batch_size = 32;
    config.training.verbose = false;
    config.output.output_dir = output_dir.to_path_buf();
    config
}

#[test]
fn full_run_writes_checkpoint_and_charts() {
    let data = tempfile::tempdir().expect("data dir");
    let out = tempfile::tempdir().expect("out dir");
    write_variant(data.path(), Variant::Fd001);

    let config = small_config(data.path(), out.path());
    let report = run(&config).expect("pipeline run");

    // 10 training units of length 54..90 with sequence length 10.
    let expected_train: usize = (1..=10).map(|u| 50 + u * 4 - 10 + 1).sum();
    assert_eq!(report.windows.train + report.windows.validation, expected_train);
    // 4 held-out units of observed length 57, 59, 61, 63.
    assert_eq!(report.windows.heldout, [57_usize, 59, 61, 63].iter().map(|n| n - 10 + 1).sum::<usize>());
    assert!(report.windows.heldout_positives > 0);

    assert_eq!(report.evaluation.sweep.len(), 4);
    assert!(report.evaluation.roc_auc.is_some());
    let cm = report.evaluation.confusion;
    assert_eq!(cm.total(), report.windows.heldout);
    assert_eq!(
        report.evaluation.cost.total_cost,
        cm.fp as f64 * 1000.0 + cm.fn_ as f64 * 10000.0
    );

    for file in [
        CONFUSION_MATRIX_FILE,
        ROC_CURVE_FILE,
        PRECISION_RECALL_FILE,
        TRAINING_HISTORY_FILE,
        THRESHOLD_COMPARISON_FILE,
    ] {
        assert!(out.path().join(file).exists(), "missing {file}");
    }
    assert!(report.plot_failures.is_empty());

    let saved = PipelineConfig::load_from_file(&report.config_path).expect("saved config");
    assert_eq!(saved, config);
    assert!(report.history.epochs.len() <= 3);
}

#[test]
fn restored_checkpoint_reproduces_heldout_predictions() {
    let data = tempfile::tempdir().expect("data dir");
    let out = tempfile::tempdir().expect("out dir");
    write_variant(data.path(), Variant::Fd001);

    let mut config = small_config(data.path(), out.path());
    config.output.write_plots = false;
    let report = run(&config).expect("pipeline run");
    let path = report.checkpoint_path.expect("checkpoint written");

    let checkpoint = load_from_disk(&path).expect("load checkpoint");
    assert_eq!(checkpoint.metadata.sequence_length, 10);
    assert_eq!(checkpoint.metadata.variant, Variant::Fd001);
    let model = checkpoint.restore().expect("restore");

    // Rebuild the held-out windows from the stored scaler and re-evaluate.
    let dataset = Dataset::load(data.path(), Variant::Fd001).expect("dataset");
    let heldout = label_heldout_units(&dataset.heldout, &dataset.remaining, checkpoint.metadata.failure_threshold)
        .expect("label");
    let windows = build_windows(&heldout, &checkpoint.scaler, checkpoint.metadata.sequence_length);
    let probs = model.predict_proba(&windows);
    let cm = turbofan_warning::ConfusionMatrix::at_threshold(&probs, &windows.labels(), 0.5);
    assert_eq!(cm, report.evaluation.confusion);
}

#[test]
fn same_seed_gives_same_result() {
    let data = tempfile::tempdir().expect("data dir");
    write_variant(data.path(), Variant::Fd001);

    let out_a = tempfile::tempdir().expect("out a");
    let out_b = tempfile::tempdir().expect("out b");
    let mut a = small_config(data.path(), out_a.path());
    let mut b = small_config(data.path(), out_b.path());
    a.output.write_plots = false;
    b.output.write_plots = false;

    let ra = run(&a).expect("run a");
    let rb = run(&b).expect("run b");
    assert_eq!(ra.history, rb.history);
    assert_eq!(ra.evaluation.confusion, rb.evaluation.confusion);
}

#[test]
fn sequence_longer_than_every_unit_is_an_error() {
    let data = tempfile::tempdir().expect("data dir");
    let out = tempfile::tempdir().expect("out dir");
    write_variant(data.path(), Variant::Fd001);

    let mut config = small_config(data.path(), out.path());
    config.windowing.sequence_length = 500;
    assert!(matches!(run(&config), Err(PipelineError::NoTrainingWindows(500))));
}

#[test]
fn missing_files_surface_as_dataset_errors() {
    let data = tempfile::tempdir().expect("data dir");
    let out = tempfile::tempdir().expect("out dir");
    let config = small_config(data.path(), out.path());
    assert!(matches!(run(&config), Err(PipelineError::Dataset(_))));
}
