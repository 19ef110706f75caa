use anyhow::{bail, Result};
use std::cell::Cell;
use std::fs;
use std::path::Path;

use dga_eval::report::plot_series;
use dga_eval::{
    generate_report, CombinedResults, Config, CrossValidator, ExperimentPlan, FoldResult, Label,
    ModelKind, ModelOutcome, ResultCache, TestRecord,
};

struct Stub {
    kind: ModelKind,
    folds: Vec<FoldResult>,
    runs: Cell<usize>,
}

impl Stub {
    fn new(kind: ModelKind, folds: Vec<FoldResult>) -> Self {
        Self {
            kind,
            folds,
            runs: Cell::new(0),
        }
    }
}

impl CrossValidator for Stub {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn run(&self, nfolds: usize, _max_epoch: usize) -> Result<Vec<FoldResult>> {
        self.runs.set(self.runs.get() + 1);
        Ok(self.folds.iter().take(nfolds).cloned().collect())
    }
}

struct Broken;

impl CrossValidator for Broken {
    fn kind(&self) -> ModelKind {
        ModelKind::Lstm
    }

    fn run(&self, _nfolds: usize, _max_epoch: usize) -> Result<Vec<FoldResult>> {
        bail!("out of GPU memory")
    }
}

fn fold(samples: &[(&str, u8, f64)]) -> FoldResult {
    FoldResult {
        records: samples
            .iter()
            .map(|(domain, y, _)| TestRecord(Label::Index(*y as i64), domain.to_string()))
            .collect(),
        y: samples.iter().map(|(_, y, _)| *y).collect(),
        probs: samples.iter().map(|(_, _, p)| *p).collect(),
    }
}

fn perfect_fold() -> FoldResult {
    fold(&[
        ("google.com", 0, 0.05),
        ("wikipedia.org", 0, 0.2),
        ("xjwqkdh.ru", 1, 0.8),
        ("qpzmvbn.net", 1, 0.95),
    ])
}

fn random_fold() -> FoldResult {
    fold(&[
        ("github.com", 0, 0.5),
        ("kjhgfvbn.biz", 1, 0.5),
    ])
}

fn config(dir: &Path, plan: ExperimentPlan) -> Config {
    Config {
        plan,
        result_file: dir.join("results.pkl"),
        output_dir: dir.join("out"),
        force: false,
        bigram_cmd: "unused".into(),
        lstm_cmd: "unused".into(),
        font: None,
    }
}

fn csv_files_for(dir: &Path, kind: ModelKind) -> usize {
    fs::read_dir(dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            name.starts_with(&format!("{}-", kind.name())) && name.ends_with("-resultset.csv")
        })
        .count()
}

#[test]
fn bigram_only_run_has_one_curve_and_no_lstm_files() {
    let dir = tempfile::tempdir().unwrap();
    let plan = ExperimentPlan {
        use_lstm: false,
        nfolds: 2,
        ..ExperimentPlan::default()
    };
    let config = config(dir.path(), plan);
    let bigram = Stub::new(ModelKind::Bigram, vec![perfect_fold(), random_fold()]);
    let lstm = Stub::new(ModelKind::Lstm, vec![perfect_fold()]);

    let report = generate_report(&config, &bigram, &lstm).unwrap();

    assert_eq!(lstm.runs.get(), 0);
    assert!(report.lstm.is_none());
    let bigram_roc = report.bigram.as_ref().unwrap();
    assert_eq!(bigram_roc.auc, 0.75);

    let series = plot_series(&report);
    assert_eq!(series.len(), 1);
    assert_eq!(series[0].label, "Bigrams (AUC = 0.7500)");

    let out = dir.path().join("out");
    assert_eq!(csv_files_for(&out, ModelKind::Bigram), 2);
    assert_eq!(csv_files_for(&out, ModelKind::Lstm), 0);

    let csv = fs::read_to_string(out.join("bigram-1-resultset.csv")).unwrap();
    assert_eq!(
        csv,
        "domain,real_label,prob,real_y\r\ngithub.com,0,0.5,0\r\nkjhgfvbn.biz,1,0.5,1\r\n"
    );
}

#[test]
fn second_run_reuses_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), ExperimentPlan { nfolds: 1, ..ExperimentPlan::default() });
    let bigram = Stub::new(ModelKind::Bigram, vec![perfect_fold()]);
    let lstm = Stub::new(ModelKind::Lstm, vec![random_fold()]);

    let first = generate_report(&config, &bigram, &lstm).unwrap();
    assert!(!first.from_cache);
    let second = generate_report(&config, &bigram, &lstm).unwrap();
    assert!(second.from_cache);

    assert_eq!(bigram.runs.get(), 1);
    assert_eq!(lstm.runs.get(), 1);
    assert_eq!(first.bigram, second.bigram);
    assert_eq!(first.lstm, second.lstm);
    assert_eq!(second.lstm.as_ref().unwrap().auc, 0.5);
}

#[test]
fn force_regenerates_and_overwrites_the_cache() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), ExperimentPlan { nfolds: 1, ..ExperimentPlan::default() });
    let bigram = Stub::new(ModelKind::Bigram, vec![perfect_fold()]);
    let lstm = Stub::new(ModelKind::Lstm, vec![random_fold()]);
    generate_report(&config, &bigram, &lstm).unwrap();

    config.force = true;
    config.plan.use_bigram = false;
    let report = generate_report(&config, &bigram, &lstm).unwrap();
    assert!(!report.from_cache);
    assert_eq!(bigram.runs.get(), 1);
    assert_eq!(lstm.runs.get(), 2);
    assert!(report.bigram.is_none());

    let cached = ResultCache::new(&config.result_file).load().unwrap().unwrap();
    assert_eq!(cached.bigram, ModelOutcome::Skipped);
}

#[test]
fn rerun_with_fewer_folds_leaves_no_stale_csv() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path(), ExperimentPlan { nfolds: 2, ..ExperimentPlan::default() });
    let bigram = Stub::new(ModelKind::Bigram, vec![perfect_fold(), random_fold()]);
    let lstm = Stub::new(ModelKind::Lstm, vec![perfect_fold(), random_fold()]);
    generate_report(&config, &bigram, &lstm).unwrap();

    let out = dir.path().join("out");
    assert_eq!(csv_files_for(&out, ModelKind::Bigram), 2);
    assert_eq!(csv_files_for(&out, ModelKind::Lstm), 2);

    config.force = true;
    config.plan.nfolds = 1;
    config.plan.use_lstm = false;
    let report = generate_report(&config, &bigram, &lstm).unwrap();

    assert_eq!(report.csv_files, vec![out.join("bigram-0-resultset.csv")]);
    assert_eq!(csv_files_for(&out, ModelKind::Bigram), 1);
    assert_eq!(csv_files_for(&out, ModelKind::Lstm), 0);
}

#[test]
fn cached_results_are_used_as_stored() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), ExperimentPlan::default());
    let stored = CombinedResults {
        bigram: ModelOutcome::Skipped,
        lstm: ModelOutcome::Present(vec![perfect_fold(), random_fold()]),
    };
    ResultCache::new(&config.result_file).store(&stored).unwrap();

    let report = generate_report(&config, &Broken, &Broken).unwrap();
    assert!(report.from_cache);
    assert!(report.bigram.is_none());
    assert_eq!(report.lstm.as_ref().unwrap().auc, 0.75);
    assert_eq!(report.csv_files.len(), 2);
}

#[test]
fn collaborator_failure_aborts_without_caching() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), ExperimentPlan::default());
    let bigram = Stub::new(ModelKind::Bigram, vec![perfect_fold()]);

    let err = generate_report(&config, &bigram, &Broken).unwrap_err();
    assert!(format!("{:#}", err).contains("out of GPU memory"));
    assert!(!config.result_file.exists());
}

#[test]
fn empty_fold_aborts_before_caching() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), ExperimentPlan { nfolds: 2, ..ExperimentPlan::default() });
    let bigram = Stub::new(ModelKind::Bigram, vec![perfect_fold(), fold(&[])]);
    let lstm = Stub::new(ModelKind::Lstm, vec![perfect_fold(), random_fold()]);

    let err = generate_report(&config, &bigram, &lstm).unwrap_err();
    assert!(format!("{:#}", err).contains("bigram fold 1 is malformed"));
    assert!(!config.result_file.exists());
    assert!(!dir.path().join("out").exists());
}

#[test]
fn corrupt_cache_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), ExperimentPlan::default());
    fs::write(&config.result_file, b"not a cache").unwrap();
    let bigram = Stub::new(ModelKind::Bigram, vec![perfect_fold()]);
    let lstm = Stub::new(ModelKind::Lstm, vec![perfect_fold()]);

    assert!(generate_report(&config, &bigram, &lstm).is_err());
    assert_eq!(bigram.runs.get(), 0);
}
