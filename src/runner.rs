use anyhow::{bail, Context, Result};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{info, warn};

use crate::cache::ResultCache;
use crate::config::{Config, ExperimentPlan};
use crate::macro_roc::{aggregate, MacroRoc};
use crate::model::{CommandModel, CrossValidator};
use crate::report;
use crate::results::{CombinedResults, ModelKind, ModelOutcome};
use crate::roc::{roc_curve, RocCurve};

/// Everything derived from one set of combined results.
#[derive(Debug)]
pub struct Report {
    pub bigram: Option<MacroRoc>,
    pub lstm: Option<MacroRoc>,
    pub csv_files: Vec<PathBuf>,
    pub from_cache: bool,
}

impl Report {
    pub fn get(&self, kind: ModelKind) -> Option<&MacroRoc> {
        match kind {
            ModelKind::Bigram => self.bigram.as_ref(),
            ModelKind::Lstm => self.lstm.as_ref(),
        }
    }
}

pub fn run_experiments(
    plan: &ExperimentPlan,
    bigram: &dyn CrossValidator,
    lstm: &dyn CrossValidator,
) -> Result<CombinedResults> {
    let start_time = Instant::now();
    info!(
        action = "start",
        component = "experiments",
        nfolds = plan.nfolds,
        bigram = plan.use_bigram,
        lstm = plan.use_lstm,
        "Running cross-validation experiments"
    );

    let bigram = run_model(bigram, plan.use_bigram, plan.nfolds, plan.max_bigram_epochs)?;
    let lstm = run_model(lstm, plan.use_lstm, plan.nfolds, plan.max_lstm_epochs)?;

    info!(
        action = "complete",
        component = "experiments",
        duration_ms = start_time.elapsed().as_millis(),
        "Experiments finished"
    );
    Ok(CombinedResults { bigram, lstm })
}

fn run_model(
    model: &dyn CrossValidator,
    enabled: bool,
    nfolds: usize,
    max_epoch: usize,
) -> Result<ModelOutcome> {
    let kind = model.kind();
    if !enabled {
        info!(action = "skip", component = "experiments", model = %kind, "Model disabled");
        return Ok(ModelOutcome::Skipped);
    }

    let folds = model
        .run(nfolds, max_epoch)
        .with_context(|| format!("Cross-validation of the {} model failed", kind))?;
    if folds.is_empty() {
        bail!("The {} model returned no folds", kind);
    }
    for (i, fold) in folds.iter().enumerate() {
        fold.validate()
            .with_context(|| format!("{} fold {} is malformed", kind, i))?;
    }
    if folds.len() != nfolds {
        warn!(
            action = "validate",
            component = "experiments",
            model = %kind,
            expected = nfolds,
            received = folds.len(),
            "Unexpected number of folds"
        );
    }
    Ok(ModelOutcome::Present(folds))
}

/// Loads cached results, or runs the experiments and caches them when the
/// cache is empty or `force` is set.
pub fn obtain_results(
    config: &Config,
    bigram: &dyn CrossValidator,
    lstm: &dyn CrossValidator,
) -> Result<(CombinedResults, bool)> {
    let cache = ResultCache::new(&config.result_file);

    if !config.force {
        if let Some(results) = cache.load()? {
            info!(
                action = "reuse",
                component = "experiments",
                path = ?cache.path(),
                "Using cached results; model toggles and epoch settings are ignored"
            );
            return Ok((results, true));
        }
    }

    let results = run_experiments(&config.plan, bigram, lstm)?;
    cache.store(&results)?;
    Ok((results, false))
}

pub fn fold_curves(kind: ModelKind, outcome: &ModelOutcome) -> Result<Option<Vec<RocCurve>>> {
    match outcome {
        ModelOutcome::Skipped => Ok(None),
        ModelOutcome::Present(folds) => {
            if folds.is_empty() {
                bail!("The {} result set is empty", kind);
            }
            folds
                .iter()
                .enumerate()
                .map(|(i, fold)| {
                    roc_curve(&fold.y, &fold.probs)
                        .with_context(|| format!("ROC curve of {} fold {}", kind, i))
                })
                .collect::<Result<Vec<_>>>()
                .map(Some)
        }
    }
}

pub fn compute_macro_roc(kind: ModelKind, outcome: &ModelOutcome) -> Result<Option<MacroRoc>> {
    let Some(curves) = fold_curves(kind, outcome)? else {
        return Ok(None);
    };
    let macro_roc = aggregate(&curves)
        .with_context(|| format!("Failed to aggregate the {} ROC curves", kind))?;
    info!(
        action = "aggregate",
        component = "macro_roc",
        model = %kind,
        folds = macro_roc.folds(),
        points = macro_roc.curve.len(),
        auc = macro_roc.auc,
        "Computed macro ROC"
    );
    Ok(Some(macro_roc))
}

/// Obtains results, writes the per-fold CSV files and computes the macro
/// ROC of every model that ran.
pub fn generate_report(
    config: &Config,
    bigram: &dyn CrossValidator,
    lstm: &dyn CrossValidator,
) -> Result<Report> {
    let total_start_time = Instant::now();
    info!(action = "start", component = "report", "Starting evaluation");

    let (results, from_cache) = obtain_results(config, bigram, lstm)?;
    let csv_files = report::dump_csv(&results, &config.output_dir)?;

    let report = Report {
        bigram: compute_macro_roc(ModelKind::Bigram, &results.bigram)?,
        lstm: compute_macro_roc(ModelKind::Lstm, &results.lstm)?,
        csv_files,
        from_cache,
    };

    info!(
        action = "complete",
        component = "report",
        duration_ms = total_start_time.elapsed().as_millis(),
        "Evaluation completed"
    );
    Ok(report)
}

/// Evaluates both models through their external commands and saves the
/// comparison figure.
pub fn evaluate(config: &Config) -> Result<Report> {
    let bigram = CommandModel::from_command_line(ModelKind::Bigram, &config.bigram_cmd)?;
    let lstm = CommandModel::from_command_line(ModelKind::Lstm, &config.lstm_cmd)?;

    let evaluation = generate_report(config, &bigram, &lstm)?;
    report::render(
        &report::plot_series(&evaluation),
        &config.figure_path(),
        config.font.as_deref(),
    )?;
    Ok(evaluation)
}
