use anyhow::{bail, Context, Result};
use std::process::{Command, Stdio};
use std::time::Instant;
use tracing::info;

use crate::results::{ModelKind, ModelResultSet};

/// A classifier that can be evaluated with k-fold cross-validation.
pub trait CrossValidator {
    fn kind(&self) -> ModelKind;

    /// Trains and tests the model on `nfolds` partitions, returning one
    /// result per held-out fold.
    fn run(&self, nfolds: usize, max_epoch: usize) -> Result<ModelResultSet>;
}

/// Runs an external training program. The program receives
/// `--nfolds N --max-epoch M` after its own arguments and prints the fold
/// results to stdout as a JSON array.
#[derive(Debug, Clone)]
pub struct CommandModel {
    kind: ModelKind,
    program: String,
    args: Vec<String>,
}

impl CommandModel {
    pub fn new(kind: ModelKind, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            kind,
            program: program.into(),
            args,
        }
    }

    /// Splits a command line on whitespace.
    pub fn from_command_line(kind: ModelKind, command_line: &str) -> Result<Self> {
        let mut words = command_line.split_whitespace().map(str::to_string);
        let Some(program) = words.next() else {
            bail!("Empty command for the {} model", kind);
        };
        Ok(Self::new(kind, program, words.collect()))
    }
}

impl CrossValidator for CommandModel {
    fn kind(&self) -> ModelKind {
        self.kind
    }

    fn run(&self, nfolds: usize, max_epoch: usize) -> Result<ModelResultSet> {
        let start_time = Instant::now();
        info!(
            action = "spawn",
            component = "model_command",
            model = %self.kind,
            program = %self.program,
            args = ?self.args,
            nfolds,
            max_epoch,
            "Launching cross-validation"
        );

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg("--nfolds")
            .arg(nfolds.to_string())
            .arg("--max-epoch")
            .arg(max_epoch.to_string())
            .stdin(Stdio::null())
            .stderr(Stdio::inherit())
            .output()
            .with_context(|| format!("Failed to launch {} model command {:?}", self.kind, self.program))?;

        if !output.status.success() {
            bail!(
                "{} model command {:?} failed with {}",
                self.kind,
                self.program,
                output.status
            );
        }

        let folds: ModelResultSet = serde_json::from_slice(&output.stdout).with_context(|| {
            format!("{} model command {:?} printed malformed fold results", self.kind, self.program)
        })?;

        info!(
            action = "complete",
            component = "model_command",
            model = %self.kind,
            folds = folds.len(),
            duration_ms = start_time.elapsed().as_millis(),
            "Cross-validation finished"
        );
        Ok(folds)
    }
}
