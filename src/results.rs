use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The two classifiers under evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Bigram,
    Lstm,
}

impl ModelKind {
    pub const ALL: [ModelKind; 2] = [ModelKind::Bigram, ModelKind::Lstm];

    /// Stable name used in file names.
    pub fn name(self) -> &'static str {
        match self {
            ModelKind::Bigram => "bigram",
            ModelKind::Lstm => "lstm",
        }
    }

    /// Name shown in the figure legend.
    pub fn display_name(self) -> &'static str {
        match self {
            ModelKind::Bigram => "Bigrams",
            ModelKind::Lstm => "LSTM",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Original label of a test sample, as handed out by the model. Datasets
/// label samples either with a class index or with a malware family name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Label {
    Index(i64),
    Name(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Index(i) => write!(f, "{}", i),
            Label::Name(name) => f.write_str(name),
        }
    }
}

/// A held-out test sample: `(label, domain)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRecord(pub Label, pub String);

impl TestRecord {
    pub fn label(&self) -> &Label {
        &self.0
    }

    pub fn domain(&self) -> &str {
        &self.1
    }
}

/// Predictions for one cross-validation fold. `records`, `y` and `probs`
/// are index-aligned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    #[serde(rename = "indata_test")]
    pub records: Vec<TestRecord>,
    pub y: Vec<u8>,
    pub probs: Vec<f64>,
}

impl FoldResult {
    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if self.y.is_empty() {
            bail!("fold has no test samples");
        }
        if self.records.len() != self.y.len() || self.probs.len() != self.y.len() {
            bail!(
                "fold sequences are not aligned: {} records, {} labels, {} probabilities",
                self.records.len(),
                self.y.len(),
                self.probs.len()
            );
        }
        if let Some(pos) = self.y.iter().position(|&y| y > 1) {
            bail!("ground truth at index {} is {}, expected 0 or 1", pos, self.y[pos]);
        }
        if let Some(pos) = self.probs.iter().position(|p| !p.is_finite()) {
            bail!("probability at index {} is not finite", pos);
        }
        Ok(())
    }
}

pub type ModelResultSet = Vec<FoldResult>;

/// Outcome of one model's experiment. A disabled model is `Skipped`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "folds", rename_all = "snake_case")]
pub enum ModelOutcome {
    Present(ModelResultSet),
    Skipped,
}

impl ModelOutcome {
    pub fn folds(&self) -> Option<&[FoldResult]> {
        match self {
            ModelOutcome::Present(folds) => Some(folds),
            ModelOutcome::Skipped => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedResults {
    pub bigram: ModelOutcome,
    pub lstm: ModelOutcome,
}

impl CombinedResults {
    pub fn get(&self, kind: ModelKind) -> &ModelOutcome {
        match kind {
            ModelKind::Bigram => &self.bigram,
            ModelKind::Lstm => &self.lstm,
        }
    }

    /// Outcomes in bigram, lstm order.
    pub fn iter(&self) -> impl Iterator<Item = (ModelKind, &ModelOutcome)> {
        ModelKind::ALL.into_iter().map(move |kind| (kind, self.get(kind)))
    }

    pub fn validate(&self) -> Result<()> {
        for (kind, outcome) in self.iter() {
            if let ModelOutcome::Present(folds) = outcome {
                for (i, fold) in folds.iter().enumerate() {
                    fold.validate()
                        .map_err(|e| e.context(format!("{} fold {} is malformed", kind, i)))?;
                }
            }
        }
        Ok(())
    }
}
