use std::path::PathBuf;

use crate::args::Args;

/// Which models to evaluate and how hard to train them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExperimentPlan {
    pub use_bigram: bool,
    pub use_lstm: bool,
    pub nfolds: usize,
    pub max_bigram_epochs: usize,
    pub max_lstm_epochs: usize,
}

impl Default for ExperimentPlan {
    fn default() -> Self {
        Self {
            use_bigram: true,
            use_lstm: true,
            nfolds: 10,
            max_bigram_epochs: 50,
            max_lstm_epochs: 25,
        }
    }
}

/// Settings for one invocation, resolved once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub plan: ExperimentPlan,
    pub result_file: PathBuf,
    pub output_dir: PathBuf,
    pub force: bool,
    pub bigram_cmd: String,
    pub lstm_cmd: String,
    pub font: Option<PathBuf>,
}

impl Config {
    pub fn from_args(args: &Args) -> Self {
        Self {
            plan: ExperimentPlan {
                use_bigram: args.bigram,
                use_lstm: args.lstm,
                nfolds: args.nfolds,
                max_bigram_epochs: args.max_bigram_epoch,
                max_lstm_epochs: args.max_lstm_epoch,
            },
            result_file: args.result_file.clone(),
            output_dir: args.output_dir.clone(),
            force: args.force,
            bigram_cmd: args.bigram_cmd.clone(),
            lstm_cmd: args.lstm_cmd.clone(),
            font: args.font.clone(),
        }
    }

    pub fn figure_path(&self) -> PathBuf {
        self.output_dir.join("results.png")
    }
}
