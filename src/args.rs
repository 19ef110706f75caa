use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "dga-eval",
    about = "Cross-validate the DGA classifiers and plot their macro-averaged ROC curves",
    version,
    long_about = None
)]
pub struct Args {
    /// Cached results artifact
    #[arg(long, env = "RESULT_FILE", default_value = "results.pkl")]
    pub result_file: PathBuf,

    /// Directory for results.png and the per-fold CSV files
    #[arg(short, long, env = "OUTPUT_DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Evaluate the bigram model
    #[arg(
        long,
        env = "BIGRAM",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub bigram: bool,

    /// Evaluate the LSTM model
    #[arg(
        long,
        env = "LSTM",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = true,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub lstm: bool,

    /// Number of cross-validation folds
    #[arg(short, long, env = "NFOLDS", default_value_t = 1)]
    pub nfolds: usize,

    /// Epoch budget for the bigram model
    #[arg(long, env = "MAX_BIGRAM_EPOCH", default_value_t = 50)]
    pub max_bigram_epoch: usize,

    /// Epoch budget for the LSTM model
    #[arg(long, env = "MAX_LSTM_EPOCH", default_value_t = 25)]
    pub max_lstm_epoch: usize,

    /// Ignore the cached results and retrain
    #[arg(
        short,
        long,
        env = "FORCE",
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true",
        value_parser = BoolishValueParser::new()
    )]
    pub force: bool,

    /// Command that runs bigram cross-validation
    #[arg(long, env = "BIGRAM_CMD", default_value = "python -m dga_classifier.bigram")]
    pub bigram_cmd: String,

    /// Command that runs LSTM cross-validation
    #[arg(long, env = "LSTM_CMD", default_value = "python -m dga_classifier.lstm")]
    pub lstm_cmd: String,

    /// TrueType font used for figure text
    #[arg(long, env = "PLOT_FONT")]
    pub font: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
