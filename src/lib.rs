pub mod args;
pub mod cache;
pub mod config;
pub mod macro_roc;
pub mod model;
pub mod report;
pub mod results;
pub mod roc;
pub mod runner;
pub mod utils;

pub use args::Args;
pub use cache::ResultCache;
pub use config::{Config, ExperimentPlan};
pub use macro_roc::{aggregate, MacroRoc};
pub use model::{CommandModel, CrossValidator};
pub use results::{CombinedResults, FoldResult, Label, ModelKind, ModelOutcome, TestRecord};
pub use roc::{roc_curve, RocCurve};
pub use runner::{evaluate, generate_report, run_experiments, Report};
