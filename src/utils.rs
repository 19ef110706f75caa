use time::macros::format_description;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::EnvFilter;

pub fn setup_logging(verbose: bool) {
    let default_level = if verbose { "info" } else { "error" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let timer = LocalTime::new(format_description!(
        "[hour]:[minute]:[second].[subsecond digits:3]"
    ));

    // Logs go to stderr so stdout only carries the summary.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(timer)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn validate_args(args: &crate::args::Args) -> anyhow::Result<()> {
    if args.nfolds == 0 {
        anyhow::bail!("--nfolds must be greater than 0");
    }

    if args.max_bigram_epoch == 0 {
        anyhow::bail!("--max-bigram-epoch must be greater than 0");
    }

    if args.max_lstm_epoch == 0 {
        anyhow::bail!("--max-lstm-epoch must be greater than 0");
    }

    if !args.bigram && !args.lstm {
        anyhow::bail!("At least one of --bigram and --lstm must be enabled");
    }

    if args.bigram_cmd.trim().is_empty() {
        anyhow::bail!("--bigram-cmd must not be empty");
    }

    if args.lstm_cmd.trim().is_empty() {
        anyhow::bail!("--lstm-cmd must not be empty");
    }

    Ok(())
}
