use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use stream_tally::config::load_env_file;
use stream_tally::consumer::{
    StopReason, Subscription, TallyConsumer, DEFAULT_GROUP_ID, DEFAULT_TOPIC,
};
use stream_tally::logging::{init_logging, LogFormat};
use stream_tally::presenter::{LogPresenter, TextChart};
use stream_tally::source::{LineSource, MessageSource};
use stream_tally::tally::{Aggregator, ExclamationTally, ReaderTally};
use stream_tally::SERVICE_VERSION;

#[derive(Parser, Debug)]
#[command(
    name = "stream-tally",
    version,
    about = "Consume JSON messages from a topic and keep a live tally chart"
)]
struct Cli {
    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormatArg::Pretty)]
    log_format: LogFormatArg,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Count messages with and without "!"
    Exclamations {
        #[command(flatten)]
        subscription: BuzzSubscription,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Count distinct readers per book
    Readers {
        #[command(flatten)]
        subscription: BookSubscription,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args, Debug)]
struct BuzzSubscription {
    /// Topic to consume
    #[arg(long, env = "BUZZ_TOPIC", default_value = DEFAULT_TOPIC)]
    topic: String,

    /// Consumer group identity
    #[arg(long = "group", env = "BUZZ_CONSUMER_GROUP_ID", default_value = DEFAULT_GROUP_ID)]
    group_id: String,
}

#[derive(Args, Debug)]
struct BookSubscription {
    /// Topic to consume
    #[arg(long, env = "BOOK_TOPIC", default_value = DEFAULT_TOPIC)]
    topic: String,

    /// Consumer group identity
    #[arg(long = "group", env = "BOOK_CONSUMER_GROUP_ID", default_value = DEFAULT_GROUP_ID)]
    group_id: String,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// NDJSON input file; reads stdin when absent or "-"
    #[arg(long)]
    input: Option<PathBuf>,

    /// How to present the tally after each message
    #[arg(long, value_enum, default_value_t = PresenterKind::Chart)]
    presenter: PresenterKind,

    /// Width of the longest bar, in characters
    #[arg(long, default_value_t = 40)]
    chart_width: usize,

    /// Do not clear the terminal between redraws
    #[arg(long)]
    no_clear: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum PresenterKind {
    Chart,
    Log,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum LogFormatArg {
    Pretty,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

fn main() -> Result<(), anyhow::Error> {
    // Loaded before parsing so clap's env fallbacks see the file's values.
    let env_file = load_env_file(None);
    let cli = Cli::parse();
    init_logging(cli.log_format.into());

    match env_file {
        Ok(Some(path)) => debug!(path = %path.display(), "Loaded environment file"),
        Ok(None) => debug!("No .env file found"),
        Err(e) => warn!(error = %e, "Failed to load .env file"),
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(cli));

    // A stdin read may still be parked on the blocking pool after Ctrl-C.
    runtime.shutdown_timeout(Duration::from_millis(100));
    result
}

async fn run(cli: Cli) -> Result<(), anyhow::Error> {
    info!(version = SERVICE_VERSION, "START consumer");

    let reason = match cli.command {
        Command::Exclamations {
            subscription,
            output,
        } => {
            let subscription = Subscription::new(subscription.topic, subscription.group_id);
            run_tally(ExclamationTally::new(), subscription, &output).await?
        }
        Command::Readers {
            subscription,
            output,
        } => {
            let subscription = Subscription::new(subscription.topic, subscription.group_id);
            run_tally(ReaderTally::new(), subscription, &output).await?
        }
    };

    if let StopReason::SourceFailed(cause) = &reason {
        warn!(cause = %cause, "Consumer stopped after a source failure");
    }

    Ok(())
}

async fn run_tally<A>(
    aggregator: A,
    subscription: Subscription,
    output: &OutputArgs,
) -> Result<StopReason, anyhow::Error>
where
    A: Aggregator,
{
    info!(
        topic = %subscription.topic,
        group_id = %subscription.group_id,
        "Consumer subscription"
    );

    let reason = match output.input.as_deref() {
        Some(path) if path != Path::new("-") => {
            let source = LineSource::open(path)
                .await
                .with_context(|| format!("failed to open input {}", path.display()))?;
            present(source, aggregator, subscription, output).await
        }
        _ => present(LineSource::stdin(), aggregator, subscription, output).await,
    };

    Ok(reason)
}

async fn present<S, A>(
    source: S,
    aggregator: A,
    subscription: Subscription,
    output: &OutputArgs,
) -> StopReason
where
    S: MessageSource,
    A: Aggregator,
{
    let shutdown = shutdown_signal();

    match output.presenter {
        PresenterKind::Chart => {
            let chart = TextChart::stdout(output.chart_width).with_clear(!output.no_clear);
            TallyConsumer::new(source, aggregator, chart, subscription)
                .run(shutdown)
                .await
                .reason
        }
        PresenterKind::Log => {
            TallyConsumer::new(source, aggregator, LogPresenter::new(), subscription)
                .run(shutdown)
                .await
                .reason
        }
    }
}

/// Raise the shutdown flag on Ctrl-C.
fn shutdown_signal() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl-C received, stopping consumer");
                let _ = tx.send(true);
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    rx
}
