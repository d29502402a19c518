use clap::{Parser, Subcommand};

mod commands;

use commands::{ClassifyArgs, EvaluateArgs, RunArgs, StatusArgs};

#[derive(Parser)]
#[command(name = "algo-trade")]
#[command(about = "Options signal desk: evaluate, classify and paper-trade signals", long_about = None)]
struct Cli {
    /// Optional log file path (logs to file instead of stderr)
    #[arg(long, global = true)]
    log_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one signal through the gate pipeline and print the decision
    Evaluate(EvaluateArgs),
    /// Classify a chart resolution into a trading regime
    Classify(ClassifyArgs),
    /// Run an orchestrator session over a file of signals
    Run(RunArgs),
    /// Print a persisted session snapshot
    Status(StatusArgs),
}

fn init_logging(log_file: Option<&str>) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        // Stdout carries JSON output, so logs go to stderr.
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_file.as_deref())?;

    match cli.command {
        Commands::Evaluate(args) => commands::run_evaluate(args)?,
        Commands::Classify(args) => commands::run_classify(&args)?,
        Commands::Run(args) => commands::run_session(args).await?,
        Commands::Status(args) => commands::run_status(&args).await?,
    }

    Ok(())
}
