use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use macro_runner::desktop::{CornerFailsafe, Devices};
use macro_runner::models::validate;
use macro_runner::persist::{load_program, save_program};
use macro_runner::{MacroRunner, RunEvent, RunOutcome, RunnerConfig, RunnerError};

#[derive(Parser, Debug)]
#[command(name = "macro-runner", version, about = "Replay recorded desktop macros")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a macro file. Move the pointer to the top-left corner to abort.
    Run {
        file: PathBuf,
        /// Override the file's loop count
        #[arg(long)]
        loops: Option<u32>,
        /// Seconds to wait before the first action
        #[arg(long)]
        countdown: Option<u64>,
    },
    /// Validate a macro file without running it
    Check { file: PathBuf },
    /// Rewrite a macro file (including older tuple-style files) in the current format
    Convert { input: PathBuf, output: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    match cli.command {
        Commands::Run {
            file,
            loops,
            countdown,
        } => run(file, loops, countdown).await,
        Commands::Check { file } => check(file),
        Commands::Convert { input, output } => {
            let program = load_program(&input)
                .with_context(|| format!("Failed to load {}", input.display()))?;
            save_program(&output, &program)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!(
                "Wrote {} action(s) to {}",
                program.action_count(),
                output.display()
            );
            Ok(())
        }
    }
}

fn check(file: PathBuf) -> Result<()> {
    let program =
        load_program(&file).with_context(|| format!("Failed to load {}", file.display()))?;
    let problems = validate(&program);
    if problems.is_empty() {
        println!(
            "OK: {} action(s), {} loop(s)",
            program.action_count(),
            program.loop_count
        );
        return Ok(());
    }
    for problem in &problems {
        println!("{}", problem);
    }
    bail!("{} problem(s) found", problems.len())
}

async fn run(file: PathBuf, loops: Option<u32>, countdown: Option<u64>) -> Result<()> {
    let mut program =
        load_program(&file).with_context(|| format!("Failed to load {}", file.display()))?;
    if let Some(loops) = loops {
        program.loop_count = loops;
    }

    let mut config = RunnerConfig::from_env();
    if let Some(secs) = countdown {
        config.countdown = Duration::from_secs(secs);
    }

    let devices = Devices::system(&config.tesseract_cmd)?;
    let runner = MacroRunner::new(devices, config).with_failsafe(Arc::new(CornerFailsafe::new()?));

    let handle = match runner.start(program, print_event) {
        Ok(handle) => handle,
        Err(RunnerError::Invalid(problems)) => {
            for problem in &problems {
                eprintln!("{}", problem);
            }
            bail!("Macro failed validation");
        }
        Err(e) => return Err(e.into()),
    };

    let run_id = handle.id().to_string();
    let wait = handle.wait();
    tokio::pin!(wait);
    let summary = loop {
        tokio::select! {
            summary = &mut wait => break summary,
            _ = tokio::signal::ctrl_c() => {
                runner.cancel_run(&run_id);
            }
        }
    };

    tracing::info!(
        "Run {} {} after {} ms ({} action(s) dispatched)",
        summary.id,
        summary.outcome,
        summary.duration_ms(),
        summary.dispatched
    );

    match summary.outcome {
        RunOutcome::Completed | RunOutcome::Cancelled => Ok(()),
        RunOutcome::Failed => bail!(summary.error.unwrap_or_else(|| "Macro failed".into())),
    }
}

fn print_event(event: RunEvent) {
    match event {
        RunEvent::Info(message) => println!("{}", message),
        RunEvent::Warning(message) => println!("warning: {}", message),
        RunEvent::Error(message) => eprintln!("error: {}", message),
        RunEvent::Finished(outcome) => println!("Finished: {}", outcome),
    }
}
