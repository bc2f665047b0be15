//! CLI entry point for Proxy Queue
//!
//! Reconciles a timeline export against the proxy folder, queues encodes for
//! the clips still missing a proxy and waits for the workers to finish.

mod terminal;

use clap::Parser;
use log::{debug, error, warn};
use owo_colors::OwoColorize;
use proxy_queue::{
    local_host_name, Config, ExportedTimeline, JobGroup, JobMonitor, Notifier, Outcome, Prompt,
    Session, SessionError, SpoolQueue,
};
use std::error::Error;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use terminal::{AssumeYes, ConsoleNotifier, TerminalPrompt};

/// Queue proxy encodes for the clips on a timeline
#[derive(Parser, Debug)]
#[command(name = "queue-proxies")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (config.toml). Defaults plus environment when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Timeline export (JSON) to read clips from and write links to
    #[arg(short, long)]
    timeline: PathBuf,

    /// Answer yes to every question
    #[arg(short, long, default_value = "false")]
    yes: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .init();

    match run(args).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}", e);
            eprintln!("{} {}", "ERROR -".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<ExitCode, Box<dyn Error>> {
    let config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };
    debug!("Configuration: {:?}", config);

    let prompt: Box<dyn Prompt + Send> = if args.yes {
        Box::new(AssumeYes)
    } else {
        Box::new(TerminalPrompt)
    };
    let notifier = ConsoleNotifier;

    println!("{}", "Queue/Link Proxies".bold().bright_white());

    let queue = SpoolQueue::from_config(&config)?;
    match queue.purge_expired() {
        Ok(0) => {}
        Ok(purged) => debug!("Purged {} expired group(s)", purged),
        Err(e) => warn!("Could not purge expired groups: {}", e),
    }

    // Prompts block on the terminal, so the session runs off the runtime threads
    let session_config = config.clone();
    let timeline_path = args.timeline.clone();
    let outcome = tokio::task::spawn_blocking(move || -> Result<_, SessionError> {
        let mut timeline = ExportedTimeline::open(&timeline_path)?;
        Session::new(&session_config, prompt.as_ref()).run(
            &mut timeline,
            &queue,
            &local_host_name(),
        )
    })
    .await??;

    let status = ExitCode::from(outcome.exit_status());
    match outcome {
        Outcome::Submitted { group, jobs } => {
            debug!("Group {} holds {} job(s)", group.id(), jobs);
            wait_for_group(&group, &config, &notifier).await
        }
        Outcome::Cancelled(step) => {
            println!("{}", format!("Cancelled by user at {}", step).yellow());
            Ok(status)
        }
        Outcome::NothingToQueue(_) => {
            println!("{}", "No clips to queue.".red());
            Ok(status)
        }
        Outcome::Declined { ready } => {
            println!("{}", format!("Left {} clip(s) unqueued.", ready).dimmed());
            Ok(status)
        }
    }
}

async fn wait_for_group<G: JobGroup>(
    group: &G,
    config: &Config,
    notifier: &dyn Notifier,
) -> Result<ExitCode, Box<dyn Error>> {
    notifier.notify("Started encoding clips");
    println!("{}", "Waiting for jobs to finish. Feel free to minimize.".yellow());

    let monitor = JobMonitor::from_millis(config.monitor.poll_interval_ms);
    let wait = monitor.wait(group, |elapsed, progress| {
        print!(
            "\rElapsed: {}s  ({} done, {} running, {} waiting)",
            elapsed.as_secs(),
            progress.succeeded + progress.failed,
            progress.started,
            progress.pending
        );
        let _ = std::io::stdout().flush();
    });

    let summary = tokio::select! {
        result = wait => result?,
        _ = tokio::signal::ctrl_c() => {
            println!();
            warn!("Stopped waiting; group {} keeps running on the workers", group.id());
            return Ok(ExitCode::from(130));
        }
    };
    println!();

    if summary.has_failures() {
        let fail_message = "Some videos failed to encode! Please check the queue.";
        println!("{}", fail_message.red());
        notifier.notify(fail_message);
    }

    let complete_message = format!(
        "Completed encoding {} videos in {}s",
        summary.completed,
        summary.elapsed.as_secs()
    );
    println!("{}", complete_message.green());
    notifier.notify(&complete_message);

    Ok(ExitCode::SUCCESS)
}
