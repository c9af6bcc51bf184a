//! Execflow CLI binary.
//!
//! Triggers executions on the configured service and watches them to
//! completion, or checks the status of a previously triggered execution.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use execflow_client::{
    ApiClient, CallHistory, ClientConfig, ExecutionPhase, ExecutionTracker, Notification,
    NotificationKind, NotificationSink, ProcessType, TrackerConfig, TriggerPayload,
};

#[derive(Parser)]
#[command(
    name = "execflow",
    version,
    about = "Trigger asynchronous executions and watch them to completion"
)]
struct Cli {
    /// Execution service endpoint (overrides EXECFLOW_ENDPOINT)
    #[arg(long, global = true)]
    endpoint: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Trigger an execution with an optional message payload
    Trigger {
        /// Message forwarded in the trigger payload
        #[arg(long)]
        message: Option<String>,

        /// Submit only; do not poll until completion
        #[arg(long)]
        no_watch: bool,
    },

    /// Trigger a data-processing execution over a list of items
    Process {
        /// Items, comma- or newline-separated
        #[arg(long)]
        items: String,

        /// Processing strategy: parallel, loop, or whole
        #[arg(long, default_value = "parallel")]
        process_type: String,

        /// Optional positive concurrency hint
        #[arg(long)]
        max_concurrency: Option<String>,

        /// Submit only; do not poll until completion
        #[arg(long)]
        no_watch: bool,

        /// Print the recorded API calls after completion
        #[arg(long)]
        history: bool,
    },

    /// Check the status of an execution once
    Status {
        execution_id: String,

        /// Print the raw JSON response
        #[arg(long)]
        json: bool,
    },
}

/// Sink that prints notifications to the terminal.
struct TermSink;

impl NotificationSink for TermSink {
    fn publish(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Success => {
                println!("\x1b[32m*\x1b[0m {}", notification.message);
            }
            NotificationKind::Error => {
                eprintln!("\x1b[31m!\x1b[0m {}", notification.message);
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn,execflow_client=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut config = ClientConfig::from_env();
    if let Some(endpoint) = cli.endpoint.clone() {
        config.endpoint = endpoint;
    }
    tracing::debug!(endpoint = %config.endpoint, "Configuration loaded");

    match cli.command {
        Commands::Trigger { message, no_watch } => {
            run_tracked(&config, TriggerPayload::message(message), no_watch, false).await
        }
        Commands::Process {
            items,
            process_type,
            max_concurrency,
            no_watch,
            history,
        } => {
            let process_type: ProcessType = match process_type.parse() {
                Ok(parsed) => parsed,
                Err(e) => {
                    eprintln!("\x1b[31mValidation error:\x1b[0m {}", e);
                    std::process::exit(2);
                }
            };

            let payload =
                match TriggerPayload::process(process_type, &items, max_concurrency.as_deref()) {
                    Ok(payload) => payload,
                    Err(e) => {
                        eprintln!("\x1b[31mValidation error:\x1b[0m {}", e);
                        std::process::exit(2);
                    }
                };

            run_tracked(&config, payload, no_watch, history).await
        }
        Commands::Status { execution_id, json } => get_status(&config, &execution_id, json).await,
    }
}

async fn run_tracked(
    config: &ClientConfig,
    payload: TriggerPayload,
    no_watch: bool,
    show_history: bool,
) -> Result<()> {
    let client = ApiClient::from_config(config);
    let tracker_config = TrackerConfig::with_poll_interval(config.poll_interval);
    let tracker = ExecutionTracker::new(client, tracker_config, TermSink);

    let mut state = tracker.submit(payload).await;

    if !state.phase.is_terminal() {
        if no_watch {
            tracker.cancel();
            if let Some(id) = &state.execution_id {
                println!("\nTo check status:");
                println!("  execflow status {}", id);
            }
        } else {
            println!(
                "Polling every {} ms until completion...",
                config.poll_interval.as_millis()
            );
            state = tracker.wait_until_terminal().await;
        }
    }

    if show_history {
        print_history(tracker.history());
    }

    match state.phase {
        ExecutionPhase::Succeeded => {
            if let Some(output) = &state.output {
                println!("\nOutput:");
                println!("{}", serde_json::to_string_pretty(output)?);
            }
            Ok(())
        }
        ExecutionPhase::Failed => {
            // The failure notification was already printed by the sink.
            std::process::exit(1);
        }
        _ => Ok(()),
    }
}

fn print_history(history: &CallHistory) {
    let entries = history.entries();
    if entries.is_empty() {
        println!("\nNo API calls recorded");
        return;
    }

    println!("\nAPI calls ({}, newest first):", entries.len());
    for record in entries {
        println!(
            "  {} {} at {}",
            record.method,
            record.endpoint,
            record.timestamp.format("%H:%M:%S%.3f")
        );
        if let Some(response) = &record.response {
            println!("    response: {}", response);
        }
    }
}

async fn get_status(config: &ClientConfig, execution_id: &str, json_only: bool) -> Result<()> {
    let client = ApiClient::from_config(config);
    let response = client
        .get(&format!("check?executionId={}", execution_id))
        .await;

    if !response.success {
        eprintln!(
            "Failed to get status: {} - {}",
            response.status,
            response.error.as_deref().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    let data = response.data.unwrap_or(serde_json::Value::Null);
    if json_only {
        println!("{}", serde_json::to_string(&data)?);
        return Ok(());
    }

    let status = data
        .get("status")
        .and_then(|v| v.as_str())
        .unwrap_or("pending");
    let status_color = match status {
        "SUCCEEDED" | "SUCCESS" => "\x1b[32m", // green
        "FAILED" | "FAILURE" => "\x1b[31m",    // red
        _ => "\x1b[33m",                       // yellow
    };

    println!("\n{}{}\x1b[0m", status_color, "=".repeat(60));
    println!("Execution: {}", execution_id);
    println!("Status:    {}{}\x1b[0m", status_color, status);
    for field in ["output", "result"] {
        if let Some(output) = data.get(field) {
            println!("Output:    {}", serde_json::to_string_pretty(output)?);
            break;
        }
    }
    for field in ["cause", "error"] {
        if let Some(cause) = data.get(field) {
            println!("\x1b[31mCause:\x1b[0m     {}", cause);
            break;
        }
    }
    println!("{}{}\x1b[0m\n", status_color, "=".repeat(60));
    println!("Use --json for the full response");

    Ok(())
}
