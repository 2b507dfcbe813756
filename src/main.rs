use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Parser, Subcommand};

mod assess;
mod diagnostics;
mod error;
mod llm;
mod models;
mod prompts;
mod report;
mod store;

use diagnostics::DiagnosticsService;
use models::AnalysisOutcome;
use store::ConversationStore;

#[derive(Parser)]
#[command(name = "compass-diagnostics")]
#[command(about = "Diagnostic analysis of student tutoring conversations", long_about = None)]
struct Cli {
    /// Directory holding chat histories and assignment metadata
    #[arg(long, default_value = "compass_data")]
    data_dir: PathBuf,
    /// File holding the API key when ANTHROPIC_API_KEY is unset
    #[arg(long, default_value = "api_key.txt")]
    api_key_file: PathBuf,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a demo assignment with sample chat histories
    Seed,
    /// List students with stored histories for an assignment
    Students {
        #[arg(long)]
        assignment: String,
    },
    /// Analyze all chat histories for an assignment
    Analyze {
        #[arg(long)]
        assignment: String,
        /// Also write the full markdown report to this file
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Analyze, then answer questions interactively against the report
    Review {
        #[arg(long)]
        assignment: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let store = ConversationStore::open(&cli.data_dir)?;

    match cli.command {
        Commands::Seed => {
            let assignment_id = store.seed()?;
            println!(
                "Seeded assignment '{assignment_id}' in {}.",
                cli.data_dir.display()
            );
        }
        Commands::Students { assignment } => {
            let students = store.list_students(&assignment)?;
            if students.is_empty() {
                println!("No chat histories stored for '{assignment}'.");
            } else {
                for student in students {
                    println!("- {student}");
                }
            }
        }
        Commands::Analyze { assignment, out } => {
            let service = build_service(store, &cli.api_key_file)?;
            run_analysis(&service, &assignment, out.as_deref()).await?;
        }
        Commands::Review { assignment } => {
            let service = build_service(store, &cli.api_key_file)?;
            run_analysis(&service, &assignment, None).await?;
            review_loop(&service, &assignment).await?;
        }
    }

    Ok(())
}

fn build_service(
    store: ConversationStore,
    api_key_file: &Path,
) -> anyhow::Result<DiagnosticsService> {
    let engine = llm::ClaudeClient::from_env_or_file(api_key_file)?;
    Ok(DiagnosticsService::new(store, Arc::new(engine)))
}

async fn run_analysis(
    service: &DiagnosticsService,
    assignment: &str,
    out: Option<&Path>,
) -> anyhow::Result<()> {
    match service.analyze(assignment).await? {
        AnalysisOutcome::Report(payload) => {
            println!(
                "Analyzed {} students for '{assignment}'.",
                payload.total_students
            );
            println!();
            println!("{}", payload.overview);
            println!();
            println!("{}", payload.statistics);

            if let Some(path) = out {
                std::fs::write(path, report::build_report(&payload))?;
                println!();
                println!("Report written to {}.", path.display());
            }
        }
        AnalysisOutcome::EmptyCorpus { error, .. } => {
            println!("{error} for '{assignment}'.");
        }
    }

    Ok(())
}

/// Interactive question loop against the in-process report cache.
async fn review_loop(service: &DiagnosticsService, assignment: &str) -> anyhow::Result<()> {
    println!();
    println!("Ask questions about the report (blank line to exit).");

    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.read_line(&mut line)? == 0 {
            break;
        }
        let question = line.trim();
        if question.is_empty() {
            break;
        }

        match service.query(assignment, question).await {
            Ok(answer) => println!("{answer}"),
            Err(err) => eprintln!("query failed: {err}"),
        }
    }

    Ok(())
}
