//! Command surface for the interaction log.
//!
//! The UI layer consumes this crate's entrypoints instead of the binary:
//! [`run_cli`] for full parsed execution, [`run_command`] for direct command
//! execution against an existing store handle.

use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use classlog_core::{format_log_timestamp, parse_log_timestamp, Record, RecordInput};
use classlog_store_csv::CsvInteractionStore;

#[derive(Debug, Parser)]
#[command(name = "classlog")]
#[command(about = "Student/AI interaction log")]
pub struct Cli {
    #[arg(long, default_value = "./interactions.csv")]
    log: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Append one prompt/response interaction to the durable log.
    Log(LogArgs),
    /// Show all stored interactions, oldest first.
    List(ListArgs),
    /// Attach a 0-10 score to one stored interaction.
    Grade(GradeArgs),
    /// Materialize the full log as an XLSX workbook.
    Export(ExportArgs),
}

#[derive(Debug, Args)]
pub struct LogArgs {
    #[arg(long)]
    student: String,
    #[arg(long)]
    prompt: String,
    #[arg(long)]
    response: String,
    /// Capture time override, `YYYY-MM-DD HH:MM:SS`; defaults to now.
    #[arg(long)]
    recorded_at: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct GradeArgs {
    /// Zero-based position in the current log view.
    #[arg(long)]
    index: Option<usize>,
    /// Stable sequence number, unaffected by concurrent appends.
    #[arg(long)]
    seq: Option<usize>,
    #[arg(long)]
    score: u8,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[arg(long)]
    output: PathBuf,
}

/// Executes the parsed top-level CLI.
///
/// # Errors
/// Returns an error when the requested command fails against the store.
pub fn run_cli(cli: Cli) -> Result<()> {
    let store = CsvInteractionStore::open(&cli.log);
    run_command(cli.command, &store)
}

/// Executes one parsed command against an existing store handle.
///
/// # Errors
/// Returns an error when argument combinations are invalid or when append,
/// load, grading, or export fails.
pub fn run_command(command: Command, store: &CsvInteractionStore) -> Result<()> {
    match command {
        Command::Log(args) => {
            let input = RecordInput {
                student_name: args.student,
                prompt: args.prompt,
                response: args.response,
                recorded_at: args
                    .recorded_at
                    .as_deref()
                    .map(|raw| {
                        parse_log_timestamp(raw)
                            .map_err(|err| anyhow!("invalid --recorded-at value: {err}"))
                    })
                    .transpose()?,
            };
            let record = store.append(&input)?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }
        Command::List(args) => {
            let records = store.load_all()?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_interaction_table(&records);
            }
            Ok(())
        }
        Command::Grade(args) => {
            let graded = match (args.index, args.seq) {
                (Some(index), None) => store.set_score(index, args.score)?,
                (None, Some(seq)) => store.set_score_by_seq(seq, args.score)?,
                _ => return Err(anyhow!("grade requires exactly one of --index or --seq")),
            };
            println!("{}", serde_json::to_string_pretty(&graded)?);
            Ok(())
        }
        Command::Export(args) => {
            let records = store.load_all()?;
            let bytes = classlog_export_xlsx::export(&records)?;
            std::fs::write(&args.output, bytes)
                .with_context(|| format!("failed writing workbook to {}", args.output.display()))?;
            println!(
                "exported {} interaction(s) to {}",
                records.len(),
                args.output.display()
            );
            Ok(())
        }
    }
}

fn print_interaction_table(records: &[Record]) {
    println!(
        "{:<5} {:<20} {:<30} {:<30} {:<19} score",
        "seq", "student", "prompt", "response", "timestamp"
    );
    println!("{}", "-".repeat(112));

    for record in records {
        let timestamp =
            format_log_timestamp(record.timestamp).unwrap_or_else(|_| "-".to_string());
        println!(
            "{:<5} {:<20} {:<30} {:<30} {:<19} {}",
            record.seq,
            record.student_name,
            record.prompt,
            record.response,
            timestamp,
            record
                .score
                .map_or_else(|| "-".to_string(), |score| score.to_string())
        );
    }
}
