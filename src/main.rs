use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};

use ticket_triage::batch::{self, ColumnSelector};
use ticket_triage::config::AppConfig;
use ticket_triage::engine::{TicketTypeId, ValidationEngine};
use ticket_triage::error::AppError;
use ticket_triage::fias::ProviderRegistry;
use ticket_triage::store::JsonRuleStore;
use ticket_triage::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "ticket-triage",
    about = "Classify and validate field-service tickets against configured rules",
    version
)]
struct Cli {
    /// Path to the JSON rule snapshot.
    #[arg(long, default_value = "rules.json", global = true)]
    rules: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a single ticket text
    Validate(ValidateArgs),
    /// Validate every row of a CSV file
    Batch(BatchArgs),
    /// Replay all template regression tests
    Templates,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    /// Ticket text; read from stdin when omitted
    text: Option<String>,
    /// Print the detection diagnostics report
    #[arg(long)]
    debug: bool,
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Input CSV file
    input: PathBuf,
    /// Output CSV file for the annotated report
    #[arg(long)]
    output: Option<PathBuf>,
    /// Header name of the column holding the ticket text
    #[arg(long, default_value = "ticket", conflicts_with = "column_index")]
    column: String,
    /// Zero-based index of the ticket text column
    #[arg(long)]
    column_index: Option<usize>,
    /// Pin every row to this ticket type id instead of detecting
    #[arg(long)]
    type_id: Option<u64>,
}

fn main() -> ExitCode {
    match run() {
        Ok(all_valid) => {
            if all_valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<bool, AppError> {
    let cli = Cli::parse();
    let config = AppConfig::load()?;
    telemetry::init(&config)?;

    let registry = ProviderRegistry::from_config(&config.fias)?;
    let provider = registry.select(&config.fias)?;
    let store = Arc::new(JsonRuleStore::new(&cli.rules));
    let engine = ValidationEngine::new(store, provider);

    match cli.command {
        Command::Validate(args) => run_validate(&engine, args),
        Command::Batch(args) => run_batch(&engine, args),
        Command::Templates => run_templates(&engine),
    }
}

fn run_validate(
    engine: &ValidationEngine<JsonRuleStore>,
    args: ValidateArgs,
) -> Result<bool, AppError> {
    let text = match args.text {
        Some(text) => text,
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            buffer
        }
    };

    let (result, report) = engine.validate_ticket_with_report(&text)?;

    if args.debug {
        println!("{}", report.summary());
    }

    match result.detected_type_name() {
        Some(name) => println!("ticket type: {name}"),
        None => println!("ticket type: not detected, validated against all rules"),
    }

    if result.is_valid {
        println!("valid ({} rules checked)", result.rules_evaluated);
    } else {
        println!(
            "invalid ({} of {} rules failed)",
            result.failed_rules.len(),
            result.rules_evaluated
        );
        for failed in &result.failed_rules {
            println!("  - {}", failed.error_message);
        }
    }

    Ok(result.is_valid)
}

fn run_batch(engine: &ValidationEngine<JsonRuleStore>, args: BatchArgs) -> Result<bool, AppError> {
    let column = match args.column_index {
        Some(index) => ColumnSelector::Index(index),
        None => ColumnSelector::Header(args.column.clone()),
    };
    let forced_type = args.type_id.map(TicketTypeId);

    let input = fs::File::open(&args.input)?;
    let report = engine.validate_batch(input, &column, forced_type, None)?;

    println!(
        "{} tickets: {} valid, {} invalid, {} skipped",
        report.total, report.valid, report.invalid, report.skipped
    );

    if let Some(output) = &args.output {
        let file = fs::File::create(output)?;
        batch::write_report(&report, file).map_err(ticket_triage::batch::BatchError::Csv)?;
        println!("report written to {}", output.display());
    }

    Ok(report.invalid == 0)
}

fn run_templates(engine: &ValidationEngine<JsonRuleStore>) -> Result<bool, AppError> {
    let suite = engine.run_all_template_tests()?;

    println!(
        "{} templates: {} passed, {} failed",
        suite.total_templates, suite.templates_passed, suite.templates_failed
    );

    for result in &suite.results {
        let marker = if result.overall_pass { "ok" } else { "FAIL" };
        println!(
            "  [{marker}] {}: {}/{} expectations matched",
            result.template_name, result.rules_matched, result.rules_tested
        );
        for detail in result.details.iter().filter(|detail| !detail.matched()) {
            match &detail.rule_name {
                Some(name) => println!(
                    "      rule '{}': expected {}, got {}",
                    name,
                    pass_label(detail.expect_pass),
                    detail
                        .actual_pass
                        .map(pass_label)
                        .unwrap_or("no result")
                ),
                None => println!(
                    "      rule #{}: missing or inactive",
                    detail.rule_id.0
                ),
            }
        }
    }

    Ok(suite.all_passed)
}

fn pass_label(pass: bool) -> &'static str {
    if pass {
        "pass"
    } else {
        "fail"
    }
}
