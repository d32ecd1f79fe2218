use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use rusqlite::Connection;
use thiserror::Error;

use frontdesk::config::{self, Settings};
use frontdesk::db::{self, repository, DatabaseError};
use frontdesk::handlers::HandlerContext;
use frontdesk::knowledge::{self, KnowledgeError};
use frontdesk::pipeline::{
    Classifier, IntakePipeline, KeywordClassifier, KnowledgeBaseRetriever,
    LexiconSentimentEstimator, LlmClassifier, LlmError, LlmResponder, LlmSentimentEstimator,
    OllamaClient, PipelineError, PipelineRun, Responder, SentimentEstimator, TemplateResponder,
};
use frontdesk::scheduling::{find_available_slots, parse_date_hint, pick_time_window};
use frontdesk::seed::{self, SeedError};

#[derive(Debug, Parser)]
#[command(name = "frontdesk", version, about = "Clinic front-office intake assistant")]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the store and apply migrations
    Init,
    /// Insert demo practitioners, sample reports and a starter appointment
    Seed,
    /// Rebuild the knowledge base from the sources directory
    Index,
    /// Run one message through the intake pipeline
    Ask(AskArgs),
    /// List free slots for a practitioner
    Slots(SlotsArgs),
    /// List patients by name
    Patients(ListArgs),
    /// List appointments, most recent first
    Appointments(ListArgs),
}

#[derive(Debug, Args)]
struct AskArgs {
    #[arg(value_name = "MESSAGE", required = true)]
    message: Vec<String>,
    /// Use keyword/lexicon/template collaborators instead of the local model
    #[arg(long)]
    offline: bool,
    /// Print the full pipeline run as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
struct SlotsArgs {
    /// Practitioner name (case-insensitive substring)
    #[arg(long)]
    doctor: String,
    /// Date phrase: today, tomorrow, a weekday or YYYY-MM-DD
    #[arg(long)]
    date: Option<String>,
    /// Time phrase: morning, afternoon or evening
    #[arg(long)]
    time: Option<String>,
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long, default_value_t = 50)]
    limit: usize,
}

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Knowledge(#[from] KnowledgeError),

    #[error(transparent)]
    Seed(#[from] SeedError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("No practitioner matches '{0}'")]
    UnknownPractitioner(String),

    #[error("Cannot encode output: {0}")]
    Json(#[from] serde_json::Error),
}

impl Cli {
    pub fn run(self, settings: &Settings) -> Result<(), CliError> {
        let conn = db::open_database(&settings.db_path)?;
        match self.command {
            Command::Init => {
                println!(
                    "{} {} store ready at {}",
                    config::APP_NAME,
                    config::APP_VERSION,
                    settings.db_path.display()
                );
            }
            Command::Seed => {
                let report =
                    seed::seed_demo_data(&conn, &settings.sources_dir, Utc::now().date_naive())?;
                println!(
                    "Seeded {} practitioners, {} reports, starter appointment: {}",
                    report.practitioners_added,
                    report.reports_imported,
                    if report.appointment_booked { "yes" } else { "no" }
                );
            }
            Command::Index => {
                let report = knowledge::build_index(&conn, &settings.sources_dir)?;
                println!("Indexed {} chunks from {} files", report.chunks, report.files);
            }
            Command::Ask(args) => {
                let message = args.message.join(" ");
                let run = ask(&conn, settings, &message, args.offline)?;
                if args.json {
                    println!("{}", serde_json::to_string_pretty(&run)?);
                } else {
                    println!("{}", run.response);
                }
            }
            Command::Slots(args) => slots(&conn, settings, &args)?,
            Command::Patients(args) => {
                for patient in repository::list_patients(&conn, args.limit)? {
                    println!("{}  {}", patient.id, patient.name);
                }
            }
            Command::Appointments(args) => {
                for appt in repository::list_appointments(&conn, args.limit)? {
                    println!(
                        "{}  {} - {}  {} with {} ({})",
                        appt.start.format("%Y-%m-%d"),
                        appt.start.format("%H:%M"),
                        appt.end.format("%H:%M"),
                        appt.patient,
                        appt.doctor,
                        appt.reason
                    );
                }
            }
        }
        Ok(())
    }
}

fn ask(
    conn: &Connection,
    settings: &Settings,
    message: &str,
    offline: bool,
) -> Result<PipelineRun, CliError> {
    let handlers = HandlerContext::from_settings(conn, settings);
    let retriever = KnowledgeBaseRetriever::new(conn);

    if offline {
        return run_with(
            &KeywordClassifier,
            &LexiconSentimentEstimator,
            &TemplateResponder,
            &retriever,
            handlers,
            settings,
            message,
        );
    }

    let client = OllamaClient::from_settings(settings)?;
    tracing::debug!(model = client.model(), "Using local model collaborators");
    run_with(
        &LlmClassifier::new(&client),
        &LlmSentimentEstimator::new(&client),
        &LlmResponder::new(&client),
        &retriever,
        handlers,
        settings,
        message,
    )
}

fn run_with(
    classifier: &dyn Classifier,
    sentiment: &dyn SentimentEstimator,
    responder: &dyn Responder,
    retriever: &KnowledgeBaseRetriever<'_>,
    handlers: HandlerContext<'_>,
    settings: &Settings,
    message: &str,
) -> Result<PipelineRun, CliError> {
    let pipeline = IntakePipeline::new(classifier, sentiment, retriever, responder, handlers)
        .with_retrieval_k(settings.retrieval_k);
    Ok(pipeline.run(message)?)
}

fn slots(conn: &Connection, settings: &Settings, args: &SlotsArgs) -> Result<(), CliError> {
    let wanted = args.doctor.to_lowercase();
    let doctor = repository::find_practitioners(conn, None)?
        .into_iter()
        .find(|p| p.name.to_lowercase().contains(&wanted))
        .ok_or_else(|| CliError::UnknownPractitioner(args.doctor.clone()))?;

    let day = parse_date_hint(args.date.as_deref(), Utc::now().date_naive());
    let window = pick_time_window(args.time.as_deref());
    let free = find_available_slots(conn, &doctor.id, day, window, settings.slot_minutes)?;

    println!("{} on {}:", doctor.name, day.format("%A %-d %B %Y"));
    if free.is_empty() {
        println!("  no slots available");
    }
    for slot in free {
        println!("  {} - {}", slot.start.format("%H:%M"), slot.end.format("%H:%M"));
    }
    Ok(())
}
