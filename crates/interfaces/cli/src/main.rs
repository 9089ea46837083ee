use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use soma_config::SomaConfig;
use soma_insight::{InsightEngine, Response, ResponseTrimmer, WarningSeverity};
use soma_memory::{
    Event, EventLog, Feedback, MemoryBuilder, MemoryManager, MemoryRecord, MemoryStore,
    MemoryUpdater, TreatmentUse,
};

const CONFIG_PATH: &str = "config/soma.toml";

#[derive(Debug, Parser)]
#[command(name = "soma", version, about = "Personal symptom and trigger memory")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log an event, learn from it, and print insights.
    Log {
        /// Symptom experienced; repeatable.
        #[arg(long = "symptom", value_name = "NAME")]
        symptoms: Vec<String>,
        #[arg(long)]
        food: Option<String>,
        /// Severity 1 (mild) to 5 (severe).
        #[arg(long, default_value_t = 1)]
        severity: u8,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        note: Option<String>,
        /// Treatment taken, as "name:effectiveness" with effectiveness 1-10;
        /// repeatable.
        #[arg(long = "treatment", value_name = "NAME:RATING")]
        treatments: Vec<String>,
        #[arg(long)]
        pressure: Option<String>,
        #[arg(long)]
        moon: Option<String>,
        #[arg(long)]
        season: Option<String>,
        /// Print the raw structured response as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Rebuild all memories from the full event history.
    Analyze,
    /// Re-run insights for the most recent logged event.
    Respond {
        #[arg(long)]
        json: bool,
    },
    /// Run the memory health pass.
    Maintain {
        /// Ignore the minimum-interval gate.
        #[arg(long)]
        force: bool,
    },
    /// Show memory counts per kind.
    Stats,
    /// React to a surfaced memory by id (prefixes accepted).
    Feedback {
        #[arg(value_name = "MEMORY_ID")]
        id: String,
        #[arg(value_enum)]
        feedback: CliFeedback,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliFeedback {
    Helped,
    DidntHelp,
    NotSure,
    NotRelevant,
    /// Dismissed without judging it; repeated ignores cool the memory down.
    Ignored,
}

impl CliFeedback {
    fn into_feedback(self) -> Option<Feedback> {
        match self {
            Self::Helped => Some(Feedback::Helped),
            Self::DidntHelp => Some(Feedback::DidntHelp),
            Self::NotSure => Some(Feedback::NotSureYet),
            Self::NotRelevant => Some(Feedback::NotRelevant),
            Self::Ignored => None,
        }
    }
}

struct Paths {
    events: PathBuf,
    snapshot: PathBuf,
}

fn data_paths(config: &SomaConfig) -> Paths {
    let dir = PathBuf::from(&config.memory.data_dir);
    Paths { events: dir.join("events.jsonl"), snapshot: dir.join("memory.json") }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = SomaConfig::load_from(CONFIG_PATH)?;
    let paths = data_paths(&config);
    let log = EventLog::new(&paths.events);

    match cli.command {
        Commands::Log {
            symptoms,
            food,
            severity,
            category,
            note,
            treatments,
            pressure,
            moon,
            season,
            json,
        } => {
            if !(1..=5).contains(&severity) {
                bail!("severity must be between 1 and 5");
            }
            let now = Utc::now();
            let mut event = Event::new(now);
            event.symptoms = symptoms;
            event.food_item = food;
            event.severity = severity;
            event.category = category;
            event.notes = note;
            event.treatments = parse_treatments(&treatments)?;
            event.environment.pressure = pressure;
            event.environment.moon_phase = moon;
            event.environment.season = season;

            let recent = recent_events(&log, &config, Some(event.id))?;
            log.append(&event).await?;

            let mut manager = MemoryManager::load_from(&paths.snapshot)?;
            manager.set_learning_paused(config.memory.learning_paused);
            let updater = MemoryUpdater::new(config.memory.detail);
            if let Some(summary) = manager.observe_event(&updater, &event, now) {
                tracing::info!(
                    updated = summary.updated,
                    created = summary.created,
                    "event learned"
                );
            }

            let response = respond_to(&config, &mut manager, &event, &recent);
            manager.save_to(&paths.snapshot)?;
            print_response(&response, json)?;
        }
        Commands::Analyze => {
            let events = log.load_sorted()?;
            if events.is_empty() {
                println!("no events logged yet");
                return Ok(());
            }
            log.backup()?;
            // Compact the log: rewritten in chronological order, minus any
            // corrupt lines the load skipped.
            log.overwrite(&events).await?;
            let mut manager = MemoryManager::load_from(&paths.snapshot)?;
            let builder = MemoryBuilder::new(config.memory.detail);
            let built = manager.rebuild_from_history(&builder, &events, Utc::now());
            manager.save_to(&paths.snapshot)?;
            println!("rebuilt {built} memories from {} events", events.len());
        }
        Commands::Respond { json } => {
            let mut events = log.load_sorted()?;
            let Some(event) = events.pop() else {
                println!("no events logged yet");
                return Ok(());
            };
            let limit = config.insight.recent_event_limit;
            if events.len() > limit {
                events.drain(..events.len() - limit);
            }
            let mut manager = MemoryManager::load_from(&paths.snapshot)?;
            let response = respond_to(&config, &mut manager, &event, &events);
            manager.save_to(&paths.snapshot)?;
            print_response(&response, json)?;
        }
        Commands::Maintain { force } => {
            let mut manager = MemoryManager::load_from(&paths.snapshot)?;
            match manager.run_maintenance(config.memory.maintenance_interval_hours, force, Utc::now())
            {
                Some(report) => {
                    manager.save_to(&paths.snapshot)?;
                    println!(
                        "maintenance complete: {} confidence values repaired, {} cooldowns cleared",
                        report.repaired_confidence, report.cooldowns_cleared
                    );
                }
                None => println!("maintenance already ran recently; use --force to override"),
            }
        }
        Commands::Stats => {
            let manager = MemoryManager::load_from(&paths.snapshot)?;
            let stats = manager.stats();
            println!("memories: {} total, {} active", stats.total, stats.active);
            println!("  triggers:        {}", stats.triggers);
            println!("  worked remedies: {}", stats.worked_remedies);
            println!("  failed remedies: {}", stats.failed_remedies);
            println!("  patterns:        {}", stats.patterns);
            println!("  correlations:    {}", stats.correlations);
            println!("  preferences:     {}", stats.preferences);
        }
        Commands::Feedback { id, feedback } => {
            let mut manager = MemoryManager::load_from(&paths.snapshot)?;
            let target = resolve_id(manager.store().all(), &id)?;
            let now = Utc::now();
            match feedback.into_feedback() {
                Some(feedback) => manager.record_feedback(target, feedback, now),
                None => manager.mark_ignored(target, now),
            };
            manager.save_to(&paths.snapshot)?;
            println!("feedback recorded for {}", &target.to_string()[..8]);
        }
    }

    Ok(())
}

/// Events preceding the one being handled, newest-last, capped by config.
fn recent_events(log: &EventLog, config: &SomaConfig, exclude: Option<Uuid>) -> Result<Vec<Event>> {
    let mut events = log.load_sorted()?;
    if let Some(id) = exclude {
        events.retain(|e| e.id != id);
    }
    let limit = config.insight.recent_event_limit;
    if events.len() > limit {
        events.drain(..events.len() - limit);
    }
    Ok(events)
}

/// Generate, trim, and record show-state for one insight pass.
fn respond_to(
    config: &SomaConfig,
    manager: &mut MemoryManager,
    event: &Event,
    recent: &[Event],
) -> Response {
    let now = Utc::now();
    let engine = InsightEngine::new(
        config.insight.suggestion_level,
        config.profile.allergies.clone(),
    );
    let active = manager.store().active();
    let mut response = engine.generate(event, &active, recent, now);
    ResponseTrimmer::new(config.insight.response_char_budget).trim(&mut response);

    let shown: Vec<Uuid> = response
        .observations
        .iter()
        .filter_map(|o| o.memory_id)
        .chain(response.suggestions.iter().filter_map(|s| s.memory_id))
        .collect();
    for id in shown {
        manager.mark_shown(id, now);
    }
    response
}

fn parse_treatments(raw: &[String]) -> Result<Vec<TreatmentUse>> {
    raw.iter()
        .map(|entry| {
            let Some((name, rating)) = entry.rsplit_once(':') else {
                bail!("treatment must look like name:effectiveness, got {entry:?}");
            };
            let effectiveness: u8 = rating
                .parse()
                .ok()
                .filter(|r| (1..=10).contains(r))
                .ok_or_else(|| anyhow::anyhow!("effectiveness must be 1-10, got {rating:?}"))?;
            Ok(TreatmentUse { name: name.trim().to_string(), effectiveness })
        })
        .collect()
}

/// Resolve a full or prefix memory id against the store.
fn resolve_id(records: &[MemoryRecord], prefix: &str) -> Result<Uuid> {
    let matches: Vec<Uuid> = records
        .iter()
        .filter(|r| r.id.to_string().starts_with(&prefix.to_lowercase()))
        .map(|r| r.id)
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("no memory matches id {prefix:?}"),
        _ => bail!("id {prefix:?} is ambiguous, give more characters"),
    }
}

fn print_response(response: &Response, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(response)?);
        return Ok(());
    }
    if response.is_empty() {
        println!("nothing to report for this one. logged.");
        return Ok(());
    }

    for warning in &response.warnings {
        let marker = match warning.severity {
            WarningSeverity::Alert => "!!",
            WarningSeverity::Caution => "!",
            WarningSeverity::Info => "i",
        };
        println!("[{marker}] {}", warning.text);
    }
    for observation in &response.observations {
        let id = observation
            .memory_id
            .map(|id| format!(" ({})", &id.to_string()[..8]))
            .unwrap_or_default();
        println!("- {} [{}]{id}", observation.text, observation.confidence.label());
    }
    for suggestion in &response.suggestions {
        let id = suggestion
            .memory_id
            .map(|id| format!(" ({})", &id.to_string()[..8]))
            .unwrap_or_default();
        println!("* {}{id}", suggestion.text);
    }
    for question in &response.questions {
        println!("? {question}");
    }
    if let Some(message) = &response.needs_more_data {
        println!("… {message}");
    }
    Ok(())
}
