use chrono::{DateTime, Duration, Utc};
use clap::{Parser, Subcommand};
use regimen_core::*;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "regimen")]
#[command(about = "Supplement interaction and timing engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// User the command acts for
    #[arg(long, global = true, default_value = "default")]
    user: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Log an intake and evaluate it for warnings
    Log {
        /// Intake as supplement:dosage:unit (e.g. zinc:30:mg)
        #[arg(long)]
        entry: String,

        /// Override the intake timestamp (RFC 3339)
        #[arg(long)]
        at: Option<String>,
    },

    /// Evaluate a hypothetical stack without logging it
    Check {
        /// Stack entries as supplement:dosage:unit; repeatable
        #[arg(long = "entry", required = true)]
        entries: Vec<String>,
    },

    /// Show active compounds, exclusion zones and optimizations
    Dashboard,
}

#[tokio::main]
async fn main() -> Result<()> {
    regimen_core::logging::init();

    let cli = Cli::parse();

    let config = Config::load()?;
    let data_dir = cli.data_dir.unwrap_or_else(|| config.data.data_dir.clone());

    match cli.command {
        Commands::Log { entry, at } => cmd_log(data_dir, &config, &cli.user, &entry, at).await,
        Commands::Check { entries } => cmd_check(data_dir, &config, &cli.user, &entries).await,
        Commands::Dashboard => cmd_dashboard(data_dir, &config, &cli.user).await,
    }
}

fn journal_path(data_dir: &PathBuf) -> PathBuf {
    data_dir.join("intake.jsonl")
}

fn validated_catalog() -> Result<&'static Catalog> {
    let catalog = get_default_catalog();
    let errors = catalog.validate();
    if !errors.is_empty() {
        eprintln!("Catalog validation errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        return Err(Error::CatalogValidation("Invalid catalog".into()));
    }
    Ok(catalog)
}

fn parse_entry(raw: &str) -> Result<(String, f64, DoseUnit)> {
    let parts: Vec<&str> = raw.split(':').collect();
    if parts.len() != 3 {
        return Err(Error::Other(format!(
            "Invalid entry '{}': expected supplement:dosage:unit",
            raw
        )));
    }

    let dosage: f64 = parts[1]
        .parse()
        .map_err(|_| Error::Other(format!("Invalid dosage '{}' in entry '{}'", parts[1], raw)))?;
    if dosage <= 0.0 {
        return Err(Error::Other(format!("Dosage must be positive in '{}'", raw)));
    }

    let unit = DoseUnit::parse(parts[2])
        .ok_or_else(|| Error::Other(format!("Unknown unit '{}' in entry '{}'", parts[2], raw)))?;

    Ok((parts[0].to_string(), dosage, unit))
}

fn backend_for(config: &Config, data_dir: &PathBuf) -> Result<FallbackBackend> {
    let local = LocalBackend::new(
        Arc::new(CatalogRules::default()),
        Arc::new(JournalLogStore::new(journal_path(data_dir))),
    );
    let remote = EngineClient::from_config(&config.engine)?;
    Ok(FallbackBackend::new(remote, local))
}

/// Collapse a day's log entries into a stack, keeping the latest dosage
/// per supplement.
fn stack_from_entries(entries: &[LogEntry]) -> Vec<StackEntry> {
    let mut latest: HashMap<&str, &LogEntry> = HashMap::new();
    for entry in entries {
        latest
            .entry(entry.supplement_id.as_str())
            .and_modify(|existing| {
                if entry.logged_at > existing.logged_at {
                    *existing = entry;
                }
            })
            .or_insert(entry);
    }

    let mut stack: Vec<StackEntry> = latest
        .values()
        .map(|e| StackEntry::dosed(e.supplement_id.clone(), e.dosage, e.unit.clone()))
        .collect();
    stack.sort_by(|a, b| a.supplement_id.cmp(&b.supplement_id));
    stack
}

async fn cmd_log(
    data_dir: PathBuf,
    config: &Config,
    user: &str,
    raw_entry: &str,
    at: Option<String>,
) -> Result<()> {
    validated_catalog()?;

    let (supplement_id, dosage, unit) = parse_entry(raw_entry)?;
    let logged_at = match at {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| Error::Other(format!("Invalid --at timestamp: {}", e)))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    let entry = LogEntry {
        id: uuid::Uuid::new_v4(),
        user_id: user.to_string(),
        supplement_id: supplement_id.clone(),
        dosage,
        unit,
        logged_at,
    };

    let path = journal_path(&data_dir);
    let mut journal = JsonlJournal::new(&path);
    journal.append(&entry)?;
    println!("✓ Logged {} {}{}", supplement_id, dosage, entry.unit.as_str());

    // Evaluate the new intake against the rest of the day's stack
    let store = JournalLogStore::new(&path);
    let day_entries = store
        .logs_in_range(user, None, logged_at - Duration::hours(24), logged_at)
        .await?;

    let backend = backend_for(config, &data_dir)?;
    let request = LogEventRequest {
        identity: None,
        user_id: user.to_string(),
        supplement_id,
        logged_at,
        stack: stack_from_entries(&day_entries),
    };

    let warnings = evaluate_log_event(&backend, &request).await?;
    display_log_event_warnings(&warnings);

    Ok(())
}

async fn cmd_check(
    data_dir: PathBuf,
    config: &Config,
    _user: &str,
    raw_entries: &[String],
) -> Result<()> {
    validated_catalog()?;

    let mut stack = Vec::new();
    for raw in raw_entries {
        let (supplement_id, dosage, unit) = parse_entry(raw)?;
        stack.push(StackEntry::dosed(supplement_id, dosage, unit));
    }

    let backend = backend_for(config, &data_dir)?;
    let request = AnalysisRequest {
        identity: None,
        stack,
    };

    let outcome = backend.analyze(&request).await?;
    display_analysis(&outcome);

    Ok(())
}

async fn cmd_dashboard(data_dir: PathBuf, config: &Config, user: &str) -> Result<()> {
    let catalog = validated_catalog()?;

    let rules = CatalogRules::default();
    let logs = JournalLogStore::new(journal_path(&data_dir));

    let snapshot = dashboard_snapshot(
        &rules,
        &logs,
        catalog,
        &config.simulation,
        user,
        Utc::now(),
    )
    .await?;

    display_dashboard(catalog, &snapshot);
    Ok(())
}

fn severity_marker(severity: &Severity) -> &'static str {
    match severity {
        Severity::Critical => "!!",
        Severity::Medium => " !",
        Severity::Low => "  ",
    }
}

fn display_analysis(outcome: &AnalysisOutcome) {
    if outcome.is_clean() {
        println!("\nNo warnings for this stack.");
        return;
    }

    if !outcome.interactions.is_empty() {
        println!("\nInteractions:");
        for warning in &outcome.interactions {
            println!(
                "  {} {} × {}: {}",
                severity_marker(&warning.severity),
                warning.source_supplement_id,
                warning.target_supplement_id,
                warning.mechanism
            );
            if let Some(suggestion) = &warning.suggestion {
                println!("       → {}", suggestion);
            }
        }
    }

    if !outcome.synergies.is_empty() {
        println!("\nSynergies:");
        for synergy in &outcome.synergies {
            println!(
                "     {} + {}: {}",
                synergy.source_supplement_id, synergy.target_supplement_id, synergy.mechanism
            );
        }
    }

    if !outcome.ratio_warnings.is_empty() {
        println!("\nRatio warnings:");
        for warning in &outcome.ratio_warnings {
            println!(
                "  {} {}:{} at {} — {}",
                severity_marker(&warning.severity),
                warning.source_supplement_id,
                warning.target_supplement_id,
                warning.actual_ratio,
                warning.message
            );
        }
    }

    if !outcome.ratio_gaps.is_empty() {
        println!("\nMissing counterparts:");
        for gap in &outcome.ratio_gaps {
            println!(
                "  {} {} logged without {} — {}",
                severity_marker(&gap.severity),
                gap.present_supplement_id,
                gap.missing_supplement_id,
                gap.message
            );
        }
    }
}

fn display_log_event_warnings(warnings: &LogEventWarnings) {
    let clean = warnings.interactions.is_empty()
        && warnings.synergies.is_empty()
        && warnings.ratio_warnings.is_empty()
        && warnings.ratio_gaps.is_empty()
        && warnings.timing_warnings.is_empty();

    if clean {
        println!("No warnings for this intake.");
        return;
    }

    let analysis = AnalysisOutcome {
        interactions: warnings.interactions.clone(),
        synergies: warnings.synergies.clone(),
        ratio_warnings: warnings.ratio_warnings.clone(),
        ratio_gaps: warnings.ratio_gaps.clone(),
        served_by: warnings.served_by.clone(),
    };
    display_analysis(&analysis);

    if !warnings.timing_warnings.is_empty() {
        println!("\nTiming conflicts:");
        for warning in &warnings.timing_warnings {
            println!(
                "  {} {} and {} taken {:.1}h apart (minimum {:.1}h) — {}",
                severity_marker(&warning.severity),
                warning.source_supplement_id,
                warning.target_supplement_id,
                warning.actual_hours_apart,
                warning.min_hours_apart,
                warning.reason
            );
        }
    }
}

fn display_dashboard(catalog: &Catalog, snapshot: &DashboardSnapshot) {
    println!("\n╭─────────────────────────────────────────╮");
    println!("│  REGIMEN DASHBOARD        bio score {:>3} │", snapshot.bio_score);
    println!("╰─────────────────────────────────────────╯");

    if snapshot.active_compounds.is_empty() {
        println!("\nNo active compounds.");
    } else {
        println!("\nActive compounds:");
        for compound in &snapshot.active_compounds {
            println!(
                "  {} — {:.1}% ({:?})",
                catalog.supplement_name(&compound.supplement_id),
                compound.concentration_percent,
                compound.phase
            );
        }
    }

    if !snapshot.exclusion_zones.is_empty() {
        println!("\nHold off on:");
        for zone in &snapshot.exclusion_zones {
            println!(
                "  {} for {} min — {}",
                zone.target_supplement_name, zone.minutes_remaining, zone.reason
            );
        }
    }

    if !snapshot.optimizations.is_empty() {
        println!("\nOpportunities:");
        for opportunity in &snapshot.optimizations {
            println!("  • {}", opportunity.title);
            if let Some(warning) = &opportunity.safety_warning {
                println!("    ⚠ {}", warning);
            }
        }
    }

    println!();
}
