use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use pulse_points::allocation::{
    allocate_detailed, AllocationError, AllocationRequest, Difficulty, TaskCategory,
};
use pulse_points::award::{Allocator, AwardError, CompletionEvent};
use pulse_points::ledger::{
    get_ledger_path, summarize_all_weeks, summarize_user, summarize_week, JsonLedger, Ledger,
};
use pulse_points::settings::{self, FileSettingsStore, SettingsReadError};
use pulse_points::{output, program};

const EXIT_SUCCESS: i32 = 0;
const EXIT_CONFIG: i32 = 4;
const EXIT_REQUEST: i32 = 5;
const EXIT_STORAGE: i32 = 6;

const LEDGER_WRITE_ATTEMPTS: u32 = 3;

#[derive(Subcommand, Debug)]
enum SettingsCommand {
    /// Print the current allocation settings
    Show,
    /// Write default values for every unset key
    Init,
    /// Change one setting (dollar amounts like "1000" or "12.50")
    Set { key: String, value: String },
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manage allocation settings
    Settings {
        #[command(subcommand)]
        command: SettingsCommand,
    },
    /// Price a completion without recording it
    Allocate {
        /// Task category (pulse_survey, personal_development, learning_module, check_in)
        #[arg(long)]
        category: TaskCategory,
        #[arg(long)]
        difficulty: Option<Difficulty>,
        /// Program week (1-based)
        #[arg(long, default_value_t = 1)]
        week: u32,
        /// Cents already spent this week
        #[arg(long, default_value_t = 0)]
        used: u64,
        /// Cents already spent over the whole program
        #[arg(long, default_value_t = 0)]
        spent: u64,
    },
    /// Award points for a completed task and record the spend
    Award {
        #[arg(long)]
        user: String,
        #[arg(long)]
        task: String,
        #[arg(long)]
        category: TaskCategory,
        #[arg(long)]
        difficulty: Option<Difficulty>,
        /// Program week (defaults to the week of today's date)
        #[arg(long)]
        week: Option<u32>,
    },
    /// Weekly budget overview, or one participant's points balance
    Report {
        #[arg(long)]
        week: Option<u32>,
        /// Show this participant's balance instead of the weekly budget
        #[arg(long)]
        user: Option<String>,
    },
    /// Print recorded allocations as TSV
    Export {
        #[arg(long)]
        week: Option<u32>,
    },
}

#[derive(Parser, Debug)]
#[command(name = "pulse-points")]
#[command(about = "Point allocation with weekly budget tracking", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Data directory (defaults to ~/.config/pulse-points)
    #[arg(short, long, global = true)]
    dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let code = match run(cli) {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            exit_code(&e)
        }
    };
    std::process::exit(code);
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(error: &anyhow::Error) -> i32 {
    match error.downcast_ref::<AwardError>() {
        Some(AwardError::Allocation(inner)) => return allocation_exit_code(inner),
        Some(AwardError::Settings(_)) => return EXIT_CONFIG,
        Some(
            AwardError::LedgerRead(_) | AwardError::LedgerLock(_) | AwardError::LedgerWrite { .. },
        ) => return EXIT_STORAGE,
        None => {}
    }
    if error.downcast_ref::<SettingsReadError>().is_some() {
        return EXIT_CONFIG;
    }
    match error.downcast_ref::<AllocationError>() {
        Some(inner) => allocation_exit_code(inner),
        None => EXIT_STORAGE,
    }
}

fn allocation_exit_code(error: &AllocationError) -> i32 {
    match error {
        AllocationError::InvalidConfig(_) => EXIT_CONFIG,
        AllocationError::InvalidRequest(_) => EXIT_REQUEST,
    }
}

struct Paths {
    settings: PathBuf,
    ledger: PathBuf,
}

fn resolve_paths(dir: Option<PathBuf>) -> Result<Paths> {
    match dir {
        Some(dir) => Ok(Paths {
            settings: dir.join("settings.yaml"),
            ledger: dir.join("ledger.json"),
        }),
        None => Ok(Paths {
            settings: settings::get_settings_path()?,
            ledger: get_ledger_path()?,
        }),
    }
}

fn run(cli: Cli) -> Result<()> {
    let paths = resolve_paths(cli.dir)?;
    let use_colors = output::should_use_colors();
    tracing::debug!(
        settings = %paths.settings.display(),
        ledger = %paths.ledger.display(),
        "paths resolved"
    );

    match cli.command {
        Commands::Settings { command } => {
            run_settings(command, FileSettingsStore::new(paths.settings), use_colors)
        }
        Commands::Allocate {
            category,
            difficulty,
            week,
            used,
            spent,
        } => {
            let store = FileSettingsStore::new(paths.settings);
            let config = settings::load_allocation_config(&store)?;
            let mut request = AllocationRequest::new(category, week)
                .with_weekly_used(used)
                .with_program_spent(spent);
            if let Some(difficulty) = difficulty {
                request = request.with_difficulty(difficulty);
            }
            let outcome = allocate_detailed(&config, &request)?;
            println!("{}", output::format_outcome(&outcome, use_colors));
            Ok(())
        }
        Commands::Award {
            user,
            task,
            category,
            difficulty,
            week,
        } => {
            let store = FileSettingsStore::new(paths.settings);
            let week_index = match week {
                Some(week) => week,
                None => {
                    let start = settings::load_program_start(&store)?;
                    program::current_week(start, chrono::Local::now().date_naive())
                }
            };
            let event = CompletionEvent {
                user_id: user,
                task_id: task,
                category,
                difficulty,
                week_index,
            };

            let allocator = Allocator::new(store, JsonLedger::new(paths.ledger));
            let record = allocator.award_with_retry(&event, LEDGER_WRITE_ATTEMPTS)?;
            println!(
                "Awarded {} points ({}) to {} for {} in week {}",
                record.points_awarded,
                output::format_money(record.cost_cents),
                record.user_id,
                record.task_id,
                record.week_index
            );
            Ok(())
        }
        Commands::Report { week, user } => {
            let store = FileSettingsStore::new(paths.settings);
            let config = settings::load_allocation_config(&store)?;
            let program_start = settings::load_program_start(&store)?;
            let records = JsonLedger::new(paths.ledger).records()?;

            if let Some(user) = user {
                let records: Vec<_> = records
                    .into_iter()
                    .filter(|r| week.map_or(true, |w| r.week_index == w))
                    .collect();
                let summary = summarize_user(&records, &user);
                println!("{}", output::format_user_summary(&summary, use_colors));
                return Ok(());
            }

            let summaries = match week {
                Some(week) => vec![summarize_week(&records, week, &config)],
                None => summarize_all_weeks(&records, &config),
            };
            if summaries.is_empty() {
                println!("No allocations recorded yet.");
                return Ok(());
            }

            let blocks: Vec<String> = summaries
                .iter()
                .map(|s| output::format_week_summary(s, program_start, use_colors))
                .collect();
            println!("{}", blocks.join("\n\n"));
            Ok(())
        }
        Commands::Export { week } => {
            let ledger = JsonLedger::new(paths.ledger);
            let records = match week {
                Some(week) => ledger.allocations_in_week(week)?,
                None => ledger.records()?,
            };
            if !records.is_empty() {
                println!("{}", output::format_tsv(&records));
            }
            Ok(())
        }
    }
}

fn run_settings(
    command: SettingsCommand,
    mut store: FileSettingsStore,
    use_colors: bool,
) -> Result<()> {
    match command {
        SettingsCommand::Show => {
            let config = settings::load_allocation_config(&store)?;
            println!("{}", output::format_config(&config, use_colors));
            if let Some(start) = settings::load_program_start(&store)? {
                println!("  Program start: {}", start);
            }
        }
        SettingsCommand::Init => {
            let written = settings::write_defaults(&mut store)?;
            if written.is_empty() {
                println!("All settings already present in {}", store.path().display());
            } else {
                println!(
                    "Wrote defaults for {} to {}",
                    written.join(", "),
                    store.path().display()
                );
            }
        }
        SettingsCommand::Set { key, value } => {
            let config = settings::update_setting(&mut store, &key, &value)
                .with_context(|| format!("Refusing to set '{}'", key))?;
            println!("Set {} = {}", key, value.trim());
            println!("{}", output::format_config(&config, use_colors));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_read_failures_exit_as_config_errors() {
        let direct = anyhow::Error::new(SettingsReadError(anyhow::anyhow!("permission denied")));
        assert_eq!(exit_code(&direct), EXIT_CONFIG);

        let wrapped = direct.context("Refusing to set 'total_budget'");
        assert_eq!(exit_code(&wrapped), EXIT_CONFIG);

        let via_award = anyhow::Error::new(AwardError::Settings(anyhow::anyhow!("unreadable")));
        assert_eq!(exit_code(&via_award), EXIT_CONFIG);
    }

    #[test]
    fn test_exit_codes_by_failure_kind() {
        let invalid = anyhow::Error::new(AllocationError::invalid_config("points_per_dollar"));
        assert_eq!(exit_code(&invalid), EXIT_CONFIG);

        let request = anyhow::Error::new(AllocationError::InvalidRequest("week 0".to_string()));
        assert_eq!(exit_code(&request), EXIT_REQUEST);

        let lock = anyhow::Error::new(AwardError::LedgerLock(anyhow::anyhow!("busy")));
        assert_eq!(exit_code(&lock), EXIT_STORAGE);

        assert_eq!(exit_code(&anyhow::anyhow!("disk full")), EXIT_STORAGE);
    }
}
