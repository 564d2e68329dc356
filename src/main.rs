use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use tally::domain::format_duration;
use tally::persistence::{init_local_dir, DataPaths, TaskPersistence};
use tally::{DesktopNotifier, Engine, JsonFileStore, SettingsStore, SystemClock, TaskStatus};

#[derive(Parser)]
#[command(name = "tally")]
#[command(about = "A task lifecycle and time-tracking engine with daily archives", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a local .tally directory in the current directory
    Init,
    /// List tasks by status with their tracked time
    Status,
    /// Run the inactivity and archive sweeps once
    Sweep,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            let data_dir = init_local_dir()?;
            println!("Initialized tally directory: {}", data_dir.display());
            println!();
            println!("Tally will now use this local directory for task storage.");
            Ok(())
        }
        Commands::Status => {
            let (engine, _persistence) = build_engine()?;
            print_status(&engine);
            Ok(())
        }
        Commands::Sweep => {
            let (engine, persistence) = build_engine()?;

            // Back the live document up before the sweeps rewrite it
            if let Some(backup) = persistence.create_backup(Local::now())? {
                println!("Backup created: {}", backup.display());
            }

            let demoted = engine.monitor.sweep()?;
            let archived = engine.reset.sweep()?;
            println!("Sweep complete: {} demoted, {} archived.", demoted, archived);
            Ok(())
        }
    }
}

fn build_engine() -> Result<(Engine, Arc<JsonFileStore>)> {
    let paths = DataPaths::resolve()?;
    eprintln!("Using tally directory: {}", paths.root().display());

    // A data directory that cannot be created is fatal; running with
    // undefined persistence behavior is worse than not starting.
    let persistence = Arc::new(JsonFileStore::open(paths.clone())?);
    let settings = Arc::new(SettingsStore::open(paths.settings_file())?);

    let engine = Engine::new(
        persistence.clone(),
        settings,
        Arc::new(DesktopNotifier),
        Arc::new(SystemClock),
    );
    engine.store.load()?;
    Ok((engine, persistence))
}

fn print_status(engine: &Engine) {
    let tasks = engine.store.snapshot();
    for status in TaskStatus::ALL {
        let collection = tasks.collection(status);
        println!("{} ({})", status.label(), collection.len());
        for task in collection {
            println!(
                "  [{}] {}  {} / {}",
                task.priority.label(),
                task.name,
                format_duration(task.elapsed),
                format_duration(task.estimated),
            );
        }
        println!();
    }

    if engine.reset.needs_reset() {
        println!("Reset boundary crossed; the next sweep will archive yesterday's completed tasks.");
    }
}
