mod error;
mod journal_entry;
mod journal_store;
mod prompt;
mod seed;
mod server;
mod ui;

use chrono::Local;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use journal_entry::{IdScheme, StoredEntry};
use journal_store::{JournalStore, DEFAULT_FILE};
use server::RelayConfig;
use std::{io, net::SocketAddr, path::PathBuf};
use tracing_subscriber::EnvFilter;
use ui::UI;

#[derive(Debug, Parser)]
#[command(name = "journal", version, about = "Append reflections to a JSON learning journal")]
struct Cli {
    /// Journal file holding the JSON array of entries
    #[arg(long, env = "JOURNAL_FILE", default_value = DEFAULT_FILE, global = true)]
    file: PathBuf,

    /// How ids are derived from the creation time
    #[arg(long, env = "JOURNAL_ID_SCHEME", value_enum, default_value_t = IdScheme::Epoch, global = true)]
    id_scheme: IdScheme,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Prompt for a reflection and save it (the default)
    Add,
    /// Append the built-in sample reflections
    Seed,
    /// Browse, search and sort stored reflections
    Browse,
    /// Print entry and word totals
    Stats,
    /// Write a copy of the journal
    Export {
        /// Destination, defaults to reflections-export-<date>.json
        path: Option<PathBuf>,
    },
    /// Append valid, not-yet-stored entries from another journal file
    Import { path: PathBuf },
    /// Serve the static web shell
    Serve {
        #[arg(long, env = "JOURNAL_ADDR", default_value = "127.0.0.1:5000")]
        addr: SocketAddr,
        #[arg(long, env = "JOURNAL_STATIC_DIR", default_value = "static")]
        static_dir: PathBuf,
        #[arg(long, env = "JOURNAL_TEMPLATE_DIR", default_value = "templates")]
        template_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let store = JournalStore::new(&cli.file);

    match cli.command.unwrap_or(Commands::Add) {
        Commands::Add => {
            let stdin = io::stdin();
            prompt::run(&store, cli.id_scheme, &mut stdin.lock(), &mut io::stdout())
                .wrap_err("failed to save reflection")?;
        }
        Commands::Seed => {
            seed::seed(&store, cli.id_scheme, &mut io::stdout())
                .wrap_err("failed to add sample entries")?;
        }
        Commands::Browse => {
            let entries = store.load();
            if entries.is_empty() {
                println!(
                    "No reflections in {} yet. Add one with `journal add`.",
                    store.path().display()
                );
                return Ok(());
            }
            let mut ui = UI::new()?;
            ui.browse(&entries)?;
        }
        Commands::Stats => {
            let summary = journal_store::stats(store.load().iter().map(StoredEntry::word_count));
            println!("Total entries: {}", summary.total_entries);
            println!("Total words: {}", summary.total_words);
            println!("Average words per entry: {:.1}", summary.average_words);
        }
        Commands::Export { path } => {
            let dest = path.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "reflections-export-{}.json",
                    Local::now().format("%Y-%m-%d")
                ))
            });
            let count = store.export_to(&dest).wrap_err("export failed")?;
            if count == 0 {
                println!("No reflections to export; wrote an empty array to {}.", dest.display());
            } else {
                println!("Exported {} reflections to {}.", count, dest.display());
            }
        }
        Commands::Import { path } => {
            let report = store
                .import_from(&path, cli.id_scheme)
                .wrap_err_with(|| format!("failed to import {}", path.display()))?;
            println!(
                "Imported {} new reflections ({} already present, {} without title or content). Total entries now: {}",
                report.imported, report.skipped_duplicates, report.rejected, report.total
            );
            if report.unstructured > 0 {
                println!(
                    "{} imported entries don't match the entry format and were stored as-is.",
                    report.unstructured
                );
            }
        }
        Commands::Serve {
            addr,
            static_dir,
            template_dir,
        } => {
            let config = RelayConfig {
                static_dir,
                template_dir,
            };
            tokio::runtime::Runtime::new()?
                .block_on(server::run(addr, config))
                .wrap_err("web relay stopped")?;
        }
    }

    Ok(())
}
