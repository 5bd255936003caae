//! policybook CLI - carrier policy and licensing table ingestion
//!
//! Converts a carrier policy export workbook and the licensing CSV tables
//! into the JSON files consumed by the agency app.

mod logging;

use clap::{Parser, Subcommand};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use policybook::licensing::{sync_licensed_agents, LicensingSources};
use policybook::policy::{import_policies, ImportOptions, PolicySummary};
use policybook::render::{to_json, write_json, JsonFormat};
use policybook::WorkbookReader;
use std::io::{self, Write};
use std::path::PathBuf;

/// Carrier policy export and licensing table ingestion
#[derive(Parser)]
#[command(
    name = "policybook",
    version,
    about = "Normalize carrier policy exports and licensing tables to JSON"
)]
struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a carrier policy export workbook
    Policies {
        /// Path to the policy export (.xlsx)
        input: PathBuf,

        /// Output JSON path
        #[arg(short, long)]
        output: PathBuf,

        /// Carrier label written to every record
        #[arg(long, default_value = "F&G")]
        carrier: String,

        /// Output compact JSON (no indentation)
        #[arg(long)]
        compact: bool,
    },

    /// Join the licensing CSV tables
    Licensing {
        /// Directory holding agents.csv, agent_licenses.csv and carrier_contracts.csv
        #[arg(short, long, default_value = "licensing_db")]
        dir: PathBuf,

        /// Override the agents table path
        #[arg(long)]
        agents: Option<PathBuf>,

        /// Override the licenses table path
        #[arg(long)]
        licenses: Option<PathBuf>,

        /// Override the carrier contracts table path
        #[arg(long)]
        carriers: Option<PathBuf>,

        /// Output JSON path
        #[arg(short, long)]
        output: PathBuf,

        /// Output compact JSON (no indentation)
        #[arg(long)]
        compact: bool,
    },

    /// Dump the first worksheet's rows as JSON
    Rows {
        /// Input workbook path
        input: PathBuf,

        /// Output file path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show workbook structure
    Info {
        /// Input workbook path
        input: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    if let Err(e) = run(cli.command) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(command: Commands) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Policies {
            input,
            output,
            carrier,
            compact,
        } => {
            let pb = create_spinner("Reading workbook...");
            let rows = policybook::read_rows(&input)?;

            pb.set_message("Mapping policies...");
            let options = ImportOptions::new().with_carrier(carrier);
            let policies = import_policies(&rows, &options)?;
            write_json(&output, &policies, json_format(compact))?;
            pb.finish_and_clear();

            let summary = PolicySummary::from_policies(&policies);
            println!("policies={}", summary.total);
            let statuses: Vec<String> = summary
                .statuses
                .iter()
                .map(|(status, count)| format!("{}: {}", status, count))
                .collect();
            println!("statuses= {{{}}}", statuses.join(", "));
            println!(
                "{} Wrote policies: {}",
                "✓".green().bold(),
                output.display()
            );
        }

        Commands::Licensing {
            dir,
            agents,
            licenses,
            carriers,
            output,
            compact,
        } => {
            let mut sources = LicensingSources::from_dir(&dir);
            if let Some(path) = agents {
                sources = sources.with_agents(path);
            }
            if let Some(path) = licenses {
                sources = sources.with_licenses(path);
            }
            if let Some(path) = carriers {
                sources = sources.with_carriers(path);
            }

            let rows = sync_licensed_agents(&sources)?;
            write_json(&output, &rows, json_format(compact))?;
            println!(
                "{} Wrote {} rows -> {}",
                "✓".green().bold(),
                rows.len(),
                output.display()
            );
        }

        Commands::Rows { input, output } => {
            let pb = create_spinner("Reading workbook...");
            let rows = policybook::read_rows(&input)?;
            pb.finish_and_clear();

            match output {
                Some(path) => {
                    write_json(&path, &rows, JsonFormat::Pretty)?;
                    println!(
                        "{} Wrote {} rows: {}",
                        "✓".green().bold(),
                        rows.len(),
                        path.display()
                    );
                }
                None => {
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    writeln!(handle, "{}", to_json(&rows, JsonFormat::Pretty)?)?;
                }
            }
        }

        Commands::Info { input } => {
            let reader = WorkbookReader::open(&input)?;
            let rows = reader.rows()?;

            println!("{}", "Workbook Information".cyan().bold());
            println!("{}", "─".repeat(40));
            println!(
                "{}: {}",
                "File".bold(),
                reader.archive().source()
            );
            println!("{}: {}", "First sheet".bold(), reader.sheet().name);
            println!("{}: {}", "Sheet part".bold(), reader.sheet_path());
            println!("{}: {}", "Shared strings".bold(), reader.shared_strings().len());
            println!("{}: {}", "Rows".bold(), rows.len());

            println!("\n{}", "Archive Entries".cyan().bold());
            println!("{}", "─".repeat(40));
            for name in reader.archive().entry_names() {
                println!("  {}", name);
            }
        }

        Commands::Version => {
            print_version();
        }
    }

    Ok(())
}

fn json_format(compact: bool) -> JsonFormat {
    if compact {
        JsonFormat::Compact
    } else {
        JsonFormat::Pretty
    }
}

fn print_version() {
    println!("{} {}", "policybook".green().bold(), env!("CARGO_PKG_VERSION"));
    println!("Carrier policy export and licensing table ingestion");
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_licensing_overrides() {
        let cli = Cli::try_parse_from([
            "policybook",
            "licensing",
            "--dir",
            "db",
            "--carriers",
            "other/contracts.csv",
            "-o",
            "data/licensedAgents.json",
        ])
        .unwrap();
        match cli.command {
            Commands::Licensing { dir, carriers, agents, .. } => {
                assert_eq!(dir, PathBuf::from("db"));
                assert_eq!(carriers, Some(PathBuf::from("other/contracts.csv")));
                assert!(agents.is_none());
            }
            _ => panic!("expected licensing command"),
        }
    }
}
