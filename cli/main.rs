#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::Parser;
use oncotrial::pipeline::{self, RunConfig};
use std::path::PathBuf;
use std::process;

/// Descriptive statistics and comparative charts for murine oncology trials.
#[derive(Parser)]
#[command(name = "oncotrial", version, about)]
struct Cli {
    /// Path to the subject-drug assignment CSV (Mouse ID, Drug[, Dosage])
    #[arg(long, default_value = "data/mouse_drug_data.csv")]
    mouse_data: PathBuf,

    /// Path to the longitudinal observation CSV (Mouse ID, Timepoint, ...)
    #[arg(long, default_value = "data/clinicaltrial_data.csv")]
    clinical_data: PathBuf,

    /// Directory the rendered charts (and tables) are written to
    #[arg(long, default_value = "images")]
    out_dir: PathBuf,

    /// Also write the aggregate tables as TSV files
    #[arg(long)]
    tables: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = RunConfig {
        mouse_data: cli.mouse_data,
        clinical_data: cli.clinical_data,
        out_dir: cli.out_dir,
        write_tables: cli.tables,
    };

    match pipeline::run(&config) {
        Ok(summary) => {
            println!(
                "Analyzed {} records from {} subjects.",
                summary.records, summary.subjects
            );
            for path in &summary.outputs {
                println!("  wrote {}", path.display());
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
