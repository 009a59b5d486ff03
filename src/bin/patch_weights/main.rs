//! Bulk edits of a weights interchange file.
//!
//! Usage: patch_weights <COMMAND> <GROUP> [VALUE] <WEIGHTS_FILE> [DEST_WEIGHTS_FILE]
//!
//! The edited document is written to `result.json` unless `--output` says
//! otherwise. Any failure exits with status 1.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{Parser, Subcommand};

use drape::weights::WeightsDocument;

#[derive(Parser)]
#[command(name = "patch_weights")]
#[command(author, version, about = "Edit vertex groups in a weights file", long_about = None)]
struct Cli {
    /// Where to write the edited document
    #[arg(short, long, global = true, default_value = "result.json")]
    output: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Remove all weights of a group, leaving an empty list
    Nuke {
        /// Vertex group name
        group: String,

        /// Weights file
        weights_file: PathBuf,
    },

    /// Replace every weight of a group with one value
    Fill {
        /// Vertex group name
        group: String,

        /// Replacement weight
        value: f64,

        /// Weights file
        weights_file: PathBuf,
    },

    /// Copy a group's weights from one file into another
    Patch {
        /// Vertex group name
        group: String,

        /// Weights file to read the group from
        source: PathBuf,

        /// Weights file to patch
        dest: PathBuf,
    },
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::FAILURE,
            };
        }
    };

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let edited = match &cli.command {
        Commands::Nuke {
            group,
            weights_file,
        } => load(weights_file)?.nuke(group)?,

        Commands::Fill {
            group,
            value,
            weights_file,
        } => load(weights_file)?.fill(group, *value)?,

        Commands::Patch {
            group,
            source,
            dest,
        } => {
            let source = load(source)?;
            load(dest)?.patch(group, &source)?
        }
    };

    edited.save(&cli.output)?;
    println!("Saved: {}", cli.output.display());
    Ok(())
}

fn load(path: &Path) -> Result<WeightsDocument, Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("{} does not exist", path.display()).into());
    }
    Ok(WeightsDocument::load(path)?)
}
