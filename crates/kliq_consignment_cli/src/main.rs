//! Consignment settlement CLI.
//!
//! `publishers` lists the publisher identifiers of a master workbook;
//! `liquidate` renders every settlement report and writes them as one zip.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kliq_consignment::{
    LiquidationError, SpecLiquidationOutput, TypeContactBook, generate_reports, package_reports,
    parse_contact_book, parse_publishers,
};

const C_OUTPUT_DEFAULT: &str = "Liquidaciones_Consignaciones.zip";

#[derive(Parser)]
#[command(
    name = "kliq-consignment",
    about = "Compute per-publisher consignment settlements from a master inventory workbook."
)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the publisher identifiers found in a master workbook, one per line.
    Publishers {
        /// Master inventory workbook.
        master: PathBuf,
    },
    /// Render one settlement report per publisher and pack them into a zip.
    Liquidate {
        /// Master inventory workbook.
        #[arg(long, value_name = "PATH")]
        master: PathBuf,

        /// Logo image placed at the top-left corner of every report.
        #[arg(long, value_name = "PATH")]
        logo: Option<PathBuf>,

        /// JSON contact book keyed by publisher identifier.
        #[arg(long, value_name = "PATH")]
        contacts: Option<PathBuf>,

        /// Output zip archive.
        #[arg(long, value_name = "PATH", default_value = C_OUTPUT_DEFAULT)]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "kliq_consignment=info,kliq_consignment_cli=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    match args.command {
        Command::Publishers { master } => {
            for c_id in run_publishers(&master)? {
                println!("{c_id}");
            }
        }
        Command::Liquidate {
            master,
            logo,
            contacts,
            output,
        } => {
            let result = run_liquidate(&master, logo.as_deref(), contacts.as_deref(), &output)?;
            for c_filename in result.filenames() {
                println!("generated: {c_filename}");
            }
            for c_id in &result.no_data {
                println!("no data: {c_id}");
            }
            println!("archive: {}", output.display());
        }
    }
    Ok(())
}

fn run_publishers(master: &Path) -> Result<Vec<String>> {
    let v_bytes =
        fs::read(master).with_context(|| format!("reading master {}", master.display()))?;
    parse_publishers(&v_bytes).context("could not parse upload")
}

fn run_liquidate(
    master: &Path,
    logo: Option<&Path>,
    contacts: Option<&Path>,
    output: &Path,
) -> Result<SpecLiquidationOutput> {
    let v_bytes =
        fs::read(master).with_context(|| format!("reading master {}", master.display()))?;
    let v_logo = logo.and_then(load_logo_bytes);
    let book = contacts.map(load_contact_book).unwrap_or_default();

    let result = generate_reports(&v_bytes, v_logo.as_deref(), Some(&book))
        .context("could not parse upload")?;
    if !result.missing_columns.is_empty() {
        warn!(missing = ?result.missing_columns, "master lacks required columns");
    }
    if result.files.is_empty() {
        return Err(LiquidationError::NoSettlements.into());
    }

    let v_archive = package_reports(&result.files)?;
    fs::write(output, v_archive)
        .with_context(|| format!("writing archive {}", output.display()))?;
    info!(
        n_reports = result.files.len(),
        output = %output.display(),
        "archive written"
    );
    Ok(result)
}

/// An unreadable logo only drops the image from the reports.
fn load_logo_bytes(path: &Path) -> Option<Vec<u8>> {
    match fs::read(path) {
        Ok(v_logo) => Some(v_logo),
        Err(err) => {
            warn!(path = %path.display(), %err, "logo unreadable; reports will have none");
            None
        }
    }
}

/// An unreadable or invalid contact book degrades to an empty one.
fn load_contact_book(path: &Path) -> TypeContactBook {
    let result = fs::read(path)
        .map_err(LiquidationError::from)
        .and_then(|v_bytes| parse_contact_book(&v_bytes));
    match result {
        Ok(book) => book,
        Err(err) => {
            warn!(path = %path.display(), %err, "contact book ignored");
            TypeContactBook::new()
        }
    }
}
