//! hwdb command line tool
//!
//! `hwdb --update` compiles the hardware description sources into the
//! binary database; `hwdb --query MODALIAS` resolves a device match string
//! against it. Without arguments the usage text is printed.

use std::path::PathBuf;

use anyhow::Context;
use clap::{CommandFactory, Parser};

/// Default source directories, later entries override earlier ones
const DEFAULT_SOURCE_DIRS: &[&str] = &["/usr/lib/udev/hwdb.d", "/etc/udev/hwdb.d"];

/// Maintain the hardware database index
#[derive(Parser)]
#[command(name = "hwdb", version, about)]
struct Cli {
    /// Update the hardware database
    #[arg(long)]
    update: bool,

    /// Query the database for a device match string
    #[arg(long, value_name = "MODALIAS")]
    query: Option<String>,

    /// Read source files from DIR instead of the default directories
    ///
    /// May be given several times; later directories override earlier ones.
    #[arg(long, value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Path of the binary database
    #[arg(long, value_name = "PATH", default_value = "/etc/udev/hwdb.bin")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !cli.update && cli.query.is_none() {
        Cli::command().print_help()?;
        return Ok(());
    }

    if cli.update {
        let dirs: Vec<PathBuf> = if cli.include.is_empty() {
            DEFAULT_SOURCE_DIRS.iter().map(PathBuf::from).collect()
        } else {
            cli.include.clone()
        };
        hwdb::update(&dirs, &cli.output).with_context(|| {
            format!(
                "failure writing hardware database '{}'",
                cli.output.display()
            )
        })?;
    }

    if let Some(modalias) = &cli.query {
        let db = hwdb::Database::open(&cli.output).with_context(|| {
            format!("failed to open hardware database '{}'", cli.output.display())
        })?;
        for (key, value) in db.query(modalias)? {
            println!("{key}={value}");
        }
    }

    Ok(())
}
