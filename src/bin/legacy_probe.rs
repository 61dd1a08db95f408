//! legacy-probe - inspect legacy POS tables from the command line
//!
//! Usage:
//!   legacy-probe diagnose "data/*.DBF" --expect CODE --expect NAME
//!   legacy-probe diagnose data/PRODUCTS.DBF --table products
//!   legacy-probe sample data/PRODUCTS.DBF --count 5
//!   legacy-probe references "1234567890          FGIFS                 4821"
//!
//! Every command prints JSON on standard output.

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use clap::Subcommand;
use encoding_rs::Encoding;
use legacy_ledger::parse_references;
use legacy_ledger::table::dbf::DbfTableSource;
use legacy_ledger::LegacyTableKind;
use legacy_ledger::SchemaDiagnostic;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "legacy-probe", version, about = "Inspect legacy POS tables")]
struct Cli {
    /// Text encoding label overriding the tables' language driver (e.g. windows-1252)
    #[arg(long, global = true)]
    encoding: Option<String>,

    /// Include records carrying the deletion flag
    #[arg(long, global = true)]
    include_deleted: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report the health and shape of every table matching a glob pattern
    Diagnose {
        /// File path or glob pattern
        pattern: String,

        /// Column the table must declare (repeatable)
        #[arg(long = "expect", value_name = "COLUMN")]
        expected: Vec<String>,

        /// Check the columns a known legacy table needs (e.g. products, cash_cuts)
        #[arg(long)]
        table: Option<LegacyTableKind>,
    },
    /// Print the first readable rows of a table
    Sample {
        path: PathBuf,

        #[arg(long, default_value_t = 10)]
        count: usize,
    },
    /// Decode packed fixed-width document references
    References { text: String },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{json}");
    Ok(())
}

fn diagnostic(cli: &Cli) -> Result<SchemaDiagnostic> {
    let encoding = match cli.encoding.as_deref() {
        Some(label) => Some(
            Encoding::for_label(label.as_bytes()).with_context(|| format!("Unknown text encoding '{label}'"))?,
        ),
        None => None,
    };
    let source = DbfTableSource::new(encoding).include_deleted(cli.include_deleted);
    Ok(SchemaDiagnostic::new(Arc::new(source)))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    match &cli.command {
        Commands::Diagnose {
            pattern,
            expected,
            table,
        } => {
            let diagnostic = diagnostic(&cli)?;
            let mut expected = expected.iter().map(String::as_str).collect::<Vec<_>>();
            if let Some(table) = table {
                expected.extend(table.expected_columns());
            }
            let expected = (!expected.is_empty()).then_some(expected.as_slice());

            let mut paths = glob::glob(pattern)
                .with_context(|| format!("Invalid pattern '{pattern}'"))?
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to expand pattern")?;
            if paths.is_empty() {
                // Report a literal path even when it does not exist
                paths.push(PathBuf::from(pattern));
            }
            let reports = paths
                .iter()
                .map(|path| diagnostic.diagnose(path, expected))
                .collect::<Vec<_>>();
            print_json(&reports)?;
            let failed = reports.iter().filter(|report| !report.errors.is_empty()).count();
            if failed > 0 {
                bail!("{failed} of {} tables could not be read", reports.len());
            }
        }
        Commands::Sample { path, count } => {
            let rows = diagnostic(&cli)?
                .sample(path, *count)
                .with_context(|| format!("Failed to sample '{}'", path.display()))?;
            print_json(&rows)?;
        }
        Commands::References { text } => {
            print_json(&parse_references(Some(text.as_str())))?;
        }
    }
    Ok(())
}
