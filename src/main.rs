// Entry point and high-level flow.
//
// One pass: load the VIP id set and the nested order records, flatten
// them into typed rows, write the table / skip logs / quality report,
// and print a preview plus the report to the console. Input problems
// inside the data are never fatal; only unreadable input files abort
// the run.
mod error;
mod flatten;
mod loader;
mod output;
mod report;
mod skiplog;
mod table;
mod types;
mod util;

use anyhow::Context;
use clap::Parser;
use report::QualityReport;
use skiplog::SkipLog;
use std::path::PathBuf;
use table::FlatTable;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(about = "Flatten nested customer order records into a typed CSV with a quality report")]
struct Cli {
    /// Newline-delimited VIP customer id file.
    #[arg(long, default_value = "vip_customers.txt")]
    vip_file: PathBuf,

    /// Nested customer/order/item records (JSON array).
    #[arg(long, default_value = "customer_orders.json")]
    data_file: PathBuf,

    /// Flattened table destination.
    #[arg(long, default_value = "customer_orders_flattened.csv")]
    output: PathBuf,

    /// Quality report destination.
    #[arg(long, default_value = "quality_report.txt")]
    report: PathBuf,

    /// Prefix for the per-level skip logs
    /// (`<prefix>_customers.csv`, `_orders.csv`, `_items.csv`).
    #[arg(long, default_value = "skipped")]
    skip_prefix: String,

    /// Increase log verbosity (-v: info, -vv: debug).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet);

    let vip = loader::load_vip_ids(&cli.vip_file)
        .with_context(|| format!("loading VIP ids from {}", cli.vip_file.display()))?;
    let customers = loader::load_customers(&cli.data_file)
        .with_context(|| format!("loading customer orders from {}", cli.data_file.display()))?;

    let mut skips = SkipLog::default();
    let now = chrono::Utc::now().naive_utc();
    let (rows, stats) = flatten::flatten(&customers, &vip, now, &mut skips);
    let table = FlatTable::assemble(rows);

    output::write_table(&cli.output, &table)?;
    let skip_files = output::write_skip_logs(&cli.skip_prefix, &skips)?;

    let quality = QualityReport::build(&stats, &skips, &table);
    let rendered = quality.render();
    output::write_text(&cli.report, &rendered)?;

    println!("Sample of extracted flattened data:");
    output::preview(&table, 10);
    println!("{rendered}");
    println!("Flattened table saved to {}", cli.output.display());
    for path in &skip_files {
        println!("Skip log saved to {}", path.display());
    }
    println!("Quality report saved to {}", cli.report.display());

    Ok(())
}
