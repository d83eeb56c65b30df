use anyhow::{bail, Context, Result};
use auctionwatch::{
    config::Settings,
    error::AuctionError,
    filter::observed_range,
    locate::GlobLocator,
    telemetry,
    view::{self, export_file_name, filtered_view, open_current, resolve_range},
};
use std::{env, path::PathBuf};
use tracing::info;

const USAGE: &str = "usage: auctionwatch-view [LOW] [HIGH] [--export PATH | --download]";

fn main() -> Result<()> {
    telemetry::init("warn");

    // usage: auctionwatch-view [LOW] [HIGH] [--export PATH | --download]
    let mut bounds: Vec<i64> = Vec::new();
    let mut export_to: Option<PathBuf> = None;
    let mut download = false;
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--export" => export_to = Some(PathBuf::from(args.next().context(USAGE)?)),
            "--download" => download = true,
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(());
            }
            other => bounds.push(
                other
                    .parse()
                    .with_context(|| format!("`{}` is not a day count\n{}", other, USAGE))?,
            ),
        }
    }
    if bounds.len() > 2 {
        bail!(USAGE);
    }

    let settings = Settings::load()?;
    let locator = GlobLocator::new(&settings.exports_dir);

    let current = match open_current(&locator, &settings) {
        Ok(c) => c,
        Err(e) => {
            match AuctionError::find(&e) {
                Some(AuctionError::NoSourceFound { .. }) => {
                    println!("No processed auction data found.")
                }
                Some(AuctionError::MissingRequiredColumn { column }) => {
                    println!("Column '{}' not found in the data.", column)
                }
                _ => return Err(e),
            }
            return Ok(());
        }
    };
    println!("Displaying data from: {}", current.path.display());

    let observed = observed_range(&current.set);
    let Some(range) = resolve_range(observed, bounds.first().copied(), bounds.get(1).copied())
    else {
        println!("No rows carry a days_until_submission value; nothing to filter.");
        return Ok(());
    };

    let filtered = filtered_view(&current.set, range)?;
    println!(
        "### Processed Auctions ({} of {} rows, days {}..={})",
        filtered.rows.len(),
        current.set.len(),
        range.low(),
        range.high()
    );
    println!("{}", view::render(&filtered.rows)?);

    let target = match (export_to, download) {
        (Some(p), _) => Some(p),
        (None, true) => Some(PathBuf::from(export_file_name(&current.path))),
        (None, false) => None,
    };
    if let Some(path) = target {
        if view::is_snapshot_name(&path, &settings) {
            bail!(
                "refusing to export onto a snapshot name: {}",
                path.display()
            );
        }
        view::export(&filtered.rows, &path)?;
        info!(path = %path.display(), "download ready");
        println!("Saved {} rows to {}", filtered.rows.len(), path.display());
    }
    Ok(())
}
