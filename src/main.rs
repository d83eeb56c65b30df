use anyhow::Result;
use auctionwatch::{
    config::Settings, error::AuctionError, locate::GlobLocator, process::pipeline, telemetry,
};
use chrono::Local;
use std::process::ExitCode;
use tracing::{info, warn};

fn main() -> Result<ExitCode> {
    // ─── 1) init logging ─────────────────────────────────────────────
    telemetry::init("info");
    info!("startup");

    // ─── 2) settings + reference date (fixed for the whole run) ──────
    let settings = Settings::load()?;
    let today = Local::now().date_naive();
    let locator = GlobLocator::new(&settings.exports_dir);

    // ─── 3) normalize → coerce → derive → emit ───────────────────────
    match pipeline::run(&locator, &settings, today) {
        Ok(out) => {
            info!(
                source = %out.source.display(),
                snapshot = %out.snapshot.display(),
                rows = out.rows,
                unparsable_dates = out.report.unparsable_total(),
                "processed data saved"
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => match AuctionError::find(&e) {
            // nothing to do yet; the next scheduled run tries again
            Some(AuctionError::NoSourceFound { pattern }) => {
                warn!(
                    "no exports matching {} in {}",
                    pattern,
                    settings.exports_dir.display()
                );
                Ok(ExitCode::SUCCESS)
            }
            // already logged by the pipeline
            _ => Ok(ExitCode::FAILURE),
        },
    }
}
