use anyhow::Result;
use auctionwatch::{
    config::Settings,
    locate::GlobLocator,
    notify::{run_alert, sendgrid::SendGridChannel, NotifierConfig},
    telemetry,
};
use chrono::Local;
use std::process::ExitCode;
use tracing::info;

fn main() -> Result<ExitCode> {
    telemetry::init("info");

    let settings = Settings::load()?;
    let locator = GlobLocator::new(&settings.exports_dir);
    let channel = SendGridChannel::new(&settings.sendgrid_endpoint)?;

    let sent = run_alert(
        &settings,
        &locator,
        NotifierConfig::from_env(),
        &channel,
        Local::now().date_naive(),
    );
    info!(sent, "alert run finished");
    Ok(if sent {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
