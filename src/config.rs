// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    env, fs,
    path::{Path, PathBuf},
};
use tracing::debug;
use url::Url;

/// Env var pointing at an alternate settings file.
pub const CONFIG_ENV: &str = "AUCTIONWATCH_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "auctionwatch.yaml";

/// Runtime settings shared by the pipeline, viewer and notifier.
/// Every field has a default, so an absent or partial YAML file is fine.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory holding both the raw exports and the snapshots.
    pub exports_dir: PathBuf,
    /// Glob (relative to `exports_dir`) for raw auction exports.
    pub source_pattern: String,
    /// Field delimiter of the raw export. The `.xls` files are really TSV.
    pub source_delimiter: char,
    /// Snapshot file name prefix; the date and `.csv` are appended.
    pub snapshot_prefix: String,
    /// Notifier window: deadlines within `[0, days_threshold]` are reported.
    pub days_threshold: i64,
    pub sendgrid_endpoint: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            exports_dir: PathBuf::from("auction_exports"),
            source_pattern: "ibbi_auctions_*.xls".into(),
            source_delimiter: '\t',
            snapshot_prefix: "processed_auctions_".into(),
            days_threshold: 7,
            sendgrid_endpoint: "https://api.sendgrid.com/v3/mail/send".into(),
        }
    }
}

impl Settings {
    /// Load from `$AUCTIONWATCH_CONFIG`, else `./auctionwatch.yaml`, else defaults.
    pub fn load() -> Result<Self> {
        match env::var(CONFIG_ENV) {
            Ok(path) => Self::from_file(path),
            Err(_) if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(DEFAULT_CONFIG_FILE)
            }
            Err(_) => {
                debug!("no settings file, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading settings {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing settings {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let settings: Settings = serde_yaml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        Url::parse(&self.sendgrid_endpoint)
            .with_context(|| format!("sendgrid_endpoint `{}`", self.sendgrid_endpoint))?;
        anyhow::ensure!(
            self.source_delimiter.is_ascii(),
            "source_delimiter must be a single ASCII character"
        );
        Ok(())
    }

    /// Glob pattern for snapshots, e.g. `auction_exports/processed_auctions_*.csv`.
    pub fn snapshot_pattern(&self) -> String {
        format!("{}*.csv", self.snapshot_prefix)
    }

    pub fn delimiter_byte(&self) -> u8 {
        self.source_delimiter as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let s = Settings::from_yaml("days_threshold: 3\nexports_dir: /tmp/x\n").unwrap();
        assert_eq!(s.days_threshold, 3);
        assert_eq!(s.exports_dir, PathBuf::from("/tmp/x"));
        assert_eq!(s.source_pattern, "ibbi_auctions_*.xls");
        assert_eq!(s.delimiter_byte(), b'\t');
        assert_eq!(s.snapshot_pattern(), "processed_auctions_*.csv");
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        assert!(Settings::from_yaml("sendgrid_endpoint: not a url\n").is_err());
    }
}
