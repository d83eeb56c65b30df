// src/notify/mod.rs
pub mod sendgrid;

use anyhow::{Context, Result};
use arrow::{csv::WriterBuilder, util::pretty::pretty_format_batches};
use chrono::NaiveDate;
use std::{env, fmt};
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::AuctionError;
use crate::filter::{self, Order, Selection};
use crate::locate::FileLocator;
use crate::records::RecordSet;
use crate::view::open_current;

pub const API_KEY_ENV: &str = "SENDGRID_API_KEY";
pub const SENDER_ENV: &str = "SENDER_EMAIL";
pub const RECIPIENTS_ENV: &str = "RECIPIENT_EMAILS";

pub const SUBJECT: &str = "IBBI Auction Alerts - Upcoming Deadlines";

/// Delivery credential and addresses, validated up front.
#[derive(Clone, PartialEq, Eq)]
pub struct NotifierConfig {
    pub api_key: String,
    pub sender: String,
    pub recipients: Vec<String>,
}

impl fmt::Debug for NotifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotifierConfig")
            .field("api_key", &"<redacted>")
            .field("sender", &self.sender)
            .field("recipients", &self.recipients)
            .finish()
    }
}

impl NotifierConfig {
    pub fn from_env() -> Result<Self, AuctionError> {
        Self::from_values(
            env::var(API_KEY_ENV).ok(),
            env::var(SENDER_ENV).ok(),
            env::var(RECIPIENTS_ENV).ok(),
        )
    }

    /// `recipients` is comma separated. Empty values count as missing; every
    /// recipient must at least contain an `@`.
    pub fn from_values(
        api_key: Option<String>,
        sender: Option<String>,
        recipients: Option<String>,
    ) -> Result<Self, AuctionError> {
        let present = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        let (Some(api_key), Some(sender), Some(recipients)) =
            (present(api_key), present(sender), present(recipients))
        else {
            return Err(AuctionError::InvalidConfiguration(format!(
                "missing {}, {} or {}",
                API_KEY_ENV, SENDER_ENV, RECIPIENTS_ENV
            )));
        };

        let recipients: Vec<String> = recipients.split(',').map(|r| r.trim().to_string()).collect();
        if let Some(bad) = recipients.iter().find(|r| !r.contains('@')) {
            return Err(AuctionError::InvalidConfiguration(format!(
                "invalid recipient address `{}`",
                bad
            )));
        }

        Ok(Self {
            api_key: api_key.trim().to_string(),
            sender: sender.trim().to_string(),
            recipients,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub filename: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
    pub attachment: Option<Attachment>,
}

/// Outbound channel. Returns the provider's status code on acceptance.
pub trait DeliveryChannel {
    fn deliver(&self, credential: &str, message: &AlertMessage) -> Result<u16, AuctionError>;
}

/// Deadlines in `[0, threshold]`, most urgent first.
pub fn upcoming(set: &RecordSet, threshold: i64) -> Result<RecordSet> {
    filter::evaluate(set, Selection::UpTo { threshold }, Order::Urgency)
}

fn csv_bytes(set: &RecordSet) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    {
        let mut writer = WriterBuilder::new().with_header(true).build(&mut buf);
        writer.write(set.batch())?;
    }
    Ok(buf)
}

/// Build the alert for already-filtered `upcoming` rows.
pub fn compose(
    config: &NotifierConfig,
    upcoming: &RecordSet,
    threshold: i64,
    run_date: NaiveDate,
) -> Result<AlertMessage> {
    let (body, attachment) = if upcoming.is_empty() {
        (
            format!(
                "No auctions with submission deadlines within the next {} days.",
                threshold
            ),
            None,
        )
    } else {
        let table = pretty_format_batches(&[upcoming.batch().clone()])?;
        let body = format!(
            "The following auctions have submission deadlines within the next {} days:\n\n{}\n\nTotal upcoming auctions: {}",
            threshold,
            table,
            upcoming.len()
        );
        let attachment = Attachment {
            filename: format!("upcoming_auctions_{}.csv", run_date.format("%Y%m%d")),
            content_type: "text/csv".into(),
            content: csv_bytes(upcoming).context("rendering attachment")?,
        };
        (body, Some(attachment))
    };

    Ok(AlertMessage {
        from: config.sender.clone(),
        to: config.recipients.clone(),
        subject: SUBJECT.into(),
        body,
        attachment,
    })
}

/// Counts reported back after a successful send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlertOutcome {
    pub matches: usize,
    pub status: u16,
}

/// Filter, compose and deliver for one record set.
pub fn send_alert(
    config: &NotifierConfig,
    set: &RecordSet,
    threshold: i64,
    run_date: NaiveDate,
    channel: &dyn DeliveryChannel,
) -> Result<AlertOutcome> {
    let rows = upcoming(set, threshold)?;
    let message = compose(config, &rows, threshold, run_date)?;
    let status = channel.deliver(&config.api_key, &message)?;
    info!(
        recipients = ?config.recipients,
        status,
        matches = rows.len(),
        "alert sent"
    );
    Ok(AlertOutcome {
        matches: rows.len(),
        status,
    })
}

/// Notifier entry point. Every failure is logged and turned into `false`;
/// nothing is delivered unless the configuration is valid and a snapshot
/// could be read.
pub fn run_alert(
    settings: &Settings,
    locator: &dyn FileLocator,
    config: Result<NotifierConfig, AuctionError>,
    channel: &dyn DeliveryChannel,
    run_date: NaiveDate,
) -> bool {
    let config = match config {
        Ok(c) => c,
        Err(e) => {
            error!("{}", e);
            return false;
        }
    };

    let current = match open_current(locator, settings) {
        Ok(c) => c,
        Err(e) => {
            match AuctionError::find(&e) {
                Some(AuctionError::NoSourceFound { .. }) => {
                    warn!("no processed auction data found for alert")
                }
                _ => error!("cannot load snapshot: {:#}", e),
            }
            return false;
        }
    };

    match send_alert(&config, &current.set, settings.days_threshold, run_date, channel) {
        Ok(_) => true,
        Err(e) => {
            error!("failed to send alert: {:#}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locate::FixedLocator;
    use crate::process::{pipeline::build_record_set, RawTable};
    use crate::snapshot::write_snapshot;
    use std::cell::RefCell;
    use tempfile::tempdir;

    #[derive(Default)]
    struct Recording {
        sent: RefCell<Vec<AlertMessage>>,
        fail: bool,
    }

    impl DeliveryChannel for Recording {
        fn deliver(&self, _credential: &str, message: &AlertMessage) -> Result<u16, AuctionError> {
            if self.fail {
                return Err(AuctionError::DeliveryFailure("status 401".into()));
            }
            self.sent.borrow_mut().push(message.clone());
            Ok(202)
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()
    }

    fn config() -> NotifierConfig {
        NotifierConfig::from_values(
            Some("key".into()),
            Some("alerts@example.com".into()),
            Some("a@example.com, b@example.com".into()),
        )
        .unwrap()
    }

    fn set_with(deadlines: &[&str]) -> RecordSet {
        let raw = RawTable::new(
            vec!["Name".into(), "Last Date of Submission".into()],
            deadlines
                .iter()
                .enumerate()
                .map(|(i, d)| vec![format!("n{}", i), d.to_string()])
                .collect(),
        );
        build_record_set(raw, today()).unwrap().0
    }

    #[test]
    fn config_validation() {
        let c = config();
        assert_eq!(c.recipients, vec!["a@example.com", "b@example.com"]);
        assert!(!format!("{:?}", c).contains("key\""));

        for (k, s, r) in [
            (None, Some("s@x"), Some("r@x")),
            (Some("k"), Some(""), Some("r@x")),
            (Some("k"), Some("s@x"), None),
            (Some("k"), Some("s@x"), Some("r@x,bob")),
            (Some("k"), Some("s@x"), Some("r@x,")),
        ] {
            let res = NotifierConfig::from_values(
                k.map(String::from),
                s.map(String::from),
                r.map(String::from),
            );
            assert!(
                matches!(res, Err(AuctionError::InvalidConfiguration(_))),
                "{:?} {:?} {:?}",
                k,
                s,
                r
            );
        }
    }

    #[test]
    fn malformed_recipient_sends_nothing() {
        let channel = Recording::default();
        let cfg = NotifierConfig::from_values(
            Some("key".into()),
            Some("alerts@example.com".into()),
            Some("ops.example.com".into()),
        );
        let ok = run_alert(
            &Settings::default(),
            &FixedLocator(None),
            cfg,
            &channel,
            today(),
        );
        assert!(!ok);
        assert!(channel.sent.borrow().is_empty());
    }

    #[test]
    fn sends_urgent_rows_with_attachment() {
        let channel = Recording::default();
        // -2, 0, 3, 7, 10, absent
        let set = set_with(&[
            "2024-01-08",
            "2024-01-17",
            "2024-01-10",
            "2024-01-13",
            "2024-01-20",
            "",
        ]);
        let out = send_alert(&config(), &set, 7, today(), &channel).unwrap();
        assert_eq!(out, AlertOutcome { matches: 3, status: 202 });

        let sent = channel.sent.borrow();
        let msg = &sent[0];
        assert_eq!(msg.subject, SUBJECT);
        assert_eq!(msg.to.len(), 2);
        assert!(msg.body.ends_with("Total upcoming auctions: 3"));

        let att = msg.attachment.as_ref().unwrap();
        assert_eq!(att.filename, "upcoming_auctions_20240110.csv");
        let csv = String::from_utf8(att.content.clone()).unwrap();
        let days: Vec<&str> = csv
            .lines()
            .skip(1)
            .map(|l| l.rsplit(',').next().unwrap())
            .collect();
        assert_eq!(days, vec!["0", "3", "7"]);
    }

    #[test]
    fn empty_window_sends_no_matches_message() {
        let channel = Recording::default();
        let set = set_with(&["2024-01-01", "2024-03-01"]);
        let out = send_alert(&config(), &set, 7, today(), &channel).unwrap();
        assert_eq!(out.matches, 0);

        let sent = channel.sent.borrow();
        assert_eq!(
            sent[0].body,
            "No auctions with submission deadlines within the next 7 days."
        );
        assert!(sent[0].attachment.is_none());
    }

    #[test]
    fn delivery_failure_is_contained() {
        let tmp = tempdir().unwrap();
        let set = set_with(&["2024-01-12"]);
        let path = write_snapshot(&set, tmp.path(), "processed_auctions_", today()).unwrap();

        let failing = Recording {
            fail: true,
            ..Recording::default()
        };
        let settings = Settings::default();
        let locator = FixedLocator(Some(path));
        assert!(!run_alert(&settings, &locator, Ok(config()), &failing, today()));

        let working = Recording::default();
        assert!(run_alert(&settings, &locator, Ok(config()), &working, today()));
        assert_eq!(working.sent.borrow().len(), 1);
    }

    #[test]
    fn no_snapshot_returns_failure() {
        let channel = Recording::default();
        assert!(!run_alert(
            &Settings::default(),
            &FixedLocator(None),
            Ok(config()),
            &channel,
            today()
        ));
        assert!(channel.sent.borrow().is_empty());
    }
}
