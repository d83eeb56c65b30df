use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::blocking::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{AlertMessage, DeliveryChannel};
use crate::error::AuctionError;

/// SendGrid v3 `mail/send` over HTTPS.
pub struct SendGridChannel {
    client: Client,
    endpoint: Url,
}

impl SendGridChannel {
    pub fn new(endpoint: &str) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("parsing endpoint {}", endpoint))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("building http client")?;
        Ok(Self { client, endpoint })
    }
}

/// Request body for one message, all recipients in a single personalization.
pub fn payload(message: &AlertMessage) -> Value {
    let to: Vec<Value> = message.to.iter().map(|e| json!({ "email": e })).collect();
    let mut body = json!({
        "personalizations": [{ "to": to }],
        "from": { "email": message.from },
        "subject": message.subject,
        "content": [{ "type": "text/plain", "value": message.body }],
    });
    if let Some(att) = &message.attachment {
        body["attachments"] = json!([{
            "content": STANDARD.encode(&att.content),
            "type": att.content_type,
            "filename": att.filename,
            "disposition": "attachment",
        }]);
    }
    body
}

impl DeliveryChannel for SendGridChannel {
    fn deliver(&self, credential: &str, message: &AlertMessage) -> Result<u16, AuctionError> {
        debug!(endpoint = %self.endpoint, to = ?message.to, "posting alert");
        let resp = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(credential)
            .json(&payload(message))
            .send()
            .map_err(|e| AuctionError::DeliveryFailure(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().unwrap_or_default();
            return Err(AuctionError::DeliveryFailure(format!(
                "status {}: {}",
                status, detail
            )));
        }
        Ok(status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::Attachment;

    fn message(attachment: Option<Attachment>) -> AlertMessage {
        AlertMessage {
            from: "alerts@example.com".into(),
            to: vec!["a@example.com".into(), "b@example.com".into()],
            subject: "s".into(),
            body: "b".into(),
            attachment,
        }
    }

    #[test]
    fn payload_shape() {
        let v = payload(&message(None));
        assert_eq!(v["personalizations"][0]["to"][1]["email"], "b@example.com");
        assert_eq!(v["from"]["email"], "alerts@example.com");
        assert_eq!(v["content"][0]["type"], "text/plain");
        assert!(v.get("attachments").is_none());

        let v = payload(&message(Some(Attachment {
            filename: "x.csv".into(),
            content_type: "text/csv".into(),
            content: b"a,b\n".to_vec(),
        })));
        assert_eq!(v["attachments"][0]["content"], "YSxiCg==");
        assert_eq!(v["attachments"][0]["filename"], "x.csv");
    }

    #[test]
    fn unreachable_endpoint_is_a_delivery_failure() {
        let ch = SendGridChannel::new("http://127.0.0.1:9/v3/mail/send").unwrap();
        let err = ch.deliver("key", &message(None)).unwrap_err();
        assert!(matches!(err, AuctionError::DeliveryFailure(_)));
    }

    #[test]
    fn bad_endpoint_is_rejected() {
        assert!(SendGridChannel::new("::nope").is_err());
    }
}
