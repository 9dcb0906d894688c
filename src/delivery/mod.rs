//! Email delivery of a finished mashup through the Mailjet v3.1 send API

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use std::path::Path;

/// Content type of every attachment; only zip archives are sent
const ATTACHMENT_TYPE: &str = "application/zip";

/// Who the mail appears to come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub email: String,
    pub name: Option<String>,
}

/// Mailjet API client
pub struct MailjetClient {
    client: Client,
    endpoint: String,
    public_key: String,
    private_key: String,
    sender: Sender,
}

impl MailjetClient {
    pub fn new(
        endpoint: impl Into<String>,
        public_key: impl Into<String>,
        private_key: impl Into<String>,
        sender: Sender,
    ) -> Self {
        Self {
            client: Client::new(),
            endpoint: endpoint.into(),
            public_key: public_key.into(),
            private_key: private_key.into(),
            sender,
        }
    }

    /// Send `attachment` to `to`; anything but HTTP 200 is an error
    pub async fn send(&self, to: &str, subject: &str, body: &str, attachment: &Path) -> Result<()> {
        let content = tokio::fs::read(attachment)
            .await
            .context("Failed to read attachment")?;
        let filename = attachment
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .context("Attachment has no file name")?;

        tracing::info!("Sending {} to {}", filename, to);
        let payload = build_payload(&self.sender, to, subject, body, &filename, &content);

        let response = self
            .client
            .post(&self.endpoint)
            .basic_auth(&self.public_key, Some(&self.private_key))
            .json(&payload)
            .send()
            .await
            .context("Failed to reach Mailjet")?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Mailjet rejected the message: HTTP {} {}", status, detail.trim());
        }

        tracing::debug!("Mailjet accepted the message");
        Ok(())
    }
}

/// Build the v3.1 `send` request body
pub fn build_payload(
    sender: &Sender,
    to: &str,
    subject: &str,
    body: &str,
    filename: &str,
    content: &[u8],
) -> Value {
    let mut from = json!({ "Email": sender.email });
    if let Some(name) = &sender.name {
        from["Name"] = json!(name);
    }

    json!({
        "Messages": [{
            "From": from,
            "To": [{ "Email": to }],
            "Subject": subject,
            "TextPart": body,
            "Attachments": [{
                "ContentType": ATTACHMENT_TYPE,
                "Filename": filename,
                "Base64Content": BASE64.encode(content),
            }],
        }],
    })
}

/// Loose `local@domain.tld` shape check
pub fn is_valid_email(address: &str) -> bool {
    let Some((local, domain)) = address.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') || address.chars().any(char::is_whitespace) {
        return false;
    }

    let labels: Vec<&str> = domain.split('.').collect();
    labels.len() >= 2 && labels.iter().all(|label| !label.is_empty())
}
