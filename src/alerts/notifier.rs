use crate::config::{EmailApiConfig, NotifierConfig};
use crate::error::DeliveryError;
use crate::events::ErrorRecord;
use log::{debug, info};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Delivers a batch of detected errors as a single outbound notification
///
/// Implementations make exactly one attempt per call and report the outcome.
/// Callers never invoke `deliver` with an empty slice.
#[cfg_attr(test, mockall::automock)]
pub trait Notifier {
    fn deliver(&self, records: &[ErrorRecord]) -> Result<(), DeliveryError>;
}

/// JSON body accepted by the email relay API
#[derive(Debug, Serialize, PartialEq)]
pub struct EmailPayload {
    token: String,
    #[serde(rename = "commaSeperatedRecipients")]
    recipients: String,
    from: String,
    subject: String,
    body: String,
    #[serde(rename = "emailId")]
    email_id: String,
    #[serde(rename = "Attachments")]
    attachments: Vec<String>,
}

/// Notifier that posts an HTML summary to an email relay over HTTP
///
/// The relay call is async (`reqwest`); a private current-thread runtime
/// drives it so the control loop sees a plain blocking call.
pub struct EmailApiNotifier {
    client: Client,
    runtime: tokio::runtime::Runtime,
    config: EmailApiConfig,
}

impl EmailApiNotifier {
    /// Create a notifier for the given relay endpoint
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Client` if the HTTP client or its runtime
    /// cannot be built.
    pub fn new(config: EmailApiConfig) -> Result<Self, DeliveryError> {
        let mut builder = Client::builder().no_proxy();
        if let Some(seconds) = config.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(seconds));
        }
        let client = builder
            .build()
            .map_err(|e| DeliveryError::Client(e.to_string()))?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DeliveryError::Client(format!("tokio runtime: {}", e)))?;

        Ok(Self {
            client,
            runtime,
            config,
        })
    }

    /// Render the records as the HTML list sent in the email body
    pub fn format_body(records: &[ErrorRecord]) -> String {
        let mut body = String::from("<html lang='en'><body><h1>ERRORS</h1><ul>");
        for record in records {
            body.push_str(&format!(
                "<li>{} - {}: {}</li>",
                record.formatted_timestamp(),
                record.source_path.display(),
                record.message
            ));
        }
        body.push_str("</ul></body></html>");
        body
    }

    /// Build the relay request body for a batch
    pub fn build_payload(&self, records: &[ErrorRecord]) -> EmailPayload {
        EmailPayload {
            token: self.config.token.clone(),
            recipients: self.config.recipients.join(","),
            from: self.config.sender.clone(),
            subject: self.config.subject.clone(),
            body: Self::format_body(records),
            email_id: String::new(),
            attachments: Vec::new(),
        }
    }
}

impl Notifier for EmailApiNotifier {
    fn deliver(&self, records: &[ErrorRecord]) -> Result<(), DeliveryError> {
        let payload = self.build_payload(records);
        debug!(
            "Posting {} records to {}",
            records.len(),
            self.config.url
        );

        let status = self.runtime.block_on(async {
            let response = self
                .client
                .post(&self.config.url)
                .json(&payload)
                .send()
                .await?;
            Ok::<_, reqwest::Error>(response.status())
        })?;

        if status.is_success() {
            info!("Email alert sent successfully ({} records)", records.len());
            Ok(())
        } else {
            Err(DeliveryError::Status(status.as_u16()))
        }
    }
}

/// Notifier that only writes the batch to the log
///
/// Used when no relay endpoint is configured. Always succeeds.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, records: &[ErrorRecord]) -> Result<(), DeliveryError> {
        info!("Error report ({} records):", records.len());
        for record in records {
            info!(
                "  {} - {}: {}",
                record.formatted_timestamp(),
                record.source_path.display(),
                record.message
            );
        }
        Ok(())
    }
}

/// Build the notifier selected in the settings
pub fn build_notifier(config: &NotifierConfig) -> Result<Box<dyn Notifier>, DeliveryError> {
    match config {
        NotifierConfig::EmailApi(email) => {
            info!("Using email relay notifier at {}", email.url);
            Ok(Box::new(EmailApiNotifier::new(email.clone())?))
        }
        NotifierConfig::Log => {
            info!("No email relay configured, error reports go to the log");
            Ok(Box::new(LogNotifier))
        }
    }
}
