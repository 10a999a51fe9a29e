//! Sending result mails.

use super::attributes::ResultAttributes;
use super::handler::ResultHandler;
use crate::core::{should_act, HandlerError, PropertyType, ScanResult};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat};
use mustache::Template;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default subject template.
pub const DEFAULT_SUBJECT_TEMPLATE: &str =
    "Scan result: {{{status}}} for {{{path}}}{{#hasIndex}} {{{index}}}{{/hasIndex}}";

/// Default plain text template.
pub const DEFAULT_TEXT_TEMPLATE: &str = "status: {{{status}}}\n\
message: {{{message}}}\n\
path: {{{path}}}\n\
{{#hasIndex}}index: {{{index}}}{{/hasIndex}}\n\
size: {{{size}}}\n\
{{#hasUserId}}userId: {{{userId}}}{{/hasUserId}}\n\
started: {{{startedIso}}}\n\
timestamp: {{{timestampIso}}}\n";

/// Configuration for one [`MailSender`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    /// Sender address.
    pub from: Option<String>,
    /// Recipients.
    pub to: Vec<String>,
    /// Carbon copy recipients.
    pub cc: Vec<String>,
    /// Blind carbon copy recipients.
    pub bcc: Vec<String>,
    /// Reply-to addresses.
    pub reply_to: Vec<String>,
    /// Subject template. Blank for no subject.
    pub subject: String,
    /// Plain text template. Blank for no text part.
    pub text: String,
    /// HTML template. Blank for no HTML part.
    pub html: String,
    /// Send mails for OK results too.
    pub send_even_when_ok: bool,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: None,
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: Vec::new(),
            subject: DEFAULT_SUBJECT_TEMPLATE.to_string(),
            text: DEFAULT_TEXT_TEMPLATE.to_string(),
            html: String::new(),
            send_even_when_ok: false,
        }
    }
}

impl MailConfig {
    /// Creates a configuration sending to `to`.
    pub fn new(to: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            to: to.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    /// Sets the sender address.
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    /// Sets the carbon copy recipients.
    pub fn with_cc(mut self, cc: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.cc = cc.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the blind carbon copy recipients.
    pub fn with_bcc(mut self, bcc: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.bcc = bcc.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the reply-to addresses.
    pub fn with_reply_to(mut self, reply_to: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.reply_to = reply_to.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the subject template.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Sets the plain text template.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Sets the HTML template.
    pub fn with_html(mut self, html: impl Into<String>) -> Self {
        self.html = html.into();
        self
    }

    /// Sets whether OK results are mailed.
    pub fn with_send_even_when_ok(mut self, send: bool) -> Self {
        self.send_even_when_ok = send;
        self
    }
}

/// A composed mail.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailMessage {
    /// Sender address.
    pub from: Option<String>,
    /// Recipients.
    pub to: Vec<String>,
    /// Carbon copy recipients.
    pub cc: Vec<String>,
    /// Blind carbon copy recipients.
    pub bcc: Vec<String>,
    /// Reply-to addresses.
    pub reply_to: Vec<String>,
    /// Subject line.
    pub subject: Option<String>,
    /// Plain text body.
    pub text: Option<String>,
    /// HTML body.
    pub html: Option<String>,
}

/// Delivers mails.
#[async_trait]
pub trait MailTransport: Send + Sync + Debug {
    /// Sends `message`.
    async fn send(&self, message: MailMessage) -> Result<(), HandlerError>;
}

/// A transport that keeps every mail in memory.
#[derive(Debug, Default)]
pub struct RecordingMailTransport {
    sent: Mutex<Vec<MailMessage>>,
    failing: AtomicBool,
}

impl RecordingMailTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every send fail, or stops doing so.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Returns the mails sent so far.
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).clone()
    }

    /// Returns the number of mails sent so far.
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).len()
    }

    /// Waits until at least `count` mails were sent. Returns `false` on timeout.
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.sent_count() >= count {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl MailTransport for RecordingMailTransport {
    async fn send(&self, message: MailMessage) -> Result<(), HandlerError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(HandlerError::Mail {
                reason: "mail server refused connection".into(),
            });
        }
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).push(message);
        Ok(())
    }
}

fn addresses(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|address| address.trim())
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}

fn template_error(error: mustache::Error) -> HandlerError {
    HandlerError::Template {
        reason: error.to_string(),
    }
}

/// Compiles a mail template. Blank sources yield `None`.
pub(crate) fn compile_template(source: &str) -> Result<Option<Template>, HandlerError> {
    if source.trim().is_empty() {
        return Ok(None);
    }
    mustache::compile_str(source).map(Some).map_err(template_error)
}

fn iso(millis: i64) -> String {
    DateTime::from_timestamp_millis(millis)
        .map(|at| at.to_rfc3339_opts(SecondsFormat::Millis, true))
        .unwrap_or_default()
}

/// Variables available to mail templates.
///
/// `{{x}}` HTML-escapes a value, `{{{x}}}` inserts it as is. `hasIndex` and
/// `hasUserId` guard sections around the optional values.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MailContext {
    status: String,
    message: String,
    path: String,
    property_type: String,
    size: String,
    started: String,
    timestamp: String,
    started_iso: String,
    timestamp_iso: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    index: Option<String>,
    has_index: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<String>,
    has_user_id: bool,
}

impl From<&ResultAttributes> for MailContext {
    fn from(attributes: &ResultAttributes) -> Self {
        Self {
            status: attributes.status.as_str().to_string(),
            message: attributes.message.clone(),
            path: attributes.path.clone(),
            property_type: attributes.property_type.to_string(),
            size: attributes.size.to_string(),
            started: attributes.started.to_string(),
            timestamp: attributes.timestamp.to_string(),
            started_iso: iso(attributes.started),
            timestamp_iso: iso(attributes.timestamp),
            index: attributes.index.map(|index| index.to_string()),
            has_index: attributes.index.is_some(),
            user_id: attributes.user_id.clone(),
            has_user_id: attributes.user_id.is_some(),
        }
    }
}

fn render(template: Option<&Template>, context: &MailContext) -> Result<Option<String>, HandlerError> {
    template
        .map(|template| template.render_to_string(context).map_err(template_error))
        .transpose()
}

/// Mails each result to the configured recipients.
///
/// Sending happens on a spawned task; a failed delivery is logged and does
/// not fail the handler.
pub struct MailSender {
    transport: Arc<dyn MailTransport>,
    config: MailConfig,
    subject: Option<Template>,
    text: Option<Template>,
    html: Option<Template>,
}

impl MailSender {
    /// Compiles the templates of `config`.
    pub fn new(transport: Arc<dyn MailTransport>, config: MailConfig) -> Result<Self, HandlerError> {
        Ok(Self {
            subject: compile_template(&config.subject)?,
            text: compile_template(&config.text)?,
            html: compile_template(&config.html)?,
            transport,
            config,
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &MailConfig {
        &self.config
    }

    /// Builds the mail for one result.
    pub fn compose(&self, attributes: &ResultAttributes) -> Result<MailMessage, HandlerError> {
        let to = addresses(&self.config.to);
        if to.is_empty() {
            return Err(HandlerError::Mail {
                reason: "no recipients configured".into(),
            });
        }
        let context = MailContext::from(attributes);
        Ok(MailMessage {
            from: self
                .config
                .from
                .as_deref()
                .map(str::trim)
                .filter(|from| !from.is_empty())
                .map(str::to_string),
            to,
            cc: addresses(&self.config.cc),
            bcc: addresses(&self.config.bcc),
            reply_to: addresses(&self.config.reply_to),
            subject: render(self.subject.as_ref(), &context)?,
            text: render(self.text.as_ref(), &context)?,
            html: render(self.html.as_ref(), &context)?,
        })
    }

    fn send(
        &self,
        result: &ScanResult,
        path: &str,
        index: Option<usize>,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        if !should_act(result, self.config.send_even_when_ok) {
            return Ok(());
        }
        let attributes = ResultAttributes::new(result, path, index, property_type, user_id);
        let message = self.compose(&attributes)?;
        tracing::debug!(path = %path, index = ?index, "Sending scan result mail");

        let transport = Arc::clone(&self.transport);
        let path = path.to_string();
        tokio::spawn(async move {
            match transport.send(message).await {
                Ok(()) => tracing::debug!(path = %path, "Sending scan result mail succeeded"),
                Err(e) => tracing::error!(path = %path, error = %e, "Sending scan result mail failed"),
            }
        });
        Ok(())
    }
}

impl Debug for MailSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailSender")
            .field("transport", &self.transport)
            .field("config", &self.config)
            .finish()
    }
}

#[async_trait]
impl ResultHandler for MailSender {
    fn name(&self) -> &str {
        "mail-sender"
    }

    async fn handle_single_value(
        &self,
        result: &ScanResult,
        path: &str,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        self.send(result, path, None, property_type, user_id)
    }

    async fn handle_multi_value(
        &self,
        result: &ScanResult,
        path: &str,
        index: usize,
        property_type: PropertyType,
        user_id: Option<&str>,
    ) -> Result<(), HandlerError> {
        self.send(result, path, Some(index), property_type, user_id)
    }
}
