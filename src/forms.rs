//! Contact form fields, submission cleaning, and notification email.
//!
//! A contact page owns an ordered list of [`FormField`]s. A visitor's POST is
//! a [`FormData`] map keyed by each field's clean name; [`process_submission`]
//! checks it against the field definitions and produces a typed
//! [`FormSubmission`]. When the page has recipients configured, the
//! submission is turned into an [`EmailMessage`] and handed to a [`Mailer`].

use crate::blocks::{FieldIssue, FieldProblem, ValidationError};
use crate::naming::clean_field_name;
use crate::ordering::Ordered;
use crate::types::PageId;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FormError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Mail delivery failed: {0}")]
    Mail(#[from] MailError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct MailError(pub String);

/// Submitted form values. Multi-valued inputs (checkboxes) carry several
/// entries under one key.
pub type FormData = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormFieldType {
    #[serde(rename = "singleline")]
    SingleLine,
    #[serde(rename = "multiline")]
    MultiLine,
    Email,
    Number,
    Url,
    Checkbox,
    Checkboxes,
    Dropdown,
    Radio,
    Date,
    #[serde(rename = "datetime")]
    DateTime,
    Hidden,
}

impl FormFieldType {
    fn has_choices(self) -> bool {
        matches!(
            self,
            FormFieldType::Checkboxes | FormFieldType::Dropdown | FormFieldType::Radio
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub label: String,
    pub field_type: FormFieldType,
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub help_text: String,
}

fn default_true() -> bool {
    true
}

impl FormField {
    pub fn new(label: impl Into<String>, field_type: FormFieldType) -> Self {
        Self {
            label: label.into(),
            field_type,
            required: true,
            choices: Vec::new(),
            default_value: String::new(),
            help_text: String::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = choices.iter().map(|c| c.to_string()).collect();
        self
    }

    /// Key under which this field's value is submitted and stored.
    pub fn clean_name(&self) -> String {
        clean_field_name(&self.label)
    }

    fn clean(&self, raw: &[String]) -> Result<Option<serde_json::Value>, FieldProblem> {
        use serde_json::Value;

        let values: Vec<&str> = raw
            .iter()
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect();

        match self.field_type {
            FormFieldType::Checkbox => {
                let checked = values
                    .first()
                    .is_some_and(|v| !matches!(*v, "false" | "off" | "0"));
                if self.required && !checked {
                    return Err(FieldProblem::Missing);
                }
                return Ok(Some(Value::Bool(checked)));
            }
            FormFieldType::Checkboxes => {
                if self.required && values.is_empty() {
                    return Err(FieldProblem::Missing);
                }
                for v in &values {
                    self.check_choice(v)?;
                }
                return Ok(Some(Value::Array(
                    values.iter().map(|v| Value::String(v.to_string())).collect(),
                )));
            }
            _ => {}
        }

        let Some(value) = values.first().copied() else {
            return if self.required {
                Err(FieldProblem::Missing)
            } else {
                Ok(None)
            };
        };

        let cleaned = match self.field_type {
            FormFieldType::Email => {
                if !looks_like_email(value) {
                    return Err(FieldProblem::Invalid("enter a valid email address".into()));
                }
                Value::String(value.to_string())
            }
            FormFieldType::Number => value
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| FieldProblem::Invalid("enter a number".into()))?,
            FormFieldType::Url => {
                url::Url::parse(value)
                    .map_err(|_| FieldProblem::Invalid("enter a valid URL".into()))?;
                Value::String(value.to_string())
            }
            FormFieldType::Date => {
                NaiveDate::parse_from_str(value, "%Y-%m-%d")
                    .map_err(|_| FieldProblem::Invalid("enter a date as YYYY-MM-DD".into()))?;
                Value::String(value.to_string())
            }
            FormFieldType::DateTime => {
                parse_datetime(value).ok_or_else(|| {
                    FieldProblem::Invalid("enter a date and time as YYYY-MM-DDTHH:MM".into())
                })?;
                Value::String(value.to_string())
            }
            FormFieldType::Dropdown | FormFieldType::Radio => {
                self.check_choice(value)?;
                Value::String(value.to_string())
            }
            _ => Value::String(value.to_string()),
        };
        Ok(Some(cleaned))
    }

    fn check_choice(&self, value: &str) -> Result<(), FieldProblem> {
        if self.field_type.has_choices() && !self.choices.iter().any(|c| c == value) {
            return Err(FieldProblem::Invalid(format!(
                "`{value}` is not one of the available choices"
            )));
        }
        Ok(())
    }
}

fn parse_datetime(value: &str) -> Option<NaiveDateTime> {
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
}

// Non-empty local part, one `@`, a dotted domain, no whitespace.
static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("EMAIL_REGEX: invalid regex pattern")
});

/// Loose shape check for an email address.
pub fn looks_like_email(value: &str) -> bool {
    EMAIL_REGEX.is_match(value)
}

/// A cleaned, accepted form submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSubmission {
    pub page: PageId,
    pub submitted_at: DateTime<Utc>,
    /// Cleaned values keyed by field clean name. Optional fields left blank
    /// are absent.
    pub data: BTreeMap<String, serde_json::Value>,
}

/// Check `data` against `fields` and build the submission.
///
/// Every failing field is reported; keys that match no field are ignored.
pub fn process_submission(
    page: PageId,
    fields: &Ordered<FormField>,
    data: &FormData,
    now: DateTime<Utc>,
) -> Result<FormSubmission, FormError> {
    let mut cleaned = BTreeMap::new();
    let mut issues = Vec::new();
    for field in fields.iter() {
        let name = field.clean_name();
        let raw = data.get(&name).map(Vec::as_slice).unwrap_or_default();
        match field.clean(raw) {
            Ok(Some(value)) => {
                cleaned.insert(name, value);
            }
            Ok(None) => {}
            Err(problem) => issues.push(FieldIssue::new(name, problem)),
        }
    }
    ValidationError::check(issues)?;
    Ok(FormSubmission {
        page,
        submitted_at: now,
        data: cleaned,
    })
}

// ============================================================================
// Email
// ============================================================================

/// Where a contact page sends its notifications.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EmailSettings {
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub to_address: Vec<String>,
    #[serde(default)]
    pub subject: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl EmailSettings {
    /// Notification for a submission, or `None` when no recipient is set.
    ///
    /// The body lists `label: value` per field, in form order.
    pub fn message(
        &self,
        fields: &Ordered<FormField>,
        submission: &FormSubmission,
    ) -> Option<EmailMessage> {
        if self.to_address.is_empty() {
            return None;
        }
        let body = fields
            .iter()
            .map(|field| {
                let value = submission
                    .data
                    .get(&field.clean_name())
                    .map(display_value)
                    .unwrap_or_default();
                format!("{}: {}", field.label, value)
            })
            .collect::<Vec<_>>()
            .join("\n");
        Some(EmailMessage {
            from: self.from_address.clone(),
            to: self.to_address.clone(),
            subject: self.subject.clone(),
            body,
        })
    }
}

fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Array(items) => items
            .iter()
            .map(display_value)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Delivers contact form notifications.
pub trait Mailer: Send + Sync {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError>;
}

/// Mailer that writes each message to the log instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send(&self, message: &EmailMessage) -> Result<(), MailError> {
        tracing::info!(
            from = %message.from,
            to = ?message.to,
            subject = %message.subject,
            "form notification\n{}",
            message.body
        );
        Ok(())
    }
}
