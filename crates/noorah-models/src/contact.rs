//! Emergency contacts and delivery channels.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

use crate::ContactId;

/// Maximum number of emergency contacts a user may register.
pub const MAX_EMERGENCY_CONTACTS: usize = 10;

/// Priority assigned to primary contacts (notified first on a missed check-in).
pub const PRIMARY_PRIORITY: u8 = 1;

/// Channel a notification is delivered over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    /// Push notification to the mobile app
    Push,
    /// SMS text message
    Sms,
    /// Email
    Email,
    /// JSON POST to a contact-supplied webhook
    Webhook,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Push => "push",
            NotificationChannel::Sms => "sms",
            NotificationChannel::Email => "email",
            NotificationChannel::Webhook => "webhook",
        }
    }
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A person to notify when a guardian session escalates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[validate(schema(function = "validate_reachable"))]
pub struct EmergencyContact {
    #[serde(default)]
    pub id: ContactId,

    #[validate(length(min = 1, max = 100))]
    pub name: String,

    /// Free-form relationship label ("mother", "neighbour")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 50))]
    pub relationship: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "validate_phone"))]
    pub phone: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(email)]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(url)]
    pub webhook_url: Option<String>,

    /// 1 = primary. Higher numbers are only notified once escalation widens.
    #[serde(default = "default_priority")]
    #[validate(range(min = 1, max = 5))]
    pub priority: u8,

    /// Channels this contact wants to be reached on.
    #[serde(default)]
    pub channels: Vec<NotificationChannel>,
}

fn default_priority() -> u8 {
    PRIMARY_PRIORITY
}

impl EmergencyContact {
    /// Create a primary contact reachable by SMS.
    pub fn with_phone(name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: ContactId::new(),
            name: name.into(),
            relationship: None,
            phone: Some(phone.into()),
            email: None,
            webhook_url: None,
            priority: PRIMARY_PRIORITY,
            channels: vec![NotificationChannel::Sms],
        }
    }

    /// Set the contact priority.
    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    pub fn is_primary(&self) -> bool {
        self.priority == PRIMARY_PRIORITY
    }

    /// Channels that can actually be used given the contact details on file.
    pub fn reachable_channels(&self) -> Vec<NotificationChannel> {
        self.channels
            .iter()
            .copied()
            .filter(|c| match c {
                NotificationChannel::Sms => self.phone.is_some(),
                NotificationChannel::Email => self.email.is_some(),
                NotificationChannel::Webhook => self.webhook_url.is_some(),
                NotificationChannel::Push => false,
            })
            .collect()
    }
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let digits = phone.strip_prefix('+').unwrap_or(phone);
    let valid = (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("phone"))
    }
}

fn validate_reachable(contact: &EmergencyContact) -> Result<(), ValidationError> {
    if contact.reachable_channels().is_empty() {
        let mut err = ValidationError::new("unreachable");
        err.message = Some("contact has no channel matching the details provided".into());
        return Err(err);
    }
    Ok(())
}
