//! Outbound notification payloads.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ContactId, EscalationLevel, GuardianEventKind, Location, NotificationChannel, SessionId};

/// Who a notification is addressed to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recipient {
    /// The user running the session
    Owner { user_id: String },
    /// One of the owner's emergency contacts
    Contact {
        contact_id: ContactId,
        name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        address: Option<String>,
    },
}

impl Recipient {
    /// Stable label for logging.
    pub fn label(&self) -> &str {
        match self {
            Recipient::Owner { user_id } => user_id,
            Recipient::Contact { contact_id, .. } => contact_id.as_str(),
        }
    }
}

/// A single message to deliver over one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Notification {
    pub id: String,
    pub session_id: SessionId,
    pub recipient: Recipient,
    pub channel: NotificationChannel,
    pub kind: GuardianEventKind,
    pub level: EscalationLevel,
    pub subject: String,
    pub body: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Set when the emergency-services hand-off should be triggered
    #[serde(default)]
    pub emergency_services: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        session_id: SessionId,
        recipient: Recipient,
        channel: NotificationChannel,
        kind: GuardianEventKind,
        level: EscalationLevel,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id,
            recipient,
            channel,
            kind,
            level,
            subject: String::new(),
            body: String::new(),
            location: None,
            emergency_services: false,
            created_at: Utc::now(),
        }
    }
}
