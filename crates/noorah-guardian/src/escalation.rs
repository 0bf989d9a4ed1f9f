//! Escalation policy: who hears about an event at each tier.

use std::time::Duration;

use noorah_models::{EmergencyContact, EscalationLevel, GuardianEventKind};

use crate::config::GuardianConfig;

/// Escalation cadence and emergency hand-off settings.
#[derive(Debug, Clone)]
pub struct EscalationPolicy {
    /// Time spent at each tier before moving up
    pub step: Duration,
    pub emergency_services_enabled: bool,
}

impl Default for EscalationPolicy {
    fn default() -> Self {
        Self {
            step: Duration::from_secs(5 * 60),
            emergency_services_enabled: false,
        }
    }
}

impl From<&GuardianConfig> for EscalationPolicy {
    fn from(config: &GuardianConfig) -> Self {
        Self {
            step: config.escalation_step,
            emergency_services_enabled: config.emergency_services_enabled,
        }
    }
}

/// Recipients selected for one event.
#[derive(Debug, Clone, Default)]
pub struct Audience<'a> {
    /// Whether the session owner is notified
    pub owner: bool,
    pub contacts: Vec<&'a EmergencyContact>,
    pub emergency_services: bool,
}

impl EscalationPolicy {
    /// Select recipients for an event raised at `level`.
    pub fn audience<'a>(
        &self,
        kind: GuardianEventKind,
        level: EscalationLevel,
        contacts: &'a [EmergencyContact],
    ) -> Audience<'a> {
        let contacts_for_level = select_contacts(level, contacts);

        match kind {
            GuardianEventKind::CheckInReminder => Audience {
                owner: true,
                contacts: Vec::new(),
                emergency_services: false,
            },
            GuardianEventKind::MissedCheckIn | GuardianEventKind::Escalate => Audience {
                owner: true,
                contacts: contacts_for_level,
                emergency_services: self.hand_off(level),
            },
            // The owner raised the SOS themselves.
            GuardianEventKind::Sos => Audience {
                owner: false,
                contacts: contacts_for_level,
                emergency_services: self.hand_off(level),
            },
            // Follow up with whoever was alerted at `level`.
            GuardianEventKind::AllClear => Audience {
                owner: false,
                contacts: contacts_for_level,
                emergency_services: false,
            },
        }
    }

    fn hand_off(&self, level: EscalationLevel) -> bool {
        self.emergency_services_enabled && level == EscalationLevel::Emergency
    }
}

/// Contacts reached at `level`. Primary-only tiers fall back to everyone when
/// no contact is marked primary.
fn select_contacts(level: EscalationLevel, contacts: &[EmergencyContact]) -> Vec<&EmergencyContact> {
    match level {
        EscalationLevel::None | EscalationLevel::Reminder => Vec::new(),
        EscalationLevel::PrimaryContacts => {
            let primary: Vec<&EmergencyContact> = contacts.iter().filter(|c| c.is_primary()).collect();
            if primary.is_empty() {
                contacts.iter().collect()
            } else {
                primary
            }
        }
        EscalationLevel::AllContacts | EscalationLevel::Emergency => contacts.iter().collect(),
    }
}
