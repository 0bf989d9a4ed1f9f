//! Notification fan-out.
//!
//! The [`NotificationDispatcher`] turns a [`GuardianEvent`] into one
//! [`Notification`] per (recipient, channel) pair and hands each to the first
//! [`Notifier`] that supports its channel. Deliveries run concurrently; a
//! failed delivery is logged and counted but never stops the others.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures_util::future::join_all;
use noorah_models::{
    EmergencyContact, EscalationLevel, GuardianEvent, GuardianEventKind, Notification, NotificationChannel,
    Recipient,
};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::error::{GuardianError, GuardianResult};
use crate::escalation::EscalationPolicy;
use crate::metrics;
use crate::retry::{with_backoff, Backoff, Transient};

/// A delivery backend.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &'static str;

    /// Whether this backend can deliver over `channel`.
    fn supports(&self, channel: NotificationChannel) -> bool;

    async fn send(&self, notification: &Notification) -> GuardianResult<()>;
}

// =============================================================================
// Notifiers
// =============================================================================

/// Writes notifications to the structured log. Accepts every channel.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    fn name(&self) -> &'static str {
        "log"
    }

    fn supports(&self, _channel: NotificationChannel) -> bool {
        true
    }

    async fn send(&self, notification: &Notification) -> GuardianResult<()> {
        info!(
            session_id = %notification.session_id,
            notification_id = %notification.id,
            recipient = %notification.recipient.label(),
            channel = %notification.channel,
            kind = %notification.kind,
            level = %notification.level,
            emergency_services = notification.emergency_services,
            "{}",
            notification.subject
        );
        Ok(())
    }
}

#[derive(Debug)]
struct DeliveryError {
    status: Option<u16>,
    message: String,
}

impl std::fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {}: {}", status, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl Transient for DeliveryError {
    fn is_transient(&self) -> bool {
        match self.status {
            None => true,
            Some(status) => status == 429 || status >= 500,
        }
    }
}

/// Posts notifications as JSON.
///
/// `Webhook` notifications go to the contact's own URL. Push, SMS and email
/// go to the relay URL when one is configured; the relay owns the actual
/// provider integrations.
pub struct WebhookNotifier {
    http: reqwest::Client,
    relay_url: Option<String>,
    backoff: Backoff,
}

impl WebhookNotifier {
    pub fn new(relay_url: Option<String>) -> GuardianResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("noorah-guardian/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            relay_url,
            backoff: Backoff::default(),
        })
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    fn target(&self, notification: &Notification) -> Option<String> {
        match (notification.channel, &notification.recipient) {
            (NotificationChannel::Webhook, Recipient::Contact { address, .. }) => address.clone(),
            _ => self.relay_url.clone(),
        }
    }

    async fn post_once(&self, url: &str, notification: &Notification) -> Result<(), DeliveryError> {
        let response = self
            .http
            .post(url)
            .json(notification)
            .send()
            .await
            .map_err(|e| DeliveryError {
                status: None,
                message: e.to_string(),
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let message = response.text().await.unwrap_or_default();
        Err(DeliveryError {
            status: Some(status.as_u16()),
            message,
        })
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn supports(&self, channel: NotificationChannel) -> bool {
        channel == NotificationChannel::Webhook || self.relay_url.is_some()
    }

    async fn send(&self, notification: &Notification) -> GuardianResult<()> {
        let url = self
            .target(notification)
            .ok_or_else(|| GuardianError::notification("no delivery URL"))?;

        with_backoff(&self.backoff, "webhook", || self.post_once(&url, notification))
            .await
            .map_err(|(e, attempts)| GuardianError::notification(format!("{} after {} attempt(s)", e, attempts)))
    }
}

/// Keeps every notification in memory. Used by tests.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent sends fail.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &'static str {
        "recording"
    }

    fn supports(&self, _channel: NotificationChannel) -> bool {
        true
    }

    async fn send(&self, notification: &Notification) -> GuardianResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GuardianError::notification("recording notifier set to fail"));
        }
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

/// Outcome of one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchReport {
    pub fn merge(&mut self, other: DispatchReport) {
        self.attempted += other.attempted;
        self.delivered += other.delivered;
        self.failed += other.failed;
    }
}

/// Fans guardian events out to notifiers.
#[derive(Clone)]
pub struct NotificationDispatcher {
    notifiers: Vec<Arc<dyn Notifier>>,
    policy: EscalationPolicy,
}

impl NotificationDispatcher {
    pub fn new(policy: EscalationPolicy) -> Self {
        Self {
            notifiers: Vec::new(),
            policy,
        }
    }

    /// Register a backend. Earlier registrations win for a shared channel.
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifiers.push(notifier);
        self
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Build the notifications an event calls for.
    pub fn plan(&self, event: &GuardianEvent, contacts: &[EmergencyContact]) -> Vec<Notification> {
        let audience = self.policy.audience(event.kind, event.level, contacts);
        let mut out = Vec::new();

        if audience.owner {
            let recipient = Recipient::Owner {
                user_id: event.user_id.clone(),
            };
            out.push(self.build(event, recipient, NotificationChannel::Push, None, audience.emergency_services));
        }

        for contact in audience.contacts {
            for channel in contact.reachable_channels() {
                let address = match channel {
                    NotificationChannel::Sms => contact.phone.clone(),
                    NotificationChannel::Email => contact.email.clone(),
                    NotificationChannel::Webhook => contact.webhook_url.clone(),
                    NotificationChannel::Push => None,
                };
                let recipient = Recipient::Contact {
                    contact_id: contact.id.clone(),
                    name: contact.name.clone(),
                    address,
                };
                out.push(self.build(event, recipient, channel, Some(&contact.name), audience.emergency_services));
            }
        }

        out
    }

    /// Deliver everything an event calls for.
    pub async fn dispatch(&self, event: &GuardianEvent, contacts: &[EmergencyContact]) -> DispatchReport {
        let notifications = self.plan(event, contacts);
        let results = join_all(notifications.iter().map(|n| self.deliver(n))).await;

        let mut report = DispatchReport {
            attempted: results.len(),
            ..Default::default()
        };
        for delivered in results {
            if delivered {
                report.delivered += 1;
            } else {
                report.failed += 1;
            }
        }

        if report.failed > 0 {
            warn!(
                session_id = %event.session_id,
                kind = %event.kind,
                attempted = report.attempted,
                failed = report.failed,
                "Some guardian notifications were not delivered"
            );
        }
        report
    }

    async fn deliver(&self, notification: &Notification) -> bool {
        let Some(notifier) = self.notifiers.iter().find(|n| n.supports(notification.channel)) else {
            warn!(
                notification_id = %notification.id,
                channel = %notification.channel,
                "No notifier registered for channel"
            );
            metrics::record_notification(notification.channel, false, 0.0);
            return false;
        };

        let start = Instant::now();
        let result = notifier.send(notification).await;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::record_notification(notification.channel, result.is_ok(), elapsed_ms);

        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    notifier = notifier.name(),
                    notification_id = %notification.id,
                    session_id = %notification.session_id,
                    recipient = %notification.recipient.label(),
                    channel = %notification.channel,
                    error = %e,
                    "Notification delivery failed"
                );
                false
            }
        }
    }

    fn build(
        &self,
        event: &GuardianEvent,
        recipient: Recipient,
        channel: NotificationChannel,
        contact_name: Option<&str>,
        emergency_services: bool,
    ) -> Notification {
        let (subject, body) = render(event, contact_name);
        let mut notification = Notification::new(event.session_id.clone(), recipient, channel, event.kind, event.level);
        notification.subject = subject;
        notification.body = body;
        notification.location = event.location;
        notification.emergency_services = emergency_services;
        notification.created_at = event.at;
        notification
    }
}

fn render(event: &GuardianEvent, contact_name: Option<&str>) -> (String, String) {
    let greeting = contact_name.map(|n| format!("Hi {}, ", n)).unwrap_or_default();
    let location = event
        .location
        .map(|l| format!(" Last known location: {:.5}, {:.5}.", l.latitude, l.longitude))
        .unwrap_or_default();

    match event.kind {
        GuardianEventKind::CheckInReminder => (
            "Guardian check-in due".to_string(),
            "Your Guardian Mode check-in is due. Open Noorah and check in to let us know you're safe.".to_string(),
        ),
        GuardianEventKind::MissedCheckIn => (
            "Missed Guardian check-in".to_string(),
            format!(
                "{}a Noorah user who listed you as an emergency contact missed a scheduled safety check-in.{}",
                greeting, location
            ),
        ),
        GuardianEventKind::Escalate => {
            let urgency = if event.level == EscalationLevel::Emergency {
                "URGENT: "
            } else {
                ""
            };
            (
                format!("{}Guardian alert still unanswered", urgency),
                format!(
                    "{}a Noorah user who listed you as an emergency contact has still not checked in. Please try to reach them.{}",
                    greeting, location
                ),
            )
        }
        GuardianEventKind::Sos => (
            "URGENT: SOS raised".to_string(),
            format!(
                "{}a Noorah user who listed you as an emergency contact has raised an SOS. Please contact them immediately.{}",
                greeting, location
            ),
        ),
        GuardianEventKind::AllClear => (
            "Guardian all clear".to_string(),
            format!("{}the Noorah user you were alerted about is safe. No further action is needed.", greeting),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use noorah_models::SessionId;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(kind: GuardianEventKind, level: EscalationLevel) -> GuardianEvent {
        GuardianEvent {
            session_id: SessionId::from_string("sess-1"),
            user_id: "sitter-1".to_string(),
            kind,
            level,
            at: Utc::now(),
            seq: 1,
            location: None,
        }
    }

    fn contacts() -> Vec<EmergencyContact> {
        let mut with_email = EmergencyContact::with_phone("Primary", "+14155550100");
        with_email.email = Some("primary@example.com".to_string());
        with_email.channels.push(NotificationChannel::Email);
        vec![with_email, EmergencyContact::with_phone("Backup", "+14155550101").priority(2)]
    }

    #[test]
    fn test_plan_for_missed_check_in() {
        let dispatcher = NotificationDispatcher::new(EscalationPolicy::default());
        let plan = dispatcher.plan(
            &event(GuardianEventKind::MissedCheckIn, EscalationLevel::PrimaryContacts),
            &contacts(),
        );

        // Owner push + primary contact over SMS and email
        assert_eq!(plan.len(), 3);
        assert!(matches!(plan[0].recipient, Recipient::Owner { .. }));
        assert_eq!(plan[0].channel, NotificationChannel::Push);
        assert_eq!(plan[1].channel, NotificationChannel::Sms);
        assert_eq!(plan[2].channel, NotificationChannel::Email);
        match &plan[2].recipient {
            Recipient::Contact { address, .. } => assert_eq!(address.as_deref(), Some("primary@example.com")),
            other => panic!("unexpected recipient {:?}", other),
        }
        assert!(plan[1].body.starts_with("Hi Primary"));
    }

    #[test]
    fn test_plan_flags_emergency_hand_off() {
        let policy = EscalationPolicy {
            emergency_services_enabled: true,
            ..Default::default()
        };
        let dispatcher = NotificationDispatcher::new(policy);
        let plan = dispatcher.plan(&event(GuardianEventKind::Sos, EscalationLevel::Emergency), &contacts());
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|n| n.emergency_services));
        assert!(plan.iter().all(|n| n.subject.starts_with("URGENT")));
    }

    #[tokio::test]
    async fn test_dispatch_counts_failures_without_aborting() {
        let recorder = Arc::new(RecordingNotifier::new());
        let dispatcher =
            NotificationDispatcher::new(EscalationPolicy::default()).with_notifier(recorder.clone() as Arc<dyn Notifier>);

        let report = dispatcher
            .dispatch(&event(GuardianEventKind::Escalate, EscalationLevel::AllContacts), &contacts())
            .await;
        assert_eq!(
            report,
            DispatchReport {
                attempted: 4,
                delivered: 4,
                failed: 0
            }
        );
        assert_eq!(recorder.sent().await.len(), 4);

        recorder.set_failing(true);
        let report = dispatcher
            .dispatch(&event(GuardianEventKind::Escalate, EscalationLevel::AllContacts), &contacts())
            .await;
        assert_eq!(report.attempted, 4);
        assert_eq!(report.failed, 4);
    }

    #[tokio::test]
    async fn test_dispatch_without_notifier_fails_each_delivery() {
        let dispatcher = NotificationDispatcher::new(EscalationPolicy::default());
        let report = dispatcher
            .dispatch(&event(GuardianEventKind::CheckInReminder, EscalationLevel::Reminder), &[])
            .await;
        assert_eq!(report.attempted, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn test_webhook_notifier_posts_to_relay() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/relay"))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(Some(format!("{}/relay", server.uri()))).unwrap();
        let dispatcher = NotificationDispatcher::new(EscalationPolicy::default()).with_notifier(Arc::new(notifier));

        let report = dispatcher
            .dispatch(&event(GuardianEventKind::CheckInReminder, EscalationLevel::Reminder), &[])
            .await;
        assert_eq!(report.delivered, 1);
    }

    #[tokio::test]
    async fn test_webhook_notifier_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(None)
            .unwrap()
            .with_backoff(Backoff::default().with_base_delay(Duration::from_millis(1)));

        let mut contact = EmergencyContact::with_phone("Hook", "+14155550100");
        contact.webhook_url = Some(format!("{}/hook", server.uri()));
        contact.channels = vec![NotificationChannel::Webhook];

        let mut notification = Notification::new(
            SessionId::from_string("sess-1"),
            Recipient::Contact {
                contact_id: contact.id.clone(),
                name: contact.name.clone(),
                address: contact.webhook_url.clone(),
            },
            NotificationChannel::Webhook,
            GuardianEventKind::MissedCheckIn,
            EscalationLevel::PrimaryContacts,
        );
        notification.subject = "Missed Guardian check-in".to_string();

        notifier.send(&notification).await.unwrap();
    }

    #[tokio::test]
    async fn test_webhook_notifier_does_not_retry_client_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400))
            .expect(1)
            .mount(&server)
            .await;

        let notifier = WebhookNotifier::new(Some(server.uri()))
            .unwrap()
            .with_backoff(Backoff::default().with_base_delay(Duration::from_millis(1)));
        let notification = Notification::new(
            SessionId::from_string("sess-1"),
            Recipient::Owner {
                user_id: "sitter-1".to_string(),
            },
            NotificationChannel::Push,
            GuardianEventKind::CheckInReminder,
            EscalationLevel::Reminder,
        );

        assert!(notifier.send(&notification).await.is_err());
    }

    #[test]
    fn test_webhook_notifier_channel_support() {
        let without_relay = WebhookNotifier::new(None).unwrap();
        assert!(without_relay.supports(NotificationChannel::Webhook));
        assert!(!without_relay.supports(NotificationChannel::Sms));

        let with_relay = WebhookNotifier::new(Some("http://relay.local".to_string())).unwrap();
        assert!(with_relay.supports(NotificationChannel::Push));
    }
}
