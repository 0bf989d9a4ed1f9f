//! Application state.

use std::sync::Arc;

use noorah_guardian::{
    EscalationPolicy, LogNotifier, NotificationDispatcher, SessionRegistry, WebhookNotifier,
};

use crate::auth::JwtVerifier;
use crate::config::ApiConfig;
use crate::error::ApiResult;
use crate::services::{GuardianMonitor, GuardianService, MfaService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub jwt: Arc<JwtVerifier>,
    pub mfa: MfaService,
    pub guardian: GuardianService,
    pub monitor: Arc<GuardianMonitor>,
}

impl AppState {
    /// Create application state with the production notifier chain.
    ///
    /// Webhook delivery is tried first (contact webhooks always, other
    /// channels when a relay is configured); anything left is logged.
    pub fn new(config: ApiConfig) -> ApiResult<Self> {
        let policy = EscalationPolicy::from(&config.guardian);
        let webhook = WebhookNotifier::new(config.guardian.webhook_url.clone())?;
        let dispatcher = NotificationDispatcher::new(policy)
            .with_notifier(Arc::new(webhook))
            .with_notifier(Arc::new(LogNotifier));

        Ok(Self::with_dispatcher(config, dispatcher))
    }

    /// Create application state around a caller-supplied dispatcher.
    pub fn with_dispatcher(config: ApiConfig, dispatcher: NotificationDispatcher) -> Self {
        let jwt = Arc::new(JwtVerifier::new(&config.auth));
        let mfa = MfaService::new(config.mfa.clone());
        let guardian = GuardianService::new(config.guardian.clone(), Arc::new(SessionRegistry::new()), dispatcher);
        let monitor = Arc::new(GuardianMonitor::new(guardian.clone()));

        Self {
            config,
            jwt,
            mfa,
            guardian,
            monitor,
        }
    }
}
