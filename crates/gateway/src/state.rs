use std::sync::Arc;

use {
    secrecy::Secret,
    venom_config::VenomConfig,
    venom_whatsapp::{MessageDispatcher, SessionManager},
};

use crate::{auth::AuthGate, throttle::RequestThrottle};

/// Everything the HTTP handlers and middleware share.
pub struct GatewayState {
    pub session: Arc<SessionManager>,
    pub dispatcher: MessageDispatcher,
    pub auth: Arc<AuthGate>,
    pub throttle: Arc<RequestThrottle>,
    /// Image service the `/qr` page points at.
    pub pairing_image_url: String,
    pub version: String,
}

impl GatewayState {
    pub fn new(
        session: Arc<SessionManager>,
        api_key: Secret<String>,
        config: &VenomConfig,
    ) -> Arc<Self> {
        let dispatcher =
            MessageDispatcher::new(session.client(), config.session.upstream_timeout());
        Arc::new(Self {
            session,
            dispatcher,
            auth: Arc::new(AuthGate::new(api_key)),
            throttle: Arc::new(RequestThrottle::from_config(&config.throttle)),
            pairing_image_url: config.session.pairing_image_url.clone(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }
}
