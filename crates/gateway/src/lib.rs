//! Gateway: HTTP surface over the WhatsApp session.
//!
//! Lifecycle:
//! 1. Load effective config, refuse to start without an API key
//! 2. Spawn the bridge client and start the session manager
//! 3. Build the router: throttle, then auth, then handlers
//! 4. Serve until Ctrl-C, then stop the session
//!
//! Session logic lives in `venom-whatsapp`; handlers here only read
//! snapshots and map outcomes onto status codes.

pub mod auth;
pub mod error;
pub mod server;
pub mod state;
pub mod throttle;

pub use {
    error::ApiError,
    server::{build_gateway_app, start_gateway},
    state::GatewayState,
};
