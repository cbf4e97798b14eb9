//! WhatsApp session lifecycle: pairing, readiness, recovery and outbound sends.
//!
//! Lifecycle:
//! 1. [`SessionManager::start`] spawns the event loop and kicks off the first
//!    `initialize()` on the [`venom_channels::ChatSessionClient`].
//! 2. The client pushes lifecycle events; the event loop is the only writer of
//!    [`SessionStateStore`] and [`PairingCodeCache`].
//! 3. Failures arm the [`ReconnectScheduler`], which re-initializes after a
//!    fixed delay. Readiness cancels any pending retry.
//!
//! HTTP handlers only read snapshots and send through [`MessageDispatcher`].

pub mod bridge;
pub mod dispatch;
pub mod manager;
pub mod pairing;
pub mod qr;
pub mod reconnect;
pub mod state;
pub mod upstream;

pub use {
    bridge::BridgeClient,
    dispatch::{DispatchError, Dispatched, MessageDispatcher, SendRequest},
    manager::{RecoveryPolicy, SessionManager},
    pairing::{PairingCode, PairingCodeCache},
    reconnect::ReconnectScheduler,
    state::{ClientStatus, SessionState, SessionStateStore},
};
