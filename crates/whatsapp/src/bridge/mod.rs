//! [`ChatSessionClient`](venom_channels::ChatSessionClient) backed by a
//! browser-automation sidecar process.
//!
//! The sidecar owns the browser, the chat-network protocol and the credential
//! directory. The gateway spawns it, sends JSON-RPC requests on its stdin and
//! reads responses plus lifecycle notifications from its stdout.

mod client;
pub mod transport;

pub use client::BridgeClient;
