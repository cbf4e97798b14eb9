//! Chat session client abstraction.
//!
//! The gateway never talks to the chat network directly. Everything goes
//! through a [`ChatSessionClient`], which exposes request/response calls and
//! pushes [`LifecycleEvent`]s into a channel handed to it at construction.

pub mod client;
pub mod error;
pub mod event;
pub mod recipient;
#[cfg(feature = "test-support")]
pub mod testing;

pub use {
    client::{AccountInfo, ChatSessionClient, DeliveryReceipt},
    error::ClientError,
    event::{LifecycleEvent, LifecycleReceiver, LifecycleSender, lifecycle_channel},
    recipient::RecipientId,
};
