//! Vue Lynx Thread Communication
//!
//! The main (UI) thread and the background (logic) thread share no memory.
//! Everything that crosses between them is a [`ThreadMessage`] serialized
//! to JSON and posted through a [`Transport`]. A [`Bridge`] sits on each
//! side: it sends envelopes, fans received envelopes out to subscribed
//! handlers, and matches responses to outstanding calls by correlation id.

#![warn(rust_2018_idioms)]

pub mod bridge;
pub mod layer;
pub mod message;
mod pending;

pub use bridge::{pair, Bridge, CallError, Endpoint, Inbox, PendingCall, Subscription, Transport, TransportError};
pub use layer::Layer;
pub use message::{EnvelopeError, MessageKind, ThreadMessage};
