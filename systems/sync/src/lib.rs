#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Synchronization between the local board and the remote session service.
//!
//! [`SyncClient`] is the only component that sends intents and the only one
//! that feeds inbound envelopes into `tabletop_board::apply`. Transports plug
//! in through the [`Channel`] trait.

mod authority;
mod channel;
mod client;
mod stream;
pub mod wire;

pub use authority::LocalAuthority;
pub use channel::{Channel, LoopbackChannel};
pub use client::{Delivery, SyncClient, SyncStats};
pub use stream::StreamChannel;
pub use wire::WireError;
