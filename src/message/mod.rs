//! The wire unit of the relay protocol.
//!
//! A frame is a fixed-width length header followed by exactly that many body
//! bytes; no delimiters, no checksums. `Message` owns one decoded frame,
//! `OwnedMessage` tags it with the connection it arrived on.

pub use frame::{Header, Message};
pub use owned::OwnedMessage;

mod frame;
mod owned;
