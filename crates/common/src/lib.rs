//! Core domain types that are shared between the client crates but have no
//! real home of their own.
//!
//! The websocket client treats chain data as opaque; the only domain type it
//! needs is [`Signature`], and only for equality and set membership.

mod signature;

pub use signature::{ParseSignatureError, Signature};
