//! # arinc-protocol
//!
//! ARINC 429 word codec and the JSON message formats built on it.
//!
//! This crate defines:
//! - The 32-bit word layout, parity and per-field scaling
//! - REST, push-channel and outbound sink message types

pub mod arinc429;
pub mod codec;
pub mod messages;

pub use arinc429::*;
pub use codec::{encode_message, CodecError};
pub use messages::*;
