//! Binary wire codec for Ardan sensor traffic.
//!
//! Decodes datagrams from the simulation peer into
//! [`PacketEnvelope`](ardan_core::PacketEnvelope)s and encodes outbound
//! commands. Encoding is deterministic: identical envelopes always
//! produce identical bytes.
//!
//! # Format
//!
//! ```text
//! [BODY_LEN u32 LE] [TAG u8] [BODY ...BODY_LEN bytes]
//! ```
//!
//! One datagram carries exactly one packet. The length prefix and tag are
//! validated before the body is touched, and every read is bounded by the
//! received buffer.
//!
//! | Tag    | Kind                    | Body                                 |
//! |--------|-------------------------|--------------------------------------|
//! | `0x01` | `STATE_UPDATE`          | entity u32, mask u8, present fields  |
//! | `0x02` | `COMMAND_SET_INDICATOR` | entity u32, on u8                    |
//! | `0x03` | `COMMAND_TRIGGER_EVENT` | entity u32                           |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;

pub use codec::{decode, decode_bounded, encode, encode_into, encoded_len};

/// Largest datagram accepted or produced, in either direction (32 KiB).
pub const MAX_DATAGRAM_SIZE: usize = 0x8000;

/// Bytes of framing ahead of the body: `u32` length prefix plus `u8` tag.
pub const HEADER_LEN: usize = 5;

/// Tag for `STATE_UPDATE`.
pub const TAG_STATE_UPDATE: u8 = 0x01;
/// Tag for `COMMAND_SET_INDICATOR`.
pub const TAG_SET_INDICATOR: u8 = 0x02;
/// Tag for `COMMAND_TRIGGER_EVENT`.
pub const TAG_TRIGGER_EVENT: u8 = 0x03;

/// `STATE_UPDATE` field-presence bits, in body order.
pub mod mask {
    /// Colour present (3 × u8).
    pub const COLOR: u8 = 1 << 0;
    /// Radio duty present (f64).
    pub const RADIO_DUTY: u8 = 1 << 1;
    /// Transmit ratio present (f64).
    pub const RADIO_TX: u8 = 1 << 2;
    /// Receive ratio present (f64).
    pub const RADIO_RX: u8 = 1 << 3;
    /// Interference ratio present (f64).
    pub const RADIO_IX: u8 = 1 << 4;
    /// Timestamp present (f64).
    pub const TIMESTAMP: u8 = 1 << 5;
    /// Every defined bit.
    pub const ALL: u8 = COLOR | RADIO_DUTY | RADIO_TX | RADIO_RX | RADIO_IX | TIMESTAMP;
}
