// Slotbridge - Peripheral Card Link Emulator
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Emulation engine for an Apple II-style slot card that bridges the host's
//! memory-mapped I/O bus to an external process over a datagram link.
//!
//! The host bus decodes each access into `(register offset, kind, value)` and
//! hands it to the card through [`SlotDevice`]. The card keeps the four-line
//! request/acknowledge handshake state, forwards outgoing bytes to the peer
//! and queues incoming bytes for the host to drain one register read at a
//! time.

pub mod buffer;
pub mod card;
pub mod flags;
pub mod rom;
pub mod transport;

pub use card::Card;

/// Register offsets within the card's slot I/O window.
pub const OUTPUT_FLAGS_REG: u8 = 0x07;
pub const INPUT_FLAGS_REG: u8 = 0x0b;
pub const OUTPUT_BYTE_REG: u8 = 0x0d;
pub const INPUT_BYTE_REG: u8 = 0x0e;

#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("could not send datagram to peer: {0}")]
    TransportSend(#[source] std::io::Error),
    #[error("could not receive datagram: {0}")]
    TransportReceive(#[source] std::io::Error),
    #[error("receive queue full, dropping byte {0:#04x}")]
    QueueFull(u8),
    #[error("could not load firmware image: {0}")]
    FirmwareLoad(String),
}

pub type CardResult<T> = Result<T, CardError>;

/// Trait representing a slot card as seen from the host bus.
///
/// The bus serializes accesses: no two calls overlap. `io_read` may block
/// (reading the data register with an empty receive queue holds the bus, as
/// on real hardware).
pub trait SlotDevice: Send {
    /// Handle a read of a slot I/O register. Unmapped offsets read as `0x00`.
    fn io_read(&mut self, offset: u8) -> u8;

    /// Handle a write to a slot I/O register. Unmapped offsets are ignored.
    fn io_write(&mut self, offset: u8, value: u8);

    /// Serve a byte from the 256-byte slot firmware window.
    fn firmware_read(&self, offset: u16) -> u8 {
        let _ = offset;
        0
    }

    /// Serve a byte from the 1792-byte expansion firmware window.
    fn expansion_read(&self, offset: u16) -> u8 {
        let _ = offset;
        0
    }

    /// Return the card to its power-on register state.
    fn reset(&mut self);

    fn name(&self) -> &str;

    fn snapshot(&self) -> serde_json::Value {
        serde_json::Value::Null
    }
}
