// Slotbridge - Peripheral Card Link Emulator
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Handshake flag state machine.
//!
//! The card and the host each own one flag byte. Four bits of the pair encode
//! the request/acknowledge lines of the physical link; the convention is
//! active-low (bit cleared = line asserted), inherited from the GPIO wiring
//! of the real card.

/// Host-driven: intent-to-send. Informational only, never drives card logic.
pub const OUTPUT_SEND_REQUEST: u8 = 0x01;
/// Host-driven: acknowledge of a received byte. Drives `INPUT_SEND_CONFIRM`.
pub const OUTPUT_RECEIVE_CONFIRM: u8 = 0x02;
/// Card-driven: bytes are available to read.
pub const INPUT_RECEIVE_REQUEST: u8 = 0x80;
/// Card-driven: ready/confirmed for the next send.
pub const INPUT_SEND_CONFIRM: u8 = 0x40;

const OUTPUT_POWER_ON: u8 = 0xff;
const INPUT_POWER_ON: u8 = 0xff & !INPUT_SEND_CONFIRM;

/// The visible protocol state: the card's flag byte and a mirror of the last
/// flag byte the host wrote. Touched only by the foreground register handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct HandshakeFlags {
    input: u8,
    output: u8,
}

impl Default for HandshakeFlags {
    fn default() -> Self {
        Self::new()
    }
}

impl HandshakeFlags {
    pub fn new() -> Self {
        Self {
            input: INPUT_POWER_ON,
            output: OUTPUT_POWER_ON,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn input(&self) -> u8 {
        self.input
    }

    pub fn output(&self) -> u8 {
        self.output
    }

    /// Status-register read: returns the current flag byte, then mutates the
    /// stored value for the *next* access. A non-empty receive queue asserts
    /// `INPUT_RECEIVE_REQUEST` (clears the bit); `INPUT_SEND_CONFIRM` toggles
    /// unconditionally on every read.
    ///
    /// The unconditional toggle looks odd for a request/acknowledge protocol
    /// but matches the shipped firmware's expectations. Do not "fix" it.
    pub fn read_status(&mut self, queue_has_data: bool) -> u8 {
        let current = self.input;
        if queue_has_data {
            self.input &= !INPUT_RECEIVE_REQUEST;
        }
        self.input ^= INPUT_SEND_CONFIRM;
        current
    }

    /// A byte was dequeued for the host: deassert "data available".
    pub fn note_byte_consumed(&mut self) {
        self.input |= INPUT_RECEIVE_REQUEST;
    }

    /// A byte was handed to the transport: mark "not yet confirmed".
    pub fn note_byte_sent(&mut self) {
        self.input &= !INPUT_SEND_CONFIRM;
    }

    /// Flags-register write: mirror the host's byte and recompute
    /// `INPUT_SEND_CONFIRM` from the host's receive-confirm line.
    pub fn write_output(&mut self, value: u8) {
        self.output = value;
        if value & OUTPUT_RECEIVE_CONFIRM == 0 {
            self.input |= INPUT_SEND_CONFIRM;
        } else {
            self.input &= !INPUT_SEND_CONFIRM;
        }
    }

    /// Render the four decoded signal lines for handshake tracing, asserted
    /// lines spelled out, deasserted ones blank.
    pub fn describe_lines(&self) -> String {
        format!(
            "{} {} {} {}",
            if self.output & OUTPUT_SEND_REQUEST == 0 {
                "sREQ"
            } else {
                "    "
            },
            if self.input & INPUT_SEND_CONFIRM == 0 {
                "sACK"
            } else {
                "    "
            },
            if self.input & INPUT_RECEIVE_REQUEST == 0 {
                "rACK"
            } else {
                "    "
            },
            if self.output & OUTPUT_RECEIVE_CONFIRM == 0 {
                "rREQ"
            } else {
                "    "
            },
        )
    }
}
