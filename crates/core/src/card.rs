// Slotbridge - Peripheral Card Link Emulator
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! The bridge card: four byte-wide registers wiring the handshake flag pair,
//! the receive buffer and the datagram link together.
//!
//! Register map (offsets within the slot I/O window):
//!
//! | Offset | Read | Write |
//! |--------|------|-------|
//! | `0x07` | —    | store output flags, recompute send-confirm |
//! | `0x0b` | input flags, then status side effects | — |
//! | `0x0d` | —    | send byte to peer, clear send-confirm |
//! | `0x0e` | block-dequeue byte, deassert receive-request | — |
//!
//! Transport and queue failures never fail a register access; the real
//! hardware has no way to report them over the bus.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread;

use slotbridge_config::{CardConfig, TraceOptions};

use crate::buffer::ReceiveBuffer;
use crate::flags::HandshakeFlags;
use crate::rom::RomWindows;
use crate::transport::{Transport, UdpTransport};
use crate::{
    CardError, SlotDevice, INPUT_BYTE_REG, INPUT_FLAGS_REG, OUTPUT_BYTE_REG, OUTPUT_FLAGS_REG,
};

pub const DEVICE_NAME: &str = "slotbridge";

pub struct Card {
    flags: HandshakeFlags,
    buffer: Arc<ReceiveBuffer>,
    transport: Arc<dyn Transport>,
    rom: RomWindows,
    trace: TraceOptions,
    local_addr: Option<SocketAddr>,
}

impl Card {
    /// Build a card wired to UDP per the config and start its listener.
    ///
    /// A missing or malformed ROM image is logged and leaves the firmware
    /// windows zero-filled; only a socket failure aborts construction.
    pub fn new(config: &CardConfig) -> io::Result<Self> {
        let transport = UdpTransport::bind(config.listen_addr(), config.peer_addr())?;
        let local_addr = transport.local_addr()?;
        tracing::info!(
            "card listening on {}, peer {}",
            local_addr,
            transport.peer_addr()
        );

        let rom = match &config.rom {
            Some(path) => RomWindows::from_file(path).unwrap_or_else(|e| {
                tracing::error!("{}", e);
                RomWindows::unpopulated()
            }),
            None => RomWindows::unpopulated(),
        };

        let mut card = Self::with_transport(Arc::new(transport), rom, config.trace);
        card.local_addr = Some(local_addr);
        card.spawn_listener();
        Ok(card)
    }

    /// Build a card over an arbitrary transport without starting a listener.
    /// The caller (or [`Card::spawn_listener`]) decides who feeds the buffer.
    pub fn with_transport(
        transport: Arc<dyn Transport>,
        rom: RomWindows,
        trace: TraceOptions,
    ) -> Self {
        Self {
            flags: HandshakeFlags::new(),
            buffer: Arc::new(ReceiveBuffer::new()),
            transport,
            rom,
            trace,
            local_addr: None,
        }
    }

    /// Start the background listener that drains the transport into the
    /// receive buffer. Runs for the process lifetime; `reset` does not touch
    /// it. Dropped bytes (full queue) are logged, never back-pressured.
    pub fn spawn_listener(&self) {
        let transport = Arc::clone(&self.transport);
        let buffer = Arc::clone(&self.buffer);
        thread::spawn(move || {
            transport.receive_loop(&mut |bytes| {
                for &byte in bytes {
                    if !buffer.try_enqueue(byte) {
                        tracing::warn!("{}", CardError::QueueFull(byte));
                    }
                }
            });
        });
    }

    /// Handle to the receive buffer, shared with the listener thread.
    pub fn receive_buffer(&self) -> Arc<ReceiveBuffer> {
        Arc::clone(&self.buffer)
    }

    /// Local datagram endpoint, when the card was built over UDP.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    fn read_status(&mut self) -> u8 {
        let value = self.flags.read_status(!self.buffer.is_empty());
        self.trace_handshake("RR");
        value
    }

    fn read_data(&mut self) -> u8 {
        let byte = self.buffer.dequeue_blocking();
        self.flags.note_byte_consumed();
        self.trace_handshake("<=");
        byte
    }

    fn write_data(&mut self, value: u8) {
        // Best-effort delivery: the flag update happens either way.
        if let Err(e) = self.transport.send(value) {
            tracing::warn!("{}", CardError::TransportSend(e));
        }
        self.flags.note_byte_sent();
        self.trace_handshake("=>");
    }

    fn write_flags(&mut self, value: u8) {
        self.flags.write_output(value);
        self.trace_handshake("WW");
    }

    fn trace_handshake(&self, tag: &str) {
        if self.trace.handshake {
            tracing::trace!("{} {}", tag, self.flags.describe_lines());
        }
    }
}

impl SlotDevice for Card {
    fn io_read(&mut self, offset: u8) -> u8 {
        let value = match offset {
            INPUT_FLAGS_REG => self.read_status(),
            INPUT_BYTE_REG => self.read_data(),
            _ => 0x00,
        };
        if self.trace.io {
            tracing::trace!("io read  {:#04x} => {:#04x}", offset, value);
        }
        value
    }

    fn io_write(&mut self, offset: u8, value: u8) {
        if self.trace.io {
            tracing::trace!("io write {:#04x} <= {:#04x}", offset, value);
        }
        match offset {
            OUTPUT_BYTE_REG => self.write_data(value),
            OUTPUT_FLAGS_REG => self.write_flags(value),
            _ => {}
        }
    }

    fn firmware_read(&self, offset: u16) -> u8 {
        let value = self.rom.read_slot(offset);
        if self.trace.firmware {
            tracing::trace!("rom read {:#06x} => {:#04x}", offset, value);
        }
        value
    }

    fn expansion_read(&self, offset: u16) -> u8 {
        let value = self.rom.read_expansion(offset);
        if self.trace.firmware {
            tracing::trace!("xrom read {:#06x} => {:#04x}", offset, value);
        }
        value
    }

    fn reset(&mut self) {
        self.flags.reset();
        self.buffer.clear();
    }

    fn name(&self) -> &str {
        DEVICE_NAME
    }

    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "input_flags": self.flags.input(),
            "output_flags": self.flags.output(),
            "queued": self.buffer.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flags::{INPUT_RECEIVE_REQUEST, INPUT_SEND_CONFIRM, OUTPUT_RECEIVE_CONFIRM};
    use std::sync::mpsc;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct MockTransport {
        sent: Mutex<Vec<u8>>,
        refuse_sends: bool,
    }

    impl MockTransport {
        fn refusing() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                refuse_sends: true,
            }
        }

        fn sent(&self) -> Vec<u8> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn send(&self, byte: u8) -> io::Result<()> {
            if self.refuse_sends {
                return Err(io::Error::new(io::ErrorKind::Other, "send refused"));
            }
            self.sent.lock().unwrap().push(byte);
            Ok(())
        }

        fn receive_loop(&self, _on_bytes: &mut dyn FnMut(&[u8])) {}
    }

    fn test_card() -> (Card, Arc<MockTransport>) {
        let transport = Arc::new(MockTransport::default());
        let card = Card::with_transport(
            transport.clone(),
            RomWindows::unpopulated(),
            TraceOptions::default(),
        );
        (card, transport)
    }

    #[test]
    fn test_data_out_sends_each_byte_in_write_order() {
        let (mut card, transport) = test_card();
        for byte in [0x01, 0x02, 0x03, 0xff] {
            card.io_write(OUTPUT_BYTE_REG, byte);
        }
        assert_eq!(transport.sent(), vec![0x01, 0x02, 0x03, 0xff]);
    }

    #[test]
    fn test_data_in_drains_received_bytes_in_order() {
        let (mut card, _transport) = test_card();
        let buffer = card.receive_buffer();
        buffer.try_enqueue(0x10);
        buffer.try_enqueue(0x20);
        assert_eq!(card.io_read(INPUT_BYTE_REG), 0x10);
        assert_eq!(card.io_read(INPUT_BYTE_REG), 0x20);
    }

    #[test]
    fn test_data_in_blocks_until_listener_delivers() {
        let (mut card, _transport) = test_card();
        let buffer = card.receive_buffer();
        buffer.try_enqueue(0x10);
        buffer.try_enqueue(0x20);
        assert_eq!(card.io_read(INPUT_BYTE_REG), 0x10);
        assert_eq!(card.io_read(INPUT_BYTE_REG), 0x20);

        let (done_tx, done_rx) = mpsc::channel();
        let reader = thread::spawn(move || {
            let byte = card.io_read(INPUT_BYTE_REG);
            done_tx.send(byte).unwrap();
        });
        assert!(done_rx.recv_timeout(Duration::from_millis(50)).is_err());

        buffer.try_enqueue(0x30);
        assert_eq!(
            done_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            0x30
        );
        reader.join().unwrap();
    }

    #[test]
    fn test_data_in_deasserts_receive_request() {
        let (mut card, _transport) = test_card();
        let buffer = card.receive_buffer();
        buffer.try_enqueue(0x55);
        // Status read observing the pending byte asserts receive-request.
        card.io_read(INPUT_FLAGS_REG);
        let after_status = card.io_read(INPUT_FLAGS_REG);
        assert_eq!(after_status & INPUT_RECEIVE_REQUEST, 0);

        card.io_read(INPUT_BYTE_REG);
        let after_data = card.io_read(INPUT_FLAGS_REG);
        assert_eq!(after_data & INPUT_RECEIVE_REQUEST, INPUT_RECEIVE_REQUEST);
    }

    #[test]
    fn test_status_read_twice_toggles_send_confirm_only() {
        let (mut card, _transport) = test_card();
        let first = card.io_read(INPUT_FLAGS_REG);
        let second = card.io_read(INPUT_FLAGS_REG);
        assert_ne!(first & INPUT_SEND_CONFIRM, second & INPUT_SEND_CONFIRM);
        // Queue was empty on the first read: receive-request is untouched.
        assert_eq!(
            first & INPUT_RECEIVE_REQUEST,
            second & INPUT_RECEIVE_REQUEST
        );
    }

    #[test]
    fn test_confirm_handshake_round_trip() {
        let (mut card, transport) = test_card();
        // Host asserts receive-confirm (active-low): send-confirm reads set.
        card.io_write(OUTPUT_FLAGS_REG, 0x00);
        let status = card.io_read(INPUT_FLAGS_REG);
        assert_eq!(status & INPUT_SEND_CONFIRM, INPUT_SEND_CONFIRM);

        // Sending a byte clears it again.
        card.io_write(OUTPUT_BYTE_REG, 0x41);
        let status = card.io_read(INPUT_FLAGS_REG);
        assert_eq!(status & INPUT_SEND_CONFIRM, 0);
        assert_eq!(transport.sent(), vec![0x41]);
    }

    #[test]
    fn test_flags_write_with_confirm_deasserted_clears_send_confirm() {
        let (mut card, _transport) = test_card();
        card.io_write(OUTPUT_FLAGS_REG, 0x00);
        card.io_write(OUTPUT_FLAGS_REG, OUTPUT_RECEIVE_CONFIRM);
        let status = card.io_read(INPUT_FLAGS_REG);
        assert_eq!(status & INPUT_SEND_CONFIRM, 0);
    }

    #[test]
    fn test_failed_send_still_completes_the_access() {
        let transport = Arc::new(MockTransport::refusing());
        let mut card = Card::with_transport(
            transport.clone(),
            RomWindows::unpopulated(),
            TraceOptions::default(),
        );
        card.io_write(OUTPUT_FLAGS_REG, 0x00);
        card.io_write(OUTPUT_BYTE_REG, 0x41);
        // Nothing went out, but the flag state is as if delivery succeeded.
        assert!(transport.sent().is_empty());
        let status = card.io_read(INPUT_FLAGS_REG);
        assert_eq!(status & INPUT_SEND_CONFIRM, 0);
    }

    #[test]
    fn test_reset_restores_power_on_defaults() {
        let (mut card, _transport) = test_card();
        let buffer = card.receive_buffer();
        buffer.try_enqueue(0xaa);
        card.io_write(OUTPUT_FLAGS_REG, 0x00);
        card.io_read(INPUT_FLAGS_REG);

        card.reset();
        assert!(buffer.is_empty());
        let snapshot = card.snapshot();
        assert_eq!(snapshot["output_flags"], 0xff);
        assert_eq!(snapshot["input_flags"], 0xbf);
        assert_eq!(snapshot["queued"], 0);
    }

    #[test]
    fn test_unmapped_accesses_are_inert() {
        let (mut card, transport) = test_card();
        assert_eq!(card.io_read(0x00), 0x00);
        card.io_write(0x05, 0x12);
        assert!(transport.sent().is_empty());
        assert_eq!(card.snapshot()["output_flags"], 0xff);
    }

    #[test]
    fn test_firmware_windows_served_verbatim() {
        let mut image = vec![0u8; 0x800];
        image[0x000] = 0xc8;
        image[0x6ff] = 0xc9;
        image[0x700] = 0xcd;
        image[0x7ff] = 0xce;
        let card = Card::with_transport(
            Arc::new(MockTransport::default()),
            RomWindows::from_bytes(&image).unwrap(),
            TraceOptions::default(),
        );
        assert_eq!(card.expansion_read(0x000), 0xc8);
        assert_eq!(card.expansion_read(0x6ff), 0xc9);
        assert_eq!(card.firmware_read(0x000), 0xcd);
        assert_eq!(card.firmware_read(0x0ff), 0xce);
        assert_eq!(card.name(), DEVICE_NAME);
    }
}
