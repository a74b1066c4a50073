// Slotbridge - Peripheral Card Link Emulator
//
// This software is released under the MIT License.
// See the LICENSE file in the project root for full license information.

//! Firmware windows served to the host.
//!
//! The card exposes two disjoint read-only windows populated from one ROM
//! image: the 256-byte slot window lives at image offset `0x700`, the
//! 1792-byte expansion window at the start of the image. The card never
//! interprets the contents.

use std::path::Path;

use crate::{CardError, CardResult};

pub const SLOT_ROM_LEN: usize = 0x100;
pub const EXPANSION_ROM_LEN: usize = 0x700;

const SLOT_ROM_OFFSET: usize = 0x700;
const MIN_IMAGE_LEN: usize = SLOT_ROM_OFFSET + SLOT_ROM_LEN;

#[derive(Debug, Clone)]
pub struct RomWindows {
    slot: Vec<u8>,
    expansion: Vec<u8>,
}

impl Default for RomWindows {
    fn default() -> Self {
        Self::unpopulated()
    }
}

impl RomWindows {
    /// Zero-filled windows, used when no ROM image is available. The card
    /// still operates; only firmware reads are affected.
    pub fn unpopulated() -> Self {
        Self {
            slot: vec![0; SLOT_ROM_LEN],
            expansion: vec![0; EXPANSION_ROM_LEN],
        }
    }

    pub fn from_bytes(image: &[u8]) -> CardResult<Self> {
        if image.len() < MIN_IMAGE_LEN {
            return Err(CardError::FirmwareLoad(format!(
                "image is {} bytes, need at least {}",
                image.len(),
                MIN_IMAGE_LEN
            )));
        }
        Ok(Self {
            slot: image[SLOT_ROM_OFFSET..SLOT_ROM_OFFSET + SLOT_ROM_LEN].to_vec(),
            expansion: image[..EXPANSION_ROM_LEN].to_vec(),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> CardResult<Self> {
        let path = path.as_ref();
        let image = std::fs::read(path)
            .map_err(|e| CardError::FirmwareLoad(format!("{}: {}", path.display(), e)))?;
        Self::from_bytes(&image)
    }

    /// Byte from the slot window; out-of-range offsets read as `0x00`.
    pub fn read_slot(&self, offset: u16) -> u8 {
        self.slot.get(offset as usize).copied().unwrap_or(0)
    }

    /// Byte from the expansion window; out-of-range offsets read as `0x00`.
    pub fn read_expansion(&self, offset: u16) -> u8 {
        self.expansion.get(offset as usize).copied().unwrap_or(0)
    }
}
