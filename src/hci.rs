//! HCI-facing types: status codes, ACL data framing, and the event callbacks
//! the core invokes on the HCI layer.
//!
//! Command and event *parsing* lives outside this crate; the dispatcher only
//! needs the pieces that cross its boundary.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Error;

/// Controller error codes placed in HCI command status/complete events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Success = 0x00,
    UnknownHciCommand = 0x01,
    /// The command is valid but not allowed in the current state.
    CommandDisallowed = 0x0c,
    /// A command parameter is outside its allowed range.
    InvalidHciCommandParams = 0x12,
}

/// Hardware error code reported when the controller loses sync with the
/// radio.
pub const HW_ERR_SYNC_LOSS: u8 = 0x01;

/// Length of the HCI ACL data header.
pub const ACL_HDR_LEN: usize = 4;

/// The 4-byte header preceding ACL data from the host.
///
/// Little-endian layout: a 16-bit word holding the connection handle (low 12
/// bits), the packet-boundary flag (bits 12-13) and the broadcast flag (bits
/// 14-15), followed by a 16-bit data length.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AclHeader {
    handle: u16,
    length: u16,
}

impl AclHeader {
    /// Parses the header from the first 4 bytes of `raw`.
    pub fn parse(raw: &[u8]) -> Result<Self, Error> {
        if raw.len() < ACL_HDR_LEN {
            return Err(Error::Eof);
        }
        Ok(AclHeader {
            handle: LittleEndian::read_u16(raw),
            length: LittleEndian::read_u16(&raw[2..]),
        })
    }

    /// The connection handle (12 bits).
    pub fn handle(&self) -> u16 {
        self.handle & 0x0fff
    }

    /// The raw handle word, flags included, as the connection module expects
    /// it.
    pub fn handle_raw(&self) -> u16 {
        self.handle
    }

    /// The packet-boundary flag (2 bits).
    pub fn pb_flag(&self) -> u8 {
        ((self.handle >> 12) & 0b11) as u8
    }

    /// The broadcast flag (2 bits).
    pub fn bc_flag(&self) -> u8 {
        ((self.handle >> 14) & 0b11) as u8
    }

    /// The payload length announced by the host.
    pub fn data_length(&self) -> u16 {
        self.length
    }
}

/// Callbacks into the HCI layer for events the dispatch core originates.
///
/// All methods run in Link Layer task context.
pub trait Hci {
    /// Re-initializes HCI state (event masks). Called at bring-up and again
    /// on every controller reset.
    fn init(&mut self);

    /// Sends a no-op command-complete event telling the host the controller
    /// is ready to receive commands.
    fn send_noop(&mut self);

    /// Sends the HCI hardware-error event with the given code.
    ///
    /// Returns `Err(Error::NoBuffers)` when no event buffer could be
    /// allocated; the caller retries later.
    fn hw_error_event(&mut self, code: u8) -> Result<(), Error>;

    /// Sends the data-buffer-overflow event.
    fn data_buffer_overflow_event(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_header() {
        // Handle 0x0123, PB = 2, BC = 1, length 0x0204.
        let raw = [0x23, 0x61, 0x04, 0x02, 0xaa];
        let hdr = AclHeader::parse(&raw).unwrap();
        assert_eq!(hdr.handle(), 0x0123);
        assert_eq!(hdr.pb_flag(), 2);
        assert_eq!(hdr.bc_flag(), 1);
        assert_eq!(hdr.handle_raw(), 0x6123);
        assert_eq!(hdr.data_length(), 0x0204);
    }

    #[test]
    fn parse_too_short() {
        assert_eq!(AclHeader::parse(&[0x00, 0x01, 0x02]), Err(Error::Eof));
    }
}
