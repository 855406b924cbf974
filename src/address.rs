//! Device addresses and their classification.
//!
//! A BLE device owns up to two 6-byte addresses: a public one (an IEEE
//! 802-2001 MAC address, configured once at bring-up) and a random one
//! (assigned by the host). Random addresses are further divided into static,
//! resolvable private and non-resolvable private by their two topmost bits;
//! the rules implemented here decide which byte patterns are acceptable.

use core::fmt;

/// Length of a device address in bytes.
pub const ADDR_LEN: usize = 6;

/// Specifies whether a device address is randomly generated or a LAN MAC
/// address.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AddressKind {
    /// Publicly registered IEEE 802-2001 LAN MAC address.
    Public,
    /// Randomly generated address.
    Random,
}

impl AddressKind {
    /// Converts the HCI wire encoding: 0 is public, any other value random.
    pub fn from_raw(raw: u8) -> Self {
        if raw == 0 {
            AddressKind::Public
        } else {
            AddressKind::Random
        }
    }
}

/// A Bluetooth device address.
#[derive(Copy, Clone, PartialEq, Eq)]
pub struct DeviceAddress {
    bytes: [u8; ADDR_LEN],
    kind: AddressKind,
}

impl DeviceAddress {
    /// Creates a new device address from 6 raw bytes and a kind specifier.
    ///
    /// `bytes` contains the address as it is sent over the air (LSB first).
    pub fn new(bytes: [u8; ADDR_LEN], kind: AddressKind) -> Self {
        DeviceAddress { bytes, kind }
    }

    /// Returns the address kind.
    pub fn kind(&self) -> AddressKind {
        self.kind
    }

    /// Returns whether this address is randomly generated.
    pub fn is_random(&self) -> bool {
        self.kind == AddressKind::Random
    }

    /// Returns the raw bytes making up this address (LSB first).
    pub fn raw(&self) -> &[u8; ADDR_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for DeviceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Addresses are customarily displayed MSB first, so that the OUI acts
        // as a prefix.
        for (i, b) in self.bytes.iter().rev().enumerate() {
            if i != 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        write!(f, "[{:?}]", self.kind)
    }
}

/// Returns whether `addr` is a resolvable private address.
///
/// Only random addresses (non-zero HCI address type) can be RPAs; the two
/// topmost bits must be `0b01`.
pub fn is_rpa(addr: &[u8; ADDR_LEN], kind: AddressKind) -> bool {
    kind == AddressKind::Random && addr[5] & 0xc0 == 0x40
}

/// Checks whether `addr` is acceptable as the device's random address.
///
/// The 46 non-type bits must be neither all zero nor all one. Beyond that,
/// the upper two bits select the sub-kind:
///
/// * `0b11`: static random, no further checks.
/// * `0b01`: resolvable, the prand part must be neither all zero nor all one.
/// * `0b00`: non-resolvable, must differ from the public address.
///
/// Anything else is invalid.
pub fn is_valid_random_addr(addr: &[u8; ADDR_LEN], public: &[u8; ADDR_LEN]) -> bool {
    // Byte-sum test: 0 means every candidate bit is clear, the maximum means
    // every candidate bit is set.
    let mut sum: u16 = addr[..5].iter().map(|&b| u16::from(b)).sum();
    sum += u16::from(addr[5] & 0x3f);
    if sum == 0 || sum == 5 * 255 + 0x3f {
        return false;
    }

    match addr[5] & 0xc0 {
        0xc0 => true,
        0x40 => {
            let prand = u16::from(addr[3]) + u16::from(addr[4]) + u16::from(addr[5] & 0x3f);
            prand != 0 && prand != 255 + 255 + 0x3f
        }
        0x00 => addr != public,
        _ => false,
    }
}
