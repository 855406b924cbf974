//! Physical layer interface and PHY-mode timing arithmetic.
//!
//! The timing functions here are the authoritative reference used by the
//! connection, advertising and scanning sub-modules when they budget air
//! time. They are pure arithmetic; the [`Phy`] trait at the bottom is the
//! seam to the actual radio driver.
//!
//! [`Phy`]: trait.Phy.html

use crate::buffer::PduBuf;
use crate::error::Error;
use crate::time::Duration;

/// Length of the preamble on the 1M PHY, in bytes (the 2M PHY doubles it).
pub const PREAMBLE_LEN: u32 = 1;

/// Length of the access address, in bytes.
pub const ACC_ADDR_LEN: u32 = 4;

/// Length of the CRC, in bytes.
pub const CRC_LEN: u32 = 3;

const PDU_HDR_LEN: u32 = crate::pdu::PDU_HDR_LEN as u32;

/// Smallest data channel payload every connection must be able to carry,
/// whatever the negotiated timing says.
pub const CONN_SUPP_BYTES_MIN: u16 = 27;

/// Largest data channel payload the data length extension allows.
pub const CONN_SUPP_BYTES_MAX: u16 = 251;

/// Smallest legal connMaxTx/RxTime value, in microseconds.
pub const CONN_SUPP_TIME_MIN: u16 = 328;

/// Largest legal connMaxTx/RxTime value, in microseconds.
pub const CONN_SUPP_TIME_MAX: u16 = 17040;

/// The transmission modes of the BLE physical layer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PhyMode {
    /// 1 Mbit/s uncoded.
    OneM,
    /// 2 Mbit/s uncoded.
    TwoM,
    /// Coded, S=8 (125 kbit/s).
    Coded125k,
    /// Coded, S=2 (500 kbit/s).
    Coded500k,
}

impl PhyMode {
    /// Air time of everything around the payload, in microseconds: preamble,
    /// access address, CRC and PDU header.
    ///
    /// For the coded PHY the spec provides exact figures (Vol 6, Part B,
    /// 2.2): preamble, access address, CI and TERM1 are always coded S=8,
    /// while PDU header, CRC and TERM2 follow the data coding.
    pub fn header_tx_time(self) -> u32 {
        match self {
            PhyMode::OneM => (PREAMBLE_LEN + ACC_ADDR_LEN + CRC_LEN + PDU_HDR_LEN) << 3,
            PhyMode::TwoM => (PREAMBLE_LEN * 2 + ACC_ADDR_LEN + CRC_LEN + PDU_HDR_LEN) << 2,
            PhyMode::Coded125k => 80 + 256 + 16 + 24 + 8 * (PDU_HDR_LEN * 8 + 24 + 3),
            PhyMode::Coded500k => 80 + 256 + 16 + 24 + 2 * (PDU_HDR_LEN * 8 + 24 + 3),
        }
    }

    /// Microseconds of air time per payload byte in this mode.
    fn usecs_per_byte(self) -> u32 {
        match self {
            PhyMode::OneM => 8,
            PhyMode::TwoM => 4,
            PhyMode::Coded125k => 64,
            PhyMode::Coded500k => 16,
        }
    }

    /// Time needed to transmit a PDU with a `payload_len`-byte payload.
    pub fn pdu_tx_time(self, payload_len: u16) -> Duration {
        Duration::from_micros(self.header_tx_time() + u32::from(payload_len) * self.usecs_per_byte())
    }

    /// Largest payload that can be transmitted within `time`.
    ///
    /// Never returns less than 27: connEffectiveMaxTx/RxTime always permits
    /// the minimum data PDU, even when the window is shorter than the frame
    /// header alone (Vol 6, Part B, 4.5.10). That can happen after switching
    /// a connection from an uncoded to the coded PHY.
    pub fn max_tx_octets(self, time: Duration) -> u16 {
        let usecs = time.as_micros();
        let header = self.header_tx_time();
        if usecs < header {
            return CONN_SUPP_BYTES_MIN;
        }

        let octets = (usecs - header) / self.usecs_per_byte();
        let octets = octets.min(u32::from(u16::max_value())) as u16;
        octets.max(CONN_SUPP_BYTES_MIN)
    }
}

/// Checks a connMaxTx/RxOctets value against the supported range.
pub fn supported_payload_octets(octets: u16) -> bool {
    octets >= CONN_SUPP_BYTES_MIN && octets <= CONN_SUPP_BYTES_MAX
}

/// Checks a connMaxTx/RxTime value (microseconds) against the supported
/// range.
pub fn supported_payload_time(usecs: u16) -> bool {
    usecs >= CONN_SUPP_TIME_MIN && usecs <= CONN_SUPP_TIME_MAX
}

/// Interface to the radio driver.
///
/// Apart from `init`, everything here may be called from interrupt context
/// and must neither block nor allocate.
pub trait Phy {
    /// Initializes (or, after a reset, re-initializes) the radio.
    fn init(&mut self) -> Result<(), Error>;

    /// Disables the radio immediately, aborting any reception or
    /// transmission in progress.
    fn disable(&mut self);

    /// Sets the transmit power in dBm.
    fn set_tx_power(&mut self, dbm: i8);

    /// Whether a frame reception is currently in progress.
    fn rx_started(&self) -> bool;

    /// Implementation-defined transceiver state, for diagnostics only.
    fn xcvr_state(&self) -> u8;

    /// Access address of the frame currently being received.
    fn access_addr(&self) -> u32;

    /// Copies the frame in the driver's receive buffer into `pdu`'s payload.
    ///
    /// `rxbuf` is the same pointer previously passed to `rx_start`/`rx_end`;
    /// drivers with DMA'd receive memory may ignore it and copy from their
    /// own buffer.
    fn rxpdu_copy(&mut self, rxbuf: &[u8], pdu: &mut PduBuf);

    /// Stops the RF clock. Only invoked when the controller manages the
    /// clock (`Config::XTAL_SETTLE_TICKS` is non-zero).
    fn rfclk_stop(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_MODES: [PhyMode; 4] = [
        PhyMode::OneM,
        PhyMode::TwoM,
        PhyMode::Coded125k,
        PhyMode::Coded500k,
    ];

    #[test]
    fn header_times() {
        assert_eq!(PhyMode::OneM.header_tx_time(), 80);
        assert_eq!(PhyMode::TwoM.header_tx_time(), 44);
        assert_eq!(PhyMode::Coded125k.header_tx_time(), 720);
        assert_eq!(PhyMode::Coded500k.header_tx_time(), 462);
    }

    #[test]
    fn tx_times() {
        assert_eq!(PhyMode::OneM.pdu_tx_time(0).as_micros(), 80);
        assert_eq!(PhyMode::OneM.pdu_tx_time(27).as_micros(), 296);
        assert_eq!(PhyMode::TwoM.pdu_tx_time(27).as_micros(), 152);
        assert_eq!(PhyMode::Coded125k.pdu_tx_time(1).as_micros(), 784);
        assert_eq!(PhyMode::Coded500k.pdu_tx_time(27).as_micros(), 462 + 432);
    }

    #[test]
    fn max_octets_clamps_to_minimum() {
        // (100 - 80) / 8 = 2, clamped up.
        assert_eq!(PhyMode::OneM.max_tx_octets(Duration::from_micros(100)), 27);
        for &mode in &ALL_MODES {
            assert_eq!(mode.max_tx_octets(Duration::ZERO), 27);
            assert!(mode.max_tx_octets(Duration::from_micros(1)) >= 27);
        }
    }

    #[test]
    fn max_octets_values() {
        assert_eq!(
            PhyMode::OneM.max_tx_octets(Duration::from_micros(2120)),
            255
        );
        assert_eq!(
            PhyMode::TwoM.max_tx_octets(Duration::from_micros(44 + 251 * 4)),
            251
        );
    }

    #[test]
    fn max_octets_inverts_tx_time() {
        for &mode in &ALL_MODES {
            for usecs in (0u32..20_000).step_by(7) {
                let time = Duration::from_micros(usecs);
                let octets = mode.max_tx_octets(time);
                assert!(octets >= 27);
                // Only the clamp may exceed the window.
                if octets > 27 {
                    assert!(mode.pdu_tx_time(octets).as_micros() <= usecs);
                }
            }
        }
    }

    #[test]
    fn supported_ranges() {
        assert!(!supported_payload_octets(26));
        assert!(supported_payload_octets(27));
        assert!(supported_payload_octets(251));
        assert!(!supported_payload_octets(252));
        assert!(!supported_payload_time(327));
        assert!(supported_payload_time(328));
        assert!(supported_payload_time(17040));
        assert!(!supported_payload_time(17041));
    }
}
