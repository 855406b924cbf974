//! Advertising channel PDU classification.
//!
//! The byte layouts themselves are taken as given by the air interface; this
//! module only knows the pieces the dispatcher needs: the PDU type living in
//! the low 4 bits of the first header byte, and the per-type payload length
//! rules applied before a received frame is handed upwards.

use crate::address::ADDR_LEN;

/// Mask selecting the PDU type bits of the first header byte.
pub const PDU_TYPE_MASK: u8 = 0x0f;

/// Length of the advertising channel PDU header (type/flags byte + length
/// byte).
pub const PDU_HDR_LEN: u16 = 2;

/// Exact payload length of `SCAN_REQ` and `ADV_DIRECT_IND` PDUs.
pub const SCAN_REQ_LEN: u8 = 12;

/// Exact payload length of a `CONNECT_REQ` PDU.
pub const CONNECT_REQ_LEN: u8 = 34;

/// Largest payload of the undirected legacy advertising PDUs.
pub const ADV_SCAN_IND_MAX_LEN: u8 = 37;

/// Largest payload of any PDU the controller can receive (extended
/// advertising and data length extension use the full 8-bit length field).
pub const MAX_PAYLOAD_LEN: usize = 255;

enum_with_unknown! {
    /// Advertising channel PDU types.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub enum PduType(u8) {
        /// Connectable undirected advertising.
        AdvInd = 0b0000,
        /// Connectable directed advertising.
        AdvDirectInd = 0b0001,
        /// Non-connectable undirected advertising.
        AdvNonconnInd = 0b0010,
        /// Scan request.
        ScanReq = 0b0011,
        /// Scan response.
        ScanRsp = 0b0100,
        /// Connection request.
        ConnectReq = 0b0101,
        /// Scannable undirected advertising.
        AdvScanInd = 0b0110,
        /// Extended advertising (BT 5).
        AdvExtInd = 0b0111,
        /// Secondary-channel connect response (BT 5).
        AuxConnectRsp = 0b1000,
    }
}

/// Extracts the PDU type from the first advertising channel header byte.
pub fn pdu_type(hdr_byte: u8) -> PduType {
    PduType::from(hdr_byte & PDU_TYPE_MASK)
}

/// Checks a received payload length against the rules for its PDU type.
///
/// Only meaningful for frames with a good CRC; a corrupted frame has an
/// untrustworthy length byte anyway. Extended advertising PDUs are accepted
/// unchecked, their inner structure is validated by the extended-advertising
/// sub-module.
pub fn valid_rx_len(pdu_type: PduType, len: u8) -> bool {
    match pdu_type {
        PduType::ScanReq | PduType::AdvDirectInd => len == SCAN_REQ_LEN,
        PduType::ScanRsp | PduType::AdvInd | PduType::AdvScanInd | PduType::AdvNonconnInd => {
            len >= ADDR_LEN as u8 && len <= ADV_SCAN_IND_MAX_LEN
        }
        PduType::ConnectReq => len == CONNECT_REQ_LEN,
        PduType::AuxConnectRsp | PduType::AdvExtInd => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_roundtrip() {
        for raw in 0..=0x0f {
            assert_eq!(u8::from(PduType::from(raw)), raw);
        }
    }

    #[test]
    fn type_from_header_byte() {
        // Flag bits above the type field are ignored.
        assert_eq!(pdu_type(0b0100_0011), PduType::ScanReq);
        assert_eq!(pdu_type(0b1100_0000), PduType::AdvInd);
        assert_eq!(pdu_type(0x0f), PduType::Unknown(0x0f));
    }

    #[test]
    fn exact_length_types() {
        assert!(valid_rx_len(PduType::ScanReq, 12));
        assert!(!valid_rx_len(PduType::ScanReq, 11));
        assert!(!valid_rx_len(PduType::ScanReq, 13));
        assert!(valid_rx_len(PduType::AdvDirectInd, 12));
        assert!(valid_rx_len(PduType::ConnectReq, 34));
        assert!(!valid_rx_len(PduType::ConnectReq, 33));
    }

    #[test]
    fn ranged_length_types() {
        for ty in &[
            PduType::AdvInd,
            PduType::AdvNonconnInd,
            PduType::AdvScanInd,
            PduType::ScanRsp,
        ] {
            assert!(!valid_rx_len(*ty, 5));
            assert!(valid_rx_len(*ty, 6));
            assert!(valid_rx_len(*ty, 37));
            assert!(!valid_rx_len(*ty, 38));
        }
    }

    #[test]
    fn unchecked_and_unknown_types() {
        assert!(valid_rx_len(PduType::AdvExtInd, 0));
        assert!(valid_rx_len(PduType::AdvExtInd, 255));
        assert!(valid_rx_len(PduType::AuxConnectRsp, 200));
        assert!(!valid_rx_len(PduType::Unknown(0x0f), 12));
    }
}
