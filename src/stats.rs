//! Link Layer statistics.
//!
//! A plain block of counters; no aggregation framework. The dispatch paths
//! increment most of them, the HCI layer bumps its command/event counters
//! through `LinkLayer::stats_mut`, and the controller reset clears
//! everything.

use crate::pdu::PduType;

/// The Link Layer counter block.
#[derive(Debug, Default, Clone)]
pub struct Stats {
    pub hci_cmds: u32,
    pub hci_cmd_errs: u32,
    pub hci_events_sent: u32,
    /// Radio or task events arrived while in a state that cannot handle
    /// them.
    pub bad_ll_state: u32,
    /// Host ACL packets with an inconsistent header.
    pub bad_acl_hdr: u32,
    /// Buffer allocations that failed.
    pub no_bufs: u32,
    pub rx_adv_pdu_crc_ok: u32,
    pub rx_adv_pdu_crc_err: u32,
    pub rx_adv_bytes_crc_ok: u32,
    pub rx_adv_bytes_crc_err: u32,
    pub rx_data_pdu_crc_ok: u32,
    pub rx_data_pdu_crc_err: u32,
    pub rx_data_bytes_crc_ok: u32,
    pub rx_data_bytes_crc_err: u32,
    /// Advertising channel PDUs whose length did not fit their type.
    pub rx_adv_malformed_pkts: u32,
    pub rx_adv_ind: u32,
    pub rx_adv_direct_ind: u32,
    pub rx_adv_nonconn_ind: u32,
    pub rx_adv_ext_ind: u32,
    pub rx_scan_reqs: u32,
    pub rx_scan_rsps: u32,
    pub rx_connect_reqs: u32,
    pub rx_scan_ind: u32,
    pub rx_aux_connect_rsp: u32,
}

impl Stats {
    /// Clears every counter.
    pub fn reset(&mut self) {
        *self = Stats::default();
    }

    /// Counts a received advertising PDU by type.
    ///
    /// PDUs carrying a destination address are counted even when they were
    /// not addressed at us.
    pub(crate) fn count_rx_adv_pdu(&mut self, pdu_type: PduType) {
        match pdu_type {
            PduType::AdvExtInd => self.rx_adv_ext_ind += 1,
            PduType::AdvInd => self.rx_adv_ind += 1,
            PduType::AdvDirectInd => self.rx_adv_direct_ind += 1,
            PduType::AdvNonconnInd => self.rx_adv_nonconn_ind += 1,
            PduType::ScanReq => self.rx_scan_reqs += 1,
            PduType::ScanRsp => self.rx_scan_rsps += 1,
            PduType::ConnectReq => self.rx_connect_reqs += 1,
            PduType::AdvScanInd => self.rx_scan_ind += 1,
            PduType::AuxConnectRsp => self.rx_aux_connect_rsp += 1,
            PduType::Unknown(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pdu_type_counters() {
        let mut stats = Stats::default();
        stats.count_rx_adv_pdu(PduType::ScanReq);
        stats.count_rx_adv_pdu(PduType::ScanReq);
        stats.count_rx_adv_pdu(PduType::AdvInd);
        stats.count_rx_adv_pdu(PduType::Unknown(0x0f));
        assert_eq!(stats.rx_scan_reqs, 2);
        assert_eq!(stats.rx_adv_ind, 1);

        stats.reset();
        assert_eq!(stats.rx_scan_reqs, 0);
    }
}
