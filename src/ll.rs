//! The Link Layer dispatch engine.
//!
//! [`LinkLayer`] owns the controller's global state machine and everything
//! that crosses between execution contexts: the RX/TX packet FIFOs, the
//! buffer pool, the event queue producer, and the deferred hardware-error
//! callout. Radio and scheduler interrupts call into the `*_isr`-flavored
//! entry points; the Link Layer task feeds events into [`run_event`].
//!
//! The platform arbitrates access (all entry points take `&mut self`); see
//! the crate docs for the contexts involved.
//!
//! [`LinkLayer`]: struct.LinkLayer.html
//! [`run_event`]: struct.LinkLayer.html#method.run_event

use crate::address::{self, AddressKind, DeviceAddress, ADDR_LEN};
use crate::buffer::{PduBuf, PduBufPool, RxInfo};
use crate::config::{Callout, Config, EventQueue, Parts, RandomSource};
use crate::error::Error;
use crate::features::FeatureSet;
use crate::hci::{self, AclHeader, Hci, Status};
use crate::pdu::{self, PduType};
use crate::phy::Phy;
use crate::queue::PacketQueue;
use crate::state::{State, SupportedStates};
use crate::stats::Stats;
use crate::subsys::{
    Advertiser, ConnectionModule, Initiator, ResolvingList, RxEnd, RxStart, Scanner, Scheduler,
    StateHandler, Whitelist,
};
use crate::time::Duration;
use crate::utils::{Hex, HexSlice};

/// Events processed by the Link Layer task.
///
/// The platform's task loop takes these from its event queue and hands them
/// to [`LinkLayer::run_event`].
///
/// [`LinkLayer::run_event`]: struct.LinkLayer.html#method.run_event
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LlEvent {
    /// A received PDU was queued.
    RxPkt,
    /// Host ACL data was queued.
    TxPkt,
    /// An ACL buffer had to be dropped; the host must be told.
    DataBufOverflow,
    /// The connection module has completed-packet counts to report.
    CompPkts,
    /// The deferred hardware-error callout fired.
    HwError,
}

/// The Link Layer singleton.
///
/// Created once at system bring-up, never destroyed.
pub struct LinkLayer<C: Config> {
    state: State,
    /// Our public device address.
    dev_addr: [u8; ADDR_LEN],
    /// Our random device address; all-zero until the host assigns one.
    random_addr: [u8; ADDR_LEN],
    supp_features: FeatureSet,
    pref_tx_phys: u8,
    pref_rx_phys: u8,
    num_acl_pkts: u8,
    acl_pkt_size: u16,
    xtal_ticks: u32,
    stats: Stats,
    pool: PduBufPool,
    rx_pkt_q: PacketQueue,
    tx_pkt_q: PacketQueue,
    evq: C::EventQueue,
    hw_err_timer: C::Callout,
    phy: C::Phy,
    sched: C::Scheduler,
    hci: C::Hci,
    adv: C::Advertiser,
    scan: C::Scanner,
    initiator: C::Initiator,
    conn: C::ConnectionModule,
    dtm: C::DirectTest,
    whitelist: C::Whitelist,
    resolv: C::ResolvingList,
    rng: C::Rng,
}

impl<C: Config> LinkLayer<C> {
    /// Creates the Link Layer. Must run before any ISR can fire.
    ///
    /// The sub-modules in `parts` arrive already constructed; this picks the
    /// public device address, assembles the feature mask and puts the HCI
    /// layer and the scheduler into their initial state.
    pub fn new(parts: Parts<C>) -> Self {
        // Build-time address, unless it is the "any" sentinel and the
        // hardware knows better.
        let dev_addr = if C::PUBLIC_DEV_ADDR == [0; ADDR_LEN] {
            C::hw_public_addr().unwrap_or([0; ADDR_LEN])
        } else {
            C::PUBLIC_DEV_ADDR
        };

        let mut this: Self = LinkLayer {
            state: State::Standby,
            dev_addr,
            random_addr: [0; ADDR_LEN],
            supp_features: FeatureSet::supported(),
            pref_tx_phys: 0,
            pref_rx_phys: 0,
            num_acl_pkts: C::NUM_ACL_PKTS,
            acl_pkt_size: C::ACL_PKT_SIZE,
            xtal_ticks: C::XTAL_SETTLE_TICKS,
            stats: Stats::default(),
            pool: PduBufPool::new(),
            rx_pkt_q: PacketQueue::new(),
            tx_pkt_q: PacketQueue::new(),
            evq: parts.evq,
            hw_err_timer: parts.hw_err_timer,
            phy: parts.phy,
            sched: parts.sched,
            hci: parts.hci,
            adv: parts.adv,
            scan: parts.scan,
            initiator: parts.initiator,
            conn: parts.conn,
            dtm: parts.dtm,
            whitelist: parts.whitelist,
            resolv: parts.resolv,
            rng: parts.rng,
        };

        this.hci.init();
        this.sched.init();

        info!(
            "link layer up, dev = {:?}, features = {:?}",
            this.dev_addr(),
            Hex(this.supp_features.bits())
        );
        this
    }

    /// Initialization the Link Layer task runs before entering its event
    /// loop: bring up the PHY, set the transmit power, tell the host we are
    /// ready and start the entropy source.
    pub fn task_init(&mut self) -> Result<(), Error> {
        self.phy.init()?;
        self.phy.set_tx_power(C::TX_POWER_DBM);
        self.hci.send_noop();
        self.rng.start();
        Ok(())
    }

    /// Runs one event taken from the task's event queue.
    ///
    /// The platform's task loop never exits:
    /// `loop { ll.run_event(evq.get_blocking()) }`.
    pub fn run_event(&mut self, event: LlEvent) {
        match event {
            LlEvent::RxPkt => self.rx_pkt_in(),
            LlEvent::TxPkt => self.tx_pkt_in(),
            LlEvent::DataBufOverflow => self.hci.data_buffer_overflow_event(),
            LlEvent::CompPkts => self.conn.num_comp_pkts_event_send(),
            LlEvent::HwError => self.hw_err_timer_exp(),
        }
    }

    /// Sets the current Link Layer state. ISR or task context.
    pub fn state_set(&mut self, state: State) {
        self.state = state;
    }

    /// Returns the current Link Layer state.
    pub fn state_get(&self) -> State {
        self.state
    }

    /// The 64-bit supported-states mask published via HCI.
    pub fn read_supp_states(&self) -> u64 {
        SupportedStates::supported().bits()
    }

    /// The feature mask assembled at build time.
    pub fn read_supp_features(&self) -> FeatureSet {
        self.supp_features
    }

    /// Our public device address.
    pub fn dev_addr(&self) -> DeviceAddress {
        DeviceAddress::new(self.dev_addr, AddressKind::Public)
    }

    /// Our random device address (all-zero when never assigned).
    pub fn random_addr(&self) -> DeviceAddress {
        DeviceAddress::new(self.random_addr, AddressKind::Random)
    }

    /// Whether `addr` is our device address of the given kind.
    pub fn is_our_devaddr(&self, addr: &[u8; ADDR_LEN], kind: AddressKind) -> bool {
        let ours = match kind {
            AddressKind::Public => &self.dev_addr,
            AddressKind::Random => &self.random_addr,
        };
        ours == addr
    }

    /// Handles the set-random-address HCI command.
    ///
    /// `hci_adv_ext` says whether the command came in through the extended
    /// advertising command set; the legacy variant also applies the address
    /// to advertising instance 0 and is disallowed while advertising.
    pub fn set_random_addr(&mut self, addr: [u8; ADDR_LEN], hci_adv_ext: bool) -> Result<(), Status> {
        if self.initiator.conn_create_in_progress()
            || self.scan.is_enabled()
            || (!hci_adv_ext && self.adv.is_enabled())
        {
            return Err(Status::CommandDisallowed);
        }

        if !address::is_valid_random_addr(&addr, &self.dev_addr) {
            return Err(Status::InvalidHciCommandParams);
        }

        debug!("random address set to {:?}", HexSlice(&addr[..]));
        self.random_addr = addr;

        if !hci_adv_ext {
            self.adv.set_random_addr(addr);
        }

        Ok(())
    }

    /// Allocates a buffer for a received PDU of `len` total bytes,
    /// headroom reserved for a later header prepend.
    ///
    /// The caller gets a fully usable buffer or `None`; failures are counted.
    pub fn rxpdu_alloc(&mut self, len: u16) -> Option<PduBuf> {
        let pdu = self.pool.alloc(len);
        if pdu.is_none() {
            self.stats.no_bufs += 1;
        }
        pdu
    }

    /// Queues a received PDU for the task. Radio ISR context.
    pub fn rx_pdu_in(&mut self, rxpdu: PduBuf) {
        if let Err(buf) = self.rx_pkt_q.put(rxpdu) {
            // Cannot happen while the pool bounds outstanding receptions.
            self.pool.free(buf);
            self.stats.no_bufs += 1;
            return;
        }
        self.evq.put(LlEvent::RxPkt);
    }

    /// Queues ACL data from the host for the task. Runs on the host-facing
    /// side, under the platform's access arbitration.
    pub fn acl_data_in(&mut self, txpkt: PduBuf) {
        if let Err(buf) = self.tx_pkt_q.put(txpkt) {
            self.pool.free(buf);
            self.stats.no_bufs += 1;
            return;
        }
        self.evq.put(LlEvent::TxPkt);
    }

    /// Posts `event` to the Link Layer task. ISR-safe.
    pub fn event_send(&mut self, event: LlEvent) {
        self.evq.put(event);
    }

    /// ISR context: an ACL buffer had to be dropped. The host is told from
    /// task context.
    pub fn data_buffer_overflow(&mut self) {
        self.evq.put(LlEvent::DataBufOverflow);
    }

    /// ISR context: the radio reported an unrecoverable error. Reporting is
    /// deferred to the task because event allocation can block or fail.
    pub fn hw_error(&mut self) {
        self.hw_err_timer.reset(Duration::ZERO);
    }

    /// Task side of hardware-error reporting: send the event, or re-arm the
    /// callout until a buffer frees up.
    fn hw_err_timer_exp(&mut self) {
        if self.hci.hw_error_event(hci::HW_ERR_SYNC_LOSS).is_err() {
            warn!("no buffer for hardware-error event, retrying");
            self.hw_err_timer.reset(Duration::from_millis(50));
        }
    }

    /// Called by the PHY when the preamble, access address and first PDU
    /// header byte of a frame have been received. Radio ISR context.
    ///
    /// The verdict tells the PHY whether to abort, keep receiving, or keep
    /// receiving and prepare the turn-around transmission.
    pub fn rx_start(&mut self, rxbuf: &[u8], rxhdr: &mut RxInfo) -> RxStart {
        let pdu_type = pdu::pdu_type(rxbuf.first().copied().unwrap_or(0));
        let access_addr = self.phy.access_addr();

        let state = self.state;
        if let Some(handler) = self.handler(state) {
            return handler.rx_isr_start(pdu_type, rxhdr, access_addr);
        }

        // Should not be receiving in this state.
        self.stats.bad_ll_state += 1;
        RxStart::Discard
    }

    /// Called by the PHY when a reception has completed. Radio ISR context.
    ///
    /// Classifies the frame, validates its length against the PDU type,
    /// copies it out for the task where the state wants that, and notifies
    /// the sub-module that owned the radio.
    pub fn rx_end(&mut self, rxbuf: &[u8], rxhdr: &mut RxInfo) -> RxEnd {
        let crc_ok = rxhdr.crc_ok();
        let pdu_type = pdu::pdu_type(rxbuf.first().copied().unwrap_or(0));
        let len = rxbuf.get(1).copied().unwrap_or(0);

        // Data traffic skips the advertising channel checks entirely.
        match rxhdr.state {
            State::DirectTest => return self.dtm.rx_isr_end(rxbuf, None, rxhdr),
            State::Connection => return self.conn.rx_isr_end(rxbuf, None, rxhdr),
            _ => {}
        }

        // With a good CRC the length must also be credible for the type.
        // A corrupt frame is passed on as-is; the sub-modules want to see it.
        let badpkt = crc_ok && !pdu::valid_rx_len(pdu_type, len);
        if badpkt {
            self.stats.rx_adv_malformed_pkts += 1;
        }

        match rxhdr.state {
            State::Advertising | State::Scanning => {
                let mut rxpdu = if badpkt {
                    None
                } else {
                    self.rxpdu_alloc(u16::from(len) + pdu::PDU_HDR_LEN)
                };
                if let Some(pdu) = rxpdu.as_mut() {
                    self.phy.rxpdu_copy(rxbuf, pdu);
                    pdu.set_rx_info(*rxhdr);
                }

                let rc = if rxhdr.state == State::Advertising {
                    self.adv.rx_isr_end(rxbuf, rxpdu.as_mut(), rxhdr)
                } else {
                    self.scan.rx_isr_end(rxbuf, rxpdu.as_mut(), rxhdr)
                };

                // Hand the copy to the task regardless of CRC state.
                if let Some(pdu) = rxpdu {
                    self.rx_pdu_in(pdu);
                }
                rc
            }
            // The initiator inspects the PHY buffer directly; no copy here.
            State::Initiating => self.initiator.rx_isr_end(rxbuf, None, rxhdr),
            _ => {
                self.stats.bad_ll_state += 1;
                RxEnd::DisablePhy
            }
        }
    }

    /// Called by the scheduler when the wait-for-response window closes.
    /// Scheduler ISR context.
    pub fn wfr_timer_exp(&mut self) {
        // A reception already in flight resolves through rx_end instead.
        if self.phy.rx_started() {
            return;
        }

        let state = self.state;
        if let Some(handler) = self.handler(state) {
            handler.wfr_timer_exp();
        }
    }

    /// Performs the software reset behind the HCI reset command.
    ///
    /// The PHY is re-initialized; the HCI transport itself is not touched.
    pub fn reset(&mut self) -> Result<(), Error> {
        debug!("link layer reset");

        self.phy.disable();

        self.sched.wfr_disable();
        self.sched.stop();

        self.scan.reset();
        self.adv.reset();
        self.dtm.reset();

        self.flush_pkt_queues();

        self.stats.reset();

        self.pref_tx_phys = 0;
        self.pref_rx_phys = 0;

        self.conn.reset();
        self.hci.init();
        self.sched.init();

        self.state_set(State::Standby);

        // Stop the RF clock when we manage it.
        if self.xtal_ticks != 0 {
            self.phy.rfclk_stop();
        }

        self.random_addr = [0; ADDR_LEN];

        self.whitelist.clear();
        self.resolv.reset();

        let rc = self.phy.init();
        if rc.is_err() {
            error!("PHY re-init failed after reset");
        }
        rc
    }

    /// Sets the preferred PHY masks (LE Set Default PHY).
    pub fn set_preferred_phys(&mut self, tx: u8, rx: u8) {
        self.pref_tx_phys = tx;
        self.pref_rx_phys = rx;
    }

    /// The preferred (TX, RX) PHY masks; zero after reset.
    pub fn preferred_phys(&self) -> (u8, u8) {
        (self.pref_tx_phys, self.pref_rx_phys)
    }

    /// Number of ACL packets advertised to the host (Read Buffer Size).
    pub fn num_acl_pkts(&self) -> u8 {
        self.num_acl_pkts
    }

    /// ACL packet size advertised to the host (Read Buffer Size).
    pub fn acl_pkt_size(&self) -> u16 {
        self.acl_pkt_size
    }

    /// RF crystal settle time, in ticks; zero when the clock is unmanaged.
    pub fn xtal_ticks(&self) -> u32 {
        self.xtal_ticks
    }

    /// The statistics block.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// The statistics block, mutably.
    ///
    /// The HCI layer accounts the commands it parses and the events it sends
    /// through this; the dispatch paths bump their counters internally.
    pub fn stats_mut(&mut self) -> &mut Stats {
        &mut self.stats
    }

    /// The entropy source, for sub-modules that need random material.
    pub fn rng(&mut self) -> &mut C::Rng {
        &mut self.rng
    }

    pub fn phy(&mut self) -> &mut C::Phy {
        &mut self.phy
    }

    pub fn advertiser(&mut self) -> &mut C::Advertiser {
        &mut self.adv
    }

    pub fn scanner(&mut self) -> &mut C::Scanner {
        &mut self.scan
    }

    pub fn initiator(&mut self) -> &mut C::Initiator {
        &mut self.initiator
    }

    pub fn connection(&mut self) -> &mut C::ConnectionModule {
        &mut self.conn
    }

    pub fn direct_test(&mut self) -> &mut C::DirectTest {
        &mut self.dtm
    }

    pub fn hci(&mut self) -> &mut C::Hci {
        &mut self.hci
    }

    pub fn whitelist(&mut self) -> &mut C::Whitelist {
        &mut self.whitelist
    }

    pub fn resolving_list(&mut self) -> &mut C::ResolvingList {
        &mut self.resolv
    }

    /// The sub-module owning the radio in `state`, if any.
    fn handler(&mut self, state: State) -> Option<&mut dyn StateHandler> {
        match state {
            State::Advertising => Some(&mut self.adv),
            State::Scanning => Some(&mut self.scan),
            State::Initiating => Some(&mut self.initiator),
            State::Connection => Some(&mut self.conn),
            State::DirectTest => Some(&mut self.dtm),
            State::Standby => None,
        }
    }

    /// Drains the received-PDU queue and dispatches each packet to the
    /// sub-module that was active when it was received.
    fn rx_pkt_in(&mut self) {
        while let Some(pkt) = self.rx_pkt_q.get() {
            let info = match pkt.rx_info().copied() {
                Some(info) => info,
                None => {
                    // A buffer without reception metadata has no home.
                    self.stats.bad_ll_state += 1;
                    self.pool.free(pkt);
                    continue;
                }
            };

            let pdu_type = pdu::pdu_type(pkt.data().first().copied().unwrap_or(0));
            self.count_rx_stats(&info, pkt.pkt_len(), pdu_type);
            trace!("rx pkt in {:?}: {:?}, {} bytes", info.state, pdu_type, pkt.pkt_len());

            let leftover = match info.state {
                State::Connection => self.conn.rx_pkt_in(pdu_type, pkt),
                State::Advertising => self.adv.rx_pkt_in(pdu_type, pkt),
                State::Scanning => self.scan.rx_pkt_in(pdu_type, pkt),
                State::Initiating => self.initiator.rx_pkt_in(pdu_type, pkt),
                State::DirectTest => self.dtm.rx_pkt_in(pdu_type, pkt),
                State::Standby => {
                    self.stats.bad_ll_state += 1;
                    Some(pkt)
                }
            };

            if let Some(buf) = leftover {
                self.pool.free(buf);
            }
        }
    }

    /// Drains the host ACL queue, validating each packet's HCI header before
    /// handing it to the connection module.
    fn tx_pkt_in(&mut self) {
        while let Some(mut pkt) = self.tx_pkt_q.get() {
            match Self::split_acl_hdr(&mut pkt) {
                Some((handle, length)) => self.conn.tx_pkt_in(pkt, handle, length),
                None => {
                    debug!("bad ACL data header, dropping packet");
                    self.stats.bad_acl_hdr += 1;
                    self.pool.free(pkt);
                }
            }
        }
    }

    /// Strips the HCI ACL header off `pkt` and validates it. Returns the raw
    /// handle word and the payload length.
    fn split_acl_hdr(pkt: &mut PduBuf) -> Option<(u16, u16)> {
        let hdr = AclHeader::parse(pkt.data()).ok()?;
        pkt.strip_front(hci::ACL_HDR_LEN as u16).ok()?;

        if pkt.pkt_len() != hdr.data_length() || hdr.pb_flag() > 1 || hdr.data_length() == 0 {
            return None;
        }

        Some((hdr.handle_raw(), hdr.data_length()))
    }

    /// Updates the receive counters for one dequeued packet.
    fn count_rx_stats(&mut self, info: &RxInfo, len: u16, pdu_type: PduType) {
        let data_pdu = matches!(info.state, State::Connection | State::DirectTest);

        if info.crc_ok() {
            if data_pdu {
                self.stats.rx_data_pdu_crc_ok += 1;
                self.stats.rx_data_bytes_crc_ok += u32::from(len);
            } else {
                self.stats.rx_adv_pdu_crc_ok += 1;
                self.stats.rx_adv_bytes_crc_ok += u32::from(len);
                self.stats.count_rx_adv_pdu(pdu_type);
            }
        } else if data_pdu {
            self.stats.rx_data_pdu_crc_err += 1;
            self.stats.rx_data_bytes_crc_err += u32::from(len);
        } else {
            self.stats.rx_adv_pdu_crc_err += 1;
            self.stats.rx_adv_bytes_crc_err += u32::from(len);
        }
    }

    /// Releases every queued packet back to the pool.
    fn flush_pkt_queues(&mut self) {
        while let Some(buf) = self.tx_pkt_q.get() {
            self.pool.free(buf);
        }
        while let Some(buf) = self.rx_pkt_q.get() {
            self.pool.free(buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::{RxFlags, POOL_BUFS};
    use crate::phy::PhyMode;
    use crate::time::Instant;
    use rand_core::RngCore;

    const PUB: [u8; 6] = [0x5a, 0x92, 0x04, 0x26, 0xc6, 0x88];
    const HW_PUB: [u8; 6] = [0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0x00];
    const STATIC_RAND: [u8; 6] = [0x01, 0x02, 0x03, 0x04, 0x05, 0xc6];

    #[derive(Default)]
    struct MockPhy {
        inits: u32,
        disables: u32,
        tx_power: Option<i8>,
        rx_in_progress: bool,
        rfclk_stops: u32,
    }

    impl Phy for MockPhy {
        fn init(&mut self) -> Result<(), Error> {
            self.inits += 1;
            Ok(())
        }

        fn disable(&mut self) {
            self.disables += 1;
        }

        fn set_tx_power(&mut self, dbm: i8) {
            self.tx_power = Some(dbm);
        }

        fn rx_started(&self) -> bool {
            self.rx_in_progress
        }

        fn xcvr_state(&self) -> u8 {
            0
        }

        fn access_addr(&self) -> u32 {
            0x8e89_bed6
        }

        fn rxpdu_copy(&mut self, rxbuf: &[u8], pdu: &mut PduBuf) {
            let n = usize::from(pdu.pkt_len()).min(rxbuf.len());
            pdu.data_mut()[..n].copy_from_slice(&rxbuf[..n]);
        }

        fn rfclk_stop(&mut self) {
            self.rfclk_stops += 1;
        }
    }

    #[derive(Default)]
    struct MockSched {
        inits: u32,
        stops: u32,
        wfr_disables: u32,
    }

    impl Scheduler for MockSched {
        fn init(&mut self) {
            self.inits += 1;
        }

        fn stop(&mut self) {
            self.stops += 1;
        }

        fn wfr_disable(&mut self) {
            self.wfr_disables += 1;
        }
    }

    #[derive(Default)]
    struct MockEvq {
        events: Vec<LlEvent>,
    }

    impl EventQueue for MockEvq {
        fn put(&mut self, event: LlEvent) {
            self.events.push(event);
        }
    }

    #[derive(Default)]
    struct MockCallout {
        armed: Vec<Duration>,
        stops: u32,
    }

    impl Callout for MockCallout {
        fn reset(&mut self, delay: Duration) {
            self.armed.push(delay);
        }

        fn stop(&mut self) {
            self.stops += 1;
        }
    }

    #[derive(Default)]
    struct MockHci {
        inits: u32,
        noops: u32,
        overflows: u32,
        hw_errs: Vec<u8>,
        fail_hw_err: bool,
    }

    impl Hci for MockHci {
        fn init(&mut self) {
            self.inits += 1;
        }

        fn send_noop(&mut self) {
            self.noops += 1;
        }

        fn hw_error_event(&mut self, code: u8) -> Result<(), Error> {
            self.hw_errs.push(code);
            if self.fail_hw_err {
                Err(Error::NoBuffers)
            } else {
                Ok(())
            }
        }

        fn data_buffer_overflow_event(&mut self) {
            self.overflows += 1;
        }
    }

    /// Records every call the dispatcher makes; stands in for all five
    /// sub-modules.
    struct MockModule {
        enabled: bool,
        conn_in_progress: bool,
        start_verdict: RxStart,
        consume: bool,
        starts: Vec<PduType>,
        /// (dispatcher allocated a buffer, CRC was ok)
        isr_ends: Vec<(bool, bool)>,
        pkts: Vec<(PduType, u16)>,
        tx_pkts: Vec<(u16, u16)>,
        wfr: u32,
        resets: u32,
        comp_pkts: u32,
        random_addr: Option<[u8; 6]>,
    }

    impl Default for MockModule {
        fn default() -> Self {
            MockModule {
                enabled: false,
                conn_in_progress: false,
                start_verdict: RxStart::Continue,
                consume: false,
                starts: Vec::new(),
                isr_ends: Vec::new(),
                pkts: Vec::new(),
                tx_pkts: Vec::new(),
                wfr: 0,
                resets: 0,
                comp_pkts: 0,
                random_addr: None,
            }
        }
    }

    impl StateHandler for MockModule {
        fn rx_isr_start(&mut self, pdu_type: PduType, _: &mut RxInfo, _: u32) -> RxStart {
            self.starts.push(pdu_type);
            self.start_verdict
        }

        fn rx_isr_end(
            &mut self,
            _: &[u8],
            rxpdu: Option<&mut PduBuf>,
            rxhdr: &mut RxInfo,
        ) -> RxEnd {
            self.isr_ends.push((rxpdu.is_some(), rxhdr.crc_ok()));
            RxEnd::Keep
        }

        fn rx_pkt_in(&mut self, pdu_type: PduType, pdu: PduBuf) -> Option<PduBuf> {
            self.pkts.push((pdu_type, pdu.pkt_len()));
            if self.consume {
                None
            } else {
                Some(pdu)
            }
        }

        fn wfr_timer_exp(&mut self) {
            self.wfr += 1;
        }

        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    impl Advertiser for MockModule {
        fn is_enabled(&self) -> bool {
            self.enabled
        }

        fn set_random_addr(&mut self, addr: [u8; 6]) {
            self.random_addr = Some(addr);
        }
    }

    impl Scanner for MockModule {
        fn is_enabled(&self) -> bool {
            self.enabled
        }
    }

    impl Initiator for MockModule {
        fn conn_create_in_progress(&self) -> bool {
            self.conn_in_progress
        }
    }

    impl ConnectionModule for MockModule {
        fn tx_pkt_in(&mut self, _: PduBuf, handle: u16, length: u16) {
            self.tx_pkts.push((handle, length));
        }

        fn num_comp_pkts_event_send(&mut self) {
            self.comp_pkts += 1;
        }
    }

    #[derive(Default)]
    struct MockWhitelist {
        cleared: u32,
    }

    impl Whitelist for MockWhitelist {
        fn clear(&mut self) {
            self.cleared += 1;
        }
    }

    #[derive(Default)]
    struct MockResolv {
        resets: u32,
    }

    impl ResolvingList for MockResolv {
        fn reset(&mut self) {
            self.resets += 1;
        }
    }

    #[derive(Default)]
    struct MockRng {
        started: bool,
    }

    impl RngCore for MockRng {
        fn next_u32(&mut self) -> u32 {
            0x1234_5678
        }

        fn next_u64(&mut self) -> u64 {
            0x1234_5678_9abc_def0
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            for b in dest {
                *b = 0x5a;
            }
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand_core::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl RandomSource for MockRng {
        fn start(&mut self) {
            self.started = true;
        }
    }

    enum TestConfig {}

    impl Config for TestConfig {
        type Phy = MockPhy;
        type Scheduler = MockSched;
        type EventQueue = MockEvq;
        type Callout = MockCallout;
        type Hci = MockHci;
        type Advertiser = MockModule;
        type Scanner = MockModule;
        type Initiator = MockModule;
        type ConnectionModule = MockModule;
        type DirectTest = MockModule;
        type Whitelist = MockWhitelist;
        type ResolvingList = MockResolv;
        type Rng = MockRng;

        const PUBLIC_DEV_ADDR: [u8; 6] = PUB;
    }

    /// Address comes from "hardware"; RF clock is controller-managed.
    enum HwAddrConfig {}

    impl Config for HwAddrConfig {
        type Phy = MockPhy;
        type Scheduler = MockSched;
        type EventQueue = MockEvq;
        type Callout = MockCallout;
        type Hci = MockHci;
        type Advertiser = MockModule;
        type Scanner = MockModule;
        type Initiator = MockModule;
        type ConnectionModule = MockModule;
        type DirectTest = MockModule;
        type Whitelist = MockWhitelist;
        type ResolvingList = MockResolv;
        type Rng = MockRng;

        const XTAL_SETTLE_TICKS: u32 = 32;

        fn hw_public_addr() -> Option<[u8; 6]> {
            Some(HW_PUB)
        }
    }

    fn mock_parts<C>() -> Parts<C>
    where
        C: Config<
            Phy = MockPhy,
            Scheduler = MockSched,
            EventQueue = MockEvq,
            Callout = MockCallout,
            Hci = MockHci,
            Advertiser = MockModule,
            Scanner = MockModule,
            Initiator = MockModule,
            ConnectionModule = MockModule,
            DirectTest = MockModule,
            Whitelist = MockWhitelist,
            ResolvingList = MockResolv,
            Rng = MockRng,
        >,
    {
        Parts {
            phy: MockPhy::default(),
            sched: MockSched::default(),
            evq: MockEvq::default(),
            hw_err_timer: MockCallout::default(),
            hci: MockHci::default(),
            adv: MockModule::default(),
            scan: MockModule::default(),
            initiator: MockModule::default(),
            conn: MockModule::default(),
            dtm: MockModule::default(),
            whitelist: MockWhitelist::default(),
            resolv: MockResolv::default(),
            rng: MockRng::default(),
        }
    }

    fn make_ll() -> LinkLayer<TestConfig> {
        LinkLayer::new(mock_parts())
    }

    fn rx_info(state: State, crc_ok: bool) -> RxInfo {
        let mut info = RxInfo::new(state, 37, -48, PhyMode::OneM, Instant::from_raw_micros(1000));
        if crc_ok {
            info.flags |= RxFlags::CRC_OK;
        }
        info
    }

    /// An advertising channel frame: header byte, length byte, `len` payload
    /// bytes.
    fn adv_frame(hdr_byte: u8, len: u8) -> Vec<u8> {
        let mut frame = vec![hdr_byte, len];
        frame.extend((0..len).map(|i| i as u8));
        frame
    }

    /// A host ACL packet: 4-byte HCI header plus `payload_len` data bytes.
    fn acl_packet(handle: u16, length: u16, payload_len: usize) -> PduBuf {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&handle.to_le_bytes());
        bytes.extend_from_slice(&length.to_le_bytes());
        bytes.extend(core::iter::repeat(0xd5).take(payload_len));
        let mut buf = PduBuf::new();
        buf.fill(&bytes).unwrap();
        buf
    }

    #[test]
    fn new_uses_build_address() {
        let ll = make_ll();
        assert_eq!(ll.dev_addr().raw(), &PUB);
        assert_eq!(ll.state_get(), State::Standby);
        assert_eq!(ll.random_addr().raw(), &[0; 6]);
        // HCI and scheduler were put into their initial state.
        assert_eq!(ll.hci.inits, 1);
        assert_eq!(ll.sched.inits, 1);
    }

    #[test]
    fn public_addr_from_hardware() {
        let ll: LinkLayer<HwAddrConfig> = LinkLayer::new(mock_parts());
        assert_eq!(ll.dev_addr().raw(), &HW_PUB);
        assert_eq!(ll.xtal_ticks(), 32);
    }

    #[test]
    fn task_init_brings_up_radio() {
        let mut ll = make_ll();
        ll.task_init().unwrap();
        assert_eq!(ll.phy.inits, 1);
        assert_eq!(ll.phy.tx_power, Some(0));
        assert_eq!(ll.hci.noops, 1);
        assert!(ll.rng.started);
    }

    #[test]
    fn rx_start_dispatches_by_state() {
        let mut ll = make_ll();
        let mut hdr = rx_info(State::Scanning, false);

        ll.state_set(State::Scanning);
        ll.scan.start_verdict = RxStart::ContinueTx;
        assert_eq!(ll.rx_start(&[0x00], &mut hdr), RxStart::ContinueTx);
        assert_eq!(ll.scan.starts, vec![PduType::AdvInd]);

        ll.state_set(State::Connection);
        assert_eq!(ll.rx_start(&[0x05], &mut hdr), RxStart::Continue);
        assert_eq!(ll.conn.starts, vec![PduType::ConnectReq]);

        ll.state_set(State::Standby);
        assert_eq!(ll.rx_start(&[0x00], &mut hdr), RxStart::Discard);
        assert_eq!(ll.stats().bad_ll_state, 1);
    }

    #[test]
    fn scan_req_while_advertising_flows_to_task() {
        let mut ll = make_ll();
        ll.state_set(State::Advertising);

        let frame = adv_frame(0x03, 12); // SCAN_REQ, valid length
        let mut hdr = rx_info(State::Advertising, true);
        assert_eq!(ll.rx_end(&frame, &mut hdr), RxEnd::Keep);

        // A buffer was allocated, filled, and queued.
        assert_eq!(ll.adv.isr_ends, vec![(true, true)]);
        assert_eq!(ll.pool.available(), POOL_BUFS - 1);
        assert!(!ll.rx_pkt_q.is_empty());
        assert_eq!(ll.evq.events, vec![LlEvent::RxPkt]);

        ll.run_event(LlEvent::RxPkt);
        assert_eq!(ll.adv.pkts, vec![(PduType::ScanReq, 14)]);
        assert!(ll.rx_pkt_q.is_empty());
        // The advertiser gave the buffer back.
        assert_eq!(ll.pool.available(), POOL_BUFS);
        assert_eq!(ll.stats().rx_scan_reqs, 1);
        assert_eq!(ll.stats().rx_adv_pdu_crc_ok, 1);
        assert_eq!(ll.stats().rx_adv_bytes_crc_ok, 14);
    }

    #[test]
    fn malformed_adv_while_scanning() {
        let mut ll = make_ll();
        ll.state_set(State::Scanning);

        let frame = adv_frame(0x00, 3); // ADV_IND, length below minimum
        let mut hdr = rx_info(State::Scanning, true);
        ll.rx_end(&frame, &mut hdr);

        assert_eq!(ll.stats().rx_adv_malformed_pkts, 1);
        // No allocation, but the scanner is still notified.
        assert_eq!(ll.scan.isr_ends, vec![(false, true)]);
        assert!(ll.rx_pkt_q.is_empty());
        assert_eq!(ll.pool.available(), POOL_BUFS);
    }

    #[test]
    fn crc_error_still_copied_and_delivered() {
        let mut ll = make_ll();
        ll.state_set(State::Scanning);

        // Length validation is skipped for corrupt frames; the copy is still
        // made so the scanner can observe the failure.
        let frame = adv_frame(0x00, 6);
        let mut hdr = rx_info(State::Scanning, false);
        ll.rx_end(&frame, &mut hdr);

        assert_eq!(ll.scan.isr_ends, vec![(true, false)]);
        assert_eq!(ll.stats().rx_adv_malformed_pkts, 0);

        ll.run_event(LlEvent::RxPkt);
        assert_eq!(ll.scan.pkts, vec![(PduType::AdvInd, 8)]);
        assert_eq!(ll.stats().rx_adv_pdu_crc_err, 1);
        assert_eq!(ll.stats().rx_adv_bytes_crc_err, 8);
    }

    #[test]
    fn connection_and_dtm_rx_end_bypass_validation() {
        let mut ll = make_ll();

        // Nonsensical type and length; data states do their own checking.
        let frame = adv_frame(0x0f, 200);
        let mut hdr = rx_info(State::Connection, true);
        assert_eq!(ll.rx_end(&frame, &mut hdr), RxEnd::Keep);
        assert_eq!(ll.conn.isr_ends, vec![(false, true)]);

        let mut hdr = rx_info(State::DirectTest, false);
        ll.rx_end(&frame, &mut hdr);
        assert_eq!(ll.dtm.isr_ends, vec![(false, false)]);

        assert_eq!(ll.stats().rx_adv_malformed_pkts, 0);
        assert_eq!(ll.pool.available(), POOL_BUFS);
        assert!(ll.rx_pkt_q.is_empty());
    }

    #[test]
    fn initiating_rx_end_does_not_allocate() {
        let mut ll = make_ll();

        let frame = adv_frame(0x00, 6);
        let mut hdr = rx_info(State::Initiating, true);
        ll.rx_end(&frame, &mut hdr);
        assert_eq!(ll.initiator.isr_ends, vec![(false, true)]);
        assert_eq!(ll.pool.available(), POOL_BUFS);

        // Malformed frames are counted for the initiating state too, but the
        // initiator still sees them.
        let frame = adv_frame(0x03, 5);
        let mut hdr = rx_info(State::Initiating, true);
        ll.rx_end(&frame, &mut hdr);
        assert_eq!(ll.stats().rx_adv_malformed_pkts, 1);
        assert_eq!(ll.initiator.isr_ends.len(), 2);
    }

    #[test]
    fn connection_rx_takes_ownership_on_task_side() {
        let mut ll = make_ll();
        ll.conn.consume = true;

        let mut buf = ll.rxpdu_alloc(5).unwrap();
        buf.fill(&[0x01, 0x02, 0x03, 0x04, 0x05]).unwrap();
        buf.set_rx_info(rx_info(State::Connection, true));
        ll.rx_pdu_in(buf);

        ll.run_event(LlEvent::RxPkt);
        assert_eq!(ll.conn.pkts.len(), 1);
        // The connection module kept the buffer.
        assert_eq!(ll.pool.available(), POOL_BUFS - 1);
        assert_eq!(ll.stats().rx_data_pdu_crc_ok, 1);
        assert_eq!(ll.stats().rx_data_bytes_crc_ok, 5);
    }

    #[test]
    fn queued_pdu_without_metadata_is_dropped() {
        let mut ll = make_ll();
        let buf = ll.rxpdu_alloc(4).unwrap();
        ll.rx_pdu_in(buf);
        ll.run_event(LlEvent::RxPkt);
        assert_eq!(ll.stats().bad_ll_state, 1);
        assert_eq!(ll.pool.available(), POOL_BUFS);
    }

    #[test]
    fn bad_acl_length_dropped() {
        let mut ll = make_ll();
        // Header says 10 bytes, packet carries 8.
        ll.acl_data_in(acl_packet(0x0005, 10, 8));
        assert_eq!(ll.evq.events, vec![LlEvent::TxPkt]);

        ll.run_event(LlEvent::TxPkt);
        assert_eq!(ll.stats().bad_acl_hdr, 1);
        assert!(ll.conn.tx_pkts.is_empty());
        assert!(ll.tx_pkt_q.is_empty());
    }

    #[test]
    fn acl_header_flag_and_length_rules() {
        let mut ll = make_ll();
        // PB flag 2 is not allowed.
        ll.acl_data_in(acl_packet(0x2005, 8, 8));
        // Zero-length payloads are not allowed.
        ll.acl_data_in(acl_packet(0x0005, 0, 0));
        ll.run_event(LlEvent::TxPkt);
        assert_eq!(ll.stats().bad_acl_hdr, 2);
        assert!(ll.conn.tx_pkts.is_empty());
    }

    #[test]
    fn good_acl_reaches_connection_module() {
        let mut ll = make_ll();
        ll.acl_data_in(acl_packet(0x1005, 8, 8)); // PB = 1
        ll.run_event(LlEvent::TxPkt);
        assert_eq!(ll.conn.tx_pkts, vec![(0x1005, 8)]);
        assert_eq!(ll.stats().bad_acl_hdr, 0);
    }

    #[test]
    fn wfr_defers_to_inflight_reception() {
        let mut ll = make_ll();
        ll.state_set(State::Scanning);

        ll.phy.rx_in_progress = true;
        ll.wfr_timer_exp();
        assert_eq!(ll.scan.wfr, 0);

        ll.phy.rx_in_progress = false;
        ll.wfr_timer_exp();
        assert_eq!(ll.scan.wfr, 1);

        // Unknown states are silently ignored.
        ll.state_set(State::Standby);
        ll.wfr_timer_exp();
        assert_eq!(ll.stats().bad_ll_state, 0);
    }

    #[test]
    fn hw_error_defers_and_retries() {
        let mut ll = make_ll();
        ll.hw_error();
        assert_eq!(ll.hw_err_timer.armed, vec![Duration::ZERO]);

        // No event buffer: the callout re-arms itself.
        ll.hci.fail_hw_err = true;
        ll.run_event(LlEvent::HwError);
        assert_eq!(ll.hw_err_timer.armed.last(), Some(&Duration::from_millis(50)));

        ll.hci.fail_hw_err = false;
        ll.run_event(LlEvent::HwError);
        assert_eq!(
            ll.hci.hw_errs,
            vec![hci::HW_ERR_SYNC_LOSS, hci::HW_ERR_SYNC_LOSS]
        );
        // Delivery succeeded; nothing further was armed.
        assert_eq!(ll.hw_err_timer.armed.len(), 2);
    }

    #[test]
    fn overflow_and_comp_pkts_events() {
        let mut ll = make_ll();
        ll.data_buffer_overflow();
        ll.event_send(LlEvent::CompPkts);
        assert_eq!(
            ll.evq.events,
            vec![LlEvent::DataBufOverflow, LlEvent::CompPkts]
        );

        ll.run_event(LlEvent::DataBufOverflow);
        ll.run_event(LlEvent::CompPkts);
        assert_eq!(ll.hci.overflows, 1);
        assert_eq!(ll.conn.comp_pkts, 1);
    }

    #[test]
    fn set_random_addr_rules() {
        let mut ll = make_ll();

        ll.set_random_addr(STATIC_RAND, false).unwrap();
        assert!(ll.is_our_devaddr(&STATIC_RAND, AddressKind::Random));
        assert!(!ll.is_our_devaddr(&STATIC_RAND, AddressKind::Public));
        assert_eq!(ll.adv.random_addr, Some(STATIC_RAND));

        // The extended variant leaves advertising instance 0 alone.
        let other = [0x09, 0x02, 0x03, 0x04, 0x05, 0xc6];
        ll.set_random_addr(other, true).unwrap();
        assert_eq!(ll.adv.random_addr, Some(STATIC_RAND));
        assert!(ll.is_our_devaddr(&other, AddressKind::Random));

        ll.scan.enabled = true;
        assert_eq!(
            ll.set_random_addr(STATIC_RAND, false),
            Err(Status::CommandDisallowed)
        );
        ll.scan.enabled = false;

        ll.initiator.conn_in_progress = true;
        assert_eq!(
            ll.set_random_addr(STATIC_RAND, true),
            Err(Status::CommandDisallowed)
        );
        ll.initiator.conn_in_progress = false;

        // Legacy advertising blocks the legacy command only.
        ll.adv.enabled = true;
        assert_eq!(
            ll.set_random_addr(STATIC_RAND, false),
            Err(Status::CommandDisallowed)
        );
        ll.set_random_addr(STATIC_RAND, true).unwrap();
        ll.adv.enabled = false;

        assert_eq!(
            ll.set_random_addr([0; 6], true),
            Err(Status::InvalidHciCommandParams)
        );
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut ll = make_ll();

        ll.state_set(State::Scanning);
        ll.set_random_addr(STATIC_RAND, false).unwrap();
        ll.set_preferred_phys(0x07, 0x03);
        ll.acl_data_in(acl_packet(0x0005, 8, 8));

        let frame = adv_frame(0x00, 6);
        let mut hdr = rx_info(State::Scanning, true);
        ll.rx_end(&frame, &mut hdr);
        assert!(!ll.rx_pkt_q.is_empty());

        ll.reset().unwrap();

        assert_eq!(ll.state_get(), State::Standby);
        assert!(ll.rx_pkt_q.is_empty());
        assert!(ll.tx_pkt_q.is_empty());
        assert_eq!(ll.pool.available(), POOL_BUFS);
        assert_eq!(ll.random_addr().raw(), &[0; 6]);
        assert!(!ll.is_our_devaddr(&STATIC_RAND, AddressKind::Random));
        assert_eq!(ll.preferred_phys(), (0, 0));
        // Statistics were cleared along the way.
        assert_eq!(ll.stats().rx_adv_pdu_crc_ok, 0);

        assert_eq!(ll.phy.disables, 1);
        assert_eq!(ll.phy.inits, 1);
        assert_eq!(ll.sched.wfr_disables, 1);
        assert_eq!(ll.sched.stops, 1);
        assert_eq!(ll.sched.inits, 2);
        assert_eq!(ll.hci.inits, 2);
        assert_eq!(ll.scan.resets, 1);
        assert_eq!(ll.adv.resets, 1);
        assert_eq!(ll.conn.resets, 1);
        assert_eq!(ll.dtm.resets, 1);
        assert_eq!(ll.whitelist.cleared, 1);
        assert_eq!(ll.resolv.resets, 1);
        // RF clock is not managed in this configuration.
        assert_eq!(ll.phy.rfclk_stops, 0);

        // A second reset leaves the same observable state behind.
        ll.reset().unwrap();
        assert_eq!(ll.state_get(), State::Standby);
        assert!(ll.rx_pkt_q.is_empty() && ll.tx_pkt_q.is_empty());
        assert_eq!(ll.random_addr().raw(), &[0; 6]);
        assert_eq!(ll.preferred_phys(), (0, 0));
        assert_eq!(ll.pool.available(), POOL_BUFS);
    }

    #[test]
    fn reset_stops_managed_rf_clock() {
        let mut ll: LinkLayer<HwAddrConfig> = LinkLayer::new(mock_parts());
        ll.reset().unwrap();
        assert_eq!(ll.phy.rfclk_stops, 1);
    }

    #[test]
    fn hci_command_accounting_is_reachable() {
        let mut ll = make_ll();
        ll.stats_mut().hci_cmds += 2;
        ll.stats_mut().hci_cmd_errs += 1;
        ll.stats_mut().hci_events_sent += 3;
        assert_eq!(ll.stats().hci_cmds, 2);
        assert_eq!(ll.stats().hci_cmd_errs, 1);
        assert_eq!(ll.stats().hci_events_sent, 3);

        ll.reset().unwrap();
        assert_eq!(ll.stats().hci_cmds, 0);
        assert_eq!(ll.stats().hci_cmd_errs, 0);
        assert_eq!(ll.stats().hci_events_sent, 0);
    }

    #[test]
    fn published_masks() {
        let ll = make_ll();
        assert_eq!(ll.read_supp_states(), 0x0000_03ff_ffff_ffff);
        assert!(ll.read_supp_features().contains(FeatureSet::EXTENDED_REJ));
        assert_eq!(ll.num_acl_pkts(), 12);
        assert_eq!(ll.acl_pkt_size(), 255);
    }
}
