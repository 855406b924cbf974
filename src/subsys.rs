//! Interfaces of the per-state sub-modules and the other Link Layer
//! collaborators.
//!
//! The dispatcher routes every radio and timer event to the sub-module that
//! owns the current [`State`]; all five of them (advertiser, scanner,
//! initiator, connection, direct test) speak the same [`StateHandler`]
//! interface, plus a few state-specific extras defined by the extension
//! traits below. The implementations live outside this crate.
//!
//! [`State`]: ../state/enum.State.html
//! [`StateHandler`]: trait.StateHandler.html

use crate::buffer::{PduBuf, RxInfo};
use crate::pdu::PduType;
use crate::time::Duration;

/// What the PHY should do with a frame whose first header byte has just been
/// received.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RxStart {
    /// Abort this reception; the frame is of no interest.
    Discard,
    /// Keep receiving, but do not prepare a transmission afterwards.
    Continue,
    /// Keep receiving and set up the turn-around transmission for when the
    /// frame ends.
    ContinueTx,
}

/// What the PHY driver should do after `rx_isr_end` returns.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RxEnd {
    /// Disable the PHY.
    DisablePhy,
    /// Leave the PHY in whatever state it is in.
    Keep,
    /// The handler already reconfigured the PHY; do nothing.
    Handled,
}

/// Interface the dispatcher expects from every per-state sub-module.
///
/// `rx_isr_start` and `rx_isr_end` run in radio ISR context,
/// `wfr_timer_exp` in scheduler ISR context; none of them may block,
/// allocate blockingly, or log. `rx_pkt_in` and `reset` run on the Link
/// Layer task.
pub trait StateHandler {
    /// Called when the preamble, access address and first PDU header byte of
    /// a frame have been received.
    ///
    /// `rxhdr` is the reception metadata the PHY driver prepared; handlers
    /// may record flags in it for their task half. `access_addr` is the
    /// access address the frame arrived on.
    fn rx_isr_start(&mut self, pdu_type: PduType, rxhdr: &mut RxInfo, access_addr: u32) -> RxStart;

    /// Called when a reception has completed.
    ///
    /// `rxbuf` is the raw frame in the PHY's receive memory. For the
    /// advertising and scanning states the dispatcher has already copied the
    /// frame into `rxpdu` (when the frame was well-formed and a buffer was
    /// available); the buffer stays owned by the dispatcher, which queues it
    /// for the task after this returns.
    fn rx_isr_end(&mut self, rxbuf: &[u8], rxpdu: Option<&mut PduBuf>, rxhdr: &mut RxInfo)
        -> RxEnd;

    /// Task context: a PDU received while this sub-module owned the radio.
    ///
    /// Returns the buffer to have the dispatcher release it, or `None` to
    /// keep ownership (the connection and direct-test modules do this).
    fn rx_pkt_in(&mut self, pdu_type: PduType, pdu: PduBuf) -> Option<PduBuf>;

    /// Scheduler ISR: the wait-for-response window closed without the radio
    /// having started a reception.
    fn wfr_timer_exp(&mut self);

    /// Stops all activity and returns to the idle configuration. Part of the
    /// controller reset.
    fn reset(&mut self);
}

/// The advertising sub-module.
pub trait Advertiser: StateHandler {
    /// Whether advertising is currently enabled.
    fn is_enabled(&self) -> bool;

    /// Updates the random address used by the legacy advertising instance.
    fn set_random_addr(&mut self, addr: [u8; 6]);
}

/// The scanning sub-module.
pub trait Scanner: StateHandler {
    /// Whether scanning is currently enabled.
    fn is_enabled(&self) -> bool;
}

/// The initiating (connection-create) sub-module.
pub trait Initiator: StateHandler {
    /// Whether a connection-create procedure is in progress.
    fn conn_create_in_progress(&self) -> bool;
}

/// The connection sub-module.
pub trait ConnectionModule: StateHandler {
    /// Task context: ACL data from the host, the 4-byte HCI header already
    /// stripped. `handle` is the raw handle word (flags included), `length`
    /// the validated payload length. Takes ownership of the buffer.
    fn tx_pkt_in(&mut self, pdu: PduBuf, handle: u16, length: u16);

    /// Sends the number-of-completed-packets HCI event for all connections
    /// with pending counts.
    fn num_comp_pkts_event_send(&mut self);
}

/// The scheduler.
///
/// The wait-for-response timer lives inside the scheduler, which is why the
/// `wfr_*` entry points are provided methods that default to doing nothing.
pub trait Scheduler {
    /// Re-initializes the scheduler. Called at bring-up and on every reset.
    fn init(&mut self);

    /// Removes all scheduled items and stops the scheduler timer.
    fn stop(&mut self);

    /// Arms the wait-for-response timeout.
    fn wfr_enable(&mut self, _timeout: Duration) {}

    /// Disarms the wait-for-response timeout.
    fn wfr_disable(&mut self) {}
}

/// The device filter (white) list.
pub trait Whitelist {
    /// Removes every entry.
    fn clear(&mut self);
}

/// The address resolving list (LL privacy).
pub trait ResolvingList {
    /// Clears the list and disables address resolution.
    fn reset(&mut self);
}

/// Inert handler for builds without a given sub-module (Direct Test Mode,
/// typically).
impl StateHandler for () {
    fn rx_isr_start(&mut self, _: PduType, _: &mut RxInfo, _: u32) -> RxStart {
        RxStart::Discard
    }

    fn rx_isr_end(&mut self, _: &[u8], _: Option<&mut PduBuf>, _: &mut RxInfo) -> RxEnd {
        RxEnd::DisablePhy
    }

    fn rx_pkt_in(&mut self, _: PduType, pdu: PduBuf) -> Option<PduBuf> {
        Some(pdu)
    }

    fn wfr_timer_exp(&mut self) {}

    fn reset(&mut self) {}
}

impl Whitelist for () {
    fn clear(&mut self) {}
}

impl ResolvingList for () {
    fn reset(&mut self) {}
}
