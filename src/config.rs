//! Controller configuration trait.
//!
//! Every port defines one type implementing [`Config`], which names the
//! platform services and sub-module implementations the [`LinkLayer`] is
//! assembled from, plus the build-time constants that a C controller would
//! read from its system configuration.
//!
//! [`Config`]: trait.Config.html
//! [`LinkLayer`]: ../ll/struct.LinkLayer.html

use rand_core::RngCore;

use crate::hci::Hci;
use crate::ll::LlEvent;
use crate::phy::Phy;
use crate::subsys::{
    Advertiser, ConnectionModule, Initiator, ResolvingList, Scanner, Scheduler, StateHandler,
    Whitelist,
};
use crate::time::Duration;

/// The Link Layer task's event queue, as seen from the producing side.
///
/// The consuming side stays with the platform: its task loop blocks on the
/// queue and feeds each event to `LinkLayer::run_event`.
pub trait EventQueue {
    /// Posts `event` to the Link Layer task. Must be safe to call from
    /// interrupt context.
    ///
    /// Implementations may coalesce an event that is already pending; every
    /// consumer in this crate drains its work queue completely, so a lost
    /// duplicate wake-up is harmless.
    fn put(&mut self, event: LlEvent);
}

/// A deferred-work timer that posts [`LlEvent::HwError`] to the event queue
/// when it fires.
///
/// [`LlEvent::HwError`]: ../ll/enum.LlEvent.html
pub trait Callout {
    /// (Re-)arms the callout to fire after `delay`, replacing any earlier
    /// deadline. Platforms with a coarse tick round up to one tick.
    fn reset(&mut self, delay: Duration);

    /// Disarms the callout.
    fn stop(&mut self);
}

/// The controller's entropy source.
pub trait RandomSource: RngCore {
    /// Begins asynchronous entropy collection. Called once from the task
    /// initialization; a source that is always ready can ignore it.
    fn start(&mut self) {}
}

/// Names the types a Link Layer instance is built from, along with the
/// build-time configuration values.
pub trait Config {
    /// The radio driver.
    type Phy: Phy;
    /// The scheduler (owns the wait-for-response timer).
    type Scheduler: Scheduler;
    /// Producer side of the LL task's event queue.
    type EventQueue: EventQueue;
    /// Deferred-work timer for hardware-error reporting.
    type Callout: Callout;
    /// The HCI layer (event callbacks).
    type Hci: Hci;
    /// The advertising sub-module.
    type Advertiser: Advertiser;
    /// The scanning sub-module.
    type Scanner: Scanner;
    /// The initiating sub-module.
    type Initiator: Initiator;
    /// The connection sub-module.
    type ConnectionModule: ConnectionModule;
    /// The Direct Test Mode sub-module; `()` when DTM is not built in.
    type DirectTest: StateHandler;
    /// The device filter list.
    type Whitelist: Whitelist;
    /// The address resolving list; `()` without LL privacy.
    type ResolvingList: ResolvingList;
    /// The entropy source.
    type Rng: RandomSource;

    /// Public device address baked into the build. The all-zero sentinel
    /// means "ask the hardware" via [`hw_public_addr`].
    ///
    /// [`hw_public_addr`]: #method.hw_public_addr
    const PUBLIC_DEV_ADDR: [u8; 6] = [0; 6];

    /// Number of ACL packets the host may keep in flight (flow control).
    const NUM_ACL_PKTS: u8 = 12;

    /// Largest ACL payload the host may send per packet.
    const ACL_PKT_SIZE: u16 = 255;

    /// Radio output power, in dBm.
    const TX_POWER_DBM: i8 = 0;

    /// RF crystal settle time in timer ticks. Zero when the RF clock is not
    /// managed by the controller.
    const XTAL_SETTLE_TICKS: u32 = 0;

    /// Reads the public address from hardware (OTP or similar), used when
    /// [`PUBLIC_DEV_ADDR`] is the all-zero sentinel.
    ///
    /// [`PUBLIC_DEV_ADDR`]: #associatedconstant.PUBLIC_DEV_ADDR
    fn hw_public_addr() -> Option<[u8; 6]> {
        None
    }
}

/// The platform services and sub-modules a `LinkLayer` is assembled from.
pub struct Parts<C: Config> {
    pub phy: C::Phy,
    pub sched: C::Scheduler,
    pub evq: C::EventQueue,
    pub hw_err_timer: C::Callout,
    pub hci: C::Hci,
    pub adv: C::Advertiser,
    pub scan: C::Scanner,
    pub initiator: C::Initiator,
    pub conn: C::ConnectionModule,
    pub dtm: C::DirectTest,
    pub whitelist: C::Whitelist,
    pub resolv: C::ResolvingList,
    pub rng: C::Rng,
}
