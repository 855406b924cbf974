//! An embedded BLE Link Layer controller core.
//!
//! This crate implements the dispatch engine that sits between a radio PHY and
//! the Host Controller Interface: the Link Layer's global state machine, the
//! interrupt-to-task packet path, receive-time PDU classification, wait-for-
//! response routing, hardware-error recovery, the reset sequence, and the
//! PHY-mode timing arithmetic shared by all sub-features.
//!
//! It is runtime- and hardware-agnostic. Platform services (radio, scheduler,
//! event queue, HCI transport) and the five per-state sub-state-machines
//! (advertiser, scanner, initiator, connection, direct test) are supplied
//! through the [`Config`] trait; the crate only orchestrates them.
//!
//! # Execution contexts
//!
//! Three contexts touch the [`LinkLayer`]:
//!
//! * the **radio ISR** calls [`LinkLayer::rx_start`], [`LinkLayer::rx_end`]
//!   and [`LinkLayer::hw_error`],
//! * the **scheduler ISR** calls [`LinkLayer::wfr_timer_exp`],
//! * the **LL task** runs [`LinkLayer::run_event`] for every event taken from
//!   the platform event queue.
//!
//! All of them take `&mut self`: the platform must arbitrate access (an RTIC
//! resource lock or a critical section). Packets cross from ISR to task
//! through the internal FIFOs, never through shared references.
//!
//! [`Config`]: config/trait.Config.html
//! [`LinkLayer`]: ll/struct.LinkLayer.html
//! [`LinkLayer::rx_start`]: ll/struct.LinkLayer.html#method.rx_start
//! [`LinkLayer::rx_end`]: ll/struct.LinkLayer.html#method.rx_end
//! [`LinkLayer::hw_error`]: ll/struct.LinkLayer.html#method.hw_error
//! [`LinkLayer::wfr_timer_exp`]: ll/struct.LinkLayer.html#method.wfr_timer_exp
//! [`LinkLayer::run_event`]: ll/struct.LinkLayer.html#method.run_event

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod log;
#[macro_use]
mod utils;
mod error;

pub mod address;
pub mod buffer;
pub mod config;
pub mod features;
pub mod hci;
pub mod ll;
pub mod pdu;
pub mod phy;
pub mod queue;
pub mod state;
pub mod stats;
pub mod subsys;
pub mod time;

pub use self::error::Error;
pub use self::ll::{LinkLayer, LlEvent};
