//! The global Link Layer state and the supported-states mask.

use bitflags::bitflags;

/// Link Layer operating states.
///
/// Exactly one state is active at any time; it selects which sub-module
/// receives radio and timer events. Written from both ISR and task context,
/// always as a single word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    /// Radio silence; no sub-module owns the radio.
    Standby = 0,
    /// The advertiser owns the radio.
    Advertising = 1,
    /// The scanner owns the radio.
    Scanning = 2,
    /// The initiator owns the radio (connection establishment).
    Initiating = 3,
    /// An established connection owns the radio.
    Connection = 4,
    /// Direct Test Mode (certification testing) owns the radio.
    DirectTest = 5,
}

bitflags! {
    /// State/role combinations reported via LE Read Supported States.
    ///
    /// The bit layout is fixed by the Core spec (Vol 2, Part E, 7.8.27) and
    /// read directly by hosts, so it must be reproduced exactly. Abbreviations
    /// follow the spec's state naming: `NCA`/`SA`/`CA`/`HDCA`/`LDCA` are the
    /// non-connectable, scannable, connectable, high- and low-duty-cycle
    /// directed advertising states, `PS`/`AS` passive and active scanning,
    /// `INIT` initiating, and `MASTER`/`SLAVE` the connection roles.
    pub struct SupportedStates: u64 {
        /// Non-connectable advertising.
        const NCA = 1 << 0;
        /// Scannable advertising.
        const SA = 1 << 1;
        /// Connectable advertising.
        const CA = 1 << 2;
        /// High-duty-cycle directed advertising.
        const HDCA = 1 << 3;
        /// Passive scanning.
        const PS = 1 << 4;
        /// Active scanning.
        const AS = 1 << 5;
        /// Initiating a connection.
        const INIT = 1 << 6;
        /// Connection, slave role.
        const SLAVE = 1 << 7;
        const NCA_PS = 1 << 8;
        const SA_PS = 1 << 9;
        const CA_PS = 1 << 10;
        const HDCA_PS = 1 << 11;
        const NCA_AS = 1 << 12;
        const SA_AS = 1 << 13;
        const CA_AS = 1 << 14;
        const HDCA_AS = 1 << 15;
        const NCA_INIT = 1 << 16;
        const SA_INIT = 1 << 17;
        const NCA_MASTER = 1 << 18;
        const SA_MASTER = 1 << 19;
        const NCA_SLAVE = 1 << 20;
        const SA_SLAVE = 1 << 21;
        const PS_INIT = 1 << 22;
        const AS_INIT = 1 << 23;
        const PS_MASTER = 1 << 24;
        const AS_MASTER = 1 << 25;
        const PS_SLAVE = 1 << 26;
        const AS_SLAVE = 1 << 27;
        const INIT_MASTER = 1 << 28;
        /// Low-duty-cycle directed advertising.
        const LDCA = 1 << 29;
        const LDCA_PS = 1 << 30;
        const LDCA_AS = 1 << 31;
        const CA_INIT = 1 << 32;
        const HDCA_INIT = 1 << 33;
        const LDCA_INIT = 1 << 34;
        const CA_MASTER = 1 << 35;
        const HDCA_MASTER = 1 << 36;
        const LDCA_MASTER = 1 << 37;
        const CA_SLAVE = 1 << 38;
        const HDCA_SLAVE = 1 << 39;
        const LDCA_SLAVE = 1 << 40;
        const INIT_SLAVE = 1 << 41;
    }
}

impl SupportedStates {
    /// The mask this controller reports: every combination defined above.
    ///
    /// The mask is a compatibility constant, not derived from what the
    /// sub-modules can actually do concurrently; hosts expect the full
    /// legacy set.
    pub fn supported() -> Self {
        SupportedStates::all()
    }
}
