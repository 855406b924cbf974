//! The optional Link Layer feature mask published to the host.

use bitflags::bitflags;

bitflags! {
    /// A set of optional Link Layer features.
    ///
    /// Bit positions are the ones defined by the Core spec (Vol 6, Part B,
    /// 4.6) and are visible to the host via LE Read Local Supported Features,
    /// so they must not be rearranged.
    pub struct FeatureSet: u32 {
        /// LE data encryption.
        const LE_ENCRYPTION = 1 << 0;

        /// Connection parameters request procedure.
        const CONN_PARAM_REQ = 1 << 1;

        /// Support for the `LL_REJECT_IND_EXT` control PDU.
        const EXTENDED_REJ = 1 << 2;

        /// Slave-initiated feature exchange.
        const SLAVE_INIT = 1 << 3;

        /// LE ping procedure.
        const LE_PING = 1 << 4;

        /// Data length update procedure (payloads beyond 27 bytes).
        const DATA_LEN_EXT = 1 << 5;

        /// Untrackable randomized device addresses (LL privacy).
        const LL_PRIVACY = 1 << 6;

        /// Extended scan filter policies.
        const EXT_SCAN_FILT = 1 << 7;

        /// The 2 Mbit/s uncoded PHY.
        const LE_2M_PHY = 1 << 8;

        /// The long-range coded PHY.
        const LE_CODED_PHY = 1 << 11;

        /// Extended advertising.
        const EXT_ADV = 1 << 12;

        /// Channel selection algorithm #2.
        const CSA2 = 1 << 14;
    }
}

impl FeatureSet {
    /// Returns the feature set enabled in this build.
    ///
    /// Extended reject is always supported; everything else is switched on by
    /// the cargo feature of the same name.
    pub fn supported() -> Self {
        let mut feat = FeatureSet::EXTENDED_REJ;

        if cfg!(feature = "data-len-ext") {
            feat |= FeatureSet::DATA_LEN_EXT;
        }
        if cfg!(feature = "conn-param-req") {
            feat |= FeatureSet::CONN_PARAM_REQ;
        }
        if cfg!(feature = "slave-init-feat-xchg") {
            feat |= FeatureSet::SLAVE_INIT;
        }
        if cfg!(feature = "le-encryption") {
            feat |= FeatureSet::LE_ENCRYPTION;
        }
        if cfg!(feature = "privacy") {
            feat |= FeatureSet::LL_PRIVACY | FeatureSet::EXT_SCAN_FILT;
        }
        if cfg!(feature = "le-ping") {
            feat |= FeatureSet::LE_PING;
        }
        if cfg!(feature = "ext-adv") {
            feat |= FeatureSet::EXT_ADV;
        }
        if cfg!(feature = "csa2") {
            feat |= FeatureSet::CSA2;
        }
        if cfg!(feature = "phy-2m") {
            feat |= FeatureSet::LE_2M_PHY;
        }
        if cfg!(feature = "phy-coded") {
            feat |= FeatureSet::LE_CODED_PHY;
        }

        feat
    }
}
