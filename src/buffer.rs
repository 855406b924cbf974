//! Receive/transmit PDU buffers and the pool they are allocated from.
//!
//! A [`PduBuf`] is a single fixed-capacity buffer with 4 bytes of headroom in
//! front of the payload, so that a PDU header can be prepended after the fact
//! without copying. One buffer holds the largest PDU the controller can
//! receive, so no chaining is ever needed.
//!
//! Buffers are plain owned values: they move through the packet FIFOs by
//! value and return to the [`PduBufPool`] when the task is done with them.
//! The pool bounds how many receptions can be outstanding at once.
//!
//! [`PduBuf`]: struct.PduBuf.html
//! [`PduBufPool`]: struct.PduBufPool.html

use core::fmt;

use bitflags::bitflags;
use heapless::consts::U8;
use heapless::Vec;

use crate::error::Error;
use crate::pdu::{MAX_PAYLOAD_LEN, PDU_HDR_LEN};
use crate::phy::PhyMode;
use crate::state::State;
use crate::time::Instant;

/// Headroom reserved at the front of every buffer for a later header prepend.
pub const PDU_HEADROOM: usize = 4;

/// Usable capacity of one buffer: the PDU header plus the largest payload.
pub const PDU_BUF_CAP: usize = PDU_HEADROOM + PDU_HDR_LEN as usize + MAX_PAYLOAD_LEN;

/// Number of buffers in a [`PduBufPool`].
///
/// [`PduBufPool`]: struct.PduBufPool.html
pub const POOL_BUFS: usize = 8;

bitflags! {
    /// Per-reception flags, set by the PHY driver and the ISR-side handlers.
    ///
    /// The dispatch core only reads `CRC_OK`; the remaining bits are carried
    /// for the sub-modules, which use them to hand reception context from
    /// their ISR half to their task half.
    pub struct RxFlags: u16 {
        /// The CRC of the received frame checked out.
        const CRC_OK = 1 << 0;
        /// The frame was addressed at us (or passed the filter policy).
        const DEVMATCH = 1 << 1;
        /// The sender's address was resolved against the resolving list.
        const RESOLVED = 1 << 2;
        /// A scan response was transmitted in reply to this frame.
        const SCAN_RSP_TXD = 1 << 3;
        /// The frame is part of an extended advertising event.
        const EXT_ADV = 1 << 4;
        /// The secondary-channel PDU this frame pointed at was not usable.
        const AUX_INVALID = 1 << 5;
    }
}

/// Reception metadata attached to every received PDU.
#[derive(Copy, Clone, Debug)]
pub struct RxInfo {
    /// Reception flags; see [`RxFlags`].
    ///
    /// [`RxFlags`]: struct.RxFlags.html
    pub flags: RxFlags,
    /// The Link Layer state at the time the frame was received. Decides
    /// which sub-module the PDU is dispatched to on the task side.
    pub state: State,
    /// Channel index the frame was received on.
    pub channel: u8,
    /// Received signal strength, in dBm.
    pub rssi: i8,
    /// PHY mode the frame came in on.
    pub phy_mode: PhyMode,
    /// Time at which the first header byte was received.
    pub timestamp: Instant,
}

impl RxInfo {
    /// Creates reception metadata with no flags set.
    pub fn new(state: State, channel: u8, rssi: i8, phy_mode: PhyMode, timestamp: Instant) -> Self {
        RxInfo {
            flags: RxFlags::empty(),
            state,
            channel,
            rssi,
            phy_mode,
            timestamp,
        }
    }

    /// Whether the frame's CRC checked out.
    pub fn crc_ok(&self) -> bool {
        self.flags.contains(RxFlags::CRC_OK)
    }
}

/// Transmit metadata staged on a buffer before it is handed to the PHY.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct TxInfo {
    /// Sub-module specific transmit flags.
    pub flags: u8,
    /// Offset of the first byte to transmit, relative to the buffer data.
    pub offset: u8,
    /// Number of payload bytes to transmit.
    pub pyld_len: u8,
    /// First PDU header byte to transmit.
    pub hdr_byte: u8,
}

/// What kind of metadata a buffer currently carries.
#[derive(Copy, Clone)]
enum Metadata {
    Empty,
    Rx(RxInfo),
    Tx(TxInfo),
}

/// A single PDU buffer.
pub struct PduBuf {
    meta: Metadata,
    /// Total packet length in bytes.
    pkt_len: u16,
    /// Offset of the first data byte (the remaining headroom).
    start: u16,
    buf: [u8; PDU_BUF_CAP],
}

impl PduBuf {
    /// Creates an empty buffer with full headroom and no metadata.
    pub fn new() -> Self {
        PduBuf {
            meta: Metadata::Empty,
            pkt_len: 0,
            start: PDU_HEADROOM as u16,
            buf: [0; PDU_BUF_CAP],
        }
    }

    /// Returns the total packet length.
    pub fn pkt_len(&self) -> u16 {
        self.pkt_len
    }

    /// Sets the total packet length. `len` must fit behind the current
    /// headroom.
    pub fn set_pkt_len(&mut self, len: u16) {
        debug_assert!(usize::from(self.start) + usize::from(len) <= PDU_BUF_CAP);
        self.pkt_len = len;
    }

    /// Remaining headroom in front of the data.
    pub fn headroom(&self) -> usize {
        usize::from(self.start)
    }

    /// The packet contents.
    pub fn data(&self) -> &[u8] {
        let start = usize::from(self.start);
        &self.buf[start..start + usize::from(self.pkt_len)]
    }

    /// The packet contents, mutably.
    pub fn data_mut(&mut self) -> &mut [u8] {
        let start = usize::from(self.start);
        &mut self.buf[start..start + usize::from(self.pkt_len)]
    }

    /// Replaces the packet contents with `bytes`, keeping the headroom.
    pub fn fill(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let start = usize::from(self.start);
        if start + bytes.len() > PDU_BUF_CAP {
            return Err(Error::Eof);
        }
        self.buf[start..start + bytes.len()].copy_from_slice(bytes);
        self.pkt_len = bytes.len() as u16;
        Ok(())
    }

    /// Grows the packet towards the front by `n` bytes, using headroom.
    ///
    /// The new bytes are uninitialized from the packet's point of view; the
    /// caller writes the prepended header into `data_mut()`.
    pub fn prepend(&mut self, n: u16) -> Result<(), Error> {
        if self.start < n {
            return Err(Error::Eof);
        }
        self.start -= n;
        self.pkt_len += n;
        Ok(())
    }

    /// Drops `n` bytes from the front of the packet, growing the headroom.
    pub fn strip_front(&mut self, n: u16) -> Result<(), Error> {
        if self.pkt_len < n {
            return Err(Error::InvalidLength);
        }
        self.start += n;
        self.pkt_len -= n;
        Ok(())
    }

    /// Attaches reception metadata, replacing whatever was there.
    pub fn set_rx_info(&mut self, info: RxInfo) {
        self.meta = Metadata::Rx(info);
    }

    /// Reception metadata, if this buffer holds a received PDU.
    pub fn rx_info(&self) -> Option<&RxInfo> {
        match &self.meta {
            Metadata::Rx(info) => Some(info),
            _ => None,
        }
    }

    /// Reception metadata, mutably.
    pub fn rx_info_mut(&mut self) -> Option<&mut RxInfo> {
        match &mut self.meta {
            Metadata::Rx(info) => Some(info),
            _ => None,
        }
    }

    /// Transmit metadata, if this buffer was staged for transmission.
    pub fn tx_info(&self) -> Option<&TxInfo> {
        match &self.meta {
            Metadata::Tx(info) => Some(info),
            _ => None,
        }
    }

    /// Transmit metadata, mutably.
    pub fn tx_info_mut(&mut self) -> Option<&mut TxInfo> {
        match &mut self.meta {
            Metadata::Tx(info) => Some(info),
            _ => None,
        }
    }

    /// Stages this buffer for transmission of a `pdulen`-byte PDU whose
    /// first header byte is `hdr_byte`.
    ///
    /// Only used for buffers built by the controller itself; ACL data from
    /// the host arrives with its metadata set by the connection module.
    pub fn init_tx(&mut self, pdulen: u8, hdr_byte: u8) {
        self.pkt_len = u16::from(pdulen);
        self.meta = Metadata::Tx(TxInfo {
            flags: 0,
            offset: 0,
            pyld_len: pdulen,
            hdr_byte,
        });
    }

    /// Copies the staged payload into the PHY's transmit buffer.
    ///
    /// Returns the payload length and the PDU header byte to transmit, or
    /// `None` when the buffer holds no transmit metadata.
    pub fn copy_tx_payload(&self, dst: &mut [u8]) -> Option<(u8, u8)> {
        let tx = self.tx_info()?;
        let off = usize::from(tx.offset);
        let len = usize::from(tx.pyld_len);
        dst[..len].copy_from_slice(&self.data()[off..off + len]);
        Some((tx.pyld_len, tx.hdr_byte))
    }

    /// Re-initializes a pooled buffer for reception of a `len`-byte PDU.
    fn reset_for(&mut self, len: u16) {
        self.meta = Metadata::Empty;
        self.start = PDU_HEADROOM as u16;
        self.pkt_len = len;
    }
}

impl fmt::Debug for PduBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.meta {
            Metadata::Empty => "empty",
            Metadata::Rx(_) => "rx",
            Metadata::Tx(_) => "tx",
        };
        f.debug_struct("PduBuf")
            .field("meta", &kind)
            .field("pkt_len", &self.pkt_len)
            .field("headroom", &self.start)
            .finish()
    }
}

/// A fixed pool of PDU buffers.
///
/// Allocation happens in the radio ISR, freeing on the Link Layer task; both
/// go through the `&mut LinkLayer`, so the platform's access arbitration is
/// the only synchronization needed.
pub struct PduBufPool {
    free: Vec<PduBuf, U8>,
}

impl PduBufPool {
    /// Creates a full pool.
    pub fn new() -> Self {
        let mut free = Vec::new();
        for _ in 0..POOL_BUFS {
            // Capacity matches POOL_BUFS, this cannot fail.
            let _ = free.push(PduBuf::new());
        }
        PduBufPool { free }
    }

    /// Allocates a buffer able to hold a `len`-byte PDU, with the usual
    /// headroom reserved in front.
    ///
    /// Returns `None` when the pool is exhausted or `len` cannot fit; the
    /// caller gets a fully usable buffer or nothing.
    pub fn alloc(&mut self, len: u16) -> Option<PduBuf> {
        if PDU_HEADROOM + usize::from(len) > PDU_BUF_CAP {
            return None;
        }
        let mut buf = self.free.pop()?;
        buf.reset_for(len);
        Some(buf)
    }

    /// Returns a buffer to the pool.
    pub fn free(&mut self, buf: PduBuf) {
        // A buffer that did not come from this pool is simply dropped.
        let _ = self.free.push(buf);
    }

    /// Number of buffers currently available.
    pub fn available(&self) -> usize {
        self.free.len()
    }
}
