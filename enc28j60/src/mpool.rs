//! # Frame buffer pool.
//!
//! Fixed set of transmit/receive scratch buffers holding frames between the
//! network layer hand-off and the moment the chip consumes them. Slots are
//! handed out in index order and never evict each other; when every slot is
//! taken the caller has to back off and retry on a later tick.

/// Number of slots the driver instance owns.
pub const POOL_SLOTS: usize = 3;
/// Per-direction buffer capacity of one slot. Large enough for a maximum
/// length frame plus the SPI opcode and control byte prefix of the burst
/// transfers, which reuse these buffers as frame assembly area.
pub const POOL_BUF_LEN: usize = 1522;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    #[default]
    Free,
    Acquired,
    DataFilled,
}

pub struct FrameSlot {
    pub(crate) tx_buf: [u8; POOL_BUF_LEN],
    pub(crate) rx_buf: [u8; POOL_BUF_LEN],
    pub(crate) dlen: usize,
    state: SlotState,
}

impl FrameSlot {
    const fn new() -> Self {
        Self {
            tx_buf: [0; POOL_BUF_LEN],
            rx_buf: [0; POOL_BUF_LEN],
            dlen: 0,
            state: SlotState::Free,
        }
    }

    #[inline]
    pub fn state(&self) -> SlotState {
        self.state
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.dlen
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dlen == 0
    }

    /// Splits the slot into the staged frame data and the scratch buffer
    /// of the opposite direction, so a burst transfer can assemble its SPI
    /// frame without an extra copy.
    pub(crate) fn tx_rx_buffers(&mut self) -> (&[u8], &mut [u8]) {
        (&self.tx_buf, &mut self.rx_buf)
    }

    /// Stages a frame for transmission.
    pub(crate) fn fill(&mut self, frame: &[u8]) {
        self.tx_buf[..frame.len()].copy_from_slice(frame);
        self.dlen = frame.len();
        self.state = SlotState::DataFilled;
    }
}

pub struct FramePool<const N: usize = POOL_SLOTS> {
    slots: [FrameSlot; N],
}

impl<const N: usize> FramePool<N> {
    pub const fn new() -> Self {
        Self {
            slots: [const { FrameSlot::new() }; N],
        }
    }

    /// Hands out the free slot with the lowest index, or `None` when the
    /// pool is exhausted.
    pub fn acquire(&mut self) -> Option<usize> {
        let index = self
            .slots
            .iter()
            .position(|slot| slot.state == SlotState::Free)?;
        self.slots[index].state = SlotState::Acquired;
        Some(index)
    }

    /// Returns a slot to the pool. Idempotent; out-of-range indices are
    /// ignored.
    pub fn release(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.state = SlotState::Free;
            slot.dlen = 0;
        }
    }

    /// Bounds-checked slot accessor. An out-of-range index is a programming
    /// error and panics.
    #[inline]
    pub fn slot_mut(&mut self, index: usize) -> &mut FrameSlot {
        &mut self.slots[index]
    }

    #[inline]
    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    /// Lowest-index slot holding a queued frame.
    pub fn first_filled(&self) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.state == SlotState::DataFilled)
    }
}

impl<const N: usize> Default for FramePool<N> {
    fn default() -> Self {
        Self::new()
    }
}
