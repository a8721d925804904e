//! # ENC28J60 driver.
//!
//! Platform-agnostic driver for the Microchip ENC28J60 10BASE-T Ethernet
//! MAC/PHY controller, which is attached through a synchronous SPI bus.
//! The driver is generic over [embedded_hal::spi::SpiDevice] for the bus
//! transactions and [embedded_hal::delay::DelayNs] for the PHY settle wait.
//!
//! One driver instance controls exactly one chip and is meant to be driven
//! by a single owner: a bare-metal main loop or one RTOS task issuing
//! [Enc28j60::send], [Enc28j60::receive] and [Enc28j60::periodic] calls
//! serially. There is no internal locking; a multi-threaded host has to
//! wrap the whole instance in one mutex.
//!
//! Frames handed off for transmission are staged in an internal buffer
//! pool and flow into the chip once its transmit logic is idle and the
//! link is up, driven by the periodic tick.
#![no_std]
#[cfg(test)]
extern crate std;

use arbitrary_int::u3;
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

pub mod ll;
pub mod mdio;
pub mod mpool;
pub mod regs;
#[cfg(test)]
pub(crate) mod testutil;

pub use ll::SpiInterface;
pub use mdio::PHY_SETTLE_US;
pub use mpool::{FramePool, POOL_SLOTS, SlotState};
pub use regs::{MAX_FRAME_LEN, PhyRegister};

use regs::{
    Econ1, Econ2, Estat, Macon1, Macon3, Macon4, PhyControl2, Register, RxFilterControl,
    RxStatusVector,
};

/// Highest silicon revision wedging its transmit logic when an abort
/// condition hits while a transmission is requested (errata for revisions
/// up to B5). On affected chips the transmit request is taken back right
/// after it was issued.
const TX_STALL_ERRATA_MAX_REVISION: u8 = 0x05;

/// Oscillator start-up time after a system reset command. The CLKRDY flag
/// is not reliable right after a reset (silicon erratum), so the start-up
/// time is waited out unconditionally.
const RESET_SETTLE_US: u32 = 2000;

#[derive(Debug, thiserror::Error)]
pub enum Error<E> {
    /// The SPI transport reported a failure. The operation was aborted and
    /// is not retried by the driver.
    #[error("SPI transfer failure")]
    Spi(E),
    /// The PHY management interface stayed busy past the settle window.
    #[error("PHY management interface busy")]
    PhyBusy,
    /// All frame pool slots are in use. Retry on a later tick.
    #[error("frame pool exhausted")]
    PoolExhausted,
    /// Frame length outside of the transmittable range.
    #[error("invalid frame length {0}")]
    FrameLength(usize),
    /// Scratch buffer too small for the requested burst transfer.
    #[error("scratch buffer too small ({0} bytes)")]
    BufferTooSmall(usize),
    /// Bit field opcodes are only valid for ETH registers.
    #[error("bit field access on MAC/MII register")]
    MacMiiBitAccess,
}

/// Chip identification read once during [Enc28j60::init].
#[derive(Debug, Default, Clone, Copy)]
pub struct ChipInfo {
    /// Silicon revision from EREVID.
    pub mac_revision: u8,
    /// Upper PHY identifier word (PHID1).
    pub phy_id: u16,
    /// PHY revision from the lower PHID2 bits.
    pub phy_revision: u8,
}

/// Driver instance owning the low-level interface, the frame pool and the
/// software mirror of the chip state.
pub struct Enc28j60<Spi, Delay> {
    intf: SpiInterface<Spi>,
    delay: Delay,
    pool: FramePool<POOL_SLOTS>,
    info: ChipInfo,
    link_up: bool,
    /// Transmit-stall errata applies to this silicon revision.
    tx_stall_quirk: bool,
    /// Start of the next pending packet in the receive ring. Only ever
    /// updated from the chip-reported per-packet header.
    next_packet: u16,
    /// Pool slot currently handed to the chip transmit logic.
    active_tx_slot: Option<usize>,
}

impl<Spi: SpiDevice, Delay: DelayNs> Enc28j60<Spi, Delay> {
    pub fn new(spi: Spi, delay: Delay) -> Self {
        Self {
            intf: SpiInterface::new(spi),
            delay,
            pool: FramePool::new(),
            info: ChipInfo::default(),
            link_up: false,
            tx_stall_quirk: false,
            next_packet: regs::RX_START,
            active_tx_slot: None,
        }
    }

    /// Releases the bus handle and the delay provider.
    pub fn free(self) -> (Spi, Delay) {
        (self.intf.release(), self.delay)
    }

    #[inline]
    pub fn chip_info(&self) -> ChipInfo {
        self.info
    }

    /// Cached link state, refreshed whenever the PHY status register is
    /// read.
    #[inline]
    pub fn link_up(&self) -> bool {
        self.link_up
    }

    /// Resets and configures the chip for half-duplex operation with the
    /// given station address.
    pub fn init(&mut self, mac_addr: [u8; 6]) -> Result<(), Error<Spi::Error>> {
        self.intf.soft_reset()?;
        self.delay.delay_us(RESET_SETTLE_US);
        self.pool = FramePool::new();
        self.active_tx_slot = None;
        self.next_packet = regs::RX_START;
        self.link_up = false;

        // Receive ring layout and both ring pointers, transmit base.
        self.write_register_pair(regs::ERXSTL, regs::ERXSTH, regs::RX_START)?;
        self.write_register_pair(regs::ERXNDL, regs::ERXNDH, regs::RX_END)?;
        self.write_register_pair(regs::ERXRDPTL, regs::ERXRDPTH, regs::RX_START)?;
        self.write_register_pair(regs::ERDPTL, regs::ERDPTH, regs::RX_START)?;
        self.write_register_pair(regs::ETXSTL, regs::ETXSTH, regs::TX_START)?;

        // Accept frames for the station address and broadcasts, drop
        // frames with a bad CRC.
        self.intf.write_register(
            regs::ERXFCON,
            RxFilterControl::DEFAULT
                .with_ucen(true)
                .with_crcen(true)
                .with_bcen(true)
                .raw_value(),
        )?;

        // Pull the MAC out of reset and enable reception with full flow
        // control.
        self.intf.write_register(regs::MACON2, 0x00)?;
        self.intf.write_register(
            regs::MACON1,
            Macon1::DEFAULT
                .with_marxen(true)
                .with_txpaus(true)
                .with_rxpaus(true)
                .raw_value(),
        )?;
        // Half-duplex: pad to 60 bytes, append CRC, check the length field.
        self.intf.write_register(
            regs::MACON3,
            Macon3::DEFAULT
                .with_padcfg(u3::new(0b001))
                .with_txcrcen(true)
                .with_frmlnen(true)
                .raw_value(),
        )?;
        self.intf
            .write_register(regs::MACON4, Macon4::DEFAULT.with_defer(true).raw_value())?;
        self.write_register_pair(regs::MAMXFLL, regs::MAMXFLH, regs::MAX_FRAME_LEN as u16)?;
        // Half-duplex inter-packet gap values from the datasheet.
        self.intf.write_register(regs::MABBIPG, 0x12)?;
        self.intf.write_register(regs::MAIPGL, 0x12)?;
        self.intf.write_register(regs::MAIPGH, 0x0C)?;

        // Station address. MAADR1 holds the most significant octet.
        self.intf.write_register(regs::MAADR1, mac_addr[0])?;
        self.intf.write_register(regs::MAADR2, mac_addr[1])?;
        self.intf.write_register(regs::MAADR3, mac_addr[2])?;
        self.intf.write_register(regs::MAADR4, mac_addr[3])?;
        self.intf.write_register(regs::MAADR5, mac_addr[4])?;
        self.intf.write_register(regs::MAADR6, mac_addr[5])?;

        // The PHY loops transmitted frames back in half-duplex mode unless
        // told otherwise, which would garble reception.
        self.write_phy(
            PhyRegister::Control2,
            PhyControl2::DEFAULT.with_hdldis(true).raw_value(),
        )?;

        let revision = self.intf.read_register(regs::EREVID)?;
        let phid1 = self.read_phy(PhyRegister::Id1)?;
        let phid2 = self.read_phy(PhyRegister::Id2)?;
        self.info = ChipInfo {
            mac_revision: revision,
            phy_id: phid1,
            phy_revision: (phid2 & 0x000F) as u8,
        };
        self.tx_stall_quirk = revision <= TX_STALL_ERRATA_MAX_REVISION;
        log::debug!("enc28j60 up, silicon rev 0x{revision:02x}, phy id 0x{phid1:04x}");

        self.poll_link_status()?;
        self.intf
            .bit_field_set(regs::ECON1, Econ1::DEFAULT.with_rxen(true).raw_value())?;
        Ok(())
    }

    /// Hands a frame off for transmission.
    ///
    /// The frame is staged in a pool slot and transmitted right away when
    /// the chip and the link are ready; otherwise it stays queued and is
    /// drained by a later [Self::periodic] tick. [Error::PoolExhausted]
    /// asks the caller to back off and retry, no chip register is touched
    /// in that case.
    pub fn send(&mut self, frame: &[u8]) -> Result<(), Error<Spi::Error>> {
        if frame.is_empty() || frame.len() > regs::MAX_FRAME_LEN {
            return Err(Error::FrameLength(frame.len()));
        }
        let Some(index) = self.pool.acquire() else {
            log::debug!("tx rejected, frame pool exhausted");
            return Err(Error::PoolExhausted);
        };
        self.pool.slot_mut(index).fill(frame);
        self.try_transmit(index)
    }

    /// Periodic tick, called by an external scheduler.
    ///
    /// Confirms a finished transmission, returns its pool slot and drains
    /// the longest-queued frame through the same readiness gate as
    /// [Self::send]. Transport failures are logged and retried implicitly
    /// on the next tick.
    pub fn periodic(&mut self) {
        if let Some(active) = self.active_tx_slot {
            if self.check_transmit_done(active).is_err() || self.active_tx_slot.is_some() {
                return;
            }
        }
        if let Some(index) = self.pool.first_filled() {
            self.try_transmit(index).ok();
        }
    }

    /// Fetches the next pending frame from the receive ring.
    ///
    /// Returns the number of payload bytes written to `dest`: 0 means
    /// nothing usable was pending, which covers both an empty ring and a
    /// frame the chip flagged as broken (those are dropped silently). A
    /// frame longer than `dest` is truncated to `dest.len()`.
    ///
    /// On [Error::PoolExhausted] the packet stays queued in the chip ring
    /// and is picked up by a later call.
    pub fn receive(&mut self, dest: &mut [u8]) -> Result<usize, Error<Spi::Error>> {
        let pending = self.intf.read_register(regs::EPKTCNT)?;
        if pending == 0 {
            return Ok(0);
        }
        let Some(index) = self.pool.acquire() else {
            log::debug!("rx deferred, frame pool exhausted");
            return Err(Error::PoolExhausted);
        };
        let result = self.receive_frame(index, dest);
        self.pool.release(index);
        result
    }

    fn receive_frame(&mut self, index: usize, dest: &mut [u8]) -> Result<usize, Error<Spi::Error>> {
        self.write_register_pair(regs::ERDPTL, regs::ERDPTH, self.next_packet)?;
        let mut header = [0u8; regs::RX_HEADER_LEN];
        let slot = self.pool.slot_mut(index);
        self.intf.buffer_read(&mut header, &mut slot.rx_buf)?;

        // The chip prefixes every frame with the address of the next one
        // and the receive status vector. The next-packet address is taken
        // over verbatim, the ring wrap-around is the chip's business.
        self.next_packet = u16::from_le_bytes([header[0], header[1]]);
        let byte_count = u16::from_le_bytes([header[2], header[3]]) as usize;
        let status = RxStatusVector::new_with_raw_value(u16::from_le_bytes([header[4], header[5]]));

        let payload_len = byte_count.saturating_sub(regs::CRC_LEN);
        let copy_len = payload_len.min(dest.len()).min(regs::MAX_FRAME_LEN);
        let read = if status.received_ok() {
            let slot = self.pool.slot_mut(index);
            self.intf
                .buffer_read(&mut dest[..copy_len], &mut slot.rx_buf)?;
            log::debug!("eth rx {copy_len} bytes");
            copy_len
        } else {
            log::warn!(
                "dropping broken frame, status 0x{:04x}",
                status.raw_value()
            );
            0
        };

        // Free the ring space in hardware and take one packet off the
        // pending counter.
        self.write_register_pair(regs::ERXRDPTL, regs::ERXRDPTH, self.next_packet)?;
        self.intf
            .bit_field_set(regs::ECON2, Econ2::DEFAULT.with_pktdec(true).raw_value())?;
        Ok(read)
    }

    /// Readiness gate shared by [Self::send] and [Self::periodic]: the
    /// frame in the given slot goes out when no transmission is pending
    /// and the link is up, otherwise it stays queued in the pool.
    fn try_transmit(&mut self, index: usize) -> Result<(), Error<Spi::Error>> {
        if let Some(active) = self.active_tx_slot {
            self.check_transmit_done(active)?;
        }
        // Recover the transmit logic from a previously aborted
        // transmission, otherwise TXRTS would never clear again.
        let estat = Estat::new_with_raw_value(self.intf.read_register(regs::ESTAT)?);
        if estat.txabrt() {
            log::warn!("clearing aborted transmission");
            self.intf
                .bit_field_clear(regs::ECON1, Econ1::DEFAULT.with_txrts(true).raw_value())?;
        }
        if !self.link_up {
            self.poll_link_status().ok();
        }
        let econ1 = Econ1::new_with_raw_value(self.intf.read_register(regs::ECON1)?);
        if econ1.txrts() || self.active_tx_slot.is_some() || !self.link_up {
            // Stays queued, a later tick picks it up.
            return Ok(());
        }
        self.transmit_slot(index)
    }

    fn transmit_slot(&mut self, index: usize) -> Result<(), Error<Spi::Error>> {
        self.active_tx_slot = Some(index);
        let slot = self.pool.slot_mut(index);
        let dlen = slot.dlen;
        let (frame, scratch) = slot.tx_rx_buffers();
        self.intf.buffer_write(&frame[..dlen], scratch)?;
        // The control byte sits at the transmit base, ETXND points at the
        // last payload byte.
        self.write_register_pair(regs::ETXNDL, regs::ETXNDH, regs::TX_START + dlen as u16)?;
        self.intf
            .bit_field_set(regs::ECON1, Econ1::DEFAULT.with_txrts(true).raw_value())?;
        if self.tx_stall_quirk {
            self.intf
                .bit_field_clear(regs::ECON1, Econ1::DEFAULT.with_txrts(true).raw_value())?;
        }
        log::debug!("eth tx {dlen} bytes");
        Ok(())
    }

    /// Polls the transmit request bit of an in-flight transmission and
    /// returns the pool slot once the chip is done with it.
    fn check_transmit_done(&mut self, index: usize) -> Result<(), Error<Spi::Error>> {
        let econ1 = Econ1::new_with_raw_value(self.intf.read_register(regs::ECON1)?);
        if econ1.txrts() {
            return Ok(());
        }
        let estat = Estat::new_with_raw_value(self.intf.read_register(regs::ESTAT)?);
        if estat.txabrt() {
            log::warn!("transmission aborted by the chip");
        }
        self.pool.release(index);
        self.active_tx_slot = None;
        Ok(())
    }

    fn write_register_pair(
        &mut self,
        low: Register,
        high: Register,
        value: u16,
    ) -> Result<(), Error<Spi::Error>> {
        let [low_byte, high_byte] = value.to_le_bytes();
        self.intf.write_register(low, low_byte)?;
        self.intf.write_register(high, high_byte)
    }
}
