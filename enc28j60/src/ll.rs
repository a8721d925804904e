//! # SPI frame primitives.
//!
//! Thin low-level helper which frames every chip access as exactly one
//! synchronous SPI exchange and keeps track of the register bank currently
//! selected in hardware, so redundant bank switches never reach the bus.
use arbitrary_int::{u2, u6};
use embedded_hal::spi::SpiDevice;

use crate::Error;
use crate::regs::{self, Econ1, Register};

/// Address bits of the command byte, the upper three bits carry the opcode.
const ADDR_MASK: u8 = 0x1F;

fn spi_failure<E: embedded_hal::spi::Error>(e: E) -> Error<E> {
    log::warn!("SPI transfer failure: {e:?}");
    Error::Spi(e)
}

/// Low-level chip interface owning the bus handle and the bank cache.
pub struct SpiInterface<Spi> {
    spi: Spi,
    /// Bank currently selected in hardware, `None` if unknown.
    current_bank: Option<u6>,
}

impl<Spi: SpiDevice> SpiInterface<Spi> {
    pub fn new(spi: Spi) -> Self {
        Self {
            spi,
            current_bank: None,
        }
    }

    /// Releases the bus handle.
    pub fn release(self) -> Spi {
        self.spi
    }

    /// Forces the next banked access to re-select the bank in hardware.
    #[inline]
    pub fn invalidate_bank_cache(&mut self) {
        self.current_bank = None;
    }

    /// Selects the bank of the given register if it is not already
    /// selected. Common registers never need a switch.
    ///
    /// The bank select bits live in ECON1, so the switch is a
    /// read-modify-write preserving the unrelated control bits. On any
    /// transport failure the cache is invalidated because the hardware
    /// state is unknown afterwards.
    pub fn switch_bank(&mut self, reg: Register) -> Result<(), Error<Spi::Error>> {
        if reg.common() {
            return Ok(());
        }
        let bank = reg.bank();
        if self.current_bank == Some(bank) {
            return Ok(());
        }
        self.current_bank = None;
        let mut econ1 = Econ1::new_with_raw_value(self.read_register(regs::ECON1)?);
        econ1.set_bsel(u2::new(bank.value() & 0x3));
        self.write_register(regs::ECON1, econ1.raw_value())?;
        self.current_bank = Some(bank);
        Ok(())
    }

    /// Reads one control register.
    ///
    /// ETH registers answer in a 2 byte frame, MAC and MII registers clock
    /// out a dummy byte first and need a 3 byte frame.
    pub fn read_register(&mut self, reg: Register) -> Result<u8, Error<Spi::Error>> {
        self.switch_bank(reg)?;
        let cmd = regs::OPCODE_RCR | (reg.addr() & ADDR_MASK);
        if reg.mac_mii() {
            let mut frame = [cmd, 0, 0];
            self.spi.transfer_in_place(&mut frame).map_err(spi_failure)?;
            Ok(frame[2])
        } else {
            let mut frame = [cmd, 0];
            self.spi.transfer_in_place(&mut frame).map_err(spi_failure)?;
            Ok(frame[1])
        }
    }

    /// Writes one control register.
    pub fn write_register(&mut self, reg: Register, value: u8) -> Result<(), Error<Spi::Error>> {
        self.switch_bank(reg)?;
        let frame = [regs::OPCODE_WCR | (reg.addr() & ADDR_MASK), value];
        self.spi.write(&frame).map_err(spi_failure)
    }

    /// Sets the masked bits of an ETH register in a single exchange.
    ///
    /// The bit field opcodes are implemented for ETH registers only; the
    /// chip would corrupt a MAC or MII register, so those are rejected
    /// before any bus traffic.
    pub fn bit_field_set(&mut self, reg: Register, mask: u8) -> Result<(), Error<Spi::Error>> {
        if reg.mac_mii() {
            return Err(Error::MacMiiBitAccess);
        }
        self.switch_bank(reg)?;
        let frame = [regs::OPCODE_BFS | (reg.addr() & ADDR_MASK), mask];
        self.spi.write(&frame).map_err(spi_failure)
    }

    /// Clears the masked bits of an ETH register in a single exchange.
    pub fn bit_field_clear(&mut self, reg: Register, mask: u8) -> Result<(), Error<Spi::Error>> {
        if reg.mac_mii() {
            return Err(Error::MacMiiBitAccess);
        }
        self.switch_bank(reg)?;
        let frame = [regs::OPCODE_BFC | (reg.addr() & ADDR_MASK), mask];
        self.spi.write(&frame).map_err(spi_failure)
    }

    /// Issues a system reset command. The chip reverts to bank 0 and all
    /// register defaults, so the bank cache is invalidated as well.
    pub fn soft_reset(&mut self) -> Result<(), Error<Spi::Error>> {
        self.current_bank = None;
        self.spi.write(&[regs::OPCODE_SRC]).map_err(spi_failure)
    }

    /// Reads `dest.len()` bytes from the buffer memory at the current read
    /// pointer in one exchange, using `scratch` as the frame assembly area.
    ///
    /// The first scratch byte carries the opcode and its echo slot, so the
    /// scratch buffer must hold one byte more than the destination.
    pub fn buffer_read(
        &mut self,
        dest: &mut [u8],
        scratch: &mut [u8],
    ) -> Result<(), Error<Spi::Error>> {
        let total = dest.len() + 1;
        if total > scratch.len() {
            return Err(Error::BufferTooSmall(scratch.len()));
        }
        let frame = &mut scratch[..total];
        frame.fill(0);
        frame[0] = regs::OPCODE_RBM;
        self.spi.transfer_in_place(frame).map_err(spi_failure)?;
        dest.copy_from_slice(&frame[1..]);
        Ok(())
    }

    /// Writes a frame into the transmit region of the buffer memory.
    ///
    /// The write pointer is repositioned to the transmit base address
    /// first, so the frame always overwrites the previous one. The payload
    /// is prefixed by the opcode and the per-packet control byte, which
    /// selects the MACON3 transmit defaults.
    pub fn buffer_write(
        &mut self,
        frame: &[u8],
        scratch: &mut [u8],
    ) -> Result<(), Error<Spi::Error>> {
        let total = frame.len() + 2;
        if total > scratch.len() {
            return Err(Error::BufferTooSmall(scratch.len()));
        }
        self.write_register(regs::EWRPTL, regs::TX_START.to_le_bytes()[0])?;
        self.write_register(regs::EWRPTH, regs::TX_START.to_le_bytes()[1])?;
        scratch[0] = regs::OPCODE_WBM;
        scratch[1] = 0x00;
        scratch[2..total].copy_from_slice(frame);
        self.spi.write(&scratch[..total]).map_err(spi_failure)
    }
}
