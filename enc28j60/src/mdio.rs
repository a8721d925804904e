//! # PHY register access.
//!
//! PHY registers are reached indirectly through the MII control registers
//! of the MAC. Each access programs the target address, kicks off the MII
//! cycle, waits out the chip-specified turnaround time once and rechecks
//! the busy flag, so the worst-case latency of a single access is bounded
//! by [PHY_SETTLE_US] instead of an open polling loop.
use embedded_hal::delay::DelayNs;
use embedded_hal::spi::SpiDevice;

use crate::regs::{self, Micmd, Mistat, PhyRegister, PhyStatus2};
use crate::{Enc28j60, Error};

/// Settle time of one MII cycle. The chip needs 10.24 us to move the data
/// between the PHY and the MIRD/MIWR registers.
pub const PHY_SETTLE_US: u32 = 11;

impl<Spi: SpiDevice, Delay: DelayNs> Enc28j60<Spi, Delay> {
    /// Reads one PHY register.
    pub fn read_phy(&mut self, reg: PhyRegister) -> Result<u16, Error<Spi::Error>> {
        self.check_phy_idle()?;
        self.intf.write_register(regs::MIREGADR, reg.addr())?;
        self.intf
            .write_register(regs::MICMD, Micmd::DEFAULT.with_miird(true).raw_value())?;
        self.delay.delay_us(PHY_SETTLE_US);
        let status = Mistat::new_with_raw_value(self.intf.read_register(regs::MISTAT)?);
        if status.busy() {
            // One settle window is the whole latency budget of this call.
            self.intf.write_register(regs::MICMD, 0)?;
            log::warn!("PHY read of register 0x{:02x} timed out", reg.addr());
            return Err(Error::PhyBusy);
        }
        self.intf.write_register(regs::MICMD, 0)?;
        // Low byte strictly first: reading MIRDH frees the MII interface
        // and invalidates MIRDL.
        let low = self.intf.read_register(regs::MIRDL)?;
        let high = self.intf.read_register(regs::MIRDH)?;
        Ok(u16::from_le_bytes([low, high]))
    }

    /// Writes one PHY register.
    pub fn write_phy(&mut self, reg: PhyRegister, value: u16) -> Result<(), Error<Spi::Error>> {
        self.check_phy_idle()?;
        let [low, high] = value.to_le_bytes();
        self.intf.write_register(regs::MIREGADR, reg.addr())?;
        self.intf.write_register(regs::MIWRL, low)?;
        // Writing the high byte starts the MII write cycle.
        self.intf.write_register(regs::MIWRH, high)?;
        self.delay.delay_us(PHY_SETTLE_US);
        let status = Mistat::new_with_raw_value(self.intf.read_register(regs::MISTAT)?);
        if status.busy() {
            log::warn!("PHY write of register 0x{:02x} timed out", reg.addr());
            return Err(Error::PhyBusy);
        }
        Ok(())
    }

    /// Re-reads the PHY status register and updates the cached link flag.
    pub fn poll_link_status(&mut self) -> Result<bool, Error<Spi::Error>> {
        let status = PhyStatus2::new_with_raw_value(self.read_phy(PhyRegister::Status2)?);
        if status.lstat() != self.link_up {
            log::debug!("link state changed, up: {}", status.lstat());
        }
        self.link_up = status.lstat();
        Ok(self.link_up)
    }

    fn check_phy_idle(&mut self) -> Result<(), Error<Spi::Error>> {
        let status = Mistat::new_with_raw_value(self.intf.read_register(regs::MISTAT)?);
        if status.busy() || status.scan() || status.nvalid() {
            log::warn!("PHY access rejected, MII interface not idle");
            return Err(Error::PhyBusy);
        }
        Ok(())
    }
}
