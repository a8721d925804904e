//! Behavioral chip model backing the unit tests.
//!
//! Implements enough of the SPI instruction set to exercise the driver end
//! to end: banked register file, buffer memory with auto-incrementing read
//! and write pointers, the indirect MII access plumbing and the packet
//! counter side effect of ECON2.PKTDEC. Tests poke the public fields to
//! stage packets or fault conditions and inspect them afterwards.
use core::cell::RefCell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{self, ErrorType, Operation, SpiDevice};

use crate::Enc28j60;
use crate::regs;

const RAM_SIZE: usize = regs::RAM_SIZE as usize;
const BANKS: usize = 4;
const BANK_REGS: usize = 0x20;
/// Largest SPI frame the model has to stage (opcode + control + payload).
const FRAME_SCRATCH: usize = 2048;

pub struct SimChip {
    /// Banked register file. Common registers live in the bank 0 row.
    pub regs: [[u8; BANK_REGS]; BANKS],
    pub phy: [u16; BANK_REGS],
    pub ram: [u8; RAM_SIZE],
    /// Silicon revision reported by EREVID, survives a system reset.
    pub revision: u8,
    /// MISTAT reads as busy forever.
    pub phy_always_busy: bool,
    /// Fail the next N transactions with a bus error.
    pub fail_transfers: usize,
    /// Successful SPI transactions so far.
    pub transfers: usize,
    /// Buffer memory read transactions so far.
    pub buffer_reads: usize,
}

impl SimChip {
    pub fn new() -> Self {
        let mut chip = Self {
            regs: [[0; BANK_REGS]; BANKS],
            phy: [0; BANK_REGS],
            ram: [0; RAM_SIZE],
            revision: 0x06,
            phy_always_busy: false,
            fail_transfers: 0,
            transfers: 0,
            buffer_reads: 0,
        };
        chip.power_on_defaults();
        chip
    }

    fn power_on_defaults(&mut self) {
        self.regs = [[0; BANK_REGS]; BANKS];
        self.phy = [0; BANK_REGS];
        // ESTAT.CLKRDY, ECON2.AUTOINC.
        self.regs[0][0x1D] = 0x01;
        self.regs[0][0x1E] = 0x80;
        // Silicon revision and PHY identifier words.
        self.regs[3][0x12] = self.revision;
        self.phy[0x02] = 0x0083;
        self.phy[0x03] = 0x1400;
    }

    #[inline]
    pub fn econ1(&self) -> u8 {
        self.regs[0][0x1F]
    }

    fn bank(&self) -> usize {
        (self.econ1() & 0x03) as usize
    }

    /// Register access with the common register window normalized into
    /// bank 0.
    pub fn reg(&self, bank: usize, addr: u8) -> u8 {
        if addr >= 0x1B {
            self.regs[0][addr as usize]
        } else {
            self.regs[bank][addr as usize]
        }
    }

    pub fn set_reg(&mut self, bank: usize, addr: u8, value: u8) {
        if addr >= 0x1B {
            self.regs[0][addr as usize] = value;
        } else {
            self.regs[bank][addr as usize] = value;
        }
    }

    /// MAC and MII registers clock out a dummy byte before the data byte.
    /// The common register window is an ETH register in every bank.
    fn is_mac_reg(bank: usize, addr: u8) -> bool {
        if addr >= 0x1B {
            return false;
        }
        bank == 2 || (bank == 3 && (addr <= 0x05 || addr == 0x0A))
    }

    fn read_current(&self, addr: u8) -> u8 {
        let bank = self.bank();
        if self.phy_always_busy && bank == 3 && addr == 0x0A {
            return 0x01;
        }
        self.reg(bank, addr)
    }

    fn write_current(&mut self, addr: u8, value: u8) {
        let bank = self.bank();
        match (bank, addr) {
            // ECON2: PKTDEC is a self-clearing strobe decrementing the
            // pending packet counter.
            (_, 0x1E) => {
                if value & 0x40 != 0 {
                    self.regs[1][0x19] = self.regs[1][0x19].saturating_sub(1);
                }
                self.regs[0][0x1E] = value & !0x40;
            }
            // MICMD: MIIRD loads the MIRD registers from the PHY.
            (2, 0x12) => {
                self.regs[2][0x12] = value;
                if value & 0x01 != 0 && !self.phy_always_busy {
                    let phy_addr = (self.regs[2][0x14] & 0x1F) as usize;
                    let phy_value = self.phy[phy_addr];
                    self.regs[2][0x18] = phy_value as u8;
                    self.regs[2][0x19] = (phy_value >> 8) as u8;
                }
            }
            // MIWRH: writing the high byte performs the PHY write.
            (2, 0x17) => {
                self.regs[2][0x17] = value;
                if !self.phy_always_busy {
                    let phy_addr = (self.regs[2][0x14] & 0x1F) as usize;
                    self.phy[phy_addr] = u16::from_le_bytes([self.regs[2][0x16], value]);
                }
            }
            _ => self.set_reg(bank, addr, value),
        }
    }

    fn read_pointer(&self, low: usize) -> u16 {
        u16::from_le_bytes([self.regs[0][low], self.regs[0][low + 1]])
    }

    fn store_pointer(&mut self, low: usize, value: u16) {
        let [low_byte, high_byte] = value.to_le_bytes();
        self.regs[0][low] = low_byte;
        self.regs[0][low + 1] = high_byte;
    }

    /// One full-duplex exchange, `tx` and `rx` have the same length.
    fn exchange(&mut self, tx: &[u8], rx: &mut [u8]) {
        let Some(&command) = tx.first() else {
            return;
        };
        if command == regs::OPCODE_SRC {
            self.power_on_defaults();
            return;
        }
        let addr = command & 0x1F;
        match command & 0xE0 {
            0x00 => {
                // RCR. The dummy byte of MAC/MII registers shifts the data
                // byte back by one.
                let value = self.read_current(addr);
                if Self::is_mac_reg(self.bank(), addr) {
                    if rx.len() >= 3 {
                        rx[2] = value;
                    }
                } else if rx.len() >= 2 {
                    rx[1] = value;
                }
            }
            0x40 => self.write_current(addr, tx[1]),
            0x80 => {
                let value = self.read_current(addr) | tx[1];
                self.write_current(addr, value);
            }
            0xA0 => {
                let value = self.read_current(addr) & !tx[1];
                self.write_current(addr, value);
            }
            _ if command == regs::OPCODE_RBM => {
                self.buffer_reads += 1;
                let mut pointer = self.read_pointer(0x00);
                for slot in rx[1..].iter_mut() {
                    *slot = self.ram[pointer as usize % RAM_SIZE];
                    pointer = pointer.wrapping_add(1) % regs::RAM_SIZE;
                }
                self.store_pointer(0x00, pointer);
            }
            _ if command == regs::OPCODE_WBM => {
                let mut pointer = self.read_pointer(0x02);
                for &byte in &tx[1..] {
                    self.ram[pointer as usize % RAM_SIZE] = byte;
                    pointer = pointer.wrapping_add(1) % regs::RAM_SIZE;
                }
                self.store_pointer(0x02, pointer);
            }
            _ => {}
        }
    }

    /// Stages one received packet at the given ring address and bumps the
    /// pending packet counter.
    pub fn stage_packet(&mut self, at: u16, next: u16, payload: &[u8], received_ok: bool) {
        let byte_count = (payload.len() + regs::CRC_LEN) as u16;
        let status: u16 = if received_ok { 0x0080 } else { 0x0010 };
        let mut header = [0u8; regs::RX_HEADER_LEN];
        header[0..2].copy_from_slice(&next.to_le_bytes());
        header[2..4].copy_from_slice(&byte_count.to_le_bytes());
        header[4..6].copy_from_slice(&status.to_le_bytes());
        let base = at as usize;
        self.ram[base..base + header.len()].copy_from_slice(&header);
        self.ram[base + header.len()..base + header.len() + payload.len()]
            .copy_from_slice(payload);
        self.regs[1][0x19] += 1;
    }

    #[inline]
    pub fn packet_count(&self) -> u8 {
        self.regs[1][0x19]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

impl spi::Error for SimError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

/// [SpiDevice] front-end sharing the chip model with the test body.
#[derive(Clone)]
pub struct SimSpi(pub Rc<RefCell<SimChip>>);

impl ErrorType for SimSpi {
    type Error = SimError;
}

impl SpiDevice for SimSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), SimError> {
        let mut chip = self.0.borrow_mut();
        if chip.fail_transfers > 0 {
            chip.fail_transfers -= 1;
            return Err(SimError);
        }
        chip.transfers += 1;
        let mut scratch = [0u8; FRAME_SCRATCH];
        for operation in operations {
            match operation {
                Operation::Write(tx) => {
                    let (sink, _) = scratch.split_at_mut(tx.len());
                    chip.exchange(tx, sink);
                }
                Operation::TransferInPlace(buf) => {
                    let (tx, _) = scratch.split_at_mut(buf.len());
                    tx.copy_from_slice(buf);
                    chip.exchange(tx, buf);
                }
                Operation::Transfer(rx, tx) => {
                    let total = rx.len().max(tx.len());
                    let (tx_frame, rest) = scratch.split_at_mut(total);
                    let (rx_frame, _) = rest.split_at_mut(total);
                    tx_frame[..tx.len()].copy_from_slice(tx);
                    chip.exchange(tx_frame, rx_frame);
                    rx.copy_from_slice(&rx_frame[..rx.len()]);
                }
                Operation::Read(rx) => {
                    let (tx, _) = scratch.split_at_mut(rx.len());
                    chip.exchange(tx, rx);
                }
                Operation::DelayNs(_) => {}
            }
        }
        Ok(())
    }
}

pub struct SimDelay;

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Fresh driver wired to a fresh chip model.
pub fn sim_driver() -> (Rc<RefCell<SimChip>>, Enc28j60<SimSpi, SimDelay>) {
    let chip = Rc::new(RefCell::new(SimChip::new()));
    let driver = Enc28j60::new(SimSpi(chip.clone()), SimDelay);
    (chip, driver)
}
