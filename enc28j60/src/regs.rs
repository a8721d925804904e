//! # ENC28J60 register map.
//!
//! Control registers are spread over four banks which must be selected via
//! the `BSEL` bits in [Econ1] before a banked register can be accessed. The
//! five registers at offsets 0x1B..=0x1F are visible in every bank. MAC and
//! MII registers additionally clock out a dummy byte before the data byte on
//! reads, so their SPI read frame is one byte longer than for ETH registers.
use arbitrary_int::{u2, u3, u6};

/// Size of the internal packet SRAM in bytes.
pub const RAM_SIZE: u16 = 0x2000;
/// Start of the receive ring. Kept at address zero (silicon erratum for
/// revisions up to B7: the receive hardware misbehaves with a non-zero
/// ring start).
pub const RX_START: u16 = 0x0000;
/// Last byte of the receive ring, inclusive.
pub const RX_END: u16 = 0x19FF;
/// Base of the transmit region. Every frame is written to this fixed
/// address, overwriting the previous one.
pub const TX_START: u16 = 0x1A00;
/// Last byte of the transmit region, inclusive.
pub const TX_END: u16 = 0x1FFF;

/// Maximum ethernet frame length accepted for transmission, including the
/// 14 byte header but excluding the CRC appended by the MAC.
pub const MAX_FRAME_LEN: usize = 1518;
/// Length of the CRC the chip appends to every received frame.
pub const CRC_LEN: usize = 4;
/// Length of the per-packet header (next packet pointer plus receive
/// status vector) preceding every frame in the receive ring.
pub const RX_HEADER_LEN: usize = 6;

/// SPI instruction set.
///
/// For the control register opcodes the lower five bits are ORed with the
/// register offset; the buffer and reset opcodes carry a fixed argument.
pub const OPCODE_RCR: u8 = 0x00;
pub const OPCODE_RBM: u8 = 0x3A;
pub const OPCODE_WCR: u8 = 0x40;
pub const OPCODE_WBM: u8 = 0x7A;
pub const OPCODE_BFS: u8 = 0x80;
pub const OPCODE_BFC: u8 = 0xA0;
pub const OPCODE_SRC: u8 = 0xFF;

/// One control register reference.
///
/// Encodes the register offset, its bank, whether it is reachable from any
/// bank and whether it is a MAC/MII register in a single 16 bit value.
#[bitbybit::bitfield(u16, default = 0x0)]
#[derive(Debug)]
pub struct Register {
    /// Register is a MAC or MII register with the longer read frame.
    #[bit(15, rw)]
    mac_mii: bool,
    /// Register is visible in every bank, no bank switch required.
    #[bit(14, rw)]
    common: bool,
    #[bits(8..=13, rw)]
    bank: u6,
    #[bits(0..=7, rw)]
    addr: u8,
}

impl Register {
    /// ETH register in the given bank.
    pub const fn eth(bank: u8, addr: u8) -> Self {
        Self::new_with_raw_value(((bank as u16) << 8) | addr as u16)
    }

    /// Register visible independently of the selected bank.
    pub const fn eth_common(addr: u8) -> Self {
        Self::new_with_raw_value((1 << 14) | addr as u16)
    }

    /// MAC or MII register in the given bank.
    pub const fn mac(bank: u8, addr: u8) -> Self {
        Self::new_with_raw_value((1 << 15) | ((bank as u16) << 8) | addr as u16)
    }
}

// Common registers.
pub const EIE: Register = Register::eth_common(0x1B);
pub const EIR: Register = Register::eth_common(0x1C);
pub const ESTAT: Register = Register::eth_common(0x1D);
pub const ECON2: Register = Register::eth_common(0x1E);
pub const ECON1: Register = Register::eth_common(0x1F);

// Bank 0.
pub const ERDPTL: Register = Register::eth(0, 0x00);
pub const ERDPTH: Register = Register::eth(0, 0x01);
pub const EWRPTL: Register = Register::eth(0, 0x02);
pub const EWRPTH: Register = Register::eth(0, 0x03);
pub const ETXSTL: Register = Register::eth(0, 0x04);
pub const ETXSTH: Register = Register::eth(0, 0x05);
pub const ETXNDL: Register = Register::eth(0, 0x06);
pub const ETXNDH: Register = Register::eth(0, 0x07);
pub const ERXSTL: Register = Register::eth(0, 0x08);
pub const ERXSTH: Register = Register::eth(0, 0x09);
pub const ERXNDL: Register = Register::eth(0, 0x0A);
pub const ERXNDH: Register = Register::eth(0, 0x0B);
pub const ERXRDPTL: Register = Register::eth(0, 0x0C);
pub const ERXRDPTH: Register = Register::eth(0, 0x0D);
pub const ERXWRPTL: Register = Register::eth(0, 0x0E);
pub const ERXWRPTH: Register = Register::eth(0, 0x0F);
pub const EDMASTL: Register = Register::eth(0, 0x10);
pub const EDMASTH: Register = Register::eth(0, 0x11);
pub const EDMANDL: Register = Register::eth(0, 0x12);
pub const EDMANDH: Register = Register::eth(0, 0x13);
pub const EDMADSTL: Register = Register::eth(0, 0x14);
pub const EDMADSTH: Register = Register::eth(0, 0x15);
pub const EDMACSL: Register = Register::eth(0, 0x16);
pub const EDMACSH: Register = Register::eth(0, 0x17);

// Bank 1.
pub const EHT0: Register = Register::eth(1, 0x00);
pub const EHT1: Register = Register::eth(1, 0x01);
pub const EHT2: Register = Register::eth(1, 0x02);
pub const EHT3: Register = Register::eth(1, 0x03);
pub const EHT4: Register = Register::eth(1, 0x04);
pub const EHT5: Register = Register::eth(1, 0x05);
pub const EHT6: Register = Register::eth(1, 0x06);
pub const EHT7: Register = Register::eth(1, 0x07);
pub const EPMM0: Register = Register::eth(1, 0x08);
pub const EPMM1: Register = Register::eth(1, 0x09);
pub const EPMM2: Register = Register::eth(1, 0x0A);
pub const EPMM3: Register = Register::eth(1, 0x0B);
pub const EPMM4: Register = Register::eth(1, 0x0C);
pub const EPMM5: Register = Register::eth(1, 0x0D);
pub const EPMM6: Register = Register::eth(1, 0x0E);
pub const EPMM7: Register = Register::eth(1, 0x0F);
pub const EPMCSL: Register = Register::eth(1, 0x10);
pub const EPMCSH: Register = Register::eth(1, 0x11);
pub const EPMOL: Register = Register::eth(1, 0x14);
pub const EPMOH: Register = Register::eth(1, 0x15);
pub const EWOLIE: Register = Register::eth(1, 0x16);
pub const EWOLIR: Register = Register::eth(1, 0x17);
pub const ERXFCON: Register = Register::eth(1, 0x18);
pub const EPKTCNT: Register = Register::eth(1, 0x19);

// Bank 2. All registers in this bank are MAC or MII registers.
pub const MACON1: Register = Register::mac(2, 0x00);
pub const MACON2: Register = Register::mac(2, 0x01);
pub const MACON3: Register = Register::mac(2, 0x02);
pub const MACON4: Register = Register::mac(2, 0x03);
pub const MABBIPG: Register = Register::mac(2, 0x04);
pub const MAIPGL: Register = Register::mac(2, 0x06);
pub const MAIPGH: Register = Register::mac(2, 0x07);
pub const MACLCON1: Register = Register::mac(2, 0x08);
pub const MACLCON2: Register = Register::mac(2, 0x09);
pub const MAMXFLL: Register = Register::mac(2, 0x0A);
pub const MAMXFLH: Register = Register::mac(2, 0x0B);
pub const MAPHSUP: Register = Register::mac(2, 0x0D);
pub const MICON: Register = Register::mac(2, 0x11);
pub const MICMD: Register = Register::mac(2, 0x12);
pub const MIREGADR: Register = Register::mac(2, 0x14);
pub const MIWRL: Register = Register::mac(2, 0x16);
pub const MIWRH: Register = Register::mac(2, 0x17);
pub const MIRDL: Register = Register::mac(2, 0x18);
pub const MIRDH: Register = Register::mac(2, 0x19);

// Bank 3. The MAC address bytes are laid out in the swapped pair order of
// the datasheet register map: MAADR1 holds the most significant address
// octet but sits at offset 0x04.
pub const MAADR5: Register = Register::mac(3, 0x00);
pub const MAADR6: Register = Register::mac(3, 0x01);
pub const MAADR3: Register = Register::mac(3, 0x02);
pub const MAADR4: Register = Register::mac(3, 0x03);
pub const MAADR1: Register = Register::mac(3, 0x04);
pub const MAADR2: Register = Register::mac(3, 0x05);
pub const EBSTSD: Register = Register::eth(3, 0x06);
pub const EBSTCON: Register = Register::eth(3, 0x07);
pub const EBSTCSL: Register = Register::eth(3, 0x08);
pub const EBSTCSH: Register = Register::eth(3, 0x09);
pub const MISTAT: Register = Register::mac(3, 0x0A);
pub const EREVID: Register = Register::eth(3, 0x12);
pub const ECOCON: Register = Register::eth(3, 0x15);
pub const EFLOCON: Register = Register::eth(3, 0x17);
pub const EPAUSL: Register = Register::eth(3, 0x18);
pub const EPAUSH: Register = Register::eth(3, 0x19);

#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug)]
pub struct Econ1 {
    #[bit(7, rw)]
    txrst: bool,
    #[bit(6, rw)]
    rxrst: bool,
    #[bit(5, rw)]
    dmast: bool,
    #[bit(4, rw)]
    csumen: bool,
    /// Transmit request. Set to start a transmission, cleared by hardware
    /// when the transmission completed or aborted.
    #[bit(3, rw)]
    txrts: bool,
    /// Receive enable.
    #[bit(2, rw)]
    rxen: bool,
    /// Bank select for banked register access.
    #[bits(0..=1, rw)]
    bsel: u2,
}

#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug)]
pub struct Econ2 {
    #[bit(7, rw)]
    autoinc: bool,
    /// Write-one to decrement the pending packet counter.
    #[bit(6, rw)]
    pktdec: bool,
    #[bit(5, rw)]
    pwrsv: bool,
    #[bit(3, rw)]
    vrps: bool,
}

#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug)]
pub struct Estat {
    #[bit(7, r)]
    int: bool,
    #[bit(6, r)]
    bufer: bool,
    #[bit(4, r)]
    latecol: bool,
    /// The last transmission was aborted.
    #[bit(1, r)]
    txabrt: bool,
    /// Oscillator start-up timer expired, clock is stable.
    #[bit(0, r)]
    clkrdy: bool,
}

#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug)]
pub struct Eir {
    #[bit(6, r)]
    pktif: bool,
    #[bit(5, r)]
    dmaif: bool,
    #[bit(4, r)]
    linkif: bool,
    #[bit(3, r)]
    txif: bool,
    #[bit(1, r)]
    txerif: bool,
    #[bit(0, r)]
    rxerif: bool,
}

#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug)]
pub struct Macon1 {
    #[bit(4, rw)]
    loopbk: bool,
    /// Allow the MAC to transmit pause control frames.
    #[bit(3, rw)]
    txpaus: bool,
    /// Inhibit transmission when pause control frames are received.
    #[bit(2, rw)]
    rxpaus: bool,
    #[bit(1, rw)]
    passall: bool,
    /// Enable frames to be received by the MAC.
    #[bit(0, rw)]
    marxen: bool,
}

#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug)]
pub struct Macon3 {
    /// Automatic pad and CRC configuration.
    #[bits(5..=7, rw)]
    padcfg: u3,
    #[bit(4, rw)]
    txcrcen: bool,
    #[bit(3, rw)]
    phdrlen: bool,
    #[bit(2, rw)]
    hfrmlen: bool,
    /// Check the type/length field of incoming frames.
    #[bit(1, rw)]
    frmlnen: bool,
    #[bit(0, rw)]
    fuldpx: bool,
}

#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug)]
pub struct Macon4 {
    /// Wait indefinitely for the medium to become free (IEEE compliant
    /// half-duplex behavior).
    #[bit(6, rw)]
    defer: bool,
    #[bit(5, rw)]
    bpen: bool,
    #[bit(4, rw)]
    nobkoff: bool,
}

/// Receive filter configuration (ERXFCON).
#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug)]
pub struct RxFilterControl {
    /// Accept frames addressed to the station MAC address.
    #[bit(7, rw)]
    ucen: bool,
    #[bit(6, rw)]
    andor: bool,
    /// Discard frames with an invalid CRC.
    #[bit(5, rw)]
    crcen: bool,
    #[bit(4, rw)]
    pmen: bool,
    #[bit(3, rw)]
    mpen: bool,
    #[bit(2, rw)]
    hten: bool,
    #[bit(1, rw)]
    mcen: bool,
    /// Accept broadcast frames.
    #[bit(0, rw)]
    bcen: bool,
}

/// MII command register.
#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug)]
pub struct Micmd {
    #[bit(1, rw)]
    miiscan: bool,
    /// Start one MII read cycle for the register selected in MIREGADR.
    #[bit(0, rw)]
    miird: bool,
}

/// MII status register.
#[bitbybit::bitfield(u8, default = 0x0)]
#[derive(Debug)]
pub struct Mistat {
    /// MIREGADR holds an invalid PHY register address.
    #[bit(2, r)]
    nvalid: bool,
    #[bit(1, r)]
    scan: bool,
    /// An MII read or write cycle is in progress.
    #[bit(0, r)]
    busy: bool,
}

/// Receive status vector word appended behind the next-packet pointer of
/// every frame in the receive ring. Only the upper 16 bits carrying the
/// error flags are modelled, the lower 16 bits are the byte count.
#[bitbybit::bitfield(u16, default = 0x0)]
#[derive(Debug)]
pub struct RxStatusVector {
    #[bit(9, r)]
    broadcast: bool,
    #[bit(8, r)]
    multicast: bool,
    /// Frame received with a valid CRC and no symbol/length errors.
    #[bit(7, r)]
    received_ok: bool,
    #[bit(6, r)]
    length_out_of_range: bool,
    #[bit(5, r)]
    length_check_error: bool,
    #[bit(4, r)]
    crc_error: bool,
    #[bit(1, r)]
    carrier_seen: bool,
    #[bit(0, r)]
    long_drop_event: bool,
}

/// PHY register addresses, accessed indirectly through the MII registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PhyRegister {
    Control1 = 0x00,
    Status1 = 0x01,
    Id1 = 0x02,
    Id2 = 0x03,
    Control2 = 0x10,
    Status2 = 0x11,
    InterruptEnable = 0x12,
    InterruptRequest = 0x13,
    LedControl = 0x14,
}

impl PhyRegister {
    #[inline]
    pub const fn addr(self) -> u8 {
        self as u8
    }
}

#[bitbybit::bitfield(u16, default = 0x0)]
#[derive(Debug)]
pub struct PhyControl1 {
    #[bit(15, rw)]
    prst: bool,
    #[bit(14, rw)]
    ploopbk: bool,
    #[bit(11, rw)]
    ppwrsv: bool,
    #[bit(8, rw)]
    pdpxmd: bool,
}

#[bitbybit::bitfield(u16, default = 0x0)]
#[derive(Debug)]
pub struct PhyControl2 {
    #[bit(14, rw)]
    frclnk: bool,
    #[bit(13, rw)]
    txdis: bool,
    #[bit(10, rw)]
    jabber: bool,
    /// Disable the automatic loopback of transmitted frames which the PHY
    /// performs in half-duplex mode.
    #[bit(8, rw)]
    hdldis: bool,
}

#[bitbybit::bitfield(u16, default = 0x0)]
#[derive(Debug)]
pub struct PhyStatus2 {
    #[bit(13, r)]
    txstat: bool,
    #[bit(12, r)]
    rxstat: bool,
    #[bit(11, r)]
    colstat: bool,
    /// Link is up. Not latched, reflects the current link state.
    #[bit(10, r)]
    lstat: bool,
    #[bit(9, r)]
    dpxstat: bool,
    #[bit(5, r)]
    plrity: bool,
}
