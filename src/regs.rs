//! Register and message RAM element layouts.
//!
//! Field order is LSB first, matching the FDCAN reference manual. Time
//! quanta counts in [`Nbtp`] and [`Dbtp`] are stored minus one, as the
//! hardware expects.

use bitflags::bitflags;
use embedded_hal::can::{ExtendedId, Id, StandardId};
use modular_bitfield::prelude::*;

/// Position of an 11-bit identifier inside the 29-bit element ID field.
pub const STANDARD_ID_SHIFT: u32 = 18;

/// CC control register.
#[bitfield]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cccr {
    /// Initialization.
    pub init: bool,
    /// Configuration change enable.
    pub cce: bool,
    /// Restricted operation mode.
    pub asm: bool,
    /// Clock stop acknowledge.
    pub csa: bool,
    /// Clock stop request.
    pub csr: bool,
    /// Bus monitoring mode.
    pub mon: bool,
    /// Disable automatic retransmission.
    pub dar: bool,
    /// Test mode enable.
    pub test: bool,
    /// FD operation enable.
    pub fdoe: bool,
    /// Bit rate switching enable.
    pub brse: bool,
    #[skip]
    __: B2,
    /// Protocol exception handling disable.
    pub pxhd: bool,
    /// Edge filtering during bus integration.
    pub efbi: bool,
    /// Transmit pause.
    pub txp: bool,
    /// Non ISO operation.
    pub niso: bool,
    #[skip]
    __: B16,
}

/// Nominal bit timing and prescaler register.
#[bitfield]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nbtp {
    pub ntseg2: B7,
    #[skip]
    __: B1,
    pub ntseg1: u8,
    pub nbrp: B9,
    pub nsjw: B7,
}

/// Data bit timing and prescaler register.
#[bitfield]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dbtp {
    pub dsjw: B4,
    pub dtseg2: B4,
    pub dtseg1: B5,
    #[skip]
    __: B3,
    pub dbrp: B5,
    #[skip]
    __: B2,
    /// Transceiver delay compensation.
    pub tdc: bool,
    #[skip]
    __: B8,
}

bitflags! {
    /// Interrupt sources, laid out as in the IE register.
    pub struct Interrupts: u32 {
        const RX_FIFO0_NEW_MESSAGE = 1 << 0;
        const RX_FIFO0_FULL = 1 << 1;
        const RX_FIFO0_MESSAGE_LOST = 1 << 2;
        const RX_FIFO1_NEW_MESSAGE = 1 << 3;
        const RX_FIFO1_FULL = 1 << 4;
        const RX_FIFO1_MESSAGE_LOST = 1 << 5;
        const HIGH_PRIORITY_MESSAGE = 1 << 6;
        const TX_COMPLETE = 1 << 7;
        const TX_ABORT_COMPLETE = 1 << 8;
        const TX_FIFO_EMPTY = 1 << 9;
        const TX_EVENT_FIFO_NEW_DATA = 1 << 10;
        const TIMESTAMP_WRAPAROUND = 1 << 13;
        const RAM_ACCESS_FAILURE = 1 << 14;
        const TIMEOUT_OCCURRED = 1 << 15;
        const ERROR_LOGGING_OVERFLOW = 1 << 16;
        const ERROR_PASSIVE = 1 << 17;
        const ERROR_WARNING = 1 << 18;
        const BUS_OFF = 1 << 19;
    }
}

bitflags! {
    /// TX buffer selection. Each bit names one slot of the TX FIFO/queue, as
    /// in the TXBAR, TXBRP and TXBCR registers.
    pub struct TxBuffers: u32 {
        const BUFFER0 = 1 << 0;
        const BUFFER1 = 1 << 1;
        const BUFFER2 = 1 << 2;
    }
}

impl TxBuffers {
    /// The single-slot set for buffer `index`, if the peripheral has it.
    pub fn slot(index: u8) -> Option<Self> {
        1u32.checked_shl(u32::from(index))
            .and_then(Self::from_bits)
    }
}

/// Header words T0 and T1 of a TX buffer element.
#[bitfield]
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxElementHeader {
    pub id: B29,
    /// Remote transmission request.
    pub rtr: bool,
    /// Extended identifier.
    pub xtd: bool,
    /// Error state indicator, set for error passive.
    pub esi: bool,
    #[skip]
    __: B16,
    pub dlc: B4,
    /// Bit rate switch.
    pub brs: bool,
    /// FD format.
    pub fdf: bool,
    #[skip]
    __: B1,
    /// Store a TX event.
    pub efc: bool,
    /// Message marker, copied into the TX event.
    pub mm: u8,
}

impl TxElementHeader {
    pub fn with_standard_id(self, id: StandardId) -> Self {
        self.with_xtd(false)
            .with_id(u32::from(id.as_raw()) << STANDARD_ID_SHIFT)
    }

    /// The T0 and T1 words as written to message RAM.
    pub fn words(self) -> [u32; 2] {
        let raw = u64::from(self);
        [raw as u32, (raw >> 32) as u32]
    }
}

/// Header words R0 and R1 of an RX FIFO element.
#[bitfield]
#[repr(u64)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxElementHeader {
    pub id: B29,
    pub rtr: bool,
    pub xtd: bool,
    pub esi: bool,
    /// RX timestamp.
    pub rxts: u16,
    pub dlc: B4,
    pub brs: bool,
    pub fdf: bool,
    #[skip]
    __: B2,
    /// Index of the filter that accepted the frame.
    pub fidx: B7,
    /// Accepted non-matching frame.
    pub anmf: bool,
}

impl RxElementHeader {
    pub fn from_words(words: [u32; 2]) -> Self {
        Self::from(u64::from(words[0]) | (u64::from(words[1]) << 32))
    }

    pub fn with_standard_id(self, id: StandardId) -> Self {
        self.with_xtd(false)
            .with_id(u32::from(id.as_raw()) << STANDARD_ID_SHIFT)
    }

    /// Decodes the identifier according to the XTD bit.
    pub fn identifier(&self) -> Id {
        let raw = self.id();
        if self.xtd() {
            Id::Extended(unwrap!(ExtendedId::new(raw)))
        } else {
            // 29-bit field shifted down leaves at most 11 bits.
            Id::Standard(unwrap!(StandardId::new((raw >> STANDARD_ID_SHIFT) as u16)))
        }
    }
}
