//! Protocol and bit timing parameters applied during bring-up.

use crate::regs::{Cccr, Dbtp, Nbtp};

/// Acceptance filter base identifier.
pub const FILTER_ID: u16 = 0x321;
/// Acceptance filter mask. All 11 bits must match [`FILTER_ID`].
pub const FILTER_MASK: u16 = 0x7FF;

/// Parameters used on this bus. Fixed at build time.
pub const INIT: Init = Init {
    clock_divider: ClockDivider::Div1,
    frame_format: FrameFormat::FdBrs,
    mode: Mode::Normal,
    auto_retransmission: false,
    transmit_pause: true,
    protocol_exception: false,
    nominal_bit_timing: NominalBitTiming {
        prescaler: 2,
        sync_jump_width: 16,
        seg1: 63,
        seg2: 16,
    },
    data_bit_timing: DataBitTiming {
        prescaler: 4,
        sync_jump_width: 2,
        seg1: 3,
        seg2: 2,
    },
    standard_filters: 1,
    extended_filters: 0,
    tx_queue_mode: TxQueueMode::Fifo,
};

/// Kernel clock divider, shared by all FDCAN instances.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClockDivider {
    Div1 = 0,
    Div2 = 1,
    Div4 = 2,
    Div6 = 3,
    Div8 = 4,
    Div10 = 5,
    Div12 = 6,
    Div14 = 7,
    Div16 = 8,
    Div18 = 9,
    Div20 = 10,
    Div22 = 11,
    Div24 = 12,
    Div26 = 13,
    Div28 = 14,
    Div30 = 15,
}

impl ClockDivider {
    /// Value for the CKDIV register.
    pub fn bits(self) -> u8 {
        self as u8
    }

    pub fn divisor(self) -> u32 {
        match self {
            ClockDivider::Div1 => 1,
            other => u32::from(other.bits()) * 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameFormat {
    /// Classic CAN only.
    Classic,
    /// FD frames without bit rate switching.
    Fd,
    /// FD frames with bit rate switching.
    FdBrs,
}

/// Operating mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    Normal,
    /// Receives and acknowledges, but does not transmit.
    Restricted,
    /// Receives only, sends neither acknowledges nor error frames.
    BusMonitoring,
    /// TX looped back to RX internally, TX pin held recessive.
    InternalLoopback,
    /// TX looped back to RX internally, TX pin driven.
    ExternalLoopback,
}

/// Order in which the TX buffers are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxQueueMode {
    /// In submission order.
    Fifo,
    /// Lowest identifier first.
    Queue,
}

/// Arbitration phase bit timing, in time quanta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NominalBitTiming {
    /// Valid range: 1 to 512.
    pub prescaler: u16,
    /// Valid range: 1 to 128.
    pub sync_jump_width: u8,
    /// Valid range: 1 to 256.
    pub seg1: u16,
    /// Valid range: 1 to 128.
    pub seg2: u8,
}

impl NominalBitTiming {
    pub fn is_valid(&self) -> bool {
        (1..=512).contains(&self.prescaler)
            && (1..=128).contains(&self.sync_jump_width)
            && (1..=256).contains(&self.seg1)
            && (1..=128).contains(&self.seg2)
    }

    /// Quanta per bit, including the sync segment.
    pub fn quanta(&self) -> u32 {
        1 + u32::from(self.seg1) + u32::from(self.seg2)
    }

    pub fn bit_rate(&self, kernel_clock_hz: u32) -> u32 {
        kernel_clock_hz / (u32::from(self.prescaler) * self.quanta())
    }

    /// Sample point position in thousandths of the bit time.
    pub fn sample_point_permille(&self) -> u32 {
        (1 + u32::from(self.seg1)) * 1000 / self.quanta()
    }
}

/// Data phase bit timing, in time quanta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DataBitTiming {
    /// Valid range: 1 to 32.
    pub prescaler: u8,
    /// Valid range: 1 to 16.
    pub sync_jump_width: u8,
    /// Valid range: 1 to 32.
    pub seg1: u8,
    /// Valid range: 1 to 16.
    pub seg2: u8,
}

impl DataBitTiming {
    pub fn is_valid(&self) -> bool {
        (1..=32).contains(&self.prescaler)
            && (1..=16).contains(&self.sync_jump_width)
            && (1..=32).contains(&self.seg1)
            && (1..=16).contains(&self.seg2)
    }

    pub fn quanta(&self) -> u32 {
        1 + u32::from(self.seg1) + u32::from(self.seg2)
    }

    pub fn bit_rate(&self, kernel_clock_hz: u32) -> u32 {
        kernel_clock_hz / (u32::from(self.prescaler) * self.quanta())
    }

    pub fn sample_point_permille(&self) -> u32 {
        (1 + u32::from(self.seg1)) * 1000 / self.quanta()
    }
}

/// Peripheral initialization record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Init {
    pub clock_divider: ClockDivider,
    pub frame_format: FrameFormat,
    pub mode: Mode,
    /// Let the hardware retry frames that lost arbitration or saw errors.
    pub auto_retransmission: bool,
    /// Pause two bit times between consecutive transmissions.
    pub transmit_pause: bool,
    /// Protocol exception handling on receipt of a reserved FD bit.
    pub protocol_exception: bool,
    pub nominal_bit_timing: NominalBitTiming,
    pub data_bit_timing: DataBitTiming,
    /// Number of standard filter elements, up to 28.
    pub standard_filters: u8,
    /// Number of extended filter elements, up to 8.
    pub extended_filters: u8,
    pub tx_queue_mode: TxQueueMode,
}

impl Init {
    pub fn is_valid(&self) -> bool {
        self.nominal_bit_timing.is_valid()
            && self.data_bit_timing.is_valid()
            && self.standard_filters <= 28
            && self.extended_filters <= 8
    }

    /// CCCR contents for configuration mode, with INIT and CCE set.
    pub fn cccr(&self) -> Cccr {
        let fd = self.frame_format != FrameFormat::Classic;
        let loopback = matches!(self.mode, Mode::InternalLoopback | Mode::ExternalLoopback);
        Cccr::new()
            .with_init(true)
            .with_cce(true)
            .with_asm(self.mode == Mode::Restricted)
            .with_mon(matches!(self.mode, Mode::BusMonitoring | Mode::InternalLoopback))
            .with_test(loopback)
            .with_dar(!self.auto_retransmission)
            .with_fdoe(fd)
            .with_brse(self.frame_format == FrameFormat::FdBrs)
            .with_pxhd(!self.protocol_exception)
            .with_txp(self.transmit_pause)
    }

    /// Only meaningful when [`Init::is_valid`] holds.
    pub fn nbtp(&self) -> Nbtp {
        let t = &self.nominal_bit_timing;
        Nbtp::new()
            .with_nbrp(t.prescaler - 1)
            .with_nsjw(t.sync_jump_width - 1)
            .with_ntseg1((t.seg1 - 1) as u8)
            .with_ntseg2(t.seg2 - 1)
    }

    /// Only meaningful when [`Init::is_valid`] holds.
    pub fn dbtp(&self) -> Dbtp {
        let t = &self.data_bit_timing;
        Dbtp::new()
            .with_dbrp(t.prescaler - 1)
            .with_dsjw(t.sync_jump_width - 1)
            .with_dtseg1(t.seg1 - 1)
            .with_dtseg2(t.seg2 - 1)
    }
}
