//! Frame descriptors exchanged with the peripheral.

use embedded_hal::can::{Frame, Id, StandardId};

use crate::regs::{RxElementHeader, TxElementHeader};

/// Largest CAN-FD payload, in bytes.
pub const MAX_PAYLOAD: usize = 64;

/// Data length codes. Payloads past 8 bytes only come in the bucket sizes
/// below.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataLength {
    Bytes0 = 0,
    Bytes1 = 1,
    Bytes2 = 2,
    Bytes3 = 3,
    Bytes4 = 4,
    Bytes5 = 5,
    Bytes6 = 6,
    Bytes7 = 7,
    Bytes8 = 8,
    Bytes12 = 9,
    Bytes16 = 10,
    Bytes20 = 11,
    Bytes24 = 12,
    Bytes32 = 13,
    Bytes48 = 14,
    Bytes64 = 15,
}

impl DataLength {
    /// Smallest length code that holds `len` bytes, or `None` past 64.
    pub const fn round_up(len: usize) -> Option<Self> {
        Some(match len {
            0 => Self::Bytes0,
            1 => Self::Bytes1,
            2 => Self::Bytes2,
            3 => Self::Bytes3,
            4 => Self::Bytes4,
            5 => Self::Bytes5,
            6 => Self::Bytes6,
            7 => Self::Bytes7,
            8 => Self::Bytes8,
            9..=12 => Self::Bytes12,
            13..=16 => Self::Bytes16,
            17..=20 => Self::Bytes20,
            21..=24 => Self::Bytes24,
            25..=32 => Self::Bytes32,
            33..=48 => Self::Bytes48,
            49..=64 => Self::Bytes64,
            _ => return None,
        })
    }

    /// Decodes a 4-bit DLC field. Upper bits are ignored.
    pub const fn from_code(code: u8) -> Self {
        match code & 0x0F {
            0 => Self::Bytes0,
            1 => Self::Bytes1,
            2 => Self::Bytes2,
            3 => Self::Bytes3,
            4 => Self::Bytes4,
            5 => Self::Bytes5,
            6 => Self::Bytes6,
            7 => Self::Bytes7,
            8 => Self::Bytes8,
            9 => Self::Bytes12,
            10 => Self::Bytes16,
            11 => Self::Bytes20,
            12 => Self::Bytes24,
            13 => Self::Bytes32,
            14 => Self::Bytes48,
            _ => Self::Bytes64,
        }
    }

    pub const fn code(self) -> u8 {
        self as u8
    }

    /// Payload size in bytes.
    pub const fn len(self) -> usize {
        match self {
            Self::Bytes12 => 12,
            Self::Bytes16 => 16,
            Self::Bytes20 => 20,
            Self::Bytes24 => 24,
            Self::Bytes32 => 32,
            Self::Bytes48 => 48,
            Self::Bytes64 => 64,
            other => other as usize,
        }
    }

    pub const fn is_empty(self) -> bool {
        matches!(self, Self::Bytes0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameType {
    Data,
    Remote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ErrorStateIndicator {
    /// Transmitting node is error active.
    Active,
    /// Transmitting node is error passive.
    Passive,
}

/// Transmit descriptor for one outbound frame. Only standard identifiers
/// are sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxHeader {
    pub identifier: StandardId,
    pub frame_type: FrameType,
    pub data_length: DataLength,
    pub error_state: ErrorStateIndicator,
    pub bit_rate_switch: bool,
    pub fd_format: bool,
    /// Record the transmission in the TX event FIFO.
    pub tx_event: bool,
    pub message_marker: u8,
}

impl TxHeader {
    /// FD data frame with bit rate switching, no TX event and marker 0.
    pub fn fd_data(identifier: StandardId, data_length: DataLength) -> Self {
        Self {
            identifier,
            frame_type: FrameType::Data,
            data_length,
            error_state: ErrorStateIndicator::Active,
            bit_rate_switch: true,
            fd_format: true,
            tx_event: false,
            message_marker: 0,
        }
    }

    pub fn to_element(&self) -> TxElementHeader {
        TxElementHeader::new()
            .with_standard_id(self.identifier)
            .with_rtr(self.frame_type == FrameType::Remote)
            .with_esi(self.error_state == ErrorStateIndicator::Passive)
            .with_dlc(self.data_length.code())
            .with_brs(self.bit_rate_switch)
            .with_fdf(self.fd_format)
            .with_efc(self.tx_event)
            .with_mm(self.message_marker)
    }
}

/// Metadata the peripheral reports alongside a received payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RxHeader {
    pub identifier: Id,
    pub frame_type: FrameType,
    pub data_length: DataLength,
    pub error_state: ErrorStateIndicator,
    pub bit_rate_switch: bool,
    pub fd_format: bool,
    /// Timestamp counter value at start of frame.
    pub timestamp: u16,
    /// Filter element that accepted the frame. `None` when the frame was
    /// accepted by the global non-matching policy.
    pub filter_index: Option<u8>,
}

impl RxHeader {
    pub fn from_element(elem: &RxElementHeader) -> Self {
        Self {
            identifier: elem.identifier(),
            frame_type: if elem.rtr() {
                FrameType::Remote
            } else {
                FrameType::Data
            },
            data_length: DataLength::from_code(elem.dlc()),
            error_state: if elem.esi() {
                ErrorStateIndicator::Passive
            } else {
                ErrorStateIndicator::Active
            },
            bit_rate_switch: elem.brs(),
            fd_format: elem.fdf(),
            timestamp: elem.rxts(),
            filter_index: (!elem.anmf()).then(|| elem.fidx()),
        }
    }
}

impl Default for RxHeader {
    fn default() -> Self {
        Self {
            identifier: Id::Standard(StandardId::ZERO),
            frame_type: FrameType::Data,
            data_length: DataLength::Bytes0,
            error_state: ErrorStateIndicator::Active,
            bit_rate_switch: false,
            fd_format: false,
            timestamp: 0,
            filter_index: None,
        }
    }
}

/// Owned data frame of up to 64 bytes, for use through the `embedded-hal`
/// CAN traits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FdFrame {
    id: Id,
    len: u8,
    data: [u8; MAX_PAYLOAD],
}

impl FdFrame {
    /// Builds a frame from a received header and the payload buffer it was
    /// read into.
    pub fn from_rx(header: &RxHeader, data: &[u8; MAX_PAYLOAD]) -> Self {
        Self {
            id: header.identifier,
            len: header.data_length.len() as u8,
            data: *data,
        }
    }

    pub fn standard_id(&self) -> Option<StandardId> {
        match self.id {
            Id::Standard(id) => Some(id),
            Id::Extended(_) => None,
        }
    }
}

impl Frame for FdFrame {
    /// Only standard identifiers can be transmitted; extended ones yield `None`.
    fn new(id: impl Into<Id>, data: &[u8]) -> Option<Self> {
        let id = id.into();
        if matches!(id, Id::Extended(_)) || data.len() > MAX_PAYLOAD {
            return None;
        }
        let mut frame = Self {
            id,
            len: data.len() as u8,
            data: [0; MAX_PAYLOAD],
        };
        frame.data[..data.len()].copy_from_slice(data);
        Some(frame)
    }

    /// Remote frames are not supported.
    fn new_remote(_id: impl Into<Id>, _dlc: usize) -> Option<Self> {
        None
    }

    fn is_extended(&self) -> bool {
        matches!(self.id, Id::Extended(_))
    }

    fn is_remote_frame(&self) -> bool {
        false
    }

    fn id(&self) -> Id {
        self.id
    }

    fn dlc(&self) -> usize {
        usize::from(self.len)
    }

    fn data(&self) -> &[u8] {
        &self.data[..usize::from(self.len)]
    }
}
