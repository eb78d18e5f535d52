use core::fmt::Debug;

use embedded_hal::can::{Error as CanError, ErrorKind};

pub type Result<T, E> = core::result::Result<T, Error<E>>;

/// Driver errors. `E` is the peripheral's own error type.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E: Debug> {
    /// TX and RX pins do not both route to this peripheral instance.
    PinMapping,
    /// Bit timing or filter counts outside the hardware ranges.
    InvalidBitTiming,
    /// Peripheral rejected the initialization parameters.
    Init(E),
    /// Failed to program the acceptance filter.
    Filter(E),
    /// Failed to program the global filter policy.
    GlobalFilter(E),
    /// Peripheral did not leave configuration mode.
    Start(E),
    /// Failed to enable the receive notification.
    Notification(E),
    /// Payload longer than 64 bytes.
    PayloadTooLong(usize),
    /// Only standard identifiers are transmitted.
    ExtendedId,
    /// TX FIFO full, or the descriptor was rejected.
    TxSubmit(E),
    /// Failed to read from the RX FIFO.
    Receive(E),
}

impl<E: Debug> CanError for Error<E> {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}
