//! Hardware access seam.

use core::fmt::Debug;

use crate::{
    config::Init,
    filter::{GlobalFilter, StandardFilterElement},
    regs::{Interrupts, RxElementHeader, TxBuffers, TxElementHeader},
};

/// Receive FIFO selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxFifo {
    Fifo0,
    Fifo1,
}

/// One FDCAN peripheral.
///
/// # Safety
///
/// There must be exactly one value per hardware instance, and it must not
/// be `Clone`. The driver takes ownership of the value for good and writes
/// the peripheral's registers without synchronization.
pub unsafe trait Instance {
    type Error: Debug;

    /// Instance number, as reported by [`PinMap`](crate::pins::PinMap).
    fn index(&self) -> u8;

    fn enable_clock(&mut self);

    /// Enters configuration mode and applies `init`. Leaves the peripheral in
    /// configuration mode.
    fn init(&mut self, init: &Init) -> Result<(), Self::Error>;

    fn configure_standard_filter(
        &mut self,
        index: u8,
        element: StandardFilterElement,
    ) -> Result<(), Self::Error>;

    fn configure_global_filter(&mut self, filter: GlobalFilter) -> Result<(), Self::Error>;

    /// Leaves configuration mode and joins the bus.
    fn start(&mut self) -> Result<(), Self::Error>;

    fn activate_notification(
        &mut self,
        interrupts: Interrupts,
        priority: u8,
    ) -> Result<(), Self::Error>;

    /// Queues one frame. `data` is exactly as long as the header's DLC.
    fn add_to_tx_fifo_queue(
        &mut self,
        header: TxElementHeader,
        data: &[u8],
    ) -> Result<(), Self::Error>;

    /// Buffer used by the most recent [`Instance::add_to_tx_fifo_queue`].
    fn latest_tx_request(&self) -> TxBuffers;

    /// Buffers with a transmission request still pending.
    fn pending_tx_requests(&self) -> TxBuffers;

    /// Requests cancellation of `buffers`. Buffers that already finished are
    /// left alone.
    fn abort_tx_request(&mut self, buffers: TxBuffers) -> Result<(), Self::Error>;

    /// Pops the oldest element of `fifo`, copying its payload into `data`.
    /// Returns `WouldBlock` when the FIFO is empty, without touching `data`.
    fn rx_message(
        &mut self,
        fifo: RxFifo,
        data: &mut [u8],
    ) -> nb::Result<RxElementHeader, Self::Error>;
}

/// Unrecoverable fault handler. Never returns.
pub trait Halt {
    fn halt(&mut self, fault: &dyn Debug) -> !;
}

/// Halts by panicking, leaving the rest to the panic handler.
#[derive(Debug, Default, Clone, Copy)]
pub struct PanicHalt;

impl Halt for PanicHalt {
    fn halt(&mut self, fault: &dyn Debug) -> ! {
        panic!("fdcan fault: {:?}", fault)
    }
}
