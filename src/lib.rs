//! Driver for the FDCAN bus peripheral.
//!
//! The driver brings the peripheral up once, in CAN-FD mode with bit rate
//! switching, then offers two operations to whichever context owns the bus:
//!
//! * [`FdCan::send`] queues one frame, first aborting the previous one if it
//!   is still waiting. At most one frame is meaningfully pending; a caller
//!   that sends faster than the bus drains loses the superseded frames.
//! * [`FdCan::poll`] takes at most one frame out of RX FIFO 0 and never
//!   blocks.
//!
//! Hardware access goes through [`Instance`], pin routing through
//! [`PinMap`], and unrecoverable faults through [`Halt`]. The `try_*`
//! variants return the fault instead of halting.
#![no_std]

// This mod MUST go first, so that the others see its macros.
#[macro_use]
pub(crate) mod fmt;

pub mod config;
pub mod error;
pub mod filter;
pub mod frame;
pub mod instance;
pub mod pins;
pub mod regs;

use embedded_hal::can::{nb::Can, StandardId};

pub use crate::{
    error::{Error, Result},
    frame::{DataLength, FdFrame, RxHeader, TxHeader, MAX_PAYLOAD},
    instance::{Halt, Instance, PanicHalt, RxFifo},
    pins::{Options, PinMap, PinRole},
    regs::{Interrupts, TxBuffers},
};

use crate::filter::{FilterElementConfig, GlobalFilter, StandardFilterElement};

/// FDCAN bus driver.
///
/// Owns its peripheral for the rest of the program. Not `Sync` in any useful
/// sense: calls must come from a single context, or be serialized by the
/// caller.
pub struct FdCan<I, H> {
    can: I,
    halt: H,
    /// Most recently queued TX buffer. Not cleared on completion, so a later
    /// send may abort a slot that has already gone out, which is harmless.
    last_tx_request: Option<TxBuffers>,
}

impl<I, H> FdCan<I, H>
where
    I: Instance,
    H: Halt,
{
    /// Brings the bus up. Any failure is handed to `halt`.
    ///
    /// # Parameters
    ///
    /// * `can` - The peripheral instance.
    /// * `halt` - Fault handler, also used by [`FdCan::send`].
    /// * `pins` - Board pin map.
    /// * `options` - TX and RX pins.
    pub fn new<M: PinMap>(mut can: I, mut halt: H, pins: &mut M, options: &Options<M::Pin>) -> Self {
        if let Err(err) = Self::bring_up(&mut can, pins, options) {
            error!("fdcan: bring-up failed");
            halt.halt(&err);
        }
        Self {
            can,
            halt,
            last_tx_request: None,
        }
    }

    /// Brings the bus up, returning the first failure.
    pub fn try_new<M: PinMap>(
        mut can: I,
        halt: H,
        pins: &mut M,
        options: &Options<M::Pin>,
    ) -> Result<Self, I::Error> {
        Self::bring_up(&mut can, pins, options)?;
        Ok(Self {
            can,
            halt,
            last_tx_request: None,
        })
    }

    fn bring_up<M: PinMap>(
        can: &mut I,
        pins: &mut M,
        options: &Options<M::Pin>,
    ) -> Result<(), I::Error> {
        can.enable_clock();

        let tx = pins.peripheral(options.tx, PinRole::Transmit);
        let rx = pins.peripheral(options.rx, PinRole::Receive);
        if pins::merge(tx, rx) != Some(can.index()) {
            return Err(Error::PinMapping);
        }
        pins.pinout(options.tx, PinRole::Transmit);
        pins.pinout(options.rx, PinRole::Receive);
        debug!("fdcan{}: pins routed", can.index());

        if !config::INIT.is_valid() {
            return Err(Error::InvalidBitTiming);
        }
        can.init(&config::INIT).map_err(Error::Init)?;
        debug!("fdcan{}: initialized", can.index());

        let filter = StandardFilterElement::classic(
            unwrap!(StandardId::new(config::FILTER_ID)),
            unwrap!(StandardId::new(config::FILTER_MASK)),
            FilterElementConfig::StoreInFifo0,
        );
        can.configure_standard_filter(0, filter)
            .map_err(Error::Filter)?;
        can.configure_global_filter(GlobalFilter::REJECT_ALL)
            .map_err(Error::GlobalFilter)?;
        debug!("fdcan{}: filters set", can.index());

        can.start().map_err(Error::Start)?;
        can.activate_notification(Interrupts::RX_FIFO0_NEW_MESSAGE, 0)
            .map_err(Error::Notification)?;

        info!("fdcan{}: started", can.index());
        Ok(())
    }

    /// Queues a frame for `id`, replacing any frame still waiting from a
    /// previous call. Halts if the peripheral does not accept it.
    ///
    /// `data` must not exceed 64 bytes.
    pub fn send(&mut self, id: StandardId, data: &[u8]) {
        if let Err(err) = self.try_send(id, data) {
            error!("fdcan: send failed");
            self.halt.halt(&err);
        }
    }

    /// Like [`FdCan::send`], returning the failure instead of halting.
    ///
    /// # Returns
    ///
    /// The TX buffer now holding the frame.
    pub fn try_send(&mut self, id: StandardId, data: &[u8]) -> Result<TxBuffers, I::Error> {
        // Rejected payloads leave the pending frame alone.
        let data_length =
            DataLength::round_up(data.len()).ok_or(Error::PayloadTooLong(data.len()))?;

        if let Some(pending) = self.last_tx_request.take() {
            trace!("fdcan: abort tx request {=u32:#x}", pending.bits());
            if self.can.abort_tx_request(pending).is_err() {
                warn!("fdcan: abort of tx request {=u32:#x} failed", pending.bits());
            }
        }

        let header = TxHeader::fd_data(id, data_length);

        // Bucket sizes past 8 bytes may exceed the payload; pad with zeros.
        let mut payload = [0u8; MAX_PAYLOAD];
        payload[..data.len()].copy_from_slice(data);
        self.can
            .add_to_tx_fifo_queue(header.to_element(), &payload[..data_length.len()])
            .map_err(Error::TxSubmit)?;

        let request = self.can.latest_tx_request();
        self.last_tx_request = Some(request);
        Ok(request)
    }

    /// Token of the last queued frame, if any.
    pub fn pending_request(&self) -> Option<TxBuffers> {
        self.last_tx_request
    }

    /// Whether the last queued frame is still waiting for the bus.
    pub fn is_transmit_pending(&self) -> bool {
        self.last_tx_request
            .map_or(false, |req| self.can.pending_tx_requests().intersects(req))
    }

    /// Takes one frame from RX FIFO 0.
    ///
    /// On success the payload is copied into the front of `data`; on any
    /// error `data` is left untouched.
    pub fn try_receive(
        &mut self,
        data: &mut [u8; MAX_PAYLOAD],
    ) -> nb::Result<RxHeader, Error<I::Error>> {
        let mut scratch = [0u8; MAX_PAYLOAD];
        let elem = self
            .can
            .rx_message(RxFifo::Fifo0, &mut scratch)
            .map_err(|err| err.map(Error::Receive))?;

        let header = RxHeader::from_element(&elem);
        let len = header.data_length.len();
        data[..len].copy_from_slice(&scratch[..len]);
        Ok(header)
    }

    /// Checks RX FIFO 0 for a frame without blocking.
    ///
    /// # Returns
    ///
    /// `true` if a frame was written to `header` and `data`. Both are left
    /// untouched otherwise.
    pub fn poll(&mut self, header: &mut RxHeader, data: &mut [u8; MAX_PAYLOAD]) -> bool {
        match self.try_receive(data) {
            Ok(received) => {
                *header = received;
                true
            }
            Err(nb::Error::WouldBlock) => false,
            Err(nb::Error::Other(_)) => {
                warn!("fdcan: rx fifo read failed");
                false
            }
        }
    }
}

impl<I, H> Can for FdCan<I, H>
where
    I: Instance,
    H: Halt,
{
    type Frame = FdFrame;
    type Error = Error<I::Error>;

    /// Replaces rather than queues, so there is never a displaced frame to
    /// hand back.
    #[inline]
    fn transmit(&mut self, frame: &Self::Frame) -> nb::Result<Option<Self::Frame>, Self::Error> {
        let id = frame
            .standard_id()
            .ok_or(nb::Error::Other(Error::ExtendedId))?;
        self.try_send(id, embedded_hal::can::Frame::data(frame))
            .map(|_| None)
            .map_err(nb::Error::Other)
    }

    #[inline]
    fn receive(&mut self) -> nb::Result<Self::Frame, Self::Error> {
        let mut data = [0u8; MAX_PAYLOAD];
        let header = self.try_receive(&mut data)?;
        Ok(FdFrame::from_rx(&header, &data))
    }
}
