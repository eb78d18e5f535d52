//! Test doubles: an in-memory FDCAN peripheral and a board pin map.
#![allow(dead_code)]

use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use embedded_hal::can::{Id, StandardId};
use fdcan_bus::{
    config::Init,
    filter::{FilterElementConfig, GlobalFilter, NonMatchingFrames, StandardFilterElement},
    regs::{Interrupts, RxElementHeader, TxBuffers, TxElementHeader},
    DataLength, FdCan, Instance, Options, PanicHalt, PinMap, PinRole, RxFifo,
};

pub const TX_SLOTS: usize = 3;
pub const RX_FIFO_DEPTH: usize = 3;

/// FDCAN1 routing on the board.
pub const P_TX: u8 = 12;
pub const P_RX: u8 = 11;
/// FDCAN2 routing on the board.
pub const P_TX2: u8 = 6;
pub const P_RX2: u8 = 5;

/// Hardware call that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Init,
    Filter,
    GlobalFilter,
    Start,
    Notification,
    Submit,
    Abort,
    Receive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError(pub Step);

/// Every hardware call, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    EnableClock,
    Init(Init),
    StandardFilter(u8, StandardFilterElement),
    GlobalFilter(GlobalFilter),
    Start,
    Notification(Interrupts, u8),
    Submit(TxElementHeader, Vec<u8>),
    Abort(TxBuffers),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Queued {
    pub header: TxElementHeader,
    pub data: Vec<u8>,
}

const RESET_GLOBAL_FILTER: GlobalFilter = GlobalFilter {
    non_matching_standard: NonMatchingFrames::AcceptInFifo0,
    non_matching_extended: NonMatchingFrames::AcceptInFifo0,
    reject_remote_standard: false,
    reject_remote_extended: false,
};

#[derive(Default)]
pub struct SimState {
    pub calls: Vec<Call>,
    pub fail: Option<Step>,
    pub clock: bool,
    pub init: Option<Init>,
    pub started: bool,
    pub standard_filters: Vec<(u8, StandardFilterElement)>,
    pub global_filter: Option<GlobalFilter>,
    pub notification: Option<(Interrupts, u8)>,
    slots: [Option<Queued>; TX_SLOTS],
    /// Slot indices in submission order, for FIFO completion.
    order: VecDeque<usize>,
    put_index: usize,
    latest: Option<TxBuffers>,
    pub transmitted: Vec<Queued>,
    pub cancelled: Vec<Queued>,
    pub rx_fifo0: VecDeque<(RxElementHeader, Vec<u8>)>,
    pub lost: usize,
    timestamp: u16,
}

impl SimState {
    fn check(&self, step: Step) -> Result<(), SimError> {
        if self.fail == Some(step) {
            Err(SimError(step))
        } else {
            Ok(())
        }
    }

    fn configurable(&self, step: Step) -> Result<(), SimError> {
        self.check(step)?;
        if self.clock && self.init.is_some() && !self.started {
            Ok(())
        } else {
            Err(SimError(step))
        }
    }

    fn pending(&self) -> TxBuffers {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.is_some())
            .fold(TxBuffers::empty(), |acc, (i, _)| {
                acc | TxBuffers::slot(i as u8).unwrap()
            })
    }

    fn store(&mut self, id: Id, remote: bool, data: &[u8], filter: Option<u8>) -> bool {
        if self.rx_fifo0.len() >= RX_FIFO_DEPTH {
            self.lost += 1;
            return false;
        }
        let dlc = DataLength::round_up(data.len()).unwrap();
        let mut payload = data.to_vec();
        payload.resize(dlc.len(), 0);

        let header = match id {
            Id::Standard(id) => RxElementHeader::new().with_standard_id(id),
            Id::Extended(id) => RxElementHeader::new().with_xtd(true).with_id(id.as_raw()),
        };
        let header = header
            .with_rtr(remote)
            .with_dlc(dlc.code())
            .with_brs(true)
            .with_fdf(true)
            .with_rxts(self.timestamp)
            .with_fidx(filter.unwrap_or(0))
            .with_anmf(filter.is_none());
        self.timestamp = self.timestamp.wrapping_add(1);
        self.rx_fifo0.push_back((header, payload));
        true
    }

    fn accept_non_matching(&mut self, policy: NonMatchingFrames, id: Id, remote: bool, data: &[u8]) -> bool {
        match policy {
            NonMatchingFrames::AcceptInFifo0 => self.store(id, remote, data, None),
            NonMatchingFrames::AcceptInFifo1 | NonMatchingFrames::Reject => false,
        }
    }
}

/// Shared view of the simulated peripheral, kept by the test after the
/// [`SimFdcan`] has moved into the driver.
#[derive(Clone)]
pub struct SimHandle(Rc<RefCell<SimState>>);

impl SimHandle {
    pub fn state(&self) -> std::cell::Ref<'_, SimState> {
        self.0.borrow()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.borrow().calls.clone()
    }

    pub fn fail_at(&self, step: Step) {
        self.0.borrow_mut().fail = Some(step);
    }

    pub fn clear_failure(&self) {
        self.0.borrow_mut().fail = None;
    }

    /// Sends every queued frame onto the bus, oldest first.
    pub fn complete_transmissions(&self) {
        let mut st = self.0.borrow_mut();
        while let Some(i) = st.order.pop_front() {
            if let Some(frame) = st.slots[i].take() {
                st.transmitted.push(frame);
            }
        }
    }

    /// A frame arrives from the bus. Returns whether it landed in RX FIFO 0.
    pub fn deliver(&self, id: impl Into<Id>, remote: bool, data: &[u8]) -> bool {
        let id = id.into();
        let mut st = self.0.borrow_mut();
        if !st.started {
            return false;
        }
        let global = st.global_filter.unwrap_or(RESET_GLOBAL_FILTER);

        match id {
            Id::Standard(std_id) => {
                if remote && global.reject_remote_standard {
                    return false;
                }
                let active = usize::from(st.init.map_or(0, |init| init.standard_filters));
                let mut filters = st.standard_filters.clone();
                filters.sort_by_key(|(index, _)| *index);
                for (index, elem) in filters.into_iter().filter(|(i, _)| usize::from(*i) < active) {
                    if !elem.matches(std_id) {
                        continue;
                    }
                    match elem.sfec_or_err() {
                        Ok(FilterElementConfig::Disable) => continue,
                        Ok(FilterElementConfig::StoreInFifo0)
                        | Ok(FilterElementConfig::SetPriorityAndStoreInFifo0) => {
                            return st.store(id, remote, data, Some(index));
                        }
                        _ => return false,
                    }
                }
                st.accept_non_matching(global.non_matching_standard, id, remote, data)
            }
            Id::Extended(_) => {
                if remote && global.reject_remote_extended {
                    return false;
                }
                st.accept_non_matching(global.non_matching_extended, id, remote, data)
            }
        }
    }
}

/// In-memory FDCAN peripheral with a 3-slot TX FIFO and a 3-element RX FIFO 0.
pub struct SimFdcan {
    index: u8,
    state: Rc<RefCell<SimState>>,
}

impl SimFdcan {
    pub fn new(index: u8) -> (Self, SimHandle) {
        let state = Rc::new(RefCell::new(SimState::default()));
        (
            Self {
                index,
                state: state.clone(),
            },
            SimHandle(state),
        )
    }
}

// SAFETY: each `SimFdcan` owns its own simulated state.
unsafe impl Instance for SimFdcan {
    type Error = SimError;

    fn index(&self) -> u8 {
        self.index
    }

    fn enable_clock(&mut self) {
        let mut st = self.state.borrow_mut();
        st.calls.push(Call::EnableClock);
        st.clock = true;
    }

    fn init(&mut self, init: &Init) -> Result<(), SimError> {
        let mut st = self.state.borrow_mut();
        st.calls.push(Call::Init(*init));
        st.check(Step::Init)?;
        if !st.clock {
            return Err(SimError(Step::Init));
        }
        st.init = Some(*init);
        Ok(())
    }

    fn configure_standard_filter(
        &mut self,
        index: u8,
        element: StandardFilterElement,
    ) -> Result<(), SimError> {
        let mut st = self.state.borrow_mut();
        st.calls.push(Call::StandardFilter(index, element));
        st.configurable(Step::Filter)?;
        st.standard_filters.retain(|(i, _)| *i != index);
        st.standard_filters.push((index, element));
        Ok(())
    }

    fn configure_global_filter(&mut self, filter: GlobalFilter) -> Result<(), SimError> {
        let mut st = self.state.borrow_mut();
        st.calls.push(Call::GlobalFilter(filter));
        st.configurable(Step::GlobalFilter)?;
        st.global_filter = Some(filter);
        Ok(())
    }

    fn start(&mut self) -> Result<(), SimError> {
        let mut st = self.state.borrow_mut();
        st.calls.push(Call::Start);
        st.configurable(Step::Start)?;
        st.started = true;
        Ok(())
    }

    fn activate_notification(&mut self, interrupts: Interrupts, priority: u8) -> Result<(), SimError> {
        let mut st = self.state.borrow_mut();
        st.calls.push(Call::Notification(interrupts, priority));
        st.check(Step::Notification)?;
        st.notification = Some((interrupts, priority));
        Ok(())
    }

    fn add_to_tx_fifo_queue(&mut self, header: TxElementHeader, data: &[u8]) -> Result<(), SimError> {
        let mut st = self.state.borrow_mut();
        st.calls.push(Call::Submit(header, data.to_vec()));
        st.check(Step::Submit)?;
        if !st.started || DataLength::from_code(header.dlc()).len() != data.len() {
            return Err(SimError(Step::Submit));
        }
        let free = (0..TX_SLOTS)
            .map(|offset| (st.put_index + offset) % TX_SLOTS)
            .find(|&i| st.slots[i].is_none())
            .ok_or(SimError(Step::Submit))?;
        st.slots[free] = Some(Queued {
            header,
            data: data.to_vec(),
        });
        st.order.push_back(free);
        st.put_index = (free + 1) % TX_SLOTS;
        st.latest = TxBuffers::slot(free as u8);
        Ok(())
    }

    fn latest_tx_request(&self) -> TxBuffers {
        self.state.borrow().latest.unwrap_or(TxBuffers::empty())
    }

    fn pending_tx_requests(&self) -> TxBuffers {
        self.state.borrow().pending()
    }

    fn abort_tx_request(&mut self, buffers: TxBuffers) -> Result<(), SimError> {
        let mut st = self.state.borrow_mut();
        st.calls.push(Call::Abort(buffers));
        st.check(Step::Abort)?;
        for i in 0..TX_SLOTS {
            if buffers.contains(TxBuffers::slot(i as u8).unwrap()) {
                if let Some(frame) = st.slots[i].take() {
                    st.order.retain(|&queued| queued != i);
                    st.cancelled.push(frame);
                }
            }
        }
        Ok(())
    }

    fn rx_message(
        &mut self,
        fifo: RxFifo,
        data: &mut [u8],
    ) -> nb::Result<RxElementHeader, SimError> {
        let mut st = self.state.borrow_mut();
        st.check(Step::Receive).map_err(nb::Error::Other)?;
        if fifo != RxFifo::Fifo0 {
            return Err(nb::Error::WouldBlock);
        }
        let (header, payload) = st.rx_fifo0.pop_front().ok_or(nb::Error::WouldBlock)?;
        data[..payload.len()].copy_from_slice(&payload);
        Ok(header)
    }
}

/// Board pin map: FDCAN1 on pins 12/11, FDCAN2 on pins 6/5.
#[derive(Default)]
pub struct SimPins {
    pub routed: Vec<(u8, PinRole)>,
}

impl PinMap for SimPins {
    type Pin = u8;

    fn peripheral(&self, pin: u8, role: PinRole) -> Option<u8> {
        match (pin, role) {
            (P_TX, PinRole::Transmit) | (P_RX, PinRole::Receive) => Some(1),
            (P_TX2, PinRole::Transmit) | (P_RX2, PinRole::Receive) => Some(2),
            _ => None,
        }
    }

    fn pinout(&mut self, pin: u8, role: PinRole) {
        self.routed.push((pin, role));
    }
}

pub fn std_id(raw: u16) -> StandardId {
    StandardId::new(raw).unwrap()
}

/// FDCAN1 brought up on its default pins.
pub fn bring_up() -> (FdCan<SimFdcan, PanicHalt>, SimHandle) {
    let (can, sim) = SimFdcan::new(1);
    let mut pins = SimPins::default();
    let driver = FdCan::new(can, PanicHalt, &mut pins, &Options { tx: P_TX, rx: P_RX });
    (driver, sim)
}
