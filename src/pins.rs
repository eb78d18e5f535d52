//! Pin to peripheral routing.

/// Which signal of the peripheral a pin carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PinRole {
    Transmit,
    Receive,
}

/// Board pin map. Resolves logical pins to FDCAN instances and commits the
/// alternate function routing.
pub trait PinMap {
    type Pin: Copy;

    /// FDCAN instance number `pin` can serve in `role`, if any.
    fn peripheral(&self, pin: Self::Pin, role: PinRole) -> Option<u8>;

    /// Routes `pin` to the peripheral for `role`.
    fn pinout(&mut self, pin: Self::Pin, role: PinRole);
}

/// Bus pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Options<P> {
    pub tx: P,
    pub rx: P,
}

/// Instance both lookups agree on.
pub(crate) fn merge(tx: Option<u8>, rx: Option<u8>) -> Option<u8> {
    match (tx, rx) {
        (Some(tx), Some(rx)) if tx == rx => Some(tx),
        _ => None,
    }
}
