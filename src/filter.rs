//! Acceptance filtering: standard filter elements and the global filter
//! configuration.

use embedded_hal::can::StandardId;
use modular_bitfield::prelude::*;

/// How SFID1 and SFID2 of a filter element are interpreted.
#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 2]
pub enum FilterType {
    /// Range from SFID1 to SFID2.
    Range = 0b00,
    /// Dual ID filter for SFID1 or SFID2.
    Dual = 0b01,
    /// Classic filter: SFID1 is the filter, SFID2 the mask.
    Classic = 0b10,
    /// Filter element disabled.
    Disabled = 0b11,
}

/// Action taken when a frame matches a filter element.
#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 3]
pub enum FilterElementConfig {
    Disable = 0b000,
    StoreInFifo0 = 0b001,
    StoreInFifo1 = 0b010,
    Reject = 0b011,
    SetPriority = 0b100,
    SetPriorityAndStoreInFifo0 = 0b101,
    SetPriorityAndStoreInFifo1 = 0b110,
    /// Not used on this peripheral.
    Unused = 0b111,
}

/// Standard filter element (word S0).
#[bitfield]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandardFilterElement {
    pub sfid2: B11,
    #[skip]
    __: B5,
    pub sfid1: B11,
    pub sfec: FilterElementConfig,
    pub sft: FilterType,
}

impl StandardFilterElement {
    /// Classic mask filter: accepts identifiers where `id & mask == base & mask`.
    pub fn classic(base: StandardId, mask: StandardId, config: FilterElementConfig) -> Self {
        Self::new()
            .with_sft(FilterType::Classic)
            .with_sfec(config)
            .with_sfid1(base.as_raw())
            .with_sfid2(mask.as_raw())
    }

    /// Whether `id` is accepted by this element, ignoring its action.
    pub fn matches(&self, id: StandardId) -> bool {
        let id = id.as_raw();
        let (id1, id2) = (self.sfid1(), self.sfid2());
        match self.sft_or_err() {
            Ok(FilterType::Range) => (id1..=id2).contains(&id),
            Ok(FilterType::Dual) => id == id1 || id == id2,
            Ok(FilterType::Classic) => id & id2 == id1 & id2,
            Ok(FilterType::Disabled) | Err(_) => false,
        }
    }
}

/// Treatment of frames that match no filter element.
#[derive(BitfieldSpecifier, Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[bits = 2]
pub enum NonMatchingFrames {
    AcceptInFifo0 = 0b00,
    AcceptInFifo1 = 0b01,
    Reject = 0b10,
}

/// Global filter configuration register.
#[bitfield]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rxgfc {
    /// Reject remote frames with extended ID.
    pub rrfe: bool,
    /// Reject remote frames with standard ID.
    pub rrfs: bool,
    pub anfe: NonMatchingFrames,
    pub anfs: NonMatchingFrames,
    #[skip]
    __: B2,
    /// FIFO 1 overwrite mode.
    pub f1om: bool,
    /// FIFO 0 overwrite mode.
    pub f0om: bool,
    #[skip]
    __: B6,
    /// Number of standard filter elements.
    pub lss: B5,
    #[skip]
    __: B3,
    /// Number of extended filter elements.
    pub lse: B4,
    #[skip]
    __: B4,
}

/// Policy for frames not claimed by any filter element, and for remote
/// frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GlobalFilter {
    pub non_matching_standard: NonMatchingFrames,
    pub non_matching_extended: NonMatchingFrames,
    pub reject_remote_standard: bool,
    pub reject_remote_extended: bool,
}

impl GlobalFilter {
    /// Drop everything a filter element did not accept, and every remote frame.
    pub const REJECT_ALL: Self = Self {
        non_matching_standard: NonMatchingFrames::Reject,
        non_matching_extended: NonMatchingFrames::Reject,
        reject_remote_standard: true,
        reject_remote_extended: true,
    };

    /// Writes this policy into `rxgfc`, leaving list sizes and FIFO modes alone.
    pub fn apply(&self, rxgfc: Rxgfc) -> Rxgfc {
        rxgfc
            .with_anfs(self.non_matching_standard)
            .with_anfe(self.non_matching_extended)
            .with_rrfs(self.reject_remote_standard)
            .with_rrfe(self.reject_remote_extended)
    }
}
