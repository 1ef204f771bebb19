//! Mixer control surface and the reconciliation engine driving it.
//!
//! [`Mixer`] is the seam to the codec's control interface: named controls,
//! each with one or more value slots, switches and volumes as integers and
//! muxes as enumerations. The engine never assumes a lookup or a write
//! succeeds.

pub mod control;
pub mod reconcile;
pub mod soft;
pub mod tables;

pub use control::{ControlValue, MixerControl};
pub use reconcile::{ControlStatus, Convergence, MixerPath, MixerReconciler};
pub use soft::{MixerJournal, MixerWrite, SoftMixer};

/// Opaque handle to a control resolved on a [`Mixer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CtlId(pub(crate) u32);

impl CtlId {
    /// Numeric id of the control on its mixer.
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Value type of a control.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlType {
    /// On/off switch.
    Bool,
    /// Integer level.
    Int,
    /// Enumerated choice, values are indices into the enum strings.
    Enum,
    /// Raw bytes.
    Byte,
    /// Type the surface could not determine.
    Unknown,
}

/// Failures reported by a mixer control surface.
#[derive(thiserror::Error, Debug)]
pub enum MixerError {
    /// The mixer device could not be opened.
    #[error("cannot open mixer on card {0}")]
    Open(u32),
    /// The control id does not name a control on this mixer.
    #[error("unknown mixer ctl id {0}")]
    UnknownCtl(u32),
    /// The value slot is beyond the control's value count.
    #[error("mixer ctl '{name}' has no value slot {index}")]
    ValueIndex {
        /// Control name.
        name: String,
        /// Requested slot.
        index: usize,
    },
    /// The value is outside what the control accepts.
    #[error("mixer ctl '{name}' rejected value {value}")]
    ValueRange {
        /// Control name.
        name: String,
        /// Rejected value.
        value: i32,
    },
}

/// Control surface of an audio codec.
pub trait Mixer: Send {
    /// Look a control up by its exact name.
    fn ctl_by_name(&mut self, name: &str) -> Option<CtlId>;
    /// Name of a resolved control.
    fn ctl_name(&self, ctl: CtlId) -> Option<&str>;
    /// Value type of a control.
    fn ctl_type(&self, ctl: CtlId) -> ControlType;
    /// Number of independently settable value slots.
    fn num_values(&self, ctl: CtlId) -> usize;
    /// Number of enum strings of an enumerated control.
    fn num_enums(&self, ctl: CtlId) -> usize;
    /// Enum string at `index`.
    fn enum_string(&self, ctl: CtlId, index: usize) -> Option<&str>;
    /// Read one value slot.
    fn get_value(&self, ctl: CtlId, index: usize) -> Result<i32, MixerError>;
    /// Write one value slot.
    fn set_value(&mut self, ctl: CtlId, index: usize, value: i32) -> Result<(), MixerError>;
}
