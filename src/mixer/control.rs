//! Declarative description of one mixer control and when it applies.

use crate::devices::{AudioDevices, AudioMode, AudioModes};

/// Value written to a control when it is switched on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlValue {
    /// Integer level or switch state.
    Int(i32),
    /// Enum string, resolved to its index on first use.
    Enum(&'static str),
}

/// One entry of a control table.
///
/// Entries are built with the `const` builder methods so tables can live in
/// `static` data:
///
/// ```
/// use aries_audio_hw::devices::{AudioDevices, AudioModes};
/// use aries_audio_hw::mixer::MixerControl;
///
/// const SPEAKER: MixerControl = MixerControl::int("Speaker Switch", 1)
///     .modes(AudioModes::ALL)
///     .devices(AudioDevices::OUT_SPEAKER)
///     .keep(AudioModes::IN_CALL);
/// assert!(!SPEAKER.one_time);
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MixerControl {
    /// Control name on the codec.
    pub name: &'static str,
    /// Value written when on; off always writes zero.
    pub value: ControlValue,
    /// Modes in which the control is relevant.
    pub modes: AudioModes,
    /// Devices for which the control is relevant.
    pub devices: AudioDevices,
    /// Devices that force the control off while active.
    pub excluded_devices: AudioDevices,
    /// Modes in which the control stays on while its path is idle.
    pub keep_modes: AudioModes,
    /// Written once on its first rising edge and never reverted.
    pub one_time: bool,
}

impl MixerControl {
    /// Control set to an integer value when on.
    pub const fn int(name: &'static str, value: i32) -> Self {
        Self::new(name, ControlValue::Int(value))
    }

    /// Enumerated control set to the named choice when on.
    pub const fn enumerated(name: &'static str, value: &'static str) -> Self {
        Self::new(name, ControlValue::Enum(value))
    }

    const fn new(name: &'static str, value: ControlValue) -> Self {
        Self {
            name,
            value,
            modes: AudioModes::empty(),
            devices: AudioDevices::empty(),
            excluded_devices: AudioDevices::empty(),
            keep_modes: AudioModes::empty(),
            one_time: false,
        }
    }

    /// Set the applicable modes.
    pub const fn modes(mut self, modes: AudioModes) -> Self {
        self.modes = modes;
        self
    }

    /// Set the applicable devices.
    pub const fn devices(mut self, devices: AudioDevices) -> Self {
        self.devices = devices;
        self
    }

    /// Set the devices that force this control off.
    pub const fn excluding(mut self, devices: AudioDevices) -> Self {
        self.excluded_devices = devices;
        self
    }

    /// Set the modes in which the control is held on.
    pub const fn keep(mut self, modes: AudioModes) -> Self {
        self.keep_modes = modes;
        self
    }

    /// Mark the control as written once.
    pub const fn once(mut self) -> Self {
        self.one_time = true;
        self
    }

    /// Whether the control should be on for the given routing facts.
    ///
    /// `on` tells whether the path is in use (its stream is out of standby).
    pub fn desired_state(&self, mode: AudioMode, active: AudioDevices, on: bool) -> bool {
        let keep = self.keep_modes.contains_mode(mode);
        (on || keep || self.one_time)
            && self.modes.contains_mode(mode)
            && self.devices.intersects(active)
            && (self.excluded_devices.is_empty() || !self.excluded_devices.intersects(active))
    }
}
