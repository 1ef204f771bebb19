//! In-memory mixer used by tests and the developer console.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::mixer::tables::{HEADPHONE_MUX_CHOICES, INPUT_CONTROLS, OUTPUT_CONTROLS};
use crate::mixer::{ControlType, ControlValue, CtlId, Mixer, MixerError};

/// One value written to a [`SoftMixer`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MixerWrite {
    /// Control name.
    pub name: String,
    /// Value slot.
    pub index: usize,
    /// Value written.
    pub value: i32,
}

/// Shared record of every accepted write, in order.
#[derive(Clone, Debug, Default)]
pub struct MixerJournal(Arc<Mutex<Vec<MixerWrite>>>);

impl MixerJournal {
    /// Copy of the recorded writes.
    pub fn writes(&self) -> Vec<MixerWrite> {
        self.0.lock().clone()
    }

    /// Recorded writes, clearing the journal.
    pub fn take(&self) -> Vec<MixerWrite> {
        std::mem::take(&mut *self.0.lock())
    }

    /// Drop every recorded write.
    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Number of recorded writes.
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    /// Whether nothing was written since the last take.
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    fn record(&self, name: &str, index: usize, value: i32) {
        self.0.lock().push(MixerWrite {
            name: name.to_string(),
            index,
            value,
        });
    }
}

struct SoftControl {
    name: String,
    kind: ControlType,
    values: Vec<i32>,
    max: i32,
    enums: Vec<String>,
    rejects_writes: bool,
}

/// Mixer holding its controls in memory.
///
/// Only registered controls resolve. Writes are range checked against the
/// control type and every accepted write lands in the [`MixerJournal`].
#[derive(Default)]
pub struct SoftMixer {
    controls: Vec<SoftControl>,
    journal: MixerJournal,
}

impl SoftMixer {
    /// Empty mixer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mixer exposing every control named by the compiled-in tables.
    ///
    /// Switches and volumes of the headphone and speaker amplifiers carry a
    /// left and a right slot, everything else has a single slot.
    pub fn for_tables() -> Self {
        let mut mixer = Self::new();
        for control in OUTPUT_CONTROLS.iter().chain(INPUT_CONTROLS) {
            if mixer.position(control.name).is_some() {
                continue;
            }
            let slots = if control.name.starts_with("Headphone ")
                || control.name.starts_with("Speaker ")
            {
                2
            } else {
                1
            };
            match control.value {
                ControlValue::Enum(_) => {
                    mixer.add_enum(control.name, HEADPHONE_MUX_CHOICES);
                }
                ControlValue::Int(_) if control.name.ends_with(" Switch") => {
                    mixer.add_switch(control.name, slots);
                }
                ControlValue::Int(_) => {
                    mixer.add_volume(control.name, slots, 127);
                }
            }
        }
        mixer
    }

    /// Handle on the write journal.
    pub fn journal(&self) -> MixerJournal {
        self.journal.clone()
    }

    /// Register an on/off switch with `slots` values.
    pub fn add_switch(&mut self, name: &str, slots: usize) -> CtlId {
        self.add(name, ControlType::Bool, slots, 1, Vec::new())
    }

    /// Register an integer control ranging over `0..=max`.
    pub fn add_volume(&mut self, name: &str, slots: usize, max: i32) -> CtlId {
        self.add(name, ControlType::Int, slots, max, Vec::new())
    }

    /// Register a single-slot enumerated control.
    pub fn add_enum(&mut self, name: &str, choices: &[&str]) -> CtlId {
        let enums = choices.iter().map(|c| c.to_string()).collect();
        self.add(name, ControlType::Enum, 1, choices.len() as i32 - 1, enums)
    }

    /// Make every write to `name` fail.
    pub fn reject_writes(&mut self, name: &str) {
        if let Some(idx) = self.position(name) {
            self.controls[idx].rejects_writes = true;
        }
    }

    /// Current value of a control slot.
    pub fn value(&self, name: &str, index: usize) -> Option<i32> {
        let idx = self.position(name)?;
        self.controls[idx].values.get(index).copied()
    }

    fn add(
        &mut self,
        name: &str,
        kind: ControlType,
        slots: usize,
        max: i32,
        enums: Vec<String>,
    ) -> CtlId {
        let id = CtlId(self.controls.len() as u32);
        self.controls.push(SoftControl {
            name: name.to_string(),
            kind,
            values: vec![0; slots.max(1)],
            max,
            enums,
            rejects_writes: false,
        });
        id
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.controls.iter().position(|c| c.name == name)
    }

    fn control(&self, ctl: CtlId) -> Option<&SoftControl> {
        self.controls.get(ctl.0 as usize)
    }
}

impl Mixer for SoftMixer {
    fn ctl_by_name(&mut self, name: &str) -> Option<CtlId> {
        self.position(name).map(|idx| CtlId(idx as u32))
    }

    fn ctl_name(&self, ctl: CtlId) -> Option<&str> {
        self.control(ctl).map(|c| c.name.as_str())
    }

    fn ctl_type(&self, ctl: CtlId) -> ControlType {
        self.control(ctl)
            .map(|c| c.kind)
            .unwrap_or(ControlType::Unknown)
    }

    fn num_values(&self, ctl: CtlId) -> usize {
        self.control(ctl).map(|c| c.values.len()).unwrap_or(0)
    }

    fn num_enums(&self, ctl: CtlId) -> usize {
        self.control(ctl).map(|c| c.enums.len()).unwrap_or(0)
    }

    fn enum_string(&self, ctl: CtlId, index: usize) -> Option<&str> {
        self.control(ctl)?.enums.get(index).map(String::as_str)
    }

    fn get_value(&self, ctl: CtlId, index: usize) -> Result<i32, MixerError> {
        let control = self.control(ctl).ok_or(MixerError::UnknownCtl(ctl.0))?;
        control
            .values
            .get(index)
            .copied()
            .ok_or_else(|| MixerError::ValueIndex {
                name: control.name.clone(),
                index,
            })
    }

    fn set_value(&mut self, ctl: CtlId, index: usize, value: i32) -> Result<(), MixerError> {
        let control = self
            .controls
            .get_mut(ctl.0 as usize)
            .ok_or(MixerError::UnknownCtl(ctl.0))?;
        if index >= control.values.len() {
            return Err(MixerError::ValueIndex {
                name: control.name.clone(),
                index,
            });
        }
        if control.rejects_writes || !(0..=control.max).contains(&value) {
            return Err(MixerError::ValueRange {
                name: control.name.clone(),
                value,
            });
        }
        control.values[index] = value;
        self.journal.record(&control.name, index, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_mixer_resolves_every_control() {
        let mut mixer = SoftMixer::for_tables();
        for control in OUTPUT_CONTROLS.iter().chain(INPUT_CONTROLS) {
            assert!(mixer.ctl_by_name(control.name).is_some(), "{}", control.name);
        }
        let mux = mixer.ctl_by_name("Left Headphone Mux").unwrap();
        assert_eq!(mixer.ctl_type(mux), ControlType::Enum);
        assert_eq!(mixer.enum_string(mux, 1), Some("DAC"));
        let volume = mixer.ctl_by_name("Speaker Volume").unwrap();
        assert_eq!(mixer.num_values(volume), 2);
    }

    #[test]
    fn out_of_range_writes_are_refused() {
        let mut mixer = SoftMixer::new();
        let switch = mixer.add_switch("Earpiece Switch", 1);
        assert!(mixer.set_value(switch, 0, 2).is_err());
        assert!(mixer.set_value(switch, 1, 1).is_err());
        mixer.set_value(switch, 0, 1).unwrap();
        assert_eq!(mixer.value("Earpiece Switch", 0), Some(1));
        assert_eq!(mixer.journal().len(), 1);
    }
}
