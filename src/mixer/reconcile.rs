//! Convergence of a control table onto a live mixer.
//!
//! A pass walks the table back to front. Controls that must go off are
//! written on the spot; controls that must come on are queued and written
//! front to back once the walk is over. Downstream stages are therefore muted
//! before anything upstream changes, and unmuted only after their sources are
//! in place.

use std::fmt;

use tracing::{debug, error, warn};

use crate::devices::{AudioDevices, AudioMode};
use crate::mixer::tables::{INPUT_CONTROLS, OUTPUT_CONTROLS};
use crate::mixer::{ControlType, ControlValue, CtlId, Mixer, MixerControl};
use crate::push_log;

/// Signal path a control table drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MixerPath {
    /// Playback towards the speakers and the modem downlink mixers.
    Output,
    /// Capture from the microphones and the modem uplink mixers.
    Input,
}

impl MixerPath {
    /// Compiled-in control table of the path.
    pub fn controls(self) -> &'static [MixerControl] {
        match self {
            MixerPath::Output => OUTPUT_CONTROLS,
            MixerPath::Input => INPUT_CONTROLS,
        }
    }
}

impl fmt::Display for MixerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MixerPath::Output => f.write_str("out"),
            MixerPath::Input => f.write_str("in"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Resolution {
    Pending,
    Ready { ctl: CtlId, value: i32 },
    Inert,
}

#[derive(Clone, Copy, Debug)]
struct ControlState {
    applied: bool,
    resolution: Resolution,
}

impl ControlState {
    const INITIAL: ControlState = ControlState {
        applied: false,
        resolution: Resolution::Pending,
    };
}

/// Number of controls written by one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Convergence {
    /// Controls written off.
    pub released: usize,
    /// Controls written on.
    pub asserted: usize,
}

impl Convergence {
    /// Whether the pass left the mixer untouched.
    pub fn is_empty(&self) -> bool {
        self.released == 0 && self.asserted == 0
    }
}

/// Read-only view of one control's convergence state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControlStatus {
    /// Control name.
    pub name: &'static str,
    /// Last state written.
    pub applied: bool,
    /// The control could not be resolved and is skipped for good.
    pub inert: bool,
}

/// Keeps one control table converged with the routing facts.
pub struct MixerReconciler {
    path: MixerPath,
    table: &'static [MixerControl],
    state: Vec<ControlState>,
}

impl MixerReconciler {
    /// Reconciler over the compiled-in table of `path`.
    pub fn new(path: MixerPath) -> Self {
        Self::with_table(path, path.controls())
    }

    /// Reconciler over an arbitrary table, in dependency order.
    pub fn with_table(path: MixerPath, table: &'static [MixerControl]) -> Self {
        Self {
            path,
            table,
            state: vec![ControlState::INITIAL; table.len()],
        }
    }

    /// Path this reconciler drives.
    pub fn path(&self) -> MixerPath {
        self.path
    }

    /// Controls in table order.
    pub fn table(&self) -> &'static [MixerControl] {
        self.table
    }

    /// Bring the mixer in line with `mode`, `devices` and the path's `on`
    /// state, writing only the controls whose state changes.
    pub fn converge(
        &mut self,
        mixer: &mut dyn Mixer,
        mode: AudioMode,
        devices: AudioDevices,
        on: bool,
    ) -> Convergence {
        let result = self.pass(mixer, mode, devices, on, false);
        if !result.is_empty() {
            debug!(
                path = %self.path,
                %mode,
                devices = format_args!("{:#x}", devices.bits()),
                on,
                released = result.released,
                asserted = result.asserted,
                "mixer converged"
            );
        }
        result
    }

    /// Forget every cached state and resolution and write every control
    /// that is not one-time off.
    pub fn reset(&mut self, mixer: &mut dyn Mixer) -> Convergence {
        self.state.fill(ControlState::INITIAL);
        let result = self.pass(
            mixer,
            AudioMode::Normal,
            AudioDevices::empty(),
            false,
            true,
        );
        debug!(path = %self.path, released = result.released, "mixer reset");
        result
    }

    /// State of every control, in table order.
    pub fn snapshot(&self) -> Vec<ControlStatus> {
        self.table
            .iter()
            .zip(&self.state)
            .map(|(control, state)| ControlStatus {
                name: control.name,
                applied: state.applied,
                inert: state.resolution == Resolution::Inert,
            })
            .collect()
    }

    fn pass(
        &mut self,
        mixer: &mut dyn Mixer,
        mode: AudioMode,
        devices: AudioDevices,
        on: bool,
        reset: bool,
    ) -> Convergence {
        let table = self.table;
        let mut result = Convergence::default();
        let mut deferred = Vec::new();

        for idx in (0..table.len()).rev() {
            let control = &table[idx];
            let desired = !reset && control.desired_state(mode, devices, on);

            if control.one_time && !desired {
                continue;
            }
            let applied = self.state[idx].applied;
            if !reset && (desired == applied || (applied && control.one_time)) {
                continue;
            }
            let Some(ctl) = self.resolve(idx, mixer) else {
                continue;
            };

            self.state[idx].applied = desired;
            if desired {
                deferred.push(idx);
            } else {
                write_all(mixer, control.name, ctl, 0);
                result.released += 1;
            }
        }

        for &idx in deferred.iter().rev() {
            let control = &table[idx];
            if let Resolution::Ready { ctl, value } = self.state[idx].resolution {
                write_all(mixer, control.name, ctl, value);
                result.asserted += 1;
            }
        }

        result
    }

    fn resolve(&mut self, idx: usize, mixer: &mut dyn Mixer) -> Option<CtlId> {
        match self.state[idx].resolution {
            Resolution::Ready { ctl, .. } => return Some(ctl),
            Resolution::Inert => return None,
            Resolution::Pending => {}
        }

        let control = self.table[idx];
        let resolution = match lookup(mixer, &control) {
            Ok((ctl, value)) => Resolution::Ready { ctl, value },
            Err(reason) => {
                error!(path = %self.path, ctl = control.name, %reason, "mixer ctl skipped");
                push_log(format!("mixer ctl '{}' skipped: {}", control.name, reason));
                Resolution::Inert
            }
        };
        self.state[idx].resolution = resolution;
        match resolution {
            Resolution::Ready { ctl, .. } => Some(ctl),
            _ => None,
        }
    }
}

fn lookup(mixer: &mut dyn Mixer, control: &MixerControl) -> Result<(CtlId, i32), String> {
    let ctl = mixer
        .ctl_by_name(control.name)
        .ok_or_else(|| "no such control".to_string())?;

    match control.value {
        ControlValue::Int(value) => Ok((ctl, value)),
        ControlValue::Enum(choice) => {
            if mixer.ctl_type(ctl) != ControlType::Enum {
                return Err(format!("'{choice}' set on a non-enum control"));
            }
            (0..mixer.num_enums(ctl))
                .find(|&i| mixer.enum_string(ctl, i) == Some(choice))
                .map(|i| (ctl, i as i32))
                .ok_or_else(|| format!("invalid enum '{choice}'"))
        }
    }
}

fn write_all(mixer: &mut dyn Mixer, name: &str, ctl: CtlId, value: i32) {
    for slot in 0..mixer.num_values(ctl) {
        if let Err(err) = mixer.set_value(ctl, slot, value) {
            warn!(ctl = name, slot, value, %err, "mixer write failed");
        }
    }
    debug!(ctl = name, value, "mixer ctl applied");
}
