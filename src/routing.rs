//! Routing facts of the device and the call-path policy derived from them.

use std::fmt;

use crate::devices::{AudioDevices, AudioMode};

/// Modem-side audio path for a voice call.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallAudioPath {
    /// Handset earpiece and main microphone.
    Handset = 0,
    /// Wired headset.
    Headset = 1,
    /// Speakerphone.
    Speaker = 2,
    /// Bluetooth with headset noise reduction.
    Bluetooth = 3,
    /// Bluetooth, modem-side noise reduction disabled.
    BluetoothNoNr = 4,
    /// Wired headphone, main microphone.
    Headphone = 5,
}

impl fmt::Display for CallAudioPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallAudioPath::Handset => "handset",
            CallAudioPath::Headset => "headset",
            CallAudioPath::Speaker => "speaker",
            CallAudioPath::Bluetooth => "bluetooth",
            CallAudioPath::BluetoothNoNr => "bluetooth-no-nr",
            CallAudioPath::Headphone => "headphone",
        };
        f.write_str(name)
    }
}

/// Volume curve the modem applies to the call volume.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundType {
    /// Earpiece.
    Voice = 0,
    /// Loudspeaker.
    Speaker = 1,
    /// Wired headset or headphone.
    Headset = 2,
    /// Bluetooth voice.
    BtVoice = 3,
}

fn is_sco(outputs: AudioDevices) -> bool {
    outputs == AudioDevices::OUT_BLUETOOTH_SCO
        || outputs == AudioDevices::OUT_BLUETOOTH_SCO_HEADSET
        || outputs == AudioDevices::OUT_BLUETOOTH_SCO_CARKIT
}

/// Call path for the output half of `devices`.
///
/// Only a single selected output maps to a dedicated path. Combinations and
/// devices the modem has no path for fall back to the handset.
pub fn call_audio_path(devices: AudioDevices, bt_nrec: bool) -> CallAudioPath {
    let outputs = devices.outputs();
    if outputs == AudioDevices::OUT_EARPIECE {
        CallAudioPath::Handset
    } else if outputs == AudioDevices::OUT_SPEAKER || outputs == AudioDevices::OUT_AUX_DIGITAL {
        CallAudioPath::Speaker
    } else if outputs == AudioDevices::OUT_WIRED_HEADSET {
        CallAudioPath::Headset
    } else if outputs == AudioDevices::OUT_WIRED_HEADPHONE {
        CallAudioPath::Headphone
    } else if is_sco(outputs) {
        if bt_nrec {
            CallAudioPath::Bluetooth
        } else {
            CallAudioPath::BluetoothNoNr
        }
    } else {
        CallAudioPath::Handset
    }
}

/// Volume curve for the output half of `devices`.
pub fn sound_type(devices: AudioDevices) -> SoundType {
    let outputs = devices.outputs();
    if outputs == AudioDevices::OUT_SPEAKER || outputs == AudioDevices::OUT_AUX_DIGITAL {
        SoundType::Speaker
    } else if outputs == AudioDevices::OUT_WIRED_HEADSET
        || outputs == AudioDevices::OUT_WIRED_HEADPHONE
    {
        SoundType::Headset
    } else if is_sco(outputs) {
        SoundType::BtVoice
    } else {
        SoundType::Voice
    }
}

/// Devices to route when a call starts from `devices`.
///
/// A call never starts on the loudspeaker: speaker-only routing moves to the
/// earpiece and main microphone, any other routing just loses the speaker.
pub fn call_entry_devices(devices: AudioDevices) -> AudioDevices {
    if devices.outputs() == AudioDevices::OUT_SPEAKER {
        AudioDevices::OUT_EARPIECE | AudioDevices::IN_BUILTIN_MIC
    } else {
        devices - AudioDevices::OUT_SPEAKER
    }
}

/// Mode and device selection shared by both paths.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RoutingState {
    /// Telephony mode.
    pub mode: AudioMode,
    /// Active output and input devices.
    pub devices: AudioDevices,
    /// Capture is zeroed while set.
    pub mic_mute: bool,
    /// Bluetooth headset does its own noise reduction.
    pub bt_nrec: bool,
    /// A modem call session is running.
    pub in_call: bool,
    /// Call volume, `0.0..=1.0`.
    pub voice_volume: f32,
}

impl Default for RoutingState {
    fn default() -> Self {
        Self {
            mode: AudioMode::Normal,
            devices: AudioDevices::OUT_SPEAKER | AudioDevices::IN_BUILTIN_MIC,
            mic_mute: false,
            bt_nrec: true,
            in_call: false,
            voice_volume: 1.0,
        }
    }
}

impl RoutingState {
    /// Call path for the current devices.
    pub fn call_audio_path(&self) -> CallAudioPath {
        call_audio_path(self.devices, self.bt_nrec)
    }

    /// Volume curve for the current devices.
    pub fn sound_type(&self) -> SoundType {
        sound_type(self.devices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_outputs_map_to_their_path() {
        let cases = [
            (AudioDevices::OUT_EARPIECE, CallAudioPath::Handset),
            (AudioDevices::OUT_SPEAKER, CallAudioPath::Speaker),
            (AudioDevices::OUT_AUX_DIGITAL, CallAudioPath::Speaker),
            (AudioDevices::OUT_WIRED_HEADSET, CallAudioPath::Headset),
            (AudioDevices::OUT_WIRED_HEADPHONE, CallAudioPath::Headphone),
            (AudioDevices::OUT_BLUETOOTH_SCO_CARKIT, CallAudioPath::Bluetooth),
        ];
        for (device, path) in cases {
            let devices = device | AudioDevices::IN_BUILTIN_MIC;
            assert_eq!(call_audio_path(devices, true), path, "{device:?}");
        }
    }

    #[test]
    fn bluetooth_without_headset_nr() {
        assert_eq!(
            call_audio_path(AudioDevices::OUT_BLUETOOTH_SCO_HEADSET, false),
            CallAudioPath::BluetoothNoNr
        );
        assert_eq!(
            sound_type(AudioDevices::OUT_BLUETOOTH_SCO),
            SoundType::BtVoice
        );
    }

    #[test]
    fn unmapped_outputs_fall_back_to_handset() {
        let combined = AudioDevices::OUT_SPEAKER | AudioDevices::OUT_WIRED_HEADSET;
        assert_eq!(call_audio_path(combined, true), CallAudioPath::Handset);
        assert_eq!(
            call_audio_path(AudioDevices::OUT_BLUETOOTH_A2DP, true),
            CallAudioPath::Handset
        );
        assert_eq!(
            call_audio_path(AudioDevices::empty(), false),
            CallAudioPath::Handset
        );
        assert_eq!(sound_type(combined), SoundType::Voice);
    }

    #[test]
    fn calls_never_start_on_the_speaker() {
        let speaker = AudioDevices::OUT_SPEAKER | AudioDevices::IN_WIRED_HEADSET;
        assert_eq!(
            call_entry_devices(speaker),
            AudioDevices::OUT_EARPIECE | AudioDevices::IN_BUILTIN_MIC
        );

        let mixed = AudioDevices::OUT_SPEAKER
            | AudioDevices::OUT_WIRED_HEADSET
            | AudioDevices::IN_WIRED_HEADSET;
        assert_eq!(
            call_entry_devices(mixed),
            AudioDevices::OUT_WIRED_HEADSET | AudioDevices::IN_WIRED_HEADSET
        );
    }

    #[test]
    fn defaults_route_speaker_and_main_mic() {
        let state = RoutingState::default();
        assert_eq!(state.mode, AudioMode::Normal);
        assert_eq!(state.call_audio_path(), CallAudioPath::Speaker);
        assert!(state.bt_nrec);
        assert_eq!(state.voice_volume, 1.0);
    }
}
