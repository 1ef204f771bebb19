//! Control tables for the WM8994 codec as wired on this board.
//!
//! Order matters: later entries sit further downstream in the analog path.
//! The reconciler releases controls back to front and asserts them front to
//! back.

use crate::devices::{AudioDevices, AudioModes};
use crate::mixer::MixerControl;

const HEADPHONES: AudioDevices =
    AudioDevices::OUT_WIRED_HEADSET.union(AudioDevices::OUT_WIRED_HEADPHONE);
const VOICE_MODES: AudioModes = AudioModes::IN_CALL.union(AudioModes::IN_COMMUNICATION);

/// Playback path controls.
pub static OUTPUT_CONTROLS: &[MixerControl] = &[
    // DAC1
    MixerControl::int("DAC1 Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_ALL)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("DAC1R Mixer AIF1.1 Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_ALL),
    MixerControl::int("DAC1L Mixer AIF1.1 Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_ALL),
    // AIF2DAC, modem downlink
    MixerControl::int("AIF2DAC Volume", 90)
        .modes(AudioModes::IN_CALL)
        .devices(AudioDevices::OUT_ALL)
        .once(),
    MixerControl::int("DAC1R Mixer AIF2 Switch", 1)
        .modes(AudioModes::IN_CALL)
        .devices(AudioDevices::OUT_ALL)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("DAC1L Mixer AIF2 Switch", 1)
        .modes(AudioModes::IN_CALL)
        .devices(AudioDevices::OUT_ALL)
        .keep(AudioModes::IN_CALL),
    // Output mixer
    MixerControl::int("Right Output Mixer DAC Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_EARPIECE)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("Left Output Mixer DAC Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_EARPIECE)
        .keep(AudioModes::IN_CALL),
    // Sidetone
    MixerControl::int("DAC1 Right Sidetone Volume", 4)
        .modes(AudioModes::IN_CALL)
        .devices(AudioDevices::OUT_EARPIECE)
        .once(),
    MixerControl::int("DAC1 Left Sidetone Volume", 4)
        .modes(AudioModes::IN_CALL)
        .devices(AudioDevices::OUT_EARPIECE)
        .once(),
    MixerControl::int("DAC1R Mixer Right Sidetone Switch", 1)
        .modes(AudioModes::IN_CALL)
        .devices(AudioDevices::OUT_EARPIECE)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("DAC1L Mixer Left Sidetone Switch", 1)
        .modes(AudioModes::IN_CALL)
        .devices(AudioDevices::OUT_EARPIECE)
        .keep(AudioModes::IN_CALL),
    // Headphone
    MixerControl::enumerated("Right Headphone Mux", "DAC")
        .modes(AudioModes::ALL)
        .devices(HEADPHONES)
        .once(),
    MixerControl::enumerated("Left Headphone Mux", "DAC")
        .modes(AudioModes::ALL)
        .devices(HEADPHONES)
        .once(),
    MixerControl::int("Headphone Volume", 43)
        .modes(AudioModes::ALL)
        .devices(HEADPHONES)
        .once(),
    MixerControl::int("Headphone Switch", 1)
        .modes(AudioModes::ALL)
        .devices(HEADPHONES)
        .keep(AudioModes::IN_CALL),
    // Speaker
    MixerControl::int("SPKR DAC1 Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_SPEAKER)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("SPKL DAC1 Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_SPEAKER)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("Speaker Mixer Volume", 3)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_SPEAKER)
        .once(),
    MixerControl::int("Speaker Boost Volume", 6)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_SPEAKER)
        .once(),
    MixerControl::int("Speaker Volume", 63)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_SPEAKER)
        .once(),
    MixerControl::int("Speaker Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_SPEAKER)
        .keep(AudioModes::IN_CALL),
    // Earpiece
    MixerControl::int("Earpiece Mixer Right Output Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_EARPIECE)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("Earpiece Mixer Left Output Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_EARPIECE)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("Earpiece Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::OUT_EARPIECE)
        .keep(AudioModes::IN_CALL),
];

/// Capture path controls.
///
/// The main and second microphone stages share the IN1L/IN2L inputs; the
/// exclusions pick the earpiece mic for handset calls and the second mic for
/// speakerphone.
pub static INPUT_CONTROLS: &[MixerControl] = &[
    // Main mic
    MixerControl::int("IN1L Volume", 31)
        .modes(VOICE_MODES)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .once(),
    MixerControl::int("IN1L ZC Switch", 1)
        .modes(VOICE_MODES)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .once(),
    MixerControl::int("IN1L Switch", 1)
        .modes(VOICE_MODES)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .excluding(AudioDevices::OUT_SPEAKER)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("IN1L PGA IN1LP Switch", 1)
        .modes(VOICE_MODES)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .excluding(AudioDevices::OUT_SPEAKER)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("IN1L PGA IN1LN Switch", 1)
        .modes(VOICE_MODES)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .excluding(AudioDevices::OUT_SPEAKER)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("MIXINL IN1L Volume", 1)
        .modes(VOICE_MODES)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .once(),
    MixerControl::int("MIXINL IN1L Switch", 1)
        .modes(VOICE_MODES)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .excluding(AudioDevices::OUT_SPEAKER)
        .keep(AudioModes::IN_CALL),
    // Second mic
    MixerControl::int("IN2L Volume", 31)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .once(),
    MixerControl::int("IN2L ZC Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .once(),
    MixerControl::int("IN2L Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .excluding(AudioDevices::OUT_EARPIECE)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("IN2L PGA IN2LP Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .excluding(AudioDevices::OUT_EARPIECE)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("IN2L PGA IN2LN Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .excluding(AudioDevices::OUT_EARPIECE)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("MIXINL IN2L Volume", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .once(),
    MixerControl::int("MIXINL IN2L Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::IN_BUILTIN_MIC)
        .excluding(AudioDevices::OUT_EARPIECE)
        .keep(AudioModes::IN_CALL),
    // ADC1
    MixerControl::int("AIF1ADC1R Mixer ADC/DMIC Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::IN_ALL),
    MixerControl::int("AIF1ADC1L Mixer ADC/DMIC Switch", 1)
        .modes(AudioModes::ALL)
        .devices(AudioDevices::IN_ALL),
    // AIF2DAC2, modem uplink
    MixerControl::int("AIF2DAC2R Mixer AIF1.1 Switch", 1)
        .modes(AudioModes::IN_CALL)
        .devices(AudioDevices::IN_ALL)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("AIF2DAC2L Mixer AIF1.1 Switch", 1)
        .modes(AudioModes::IN_CALL)
        .devices(AudioDevices::IN_ALL)
        .keep(AudioModes::IN_CALL),
    MixerControl::int("DAC2 Switch", 1)
        .modes(AudioModes::IN_CALL)
        .devices(AudioDevices::IN_ALL)
        .keep(AudioModes::IN_CALL),
];

/// Choices of the headphone muxes.
pub const HEADPHONE_MUX_CHOICES: &[&str] = &["Mixer", "DAC"];
