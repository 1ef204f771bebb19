//! Audio device bitmasks and call modes.
//!
//! Output and input device bits share one `u32` mask: outputs occupy the low
//! sixteen bits, inputs the range above them plus the default-input bit. The
//! device keeps a single combined mask and splits it with [`AudioDevices::outputs`]
//! and [`AudioDevices::inputs`].

use std::convert::TryFrom;
use std::fmt;

use bitflags::bitflags;

use crate::HalError;

bitflags! {
    /// Set of audio endpoints, output and input bits combined.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AudioDevices: u32 {
        /// Handset earpiece receiver.
        const OUT_EARPIECE = 0x1;
        /// Loudspeaker.
        const OUT_SPEAKER = 0x2;
        /// Wired headset with microphone.
        const OUT_WIRED_HEADSET = 0x4;
        /// Wired headphone without microphone.
        const OUT_WIRED_HEADPHONE = 0x8;
        /// Bluetooth SCO link.
        const OUT_BLUETOOTH_SCO = 0x10;
        /// Bluetooth SCO headset.
        const OUT_BLUETOOTH_SCO_HEADSET = 0x20;
        /// Bluetooth SCO car kit.
        const OUT_BLUETOOTH_SCO_CARKIT = 0x40;
        /// Bluetooth A2DP sink.
        const OUT_BLUETOOTH_A2DP = 0x80;
        /// Bluetooth A2DP headphones.
        const OUT_BLUETOOTH_A2DP_HEADPHONES = 0x100;
        /// Bluetooth A2DP speaker.
        const OUT_BLUETOOTH_A2DP_SPEAKER = 0x200;
        /// Digital output (HDMI/TV out).
        const OUT_AUX_DIGITAL = 0x400;
        /// Analog dock headset.
        const OUT_ANLG_DOCK_HEADSET = 0x800;
        /// Digital dock headset.
        const OUT_DGTL_DOCK_HEADSET = 0x1000;
        /// USB accessory.
        const OUT_USB_ACCESSORY = 0x2000;
        /// USB device.
        const OUT_USB_DEVICE = 0x4000;
        /// Framework default output.
        const OUT_DEFAULT = 0x8000;
        /// Every SCO output.
        const OUT_ALL_SCO = Self::OUT_BLUETOOTH_SCO.bits()
            | Self::OUT_BLUETOOTH_SCO_HEADSET.bits()
            | Self::OUT_BLUETOOTH_SCO_CARKIT.bits();
        /// Every output bit.
        const OUT_ALL = 0xFFFF;

        /// Voice communication input.
        const IN_COMMUNICATION = 0x1_0000;
        /// Ambient input.
        const IN_AMBIENT = 0x2_0000;
        /// Built-in microphone.
        const IN_BUILTIN_MIC = 0x4_0000;
        /// Bluetooth SCO headset microphone.
        const IN_BLUETOOTH_SCO_HEADSET = 0x8_0000;
        /// Wired headset microphone.
        const IN_WIRED_HEADSET = 0x10_0000;
        /// Digital input.
        const IN_AUX_DIGITAL = 0x20_0000;
        /// Voice call uplink/downlink capture.
        const IN_VOICE_CALL = 0x40_0000;
        /// Rear microphone.
        const IN_BACK_MIC = 0x80_0000;
        /// Framework default input.
        const IN_DEFAULT = 0x8000_0000;
        /// Every SCO input.
        const IN_ALL_SCO = Self::IN_BLUETOOTH_SCO_HEADSET.bits();
        /// Every input bit.
        const IN_ALL = Self::IN_COMMUNICATION.bits()
            | Self::IN_AMBIENT.bits()
            | Self::IN_BUILTIN_MIC.bits()
            | Self::IN_BLUETOOTH_SCO_HEADSET.bits()
            | Self::IN_WIRED_HEADSET.bits()
            | Self::IN_AUX_DIGITAL.bits()
            | Self::IN_VOICE_CALL.bits()
            | Self::IN_BACK_MIC.bits()
            | Self::IN_DEFAULT.bits();
    }
}

impl AudioDevices {
    /// Output half of a combined mask.
    pub fn outputs(self) -> Self {
        self & Self::OUT_ALL
    }

    /// Input half of a combined mask.
    pub fn inputs(self) -> Self {
        self & Self::IN_ALL
    }

    /// Replace the output half, keeping the input bits.
    pub fn with_outputs(self, outputs: Self) -> Self {
        (self - Self::OUT_ALL) | outputs.outputs()
    }

    /// Replace the input half, keeping the output bits.
    pub fn with_inputs(self, inputs: Self) -> Self {
        (self - Self::IN_ALL) | inputs.inputs()
    }

    /// Endpoints this hardware can route to.
    pub fn supported() -> Self {
        Self::OUT_EARPIECE
            | Self::OUT_SPEAKER
            | Self::OUT_WIRED_HEADSET
            | Self::OUT_WIRED_HEADPHONE
            | Self::OUT_AUX_DIGITAL
            | Self::OUT_ANLG_DOCK_HEADSET
            | Self::OUT_DGTL_DOCK_HEADSET
            | Self::OUT_ALL_SCO
            | Self::OUT_DEFAULT
            | Self::IN_COMMUNICATION
            | Self::IN_AMBIENT
            | Self::IN_BUILTIN_MIC
            | Self::IN_WIRED_HEADSET
            | Self::IN_AUX_DIGITAL
            | Self::IN_BACK_MIC
            | Self::IN_ALL_SCO
            | Self::IN_DEFAULT
    }
}

/// Telephony audio mode of the device.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum AudioMode {
    /// No call, media playback.
    #[default]
    Normal = 0,
    /// Incoming call ringing.
    Ringtone = 1,
    /// Circuit-switched voice call through the modem.
    InCall = 2,
    /// VoIP or other in-app communication.
    InCommunication = 3,
}

impl AudioMode {
    /// Every mode, in numeric order.
    pub const ALL: [AudioMode; 4] = [
        AudioMode::Normal,
        AudioMode::Ringtone,
        AudioMode::InCall,
        AudioMode::InCommunication,
    ];

    /// Mode following `self` in numeric order, wrapping around.
    pub fn next(self) -> Self {
        Self::ALL[(self as usize + 1) % Self::ALL.len()]
    }

    fn flag(self) -> AudioModes {
        AudioModes::from_bits_retain(1 << self as i32)
    }
}

impl TryFrom<i32> for AudioMode {
    type Error = HalError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(AudioMode::Normal),
            1 => Ok(AudioMode::Ringtone),
            2 => Ok(AudioMode::InCall),
            3 => Ok(AudioMode::InCommunication),
            other => Err(HalError::InvalidMode(other)),
        }
    }
}

impl fmt::Display for AudioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AudioMode::Normal => "normal",
            AudioMode::Ringtone => "ringtone",
            AudioMode::InCall => "in-call",
            AudioMode::InCommunication => "in-communication",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Set of call modes.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct AudioModes: u32 {
        /// [`AudioMode::Normal`].
        const NORMAL = 1 << 0;
        /// [`AudioMode::Ringtone`].
        const RINGTONE = 1 << 1;
        /// [`AudioMode::InCall`].
        const IN_CALL = 1 << 2;
        /// [`AudioMode::InCommunication`].
        const IN_COMMUNICATION = 1 << 3;
        /// Every mode.
        const ALL = Self::NORMAL.bits()
            | Self::RINGTONE.bits()
            | Self::IN_CALL.bits()
            | Self::IN_COMMUNICATION.bits();
    }
}

impl AudioModes {
    /// Whether `mode` is a member of this set.
    pub fn contains_mode(self, mode: AudioMode) -> bool {
        self.intersects(mode.flag())
    }
}

impl From<AudioMode> for AudioModes {
    fn from(mode: AudioMode) -> Self {
        mode.flag()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn halves_split_a_combined_mask() {
        let devices = AudioDevices::OUT_SPEAKER | AudioDevices::IN_BUILTIN_MIC;
        assert_eq!(devices.outputs(), AudioDevices::OUT_SPEAKER);
        assert_eq!(devices.inputs(), AudioDevices::IN_BUILTIN_MIC);

        let rerouted = devices.with_outputs(AudioDevices::OUT_WIRED_HEADSET);
        assert_eq!(
            rerouted,
            AudioDevices::OUT_WIRED_HEADSET | AudioDevices::IN_BUILTIN_MIC
        );
    }

    #[test]
    fn mode_sets_match_single_modes() {
        let voice = AudioModes::IN_CALL | AudioModes::IN_COMMUNICATION;
        assert!(voice.contains_mode(AudioMode::InCall));
        assert!(voice.contains_mode(AudioMode::InCommunication));
        assert!(!voice.contains_mode(AudioMode::Normal));
        assert!(AudioModes::ALL.contains_mode(AudioMode::Ringtone));
        assert!(AudioModes::empty().is_empty());
    }

    #[test]
    fn unknown_mode_values_are_rejected() {
        assert_eq!(AudioMode::try_from(2).unwrap(), AudioMode::InCall);
        assert!(AudioMode::try_from(-1).is_err());
        assert!(AudioMode::try_from(4).is_err());
    }
}
