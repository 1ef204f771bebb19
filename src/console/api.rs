use crate::device::{AudioHwDevice, DeviceStatus};
use crate::devices::{AudioDevices, AudioMode};
use crate::params::{KEY_BT_NREC, VALUE_ON};
use crate::{HalError, device_status, global_device};

/// Fetch the current device snapshot if a device is open.
pub fn get_status() -> Option<DeviceStatus> {
    device_status()
}

/// Switch the telephony mode of the global device.
pub fn set_mode(mode: AudioMode) -> Result<(), HalError> {
    global_device().ok_or(HalError::NullDevice)?.set_mode(mode)
}

/// Route the output path of the global device.
pub fn route_output(devices: AudioDevices) -> Result<(), HalError> {
    let device = global_device().ok_or(HalError::NullDevice)?;
    device.route_output(devices);
    Ok(())
}

/// Tell the global device whether the Bluetooth headset reduces noise itself.
pub fn set_nrec(on: bool) -> Result<(), HalError> {
    let value = if on { VALUE_ON } else { "off" };
    global_device()
        .ok_or(HalError::NullDevice)?
        .set_parameters(&format!("{KEY_BT_NREC}={value}"))
}

/// Set the call volume of the global device.
pub fn set_voice_volume(volume: f32) -> Result<(), HalError> {
    global_device()
        .ok_or(HalError::NullDevice)?
        .set_voice_volume(volume)
}

/// Drain the in-process log.
pub fn drain_log() -> Vec<String> {
    std::iter::from_fn(crate::pop_log).collect()
}
