#![deny(missing_docs)]

//! Audio hardware layer of the Aries handset family.
//!
//! The core keeps the WM8994 codec's mixer controls converged to the current
//! telephony mode, the active devices and the stream power state, and drives
//! the modem side of voice calls. [`AudioDevice`] owns the routing state and
//! both [`MixerReconciler`](mixer::MixerReconciler) paths; streams opened on
//! it power their path up on the first transfer and back down in standby.
//!
//! The same device is exported over a C ABI (`aries_audio_*`) whose most
//! recently opened instance backs the [`console`] tooling.

use std::collections::VecDeque;
use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::ptr;
use std::slice;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::{Arc, Once};

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, error, warn};

pub mod call;
pub mod config;
/// Developer-facing control API and terminal console.
pub mod console;
pub mod device;
pub mod devices;
pub mod mixer;
pub mod modem;
pub mod params;
pub mod pcm;
pub mod resampler;
pub mod ring;
pub mod routing;
pub mod stream;

#[cfg(test)]
mod tests;

pub use crate::call::CallState;
pub use crate::config::HalConfig;
pub use crate::device::{AudioDevice, AudioHwDevice, Backends, DeviceStatus, SoftHandles};
pub use crate::devices::{AudioDevices, AudioMode, AudioModes};
pub use crate::mixer::{MixerError, MixerPath, MixerReconciler};
pub use crate::modem::ModemError;
pub use crate::pcm::PcmError;
pub use crate::routing::{CallAudioPath, RoutingState, SoundType};
pub use crate::stream::{
    AudioStream, InputStream, OutputStream, StreamConfig, StreamIn, StreamOut,
};

static LOG_BUFFER: Lazy<Mutex<VecDeque<String>>> =
    Lazy::new(|| Mutex::new(VecDeque::with_capacity(64)));
static LOG_CACHE: Lazy<Mutex<Option<CString>>> = Lazy::new(|| Mutex::new(None));
static TRACING_INIT: Once = Once::new();

const LOG_CAPACITY: usize = 256;

/// Install the fmt subscriber once per process.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let _ = tracing_subscriber::fmt::try_init();
    });
}

pub(crate) fn push_log(line: impl Into<String>) {
    let mut guard = LOG_BUFFER.lock();
    guard.push_back(line.into());
    while guard.len() > LOG_CAPACITY {
        guard.pop_front();
    }
}

/// Oldest line of the in-process log, if any.
pub fn pop_log() -> Option<String> {
    LOG_BUFFER.lock().pop_front()
}

/// Error enumeration surfaced across the public API.
#[derive(thiserror::Error, Debug)]
pub enum HalError {
    /// Argument rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Telephony mode outside the known set.
    #[error("unknown audio mode {0}")]
    InvalidMode(i32),
    /// A stream of this direction is already open.
    #[error("{0} stream already open")]
    Busy(&'static str),
    /// Operation not implemented by this hardware.
    #[error("operation not supported")]
    NotSupported,
    /// Device pointer passed over FFI was null.
    #[error("null device pointer")]
    NullDevice,
    /// Mixer failure.
    #[error(transparent)]
    Mixer(#[from] MixerError),
    /// PCM failure.
    #[error(transparent)]
    Pcm(#[from] PcmError),
    /// Modem client failure.
    #[error(transparent)]
    Modem(#[from] ModemError),
}

impl HalError {
    /// Negative errno reported over the C ABI.
    pub fn errno(&self) -> c_int {
        let code = match self {
            HalError::InvalidArgument(_) | HalError::InvalidMode(_) => libc::EINVAL,
            HalError::Busy(_) => libc::EBUSY,
            HalError::NotSupported => libc::ENOSYS,
            HalError::NullDevice | HalError::Mixer(_) | HalError::Modem(_) => libc::ENODEV,
            HalError::Pcm(PcmError::Open { .. }) => libc::ENOMEM,
            HalError::Pcm(_) => libc::EIO,
        };
        -code
    }
}

/// `audio_format_t` value of signed 16-bit PCM.
pub const AUDIO_FORMAT_PCM_16_BIT: u32 = 0x1;

/// Stream format exchanged over the C ABI.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AudioConfigFfi {
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved channels.
    pub channels: u32,
    /// `audio_format_t` value.
    pub format: u32,
}

impl AudioConfigFfi {
    fn to_stream_config(self) -> Result<StreamConfig, HalError> {
        if self.format != AUDIO_FORMAT_PCM_16_BIT {
            return Err(HalError::InvalidArgument(format!(
                "unsupported format {:#x}",
                self.format
            )));
        }
        Ok(StreamConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            format: pcm::PcmFormat::S16Le,
        })
    }
}

impl From<StreamConfig> for AudioConfigFfi {
    fn from(config: StreamConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            channels: config.channels,
            format: AUDIO_FORMAT_PCM_16_BIT,
        }
    }
}

/// Opaque device handle handed to C callers.
pub struct AudioDeviceFfi {
    device: AudioDevice,
}

/// Opaque playback stream handle.
pub struct OutputStreamFfi {
    stream: Arc<OutputStream>,
}

/// Opaque capture stream handle.
pub struct InputStreamFfi {
    stream: Arc<InputStream>,
}

static DEVICE_GLOBAL: AtomicPtr<AudioDeviceFfi> = AtomicPtr::new(ptr::null_mut());
// Shared handle on the device behind DEVICE_GLOBAL; swapped under this lock.
static GLOBAL_SHARED: Lazy<Mutex<Option<AudioDevice>>> = Lazy::new(|| Mutex::new(None));

fn status_code(result: Result<(), HalError>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(err) => {
            debug!(%err, "reporting failure over ffi");
            err.errno()
        }
    }
}

fn transfer_code(result: Result<usize, HalError>) -> isize {
    match result {
        Ok(bytes) => bytes as isize,
        Err(err) => err.errno() as isize,
    }
}

/// Borrow a C string as UTF-8.
///
/// # Safety
/// `kvpairs` must be null or point to a NUL-terminated string that outlives
/// the returned borrow.
unsafe fn kv_str<'a>(kvpairs: *const c_char) -> Result<&'a str, HalError> {
    if kvpairs.is_null() {
        return Err(HalError::InvalidArgument("null parameter string".into()));
    }
    let raw = unsafe { CStr::from_ptr(kvpairs) };
    raw.to_str()
        .map_err(|err| HalError::InvalidArgument(format!("parameter string: {err}")))
}

/// Open a device on the software backends, configured from the environment.
///
/// The new device becomes the global handle used by [`console::api`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_open(device_out: *mut *mut AudioDeviceFfi) -> c_int {
    init_tracing();
    if device_out.is_null() {
        return HalError::InvalidArgument("null output pointer".into()).errno();
    }
    let opened = AudioDevice::open_soft(HalConfig::from_env());
    match opened {
        Ok((device, _handles)) => {
            let mut shared = GLOBAL_SHARED.lock();
            *shared = Some(device.clone());
            let raw = Box::into_raw(Box::new(AudioDeviceFfi { device }));
            DEVICE_GLOBAL.store(raw, Ordering::SeqCst);
            drop(shared);
            unsafe { *device_out = raw };
            0
        }
        Err(err) => {
            error!(%err, "device open failed");
            push_log(format!("device open failed: {err}"));
            unsafe { *device_out = ptr::null_mut() };
            err.errno()
        }
    }
}

/// Close a device handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_close(device: *mut AudioDeviceFfi) -> c_int {
    if device.is_null() {
        return HalError::NullDevice.errno();
    }
    let mut shared = GLOBAL_SHARED.lock();
    let was_global = DEVICE_GLOBAL
        .compare_exchange(device, ptr::null_mut(), Ordering::SeqCst, Ordering::SeqCst)
        .is_ok();
    if was_global {
        *shared = None;
    }
    drop(shared);
    unsafe { drop(Box::from_raw(device)) };
    0
}

/// Fetch the most recently opened device handle, if any.
#[unsafe(no_mangle)]
pub extern "C" fn aries_audio_global_device() -> *mut AudioDeviceFfi {
    DEVICE_GLOBAL.load(Ordering::SeqCst)
}

/// Run `f` on the device behind `device`.
///
/// # Safety
/// `device` must be null or a live handle from [`aries_audio_device_open`].
unsafe fn with_device<T>(
    device: *mut AudioDeviceFfi,
    f: impl FnOnce(&AudioDevice) -> Result<T, HalError>,
) -> Result<T, HalError> {
    if device.is_null() {
        return Err(HalError::NullDevice);
    }
    f(unsafe { &(*device).device })
}

/// Change the telephony mode (`audio_mode_t`).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_set_mode(
    device: *mut AudioDeviceFfi,
    mode: c_int,
) -> c_int {
    status_code(unsafe {
        with_device(device, |dev| dev.set_mode(AudioMode::try_from(mode)?))
    })
}

/// Set the call volume, `0.0..=1.0`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_set_voice_volume(
    device: *mut AudioDeviceFfi,
    volume: f32,
) -> c_int {
    status_code(unsafe { with_device(device, |dev| dev.set_voice_volume(volume)) })
}

/// Mute or unmute capture.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_set_mic_mute(
    device: *mut AudioDeviceFfi,
    mute: bool,
) -> c_int {
    status_code(unsafe { with_device(device, |dev| dev.set_mic_mute(mute)) })
}

/// Report whether capture is muted through `mute_out`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_get_mic_mute(
    device: *mut AudioDeviceFfi,
    mute_out: *mut bool,
) -> c_int {
    if mute_out.is_null() {
        return HalError::InvalidArgument("null output pointer".into()).errno();
    }
    status_code(unsafe {
        with_device(device, |dev| {
            *mute_out = dev.mic_mute();
            Ok(())
        })
    })
}

/// Apply device-level `key=value` pairs.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_set_parameters(
    device: *mut AudioDeviceFfi,
    kvpairs: *const c_char,
) -> c_int {
    status_code(unsafe {
        with_device(device, |dev| dev.set_parameters(kv_str(kvpairs)?))
    })
}

/// Capture buffer size in bytes for `config`, 0 when unsupported.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_input_buffer_size(
    device: *mut AudioDeviceFfi,
    config: *const AudioConfigFfi,
) -> usize {
    if config.is_null() {
        return 0;
    }
    let config = unsafe { *config };
    let size = unsafe {
        with_device(device, |dev| {
            Ok(dev.input_buffer_size(&config.to_stream_config()?))
        })
    };
    size.unwrap_or(0)
}

/// Open the playback stream; `config` receives the stream's format.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_open_output_stream(
    device: *mut AudioDeviceFfi,
    devices: u32,
    config: *mut AudioConfigFfi,
    stream_out: *mut *mut OutputStreamFfi,
) -> c_int {
    if config.is_null() || stream_out.is_null() {
        return HalError::InvalidArgument("null output pointer".into()).errno();
    }
    let opened = unsafe {
        with_device(device, |dev| {
            let mut stream_config = StreamConfig::default();
            let stream =
                dev.open_output_stream(AudioDevices::from_bits_retain(devices), &mut stream_config)?;
            *config = stream_config.into();
            Ok(stream)
        })
    };
    match opened {
        Ok(stream) => {
            unsafe { *stream_out = Box::into_raw(Box::new(OutputStreamFfi { stream })) };
            0
        }
        Err(err) => {
            unsafe { *stream_out = ptr::null_mut() };
            err.errno()
        }
    }
}

/// Put a playback stream in standby and release its handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_close_output_stream(
    device: *mut AudioDeviceFfi,
    stream: *mut OutputStreamFfi,
) {
    if stream.is_null() {
        return;
    }
    let handle = unsafe { Box::from_raw(stream) };
    let closed = unsafe {
        with_device(device, |dev| {
            dev.close_output_stream(&handle.stream);
            Ok(())
        })
    };
    if let Err(err) = closed {
        warn!(%err, "playback stream released without its device");
    }
}

/// Queue `bytes` bytes of interleaved S16 audio for playback.
///
/// Returns the bytes consumed or a negative errno.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_out_write(
    stream: *mut OutputStreamFfi,
    buffer: *const u8,
    bytes: usize,
) -> isize {
    if stream.is_null() || buffer.is_null() {
        return -(libc::EINVAL as isize);
    }
    let data = unsafe { slice::from_raw_parts(buffer, bytes) };
    transfer_code(unsafe { (*stream).stream.write(data) })
}

/// Put a playback stream in standby.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_out_standby(stream: *mut OutputStreamFfi) -> c_int {
    if stream.is_null() {
        return -libc::EINVAL;
    }
    status_code(unsafe { (*stream).stream.standby() })
}

/// Apply stream-level `key=value` pairs to a playback stream.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_out_set_parameters(
    stream: *mut OutputStreamFfi,
    kvpairs: *const c_char,
) -> c_int {
    if stream.is_null() {
        return -libc::EINVAL;
    }
    status_code(unsafe { kv_str(kvpairs).and_then(|kv| (*stream).stream.set_parameters(kv)) })
}

/// Open a capture stream in the format given by `config`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_open_input_stream(
    device: *mut AudioDeviceFfi,
    devices: u32,
    config: *mut AudioConfigFfi,
    stream_out: *mut *mut InputStreamFfi,
) -> c_int {
    if config.is_null() || stream_out.is_null() {
        return HalError::InvalidArgument("null output pointer".into()).errno();
    }
    let opened = unsafe {
        with_device(device, |dev| {
            let mut stream_config = (*config).to_stream_config()?;
            let stream =
                dev.open_input_stream(AudioDevices::from_bits_retain(devices), &mut stream_config)?;
            *config = stream_config.into();
            Ok(stream)
        })
    };
    match opened {
        Ok(stream) => {
            unsafe { *stream_out = Box::into_raw(Box::new(InputStreamFfi { stream })) };
            0
        }
        Err(err) => {
            unsafe { *stream_out = ptr::null_mut() };
            err.errno()
        }
    }
}

/// Put a capture stream in standby and release its handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_device_close_input_stream(
    device: *mut AudioDeviceFfi,
    stream: *mut InputStreamFfi,
) {
    if stream.is_null() {
        return;
    }
    let handle = unsafe { Box::from_raw(stream) };
    let closed = unsafe {
        with_device(device, |dev| {
            dev.close_input_stream(&handle.stream);
            Ok(())
        })
    };
    if let Err(err) = closed {
        warn!(%err, "capture stream released without its device");
    }
}

/// Fill `bytes` bytes of `buffer` with captured S16 audio.
///
/// Returns the bytes produced or a negative errno.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_in_read(
    stream: *mut InputStreamFfi,
    buffer: *mut u8,
    bytes: usize,
) -> isize {
    if stream.is_null() || buffer.is_null() {
        return -(libc::EINVAL as isize);
    }
    let data = unsafe { slice::from_raw_parts_mut(buffer, bytes) };
    transfer_code(unsafe { (*stream).stream.read(data) })
}

/// Put a capture stream in standby.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_in_standby(stream: *mut InputStreamFfi) -> c_int {
    if stream.is_null() {
        return -libc::EINVAL;
    }
    status_code(unsafe { (*stream).stream.standby() })
}

/// Apply stream-level `key=value` pairs to a capture stream.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn aries_audio_in_set_parameters(
    stream: *mut InputStreamFfi,
    kvpairs: *const c_char,
) -> c_int {
    if stream.is_null() {
        return -libc::EINVAL;
    }
    status_code(unsafe { kv_str(kvpairs).and_then(|kv| (*stream).stream.set_parameters(kv)) })
}

#[unsafe(no_mangle)]
/// Pop the next line of the in-process log. Returns `NULL` when no logs remain.
///
/// The string stays valid until the next call.
pub extern "C" fn aries_audio_pop_log() -> *const c_char {
    if let Some(message) = pop_log() {
        let mut cache = LOG_CACHE.lock();
        *cache = Some(CString::new(message).unwrap_or_default());
        cache.as_ref().map(|c| c.as_ptr()).unwrap_or(ptr::null())
    } else {
        ptr::null()
    }
}

/// Handle on the most recently opened C ABI device, if one is open.
///
/// The returned handle shares the device, so it stays usable after the C
/// handle is closed.
pub fn global_device() -> Option<AudioDevice> {
    GLOBAL_SHARED.lock().clone()
}

/// Status of the global device, if one is open.
pub fn device_status() -> Option<DeviceStatus> {
    global_device().map(|device| device.status())
}
