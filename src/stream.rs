//! Playback and capture streams.
//!
//! A stream is in standby whenever its PCM is closed. The first transfer out
//! of standby powers its mixer path up and opens the PCM; standby closes the
//! PCM and powers the path back down. Both transitions run under the device
//! lock followed by the stream lock.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, info};

use crate::HalError;
use crate::devices::AudioDevices;
use crate::device::{DeviceCore, DeviceState};
use crate::mixer::MixerPath;
use crate::params::{KEY_ROUTING, StrParms};
use crate::pcm::{
    DEFAULT_SAMPLING_RATE, Pcm, PcmConfig, PcmDirection, PcmError, PcmFlags, PcmFormat, PcmPort,
};
use crate::push_log;
use crate::resampler::LinearResampler;

/// Client-facing format of a stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamConfig {
    /// Frames per second.
    pub sample_rate: u32,
    /// Interleaved channels.
    pub channels: u32,
    /// Sample format.
    pub format: PcmFormat,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLING_RATE,
            channels: 2,
            format: PcmFormat::S16Le,
        }
    }
}

/// Capture rates the input path can convert to.
pub const INPUT_SAMPLE_RATES: [u32; 8] = [8000, 11025, 16000, 22050, 24000, 32000, 44100, 48000];

/// Validate a requested capture format.
pub fn check_input_parameters(config: &StreamConfig) -> Result<(), HalError> {
    if config.format != PcmFormat::S16Le {
        return Err(HalError::InvalidArgument(format!(
            "unsupported format {:?}",
            config.format
        )));
    }
    if !(1..=2).contains(&config.channels) {
        return Err(HalError::InvalidArgument(format!(
            "unsupported channel count {}",
            config.channels
        )));
    }
    if !INPUT_SAMPLE_RATES.contains(&config.sample_rate) {
        return Err(HalError::InvalidArgument(format!(
            "unsupported sample rate {}",
            config.sample_rate
        )));
    }
    Ok(())
}

fn round_to_16(frames: usize) -> usize {
    frames.div_ceil(16) * 16
}

/// Capture buffer size in bytes for `config`, 0 when the format is rejected.
///
/// One hardware period converted to the requested rate, rounded up to a
/// multiple of 16 frames.
pub fn input_buffer_size(config: &StreamConfig) -> usize {
    if check_input_parameters(config).is_err() {
        return 0;
    }
    let hw = PcmConfig::HIFI_UL;
    let frames = hw.period_size * config.sample_rate as usize / hw.rate as usize;
    round_to_16(frames) * config.channels as usize * config.format.bytes_per_sample()
}

fn buffer_duration(bytes: usize, frame_bytes: usize, rate: u32) -> Duration {
    let frames = bytes / frame_bytes.max(1);
    Duration::from_micros(frames as u64 * 1_000_000 / rate.max(1) as u64)
}

/// Behavior shared by both stream directions.
pub trait AudioStream {
    /// Client sample rate.
    fn sample_rate(&self) -> u32;
    /// Client channel count.
    fn channels(&self) -> u32;
    /// Client sample format.
    fn format(&self) -> PcmFormat {
        PcmFormat::S16Le
    }
    /// Preferred transfer size in bytes.
    fn buffer_size(&self) -> usize;
    /// Close the PCM and power the path down.
    fn standby(&self) -> Result<(), HalError>;
    /// Whether the PCM is closed.
    fn is_standby(&self) -> bool;
    /// Apply `key=value` pairs.
    fn set_parameters(&self, kvpairs: &str) -> Result<(), HalError>;
    /// Query parameters; nothing is reported.
    fn get_parameters(&self, _keys: &str) -> String {
        String::new()
    }
}

/// Playback stream.
pub trait StreamOut: AudioStream {
    /// Hardware buffer latency.
    fn latency_ms(&self) -> u32;
    /// Per-stream volume.
    fn set_volume(&self, _left: f32, _right: f32) -> Result<(), HalError> {
        Err(HalError::NotSupported)
    }
    /// Queue `buffer` for playback, returning the bytes consumed.
    fn write(&self, buffer: &[u8]) -> Result<usize, HalError>;
    /// Frames rendered by the DSP.
    fn render_position(&self) -> Result<u32, HalError> {
        Err(HalError::InvalidArgument(
            "render position is not tracked".to_string(),
        ))
    }
}

/// Capture stream.
pub trait StreamIn: AudioStream {
    /// Input gain; accepted and ignored.
    fn set_gain(&self, _gain: f32) -> Result<(), HalError> {
        Ok(())
    }
    /// Fill `buffer` with captured frames, returning the bytes produced.
    fn read(&self, buffer: &mut [u8]) -> Result<usize, HalError>;
    /// Frames dropped since the last call.
    fn input_frames_lost(&self) -> u32 {
        0
    }
}

pub(crate) struct OutputState {
    pcm: Option<Box<dyn Pcm>>,
    standby: bool,
}

/// Media playback stream on the hifi port.
pub struct OutputStream {
    core: Arc<DeviceCore>,
    config: PcmConfig,
    write_threshold: usize,
    state: Mutex<OutputState>,
}

impl OutputStream {
    pub(crate) fn new(core: Arc<DeviceCore>) -> Self {
        let config = PcmConfig::HIFI;
        Self {
            core,
            config,
            write_threshold: config.buffer_frames(),
            state: Mutex::new(OutputState {
                pcm: None,
                standby: true,
            }),
        }
    }

    /// Client-facing format.
    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            sample_rate: self.config.rate,
            channels: self.config.channels,
            format: self.config.format,
        }
    }

    pub(crate) fn lock_state(&self, _device: &DeviceState) -> MutexGuard<'_, OutputState> {
        self.state.lock()
    }

    pub(crate) fn is_standby_locked(&self, device: &DeviceState) -> bool {
        self.lock_state(device).standby
    }

    pub(crate) fn standby_locked(state: &mut OutputState, device: &mut DeviceState) {
        if state.standby {
            return;
        }
        state.pcm = None;
        state.standby = true;
        device.converge(MixerPath::Output, false);
        info!("output stream in standby");
    }

    pub(crate) fn enter_standby(&self) {
        let mut device = self.core.state.lock();
        let mut state = self.lock_state(&device);
        Self::standby_locked(&mut state, &mut device);
    }

    fn start_locked(
        &self,
        state: &mut OutputState,
        device: &mut DeviceState,
    ) -> Result<(), PcmError> {
        device.converge(MixerPath::Output, true);
        let opened = self.core.pcm.open(
            self.core.config.card,
            PcmPort::Hifi,
            PcmDirection::Playback,
            PcmFlags::MMAP | PcmFlags::NOIRQ,
            &self.config,
        );
        match opened {
            Ok(pcm) => {
                state.pcm = Some(pcm);
                state.standby = false;
                info!(rate = self.config.rate, "output stream started");
                Ok(())
            }
            Err(err) => {
                device.converge(MixerPath::Output, false);
                error!(%err, "cannot open playback pcm");
                push_log(format!("playback pcm open failed: {err}"));
                Err(err)
            }
        }
    }

    /// Keep at most `write_threshold` frames queued in the driver.
    fn pace(&self, pcm: &dyn Pcm) {
        let min_sleep = self.core.config.min_write_sleep;
        loop {
            let Some(avail) = pcm.avail() else {
                break;
            };
            let queued = pcm.buffer_size().saturating_sub(avail);
            if queued <= self.write_threshold {
                break;
            }
            let excess = (queued - self.write_threshold) as u64;
            let wait = Duration::from_micros(excess * 1_000_000 / DEFAULT_SAMPLING_RATE as u64);
            thread::sleep(wait.max(min_sleep));
        }
    }

    fn fail_write(&self, buffer: &[u8], err: PcmError) -> HalError {
        self.enter_standby();
        thread::sleep(buffer_duration(
            buffer.len(),
            self.config.frame_bytes(),
            self.config.rate,
        ));
        err.into()
    }
}

impl AudioStream for OutputStream {
    fn sample_rate(&self) -> u32 {
        self.config.rate
    }

    fn channels(&self) -> u32 {
        self.config.channels
    }

    fn buffer_size(&self) -> usize {
        let frames = PcmConfig::HIFI.period_size * DEFAULT_SAMPLING_RATE as usize
            / self.config.rate as usize;
        round_to_16(frames) * self.config.frame_bytes()
    }

    fn standby(&self) -> Result<(), HalError> {
        self.enter_standby();
        Ok(())
    }

    fn is_standby(&self) -> bool {
        let device = self.core.state.lock();
        self.is_standby_locked(&device)
    }

    fn set_parameters(&self, kvpairs: &str) -> Result<(), HalError> {
        debug!(kvpairs, "output set_parameters");
        let parms = StrParms::parse(kvpairs);
        if let Some(value) = parms.get_int(KEY_ROUTING) {
            let outputs = AudioDevices::from_bits_retain(value as u32).outputs();
            let mut device = self.core.state.lock();
            let state = self.lock_state(&device);
            let on = !state.standby;
            device.reroute_output(outputs, on);
        }
        Ok(())
    }
}

impl StreamOut for OutputStream {
    fn latency_ms(&self) -> u32 {
        (self.config.buffer_frames() * 1000 / self.config.rate as usize) as u32
    }

    fn write(&self, buffer: &[u8]) -> Result<usize, HalError> {
        let mut device = self.core.state.lock();
        let mut state = self.lock_state(&device);
        if state.standby {
            if let Err(err) = self.start_locked(&mut state, &mut device) {
                drop(state);
                drop(device);
                thread::sleep(buffer_duration(
                    buffer.len(),
                    self.config.frame_bytes(),
                    self.config.rate,
                ));
                return Err(err.into());
            }
        }
        drop(device);

        let result = match state.pcm.as_mut() {
            Some(pcm) => {
                self.pace(&**pcm);
                pcm.write(buffer)
            }
            None => Err(PcmError::Io("playback pcm not open".to_string())),
        };
        drop(state);

        match result {
            Ok(()) => Ok(buffer.len()),
            Err(err) => {
                error!(%err, bytes = buffer.len(), "playback write failed");
                Err(self.fail_write(buffer, err))
            }
        }
    }
}

pub(crate) struct InputState {
    pcm: Option<Box<dyn Pcm>>,
    standby: bool,
    resampler: Option<LinearResampler>,
    pending: Vec<i16>,
}

impl InputState {
    fn fill(&mut self, config: &PcmConfig, buffer: &mut [u8]) -> Result<(), PcmError> {
        let frame_bytes = config.frame_bytes();
        if buffer.len() % frame_bytes != 0 {
            return Err(PcmError::Misaligned {
                len: buffer.len(),
                frame_bytes,
            });
        }
        let pcm = self
            .pcm
            .as_mut()
            .ok_or_else(|| PcmError::Io("capture pcm not open".to_string()))?;
        let Some(resampler) = self.resampler.as_mut() else {
            return pcm.read(buffer);
        };

        let wanted = buffer.len() / 2;
        let mut period = vec![0u8; config.period_size * frame_bytes];
        while self.pending.len() < wanted {
            pcm.read(&mut period)?;
            let samples: Vec<i16> = period
                .chunks_exact(2)
                .map(|b| i16::from_le_bytes([b[0], b[1]]))
                .collect();
            resampler.process(&samples, &mut self.pending);
        }
        for (bytes, sample) in buffer
            .chunks_exact_mut(2)
            .zip(self.pending.drain(..wanted))
        {
            bytes.copy_from_slice(&sample.to_le_bytes());
        }
        Ok(())
    }
}

/// Capture stream on the hifi port.
pub struct InputStream {
    core: Arc<DeviceCore>,
    requested_rate: u32,
    config: PcmConfig,
    state: Mutex<InputState>,
}

impl InputStream {
    pub(crate) fn new(core: Arc<DeviceCore>, config: &StreamConfig) -> Self {
        let hw = PcmConfig {
            channels: config.channels,
            ..PcmConfig::HIFI_UL
        };
        Self {
            core,
            requested_rate: config.sample_rate,
            config: hw,
            state: Mutex::new(InputState {
                pcm: None,
                standby: true,
                resampler: None,
                pending: Vec::new(),
            }),
        }
    }

    pub(crate) fn lock_state(&self, _device: &DeviceState) -> MutexGuard<'_, InputState> {
        self.state.lock()
    }

    pub(crate) fn is_standby_locked(&self, device: &DeviceState) -> bool {
        self.lock_state(device).standby
    }

    pub(crate) fn standby_locked(state: &mut InputState, device: &mut DeviceState) {
        if state.standby {
            return;
        }
        state.pcm = None;
        state.standby = true;
        device.converge(MixerPath::Input, false);
        info!("input stream in standby");
    }

    pub(crate) fn enter_standby(&self) {
        let mut device = self.core.state.lock();
        let mut state = self.lock_state(&device);
        Self::standby_locked(&mut state, &mut device);
    }

    fn start_locked(
        &self,
        state: &mut InputState,
        device: &mut DeviceState,
    ) -> Result<(), PcmError> {
        device.converge(MixerPath::Input, true);
        let opened = self.core.pcm.open(
            self.core.config.card,
            PcmPort::Hifi,
            PcmDirection::Capture,
            PcmFlags::empty(),
            &self.config,
        );
        match opened {
            Ok(pcm) => {
                state.pcm = Some(pcm);
                state.standby = false;
                state.pending.clear();
                state.resampler = (self.requested_rate != self.config.rate).then(|| {
                    LinearResampler::new(
                        self.config.rate,
                        self.requested_rate,
                        self.config.channels as usize,
                    )
                });
                info!(rate = self.requested_rate, "input stream started");
                Ok(())
            }
            Err(err) => {
                device.converge(MixerPath::Input, false);
                error!(%err, "cannot open capture pcm");
                push_log(format!("capture pcm open failed: {err}"));
                Err(err)
            }
        }
    }

    fn sleep_buffer(&self, bytes: usize) {
        thread::sleep(buffer_duration(
            bytes,
            self.config.frame_bytes(),
            self.requested_rate,
        ));
    }
}

impl AudioStream for InputStream {
    fn sample_rate(&self) -> u32 {
        self.requested_rate
    }

    fn channels(&self) -> u32 {
        self.config.channels
    }

    fn buffer_size(&self) -> usize {
        input_buffer_size(&StreamConfig {
            sample_rate: self.requested_rate,
            channels: self.config.channels,
            format: PcmFormat::S16Le,
        })
    }

    fn standby(&self) -> Result<(), HalError> {
        self.enter_standby();
        Ok(())
    }

    fn is_standby(&self) -> bool {
        let device = self.core.state.lock();
        self.is_standby_locked(&device)
    }

    fn set_parameters(&self, kvpairs: &str) -> Result<(), HalError> {
        debug!(kvpairs, "input set_parameters");
        let parms = StrParms::parse(kvpairs);
        if let Some(value) = parms.get_int(KEY_ROUTING) {
            let inputs = AudioDevices::from_bits_retain(value as u32).inputs();
            let mut device = self.core.state.lock();
            let state = self.lock_state(&device);
            let on = !state.standby;
            device.reroute_input(inputs, on);
        }
        Ok(())
    }
}

impl StreamIn for InputStream {
    fn read(&self, buffer: &mut [u8]) -> Result<usize, HalError> {
        let mut device = self.core.state.lock();
        let mut state = self.lock_state(&device);
        if state.standby {
            if let Err(err) = self.start_locked(&mut state, &mut device) {
                drop(state);
                drop(device);
                self.sleep_buffer(buffer.len());
                return Err(err.into());
            }
        }
        let muted = device.routing.mic_mute;
        drop(device);

        let result = state.fill(&self.config, buffer);
        drop(state);

        match result {
            Ok(()) => {
                if muted {
                    buffer.fill(0);
                }
                Ok(buffer.len())
            }
            Err(err) => {
                error!(%err, bytes = buffer.len(), "capture read failed");
                self.enter_standby();
                self.sleep_buffer(buffer.len());
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_formats_are_validated() {
        let ok = StreamConfig {
            sample_rate: 16000,
            channels: 1,
            format: PcmFormat::S16Le,
        };
        assert!(check_input_parameters(&ok).is_ok());
        let bad_rate = StreamConfig {
            sample_rate: 12000,
            ..ok
        };
        assert!(check_input_parameters(&bad_rate).is_err());
        let bad_channels = StreamConfig { channels: 3, ..ok };
        assert!(check_input_parameters(&bad_channels).is_err());
        assert_eq!(input_buffer_size(&bad_channels), 0);
    }

    #[test]
    fn input_buffer_rounds_to_16_frames() {
        let config = |sample_rate, channels| StreamConfig {
            sample_rate,
            channels,
            format: PcmFormat::S16Le,
        };
        // 1024 * 8000 / 44100 = 185 -> 192 frames
        assert_eq!(input_buffer_size(&config(8000, 1)), 192 * 2);
        assert_eq!(input_buffer_size(&config(44100, 2)), 1024 * 4);
        // 1024 * 48000 / 44100 = 1114 -> 1120 frames
        assert_eq!(input_buffer_size(&config(48000, 2)), 1120 * 4);
    }
}
