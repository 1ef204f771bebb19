use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use aries_audio_hw::mixer::SoftMixer;
use aries_audio_hw::modem::RecordingModem;
use aries_audio_hw::pcm::{
    Pcm, PcmConfig, PcmDirection, PcmDriver, PcmError, PcmFlags, PcmFormat, PcmPort,
};
use aries_audio_hw::{
    AudioDevice, AudioDevices, AudioHwDevice, AudioMode, AudioStream, Backends, CallAudioPath,
    HalConfig, HalError, SoftHandles, StreamConfig, StreamIn, StreamOut,
};

fn open() -> (AudioDevice, SoftHandles) {
    let (device, handles) = AudioDevice::open_soft(HalConfig::default()).expect("open device");
    handles.mixer.clear();
    handles.modem.take();
    handles.pcm.take_events();
    (device, handles)
}

fn last_value(handles: &SoftHandles, name: &str) -> Option<i32> {
    handles
        .mixer
        .writes()
        .into_iter()
        .rev()
        .find(|w| w.name == name)
        .map(|w| w.value)
}

fn mono(sample_rate: u32) -> StreamConfig {
    StreamConfig {
        sample_rate,
        channels: 1,
        format: PcmFormat::S16Le,
    }
}

#[test]
fn open_resets_both_paths() {
    let (_device, handles) = AudioDevice::open_soft(HalConfig::default()).unwrap();
    let writes = handles.mixer.writes();
    assert!(!writes.is_empty());
    assert!(writes.iter().all(|w| w.value == 0));
    assert!(!writes.iter().any(|w| w.name == "Speaker Volume"));
    assert!(writes.iter().any(|w| w.name == "DAC2 Switch"));
}

#[test]
fn first_write_powers_the_output_path() {
    let (device, handles) = open();
    let mut config = StreamConfig::default();
    let out = device
        .open_output_stream(AudioDevices::OUT_SPEAKER, &mut config)
        .unwrap();
    assert_eq!(config.sample_rate, 44100);
    assert_eq!(config.channels, 2);
    assert!(out.is_standby());
    assert!(handles.mixer.is_empty());

    assert_eq!(out.write(&[0u8; 4096]).unwrap(), 4096);
    assert!(!out.is_standby());
    assert!(handles.pcm.is_open(PcmPort::Hifi, PcmDirection::Playback));
    assert_eq!(last_value(&handles, "Speaker Switch"), Some(1));
    assert_eq!(last_value(&handles, "DAC1L Mixer AIF1.1 Switch"), Some(1));
    let first = handles.mixer.writes().first().map(|w| w.name.clone());
    assert_eq!(first.as_deref(), Some("DAC1 Switch"));

    out.standby().unwrap();
    assert!(out.is_standby());
    assert!(!handles.pcm.is_open(PcmPort::Hifi, PcmDirection::Playback));
    assert_eq!(last_value(&handles, "Speaker Switch"), Some(0));
    assert_eq!(last_value(&handles, "Speaker Volume"), Some(63));

    let ring = handles.pcm.ring(PcmPort::Hifi, PcmDirection::Playback).unwrap();
    assert!(ring.is_shared());
}

#[test]
fn one_stream_per_direction() {
    let (device, _handles) = open();
    let mut config = StreamConfig::default();
    let out = device
        .open_output_stream(AudioDevices::OUT_SPEAKER, &mut config)
        .unwrap();
    assert!(matches!(
        device.open_output_stream(AudioDevices::OUT_SPEAKER, &mut config),
        Err(HalError::Busy("output"))
    ));
    device.close_output_stream(&out);
    assert!(device
        .open_output_stream(AudioDevices::OUT_SPEAKER, &mut config)
        .is_ok());

    let mut input = mono(16000);
    let first = device
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, &mut input)
        .unwrap();
    let err = device
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, &mut input)
        .err()
        .unwrap();
    assert_eq!(err.errno(), -libc::EBUSY);
    drop(first);
    assert!(device
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, &mut input)
        .is_ok());
}

#[test]
fn failed_write_leaves_stream_in_standby() {
    let (device, handles) = open();
    let mut config = StreamConfig::default();
    let out = device
        .open_output_stream(AudioDevices::OUT_SPEAKER, &mut config)
        .unwrap();
    out.write(&[0u8; 256]).unwrap();

    handles.pcm.fail_io(true);
    let err = out.write(&[0u8; 256]).unwrap_err();
    assert!(matches!(err, HalError::Pcm(PcmError::Io(_))));
    assert_eq!(err.errno(), -libc::EIO);
    assert!(out.is_standby());
    assert_eq!(last_value(&handles, "Speaker Switch"), Some(0));

    handles.pcm.fail_io(false);
    out.write(&[0u8; 256]).unwrap();
    assert!(!out.is_standby());
}

#[test]
fn failed_open_powers_the_path_back_down() {
    let (device, handles) = open();
    handles.pcm.fail_open(PcmPort::Hifi, PcmDirection::Playback);
    let mut config = StreamConfig::default();
    let out = device
        .open_output_stream(AudioDevices::OUT_SPEAKER, &mut config)
        .unwrap();

    let err = out.write(&[0u8; 256]).unwrap_err();
    assert_eq!(err.errno(), -libc::ENOMEM);
    assert!(out.is_standby());
    assert_eq!(last_value(&handles, "Speaker Switch"), Some(0));
}

#[test]
fn input_reads_resample_and_mute() {
    let (device, handles) = open();
    let mut config = mono(44100);
    let input = device
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, &mut config)
        .unwrap();
    assert_eq!(input.buffer_size(), 1024 * 2);

    let mut buffer = vec![0xffu8; 128];
    assert_eq!(input.read(&mut buffer).unwrap(), 128);
    assert!(buffer.iter().all(|&b| b == 0));
    assert_eq!(last_value(&handles, "IN2L Switch"), Some(1));
    assert_eq!(last_value(&handles, "AIF1ADC1L Mixer ADC/DMIC Switch"), Some(1));

    let ring = handles.pcm.ring(PcmPort::Hifi, PcmDirection::Capture).unwrap();
    ring.push(&[500; 64]);
    input.read(&mut buffer).unwrap();
    assert!(buffer.chunks_exact(2).all(|b| i16::from_le_bytes([b[0], b[1]]) == 500));

    device.set_mic_mute(true).unwrap();
    ring.push(&[500; 64]);
    input.read(&mut buffer).unwrap();
    assert!(buffer.iter().all(|&b| b == 0));

    let mut wideband = mono(16000);
    drop(input);
    let input = device
        .open_input_stream(AudioDevices::IN_BUILTIN_MIC, &mut wideband)
        .unwrap();
    let mut frames = vec![0u8; 320];
    assert_eq!(input.read(&mut frames).unwrap(), 320);
    assert_eq!(input.sample_rate(), 16000);
}

#[test]
fn unsupported_input_formats_are_rejected() {
    let (device, _handles) = open();
    let mut config = mono(12345);
    assert!(matches!(
        device.open_input_stream(AudioDevices::IN_BUILTIN_MIC, &mut config),
        Err(HalError::InvalidArgument(_))
    ));
    assert_eq!(device.input_buffer_size(&config), 0);
    assert_eq!(device.input_buffer_size(&mono(8000)), 192 * 2);
}

#[test]
fn routing_changes_push_the_path_only_in_call() {
    let (device, handles) = open();
    let mut config = StreamConfig::default();
    let out = device
        .open_output_stream(AudioDevices::OUT_SPEAKER, &mut config)
        .unwrap();

    out.set_parameters("routing=8").unwrap();
    assert_eq!(device.routing().devices.outputs(), AudioDevices::OUT_WIRED_HEADPHONE);
    assert!(handles.modem.audio_paths().is_empty());

    device.set_mode(AudioMode::InCall).unwrap();
    handles.modem.take();
    out.set_parameters("routing=4").unwrap();
    assert_eq!(handles.modem.audio_paths(), vec![CallAudioPath::Headset]);

    out.set_parameters("routing=16").unwrap();
    device.set_parameters("bt_headset_nrec=off").unwrap();
    device.set_parameters("bt_headset_nrec=off").unwrap();
    assert_eq!(
        handles.modem.audio_paths(),
        vec![
            CallAudioPath::Headset,
            CallAudioPath::Bluetooth,
            CallAudioPath::BluetoothNoNr,
        ]
    );
}

#[test]
fn malformed_parameters_are_ignored() {
    let (device, handles) = open();
    let mut config = StreamConfig::default();
    let out = device
        .open_output_stream(AudioDevices::OUT_SPEAKER, &mut config)
        .unwrap();
    let before = device.routing();
    out.set_parameters("routing=loud;;=3").unwrap();
    out.set_parameters("").unwrap();
    device.set_parameters("screen_state=on").unwrap();
    assert_eq!(device.routing(), before);
    assert!(handles.mixer.is_empty());
}

#[test]
fn unknown_modes_and_unsupported_calls() {
    let (device, handles) = open();
    assert!(matches!(AudioMode::try_from(7), Err(HalError::InvalidMode(7))));
    assert!(matches!(device.set_master_volume(0.5), Err(HalError::NotSupported)));
    assert_eq!(device.get_parameters("routing"), "");
    device.set_mode(AudioMode::Normal).unwrap();
    assert!(handles.pcm.events().is_empty());
}

#[test]
fn capture_during_call_keeps_the_call_microphone() {
    let (device, handles) = open();
    device.set_mode(AudioMode::InCall).unwrap();
    let in_call = device.routing().devices;
    assert_eq!(in_call, AudioDevices::OUT_EARPIECE | AudioDevices::IN_BUILTIN_MIC);
    handles.mixer.clear();

    let mut config = mono(8000);
    let input = device
        .open_input_stream(AudioDevices::IN_WIRED_HEADSET, &mut config)
        .unwrap();
    let mut buffer = vec![0u8; 320];
    input.read(&mut buffer).unwrap();

    assert_eq!(device.routing().devices, in_call);
    let released: Vec<_> = handles
        .mixer
        .writes()
        .into_iter()
        .filter(|w| w.name.contains("IN1L") && w.value == 0)
        .map(|w| w.name)
        .collect();
    assert!(released.is_empty(), "call microphone released: {released:?}");
}

#[test]
fn capture_follows_device_routing_not_open_mask() {
    let (device, handles) = open();
    let mut config = mono(16000);
    let input = device
        .open_input_stream(AudioDevices::empty(), &mut config)
        .unwrap();
    let mut buffer = vec![0u8; 320];
    input.read(&mut buffer).unwrap();
    assert_eq!(device.routing().devices.inputs(), AudioDevices::IN_BUILTIN_MIC);
    assert_eq!(last_value(&handles, "IN2L Switch"), Some(1));
    assert_eq!(last_value(&handles, "AIF1ADC1L Mixer ADC/DMIC Switch"), Some(1));

    // the same inputs again are a no-op
    handles.mixer.clear();
    let same = format!("routing={}", AudioDevices::IN_BUILTIN_MIC.bits());
    input.set_parameters(&same).unwrap();
    assert!(handles.mixer.is_empty());

    let headset = format!("routing={}", AudioDevices::IN_WIRED_HEADSET.bits());
    input.set_parameters(&headset).unwrap();
    assert_eq!(device.routing().devices.inputs(), AudioDevices::IN_WIRED_HEADSET);
    assert_eq!(device.routing().devices.outputs(), AudioDevices::OUT_SPEAKER);
    assert!(!handles.mixer.is_empty());
}

/// Playback driver whose queue depth follows a script of `avail` answers.
#[derive(Clone, Default)]
struct ScriptedDriver {
    avail: Arc<Mutex<VecDeque<Option<usize>>>>,
    polls: Arc<Mutex<usize>>,
}

impl ScriptedDriver {
    fn with_script(script: &[Option<usize>]) -> Self {
        let driver = Self::default();
        driver.avail.lock().extend(script.iter().copied());
        driver
    }

    fn polls(&self) -> usize {
        *self.polls.lock()
    }
}

struct ScriptedPcm {
    config: PcmConfig,
    driver: ScriptedDriver,
}

impl Pcm for ScriptedPcm {
    fn config(&self) -> &PcmConfig {
        &self.config
    }

    fn start(&mut self) -> Result<(), PcmError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PcmError> {
        Ok(())
    }

    fn write(&mut self, _data: &[u8]) -> Result<(), PcmError> {
        Ok(())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<(), PcmError> {
        data.fill(0);
        Ok(())
    }

    fn avail(&self) -> Option<usize> {
        *self.driver.polls.lock() += 1;
        // an exhausted script means the queue has drained
        self.driver
            .avail
            .lock()
            .pop_front()
            .unwrap_or(Some(self.buffer_size()))
    }

    // twice the pacing threshold, so the queue can overshoot it
    fn buffer_size(&self) -> usize {
        self.config.buffer_frames() * 2
    }
}

impl PcmDriver for ScriptedDriver {
    fn open(
        &self,
        _card: u32,
        _port: PcmPort,
        _direction: PcmDirection,
        _flags: PcmFlags,
        config: &PcmConfig,
    ) -> Result<Box<dyn Pcm>, PcmError> {
        Ok(Box::new(ScriptedPcm {
            config: *config,
            driver: self.clone(),
        }))
    }
}

fn scripted_device(driver: &ScriptedDriver, min_write_sleep: Duration) -> AudioDevice {
    let backends = Backends {
        mixer: Box::new(SoftMixer::for_tables()),
        pcm: Arc::new(driver.clone()),
        modem: Box::new(RecordingModem::new()),
    };
    let config = HalConfig {
        min_write_sleep,
        ..HalConfig::default()
    };
    AudioDevice::open(backends, config).expect("open device")
}

#[test]
fn write_waits_for_an_overfull_queue_to_drain() {
    let threshold = PcmConfig::HIFI.buffer_frames();
    // 100 frames over the threshold, then back at it
    let driver = ScriptedDriver::with_script(&[Some(threshold - 100), Some(threshold)]);
    let min_sleep = Duration::from_millis(20);
    let device = scripted_device(&driver, min_sleep);
    let mut config = StreamConfig::default();
    let out = device
        .open_output_stream(AudioDevices::OUT_SPEAKER, &mut config)
        .unwrap();

    let started = Instant::now();
    assert_eq!(out.write(&[0u8; 1024]).unwrap(), 1024);
    assert!(started.elapsed() >= min_sleep);
    assert_eq!(driver.polls(), 2);
}

#[test]
fn write_skips_pacing_when_the_queue_is_unknown() {
    let driver = ScriptedDriver::with_script(&[None]);
    let min_sleep = Duration::from_millis(500);
    let device = scripted_device(&driver, min_sleep);
    let mut config = StreamConfig::default();
    let out = device
        .open_output_stream(AudioDevices::OUT_SPEAKER, &mut config)
        .unwrap();

    let started = Instant::now();
    assert_eq!(out.write(&[0u8; 1024]).unwrap(), 1024);
    assert!(started.elapsed() < min_sleep);
    assert_eq!(driver.polls(), 1);
}
