//! The audio device: routing state, both mixer paths, the modem client and
//! the call session, all behind one lock.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::call::{CallSession, CallState};
use crate::config::HalConfig;
use crate::devices::{AudioDevices, AudioMode};
use crate::mixer::{
    ControlStatus, Convergence, Mixer, MixerJournal, MixerPath, MixerReconciler, SoftMixer,
};
use crate::modem::{ModemLink, ModemLog, RecordingModem, Ril, SoundClock};
use crate::params::{KEY_BT_NREC, StrParms, VALUE_ON};
use crate::pcm::{PcmDriver, SoftPcmDriver};
use crate::routing::{CallAudioPath, RoutingState, call_entry_devices};
use crate::stream::{
    AudioStream, InputStream, OutputStream, StreamConfig, StreamIn, StreamOut,
    check_input_parameters, input_buffer_size,
};
use crate::{HalError, push_log};

/// Collaborators a device drives.
pub struct Backends {
    /// Codec control surface.
    pub mixer: Box<dyn Mixer>,
    /// PCM driver of the sound card.
    pub pcm: Arc<dyn PcmDriver>,
    /// Transport to the radio daemon.
    pub modem: Box<dyn ModemLink>,
}

/// Observation handles on the software backends.
#[derive(Clone)]
pub struct SoftHandles {
    /// Mixer writes.
    pub mixer: MixerJournal,
    /// PCM driver, for failure injection and capture feeding.
    pub pcm: SoftPcmDriver,
    /// Modem requests.
    pub modem: ModemLog,
}

impl Backends {
    /// Software mixer, PCM driver and modem.
    pub fn soft() -> (Self, SoftHandles) {
        let mixer = SoftMixer::for_tables();
        let pcm = SoftPcmDriver::new();
        let modem = RecordingModem::new();
        let handles = SoftHandles {
            mixer: mixer.journal(),
            pcm: pcm.clone(),
            modem: modem.log(),
        };
        let backends = Self {
            mixer: Box::new(mixer),
            pcm: Arc::new(pcm),
            modem: Box::new(modem),
        };
        (backends, handles)
    }
}

pub(crate) struct DeviceState {
    pub(crate) routing: RoutingState,
    mixer: Box<dyn Mixer>,
    output_path: MixerReconciler,
    input_path: MixerReconciler,
    ril: Ril,
    call: CallSession,
    active_output: Weak<OutputStream>,
    active_input: Weak<InputStream>,
}

impl DeviceState {
    pub(crate) fn converge(&mut self, path: MixerPath, on: bool) -> Convergence {
        let reconciler = match path {
            MixerPath::Output => &mut self.output_path,
            MixerPath::Input => &mut self.input_path,
        };
        reconciler.converge(
            self.mixer.as_mut(),
            self.routing.mode,
            self.routing.devices,
            on,
        )
    }

    /// Replace the output half of the routing and re-route the output path.
    pub(crate) fn reroute_output(&mut self, outputs: AudioDevices, on: bool) {
        let outputs = outputs.outputs();
        if outputs.is_empty() || outputs == self.routing.devices.outputs() {
            return;
        }
        info!(
            from = format_args!("{:#x}", self.routing.devices.outputs().bits()),
            to = format_args!("{:#x}", outputs.bits()),
            "output rerouted"
        );
        self.routing.devices = self.routing.devices.with_outputs(outputs);
        self.converge(MixerPath::Output, on);
        if self.routing.in_call {
            self.push_call_path();
        }
    }

    /// Replace the input half of the routing and re-route the input path.
    pub(crate) fn reroute_input(&mut self, inputs: AudioDevices, on: bool) {
        let inputs = inputs.inputs();
        if inputs.is_empty() || inputs == self.routing.devices.inputs() {
            return;
        }
        info!(
            from = format_args!("{:#x}", self.routing.devices.inputs().bits()),
            to = format_args!("{:#x}", inputs.bits()),
            "input rerouted"
        );
        self.routing.devices = self.routing.devices.with_inputs(inputs);
        self.converge(MixerPath::Input, on);
    }

    fn push_call_path(&mut self) {
        let path = self.routing.call_audio_path();
        self.ril.set_call_audio_path(path);
    }

    fn output_on(&self) -> bool {
        self.active_output
            .upgrade()
            .is_some_and(|out| !out.is_standby_locked(self))
    }

    fn input_on(&self) -> bool {
        self.active_input
            .upgrade()
            .is_some_and(|input| !input.is_standby_locked(self))
    }

    fn force_all_standby(&mut self) {
        if let Some(out) = self.active_output.upgrade() {
            let mut state = out.lock_state(self);
            OutputStream::standby_locked(&mut state, self);
        }
        if let Some(input) = self.active_input.upgrade() {
            let mut state = input.lock_state(self);
            InputStream::standby_locked(&mut state, self);
        }
    }

    fn set_all_route(&mut self) {
        let out_on = self.output_on();
        let in_on = self.input_on();
        self.converge(MixerPath::Output, out_on);
        self.converge(MixerPath::Input, in_on);
        self.push_call_path();
    }

    fn apply_voice_volume(&mut self) {
        if self.routing.mode == AudioMode::InCall {
            let sound = self.routing.sound_type();
            self.ril.set_call_volume(sound, self.routing.voice_volume);
        }
    }

    fn select_mode(&mut self, driver: &dyn PcmDriver, card: u32) {
        if self.routing.mode == AudioMode::InCall {
            if self.routing.in_call {
                return;
            }
            info!(
                devices = format_args!("{:#x}", self.routing.devices.bits()),
                "entering call"
            );
            self.force_all_standby();
            self.routing.devices = call_entry_devices(self.routing.devices);
            self.set_all_route();
            if let Err(err) = self.call.start(driver, card) {
                push_log(format!("modem pcm loop not started: {err}"));
            }
            self.ril.set_call_clock_sync(SoundClock::Start);
            self.apply_voice_volume();
            self.routing.in_call = true;
            push_log(format!(
                "call started on {}",
                self.routing.call_audio_path()
            ));
        } else if self.routing.in_call {
            info!(mode = %self.routing.mode, "leaving call");
            self.routing.in_call = false;
            self.call.stop();
            self.force_all_standby();
            self.set_all_route();
            push_log("call ended");
        }
    }
}

pub(crate) struct DeviceCore {
    pub(crate) state: Mutex<DeviceState>,
    pub(crate) pcm: Arc<dyn PcmDriver>,
    pub(crate) config: HalConfig,
}

/// Snapshot of the device for tooling.
#[derive(Clone, Debug)]
pub struct DeviceStatus {
    /// Routing facts.
    pub routing: RoutingState,
    /// Call state.
    pub call: CallState,
    /// Path the modem gets for the current devices.
    pub call_path: CallAudioPath,
    /// Both modem substreams are open.
    pub modem_pcm_active: bool,
    /// Standby flag of the active output stream, if any.
    pub output_standby: Option<bool>,
    /// Standby flag of the active input stream, if any.
    pub input_standby: Option<bool>,
    /// Output path controls.
    pub output_controls: Vec<ControlStatus>,
    /// Input path controls.
    pub input_controls: Vec<ControlStatus>,
}

/// Audio hardware device surface.
pub trait AudioHwDevice {
    /// Playback stream type.
    type Output: StreamOut;
    /// Capture stream type.
    type Input: StreamIn;

    /// Whether the device is usable.
    fn init_check(&self) -> Result<(), HalError>;
    /// Set the call volume, `0.0..=1.0`.
    fn set_voice_volume(&self, volume: f32) -> Result<(), HalError>;
    /// Set the master volume.
    fn set_master_volume(&self, _volume: f32) -> Result<(), HalError> {
        Err(HalError::NotSupported)
    }
    /// Change the telephony mode.
    fn set_mode(&self, mode: AudioMode) -> Result<(), HalError>;
    /// Mute or unmute capture.
    fn set_mic_mute(&self, mute: bool) -> Result<(), HalError>;
    /// Whether capture is muted.
    fn mic_mute(&self) -> bool;
    /// Apply `key=value` pairs.
    fn set_parameters(&self, kvpairs: &str) -> Result<(), HalError>;
    /// Query parameters; nothing is reported.
    fn get_parameters(&self, _keys: &str) -> String {
        String::new()
    }
    /// Capture buffer size for `config`, 0 when unsupported.
    fn input_buffer_size(&self, config: &StreamConfig) -> usize {
        input_buffer_size(config)
    }
    /// Open the playback stream; `config` receives the actual format.
    fn open_output_stream(
        &self,
        devices: AudioDevices,
        config: &mut StreamConfig,
    ) -> Result<Arc<Self::Output>, HalError>;
    /// Close a playback stream.
    fn close_output_stream(&self, stream: &Arc<Self::Output>);
    /// Open a capture stream.
    ///
    /// Capture follows the device routing; `devices` is informational.
    fn open_input_stream(
        &self,
        devices: AudioDevices,
        config: &mut StreamConfig,
    ) -> Result<Arc<Self::Input>, HalError>;
    /// Close a capture stream.
    fn close_input_stream(&self, stream: &Arc<Self::Input>);
    /// Devices this hardware can route to.
    fn supported_devices(&self) -> AudioDevices {
        AudioDevices::supported()
    }
}

/// Handle on an open device; clones share the device.
#[derive(Clone)]
pub struct AudioDevice {
    core: Arc<DeviceCore>,
}

impl AudioDevice {
    /// Open a device on `backends`.
    ///
    /// Both mixer paths are reset, input first, so the codec starts from a
    /// known state. Failing to open the modem client fails the open.
    pub fn open(backends: Backends, config: HalConfig) -> Result<Self, HalError> {
        let Backends {
            mut mixer,
            pcm,
            modem,
        } = backends;

        let mut output_path = MixerReconciler::new(MixerPath::Output);
        let mut input_path = MixerReconciler::new(MixerPath::Input);
        input_path.reset(mixer.as_mut());
        output_path.reset(mixer.as_mut());

        let ril = Ril::open(modem, config.call_volume_steps)?;
        let state = DeviceState {
            routing: RoutingState::default(),
            mixer,
            output_path,
            input_path,
            ril,
            call: CallSession::new(),
            active_output: Weak::new(),
            active_input: Weak::new(),
        };
        info!(card = config.card, "audio device opened");
        push_log(format!("device opened on card {}", config.card));
        Ok(Self {
            core: Arc::new(DeviceCore {
                state: Mutex::new(state),
                pcm,
                config,
            }),
        })
    }

    /// Open a device on the software backends.
    pub fn open_soft(config: HalConfig) -> Result<(Self, SoftHandles), HalError> {
        let (backends, handles) = Backends::soft();
        Ok((Self::open(backends, config)?, handles))
    }

    /// Configuration the device was opened with.
    pub fn config(&self) -> &HalConfig {
        &self.core.config
    }

    /// Copy of the routing facts.
    pub fn routing(&self) -> RoutingState {
        self.core.state.lock().routing
    }

    /// Current call state.
    pub fn call_state(&self) -> CallState {
        CallState::from(self.core.state.lock().routing.in_call)
    }

    /// Route the output path to `devices` without going through a stream.
    pub fn route_output(&self, devices: AudioDevices) {
        let mut device = self.core.state.lock();
        let on = device.output_on();
        device.reroute_output(devices, on);
    }

    /// Snapshot for tooling.
    pub fn status(&self) -> DeviceStatus {
        let device = self.core.state.lock();
        DeviceStatus {
            routing: device.routing,
            call: CallState::from(device.routing.in_call),
            call_path: device.routing.call_audio_path(),
            modem_pcm_active: device.call.is_active(),
            output_standby: device
                .active_output
                .upgrade()
                .map(|out| out.is_standby_locked(&device)),
            input_standby: device
                .active_input
                .upgrade()
                .map(|input| input.is_standby_locked(&device)),
            output_controls: device.output_path.snapshot(),
            input_controls: device.input_path.snapshot(),
        }
    }
}

impl AudioHwDevice for AudioDevice {
    type Output = OutputStream;
    type Input = InputStream;

    fn init_check(&self) -> Result<(), HalError> {
        Ok(())
    }

    fn set_voice_volume(&self, volume: f32) -> Result<(), HalError> {
        if !(0.0..=1.0).contains(&volume) {
            return Err(HalError::InvalidArgument(format!(
                "voice volume {volume} out of range"
            )));
        }
        let mut device = self.core.state.lock();
        device.routing.voice_volume = volume;
        debug!(volume, mode = %device.routing.mode, "voice volume");
        device.apply_voice_volume();
        Ok(())
    }

    fn set_mode(&self, mode: AudioMode) -> Result<(), HalError> {
        let mut device = self.core.state.lock();
        if device.routing.mode == mode {
            return Ok(());
        }
        debug!(from = %device.routing.mode, to = %mode, "mode change");
        device.routing.mode = mode;
        device.select_mode(&*self.core.pcm, self.core.config.card);
        Ok(())
    }

    fn set_mic_mute(&self, mute: bool) -> Result<(), HalError> {
        self.core.state.lock().routing.mic_mute = mute;
        Ok(())
    }

    fn mic_mute(&self) -> bool {
        self.core.state.lock().routing.mic_mute
    }

    fn set_parameters(&self, kvpairs: &str) -> Result<(), HalError> {
        debug!(kvpairs, "device set_parameters");
        let parms = StrParms::parse(kvpairs);
        if let Some(value) = parms.get(KEY_BT_NREC) {
            let nrec = value == VALUE_ON;
            let mut device = self.core.state.lock();
            if device.routing.bt_nrec != nrec {
                device.routing.bt_nrec = nrec;
                if device.routing.in_call {
                    device.push_call_path();
                }
            }
        }
        Ok(())
    }

    fn open_output_stream(
        &self,
        devices: AudioDevices,
        config: &mut StreamConfig,
    ) -> Result<Arc<OutputStream>, HalError> {
        let mut device = self.core.state.lock();
        if device.active_output.upgrade().is_some() {
            warn!("output stream already open");
            return Err(HalError::Busy("output"));
        }
        let stream = Arc::new(OutputStream::new(self.core.clone()));
        *config = stream.stream_config();
        device.active_output = Arc::downgrade(&stream);
        debug!(devices = format_args!("{:#x}", devices.bits()), "output stream opened");
        Ok(stream)
    }

    fn close_output_stream(&self, stream: &Arc<OutputStream>) {
        stream.enter_standby();
        let mut device = self.core.state.lock();
        if device
            .active_output
            .upgrade()
            .is_some_and(|active| Arc::ptr_eq(&active, stream))
        {
            device.active_output = Weak::new();
        }
        debug!("output stream closed");
    }

    fn open_input_stream(
        &self,
        devices: AudioDevices,
        config: &mut StreamConfig,
    ) -> Result<Arc<InputStream>, HalError> {
        check_input_parameters(config)?;
        let mut device = self.core.state.lock();
        if device.active_input.upgrade().is_some() {
            warn!("input stream already open");
            return Err(HalError::Busy("input"));
        }
        let stream = Arc::new(InputStream::new(self.core.clone(), config));
        device.active_input = Arc::downgrade(&stream);
        debug!(
            devices = format_args!("{:#x}", devices.bits()),
            rate = config.sample_rate,
            channels = config.channels,
            "input stream opened"
        );
        Ok(stream)
    }

    fn close_input_stream(&self, stream: &Arc<InputStream>) {
        stream.enter_standby();
        let mut device = self.core.state.lock();
        if device
            .active_input
            .upgrade()
            .is_some_and(|active| Arc::ptr_eq(&active, stream))
        {
            device.active_input = Weak::new();
        }
        debug!("input stream closed");
    }
}
