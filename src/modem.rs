//! Client side of the modem's audio-path requests.
//!
//! The baseband owns the call audio once a call is up; the HAL only tells it
//! where to route (path), how loud (volume per curve) and when to lock its
//! clock to the codec (clock sync). Every request is fire-and-forget: a
//! failed send is logged and the HAL carries on.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::push_log;
use crate::routing::{CallAudioPath, SoundType};

/// Modem clock-sync request.
#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SoundClock {
    /// Release the clock.
    Stop = 0,
    /// Lock the modem clock to the codec.
    Start = 1,
}

/// Failures of the modem client.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ModemError {
    /// The client library could not be opened.
    #[error("modem client unavailable")]
    Unavailable,
    /// The client could not reach the radio daemon.
    #[error("radio daemon not reachable")]
    NotConnected,
    /// The daemon rejected or dropped a request.
    #[error("modem request {0} failed")]
    Request(&'static str),
}

/// Transport to the radio daemon.
pub trait ModemLink: Send {
    /// Open the client.
    fn open(&mut self) -> Result<(), ModemError>;
    /// Connect to the daemon.
    fn connect(&mut self) -> Result<(), ModemError>;
    /// Whether a connection is up.
    fn is_connected(&self) -> bool;
    /// Set the call volume for a volume curve.
    fn set_call_volume(&mut self, sound: SoundType, level: i32) -> Result<(), ModemError>;
    /// Select the modem audio path.
    fn set_call_audio_path(&mut self, path: CallAudioPath) -> Result<(), ModemError>;
    /// Start or stop clock sync.
    fn set_call_clock_sync(&mut self, clock: SoundClock) -> Result<(), ModemError>;
    /// Tear the client down.
    fn close(&mut self) {}
}

/// Best-effort front end over a [`ModemLink`].
pub struct Ril {
    link: Box<dyn ModemLink>,
    volume_steps: u32,
}

impl Ril {
    /// Open `link`; a link that cannot be opened is fatal to the device.
    pub fn open(mut link: Box<dyn ModemLink>, volume_steps: u32) -> Result<Self, ModemError> {
        link.open()?;
        Ok(Self { link, volume_steps })
    }

    /// Integer volume level the modem expects for `volume`.
    pub fn volume_level(volume: f32, steps: u32) -> i32 {
        (volume.clamp(0.0, 1.0) * steps as f32) as i32
    }

    /// Whether the link is connected.
    pub fn is_connected(&self) -> bool {
        self.link.is_connected()
    }

    /// Send the call volume for `sound`.
    pub fn set_call_volume(&mut self, sound: SoundType, volume: f32) {
        let level = Self::volume_level(volume, self.volume_steps);
        self.send("set_call_volume", |link| link.set_call_volume(sound, level));
    }

    /// Select the modem audio path.
    pub fn set_call_audio_path(&mut self, path: CallAudioPath) {
        self.send("set_call_audio_path", |link| link.set_call_audio_path(path));
    }

    /// Start or stop the modem clock sync.
    pub fn set_call_clock_sync(&mut self, clock: SoundClock) {
        self.send("set_call_clock_sync", |link| link.set_call_clock_sync(clock));
    }

    fn connect_if_required(&mut self) -> Result<(), ModemError> {
        if self.link.is_connected() {
            return Ok(());
        }
        self.link.connect()
    }

    fn send(
        &mut self,
        request: &'static str,
        f: impl FnOnce(&mut dyn ModemLink) -> Result<(), ModemError>,
    ) {
        if let Err(err) = self.connect_if_required() {
            warn!(request, %err, "modem request dropped");
            push_log(format!("modem {request} dropped: {err}"));
            return;
        }
        match f(self.link.as_mut()) {
            Ok(()) => debug!(request, "modem request sent"),
            Err(err) => {
                warn!(request, %err, "modem request failed");
                push_log(format!("modem {request} failed: {err}"));
            }
        }
    }
}

impl Drop for Ril {
    fn drop(&mut self) {
        self.link.close();
    }
}

/// Request observed by a [`RecordingModem`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModemEvent {
    /// Client opened.
    Opened,
    /// Connected to the daemon.
    Connected,
    /// Call volume request.
    Volume {
        /// Volume curve.
        sound: SoundType,
        /// Integer level.
        level: i32,
    },
    /// Audio path request.
    AudioPath(CallAudioPath),
    /// Clock sync request.
    ClockSync(SoundClock),
    /// Client closed.
    Closed,
}

/// Shared record of what a [`RecordingModem`] was asked to do.
#[derive(Clone, Debug, Default)]
pub struct ModemLog(Arc<Mutex<Vec<ModemEvent>>>);

impl ModemLog {
    /// Copy of the recorded events.
    pub fn events(&self) -> Vec<ModemEvent> {
        self.0.lock().clone()
    }

    /// Recorded events, clearing the log.
    pub fn take(&self) -> Vec<ModemEvent> {
        std::mem::take(&mut *self.0.lock())
    }

    /// Audio path requests, in order.
    pub fn audio_paths(&self) -> Vec<CallAudioPath> {
        self.0
            .lock()
            .iter()
            .filter_map(|event| match event {
                ModemEvent::AudioPath(path) => Some(*path),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: ModemEvent) {
        self.0.lock().push(event);
    }
}

/// In-process modem that records every request.
#[derive(Default)]
pub struct RecordingModem {
    log: ModemLog,
    connected: bool,
    fail_open: bool,
    fail_connect: bool,
    fail_requests: bool,
}

impl RecordingModem {
    /// Modem accepting every request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle on the event log.
    pub fn log(&self) -> ModemLog {
        self.log.clone()
    }

    /// Fail [`ModemLink::open`].
    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Never connect to the daemon.
    pub fn refusing_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    /// Reject every request after connecting.
    pub fn failing_requests(mut self) -> Self {
        self.fail_requests = true;
        self
    }

    fn request(&mut self, name: &'static str, event: ModemEvent) -> Result<(), ModemError> {
        if self.fail_requests {
            return Err(ModemError::Request(name));
        }
        self.log.push(event);
        Ok(())
    }
}

impl ModemLink for RecordingModem {
    fn open(&mut self) -> Result<(), ModemError> {
        if self.fail_open {
            return Err(ModemError::Unavailable);
        }
        self.log.push(ModemEvent::Opened);
        Ok(())
    }

    fn connect(&mut self) -> Result<(), ModemError> {
        if self.fail_connect {
            return Err(ModemError::NotConnected);
        }
        self.connected = true;
        self.log.push(ModemEvent::Connected);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn set_call_volume(&mut self, sound: SoundType, level: i32) -> Result<(), ModemError> {
        self.request("volume", ModemEvent::Volume { sound, level })
    }

    fn set_call_audio_path(&mut self, path: CallAudioPath) -> Result<(), ModemError> {
        self.request("audio_path", ModemEvent::AudioPath(path))
    }

    fn set_call_clock_sync(&mut self, clock: SoundClock) -> Result<(), ModemError> {
        self.request("clock_sync", ModemEvent::ClockSync(clock))
    }

    fn close(&mut self) {
        self.connected = false;
        self.log.push(ModemEvent::Closed);
    }
}
