//! Modem PCM loop of a voice call.
//!
//! While a call is up the codec exchanges voice frames with the modem over
//! the modem port: a downlink playback substream and an uplink capture
//! substream, both running the narrowband [`PcmConfig::VX`] configuration.

use std::fmt;

use tracing::{debug, error};

use crate::pcm::{Pcm, PcmConfig, PcmDirection, PcmDriver, PcmError, PcmFlags, PcmPort};

/// Call state of the device.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CallState {
    /// No call audio.
    #[default]
    Idle,
    /// Voice call routed through the modem.
    InCall,
}

impl From<bool> for CallState {
    fn from(in_call: bool) -> Self {
        if in_call {
            CallState::InCall
        } else {
            CallState::Idle
        }
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallState::Idle => f.write_str("idle"),
            CallState::InCall => f.write_str("in-call"),
        }
    }
}

/// Modem-side substreams of the current call.
#[derive(Default)]
pub struct CallSession {
    downlink: Option<Box<dyn Pcm>>,
    uplink: Option<Box<dyn Pcm>>,
}

impl CallSession {
    /// No substreams open.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether both substreams are open.
    pub fn is_active(&self) -> bool {
        self.downlink.is_some() && self.uplink.is_some()
    }

    /// Open and start the downlink and uplink substreams.
    ///
    /// On failure nothing stays open.
    pub fn start(&mut self, driver: &dyn PcmDriver, card: u32) -> Result<(), PcmError> {
        self.stop();
        let result = open_pair(driver, card);
        match result {
            Ok((downlink, uplink)) => {
                self.downlink = Some(downlink);
                self.uplink = Some(uplink);
                debug!(card, "modem pcm loop started");
                Ok(())
            }
            Err(err) => {
                error!(card, %err, "cannot start modem pcm loop");
                Err(err)
            }
        }
    }

    /// Stop and close both substreams.
    pub fn stop(&mut self) {
        for (name, pcm) in [("downlink", &mut self.downlink), ("uplink", &mut self.uplink)] {
            if let Some(mut pcm) = pcm.take() {
                if let Err(err) = pcm.stop() {
                    error!(substream = name, %err, "modem pcm stop failed");
                }
            }
        }
    }
}

fn open_pair(
    driver: &dyn PcmDriver,
    card: u32,
) -> Result<(Box<dyn Pcm>, Box<dyn Pcm>), PcmError> {
    let open = |direction| {
        driver.open(
            card,
            PcmPort::Modem,
            direction,
            PcmFlags::empty(),
            &PcmConfig::VX,
        )
    };
    let mut downlink = open(PcmDirection::Playback)?;
    let mut uplink = open(PcmDirection::Capture)?;
    downlink.start()?;
    uplink.start()?;
    Ok((downlink, uplink))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pcm::{PcmEvent, SoftPcmDriver};

    #[test]
    fn uplink_failure_releases_downlink() {
        let driver = SoftPcmDriver::new();
        driver.fail_open(PcmPort::Modem, PcmDirection::Capture);
        let mut call = CallSession::new();
        assert!(call.start(&driver, 0).is_err());
        assert!(!call.is_active());
        assert!(!driver.is_open(PcmPort::Modem, PcmDirection::Playback));
    }

    #[test]
    fn stop_closes_both_substreams() {
        let driver = SoftPcmDriver::new();
        let mut call = CallSession::new();
        call.start(&driver, 0).unwrap();
        assert!(call.is_active());
        call.stop();
        assert!(!call.is_active());

        let events = driver.events();
        assert!(events.contains(&PcmEvent::Closed(PcmPort::Modem, PcmDirection::Playback)));
        assert!(events.contains(&PcmEvent::Closed(PcmPort::Modem, PcmDirection::Capture)));
    }
}
