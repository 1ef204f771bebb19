//! Software PCM driver backed by sample rings.
//!
//! Nothing drains playback rings: once full, the oldest queued frames are
//! overwritten. Capture rings are fed by whoever holds the ring handle; frames
//! nobody fed read back as silence.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tracing::debug;

use crate::pcm::{Pcm, PcmConfig, PcmDirection, PcmDriver, PcmError, PcmFlags, PcmPort};
use crate::ring::PcmRing;

/// Substream activity observed by a [`SoftPcmDriver`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PcmEvent {
    /// Substream opened.
    Opened(PcmPort, PcmDirection),
    /// Transfer started.
    Started(PcmPort, PcmDirection),
    /// Transfer stopped.
    Stopped(PcmPort, PcmDirection),
    /// Substream closed.
    Closed(PcmPort, PcmDirection),
}

type Key = (PcmPort, PcmDirection);

#[derive(Default)]
struct Shared {
    events: Mutex<Vec<PcmEvent>>,
    failing_opens: Mutex<HashSet<Key>>,
    failing_io: AtomicBool,
    rings: Mutex<HashMap<Key, Arc<PcmRing>>>,
    live: Mutex<HashMap<Key, usize>>,
}

impl Shared {
    fn record(&self, event: PcmEvent) {
        self.events.lock().push(event);
    }
}

/// In-process PCM driver; clones share state.
#[derive(Clone, Default)]
pub struct SoftPcmDriver {
    shared: Arc<Shared>,
}

impl SoftPcmDriver {
    /// Driver that opens every substream.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make opens of `port` in `direction` fail until [`Self::allow_open`].
    pub fn fail_open(&self, port: PcmPort, direction: PcmDirection) {
        self.shared.failing_opens.lock().insert((port, direction));
    }

    /// Undo [`Self::fail_open`].
    pub fn allow_open(&self, port: PcmPort, direction: PcmDirection) {
        self.shared.failing_opens.lock().remove(&(port, direction));
    }

    /// Make every read and write fail while set.
    pub fn fail_io(&self, failing: bool) {
        self.shared.failing_io.store(failing, Ordering::Release);
    }

    /// Copy of the recorded events.
    pub fn events(&self) -> Vec<PcmEvent> {
        self.shared.events.lock().clone()
    }

    /// Recorded events, clearing the record.
    pub fn take_events(&self) -> Vec<PcmEvent> {
        std::mem::take(&mut *self.shared.events.lock())
    }

    /// Ring of the most recent substream opened on `port` in `direction`.
    pub fn ring(&self, port: PcmPort, direction: PcmDirection) -> Option<Arc<PcmRing>> {
        self.shared.rings.lock().get(&(port, direction)).cloned()
    }

    /// Whether a substream on `port` in `direction` is open.
    pub fn is_open(&self, port: PcmPort, direction: PcmDirection) -> bool {
        self.shared
            .live
            .lock()
            .get(&(port, direction))
            .is_some_and(|&n| n > 0)
    }
}

impl PcmDriver for SoftPcmDriver {
    fn open(
        &self,
        card: u32,
        port: PcmPort,
        direction: PcmDirection,
        flags: PcmFlags,
        config: &PcmConfig,
    ) -> Result<Box<dyn Pcm>, PcmError> {
        let key = (port, direction);
        if self.shared.failing_opens.lock().contains(&key) {
            return Err(PcmError::Open {
                card,
                port,
                direction,
                reason: "device busy".to_string(),
            });
        }

        let frames = config.buffer_frames();
        let channels = config.channels as usize;
        let ring = if flags.contains(PcmFlags::MMAP) {
            PcmRing::new_shared(frames, channels)?
        } else {
            PcmRing::new_local(frames, channels)
        };
        let ring = Arc::new(ring);
        self.shared.rings.lock().insert(key, ring.clone());
        *self.shared.live.lock().entry(key).or_default() += 1;
        self.shared.record(PcmEvent::Opened(port, direction));
        debug!(card, ?port, ?direction, rate = config.rate, "soft pcm opened");

        Ok(Box::new(SoftPcm {
            shared: self.shared.clone(),
            port,
            direction,
            config: *config,
            ring,
            running: false,
        }))
    }
}

struct SoftPcm {
    shared: Arc<Shared>,
    port: PcmPort,
    direction: PcmDirection,
    config: PcmConfig,
    ring: Arc<PcmRing>,
    running: bool,
}

impl SoftPcm {
    fn check(&self, len: usize) -> Result<(), PcmError> {
        let frame_bytes = self.config.frame_bytes();
        if len % frame_bytes != 0 {
            return Err(PcmError::Misaligned { len, frame_bytes });
        }
        if self.shared.failing_io.load(Ordering::Acquire) {
            return Err(PcmError::Io("injected failure".to_string()));
        }
        Ok(())
    }

    fn ensure_running(&mut self) -> Result<(), PcmError> {
        if !self.running {
            self.start()?;
        }
        Ok(())
    }
}

impl Pcm for SoftPcm {
    fn config(&self) -> &PcmConfig {
        &self.config
    }

    fn start(&mut self) -> Result<(), PcmError> {
        self.running = true;
        self.shared
            .record(PcmEvent::Started(self.port, self.direction));
        Ok(())
    }

    fn stop(&mut self) -> Result<(), PcmError> {
        self.running = false;
        self.shared
            .record(PcmEvent::Stopped(self.port, self.direction));
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<(), PcmError> {
        self.check(data.len())?;
        self.ensure_running()?;
        let samples: Vec<i16> = data
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        let channels = self.ring.channels();
        let capacity = self.ring.capacity_frames();
        let frames = samples.len() / channels;
        let tail = &samples[frames.saturating_sub(capacity) * channels..];
        let needed = tail.len() / channels;
        let free = self.ring.available_write();
        if needed > free {
            self.ring.discard(needed - free);
        }
        self.ring.push(tail);
        Ok(())
    }

    fn read(&mut self, data: &mut [u8]) -> Result<(), PcmError> {
        self.check(data.len())?;
        self.ensure_running()?;
        let mut samples = vec![0i16; data.len() / 2];
        self.ring.pop(&mut samples);
        for (bytes, sample) in data.chunks_exact_mut(2).zip(&samples) {
            bytes.copy_from_slice(&sample.to_le_bytes());
        }
        Ok(())
    }

    fn avail(&self) -> Option<usize> {
        match self.direction {
            PcmDirection::Playback => Some(self.ring.available_write()),
            PcmDirection::Capture => Some(self.ring.available_read()),
        }
    }
}

impl Drop for SoftPcm {
    fn drop(&mut self) {
        let key = (self.port, self.direction);
        if let Some(count) = self.shared.live.lock().get_mut(&key) {
            *count = count.saturating_sub(1);
        }
        self.shared.record(PcmEvent::Closed(self.port, self.direction));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn playback_overwrites_oldest_frames() {
        let driver = SoftPcmDriver::new();
        let config = PcmConfig {
            channels: 1,
            period_size: 2,
            period_count: 2,
            ..PcmConfig::VX
        };
        let mut pcm = driver
            .open(0, PcmPort::Hifi, PcmDirection::Playback, PcmFlags::empty(), &config)
            .unwrap();
        pcm.write(&bytes(&[1, 2, 3])).unwrap();
        assert_eq!(pcm.avail(), Some(1));
        pcm.write(&bytes(&[4, 5])).unwrap();
        assert_eq!(pcm.avail(), Some(0));

        let ring = driver.ring(PcmPort::Hifi, PcmDirection::Playback).unwrap();
        let mut out = [0i16; 4];
        assert_eq!(ring.pop(&mut out), 4);
        assert_eq!(out, [2, 3, 4, 5]);
    }

    #[test]
    fn capture_pads_with_silence() {
        let driver = SoftPcmDriver::new();
        let mut pcm = driver
            .open(0, PcmPort::Hifi, PcmDirection::Capture, PcmFlags::MMAP, &PcmConfig::HIFI_UL)
            .unwrap();
        let ring = driver.ring(PcmPort::Hifi, PcmDirection::Capture).unwrap();
        assert!(ring.is_shared());
        ring.push(&[7, 8]);

        let mut data = vec![0xffu8; 8];
        pcm.read(&mut data).unwrap();
        assert_eq!(data, bytes(&[7, 8, 0, 0]));
        assert!(pcm.read(&mut [0u8; 3]).is_err());
    }

    #[test]
    fn open_failures_and_close_are_tracked() {
        let driver = SoftPcmDriver::new();
        driver.fail_open(PcmPort::Modem, PcmDirection::Capture);
        assert!(driver
            .open(0, PcmPort::Modem, PcmDirection::Capture, PcmFlags::empty(), &PcmConfig::VX)
            .is_err());

        let pcm = driver
            .open(0, PcmPort::Modem, PcmDirection::Playback, PcmFlags::empty(), &PcmConfig::VX)
            .unwrap();
        assert!(driver.is_open(PcmPort::Modem, PcmDirection::Playback));
        drop(pcm);
        assert!(!driver.is_open(PcmPort::Modem, PcmDirection::Playback));
        assert_eq!(
            driver.events(),
            vec![
                PcmEvent::Opened(PcmPort::Modem, PcmDirection::Playback),
                PcmEvent::Closed(PcmPort::Modem, PcmDirection::Playback),
            ]
        );
    }
}
