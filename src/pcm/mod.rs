//! PCM substreams of the sound card.
//!
//! [`PcmDriver`] opens substreams with one of the fixed configurations below;
//! the returned [`Pcm`] is closed when dropped.

use bitflags::bitflags;

pub mod soft;

pub use soft::{PcmEvent, SoftPcmDriver};

/// Sample format.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PcmFormat {
    /// Signed 16-bit little endian.
    #[default]
    S16Le,
}

impl PcmFormat {
    /// Bytes per sample.
    pub fn bytes_per_sample(self) -> usize {
        match self {
            PcmFormat::S16Le => 2,
        }
    }
}

/// Hardware parameters of a substream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PcmConfig {
    /// Interleaved channels.
    pub channels: u32,
    /// Frames per second.
    pub rate: u32,
    /// Frames per period.
    pub period_size: usize,
    /// Periods in the buffer.
    pub period_count: usize,
    /// Sample format.
    pub format: PcmFormat,
    /// Queued frames that start playback, 0 for the driver default.
    pub start_threshold: usize,
    /// Minimum free frames before a blocked write wakes, 0 for the default.
    pub avail_min: usize,
}

/// Playback sample rate of the codec.
pub const DEFAULT_SAMPLING_RATE: u32 = 44100;
/// Frames per playback period.
pub const PLAYBACK_PERIOD_SIZE: usize = 2048;
/// Playback periods.
pub const PLAYBACK_PERIOD_COUNT: usize = 4;
/// Frames per capture period.
pub const CAPTURE_PERIOD_SIZE: usize = 1024;
/// Capture periods.
pub const CAPTURE_PERIOD_COUNT: usize = 4;

impl PcmConfig {
    /// Media playback on the hifi port.
    pub const HIFI: PcmConfig = PcmConfig {
        channels: 2,
        rate: DEFAULT_SAMPLING_RATE,
        period_size: PLAYBACK_PERIOD_SIZE,
        period_count: PLAYBACK_PERIOD_COUNT,
        format: PcmFormat::S16Le,
        start_threshold: PLAYBACK_PERIOD_SIZE * 2,
        avail_min: PLAYBACK_PERIOD_SIZE,
    };

    /// Capture on the hifi port; channels follow the stream.
    pub const HIFI_UL: PcmConfig = PcmConfig {
        channels: 2,
        rate: DEFAULT_SAMPLING_RATE,
        period_size: CAPTURE_PERIOD_SIZE,
        period_count: CAPTURE_PERIOD_COUNT,
        format: PcmFormat::S16Le,
        start_threshold: 0,
        avail_min: 0,
    };

    /// Voice call loop on the modem port.
    pub const VX: PcmConfig = PcmConfig {
        channels: 2,
        rate: 8000,
        period_size: 160,
        period_count: 2,
        format: PcmFormat::S16Le,
        start_threshold: 0,
        avail_min: 0,
    };

    /// Bytes per frame.
    pub fn frame_bytes(&self) -> usize {
        self.channels as usize * self.format.bytes_per_sample()
    }

    /// Frames in the whole buffer.
    pub fn buffer_frames(&self) -> usize {
        self.period_size * self.period_count
    }
}

/// Card device a substream is opened on.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PcmPort {
    /// Application processor audio interface.
    Hifi = 0,
    /// Modem voice interface.
    Modem = 1,
}

/// Data direction of a substream.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PcmDirection {
    /// Host to codec.
    Playback,
    /// Codec to host.
    Capture,
}

bitflags! {
    /// Open flags of a substream.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PcmFlags: u32 {
        /// Transfer through a mapped buffer.
        const MMAP = 0x0000_0001;
        /// No period interrupts; the writer paces itself.
        const NOIRQ = 0x0000_0002;
    }
}

/// PCM failures.
#[derive(thiserror::Error, Debug)]
pub enum PcmError {
    /// The substream could not be opened.
    #[error("cannot open pcm {card}:{port:?} {direction:?}: {reason}")]
    Open {
        /// Card index.
        card: u32,
        /// Card device.
        port: PcmPort,
        /// Direction.
        direction: PcmDirection,
        /// Driver message.
        reason: String,
    },
    /// A transfer was not a whole number of frames.
    #[error("transfer of {len} bytes is not a multiple of the {frame_bytes}-byte frame")]
    Misaligned {
        /// Transfer length.
        len: usize,
        /// Frame size.
        frame_bytes: usize,
    },
    /// A transfer failed on the driver side.
    #[error("pcm i/o failed: {0}")]
    Io(String),
    /// Backing memory could not be mapped.
    #[error("pcm buffer mapping failed")]
    Map(#[from] std::io::Error),
}

/// Open substream.
pub trait Pcm: Send {
    /// Configuration the substream was opened with.
    fn config(&self) -> &PcmConfig;
    /// Start the transfer.
    fn start(&mut self) -> Result<(), PcmError>;
    /// Stop the transfer.
    fn stop(&mut self) -> Result<(), PcmError>;
    /// Queue interleaved frames for playback; starts a stopped substream.
    fn write(&mut self, data: &[u8]) -> Result<(), PcmError>;
    /// Fill `data` with captured frames; starts a stopped substream.
    fn read(&mut self, data: &mut [u8]) -> Result<(), PcmError>;
    /// Frames the application can transfer without blocking, if known.
    fn avail(&self) -> Option<usize>;
    /// Buffer size in frames.
    fn buffer_size(&self) -> usize {
        self.config().buffer_frames()
    }
}

/// Opens substreams on a card.
pub trait PcmDriver: Send + Sync {
    /// Open `port` on `card` in `direction` with `config`.
    fn open(
        &self,
        card: u32,
        port: PcmPort,
        direction: PcmDirection,
        flags: PcmFlags,
        config: &PcmConfig,
    ) -> Result<Box<dyn Pcm>, PcmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_configs() {
        assert_eq!(PcmConfig::HIFI.buffer_frames(), 8192);
        assert_eq!(PcmConfig::HIFI.frame_bytes(), 4);
        assert_eq!(PcmConfig::HIFI_UL.buffer_frames(), 4096);
        assert_eq!(PcmConfig::VX.buffer_frames(), 320);
        assert_eq!(PcmConfig::VX.rate, 8000);
    }
}
