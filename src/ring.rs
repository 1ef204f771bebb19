//! Single-producer/single-consumer ring of interleaved `i16` frames.
//!
//! Backs the software PCM substreams. A ring opened for an MMAP substream
//! lives in an anonymous shared mapping laid out as header then samples, the
//! same layout a driver exposes to a peer process.
use std::cell::UnsafeCell;
use std::mem::size_of;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use memmap2::{MmapMut, MmapOptions};

/// Header stored at the front of a shared mapping.
#[repr(C, align(64))]
pub struct RingHeader {
    capacity_frames: u32,
    channels: u32,
    write_index: AtomicU64,
    read_index: AtomicU64,
}

impl RingHeader {
    fn new(capacity_frames: usize, channels: usize) -> Self {
        Self {
            capacity_frames: capacity_frames as u32,
            channels: channels as u32,
            write_index: AtomicU64::new(0),
            read_index: AtomicU64::new(0),
        }
    }
}

enum RingStorage {
    Local {
        header: RingHeader,
        data: Box<[UnsafeCell<i16>]>,
    },
    Shared {
        _mmap: MmapMut,
        header_ptr: *const RingHeader,
        data_ptr: *mut i16,
    },
}

/// Lock-free frame ring.
///
/// One thread pushes and one thread pops; the indices are free-running frame
/// counters and only their difference matters.
pub struct PcmRing {
    storage: RingStorage,
    capacity_frames: usize,
    channels: usize,
}

unsafe impl Send for PcmRing {}
unsafe impl Sync for PcmRing {}

impl PcmRing {
    /// Ring in process memory.
    pub fn new_local(capacity_frames: usize, channels: usize) -> Self {
        let channels = channels.max(1);
        Self {
            storage: RingStorage::Local {
                header: RingHeader::new(capacity_frames, channels),
                data: (0..capacity_frames * channels)
                    .map(|_| UnsafeCell::new(0))
                    .collect(),
            },
            capacity_frames,
            channels,
        }
    }

    /// Ring in an anonymous shared mapping.
    pub fn new_shared(capacity_frames: usize, channels: usize) -> std::io::Result<Self> {
        let channels = channels.max(1);
        let bytes = size_of::<RingHeader>() + size_of::<i16>() * capacity_frames * channels;
        let mut mmap = MmapOptions::new().len(bytes).map_anon()?;
        let header_ptr = mmap.as_mut_ptr() as *mut RingHeader;
        // The mapping is page aligned and at least header-sized.
        unsafe { header_ptr.write(RingHeader::new(capacity_frames, channels)) };
        let data_ptr = unsafe { mmap.as_mut_ptr().add(size_of::<RingHeader>()) as *mut i16 };
        Ok(Self {
            storage: RingStorage::Shared {
                _mmap: mmap,
                header_ptr,
                data_ptr,
            },
            capacity_frames,
            channels,
        })
    }

    fn header(&self) -> &RingHeader {
        match &self.storage {
            RingStorage::Local { header, .. } => header,
            RingStorage::Shared { header_ptr, .. } => unsafe { &**header_ptr },
        }
    }

    fn data_ptr(&self) -> *mut i16 {
        match &self.storage {
            RingStorage::Local { data, .. } => UnsafeCell::raw_get(data.as_ptr()),
            RingStorage::Shared { data_ptr, .. } => *data_ptr,
        }
    }

    /// Copy `src` into the sample area at `offset`.
    ///
    /// The producer only writes frames the consumer has released.
    fn store(&self, offset: usize, src: &[i16]) {
        debug_assert!(offset + src.len() <= self.capacity_frames * self.channels);
        unsafe { ptr::copy_nonoverlapping(src.as_ptr(), self.data_ptr().add(offset), src.len()) }
    }

    /// Copy samples at `offset` out into `dst`.
    fn load(&self, offset: usize, dst: &mut [i16]) {
        debug_assert!(offset + dst.len() <= self.capacity_frames * self.channels);
        unsafe { ptr::copy_nonoverlapping(self.data_ptr().add(offset), dst.as_mut_ptr(), dst.len()) }
    }

    /// Whether the samples live in a shared mapping.
    pub fn is_shared(&self) -> bool {
        matches!(self.storage, RingStorage::Shared { .. })
    }

    /// Total capacity in frames.
    pub fn capacity_frames(&self) -> usize {
        self.capacity_frames
    }

    /// Samples per frame.
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Frames ready for reading.
    pub fn available_read(&self) -> usize {
        let header = self.header();
        let write_index = header.write_index.load(Ordering::Acquire);
        let read_index = header.read_index.load(Ordering::Acquire);
        write_index
            .saturating_sub(read_index)
            .min(self.capacity_frames as u64) as usize
    }

    /// Frames that can be pushed without overwriting.
    pub fn available_write(&self) -> usize {
        self.capacity_frames - self.available_read()
    }

    /// Push whole frames from `frames`, returning the number written.
    pub fn push(&self, frames: &[i16]) -> usize {
        let count = (frames.len() / self.channels).min(self.available_write());
        if count == 0 {
            return 0;
        }
        let header = self.header();
        let write_index = header.write_index.load(Ordering::Acquire);

        let start = (write_index % self.capacity_frames as u64) as usize;
        let first = (self.capacity_frames - start).min(count);
        let first_samples = first * self.channels;
        self.store(start * self.channels, &frames[..first_samples]);
        if count > first {
            let rest = (count - first) * self.channels;
            self.store(0, &frames[first_samples..first_samples + rest]);
        }

        header
            .write_index
            .store(write_index + count as u64, Ordering::Release);
        count
    }

    /// Pop whole frames into `out`, returning the number read.
    pub fn pop(&self, out: &mut [i16]) -> usize {
        let count = (out.len() / self.channels).min(self.available_read());
        if count == 0 {
            return 0;
        }
        let header = self.header();
        let read_index = header.read_index.load(Ordering::Acquire);

        let start = (read_index % self.capacity_frames as u64) as usize;
        let first = (self.capacity_frames - start).min(count);
        let first_samples = first * self.channels;
        self.load(start * self.channels, &mut out[..first_samples]);
        if count > first {
            let rest = (count - first) * self.channels;
            self.load(0, &mut out[first_samples..first_samples + rest]);
        }

        header
            .read_index
            .store(read_index + count as u64, Ordering::Release);
        count
    }

    /// Drop up to `frames` of the oldest frames, returning the number dropped.
    pub fn discard(&self, frames: usize) -> usize {
        let frames = frames.min(self.available_read());
        let header = self.header();
        let read_index = header.read_index.load(Ordering::Acquire);
        header
            .read_index
            .store(read_index + frames as u64, Ordering::Release);
        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_pop_wraps_around() {
        let ring = PcmRing::new_local(4, 2);
        assert_eq!(ring.push(&[1, 1, 2, 2, 3, 3]), 3);
        let mut out = [0i16; 4];
        assert_eq!(ring.pop(&mut out), 2);
        assert_eq!(out, [1, 1, 2, 2]);

        assert_eq!(ring.push(&[4, 4, 5, 5, 6, 6, 7, 7]), 3);
        let mut out = [0i16; 8];
        assert_eq!(ring.pop(&mut out), 4);
        assert_eq!(out, [3, 3, 4, 4, 5, 5, 6, 6]);
        assert_eq!(ring.available_read(), 0);
    }

    #[test]
    fn shared_ring_behaves_like_local() {
        let ring = PcmRing::new_shared(8, 1).unwrap();
        assert!(ring.is_shared());
        assert_eq!(ring.push(&[1, 2, 3, 4, 5]), 5);
        assert_eq!(ring.discard(2), 2);
        let mut out = [0i16; 3];
        assert_eq!(ring.pop(&mut out), 3);
        assert_eq!(out, [3, 4, 5]);
    }

    #[test]
    fn producer_and_consumer_threads_share_a_ring() {
        let ring = std::sync::Arc::new(PcmRing::new_shared(64, 2).unwrap());
        let producer = {
            let ring = ring.clone();
            std::thread::spawn(move || {
                let mut next = 0i16;
                while next < 2000 {
                    let frame = [next, next];
                    if ring.push(&frame) == 1 {
                        next += 1;
                    } else {
                        std::thread::yield_now();
                    }
                }
            })
        };

        let mut expected = 0i16;
        let mut out = [0i16; 16];
        while expected < 2000 {
            let frames = ring.pop(&mut out);
            for frame in out[..frames * 2].chunks_exact(2) {
                assert_eq!(frame, [expected, expected]);
                expected += 1;
            }
            if frames == 0 {
                std::thread::yield_now();
            }
        }
        producer.join().unwrap();
        assert_eq!(ring.available_read(), 0);
    }
}
