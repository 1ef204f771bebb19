//! Linear interpolating sample-rate converter for interleaved `i16` frames.
//!
//! Capture streams read the codec at its native rate and hand clients their
//! requested rate. The converter keeps the last input frame and the fractional
//! read position between calls, so consecutive buffers join without a seam.

/// Stateful linear resampler.
#[derive(Clone, Debug)]
pub struct LinearResampler {
    in_rate: u32,
    out_rate: u32,
    channels: usize,
    step: f64,
    phase: f64,
    prev: Option<Vec<i16>>,
}

impl LinearResampler {
    /// Converter from `in_rate` to `out_rate` for `channels` interleaved channels.
    pub fn new(in_rate: u32, out_rate: u32, channels: usize) -> Self {
        Self {
            in_rate,
            out_rate,
            channels: channels.max(1),
            step: in_rate as f64 / out_rate.max(1) as f64,
            phase: 0.0,
            prev: None,
        }
    }

    /// Source rate.
    pub fn in_rate(&self) -> u32 {
        self.in_rate
    }

    /// Target rate.
    pub fn out_rate(&self) -> u32 {
        self.out_rate
    }

    /// Forget the carried frame and position.
    pub fn reset(&mut self) {
        self.phase = 0.0;
        self.prev = None;
    }

    /// Convert `input` and append the produced frames to `out`, returning the
    /// number of frames produced.
    pub fn process(&mut self, input: &[i16], out: &mut Vec<i16>) -> usize {
        let ch = self.channels;
        let frames = input.len() / ch;
        if frames == 0 {
            return 0;
        }
        let prev = self
            .prev
            .take()
            .unwrap_or_else(|| input[..ch].to_vec());

        // Position 0 is the carried frame, position k + 1 is input frame k.
        let at = |pos: usize, c: usize| -> f64 {
            if pos == 0 {
                prev[c] as f64
            } else {
                input[(pos - 1) * ch + c] as f64
            }
        };

        let mut produced = 0;
        while self.phase < frames as f64 {
            let idx = self.phase as usize;
            let frac = self.phase - idx as f64;
            for c in 0..ch {
                let a = at(idx, c);
                let b = at(idx + 1, c);
                let sample = a + (b - a) * frac;
                out.push(sample.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16);
            }
            produced += 1;
            self.phase += self.step;
        }
        self.phase -= frames as f64;
        self.prev = Some(input[(frames - 1) * ch..frames * ch].to_vec());
        produced
    }
}
