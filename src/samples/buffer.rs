// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::time::Duration;

/// A fully decoded clip held in memory.
/// Buffers are shared between voices through an Arc and are never mutated after decoding.
#[derive(Clone, Debug, PartialEq)]
pub struct AudioBuffer {
    /// One vector of samples per channel. Every channel has the same length.
    channels: Vec<Vec<f32>>,
    /// Sample rate of the audio data.
    sample_rate: u32,
}

impl AudioBuffer {
    /// Creates a buffer from planar channel data. Channels shorter than the longest are padded with silence.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> AudioBuffer {
        let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
        for channel in channels.iter_mut() {
            channel.resize(frames, 0.0);
        }
        AudioBuffer {
            channels,
            sample_rate,
        }
    }

    /// Creates a single channel buffer.
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> AudioBuffer {
        AudioBuffer::new(vec![samples], sample_rate)
    }

    /// Returns the number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Returns the number of sample frames.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Returns the samples of one channel.
    pub fn channel(&self, index: usize) -> &[f32] {
        &self.channels[index]
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frames() as f64 / self.sample_rate as f64)
    }

    /// Returns the memory size in bytes.
    pub fn memory_size(&self) -> usize {
        self.channels.len() * self.frames() * std::mem::size_of::<f32>()
    }

    /// Reads a sample at a fractional frame position with linear interpolation.
    /// Positions outside of the buffer read as silence.
    #[inline]
    pub fn sample_at(&self, channel: usize, position: f64) -> f32 {
        if position < 0.0 {
            return 0.0;
        }
        let data = &self.channels[channel];
        let index = position.floor() as usize;
        let Some(&s0) = data.get(index) else {
            return 0.0;
        };
        let s1 = data.get(index + 1).copied().unwrap_or(0.0);
        let frac = (position - index as f64) as f32;
        s0 + (s1 - s0) * frac
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pads_ragged_channels() {
        let buffer = AudioBuffer::new(vec![vec![1.0, 1.0, 1.0], vec![0.5]], 4);
        assert_eq!(2, buffer.channel_count());
        assert_eq!(3, buffer.frames());
        assert_eq!(&[0.5, 0.0, 0.0], buffer.channel(1));
        assert_eq!(Duration::from_millis(750), buffer.duration());
        assert_eq!(24, buffer.memory_size());
    }

    #[test]
    fn interpolates_between_frames() {
        let buffer = AudioBuffer::mono(vec![0.0, 1.0], 44100);
        assert_eq!(0.0, buffer.sample_at(0, 0.0));
        assert_eq!(0.5, buffer.sample_at(0, 0.5));
        assert_eq!(1.0, buffer.sample_at(0, 1.0));
        // The frame past the end interpolates towards silence.
        assert_eq!(0.5, buffer.sample_at(0, 1.5));
        assert_eq!(0.0, buffer.sample_at(0, 2.0));
        assert_eq!(0.0, buffer.sample_at(0, -1.0));
    }
}
