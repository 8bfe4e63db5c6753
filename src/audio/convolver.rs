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

//! Stereo convolution reverb.
//!
//! Impulse responses are split into equal partitions and convolved in the
//! frequency domain with overlap-add, one render block at a time, so the
//! effect adds no latency beyond the block itself.
//!
//! Channel handling follows the impulse's channel count:
//! - 1 channel: the same response on both sides
//! - 2 channels: left to left, right to right
//! - 4 channels: true stereo, with each input feeding both outputs

use std::fmt;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::samples::AudioBuffer;

/// Overall gain applied to normalized responses.
const GAIN_CALIBRATION: f32 = 0.00125;

/// Sample rate the calibration was measured at.
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44100.0;

/// Floor for the measured response power.
const MIN_POWER: f32 = 0.000125;

/// Computes the scale that brings an impulse response to a consistent loudness.
pub fn normalization_scale(buffer: &AudioBuffer) -> f32 {
    let channels = buffer.channel_count();
    let frames = buffer.frames();
    if channels == 0 || frames == 0 {
        return 1.0;
    }

    let sum: f32 = (0..channels)
        .map(|c| buffer.channel(c).iter().map(|s| s * s).sum::<f32>())
        .sum();
    let mut power = (sum / (channels * frames) as f32).sqrt();
    if !power.is_finite() || power < MIN_POWER {
        power = MIN_POWER;
    }

    let mut scale = GAIN_CALIBRATION / power;
    if buffer.sample_rate() > 0 {
        scale *= GAIN_CALIBRATION_SAMPLE_RATE / buffer.sample_rate() as f32;
    }
    if channels == 4 {
        scale *= 0.5;
    }
    scale
}

/// One input to output route with its partitioned spectrum.
struct Path {
    input: usize,
    output: usize,
    partitions: Vec<Vec<Complex<f32>>>,
}

/// An impulse response prepared for a particular block size.
pub struct ImpulseResponse {
    block: usize,
    partition_count: usize,
    paths: Vec<Path>,
}

impl ImpulseResponse {
    /// Partitions and transforms an impulse response. The response is scaled by
    /// `normalization_scale` when `normalize` is set.
    pub fn new(buffer: &AudioBuffer, block: usize, normalize: bool) -> ImpulseResponse {
        let scale = if normalize {
            normalization_scale(buffer)
        } else {
            1.0
        };

        let routes: Vec<(usize, usize, usize)> = match buffer.channel_count() {
            0 => Vec::new(),
            1 => vec![(0, 0, 0), (1, 1, 0)],
            4 => vec![(0, 0, 0), (0, 1, 1), (1, 0, 2), (1, 1, 3)],
            _ => vec![(0, 0, 0), (1, 1, 1)],
        };

        let fft_len = block * 2;
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_len);
        // The inverse transform is unnormalized; fold that into the kernel.
        let gain = scale / fft_len as f32;

        let frames = buffer.frames();
        let partition_count = frames.div_ceil(block).max(1);
        let paths = routes
            .into_iter()
            .map(|(input, output, channel)| {
                let data = buffer.channel(channel);
                let partitions = (0..partition_count)
                    .map(|p| {
                        let mut time = vec![0.0f32; fft_len];
                        let start = p * block;
                        let end = (start + block).min(frames);
                        for (dst, src) in time.iter_mut().zip(&data[start.min(end)..end]) {
                            *dst = src * gain;
                        }
                        let mut spectrum = r2c.make_output_vec();
                        if r2c.process(&mut time, &mut spectrum).is_err() {
                            spectrum.fill(Complex::new(0.0, 0.0));
                        }
                        spectrum
                    })
                    .collect();
                Path {
                    input,
                    output,
                    partitions,
                }
            })
            .collect();

        ImpulseResponse {
            block,
            partition_count,
            paths,
        }
    }

    pub fn block(&self) -> usize {
        self.block
    }
}

impl fmt::Debug for ImpulseResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImpulseResponse")
            .field("block", &self.block)
            .field("partitions", &self.partition_count)
            .field("paths", &self.paths.len())
            .finish()
    }
}

/// Running convolution state for one impulse response.
pub struct Convolver {
    ir: Arc<ImpulseResponse>,
    r2c: Arc<dyn RealToComplex<f32>>,
    c2r: Arc<dyn ComplexToReal<f32>>,
    /// Input spectra per input channel, newest at `head`.
    history: [Vec<Vec<Complex<f32>>>; 2],
    head: usize,
    /// Tail of the previous block per output channel.
    overlap: [Vec<f32>; 2],
    time: Vec<f32>,
    accumulator: Vec<Complex<f32>>,
}

impl Convolver {
    pub fn new(ir: Arc<ImpulseResponse>) -> Convolver {
        let fft_len = ir.block * 2;
        let mut planner = RealFftPlanner::<f32>::new();
        let r2c = planner.plan_fft_forward(fft_len);
        let c2r = planner.plan_fft_inverse(fft_len);
        let bins = fft_len / 2 + 1;
        let history = [
            vec![vec![Complex::new(0.0, 0.0); bins]; ir.partition_count],
            vec![vec![Complex::new(0.0, 0.0); bins]; ir.partition_count],
        ];
        Convolver {
            r2c,
            c2r,
            history,
            head: 0,
            overlap: [vec![0.0; ir.block], vec![0.0; ir.block]],
            time: vec![0.0; fft_len],
            accumulator: vec![Complex::new(0.0, 0.0); bins],
            ir,
        }
    }

    /// Returns true if this convolver runs the given response.
    pub fn runs(&self, ir: &Arc<ImpulseResponse>) -> bool {
        Arc::ptr_eq(&self.ir, ir)
    }

    /// Convolves one block of stereo input. Every slice must be exactly one block long.
    pub fn process(&mut self, input: [&[f32]; 2], output: [&mut [f32]; 2]) {
        let block = self.ir.block;
        let count = self.ir.partition_count;
        self.head = (self.head + 1) % count;

        for (channel, samples) in input.iter().enumerate() {
            self.time[..block].copy_from_slice(&samples[..block]);
            self.time[block..].fill(0.0);
            let slot = &mut self.history[channel][self.head];
            if self.r2c.process(&mut self.time, slot).is_err() {
                slot.fill(Complex::new(0.0, 0.0));
            }
        }

        for (out_channel, out) in output.into_iter().enumerate() {
            self.accumulator.fill(Complex::new(0.0, 0.0));
            for path in self.ir.paths.iter().filter(|p| p.output == out_channel) {
                let history = &self.history[path.input];
                for (p, kernel) in path.partitions.iter().enumerate() {
                    let spectrum = &history[(self.head + count - p) % count];
                    for ((acc, x), h) in self.accumulator.iter_mut().zip(spectrum).zip(kernel) {
                        *acc += x * h;
                    }
                }
            }

            // DC and Nyquist of a real signal are real.
            let last = self.accumulator.len() - 1;
            self.accumulator[0].im = 0.0;
            self.accumulator[last].im = 0.0;
            if self
                .c2r
                .process(&mut self.accumulator, &mut self.time)
                .is_err()
            {
                self.time.fill(0.0);
            }

            let overlap = &mut self.overlap[out_channel];
            for i in 0..block {
                out[i] = self.time[i] + overlap[i];
            }
            overlap.copy_from_slice(&self.time[block..]);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    /// Direct-form convolution for comparison.
    fn convolve(input: &[f32], ir: &[f32]) -> Vec<f32> {
        let mut out = vec![0.0; input.len() + ir.len()];
        for (i, x) in input.iter().enumerate() {
            for (j, h) in ir.iter().enumerate() {
                out[i + j] += x * h;
            }
        }
        out
    }

    fn run(convolver: &mut Convolver, left: &[f32], right: &[f32], block: usize) -> [Vec<f32>; 2] {
        let mut result = [Vec::new(), Vec::new()];
        let mut out_l = vec![0.0; block];
        let mut out_r = vec![0.0; block];
        for (l, r) in left.chunks(block).zip(right.chunks(block)) {
            convolver.process([l, r], [&mut out_l, &mut out_r]);
            result[0].extend_from_slice(&out_l);
            result[1].extend_from_slice(&out_r);
        }
        result
    }

    #[test]
    fn matches_direct_convolution() {
        let block = 16;
        let ir: Vec<f32> = (0..40).map(|i| ((i * 7) % 11) as f32 / 11.0 - 0.5).collect();
        let input: Vec<f32> = (0..96).map(|i| ((i * 5) % 13) as f32 / 13.0 - 0.5).collect();
        let silent = vec![0.0; input.len()];

        let response = Arc::new(ImpulseResponse::new(
            &AudioBuffer::mono(ir.clone(), 44100),
            block,
            false,
        ));
        let mut convolver = Convolver::new(response);
        let [left, right] = run(&mut convolver, &input, &silent, block);

        let expected = convolve(&input, &ir);
        for (i, (actual, expected)) in left.iter().zip(&expected).enumerate() {
            assert!(
                (actual - expected).abs() < 1e-4,
                "sample {} was {} expected {}",
                i,
                actual,
                expected
            );
        }
        assert!(right.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn stereo_response_keeps_channels_apart() {
        let block = 8;
        let response = Arc::new(ImpulseResponse::new(
            &AudioBuffer::new(vec![vec![1.0], vec![0.0, 0.5]], 44100),
            block,
            false,
        ));
        let mut convolver = Convolver::new(response);
        let mut left = vec![0.0; 16];
        left[0] = 1.0;
        let right = vec![0.0; 16];
        let [out_l, out_r] = run(&mut convolver, &left, &right, block);
        assert!((out_l[0] - 1.0).abs() < 1e-5);
        assert!(out_r.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn normalization() {
        // A unit impulse has power 1/sqrt(len).
        let mut ir = vec![0.0; 100];
        ir[0] = 1.0;
        let scale = normalization_scale(&AudioBuffer::mono(ir, 44100));
        assert!((scale - GAIN_CALIBRATION / 0.1).abs() < 1e-6);

        let silent = normalization_scale(&AudioBuffer::mono(vec![0.0; 10], 44100));
        assert!((silent - GAIN_CALIBRATION / MIN_POWER).abs() < 1e-3);

        let half_rate = normalization_scale(&AudioBuffer::mono(vec![0.0; 10], 22050));
        assert!((half_rate - 2.0 * silent).abs() < 1e-3);
    }
}
