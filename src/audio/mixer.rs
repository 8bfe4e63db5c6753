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

// Core rendering logic shared by the cpal device and tests.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::compressor::Compressor;
use super::convolver::Convolver;
use super::graph::{AudioGraph, NoteGraph};
use super::panner::PanLaw;

/// Frames rendered per block.
pub const RENDER_QUANTUM: usize = 512;

/// A scheduled note with its playback position.
struct ActiveVoice {
    note: NoteGraph,
    /// The device frame the note starts on.
    start_frame: u64,
    /// Read position in the source buffer, in source frames.
    position: f64,
    /// Source frames advanced per output frame.
    increment: f64,
    pan: Option<PanLaw>,
}

/// Renders scheduled notes through the session's routing into stereo output.
pub struct Mixer {
    sample_rate: u32,
    graph: Option<Arc<AudioGraph>>,
    voices: Vec<ActiveVoice>,
    convolver: Option<Convolver>,
    compressor: Compressor,
    /// Frames rendered so far. This is the device clock.
    clock: Arc<AtomicU64>,
    dry: [Vec<f32>; 2],
    wet: [Vec<f32>; 2],
    wet_out: [Vec<f32>; 2],
    /// Rendered frames not yet handed to the output, interleaved stereo.
    pending: Vec<f32>,
    pending_pos: usize,
}

impl Mixer {
    pub fn new(sample_rate: u32, clock: Arc<AtomicU64>) -> Mixer {
        Mixer {
            sample_rate,
            graph: None,
            voices: Vec::new(),
            convolver: None,
            compressor: Compressor::new(sample_rate),
            clock,
            dry: [vec![0.0; RENDER_QUANTUM], vec![0.0; RENDER_QUANTUM]],
            wet: [vec![0.0; RENDER_QUANTUM], vec![0.0; RENDER_QUANTUM]],
            wet_out: [vec![0.0; RENDER_QUANTUM], vec![0.0; RENDER_QUANTUM]],
            pending: Vec::with_capacity(RENDER_QUANTUM * 2),
            pending_pos: 0,
        }
    }

    /// Attaches the persistent topology notes are routed through.
    pub fn route(&mut self, graph: Arc<AudioGraph>) {
        self.graph = Some(graph);
        self.convolver = None;
    }

    /// The frame the next rendered block starts on.
    pub fn current_frame(&self) -> u64 {
        self.clock.load(Ordering::Acquire)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of notes still playing or waiting to start.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    /// Schedules a note. Notes whose start time has already passed start on the next block.
    pub fn start(&mut self, note: NoteGraph) {
        let start_time = note.source.start_time.max(0.0);
        let start_frame = (start_time * self.sample_rate as f64).round() as u64;
        let buffer_rate = note.source.buffer.sample_rate().max(1) as f64;
        let increment = note.source.playback_rate * buffer_rate / self.sample_rate.max(1) as f64;
        let pan = note.panner.map(|panner| PanLaw::new(panner.position));
        self.voices.push(ActiveVoice {
            start_frame: start_frame.max(self.current_frame()),
            position: 0.0,
            increment,
            pan,
            note,
        });
    }

    /// Renders one block into the given stereo slices, which must be `RENDER_QUANTUM` long.
    pub fn render_quantum(&mut self, left: &mut [f32], right: &mut [f32]) {
        let block_start = self.current_frame();
        for bus in self.dry.iter_mut().chain(self.wet.iter_mut()) {
            bus.fill(0.0);
        }

        let [dry_l, dry_r] = &mut self.dry;
        let [wet_l, wet_r] = &mut self.wet;
        self.voices.retain_mut(|voice| {
            let buffer = &voice.note.source.buffer;
            let frames = buffer.frames() as f64;
            let stereo = buffer.channel_count() > 1;
            let offset = voice.start_frame.saturating_sub(block_start) as usize;

            for i in offset.min(RENDER_QUANTUM)..RENDER_QUANTUM {
                if voice.position >= frames {
                    return false;
                }
                let (l, r) = if stereo {
                    let l = buffer.sample_at(0, voice.position);
                    let r = buffer.sample_at(1, voice.position);
                    match &voice.pan {
                        Some(pan) => pan.stereo(l, r),
                        None => (l, r),
                    }
                } else {
                    let s = buffer.sample_at(0, voice.position);
                    match &voice.pan {
                        Some(pan) => pan.mono(s),
                        None => (s, s),
                    }
                };
                dry_l[i] += l * voice.note.dry_gain;
                dry_r[i] += r * voice.note.dry_gain;
                wet_l[i] += l * voice.note.wet_gain;
                wet_r[i] += r * voice.note.wet_gain;
                voice.position += voice.increment;
            }
            voice.position < frames
        });

        let (master_gain, effect_gain, compress) = match self.graph.clone() {
            Some(graph) => {
                self.sync_convolver(&graph);
                (
                    graph.master_gain(),
                    graph.effect_gain(),
                    graph.has_compressor(),
                )
            }
            None => (1.0, 0.0, false),
        };

        let [wet_out_l, wet_out_r] = &mut self.wet_out;
        match self.convolver.as_mut() {
            Some(convolver) => {
                convolver.process(
                    [self.wet[0].as_slice(), self.wet[1].as_slice()],
                    [wet_out_l.as_mut_slice(), wet_out_r.as_mut_slice()],
                );
            }
            None => {
                wet_out_l.fill(0.0);
                wet_out_r.fill(0.0);
            }
        }

        for i in 0..RENDER_QUANTUM {
            left[i] = (self.dry[0][i] + self.wet_out[0][i] * effect_gain) * master_gain;
            right[i] = (self.dry[1][i] + self.wet_out[1][i] * effect_gain) * master_gain;
        }
        if compress {
            self.compressor.process(left, right);
        }

        self.clock
            .store(block_start + RENDER_QUANTUM as u64, Ordering::Release);
    }

    /// Swaps the convolver when the graph's impulse has changed.
    fn sync_convolver(&mut self, graph: &AudioGraph) {
        match graph.impulse() {
            Some(ir) => {
                if !self.convolver.as_ref().is_some_and(|c| c.runs(&ir)) {
                    self.convolver = Some(Convolver::new(ir));
                }
            }
            None => self.convolver = None,
        }
    }

    /// Fills an interleaved output buffer of any length. The first two channels
    /// carry left and right; a mono output gets their average and extra channels stay silent.
    pub fn fill(&mut self, data: &mut [f32], channels: usize) {
        let channels = channels.max(1);
        for frame in data.chunks_mut(channels) {
            if self.pending_pos >= self.pending.len() {
                self.refill();
            }
            let l = self.pending[self.pending_pos];
            let r = self.pending[self.pending_pos + 1];
            self.pending_pos += 2;

            match frame {
                [mono] => *mono = (l + r) * 0.5,
                [first, second, rest @ ..] => {
                    *first = l;
                    *second = r;
                    rest.fill(0.0);
                }
                [] => {}
            }
        }
    }

    fn refill(&mut self) {
        let mut left = [0.0f32; RENDER_QUANTUM];
        let mut right = [0.0f32; RENDER_QUANTUM];
        self.render_quantum(&mut left, &mut right);
        self.pending.clear();
        for (l, r) in left.iter().zip(right.iter()) {
            self.pending.push(*l);
            self.pending.push(*r);
        }
        self.pending_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::graph::{NoteParams, MASTER_GAIN};
    use crate::catalog::Instrument;
    use crate::document::Hit;
    use crate::samples::AudioBuffer;

    fn note(instrument: Instrument, hit: Hit, when: f64, buffer: Arc<AudioBuffer>) -> NoteGraph {
        NoteGraph::build(
            buffer,
            NoteParams {
                instrument,
                step: 0,
                hit,
                pitch: 0.5,
                dry_mix: 1.0,
                when,
            },
        )
        .unwrap()
    }

    fn render(mixer: &mut Mixer) -> (Vec<f32>, Vec<f32>) {
        let mut left = vec![0.0; RENDER_QUANTUM];
        let mut right = vec![0.0; RENDER_QUANTUM];
        mixer.render_quantum(&mut left, &mut right);
        (left, right)
    }

    #[test]
    fn starts_on_the_scheduled_frame() {
        let clock = Arc::new(AtomicU64::new(0));
        let mut mixer = Mixer::new(1000, clock.clone());
        mixer.route(AudioGraph::new(false));

        let buffer = Arc::new(AudioBuffer::mono(vec![1.0, 1.0], 1000));
        // Frame 600 lands in the second block at offset 88.
        mixer.start(note(Instrument::Kick, Hit::Loud, 0.6, buffer));

        let (left, _) = render(&mut mixer);
        assert!(left.iter().all(|s| *s == 0.0));
        assert_eq!(RENDER_QUANTUM as u64, clock.load(Ordering::Acquire));

        let (left, right) = render(&mut mixer);
        assert_eq!(0.0, left[87]);
        assert!((left[88] - MASTER_GAIN).abs() < 1e-6);
        assert!((right[89] - MASTER_GAIN).abs() < 1e-6);
        assert_eq!(0.0, left[90]);
        assert_eq!(0, mixer.active_voices());
    }

    #[test]
    fn late_notes_start_immediately() {
        let clock = Arc::new(AtomicU64::new(0));
        let mut mixer = Mixer::new(1000, clock);
        mixer.route(AudioGraph::new(false));
        render(&mut mixer);

        let buffer = Arc::new(AudioBuffer::mono(vec![1.0], 1000));
        mixer.start(note(Instrument::Snare, Hit::Loud, 0.1, buffer));
        let (left, _) = render(&mut mixer);
        assert!((left[0] - 0.6 * MASTER_GAIN).abs() < 1e-6);
    }

    #[test]
    fn soft_hits_are_quieter() {
        let clock = Arc::new(AtomicU64::new(0));
        let mut mixer = Mixer::new(1000, clock);
        mixer.route(AudioGraph::new(false));

        let buffer = Arc::new(AudioBuffer::mono(vec![1.0], 1000));
        mixer.start(note(Instrument::Kick, Hit::Soft, 0.0, buffer));
        let (left, _) = render(&mut mixer);
        assert!((left[0] - 0.3 * MASTER_GAIN).abs() < 1e-6);
    }

    #[test]
    fn effect_return_follows_gain() {
        let clock = Arc::new(AtomicU64::new(0));
        let mut mixer = Mixer::new(44100, clock);
        let graph = AudioGraph::new(false);
        mixer.route(graph.clone());

        // A unit impulse of 100 frames normalizes to a scale of 0.0125.
        let mut impulse = vec![0.0; 100];
        impulse[0] = 1.0;
        graph.set_impulse(&Arc::new(AudioBuffer::mono(impulse, 44100)));
        graph.set_effect_gain(1.0);

        // Hard mute the dry path so only the effect return is audible.
        let buffer = Arc::new(AudioBuffer::mono(vec![1.0], 44100));
        let mut dry_less = note(Instrument::Tom1, Hit::Loud, 0.0, buffer);
        dry_less.dry_gain = 0.0;
        mixer.start(dry_less);

        let (left, right) = render(&mut mixer);
        let expected = 0.0125 * MASTER_GAIN;
        assert!((left[0] - expected).abs() < 1e-5, "left was {}", left[0]);
        assert!((right[0] - expected).abs() < 1e-5);

        graph.set_effect_gain(0.0);
        let (left, _) = render(&mut mixer);
        assert!(left.iter().all(|s| s.abs() < 1e-6));
    }

    #[test]
    fn rebinding_the_same_impulse_keeps_the_tail() {
        let clock = Arc::new(AtomicU64::new(0));
        let mut mixer = Mixer::new(44100, clock);
        let graph = AudioGraph::new(false);
        mixer.route(graph.clone());

        let impulse = Arc::new(AudioBuffer::mono(vec![0.5; 4096], 44100));
        graph.set_impulse(&impulse);
        graph.set_effect_gain(1.0);

        let buffer = Arc::new(AudioBuffer::mono(vec![1.0], 44100));
        let mut dry_less = note(Instrument::Tom1, Hit::Loud, 0.0, buffer);
        dry_less.dry_gain = 0.0;
        mixer.start(dry_less);
        render(&mut mixer);

        assert!(!graph.set_impulse(&impulse));
        let (left, _) = render(&mut mixer);
        let energy: f32 = left.iter().map(|s| s * s).sum();
        assert!(energy > 0.0, "tail was dropped");
    }

    #[test]
    fn fill_handles_odd_lengths_and_channels() {
        let clock = Arc::new(AtomicU64::new(0));
        let mut mixer = Mixer::new(1000, clock.clone());
        mixer.route(AudioGraph::new(false));
        let buffer = Arc::new(AudioBuffer::mono(vec![1.0; 2000], 1000));
        mixer.start(note(Instrument::Kick, Hit::Loud, 0.0, buffer));

        let mut data = vec![0.0; 700 * 4];
        mixer.fill(&mut data, 4);
        assert!((data[0] - MASTER_GAIN).abs() < 1e-6);
        assert!((data[1] - MASTER_GAIN).abs() < 1e-6);
        assert_eq!(0.0, data[2]);
        assert_eq!(0.0, data[3]);
        assert_eq!(2 * RENDER_QUANTUM as u64, clock.load(Ordering::Acquire));

        let mut mono = vec![0.0; 10];
        mixer.fill(&mut mono, 1);
        assert!((mono[9] - MASTER_GAIN).abs() < 1e-6);
    }
}
