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

//! Signal routing.
//!
//! The persistent topology lives for the whole session:
//!
//! ```text
//! convolver -> effect return -> master (0.7) -> [compressor] -> output
//! ```
//!
//! Every hit builds its own short-lived [`NoteGraph`]:
//!
//! ```text
//! buffer source -> [panner] -+-> dry gain -> master
//!                            +-> wet gain -> convolver
//! ```

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::convolver::ImpulseResponse;
use super::mixer::RENDER_QUANTUM;
use crate::catalog::Instrument;
use crate::document::{playback_rate, Hit};
use crate::samples::AudioBuffer;

/// Gain of the master bus.
pub const MASTER_GAIN: f32 = 0.7;

/// Global note ID counter.
static NEXT_NOTE_ID: AtomicU64 = AtomicU64::new(1);

/// The persistent nodes of a session. Parameters may be changed from any
/// thread; the renderer picks them up on its next block.
#[derive(Debug)]
pub struct AudioGraph {
    /// Whether the master bus runs through a compressor.
    compressor: bool,
    /// Effect return gain, stored as f32 bits.
    effect_gain: AtomicU32,
    /// The convolver's impulse, prepared for the render block size, with the buffer it came from.
    impulse: RwLock<Option<BoundImpulse>>,
}

#[derive(Debug)]
struct BoundImpulse {
    source: Arc<AudioBuffer>,
    response: Arc<ImpulseResponse>,
}

impl AudioGraph {
    /// Builds the persistent topology. The compressor is only inserted when the device has one.
    pub fn new(compressor: bool) -> Arc<AudioGraph> {
        Arc::new(AudioGraph {
            compressor,
            effect_gain: AtomicU32::new(0f32.to_bits()),
            impulse: RwLock::new(None),
        })
    }

    pub fn master_gain(&self) -> f32 {
        MASTER_GAIN
    }

    pub fn has_compressor(&self) -> bool {
        self.compressor
    }

    pub fn effect_gain(&self) -> f32 {
        f32::from_bits(self.effect_gain.load(Ordering::Relaxed))
    }

    pub fn set_effect_gain(&self, gain: f32) {
        self.effect_gain.store(gain.to_bits(), Ordering::Relaxed);
    }

    /// Binds a new impulse to the convolver. Rebinding the buffer that is
    /// already bound does nothing and returns false, so the convolver keeps its tail.
    pub fn set_impulse(&self, buffer: &Arc<AudioBuffer>) -> bool {
        if self
            .impulse
            .read()
            .as_ref()
            .is_some_and(|bound| Arc::ptr_eq(&bound.source, buffer))
        {
            return false;
        }
        let response = Arc::new(ImpulseResponse::new(buffer, RENDER_QUANTUM, true));
        *self.impulse.write() = Some(BoundImpulse {
            source: buffer.clone(),
            response,
        });
        true
    }

    /// The convolver's current impulse. The convolver is silent until one is bound.
    pub fn impulse(&self) -> Option<Arc<ImpulseResponse>> {
        self.impulse
            .read()
            .as_ref()
            .map(|bound| bound.response.clone())
    }
}

/// A one-shot buffer player.
#[derive(Clone, Debug)]
pub struct BufferSource {
    pub buffer: Arc<AudioBuffer>,
    pub playback_rate: f64,
    /// Device time, in seconds, at which playback starts.
    pub start_time: f64,
}

/// A 3-D panner node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Panner {
    pub position: [f32; 3],
}

/// The transient nodes for one triggered hit.
#[derive(Clone, Debug)]
pub struct NoteGraph {
    pub id: u64,
    pub instrument: Instrument,
    /// The step that triggered the note.
    pub step: usize,
    pub source: BufferSource,
    pub panner: Option<Panner>,
    /// Gain of the send into the master bus.
    pub dry_gain: f32,
    /// Gain of the send into the convolver.
    pub wet_gain: f32,
}

/// Everything needed to build the transient graph for a hit.
#[derive(Clone, Copy, Debug)]
pub struct NoteParams {
    pub instrument: Instrument,
    pub step: usize,
    pub hit: Hit,
    pub pitch: f64,
    /// The active effect's dry mix.
    pub dry_mix: f32,
    /// Device time at which the note sounds.
    pub when: f64,
}

impl NoteGraph {
    /// Builds the node graph for a hit. Silent cells build nothing.
    pub fn build(buffer: Arc<AudioBuffer>, params: NoteParams) -> Option<NoteGraph> {
        if !params.hit.is_audible() {
            return None;
        }
        let spec = params.instrument.spec();
        let level = params.hit.level();

        Some(NoteGraph {
            id: NEXT_NOTE_ID.fetch_add(1, Ordering::Relaxed),
            instrument: params.instrument,
            step: params.step,
            source: BufferSource {
                buffer,
                playback_rate: playback_rate(params.pitch),
                start_time: params.when,
            },
            panner: spec.pannable.then(|| Panner {
                position: spec.position_at(params.step),
            }),
            dry_gain: level * spec.volume * params.dry_mix,
            wet_gain: level * spec.send_gain,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn params(instrument: Instrument, step: usize, hit: Hit) -> NoteParams {
        NoteParams {
            instrument,
            step,
            hit,
            pitch: 0.5,
            dry_mix: 0.8,
            when: 1.25,
        }
    }

    #[test]
    fn silent_cells_build_nothing() {
        let buffer = Arc::new(AudioBuffer::mono(vec![1.0], 44100));
        assert!(NoteGraph::build(buffer, params(Instrument::Kick, 0, Hit::Off)).is_none());
    }

    #[test]
    fn kick_gains() {
        let buffer = Arc::new(AudioBuffer::mono(vec![1.0], 44100));
        let note = NoteGraph::build(buffer, params(Instrument::Kick, 0, Hit::Loud)).unwrap();
        assert!(note.panner.is_none());
        assert!((note.dry_gain - 0.8).abs() < 1e-6);
        assert!((note.wet_gain - 0.5).abs() < 1e-6);
        assert_eq!(1.0, note.source.playback_rate);
        assert_eq!(1.25, note.source.start_time);
    }

    #[test]
    fn soft_hihat_is_panned_by_step() {
        let buffer = Arc::new(AudioBuffer::mono(vec![1.0], 44100));
        let note = NoteGraph::build(buffer, params(Instrument::Hihat, 2, Hit::Soft)).unwrap();
        assert_eq!(
            Some(Panner {
                position: [-3.0, 0.0, -1.0]
            }),
            note.panner
        );
        assert!((note.dry_gain - 0.3 * 0.7 * 0.8).abs() < 1e-6);
        assert!((note.wet_gain - 0.3).abs() < 1e-6);
    }

    #[test]
    fn graph_parameters() {
        let graph = AudioGraph::new(true);
        assert!(graph.has_compressor());
        assert_eq!(0.0, graph.effect_gain());
        assert!(graph.impulse().is_none());

        graph.set_effect_gain(0.35);
        assert_eq!(0.35, graph.effect_gain());
        let buffer = Arc::new(AudioBuffer::mono(vec![1.0, 0.5], 44100));
        assert!(graph.set_impulse(&buffer));
        let bound = graph.impulse().expect("impulse bound");

        // The same buffer keeps the prepared response; a new one replaces it.
        assert!(!graph.set_impulse(&buffer));
        assert!(graph.impulse().is_some_and(|ir| Arc::ptr_eq(&ir, &bound)));
        assert!(graph.set_impulse(&Arc::new(AudioBuffer::mono(vec![1.0], 44100))));
        assert!(graph.impulse().is_some_and(|ir| !Arc::ptr_eq(&ir, &bound)));
    }
}
