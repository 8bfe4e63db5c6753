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
use std::{
    collections::VecDeque,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Instant,
};

use parking_lot::Mutex;
use tracing::debug;

use super::graph::{AudioGraph, NoteGraph};

/// How many scheduled notes a mock device remembers. Older ones are dropped.
pub const RECORDED_NOTES: usize = 4096;

/// Where the mock device's time comes from.
enum Clock {
    /// Seconds since the device was created.
    Wall(Instant),
    /// Set by hand, stored as f64 bits.
    Manual(AtomicU64),
}

/// A mock device. Doesn't actually play anything; it records what it was asked to play.
pub struct Device {
    name: String,
    sample_rate: u32,
    compressor: bool,
    clock: Clock,
    graph: Mutex<Option<Arc<AudioGraph>>>,
    notes: Mutex<VecDeque<NoteGraph>>,
}

impl Device {
    /// Gets the given mock device. Its clock follows wall time.
    pub fn get(name: &str, sample_rate: u32) -> Device {
        Device {
            name: name.to_string(),
            sample_rate,
            compressor: true,
            clock: Clock::Wall(Instant::now()),
            graph: Mutex::new(None),
            notes: Mutex::new(VecDeque::new()),
        }
    }

    /// A mock device whose clock only moves when told to.
    pub fn manual(name: &str, sample_rate: u32) -> Device {
        Device {
            clock: Clock::Manual(AtomicU64::new(0f64.to_bits())),
            ..Device::get(name, sample_rate)
        }
    }

    /// Sets whether the device claims to have a compressor.
    pub fn with_compressor(mut self, compressor: bool) -> Device {
        self.compressor = compressor;
        self
    }

    /// Sets the clock of a manual device.
    pub fn set_time(&self, seconds: f64) {
        if let Clock::Manual(bits) = &self.clock {
            bits.store(seconds.to_bits(), Ordering::Release);
        }
    }

    /// Moves the clock of a manual device forward.
    pub fn advance(&self, seconds: f64) {
        self.set_time(self.current_time_secs() + seconds);
    }

    fn current_time_secs(&self) -> f64 {
        match &self.clock {
            Clock::Wall(start) => start.elapsed().as_secs_f64(),
            Clock::Manual(bits) => f64::from_bits(bits.load(Ordering::Acquire)),
        }
    }

    /// The most recent notes scheduled, oldest first.
    pub fn notes(&self) -> Vec<NoteGraph> {
        self.notes.lock().iter().cloned().collect()
    }

    /// Forgets the scheduled notes.
    pub fn clear_notes(&self) {
        self.notes.lock().clear();
    }

    /// The most recently routed graph.
    pub fn graph(&self) -> Option<Arc<AudioGraph>> {
        self.graph.lock().clone()
    }
}

impl super::Device for Device {
    fn current_time(&self) -> f64 {
        self.current_time_secs()
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn supports_compressor(&self) -> bool {
        self.compressor
    }

    fn route(&self, graph: Arc<AudioGraph>) {
        *self.graph.lock() = Some(graph);
    }

    fn schedule(&self, note: NoteGraph) {
        debug!(
            device = self.name,
            instrument = %note.instrument,
            step = note.step,
            start_time = note.source.start_time,
            "Scheduled note (mock)"
        );
        let mut notes = self.notes.lock();
        if notes.len() == RECORDED_NOTES {
            notes.pop_front();
        }
        notes.push_back(note);
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::audio::graph::NoteParams;
    use crate::audio::Device as _;
    use crate::catalog::Instrument;
    use crate::document::Hit;
    use crate::samples::AudioBuffer;

    #[test]
    fn manual_clock() {
        let device = Device::manual("mock", 44100);
        assert_eq!(0.0, device.current_time());
        device.advance(0.25);
        device.advance(0.25);
        assert_eq!(0.5, device.current_time());
        device.set_time(3.0);
        assert_eq!(3.0, device.current_time());
        assert_eq!("mock (Mock)", device.to_string());
    }

    #[test]
    fn recorded_notes_are_capped() {
        let device = Device::get("mock", 44100);
        let buffer = Arc::new(AudioBuffer::mono(vec![1.0], 44100));
        for step in 0..RECORDED_NOTES + 10 {
            let note = NoteGraph::build(
                buffer.clone(),
                NoteParams {
                    instrument: Instrument::Kick,
                    step,
                    hit: Hit::Loud,
                    pitch: 0.5,
                    dry_mix: 1.0,
                    when: 0.0,
                },
            )
            .unwrap();
            device.schedule(note);
        }

        let notes = device.notes();
        assert_eq!(RECORDED_NOTES, notes.len());
        assert_eq!(10, notes[0].step);
        device.clear_notes();
        assert!(device.notes().is_empty());
    }

    #[test]
    fn wall_clock_moves() {
        let device = Device::get("mock", 44100);
        let start = device.current_time();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(device.current_time() > start);
        // Manual controls have no effect on a wall clock.
        device.set_time(100.0);
        assert!(device.current_time() < 100.0);
    }
}
