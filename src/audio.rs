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
use std::{fmt, sync::Arc};

use crate::error::SamplerError;

pub mod compressor;
pub mod convolver;
pub mod cpal;
pub mod graph;
pub mod mixer;
pub mod mock;
pub mod panner;
mod thread_priority;

pub use graph::{AudioGraph, NoteGraph, NoteParams};

/// A clocked output device that plays pre-decoded buffers at scheduled times.
pub trait Device: fmt::Display + std::marker::Send + std::marker::Sync {
    /// The device clock, in seconds. Scheduled start times are on this clock.
    fn current_time(&self) -> f64;

    /// The rate buffers should be decoded at.
    fn sample_rate(&self) -> u32;

    /// Whether the master bus can run through a dynamics compressor.
    fn supports_compressor(&self) -> bool;

    /// Attaches a session's persistent topology. Notes are rendered through the most recent one.
    fn route(&self, graph: Arc<AudioGraph>);

    /// Queues a note graph for playback at its start time.
    fn schedule(&self, note: NoteGraph);
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, SamplerError> {
    cpal::Device::list()
}

/// Gets a device with the given name. Names starting with "mock" produce a mock device.
pub fn get_device(name: &str, sample_rate: u32) -> Result<Arc<dyn Device>, SamplerError> {
    if name.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(name, sample_rate)));
    };

    Ok(Arc::new(cpal::Device::get(name, sample_rate)?))
}
