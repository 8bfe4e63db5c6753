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

//! A sixteen-step drum sampler.
//!
//! A [`Sampler`] owns a [`BeatDocument`] (six instruments by sixteen steps), a
//! kit of decoded samples and a bank of convolution impulses. While playing, a
//! look-ahead scheduler turns the document's cells into note graphs queued on
//! an audio [`Device`](audio::Device) at exact device times.

pub mod audio;
pub mod catalog;
pub mod config;
pub mod document;
pub mod error;
pub mod playsync;
pub mod samples;
pub mod sampler;
pub mod scheduler;
#[cfg(test)]
mod testutil;

pub use document::{BeatDocument, Hit};
pub use error::SamplerError;
pub use sampler::{Sampler, SamplerOptions};
pub use scheduler::StepEvent;
