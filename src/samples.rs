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

//! Sample and impulse response loading.
//!
//! This module provides:
//! - Sequential fetch and decode of named assets (in-memory for zero-latency playback)
//! - Kit banks holding one sample per instrument
//! - The effect bank holding every impulse response

mod buffer;
mod decode;
mod effects;
mod error;
mod kit;
pub(crate) mod loader;

pub use buffer::AudioBuffer;
pub use effects::EffectBank;
pub use error::AssetError;
pub use kit::KitBank;
pub use loader::{AssetLoader, AssetSource, FileSource};
