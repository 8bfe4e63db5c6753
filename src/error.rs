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

use crate::config::ConfigError;
use crate::document::DocumentError;

/// Errors surfaced by the sampler and its audio devices.
#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    /// The audio environment can't host the sampler: no device, or one with an unusable format.
    #[error("unsupported audio environment: {0}")]
    UnsupportedEnvironment(String),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The session was torn down with `destroy`.
    #[error("sampler has been destroyed")]
    Destroyed,
}
