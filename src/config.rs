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
use std::{error::Error, path::Path, sync::Arc};

use tracing::info;

use crate::{
    audio,
    samples::FileSource,
    sampler::{Sampler as SamplerSession, SamplerOptions},
    scheduler::OnStep,
};

mod error;
mod sampler;

pub use error::ConfigError;
pub use sampler::Sampler;

/// Opens the configured device and creates a sampler session on it. The session
/// still needs to be initialized before it can play.
pub fn init_sampler(path: &Path, on_step: OnStep) -> Result<SamplerSession, Box<dyn Error>> {
    let config = Sampler::deserialize(path)?;
    let device = audio::get_device(config.device(), config.sample_rate())?;
    info!(
        device = %device,
        samples = %config.samples().display(),
        impulses = %config.impulses().display(),
        "Loaded sampler configuration"
    );

    Ok(SamplerSession::new(
        device,
        Arc::new(FileSource::new(&config.samples())),
        Arc::new(FileSource::new(&config.impulses())),
        SamplerOptions {
            on_step,
            granularity: config.scheduler_interval()?,
            load_timeout: config.load_timeout()?,
        },
    )?)
}
