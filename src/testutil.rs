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
    error::Error,
    fs::{self, File},
    path::Path,
    time::{Duration, SystemTime},
};

use hound::{SampleFormat, WavSpec, WavWriter};

use crate::catalog::{Instrument, EFFECTS};

/// Wait for the given async predicate to return true or fail.
#[inline]
pub async fn eventually_async<F, Fut>(mut predicate: F, error_msg: &str)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = SystemTime::now();
    let tick = Duration::from_millis(10);
    let timeout = Duration::from_secs(3);

    loop {
        let elapsed = start.elapsed();
        if elapsed.is_err() {
            panic!("System time error");
        }
        let elapsed = elapsed.unwrap();

        if elapsed > timeout {
            panic!("{}", error_msg);
        }
        if predicate().await {
            return;
        }
        tokio::time::sleep(tick).await;
    }
}

/// Writes planar f32 channels to a 32-bit float wav file.
pub fn write_wav(path: &Path, channels: Vec<Vec<f32>>, sample_rate: u32) -> Result<(), Box<dyn Error>> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;

    let num_channels = channels.len();
    assert!(num_channels <= u16::MAX.into(), "Too many channels!");
    let mut writer = WavWriter::new(
        file,
        WavSpec {
            channels: num_channels as u16,
            sample_rate,
            bits_per_sample: 32,
            sample_format: SampleFormat::Float,
        },
    )?;

    let frames = channels.iter().map(Vec::len).max().unwrap_or(0);
    for frame in 0..frames {
        for channel in &channels {
            writer.write_sample(channel.get(frame).copied().unwrap_or(0.0))?;
        }
    }
    writer.finalize()?;

    Ok(())
}

/// Writes a short click for every instrument of the given kit under `root`.
pub fn write_kit(root: &Path, kit: &str, sample_rate: u32) -> Result<(), Box<dyn Error>> {
    for instrument in Instrument::ORDER {
        write_wav(
            &root.join(kit).join(format!("{}.wav", instrument.name())),
            vec![vec![1.0, 0.5, 0.25, 0.125]],
            sample_rate,
        )?;
    }
    Ok(())
}

/// Writes a unit impulse for every effect under `root`.
pub fn write_impulses(root: &Path, sample_rate: u32) -> Result<(), Box<dyn Error>> {
    for effect in EFFECTS.iter() {
        if let Some(file) = effect.file {
            write_wav(&root.join(file), vec![vec![1.0, 0.0, 0.0, 0.0]], sample_rate)?;
        }
    }
    Ok(())
}
