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
    path::{Path, PathBuf},
    time::Duration,
};

use config::{Config, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::error::ConfigError;
use crate::scheduler::DEFAULT_GRANULARITY;

const DEFAULT_SAMPLE_RATE: u32 = 44100;

/// A YAML representation of the sampler configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct Sampler {
    /// The audio device.
    device: String,

    /// Rate the device runs at and samples are decoded to (default: 44100).
    sample_rate: Option<u32>,

    /// Root directory holding `<kit>/<instrument>.wav`.
    samples: PathBuf,

    /// Root directory holding the effect impulse responses.
    impulses: PathBuf,

    /// Pause between scheduler polls (default: 0ms).
    scheduler_interval: Option<String>,

    /// Gives up on a single asset after this long. Unset waits forever.
    load_timeout: Option<String>,

    /// The directory relative paths are resolved against.
    #[serde(skip)]
    base_path: PathBuf,
}

impl Sampler {
    /// New will create a new sampler configuration.
    pub fn new(device: &str, samples: &Path, impulses: &Path) -> Sampler {
        Sampler {
            device: device.to_string(),
            sample_rate: None,
            samples: samples.to_path_buf(),
            impulses: impulses.to_path_buf(),
            scheduler_interval: None,
            load_timeout: None,
            base_path: PathBuf::new(),
        }
    }

    /// Parse a sampler configuration from a YAML file. Asset directories are
    /// relative to the file.
    pub fn deserialize(path: &Path) -> Result<Sampler, ConfigError> {
        let mut sampler = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Sampler>()?;
        sampler.base_path = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Ok(sampler)
    }

    /// Returns the device from the configuration.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Returns the sample rate (default: 44100).
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Returns the kit sample root.
    pub fn samples(&self) -> PathBuf {
        self.base_path.join(&self.samples)
    }

    /// Returns the impulse response root.
    pub fn impulses(&self) -> PathBuf {
        self.base_path.join(&self.impulses)
    }

    /// Returns the pause between scheduler polls.
    pub fn scheduler_interval(&self) -> Result<Duration, ConfigError> {
        match &self.scheduler_interval {
            Some(interval) => parse_duration("scheduler_interval", interval),
            None => Ok(DEFAULT_GRANULARITY),
        }
    }

    /// Returns the per-asset load timeout, if any.
    pub fn load_timeout(&self) -> Result<Option<Duration>, ConfigError> {
        self.load_timeout
            .as_ref()
            .map(|timeout| parse_duration("load_timeout", timeout))
            .transpose()
    }
}

fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    Ok(DurationString::from_string(value.to_string())
        .map_err(|source| ConfigError::Duration { field, source })?
        .into())
}

#[cfg(test)]
mod test {
    use std::{error::Error, fs};

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn parses_full_config() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("drumsampler.yaml");
        fs::write(
            &path,
            r#"
device: mock-device
sample_rate: 48000
samples: assets/kits
impulses: /opt/impulses
scheduler_interval: 2ms
load_timeout: 10s
"#,
        )?;

        let config = Sampler::deserialize(&path)?;
        assert_eq!("mock-device", config.device());
        assert_eq!(48000, config.sample_rate());
        assert_eq!(dir.path().join("assets/kits"), config.samples());
        assert_eq!(PathBuf::from("/opt/impulses"), config.impulses());
        assert_eq!(Duration::from_millis(2), config.scheduler_interval()?);
        assert_eq!(Some(Duration::from_secs(10)), config.load_timeout()?);
        Ok(())
    }

    #[test]
    fn defaults() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("drumsampler.yaml");
        fs::write(&path, "device: default\nsamples: kits\nimpulses: impulses\n")?;

        let config = Sampler::deserialize(&path)?;
        assert_eq!(44100, config.sample_rate());
        assert_eq!(Duration::from_millis(1), config.scheduler_interval()?);
        assert_eq!(None, config.load_timeout()?);
        Ok(())
    }

    #[test]
    fn bad_duration() {
        let mut config = Sampler::new("mock", Path::new("kits"), Path::new("impulses"));
        config.load_timeout = Some("soon".to_string());
        assert!(matches!(
            config.load_timeout(),
            Err(ConfigError::Duration {
                field: "load_timeout",
                ..
            })
        ));
    }

    #[test]
    fn missing_file() {
        assert!(matches!(
            Sampler::deserialize(Path::new("/does/not/exist.yaml")),
            Err(ConfigError::Load(_))
        ));
    }
}
