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

//! Fetching and decoding of named audio assets.
//!
//! Assets are loaded entirely into memory, one at a time. A failure only
//! affects the asset that failed; the rest of the batch still loads.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::buffer::AudioBuffer;
use super::decode::decode;
use super::error::AssetError;

/// Somewhere encoded assets can be fetched from.
pub trait AssetSource: Send + Sync {
    /// Returns the raw bytes behind a locator.
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, AssetError>;
}

/// Fetches assets from files under a root directory.
#[derive(Clone, Debug)]
pub struct FileSource {
    root: PathBuf,
}

impl FileSource {
    pub fn new(root: &Path) -> FileSource {
        FileSource {
            root: root.to_path_buf(),
        }
    }
}

impl AssetSource for FileSource {
    fn fetch(&self, locator: &str) -> Result<Vec<u8>, AssetError> {
        fs::read(self.root.join(locator)).map_err(|source| AssetError::Fetch {
            locator: locator.to_string(),
            source,
        })
    }
}

/// Loads assets from a source into decoded buffers at the output sample rate.
#[derive(Clone)]
pub struct AssetLoader {
    /// Where the bytes come from.
    source: Arc<dyn AssetSource>,
    /// Target sample rate for transcoding (matches audio output).
    sample_rate: u32,
    /// Gives up on a single asset after this long.
    timeout: Option<Duration>,
}

impl AssetLoader {
    /// Creates a new loader that waits on every asset for as long as it takes.
    pub fn new(source: Arc<dyn AssetSource>, sample_rate: u32) -> AssetLoader {
        AssetLoader {
            source,
            sample_rate,
            timeout: None,
        }
    }

    /// Sets the per-asset timeout.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> AssetLoader {
        self.timeout = timeout;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Fetches and decodes a single asset on the blocking pool.
    pub async fn load(&self, locator: &str) -> Result<Arc<AudioBuffer>, AssetError> {
        let source = self.source.clone();
        let sample_rate = self.sample_rate;
        let task_locator = locator.to_string();
        let task = tokio::task::spawn_blocking(move || {
            let bytes = source.fetch(&task_locator)?;
            decode(&task_locator, bytes, sample_rate)
        });

        let joined = match self.timeout {
            Some(after) => match tokio::time::timeout(after, task).await {
                Ok(joined) => joined,
                Err(_) => {
                    // Blocking tasks can't be cancelled; the fetch finishes in the background.
                    warn!(locator, ?after, "Asset timed out, abandoning its fetch");
                    return Err(AssetError::Timeout {
                        locator: locator.to_string(),
                        after,
                    })
                }
            },
            None => task.await,
        };

        let buffer = joined.map_err(|e| AssetError::Task {
            locator: locator.to_string(),
            reason: e.to_string(),
        })??;

        debug!(
            locator,
            channels = buffer.channel_count(),
            duration_ms = buffer.duration().as_millis(),
            memory_kb = buffer.memory_size() / 1024,
            "Asset loaded"
        );
        Ok(Arc::new(buffer))
    }

    /// Loads every asset in order, one at a time, handing each result to `on_loaded`
    /// as soon as it's known. Resolves once every asset has been attempted.
    pub async fn load_all<K, F>(&self, assets: Vec<(K, String)>, mut on_loaded: F)
    where
        F: FnMut(K, Result<Arc<AudioBuffer>, AssetError>),
    {
        let start = Instant::now();
        let total = assets.len();
        let mut failed = 0;

        for (key, locator) in assets {
            let result = self.load(&locator).await;
            if let Err(e) = &result {
                failed += 1;
                warn!(locator = %locator, err = %e, "Failed to load asset");
            }
            on_loaded(key, result);
        }

        info!(
            total,
            failed,
            elapsed_ms = start.elapsed().as_millis(),
            "Finished loading assets"
        );
    }
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("sample_rate", &self.sample_rate)
            .field("timeout", &self.timeout)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod test {
    use std::collections::HashMap;
    use std::error::Error;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    use parking_lot::Mutex;
    use tempfile::tempdir;

    use super::*;
    use crate::testutil::write_wav;

    /// An in-memory source that records the order of fetches and how many ran at once.
    #[derive(Default)]
    pub(crate) struct MemorySource {
        assets: HashMap<String, Vec<u8>>,
        delay: Duration,
        in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
        pub fetched: Mutex<Vec<String>>,
    }

    impl MemorySource {
        pub(crate) fn new(delay: Duration) -> MemorySource {
            MemorySource {
                delay,
                ..Default::default()
            }
        }

        /// Adds a mono wav asset.
        pub(crate) fn insert_wav(
            &mut self,
            locator: &str,
            samples: Vec<f32>,
            sample_rate: u32,
        ) -> Result<(), Box<dyn Error>> {
            let dir = tempdir()?;
            let path = dir.path().join("asset.wav");
            write_wav(&path, vec![samples], sample_rate)?;
            self.assets.insert(locator.to_string(), fs::read(&path)?);
            Ok(())
        }

        pub(crate) fn insert_raw(&mut self, locator: &str, bytes: Vec<u8>) {
            self.assets.insert(locator.to_string(), bytes);
        }
    }

    impl AssetSource for MemorySource {
        fn fetch(&self, locator: &str) -> Result<Vec<u8>, AssetError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.fetched.lock().push(locator.to_string());
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            self.assets
                .get(locator)
                .cloned()
                .ok_or_else(|| AssetError::Fetch {
                    locator: locator.to_string(),
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
                })
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn loads_sequentially_and_survives_failures() -> Result<(), Box<dyn Error>> {
        let mut source = MemorySource::new(Duration::from_millis(5));
        source.insert_wav("a.wav", vec![0.5; 8], 44100)?;
        source.insert_raw("b.wav", vec![0, 1, 2, 3]);
        source.insert_wav("d.wav", vec![0.25; 8], 44100)?;
        let source = Arc::new(source);

        let loader = AssetLoader::new(source.clone(), 44100);
        let mut results = Vec::new();
        loader
            .load_all(
                vec![
                    ("a", "a.wav".to_string()),
                    ("b", "b.wav".to_string()),
                    ("c", "c.wav".to_string()),
                    ("d", "d.wav".to_string()),
                ],
                |key, result| results.push((key, result)),
            )
            .await;

        assert_eq!(4, results.len());
        assert_eq!("a", results[0].0);
        assert!(results[0].1.is_ok());
        assert!(matches!(results[1].1, Err(AssetError::Decode { .. })));
        assert!(matches!(results[2].1, Err(AssetError::Fetch { .. })));
        assert_eq!(8, results[3].1.as_ref().map(|b| b.frames()).unwrap_or(0));

        assert_eq!(
            vec!["a.wav", "b.wav", "c.wav", "d.wav"],
            *source.fetched.lock()
        );
        assert_eq!(1, source.max_in_flight.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn times_out_hanging_assets() -> Result<(), Box<dyn Error>> {
        let mut source = MemorySource::new(Duration::from_millis(300));
        source.insert_wav("slow.wav", vec![0.5; 8], 44100)?;

        let loader = AssetLoader::new(Arc::new(source), 44100)
            .with_timeout(Some(Duration::from_millis(20)));
        let result = loader.load("slow.wav").await;
        assert!(matches!(result, Err(AssetError::Timeout { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn file_source_reads_under_root() -> Result<(), Box<dyn Error>> {
        let dir = tempdir()?;
        write_wav(&dir.path().join("R8/kick.wav"), vec![vec![1.0; 4]], 44100)?;

        let loader = AssetLoader::new(Arc::new(FileSource::new(dir.path())), 44100);
        let buffer = loader.load("R8/kick.wav").await?;
        assert_eq!(4, buffer.frames());

        let missing = loader.load("R8/snare.wav").await;
        assert!(matches!(missing, Err(AssetError::Fetch { .. })));
        Ok(())
    }
}
