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

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{error, info};

use super::buffer::AudioBuffer;
use super::loader::AssetLoader;
use crate::catalog::{Instrument, KitSpec};

/// The six samples of one drum kit.
///
/// A bank is usable as soon as it's created; instruments without a loaded
/// sample simply stay silent. Loading happens once, in the background, and
/// runs to completion even if the session moves on to another kit.
pub struct KitBank {
    /// The kit this bank holds.
    kit: &'static KitSpec,
    /// Loaded samples. Instruments that failed to load are absent.
    buffers: RwLock<HashMap<Instrument, Arc<AudioBuffer>>>,
    /// Set once every sample has been attempted.
    ready: AtomicBool,
    /// Resolves once the single load has finished.
    loaded: OnceCell<()>,
}

impl KitBank {
    /// Creates an empty bank for the given kit.
    pub fn new(kit: &'static KitSpec) -> Arc<KitBank> {
        Arc::new(KitBank {
            kit,
            buffers: RwLock::new(HashMap::new()),
            ready: AtomicBool::new(false),
            loaded: OnceCell::new(),
        })
    }

    pub fn name(&self) -> &'static str {
        self.kit.name
    }

    pub fn kit(&self) -> &'static KitSpec {
        self.kit
    }

    /// Returns true once every sample has been attempted.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// The sample for an instrument, if it loaded.
    pub fn buffer(&self, instrument: Instrument) -> Option<Arc<AudioBuffer>> {
        self.buffers.read().get(&instrument).cloned()
    }

    /// Loads the kit's samples. Resolves when the bank is ready; calling this
    /// again after the first load only waits for it.
    pub async fn preload(self: &Arc<Self>, loader: &AssetLoader) {
        self.loaded
            .get_or_init(|| async {
                let bank = self.clone();
                let loader = loader.clone();
                let task = tokio::spawn(async move {
                    info!(kit = bank.name(), "Loading kit");
                    let assets = Instrument::ORDER
                        .into_iter()
                        .map(|instrument| (instrument, bank.kit.sample_locator(instrument)))
                        .collect();
                    loader
                        .load_all(assets, |instrument, result| {
                            if let Ok(buffer) = result {
                                bank.buffers.write().insert(instrument, buffer);
                            }
                        })
                        .await;
                    bank.ready.store(true, Ordering::Release);
                    info!(
                        kit = bank.name(),
                        loaded = bank.buffers.read().len(),
                        "Kit ready"
                    );
                });
                if let Err(e) = task.await {
                    error!(kit = self.name(), err = %e, "Kit load task failed");
                    self.ready.store(true, Ordering::Release);
                }
            })
            .await;
    }
}

impl fmt::Debug for KitBank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KitBank")
            .field("kit", &self.kit.name)
            .field("ready", &self.is_ready())
            .field("loaded", &self.buffers.read().len())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::catalog;
    use crate::samples::loader::test::MemorySource;

    #[tokio::test(flavor = "multi_thread")]
    async fn preload_marks_ready_with_missing_samples() -> Result<(), Box<dyn Error>> {
        let mut source = MemorySource::new(Duration::ZERO);
        source.insert_wav("R8/kick.wav", vec![1.0; 4], 44100)?;
        source.insert_wav("R8/snare.wav", vec![1.0; 4], 44100)?;
        let source = Arc::new(source);

        let bank = KitBank::new(catalog::kit("R8").ok_or("no R8")?);
        assert!(!bank.is_ready());
        assert!(bank.buffer(Instrument::Kick).is_none());

        let loader = AssetLoader::new(source.clone(), 44100);
        bank.preload(&loader).await;

        assert!(bank.is_ready());
        assert!(bank.buffer(Instrument::Kick).is_some());
        assert!(bank.buffer(Instrument::Snare).is_some());
        assert!(bank.buffer(Instrument::Hihat).is_none());

        // The second preload doesn't fetch anything again.
        bank.preload(&loader).await;
        assert_eq!(6, source.fetched.lock().len());
        assert_eq!(1, source.max_in_flight.load(Ordering::SeqCst));
        Ok(())
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn load_finishes_when_caller_goes_away() -> Result<(), Box<dyn Error>> {
        let source = Arc::new(MemorySource::new(Duration::from_millis(10)));
        let bank = KitBank::new(catalog::kit("LINN").ok_or("no LINN")?);
        let loader = AssetLoader::new(source.clone(), 44100);

        let preload = {
            let bank = bank.clone();
            tokio::spawn(async move { bank.preload(&loader).await })
        };
        tokio::time::sleep(Duration::from_millis(15)).await;
        preload.abort();

        crate::testutil::eventually_async(
            || {
                let bank = bank.clone();
                async move { bank.is_ready() }
            },
            "kit never became ready",
        )
        .await;
        assert_eq!(6, source.fetched.lock().len());
        Ok(())
    }
}
