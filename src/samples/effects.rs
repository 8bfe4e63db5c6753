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
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{error, info};

use super::buffer::AudioBuffer;
use super::loader::AssetLoader;
use crate::catalog::EFFECTS;

/// Impulse responses for every effect that has one.
#[derive(Default)]
pub struct EffectBank {
    buffers: RwLock<HashMap<&'static str, Arc<AudioBuffer>>>,
    ready: AtomicBool,
    loaded: OnceCell<()>,
}

impl EffectBank {
    pub fn new() -> Arc<EffectBank> {
        Arc::new(EffectBank::default())
    }

    /// Returns true once every impulse has been attempted.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// The impulse for an effect. Always `None` for the identity effect.
    pub fn buffer(&self, name: &str) -> Option<Arc<AudioBuffer>> {
        self.buffers.read().get(name).cloned()
    }

    /// Loads every impulse response once.
    pub async fn init(self: &Arc<Self>, loader: &AssetLoader) {
        self.loaded
            .get_or_init(|| async {
                let bank = self.clone();
                let loader = loader.clone();
                let task = tokio::spawn(async move {
                    let assets = EFFECTS
                        .iter()
                        .filter_map(|effect| effect.file.map(|file| (effect.name, file.to_string())))
                        .collect();
                    loader
                        .load_all(assets, |name, result| {
                            if let Ok(buffer) = result {
                                bank.buffers.write().insert(name, buffer);
                            }
                        })
                        .await;
                    bank.ready.store(true, Ordering::Release);
                    info!(loaded = bank.buffers.read().len(), "Effects ready");
                });
                if let Err(e) = task.await {
                    error!(err = %e, "Effect load task failed");
                    self.ready.store(true, Ordering::Release);
                }
            })
            .await;
    }
}

#[cfg(test)]
mod test {
    use std::error::Error;
    use std::time::Duration;

    use super::*;
    use crate::samples::loader::test::MemorySource;

    #[tokio::test(flavor = "multi_thread")]
    async fn skips_identity_effect() -> Result<(), Box<dyn Error>> {
        let mut source = MemorySource::new(Duration::ZERO);
        source.insert_wav("feedback-spring.wav", vec![1.0, 0.0], 44100)?;
        let source = Arc::new(source);

        let bank = EffectBank::new();
        bank.init(&AssetLoader::new(source.clone(), 44100)).await;

        assert!(bank.is_ready());
        assert!(bank.buffer("spring").is_some());
        assert!(bank.buffer("none").is_none());
        assert!(bank.buffer("hipass").is_none());
        assert_eq!(EFFECTS.len() - 1, source.fetched.lock().len());
        Ok(())
    }
}
